// Repository interface with an injected storage strategy:
// remote-backed, local-mirror-backed, or layered (remote first, mirror fallback)

use std::{marker::PhantomData, str::FromStr, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    local_mirror::{create_mirror_key, LocalMirror, MirrorError},
    models::{Collection, EntityId, IdStrategy, Record},
    remote::{ApiError, RestClient},
};

#[derive(Error, Debug)]
pub enum AccessError {
    #[error("Remote error: {0}")]
    Remote(#[from] ApiError),

    #[error("Mirror error: {0}")]
    Mirror(#[from] MirrorError),

    #[error("{collection} {id} not found")]
    NotFound { collection: Collection, id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid patch: {0}")]
    InvalidPatch(String),
}

impl AccessError {
    pub fn not_found(collection: Collection, id: &EntityId) -> Self {
        AccessError::NotFound {
            collection,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AccessError::NotFound { .. })
    }
}

// Where a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    // Served or accepted by the remote API
    Remote,
    // Served from, or written only to, the local mirror
    Mirror,
    // Neither side had anything; a default was returned
    Empty,
}

// A value together with its origin
#[derive(Debug, Clone, PartialEq)]
pub struct Synced<T> {
    pub data: T,
    pub source: DataSource,
}

impl<T> Synced<T> {
    pub fn remote(data: T) -> Self {
        Self {
            data,
            source: DataSource::Remote,
        }
    }

    pub fn mirror(data: T) -> Self {
        Self {
            data,
            source: DataSource::Mirror,
        }
    }

    pub fn empty(data: T) -> Self {
        Self {
            data,
            source: DataSource::Empty,
        }
    }

    // The remote never saw (or never served) this value
    pub fn is_local_only(&self) -> bool {
        self.source != DataSource::Remote
    }

    pub fn into_inner(self) -> T {
        self.data
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Synced<U> {
        Synced {
            data: f(self.data),
            source: self.source,
        }
    }
}

// Field-equality filters, e.g. `?email=` or `?userId=`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    filters: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter_eq(mut self, field: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push((field.into(), value.to_string()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.filters
    }

    // Same comparison the backend applies: scalar field rendered as a string
    pub fn matches<T: Serialize>(&self, record: &T) -> bool {
        if self.filters.is_empty() {
            return true;
        }
        let Ok(value) = serde_json::to_value(record) else {
            return false;
        };
        self.filters.iter().all(|(field, expected)| {
            value.get(field).and_then(scalar_string).as_deref() == Some(expected.as_str())
        })
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// Read and write operations every strategy provides
#[async_trait]
pub trait Storage<T: Record>: Send + Sync {
    async fn list(&self, query: &Query) -> Result<Synced<Vec<T>>, AccessError>;
    async fn get(&self, id: &EntityId) -> Result<Synced<T>, AccessError>;
    async fn create(&self, record: T) -> Result<Synced<T>, AccessError>;
    async fn update(&self, id: &EntityId, record: T) -> Result<Synced<T>, AccessError>;
    // Shallow merge of a JSON object into the stored record
    async fn patch(&self, id: &EntityId, changes: Value) -> Result<Synced<T>, AccessError>;
    async fn delete(&self, id: &EntityId) -> Result<Synced<()>, AccessError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageStrategy {
    Remote,
    Local,
    #[default]
    Layered,
}

impl FromStr for StorageStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(StorageStrategy::Remote),
            "local" => Ok(StorageStrategy::Local),
            "layered" => Ok(StorageStrategy::Layered),
            other => Err(format!("unknown storage strategy: {}", other)),
        }
    }
}

// Remote-only storage, errors propagate
pub struct RemoteStorage<T> {
    client: RestClient,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> RemoteStorage<T> {
    pub fn new(client: RestClient) -> Self {
        Self {
            client,
            _marker: PhantomData,
        }
    }

    fn item_path(id: &EntityId) -> String {
        format!("{}/{}", T::COLLECTION.path(), id)
    }

    async fn fetch_all(&self, query: &Query) -> Result<Vec<T>, ApiError> {
        self.client.get(T::COLLECTION.path(), query.params()).await
    }

    async fn fetch_one(&self, id: &EntityId) -> Result<T, ApiError> {
        self.client.get(&Self::item_path(id), &[]).await
    }

    async fn send_create(&self, record: &T) -> Result<T, ApiError> {
        self.client.post(T::COLLECTION.path(), record).await
    }

    async fn send_update(&self, id: &EntityId, record: &T) -> Result<T, ApiError> {
        self.client.put(&Self::item_path(id), record).await
    }

    async fn send_patch(&self, id: &EntityId, changes: &Value) -> Result<T, ApiError> {
        self.client.patch(&Self::item_path(id), changes).await
    }

    async fn send_delete(&self, id: &EntityId) -> Result<(), ApiError> {
        self.client.delete(&Self::item_path(id)).await
    }

    fn map_not_found(err: ApiError, id: &EntityId) -> AccessError {
        match err {
            ApiError::NotFound(_) => AccessError::not_found(T::COLLECTION, id),
            other => AccessError::Remote(other),
        }
    }
}

#[async_trait]
impl<T: Record> Storage<T> for RemoteStorage<T> {
    async fn list(&self, query: &Query) -> Result<Synced<Vec<T>>, AccessError> {
        Ok(Synced::remote(self.fetch_all(query).await?))
    }

    async fn get(&self, id: &EntityId) -> Result<Synced<T>, AccessError> {
        self.fetch_one(id)
            .await
            .map(Synced::remote)
            .map_err(|e| Self::map_not_found(e, id))
    }

    async fn create(&self, record: T) -> Result<Synced<T>, AccessError> {
        Ok(Synced::remote(self.send_create(&record).await?))
    }

    async fn update(&self, id: &EntityId, mut record: T) -> Result<Synced<T>, AccessError> {
        record.set_id(id.clone());
        self.send_update(id, &record)
            .await
            .map(Synced::remote)
            .map_err(|e| Self::map_not_found(e, id))
    }

    async fn patch(&self, id: &EntityId, changes: Value) -> Result<Synced<T>, AccessError> {
        self.send_patch(id, &changes)
            .await
            .map(Synced::remote)
            .map_err(|e| Self::map_not_found(e, id))
    }

    async fn delete(&self, id: &EntityId) -> Result<Synced<()>, AccessError> {
        self.send_delete(id)
            .await
            .map(Synced::remote)
            .map_err(|e| Self::map_not_found(e, id))
    }
}

// Storage over the local mirror only. The whole collection is one mirror entry.
pub struct LocalStorage<T> {
    mirror: LocalMirror,
    write_lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> LocalStorage<T> {
    pub fn new(mirror: LocalMirror) -> Self {
        Self {
            mirror,
            write_lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    fn load(&self) -> Result<Option<Vec<T>>, AccessError> {
        Ok(self.mirror.read_collection(T::COLLECTION)?)
    }

    fn store(&self, records: &[T]) -> Result<(), AccessError> {
        Ok(self.mirror.write_collection(T::COLLECTION, records)?)
    }

    // Unreadable mirrors count as missing for reads
    fn snapshot(&self) -> Option<Vec<T>> {
        match self.load() {
            Ok(records) => records,
            Err(e) => {
                warn!(collection = %T::COLLECTION, error = %e, "ignoring unreadable mirror");
                None
            }
        }
    }

    pub fn next_id(records: &[T]) -> EntityId {
        let max = records
            .iter()
            .filter_map(|r| r.id().and_then(EntityId::as_number))
            .max();

        match T::LOCAL_IDS {
            IdStrategy::Sequential => EntityId::Num(max.unwrap_or(0) + 1),
            IdStrategy::Timestamp => {
                let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
                match max {
                    Some(max) if max >= now => EntityId::Num(max + 1),
                    _ => EntityId::Num(now),
                }
            }
        }
    }

    // Replace the mirrored snapshot wholesale
    pub fn replace_all(&self, records: &[T]) -> Result<(), AccessError> {
        let _guard = self.write_lock.lock();
        self.store(records)
    }

    // Insert or overwrite records by id; records without id are skipped
    pub fn upsert_many(&self, incoming: &[T]) -> Result<(), AccessError> {
        let _guard = self.write_lock.lock();
        let mut records = self.load()?.unwrap_or_default();
        for record in incoming {
            let Some(id) = record.id() else { continue };
            match records.iter_mut().find(|r| r.id() == Some(id)) {
                Some(existing) => *existing = record.clone(),
                None => records.push(record.clone()),
            }
        }
        self.store(&records)
    }

    pub fn upsert(&self, record: &T) -> Result<(), AccessError> {
        self.upsert_many(std::slice::from_ref(record))
    }

    // Drop a record from the mirror, returns whether it was there
    pub fn remove(&self, id: &EntityId) -> Result<bool, AccessError> {
        let _guard = self.write_lock.lock();
        let Some(mut records) = self.load()? else {
            return Ok(false);
        };
        let before = records.len();
        records.retain(|r| r.id() != Some(id));
        if records.len() == before {
            return Ok(false);
        }
        self.store(&records)?;
        Ok(true)
    }

    fn insert_new(&self, mut record: T) -> Result<T, AccessError> {
        let _guard = self.write_lock.lock();
        let mut records = self.load()?.unwrap_or_default();
        let id = Self::next_id(&records);
        record.set_id(id);
        records.push(record.clone());
        self.store(&records)?;
        Ok(record)
    }

    fn replace_existing(&self, id: &EntityId, mut record: T) -> Result<T, AccessError> {
        let _guard = self.write_lock.lock();
        let mut records = self.load()?.unwrap_or_default();
        let slot = records
            .iter_mut()
            .find(|r| r.id() == Some(id))
            .ok_or_else(|| AccessError::not_found(T::COLLECTION, id))?;
        record.set_id(id.clone());
        *slot = record.clone();
        self.store(&records)?;
        Ok(record)
    }

    fn merge_existing(&self, id: &EntityId, changes: &Value) -> Result<T, AccessError> {
        let Value::Object(changes) = changes else {
            return Err(AccessError::InvalidPatch("patch must be a JSON object".to_string()));
        };

        let _guard = self.write_lock.lock();
        let mut records = self.load()?.unwrap_or_default();
        let slot = records
            .iter_mut()
            .find(|r| r.id() == Some(id))
            .ok_or_else(|| AccessError::not_found(T::COLLECTION, id))?;

        let mut value = serde_json::to_value(&*slot)?;
        if let Value::Object(map) = &mut value {
            for (k, v) in changes {
                if k != "id" {
                    map.insert(k.clone(), v.clone());
                }
            }
        }
        let merged: T = serde_json::from_value(value)?;
        *slot = merged.clone();
        self.store(&records)?;
        Ok(merged)
    }
}

#[async_trait]
impl<T: Record> Storage<T> for LocalStorage<T> {
    async fn list(&self, query: &Query) -> Result<Synced<Vec<T>>, AccessError> {
        match self.snapshot() {
            Some(records) => Ok(Synced::mirror(
                records.into_iter().filter(|r| query.matches(r)).collect(),
            )),
            None => Ok(Synced::empty(Vec::new())),
        }
    }

    async fn get(&self, id: &EntityId) -> Result<Synced<T>, AccessError> {
        self.snapshot()
            .and_then(|records| records.into_iter().find(|r| r.id() == Some(id)))
            .map(Synced::mirror)
            .ok_or_else(|| AccessError::not_found(T::COLLECTION, id))
    }

    async fn create(&self, record: T) -> Result<Synced<T>, AccessError> {
        self.insert_new(record).map(Synced::mirror)
    }

    async fn update(&self, id: &EntityId, record: T) -> Result<Synced<T>, AccessError> {
        self.replace_existing(id, record).map(Synced::mirror)
    }

    async fn patch(&self, id: &EntityId, changes: Value) -> Result<Synced<T>, AccessError> {
        self.merge_existing(id, &changes).map(Synced::mirror)
    }

    async fn delete(&self, id: &EntityId) -> Result<Synced<()>, AccessError> {
        if self.remove(id)? {
            Ok(Synced::mirror(()))
        } else {
            Err(AccessError::not_found(T::COLLECTION, id))
        }
    }
}

// Remote first with write-through; the mirror answers when the remote cannot.
// Reads fall back on any remote failure; writes only when the remote is
// unavailable, so backend rejections (duplicate, validation) still surface.
pub struct LayeredStorage<T> {
    remote: RemoteStorage<T>,
    local: LocalStorage<T>,
}

impl<T: Record> LayeredStorage<T> {
    pub fn new(client: RestClient, mirror: LocalMirror) -> Self {
        Self {
            remote: RemoteStorage::new(client),
            local: LocalStorage::new(mirror),
        }
    }

    // Write-through is best effort: a failing mirror never fails the call
    fn write_through(&self, result: Result<(), AccessError>) {
        if let Err(e) = result {
            warn!(collection = %T::COLLECTION, error = %e, "mirror write-through failed");
        }
    }

    fn degraded(&self, operation: &str, err: &ApiError) {
        warn!(
            collection = %T::COLLECTION,
            operation,
            error = %err,
            "remote unavailable, using local mirror"
        );
    }
}

#[async_trait]
impl<T: Record> Storage<T> for LayeredStorage<T> {
    async fn list(&self, query: &Query) -> Result<Synced<Vec<T>>, AccessError> {
        match self.remote.fetch_all(query).await {
            Ok(records) => {
                if query.is_empty() {
                    self.write_through(self.local.replace_all(&records));
                } else {
                    self.write_through(self.local.upsert_many(&records));
                }
                debug!(collection = %T::COLLECTION, count = records.len(), "listed from remote");
                Ok(Synced::remote(records))
            }
            Err(e) => {
                self.degraded("list", &e);
                self.local.list(query).await
            }
        }
    }

    async fn get(&self, id: &EntityId) -> Result<Synced<T>, AccessError> {
        match self.remote.fetch_one(id).await {
            Ok(record) => {
                self.write_through(self.local.upsert(&record));
                Ok(Synced::remote(record))
            }
            Err(e) => {
                self.degraded("get", &e);
                self.local.get(id).await
            }
        }
    }

    async fn create(&self, record: T) -> Result<Synced<T>, AccessError> {
        match self.remote.send_create(&record).await {
            Ok(created) => {
                self.write_through(self.local.upsert(&created));
                Ok(Synced::remote(created))
            }
            Err(e) if e.is_unavailable() => {
                self.degraded("create", &e);
                let created = self.local.insert_new(record)?;
                info!(collection = %T::COLLECTION, id = ?created.id(), "created locally only");
                Ok(Synced::mirror(created))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, id: &EntityId, mut record: T) -> Result<Synced<T>, AccessError> {
        record.set_id(id.clone());
        match self.remote.send_update(id, &record).await {
            Ok(updated) => {
                self.write_through(self.local.upsert(&updated));
                Ok(Synced::remote(updated))
            }
            Err(e) if e.is_unavailable() => {
                self.degraded("update", &e);
                self.local.replace_existing(id, record).map(Synced::mirror)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn patch(&self, id: &EntityId, changes: Value) -> Result<Synced<T>, AccessError> {
        match self.remote.send_patch(id, &changes).await {
            Ok(patched) => {
                self.write_through(self.local.upsert(&patched));
                Ok(Synced::remote(patched))
            }
            Err(e) if e.is_unavailable() => {
                self.degraded("patch", &e);
                self.local.merge_existing(id, &changes).map(Synced::mirror)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: &EntityId) -> Result<Synced<()>, AccessError> {
        match self.remote.send_delete(id).await {
            Ok(()) => {
                self.write_through(self.local.remove(id).map(|_| ()));
                Ok(Synced::remote(()))
            }
            Err(e) if e.is_unavailable() => {
                self.degraded("delete", &e);
                self.local.delete(id).await
            }
            Err(e) => Err(e.into()),
        }
    }
}

// Typed accessor for one collection
pub struct Repository<T: Record> {
    storage: Arc<dyn Storage<T>>,
}

impl<T: Record> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
        }
    }
}

impl<T: Record> Repository<T> {
    pub fn with_storage(storage: Arc<dyn Storage<T>>) -> Self {
        Self { storage }
    }

    pub fn from_strategy(strategy: StorageStrategy, client: &RestClient, mirror: &LocalMirror) -> Self {
        let storage: Arc<dyn Storage<T>> = match strategy {
            StorageStrategy::Remote => Arc::new(RemoteStorage::new(client.clone())),
            StorageStrategy::Local => Arc::new(LocalStorage::new(mirror.clone())),
            StorageStrategy::Layered => Arc::new(LayeredStorage::new(client.clone(), mirror.clone())),
        };
        Self::with_storage(storage)
    }

    pub fn layered(client: &RestClient, mirror: &LocalMirror) -> Self {
        Self::from_strategy(StorageStrategy::Layered, client, mirror)
    }

    pub async fn list(&self) -> Result<Synced<Vec<T>>, AccessError> {
        self.storage.list(&Query::new()).await
    }

    pub async fn find(&self, query: &Query) -> Result<Synced<Vec<T>>, AccessError> {
        self.storage.list(query).await
    }

    pub async fn get(&self, id: &EntityId) -> Result<Synced<T>, AccessError> {
        self.storage.get(id).await
    }

    pub async fn create(&self, record: T) -> Result<Synced<T>, AccessError> {
        self.storage.create(record).await
    }

    pub async fn update(&self, id: &EntityId, record: T) -> Result<Synced<T>, AccessError> {
        self.storage.update(id, record).await
    }

    pub async fn patch(&self, id: &EntityId, changes: Value) -> Result<Synced<T>, AccessError> {
        self.storage.patch(id, changes).await
    }

    pub async fn delete(&self, id: &EntityId) -> Result<Synced<()>, AccessError> {
        self.storage.delete(id).await
    }
}

// Singleton resource (about page, contact info, one language pack)
pub struct DocumentStore<T> {
    client: RestClient,
    mirror: LocalMirror,
    resource: String,
    mirror_key: String,
    strategy: StorageStrategy,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for DocumentStore<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            mirror: self.mirror.clone(),
            resource: self.resource.clone(),
            mirror_key: self.mirror_key.clone(),
            strategy: self.strategy,
            _marker: PhantomData,
        }
    }
}

impl<T> DocumentStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(
        client: RestClient,
        mirror: LocalMirror,
        collection: Collection,
        key: Option<&str>,
        strategy: StorageStrategy,
    ) -> Self {
        let resource = match key {
            Some(k) => format!("{}/{}", collection.path(), k),
            None => collection.path().to_string(),
        };
        Self {
            client,
            mirror,
            resource,
            mirror_key: create_mirror_key(collection, key),
            strategy,
            _marker: PhantomData,
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    fn read_mirror(&self) -> Synced<Option<T>> {
        match self.mirror.read::<T>(&self.mirror_key) {
            Ok(Some(doc)) => Synced::mirror(Some(doc)),
            Ok(None) => Synced::empty(None),
            Err(e) => {
                warn!(key = %self.mirror_key, error = %e, "ignoring unreadable mirror document");
                Synced::empty(None)
            }
        }
    }

    pub async fn read(&self) -> Result<Synced<Option<T>>, AccessError> {
        match self.strategy {
            StorageStrategy::Local => Ok(self.read_mirror()),
            StorageStrategy::Remote => Ok(Synced::remote(Some(self.client.get(&self.resource, &[]).await?))),
            StorageStrategy::Layered => match self.client.get::<T>(&self.resource, &[]).await {
                Ok(doc) => {
                    if let Err(e) = self.mirror.write(&self.mirror_key, &doc) {
                        warn!(key = %self.mirror_key, error = %e, "mirror write-through failed");
                    }
                    Ok(Synced::remote(Some(doc)))
                }
                Err(e) => {
                    warn!(resource = %self.resource, error = %e, "remote unavailable, using local mirror");
                    Ok(self.read_mirror())
                }
            },
        }
    }

    // Read, substituting T::default() when nothing exists anywhere
    pub async fn read_or_default(&self) -> Result<Synced<T>, AccessError>
    where
        T: Default,
    {
        let doc = self.read().await?;
        let source = doc.source;
        Ok(Synced {
            data: doc.data.unwrap_or_default(),
            source,
        })
    }

    pub async fn write(&self, doc: T) -> Result<Synced<T>, AccessError> {
        match self.strategy {
            StorageStrategy::Local => {
                self.mirror.write(&self.mirror_key, &doc)?;
                Ok(Synced::mirror(doc))
            }
            StorageStrategy::Remote => Ok(Synced::remote(self.client.put(&self.resource, &doc).await?)),
            StorageStrategy::Layered => match self.client.put::<T, T>(&self.resource, &doc).await {
                Ok(saved) => {
                    if let Err(e) = self.mirror.write(&self.mirror_key, &saved) {
                        warn!(key = %self.mirror_key, error = %e, "mirror write-through failed");
                    }
                    Ok(Synced::remote(saved))
                }
                Err(e) if e.is_unavailable() => {
                    warn!(resource = %self.resource, error = %e, "remote unavailable, writing local mirror only");
                    self.mirror.write(&self.mirror_key, &doc)?;
                    Ok(Synced::mirror(doc))
                }
                Err(e) => Err(e.into()),
            },
        }
    }
}
