// Remote REST access: one configured base URL, one fixed timeout, JSON bodies
// Reads get exactly one retry on the alternate path (with/without the api prefix)

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

// Error types for remote calls
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error: {status_code} - {message}")]
    ApiResponseError { status_code: u16, message: String },

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Encode error: {0}")]
    EncodeError(String),
}

impl ApiError {
    // True when the backend could not serve the call at all, so a local
    // mirror may stand in for a write. Application-level rejections
    // (400, 409, ...) are not. Neither is an undecodable body: the backend
    // may already hold the write.
    pub fn is_unavailable(&self) -> bool {
        match self {
            ApiError::NetworkError(_) | ApiError::Timeout(_) | ApiError::NotFound(_) => true,
            ApiError::ApiResponseError { status_code, .. } => {
                *status_code >= 500 || matches!(*status_code, 404 | 408 | 429)
            }
            ApiError::DecodeError(_) | ApiError::EncodeError(_) => false,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::NotFound(_) => Some(404),
            ApiError::ApiResponseError { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}

pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_API_PREFIX: &str = "/api";

// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    // Prefix of the alternate route shape, e.g. "/api"
    pub api_prefix: String,
    // Try the prefixed route first instead of the bare one
    pub prefer_prefixed: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            prefer_prefixed: false,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    // Defaults overridden by AGENCY_API_URL, AGENCY_API_TIMEOUT_MS and AGENCY_API_PREFIXED
    pub fn from_env() -> Result<Self, ClientError> {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("AGENCY_API_URL") {
            config.base_url = url;
        }
        if let Ok(raw) = std::env::var("AGENCY_API_TIMEOUT_MS") {
            config.timeout_ms = raw.parse().map_err(|_| {
                ClientError::ConfigError(format!("AGENCY_API_TIMEOUT_MS is not a number: {}", raw))
            })?;
        }
        if let Ok(raw) = std::env::var("AGENCY_API_PREFIXED") {
            config.prefer_prefixed = matches!(raw.as_str(), "1" | "true" | "yes");
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    pub fn prefixed_first(mut self, prefer_prefixed: bool) -> Self {
        self.prefer_prefixed = prefer_prefixed;
        self
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ClientError::ConfigError(format!(
                "base url must be http(s): {}",
                self.base_url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ClientError::ConfigError("timeout must be positive".to_string()));
        }
        if !self.api_prefix.is_empty() && !self.api_prefix.starts_with('/') {
            return Err(ClientError::ConfigError(format!(
                "api prefix must start with '/': {}",
                self.api_prefix
            )));
        }
        Ok(())
    }

    // (primary, alternate) full paths for a resource like "tours/3"
    pub fn paths(&self, resource: &str) -> (String, String) {
        let bare = format!("/{}", resource.trim_start_matches('/'));
        let prefixed = format!("{}{}", self.api_prefix.trim_end_matches('/'), bare);
        if self.prefer_prefixed {
            (prefixed, bare)
        } else {
            (bare, prefixed)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

// Field-equality filters sent as the query string
pub type QueryParams = Vec<(String, String)>;

#[derive(Debug, Clone)]
pub struct RemoteRequest {
    pub method: Method,
    // Full path including any prefix, e.g. "/api/tours/3"
    pub path: String,
    pub query: QueryParams,
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RemoteResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// Moves one request to the backend and back
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, request: &RemoteRequest) -> Result<RemoteResponse, ApiError>;
}

// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &RemoteRequest) -> Result<RemoteResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(RemoteResponse { status, body })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::NetworkError(format!("timed out: {}", err))
    } else {
        ApiError::NetworkError(err.to_string())
    }
}

// Counters for remote traffic
#[derive(Debug, Default)]
pub struct ClientStats {
    pub requests_sent: AtomicUsize,
    pub requests_succeeded: AtomicUsize,
    pub requests_failed: AtomicUsize,
    pub requests_timeout: AtomicUsize,
    pub alternate_attempts: AtomicUsize,
}

impl ClientStats {
    pub fn sent(&self) -> usize {
        self.requests_sent.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.requests_failed.load(Ordering::SeqCst)
    }

    pub fn alternates(&self) -> usize {
        self.alternate_attempts.load(Ordering::SeqCst)
    }
}

// REST client shared by every accessor
#[derive(Clone)]
pub struct RestClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    stats: Arc<ClientStats>,
}

impl RestClient {
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config,
            stats: Arc::new(ClientStats::default()),
        }
    }

    // Client talking HTTP to config.base_url
    pub fn http(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(String, String)],
    ) -> Result<T, ApiError> {
        self.call(Method::Get, resource, query, None).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        resource: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = encode(body)?;
        self.call(Method::Post, resource, &[], Some(body)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        resource: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = encode(body)?;
        self.call(Method::Put, resource, &[], Some(body)).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        resource: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = encode(body)?;
        self.call(Method::Patch, resource, &[], Some(body)).await
    }

    pub async fn delete(&self, resource: &str) -> Result<(), ApiError> {
        self.call::<serde::de::IgnoredAny>(Method::Delete, resource, &[], None)
            .await
            .map(|_| ())
    }

    // Primary path first. Reads retry the alternate path once on any failure;
    // writes only when the primary route does not exist (404), so a write the
    // backend may already have applied is never sent twice.
    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        resource: &str,
        query: &[(String, String)],
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        let (primary, alternate) = self.config.paths(resource);

        let mut request = RemoteRequest {
            method,
            path: primary,
            query: query.to_vec(),
            body,
        };

        let err = match self.attempt(&request).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let retry = method == Method::Get || matches!(err, ApiError::NotFound(_));
        if !retry {
            return Err(err);
        }

        warn!(
            method = method.as_str(),
            path = %request.path,
            alternate = %alternate,
            error = %err,
            "primary route failed, trying alternate path"
        );
        self.stats.alternate_attempts.fetch_add(1, Ordering::SeqCst);
        request.path = alternate;
        self.attempt(&request).await
    }

    async fn attempt<T: DeserializeOwned>(&self, request: &RemoteRequest) -> Result<T, ApiError> {
        self.stats.requests_sent.fetch_add(1, Ordering::SeqCst);
        debug!(method = request.method.as_str(), path = %request.path, "remote request");

        let result = self.exchange(request).await;
        match &result {
            Ok(_) => {
                self.stats.requests_succeeded.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                if let ApiError::Timeout(_) = e {
                    self.stats.requests_timeout.fetch_add(1, Ordering::SeqCst);
                }
                self.stats.requests_failed.fetch_add(1, Ordering::SeqCst);
            }
        }
        result
    }

    async fn exchange<T: DeserializeOwned>(&self, request: &RemoteRequest) -> Result<T, ApiError> {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let response = tokio::time::timeout(timeout, self.transport.send(request))
            .await
            .map_err(|_| ApiError::Timeout(self.config.timeout_ms))??;

        match response.status {
            404 => Err(ApiError::NotFound(request.path.clone())),
            _ if !response.is_success() => Err(ApiError::ApiResponseError {
                status_code: response.status,
                message: String::from_utf8_lossy(&response.body).into_owned(),
            }),
            _ => {
                let body: &[u8] = if response.body.is_empty() {
                    b"null"
                } else {
                    &response.body
                };
                serde_json::from_slice(body).map_err(|e| ApiError::DecodeError(e.to_string()))
            }
        }
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::EncodeError(e.to_string()))
}

// In-process stand-in for the mock REST backend (json-server style).
// Public so integration tests and benches can drive it.
pub mod mock_server {
    use super::*;
    use serde_json::{Map, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU16, AtomicU8, AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    #[derive(Debug, Clone, Copy)]
    pub enum ServerMode {
        Normal,
        // Every request fails with a server error
        Degraded,
        // Connection refused
        CompleteOutage,
    }

    pub struct MockServer {
        mode: AtomicU8,
        request_count: AtomicUsize,
        route_prefix: Mutex<String>,
        collections: Mutex<HashMap<String, Vec<Value>>>,
        documents: Mutex<HashMap<String, Value>>,
        fail_next_requests: AtomicUsize,
        reject_writes_status: AtomicU16,
        delay_ms: AtomicUsize,
        recent_requests: Mutex<Vec<(Method, String)>>,
    }

    impl Default for MockServer {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockServer {
        // Serves the standard collections, empty, without a route prefix
        pub fn new() -> Self {
            let collections = ["tours", "bookings", "users", "blogPosts", "translations"]
                .into_iter()
                .map(|name| (name.to_string(), Vec::new()))
                .collect();

            Self {
                mode: AtomicU8::new(0),
                request_count: AtomicUsize::new(0),
                route_prefix: Mutex::new(String::new()),
                collections: Mutex::new(collections),
                documents: Mutex::new(HashMap::new()),
                fail_next_requests: AtomicUsize::new(0),
                reject_writes_status: AtomicU16::new(0),
                delay_ms: AtomicUsize::new(0),
                recent_requests: Mutex::new(Vec::new()),
            }
        }

        pub fn set_mode(&self, mode: ServerMode) {
            let mode_value = match mode {
                ServerMode::Normal => 0,
                ServerMode::Degraded => 1,
                ServerMode::CompleteOutage => 2,
            };
            self.mode.store(mode_value, Ordering::SeqCst);
        }

        // Only paths below this prefix are routed, e.g. "/api"
        pub async fn set_route_prefix(&self, prefix: &str) {
            *self.route_prefix.lock().await = prefix.trim_end_matches('/').to_string();
        }

        pub fn set_delay(&self, delay_ms: usize) {
            self.delay_ms.store(delay_ms, Ordering::SeqCst);
        }

        pub fn fail_next_requests(&self, count: usize) {
            self.fail_next_requests.store(count, Ordering::SeqCst);
        }

        // Answer every mutation with this status (0 disables)
        pub fn reject_writes(&self, status_code: u16) {
            self.reject_writes_status.store(status_code, Ordering::SeqCst);
        }

        pub fn request_count(&self) -> usize {
            self.request_count.load(Ordering::SeqCst)
        }

        pub async fn requests(&self) -> Vec<(Method, String)> {
            self.recent_requests.lock().await.clone()
        }

        pub async fn add_collection(&self, name: &str, records: Vec<Value>) {
            self.collections
                .lock()
                .await
                .insert(name.to_string(), records);
        }

        pub async fn add_document(&self, name: &str, document: Value) {
            self.documents
                .lock()
                .await
                .insert(name.to_string(), document);
        }

        pub async fn collection(&self, name: &str) -> Vec<Value> {
            self.collections
                .lock()
                .await
                .get(name)
                .cloned()
                .unwrap_or_default()
        }

        pub async fn document(&self, name: &str) -> Option<Value> {
            self.documents.lock().await.get(name).cloned()
        }

        async fn handle(&self, request: &RemoteRequest) -> Result<RemoteResponse, ApiError> {
            self.request_count.fetch_add(1, Ordering::SeqCst);

            if self.mode.load(Ordering::SeqCst) == 2 {
                return Err(ApiError::NetworkError("Service unavailable".to_string()));
            }

            let delay = self.delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay as u64)).await;
            }

            self.recent_requests
                .lock()
                .await
                .push((request.method, request.path.clone()));

            let fail_count = self.fail_next_requests.load(Ordering::SeqCst);
            if fail_count > 0 {
                self.fail_next_requests
                    .store(fail_count - 1, Ordering::SeqCst);
                return Ok(respond(500, &Value::String("Internal Server Error".into())));
            }

            if self.mode.load(Ordering::SeqCst) == 1 {
                return Ok(respond(503, &Value::String("Service temporarily unavailable".into())));
            }

            let prefix = self.route_prefix.lock().await.clone();
            let Some(rest) = request.path.strip_prefix(prefix.as_str()) else {
                return Ok(not_found());
            };
            let segments: Vec<&str> = rest.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();

            let reject = self.reject_writes_status.load(Ordering::SeqCst);
            if reject != 0 && request.method != Method::Get {
                return Ok(respond(reject, &Value::String("rejected".into())));
            }

            match segments.as_slice() {
                [name] => {
                    if let Some(response) = self.handle_document(name, request).await {
                        return Ok(response);
                    }
                    Ok(self.handle_collection(name, request).await)
                }
                [name, id] => Ok(self.handle_item(name, id, request).await),
                _ => Ok(not_found()),
            }
        }

        async fn handle_document(&self, name: &str, request: &RemoteRequest) -> Option<RemoteResponse> {
            let mut documents = self.documents.lock().await;
            let document = documents.get_mut(name)?;
            match (request.method, &request.body) {
                (Method::Get, _) => Some(respond(200, document)),
                (Method::Put, Some(body)) => {
                    *document = body.clone();
                    Some(respond(200, document))
                }
                (Method::Patch, Some(body)) => {
                    merge(document, body);
                    Some(respond(200, document))
                }
                _ => Some(respond(400, &Value::String("unsupported".into()))),
            }
        }

        async fn handle_collection(&self, name: &str, request: &RemoteRequest) -> RemoteResponse {
            let mut collections = self.collections.lock().await;
            let Some(records) = collections.get_mut(name) else {
                return not_found();
            };

            match (request.method, &request.body) {
                (Method::Get, _) => {
                    let matching: Vec<Value> = records
                        .iter()
                        .filter(|record| {
                            request.query.iter().all(|(field, expected)| {
                                record.get(field).and_then(scalar_string).as_deref()
                                    == Some(expected.as_str())
                            })
                        })
                        .cloned()
                        .collect();
                    respond(200, &Value::Array(matching))
                }
                (Method::Post, Some(body)) => {
                    let mut record = body.clone();
                    if record.get("id").map_or(true, Value::is_null) {
                        let next = records
                            .iter()
                            .filter_map(|r| r.get("id").and_then(scalar_string))
                            .filter_map(|id| id.parse::<u64>().ok())
                            .max()
                            .unwrap_or(0)
                            + 1;
                        if let Value::Object(map) = &mut record {
                            map.insert("id".to_string(), Value::from(next));
                        }
                    }
                    records.push(record.clone());
                    respond(201, &record)
                }
                _ => respond(400, &Value::String("unsupported".into())),
            }
        }

        async fn handle_item(&self, name: &str, id: &str, request: &RemoteRequest) -> RemoteResponse {
            let mut collections = self.collections.lock().await;
            let Some(records) = collections.get_mut(name) else {
                return not_found();
            };
            let Some(position) = records
                .iter()
                .position(|r| r.get("id").and_then(scalar_string).as_deref() == Some(id))
            else {
                return not_found();
            };

            match (request.method, &request.body) {
                (Method::Get, _) => respond(200, &records[position]),
                (Method::Put, Some(body)) => {
                    let id_value = records[position].get("id").cloned().unwrap_or(Value::Null);
                    let mut record = body.clone();
                    if let Value::Object(map) = &mut record {
                        map.insert("id".to_string(), id_value);
                    }
                    records[position] = record;
                    respond(200, &records[position])
                }
                (Method::Patch, Some(body)) => {
                    merge(&mut records[position], body);
                    respond(200, &records[position])
                }
                (Method::Delete, _) => {
                    records.remove(position);
                    respond(200, &Value::Object(Map::new()))
                }
                _ => respond(400, &Value::String("unsupported".into())),
            }
        }
    }

    #[async_trait]
    impl Transport for MockServer {
        async fn send(&self, request: &RemoteRequest) -> Result<RemoteResponse, ApiError> {
            self.handle(request).await
        }
    }

    fn respond(status: u16, body: &Value) -> RemoteResponse {
        RemoteResponse {
            status,
            body: Bytes::from(serde_json::to_vec(body).unwrap_or_default()),
        }
    }

    fn not_found() -> RemoteResponse {
        respond(404, &Value::Object(Map::new()))
    }

    fn merge(target: &mut Value, patch: &Value) {
        if let (Value::Object(target), Value::Object(patch)) = (target, patch) {
            for (k, v) in patch {
                target.insert(k.clone(), v.clone());
            }
        }
    }

    // Query-string form of a scalar JSON value
    fn scalar_string(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock_server::{MockServer, ServerMode};
    use serde_json::{json, Value};

    fn client_for(server: &Arc<MockServer>, config: ClientConfig) -> RestClient {
        RestClient::new(config, server.clone())
    }

    #[test]
    fn test_paths_follow_prefix_preference() {
        let config = ClientConfig::default();
        assert_eq!(
            config.paths("tours/3"),
            ("/tours/3".to_string(), "/api/tours/3".to_string())
        );

        let config = ClientConfig::default().prefixed_first(true);
        assert_eq!(
            config.paths("/tours"),
            ("/api/tours".to_string(), "/tours".to_string())
        );
    }

    #[test]
    fn test_config_validation() {
        assert!(ClientConfig::default().validate().is_ok());
        assert!(matches!(
            ClientConfig::new("localhost:3001").validate(),
            Err(ClientError::ConfigError(_))
        ));
        assert!(ClientConfig::default().with_timeout_ms(0).validate().is_err());
        assert!(ClientConfig::default().with_api_prefix("api").validate().is_err());
        assert!(HttpTransport::new(&ClientConfig::new("ftp://x")).is_err());
    }

    #[test]
    fn test_unavailable_classification() {
        assert!(ApiError::NetworkError("x".into()).is_unavailable());
        assert!(ApiError::Timeout(10).is_unavailable());
        assert!(ApiError::ApiResponseError { status_code: 503, message: String::new() }.is_unavailable());
        assert!(!ApiError::ApiResponseError { status_code: 409, message: String::new() }.is_unavailable());
        assert!(!ApiError::ApiResponseError { status_code: 400, message: String::new() }.is_unavailable());
        assert!(!ApiError::DecodeError("expected value".into()).is_unavailable());
    }

    #[tokio::test]
    async fn test_get_uses_primary_route() {
        let server = Arc::new(MockServer::new());
        server.add_collection("tours", vec![json!({"id": 1, "title": "A"})]).await;
        let client = client_for(&server, ClientConfig::default());

        let tours: Vec<Value> = client.get("tours", &[]).await.unwrap();
        assert_eq!(tours.len(), 1);
        assert_eq!(server.request_count(), 1);
        assert_eq!(client.stats().alternates(), 0);
    }

    #[tokio::test]
    async fn test_get_falls_back_to_alternate_route_once() {
        let server = Arc::new(MockServer::new());
        server.set_route_prefix("/api").await;
        server.add_collection("tours", vec![json!({"id": 1})]).await;
        let client = client_for(&server, ClientConfig::default());

        let tours: Vec<Value> = client.get("tours", &[]).await.unwrap();
        assert_eq!(tours.len(), 1);

        let paths: Vec<String> = server.requests().await.into_iter().map(|(_, p)| p).collect();
        assert_eq!(paths, vec!["/tours", "/api/tours"]);
        assert_eq!(client.stats().alternates(), 1);
    }

    #[tokio::test]
    async fn test_outage_fails_after_two_attempts() {
        let server = Arc::new(MockServer::new());
        server.set_mode(ServerMode::CompleteOutage);
        let client = client_for(&server, ClientConfig::default());

        let result: Result<Vec<Value>, _> = client.get("tours", &[]).await;
        assert!(matches!(result, Err(ApiError::NetworkError(_))));
        assert_eq!(server.request_count(), 2);
        assert_eq!(client.stats().failed(), 2);
    }

    #[tokio::test]
    async fn test_slow_backend_hits_fixed_timeout() {
        let server = Arc::new(MockServer::new());
        server.set_delay(200);
        let client = client_for(&server, ClientConfig::default().with_timeout_ms(20));

        let result: Result<Vec<Value>, _> = client.get("tours", &[]).await;
        assert!(matches!(result, Err(ApiError::Timeout(20))));
        assert_eq!(client.stats().requests_timeout.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_query_filters_by_field_equality() {
        let server = Arc::new(MockServer::new());
        server
            .add_collection(
                "bookings",
                vec![json!({"id": 1, "userId": 5}), json!({"id": 2, "userId": "6"})],
            )
            .await;
        let client = client_for(&server, ClientConfig::default());

        let five: Vec<Value> = client
            .get("bookings", &[("userId".to_string(), "5".to_string())])
            .await
            .unwrap();
        assert_eq!(five.len(), 1);
        assert_eq!(five[0]["id"], 1);
    }

    #[tokio::test]
    async fn test_failed_write_is_not_repeated() {
        let server = Arc::new(MockServer::new());
        server.fail_next_requests(1);
        let client = client_for(&server, ClientConfig::default());

        let result: Result<Value, _> = client.post("tours", &json!({"title": "A"})).await;
        assert!(matches!(
            result,
            Err(ApiError::ApiResponseError { status_code: 500, .. })
        ));
        assert_eq!(server.request_count(), 1);
        assert!(server.collection("tours").await.is_empty());
    }

    #[tokio::test]
    async fn test_write_retries_alternate_on_missing_route() {
        let server = Arc::new(MockServer::new());
        server.set_route_prefix("/api").await;
        let client = client_for(&server, ClientConfig::default());

        let created: Value = client.post("tours", &json!({"title": "A"})).await.unwrap();
        assert_eq!(created["id"], 1);
        assert_eq!(server.request_count(), 2);

        let patched: Value = client
            .patch("tours/1", &json!({"title": "B"}))
            .await
            .unwrap();
        assert_eq!(patched["title"], "B");

        client.delete("tours/1").await.unwrap();
        assert!(server.collection("tours").await.is_empty());
    }
}
