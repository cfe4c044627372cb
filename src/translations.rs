// Translation accessor: per-language packs loaded remote first, cached in an
// in-memory lookup store, editable key by key from the back office

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use tracing::{debug, info};

use crate::{
    local_mirror::LocalMirror,
    models::{Collection, EntityId, LanguagePack, TranslationBundle},
    remote::RestClient,
    repository::{AccessError, DocumentStore, StorageStrategy, Synced},
};

pub const DEFAULT_LANGUAGE: &str = "en";

// Loaded bundles by language code
pub struct I18nStore {
    bundles: DashMap<String, TranslationBundle>,
    fallback_language: String,
}

impl I18nStore {
    pub fn new(fallback_language: impl Into<String>) -> Self {
        Self {
            bundles: DashMap::new(),
            fallback_language: fallback_language.into(),
        }
    }

    pub fn fallback_language(&self) -> &str {
        &self.fallback_language
    }

    pub fn install(&self, language: &str, bundle: TranslationBundle) {
        self.bundles.insert(language.to_string(), bundle);
    }

    pub fn bundle(&self, language: &str) -> Option<TranslationBundle> {
        self.bundles.get(language).map(|b| b.value().clone())
    }

    pub fn languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = self.bundles.iter().map(|e| e.key().clone()).collect();
        languages.sort();
        languages
    }

    fn lookup(&self, language: &str, key: &str) -> Option<String> {
        self.bundles
            .get(language)
            .and_then(|bundle| bundle.get(key).map(str::to_string))
    }

    // Language, then fallback language, then the key itself
    pub fn t(&self, language: &str, key: &str) -> String {
        self.lookup(language, key)
            .or_else(|| self.lookup(&self.fallback_language, key))
            .unwrap_or_else(|| key.to_string())
    }
}

impl Default for I18nStore {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE)
    }
}

#[derive(Clone)]
pub struct TranslationService {
    client: RestClient,
    mirror: LocalMirror,
    strategy: StorageStrategy,
    store: Arc<I18nStore>,
}

impl TranslationService {
    pub fn new(client: RestClient, mirror: LocalMirror, strategy: StorageStrategy, store: Arc<I18nStore>) -> Self {
        Self {
            client,
            mirror,
            strategy,
            store,
        }
    }

    pub fn store(&self) -> &Arc<I18nStore> {
        &self.store
    }

    fn pack(&self, language: &str) -> DocumentStore<LanguagePack> {
        DocumentStore::new(
            self.client.clone(),
            self.mirror.clone(),
            Collection::Translations,
            Some(language),
            self.strategy,
        )
    }

    // Missing everywhere yields an empty bundle, still installed
    pub async fn load_language(&self, language: &str) -> Result<Synced<TranslationBundle>, AccessError> {
        let pack = self.pack(language).read().await?;
        let bundle = pack.map(|p| p.map(|p| p.resources).unwrap_or_default());
        debug!(
            language,
            keys = bundle.data.flatten().len(),
            source = ?bundle.source,
            "language loaded"
        );
        self.store.install(language, bundle.data.clone());
        Ok(bundle)
    }

    pub async fn load_languages(
        &self,
        languages: &[&str],
    ) -> Vec<(String, Result<Synced<TranslationBundle>, AccessError>)> {
        let loads = languages.iter().map(|language| async move {
            (language.to_string(), self.load_language(language).await)
        });
        join_all(loads).await
    }

    // Edit one dotted key and save the whole pack
    pub async fn set_translation(
        &self,
        language: &str,
        key: &str,
        value: &str,
    ) -> Result<Synced<TranslationBundle>, AccessError> {
        let mut bundle = match self.store.bundle(language) {
            Some(bundle) => bundle,
            None => self.load_language(language).await?.into_inner(),
        };
        bundle.set(key, value);
        self.save(language, bundle).await
    }

    pub async fn save(
        &self,
        language: &str,
        bundle: TranslationBundle,
    ) -> Result<Synced<TranslationBundle>, AccessError> {
        let pack = LanguagePack {
            id: Some(EntityId::from(language)),
            resources: bundle,
        };
        let saved = self.pack(language).write(pack).await?;
        info!(language, local_only = saved.is_local_only(), "translations saved");

        let saved = saved.map(|p| p.resources);
        self.store.install(language, saved.data.clone());
        Ok(saved)
    }

    pub fn t(&self, language: &str, key: &str) -> String {
        self.store.t(language, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{
        mock_server::{MockServer, ServerMode},
        ClientConfig,
    };
    use crate::repository::DataSource;
    use serde_json::json;

    async fn setup() -> (Arc<MockServer>, TranslationService) {
        let server = Arc::new(MockServer::new());
        server
            .add_collection(
                "translations",
                vec![
                    json!({"id": "en", "resources": {"nav": {"home": "Home", "tours": "Tours"}, "cta": "Book now"}}),
                    json!({"id": "fr", "resources": {"nav": {"home": "Accueil"}}}),
                ],
            )
            .await;
        let client = RestClient::new(ClientConfig::default(), server.clone());
        let service = TranslationService::new(
            client,
            LocalMirror::in_memory(),
            StorageStrategy::Layered,
            Arc::new(I18nStore::default()),
        );
        (server, service)
    }

    #[test]
    fn test_lookup_falls_back_to_default_language_then_key() {
        let store = I18nStore::new("en");
        let mut en = TranslationBundle::new();
        en.set("nav.home", "Home");
        en.set("nav.blog", "Blog");
        let mut fr = TranslationBundle::new();
        fr.set("nav.home", "Accueil");
        store.install("en", en);
        store.install("fr", fr);

        assert_eq!(store.t("fr", "nav.home"), "Accueil");
        assert_eq!(store.t("fr", "nav.blog"), "Blog");
        assert_eq!(store.t("fr", "nav.missing"), "nav.missing");
        assert_eq!(store.t("de", "nav.home"), "Home");
        assert_eq!(store.languages(), vec!["en", "fr"]);
    }

    #[tokio::test]
    async fn test_load_several_languages_concurrently() {
        let (_server, service) = setup().await;

        let results = service.load_languages(&["en", "fr", "ar"]).await;
        assert_eq!(results.len(), 3);
        for (language, result) in &results {
            let bundle = result.as_ref().unwrap();
            match language.as_str() {
                "ar" => assert_eq!(bundle.source, DataSource::Empty),
                _ => assert_eq!(bundle.source, DataSource::Remote),
            }
        }

        assert_eq!(service.t("fr", "nav.home"), "Accueil");
        assert_eq!(service.t("fr", "cta"), "Book now");
        assert_eq!(service.t("ar", "nav.tours"), "Tours");
    }

    #[tokio::test]
    async fn test_offline_load_uses_mirror() {
        let (server, service) = setup().await;
        service.load_language("fr").await.unwrap();

        server.set_mode(ServerMode::CompleteOutage);
        let offline = service.load_language("fr").await.unwrap();
        assert_eq!(offline.source, DataSource::Mirror);
        assert_eq!(offline.data.get("nav.home"), Some("Accueil"));
    }

    #[tokio::test]
    async fn test_set_translation_writes_through() {
        let (server, service) = setup().await;

        let saved = service.set_translation("en", "nav.blog", "Journal").await.unwrap();
        assert_eq!(saved.source, DataSource::Remote);
        assert_eq!(saved.data.get("nav.home"), Some("Home"));
        assert_eq!(service.t("en", "nav.blog"), "Journal");

        let stored = server.collection("translations").await;
        assert_eq!(stored[0]["resources"]["nav"]["blog"], "Journal");

        server.set_mode(ServerMode::Degraded);
        let offline = service.set_translation("en", "cta", "Reserve").await.unwrap();
        assert!(offline.is_local_only());
        assert_eq!(service.t("en", "cta"), "Reserve");
        server.set_mode(ServerMode::Normal);
        assert_eq!(server.collection("translations").await[0]["resources"]["cta"], "Book now");
    }
}
