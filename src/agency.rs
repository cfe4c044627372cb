// Top-level wiring: one REST client, one local mirror, one storage strategy,
// shared by every accessor

use std::sync::Arc;

use tracing::info;

use crate::{
    bookings::BookingService,
    content::ContentService,
    local_mirror::{LocalMirror, MirrorConfig},
    models::{Collection, Tour},
    remote::{ClientConfig, ClientError, RestClient, Transport},
    repository::{DocumentStore, Repository, StorageStrategy},
    tours::TourService,
    translations::{I18nStore, TranslationService, DEFAULT_LANGUAGE},
    users::UserService,
};

#[derive(Debug, Clone)]
pub struct AgencyConfig {
    pub client: ClientConfig,
    pub mirror: MirrorConfig,
    pub strategy: StorageStrategy,
    pub default_language: String,
}

impl Default for AgencyConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            mirror: MirrorConfig::in_memory(),
            strategy: StorageStrategy::Layered,
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl AgencyConfig {
    // Client settings plus AGENCY_MIRROR_DIR, AGENCY_STORAGE and AGENCY_LANGUAGE
    pub fn from_env() -> Result<Self, ClientError> {
        let mut config = Self {
            client: ClientConfig::from_env()?,
            ..Default::default()
        };
        if let Ok(dir) = std::env::var("AGENCY_MIRROR_DIR") {
            if !dir.trim().is_empty() {
                config.mirror = MirrorConfig::on_disk(dir);
            }
        }
        if let Ok(raw) = std::env::var("AGENCY_STORAGE") {
            config.strategy = raw.parse().map_err(ClientError::ConfigError)?;
        }
        if let Ok(language) = std::env::var("AGENCY_LANGUAGE") {
            if !language.trim().is_empty() {
                config.default_language = language.trim().to_string();
            }
        }
        Ok(config)
    }

    pub fn with_strategy(mut self, strategy: StorageStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_mirror(mut self, mirror: MirrorConfig) -> Self {
        self.mirror = mirror;
        self
    }
}

// Every accessor the site uses, built over shared client and mirror
#[derive(Clone)]
pub struct Agency {
    client: RestClient,
    mirror: LocalMirror,
    pub tours: TourService,
    pub bookings: BookingService,
    pub users: UserService,
    pub translations: TranslationService,
    pub content: ContentService,
}

impl Agency {
    // Real HTTP backend
    pub fn new(config: AgencyConfig) -> Result<Self, ClientError> {
        let client = RestClient::http(config.client.clone())?;
        Self::build(config, client)
    }

    // Any transport, e.g. the in-process mock server
    pub fn with_transport(config: AgencyConfig, transport: Arc<dyn Transport>) -> Result<Self, ClientError> {
        config.client.validate()?;
        let client = RestClient::new(config.client.clone(), transport);
        Self::build(config, client)
    }

    fn build(config: AgencyConfig, client: RestClient) -> Result<Self, ClientError> {
        let store = config
            .mirror
            .open()
            .map_err(|e| ClientError::InitError(format!("local mirror: {}", e)))?;
        let mirror = LocalMirror::new(store);
        let strategy = config.strategy;

        let tours: Repository<Tour> = Repository::from_strategy(strategy, &client, &mirror);

        let agency = Self {
            tours: TourService::new(tours.clone()),
            bookings: BookingService::new(Repository::from_strategy(strategy, &client, &mirror), tours),
            users: UserService::new(Repository::from_strategy(strategy, &client, &mirror), mirror.clone()),
            translations: TranslationService::new(
                client.clone(),
                mirror.clone(),
                strategy,
                Arc::new(I18nStore::new(config.default_language.clone())),
            ),
            content: ContentService::new(
                DocumentStore::new(client.clone(), mirror.clone(), Collection::About, None, strategy),
                DocumentStore::new(client.clone(), mirror.clone(), Collection::Contact, None, strategy),
                Repository::from_strategy(strategy, &client, &mirror),
            ),
            client,
            mirror,
        };

        info!(
            base_url = %agency.client.config().base_url,
            strategy = ?strategy,
            language = %config.default_language,
            "agency data layer ready"
        );
        Ok(agency)
    }

    pub fn client(&self) -> &RestClient {
        &self.client
    }

    pub fn mirror(&self) -> &LocalMirror {
        &self.mirror
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::mock_server::{MockServer, ServerMode};
    use crate::repository::DataSource;
    use serde_json::json;

    #[test]
    fn test_invalid_client_config_is_rejected() {
        let config = AgencyConfig {
            client: ClientConfig::new("localhost"),
            ..Default::default()
        };
        let result = Agency::with_transport(config, Arc::new(MockServer::new()));
        assert!(matches!(result, Err(ClientError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_services_share_one_mirror() {
        let server = Arc::new(MockServer::new());
        server
            .add_collection("tours", vec![json!({"id": 1, "title": "Sahara", "price": 500})])
            .await;
        let agency = Agency::with_transport(AgencyConfig::default(), server.clone()).unwrap();

        agency.tours.list_tours().await.unwrap();
        server.set_mode(ServerMode::CompleteOutage);

        // mirrored by the catalog listing
        let tour = agency.tours.get_tour(&1.into()).await.unwrap();
        assert_eq!(tour.source, DataSource::Mirror);
        assert!(agency.mirror().stats().items_count >= 1);
    }

    #[tokio::test]
    async fn test_local_strategy_never_calls_remote() {
        let server = Arc::new(MockServer::new());
        let config = AgencyConfig::default().with_strategy(StorageStrategy::Local);
        let agency = Agency::with_transport(config, server.clone()).unwrap();

        let listed = agency.tours.list_tours().await.unwrap();
        assert_eq!(listed.source, DataSource::Empty);
        agency.content.about().await.unwrap();
        agency.content.contact().await.unwrap();
        assert_eq!(server.request_count(), 0);
    }
}
