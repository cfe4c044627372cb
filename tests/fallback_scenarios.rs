use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use tour_agency_sync::{
    remote::mock_server::{MockServer, ServerMode},
    Agency, AgencyConfig, AuthError, BookingStatus, ClientConfig, DataSource, FilterCriteria, MirrorConfig,
    NewBooking, NewUser, PaymentStatus, Role, SortOrder, StorageStrategy,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn seeded_server() -> Arc<MockServer> {
    let server = Arc::new(MockServer::new());
    server
        .add_collection(
            "tours",
            vec![
                json!({"id": 1, "title": "Sahara Desert Trek", "category": "Adventure", "price": 1000, "discount": 20, "rating": 4.8}),
                json!({"id": 2, "title": "Fes Medina Walk", "category": "Cultural", "price": 80, "rating": 4.5}),
                json!({"id": 3, "title": "Atlas Hike", "category": "Adventure", "price": 850, "discount": 10, "rating": 4.9}),
            ],
        )
        .await;
    server
        .add_collection(
            "translations",
            vec![json!({"id": "en", "resources": {"nav": {"home": "Home"}}})],
        )
        .await;
    server
        .add_document("about", json!({"title": "About us", "mission": "Small groups"}))
        .await;
    server
}

fn travel_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 12, 1).unwrap()
}

#[tokio::test]
async fn test_browse_book_and_cancel_online() {
    init_tracing();
    let server = seeded_server().await;
    let agency = Agency::with_transport(AgencyConfig::default(), server.clone()).unwrap();

    let criteria = FilterCriteria {
        categories: Some(vec!["adventure".to_string()]),
        max_price: Some(800.0),
        ..Default::default()
    };
    let found = agency.tours.search_tours(&criteria, SortOrder::PriceLowToHigh).await.unwrap();
    let titles: Vec<&str> = found.data.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Atlas Hike", "Sahara Desert Trek"]);

    agency
        .users
        .register(NewUser::new("Agent", "agent@agency.test", "pw").with_role(Role::Agent))
        .await
        .unwrap();
    let session = agency.users.login("agent@agency.test", "pw").await.unwrap();
    let user_id = session.id.clone().unwrap();

    let booking = agency
        .bookings
        .create_booking(NewBooking::new(user_id.clone(), 1.into(), 3, travel_date()))
        .await
        .unwrap();
    assert_eq!(booking.source, DataSource::Remote);
    assert_eq!(booking.data.total_price, 2400.0);

    let id = booking.data.id.clone().unwrap();
    let cancelled = agency.bookings.cancel_booking(&id).await.unwrap();
    assert_eq!(cancelled.data.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.data.payment_status, PaymentStatus::Refunded);

    let history = agency.bookings.bookings_for_user(&user_id).await.unwrap();
    assert_eq!(history.data.len(), 1);
    assert_eq!(server.collection("bookings").await[0]["status"], "cancelled");
}

#[tokio::test]
async fn test_outage_serves_last_snapshot_and_accepts_local_writes() {
    init_tracing();
    let server = seeded_server().await;
    let agency = Agency::with_transport(AgencyConfig::default(), server.clone()).unwrap();

    agency.tours.list_tours().await.unwrap();
    agency.translations.load_language("en").await.unwrap();
    agency.content.about().await.unwrap();

    server.set_mode(ServerMode::CompleteOutage);

    let tours = agency.tours.list_tours().await.unwrap();
    assert_eq!(tours.source, DataSource::Mirror);
    assert_eq!(tours.data.len(), 3);

    let about = agency.content.about().await.unwrap();
    assert_eq!(about.source, DataSource::Mirror);
    assert_eq!(about.data.mission, "Small groups");

    let language = agency.translations.load_language("en").await.unwrap();
    assert_eq!(language.source, DataSource::Mirror);
    assert_eq!(agency.translations.t("en", "nav.home"), "Home");

    let booking = agency
        .bookings
        .create_booking(NewBooking::new("guest".into(), 2.into(), 2, travel_date()))
        .await
        .unwrap();
    assert!(booking.is_local_only());
    assert_eq!(booking.data.total_price, 160.0);

    // the remote never saw the offline booking
    server.set_mode(ServerMode::Normal);
    assert!(server.collection("bookings").await.is_empty());
}

#[tokio::test]
async fn test_nothing_anywhere_yields_empty_results() {
    init_tracing();
    let server = Arc::new(MockServer::new());
    server.set_mode(ServerMode::CompleteOutage);
    let agency = Agency::with_transport(AgencyConfig::default(), server.clone()).unwrap();

    let tours = agency.tours.list_tours().await.unwrap();
    assert_eq!(tours.source, DataSource::Empty);
    assert!(tours.data.is_empty());

    let posts = agency.content.list_posts().await.unwrap();
    assert!(posts.data.is_empty());

    let language = agency.translations.load_language("de").await.unwrap();
    assert_eq!(language.source, DataSource::Empty);
    assert_eq!(agency.translations.t("de", "nav.home"), "nav.home");
}

#[tokio::test]
async fn test_prefixed_backend_is_reached_through_alternate_path() {
    init_tracing();
    let server = seeded_server().await;
    server.set_route_prefix("/api").await;
    let agency = Agency::with_transport(AgencyConfig::default(), server.clone()).unwrap();

    let tours = agency.tours.list_tours().await.unwrap();
    assert_eq!(tours.source, DataSource::Remote);
    assert_eq!(agency.client().stats().alternates(), 1);

    // the same layout configured up front needs no alternate attempt
    let config = AgencyConfig {
        client: ClientConfig::default().prefixed_first(true),
        ..Default::default()
    };
    let prefixed = Agency::with_transport(config, server.clone()).unwrap();
    prefixed.tours.list_tours().await.unwrap();
    assert_eq!(prefixed.client().stats().alternates(), 0);
}

#[tokio::test]
async fn test_file_mirror_survives_restart() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let server = seeded_server().await;
    let config = AgencyConfig::default().with_mirror(MirrorConfig::on_disk(dir.path()));

    {
        let agency = Agency::with_transport(config.clone(), server.clone()).unwrap();
        agency.tours.list_tours().await.unwrap();
    }

    server.set_mode(ServerMode::CompleteOutage);
    let restarted = Agency::with_transport(config, server.clone()).unwrap();
    let featured = restarted.tours.featured_tours(1).await.unwrap();
    assert_eq!(featured.source, DataSource::Mirror);
    assert_eq!(featured.data[0].title, "Atlas Hike");
}

#[tokio::test]
async fn test_unapproved_user_waits_for_admin() {
    init_tracing();
    let server = Arc::new(MockServer::new());
    let agency = Agency::with_transport(AgencyConfig::default(), server.clone()).unwrap();

    let user = agency
        .users
        .register(NewUser::new("Sam", "sam@example.com", "pw"))
        .await
        .unwrap();
    assert!(matches!(
        agency.users.login("sam@example.com", "pw").await,
        Err(AuthError::ApprovalPending)
    ));

    agency.users.approve_user(user.data.id.as_ref().unwrap()).await.unwrap();
    let session = agency.users.login("sam@example.com", "pw").await.unwrap();
    assert_eq!(session.role, Role::User);
}

#[tokio::test]
async fn test_local_strategy_keeps_everything_on_device() {
    init_tracing();
    let server = seeded_server().await;
    let config = AgencyConfig::default().with_strategy(StorageStrategy::Local);
    let agency = Agency::with_transport(config, server.clone()).unwrap();

    let created = agency
        .content
        .create_post(tour_agency_sync::BlogPost {
            title: "Packing list".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(created.source, DataSource::Mirror);
    assert_eq!(agency.content.list_posts().await.unwrap().data.len(), 1);
    assert_eq!(server.request_count(), 0);
}
