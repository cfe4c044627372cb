// Data layer for the tour agency site: remote REST first, local mirror fallback

// Shared plumbing
pub mod local_mirror;
pub mod models;
pub mod remote;
pub mod repository;

// Accessors
pub mod agency;
pub mod bookings;
pub mod catalog;
pub mod content;
pub mod tours;
pub mod translations;
pub mod users;

// Re-export key types for convenience
pub use agency::{Agency, AgencyConfig};
pub use bookings::{BookingError, BookingService, NewBooking};
pub use catalog::{discounted_price, FilterCriteria, SortOrder};
pub use content::ContentService;
pub use local_mirror::{LocalMirror, MirrorConfig, MirrorError, MirrorStats};
pub use models::{
    AboutContent, BlogPost, Booking, BookingStatus, ContactContent, EntityId, LanguagePack, PaymentStatus, Role,
    Tour, TranslationBundle, User,
};
pub use remote::{ApiError, ClientConfig, ClientError, ClientStats, RestClient};
pub use repository::{AccessError, DataSource, Query, Repository, StorageStrategy, Synced};
pub use tours::TourService;
pub use translations::{I18nStore, TranslationService};
pub use users::{AuthError, NewUser, SessionUser, UserService};
