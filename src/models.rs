// Domain records shared by every accessor
// All wire names are camelCase to match the mock REST backend

use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fmt,
    hash::{Hash, Hasher},
};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

// Record identifier as the backend hands it out: a JSON number or a string.
// Equality is numeric when both sides parse, so 1 and "1" name the same record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Num(u64),
    Text(String),
}

impl EntityId {
    // Numeric value of the id, also for numeric strings like "42"
    pub fn as_number(&self) -> Option<u64> {
        match self {
            EntityId::Num(n) => Some(*n),
            EntityId::Text(s) => s.trim().parse().ok(),
        }
    }

    // Compare two ids the way the backoffice sorts them:
    // numeric ids by value, numeric ids before text ids, text ids lexically
    pub fn numeric_cmp(&self, other: &EntityId) -> Ordering {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => self.to_string().cmp(&other.to_string()),
        }
    }
}

impl PartialEq for EntityId {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.to_string() == other.to_string(),
            _ => false,
        }
    }
}

impl Eq for EntityId {}

impl Hash for EntityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.as_number() {
            Some(n) => {
                0u8.hash(state);
                n.hash(state);
            }
            None => {
                1u8.hash(state);
                self.to_string().hash(state);
            }
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Num(n) => write!(f, "{}", n),
            EntityId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        EntityId::Num(value)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        EntityId::Text(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        EntityId::Text(value)
    }
}

// Logical collections known to the backend and the mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Tours,
    Bookings,
    Users,
    BlogPosts,
    About,
    Contact,
    Translations,
}

impl Collection {
    // REST path segment, also used as the mirror key
    pub fn path(&self) -> &'static str {
        match self {
            Collection::Tours => "tours",
            Collection::Bookings => "bookings",
            Collection::Users => "users",
            Collection::BlogPosts => "blogPosts",
            Collection::About => "about",
            Collection::Contact => "contact",
            Collection::Translations => "translations",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

// How a locally created record gets its id when the remote is down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdStrategy {
    // max(existing numeric ids) + 1
    Sequential,
    // current unix time in milliseconds
    Timestamp,
}

// A record stored in one of the collections
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: Collection;
    const LOCAL_IDS: IdStrategy = IdStrategy::Sequential;

    fn id(&self) -> Option<&EntityId>;
    fn set_id(&mut self, id: EntityId);
}

macro_rules! impl_record {
    ($ty:ty, $collection:expr) => {
        impl_record!($ty, $collection, IdStrategy::Sequential);
    };
    ($ty:ty, $collection:expr, $ids:expr) => {
        impl Record for $ty {
            const COLLECTION: Collection = $collection;
            const LOCAL_IDS: IdStrategy = $ids;

            fn id(&self) -> Option<&EntityId> {
                self.id.as_ref()
            }

            fn set_id(&mut self, id: EntityId) {
                self.id = Some(id);
            }
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tour {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub title: String,
    pub description: String,
    pub image: String,
    pub location: String,
    // e.g. "7 days"
    pub duration: String,
    pub group_size: u32,
    pub category: String,
    pub rating: f64,
    pub review_count: u32,
    pub price: f64,
    // percent, 0..=100
    pub discount: f64,
    pub included: Vec<String>,
    pub highlights: Vec<String>,
}

impl_record!(Tour, Collection::Tours);

impl Tour {
    // Leading number of the free-form duration ("7 days" -> 7)
    pub fn duration_days(&self) -> Option<u32> {
        self.duration
            .split(|c: char| !c.is_ascii_digit())
            .find(|part| !part.is_empty())
            .and_then(|digits| digits.parse().ok())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub user_id: EntityId,
    pub tour_id: EntityId,
    pub booking_number: String,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    pub persons: u32,
    pub total_price: f64,
    pub travel_date: NaiveDate,
    pub booking_date: DateTime<Utc>,
    // snapshot of the tour at booking time
    #[serde(default)]
    pub tour_title: String,
    #[serde(default)]
    pub tour_image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_requests: Option<String>,
}

impl_record!(Booking, Collection::Bookings, IdStrategy::Timestamp);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Agent,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::User => "user",
            Role::Agent => "agent",
            Role::Admin => "admin",
        };
        f.write_str(name)
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
    pub email: String,
    // Argon2 PHC string, kept under the backend's field name
    #[serde(rename = "password")]
    pub password_hash: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub is_approved: bool,
}

impl_record!(User, Collection::Users);

impl User {
    // Only regular users wait for approval
    pub fn can_log_in(&self) -> bool {
        self.role != Role::User || self.is_approved
    }
}

// Hand-written so hashes never end up in logs
impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("is_approved", &self.is_approved)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlogPost {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub image: String,
    pub author: String,
    pub category: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl_record!(BlogPost, Collection::BlogPosts);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamMember {
    pub name: String,
    pub position: String,
    pub image: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AboutContent {
    pub title: String,
    pub body: String,
    pub mission: String,
    pub image: String,
    pub team: Vec<TeamMember>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactContent {
    pub address: String,
    pub phone: String,
    pub email: String,
    pub opening_hours: String,
    pub map_url: String,
}

// One node of a nested translation tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TranslationEntry {
    Text(String),
    Group(BTreeMap<String, TranslationEntry>),
}

// Nested key -> string mapping for one language
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranslationBundle(pub BTreeMap<String, TranslationEntry>);

impl TranslationBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    // Look up a dotted key such as "nav.home"
    pub fn get(&self, key: &str) -> Option<&str> {
        let mut parts = key.split('.');
        let mut node = self.0.get(parts.next()?)?;
        for part in parts {
            match node {
                TranslationEntry::Group(children) => node = children.get(part)?,
                TranslationEntry::Text(_) => return None,
            }
        }
        match node {
            TranslationEntry::Text(text) => Some(text),
            TranslationEntry::Group(_) => None,
        }
    }

    // Set a dotted key, creating groups on the way.
    // A text leaf in the middle of the path is replaced by a group.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let parts: Vec<&str> = key.split('.').filter(|p| !p.is_empty()).collect();
        let Some((last, parents)) = parts.split_last() else {
            return;
        };

        let mut level = &mut self.0;
        for part in parents {
            let entry = level
                .entry(part.to_string())
                .or_insert_with(|| TranslationEntry::Group(BTreeMap::new()));
            if let TranslationEntry::Text(_) = entry {
                *entry = TranslationEntry::Group(BTreeMap::new());
            }
            level = match entry {
                TranslationEntry::Group(children) => children,
                TranslationEntry::Text(_) => return,
            };
        }
        level.insert(last.to_string(), TranslationEntry::Text(value.into()));
    }

    // Flat list of (dotted key, text), sorted by key
    pub fn flatten(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, map: &BTreeMap<String, TranslationEntry>, out: &mut Vec<(String, String)>) {
            for (key, entry) in map {
                let full = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                match entry {
                    TranslationEntry::Text(text) => out.push((full, text.clone())),
                    TranslationEntry::Group(children) => walk(&full, children, out),
                }
            }
        }

        let mut out = Vec::new();
        walk("", &self.0, &mut out);
        out
    }
}

// Remote/mirrored document for one language: `translations/<lang>`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LanguagePack {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub resources: TranslationBundle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_accepts_numbers_and_strings() {
        let ids: Vec<EntityId> = serde_json::from_str(r#"[3, "12", "abc"]"#).unwrap();
        assert_eq!(ids[0], EntityId::Num(3));
        assert_eq!(ids[1].as_number(), Some(12));
        assert_eq!(ids[2].as_number(), None);

        assert_eq!(ids[1].numeric_cmp(&ids[0]), Ordering::Greater);
        assert_eq!(ids[1], EntityId::Num(12));
        assert_eq!(EntityId::from(" 7"), EntityId::Num(7));
        assert_ne!(ids[2], EntityId::Text("ABC".to_string()));

        let unique: std::collections::HashSet<EntityId> =
            [EntityId::Num(12), ids[1].clone(), ids[2].clone()].into_iter().collect();
        assert_eq!(unique.len(), 2);
        assert_eq!(ids[2].numeric_cmp(&ids[0]), Ordering::Less);
    }

    #[test]
    fn test_tour_wire_format_is_camel_case() {
        let json = r#"{
            "id": 1,
            "title": "Sahara Trek",
            "groupSize": 12,
            "reviewCount": 40,
            "price": 1000,
            "discount": 20,
            "duration": "7 days"
        }"#;
        let tour: Tour = serde_json::from_str(json).unwrap();
        assert_eq!(tour.group_size, 12);
        assert_eq!(tour.review_count, 40);
        assert_eq!(tour.duration_days(), Some(7));
        assert!(tour.included.is_empty());

        let back = serde_json::to_value(&tour).unwrap();
        assert_eq!(back["groupSize"], 12);
    }

    #[test]
    fn test_user_password_field_and_approval_gate() {
        let json = r#"{"id":"u1","name":"Ana","email":"ana@example.com","password":"$argon2id$x","role":"user","isApproved":false}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.password_hash, "$argon2id$x");
        assert!(!user.can_log_in());
        assert!(!format!("{:?}", user).contains("argon2"));

        let agent = User { role: Role::Agent, ..user.clone() };
        assert!(agent.can_log_in());
    }

    #[test]
    fn test_translation_bundle_dotted_keys() {
        let mut bundle: TranslationBundle =
            serde_json::from_str(r#"{"nav":{"home":"Home","tours":"Tours"},"title":"Welcome"}"#).unwrap();

        assert_eq!(bundle.get("nav.home"), Some("Home"));
        assert_eq!(bundle.get("title"), Some("Welcome"));
        assert_eq!(bundle.get("nav"), None);
        assert_eq!(bundle.get("title.sub"), None);

        bundle.set("footer.links.about", "About us");
        bundle.set("title.sub", "Sub");
        assert_eq!(bundle.get("footer.links.about"), Some("About us"));
        assert_eq!(bundle.get("title.sub"), Some("Sub"));

        let keys: Vec<String> = bundle.flatten().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec!["footer.links.about", "nav.home", "nav.tours", "title.sub"]
        );
    }
}
