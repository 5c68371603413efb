//! Typed person records and the raw store items they are validated from.
//!
//! Store items arrive as loosely-typed JSON maps (`PK`, `SK`, `Name`,
//! `WikiPage`, ...). They are converted to [`PersonRecord`] at the store
//! adapter boundary; attributes this crate does not model ride along in
//! `extra` so a full-item put never drops them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::StoreError;

/// Raw store item (attribute name → value)
pub type Item = serde_json::Map<String, Value>;

pub const PERSON_PREFIX: &str = "PERSON#";
pub const USER_PREFIX: &str = "USER#";
pub const DETAILS_SK: &str = "DETAILS";

pub const ATTR_PK: &str = "PK";
pub const ATTR_SK: &str = "SK";
pub const ATTR_NAME: &str = "Name";
pub const ATTR_WIKI_PAGE: &str = "WikiPage";
pub const ATTR_WIKI_ID: &str = "WikiID";
pub const ATTR_BIRTH_DATE: &str = "BirthDate";
pub const ATTR_DEATH_DATE: &str = "DeathDate";
pub const ATTR_AGE: &str = "Age";

/// Primary key of a store item
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    #[serde(rename = "PK")]
    pub pk: String,
    #[serde(rename = "SK")]
    pub sk: String,
}

impl ItemKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }

    /// Key of a person's details item
    pub fn person(id: &str) -> Self {
        Self::new(format!("{PERSON_PREFIX}{id}"), DETAILS_SK)
    }

    /// Extract the key attributes of a raw item
    pub fn of_item(item: &Item) -> Option<Self> {
        let pk = item.get(ATTR_PK)?.as_str()?;
        let sk = item.get(ATTR_SK)?.as_str()?;
        Some(Self::new(pk, sk))
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pk, self.sk)
    }
}

/// Wikidata entity identifier (e.g. `Q12345`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Accepts `Q` followed by one or more digits
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let digits = raw.strip_prefix('Q').or_else(|| raw.strip_prefix('q'))?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some(Self(format!("Q{digits}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Date-valued Wikidata properties the checker reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DateProperty {
    Birth,
    Death,
}

impl DateProperty {
    /// Wikidata property id
    pub fn property_id(self) -> &'static str {
        match self {
            Self::Birth => "P569",
            Self::Death => "P570",
        }
    }
}

impl fmt::Display for DateProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Birth => write!(f, "birth"),
            Self::Death => write!(f, "death"),
        }
    }
}

/// A person tracked by the checker
#[derive(Debug, Clone, PartialEq)]
pub struct PersonRecord {
    /// Opaque id (partition key without the `PERSON#` prefix)
    pub id: String,
    pub name: String,
    pub page_title: Option<String>,
    pub entity_id: Option<EntityId>,
    pub birth_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
    pub age: Option<u32>,
    /// Attributes not modelled here, preserved across writes
    pub extra: BTreeMap<String, Value>,
}

impl PersonRecord {
    /// A freshly created record with only a name
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            page_title: None,
            entity_id: None,
            birth_date: None,
            death_date: None,
            age: None,
            extra: BTreeMap::new(),
        }
    }

    /// A new record with a random id
    pub fn with_random_id(name: impl Into<String>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), name)
    }

    pub fn with_page_title(mut self, title: impl Into<String>) -> Self {
        self.page_title = Some(title.into());
        self
    }

    pub fn with_entity_id(mut self, id: EntityId) -> Self {
        self.entity_id = Some(id);
        self
    }

    pub fn with_death_date(mut self, date: NaiveDate) -> Self {
        self.death_date = Some(date);
        self
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::person(&self.id)
    }

    /// Pending records are the ones still lacking a death date
    pub fn is_pending(&self) -> bool {
        self.death_date.is_none()
    }

    /// Validate a raw store item into a typed record
    pub fn from_item(item: &Item) -> Result<Self, StoreError> {
        let key = ItemKey::of_item(item)
            .map(|k| k.to_string())
            .unwrap_or_else(|| "<no key>".to_string());
        let raw: PersonItem = serde_json::from_value(Value::Object(item.clone())).map_err(|e| {
            StoreError::InvalidItem {
                key: key.clone(),
                reason: e.to_string(),
            }
        })?;

        let id = raw
            .pk
            .strip_prefix(PERSON_PREFIX)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| StoreError::InvalidItem {
                key: key.clone(),
                reason: "partition key is not a person key".to_string(),
            })?
            .to_string();

        let entity_id = match raw.wiki_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(EntityId::parse(s).ok_or_else(|| StoreError::InvalidItem {
                key: key.clone(),
                reason: format!("malformed WikiID {s:?}"),
            })?),
        };

        Ok(Self {
            id,
            name: raw.name,
            page_title: raw.wiki_page.filter(|p| !p.trim().is_empty()),
            entity_id,
            birth_date: raw.birth_date,
            death_date: raw.death_date,
            age: raw.age,
            extra: raw.extra,
        })
    }

    /// Render the record back into a full store item
    pub fn to_item(&self) -> Item {
        let raw = PersonItem {
            pk: format!("{PERSON_PREFIX}{}", self.id),
            sk: DETAILS_SK.to_string(),
            name: self.name.clone(),
            wiki_page: self.page_title.clone(),
            wiki_id: self.entity_id.as_ref().map(|e| e.to_string()),
            birth_date: self.birth_date,
            death_date: self.death_date,
            age: self.age,
            extra: self.extra.clone(),
        };
        match serde_json::to_value(raw) {
            Ok(Value::Object(map)) => map,
            // PersonItem always serializes to an object
            _ => Item::new(),
        }
    }
}

/// Wire shape of a person item
#[derive(Debug, Serialize, Deserialize)]
struct PersonItem {
    #[serde(rename = "PK")]
    pk: String,
    #[serde(rename = "SK")]
    sk: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "WikiPage", default, skip_serializing_if = "Option::is_none")]
    wiki_page: Option<String>,
    #[serde(rename = "WikiID", default, skip_serializing_if = "Option::is_none")]
    wiki_id: Option<String>,
    #[serde(
        rename = "BirthDate",
        default,
        skip_serializing_if = "Option::is_none",
        with = "lenient_date"
    )]
    birth_date: Option<NaiveDate>,
    #[serde(
        rename = "DeathDate",
        default,
        skip_serializing_if = "Option::is_none",
        with = "lenient_date"
    )]
    death_date: Option<NaiveDate>,
    #[serde(rename = "Age", default, skip_serializing_if = "Option::is_none")]
    age: Option<u32>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

/// Dates are written as `YYYY-MM-DD`; older items may hold full ISO
/// timestamps, so only the leading date part is read.
mod lenient_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => s.serialize_str(&d.format("%Y-%m-%d").to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => {
                let head = s.get(..10).unwrap_or(s);
                NaiveDate::parse_from_str(head, "%Y-%m-%d")
                    .map(Some)
                    .map_err(serde::de::Error::custom)
            }
        }
    }
}

/// A user who may receive SMS notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    #[serde(rename = "PK")]
    pub pk: String,
    #[serde(rename = "PhoneNumber", default)]
    pub phone_number: Option<String>,
    #[serde(rename = "SmsNotificationsEnabled", default)]
    pub sms_enabled: bool,
    #[serde(rename = "PhoneVerified", default)]
    pub phone_verified: bool,
}

impl Subscriber {
    pub fn is_opted_in(&self) -> bool {
        self.sms_enabled && self.phone_verified
    }
}
