//! Record store abstraction
//!
//! `PersonStore` is the raw key-value surface (filtered scan with an
//! exclusive start key, single put, bounded batch write). `StoreAdapter`
//! builds the checker's operations on top of it: typed pending scans with
//! opaque continuation tokens and batch puts with per-item retry.
//! Implementations can target a local JSON document (CLI) or memory (tests).

pub mod adapter;
pub mod file;
pub mod memory;
pub mod token;

pub use adapter::{BatchPutReport, PendingPage, StoreAdapter};
pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use token::ContinuationToken;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{
    Item, ItemKey, Subscriber, ATTR_DEATH_DATE, ATTR_PK, ATTR_SK, DETAILS_SK, PERSON_PREFIX,
    USER_PREFIX,
};

/// Server-side scan predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFilter {
    pub pk_prefix: String,
    pub sk_equals: String,
    /// Attribute that must be absent (or null)
    pub absent_attribute: Option<String>,
}

impl ScanFilter {
    /// `begins_with(PK, PERSON#) AND SK = DETAILS AND attribute_not_exists(DeathDate)`
    pub fn pending_persons() -> Self {
        Self {
            pk_prefix: PERSON_PREFIX.to_string(),
            sk_equals: DETAILS_SK.to_string(),
            absent_attribute: Some(ATTR_DEATH_DATE.to_string()),
        }
    }

    /// `begins_with(PK, USER#) AND SK = DETAILS`
    pub fn users() -> Self {
        Self {
            pk_prefix: USER_PREFIX.to_string(),
            sk_equals: DETAILS_SK.to_string(),
            absent_attribute: None,
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        let pk_ok = item
            .get(ATTR_PK)
            .and_then(|v| v.as_str())
            .is_some_and(|pk| pk.starts_with(&self.pk_prefix));
        let sk_ok = item
            .get(ATTR_SK)
            .and_then(|v| v.as_str())
            .is_some_and(|sk| sk == self.sk_equals);
        let absent_ok = self
            .absent_attribute
            .as_ref()
            .map_or(true, |attr| item.get(attr).map_or(true, |v| v.is_null()));
        pk_ok && sk_ok && absent_ok
    }
}

#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub filter: ScanFilter,
    pub exclusive_start_key: Option<ItemKey>,
    /// Items evaluated (not matched) per call, as with a DynamoDB `Limit`
    pub limit: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub items: Vec<Item>,
    /// Set when the scan stopped before the end of the table
    pub last_evaluated_key: Option<ItemKey>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchWriteOutcome {
    /// Items the store did not accept (throughput limits and the like)
    pub unprocessed: Vec<Item>,
}

/// Raw key-value store operations
#[async_trait]
pub trait PersonStore: Send + Sync {
    /// One scan call; at most `limit` items are evaluated
    async fn scan(&self, request: &ScanRequest) -> Result<ScanPage, StoreError>;

    /// Write a full item, replacing any existing item with the same key
    async fn put_item(&self, item: Item) -> Result<(), StoreError>;

    /// Write up to `STORE_BATCH_WRITE_LIMIT` items in one call
    async fn batch_write(&self, items: Vec<Item>) -> Result<BatchWriteOutcome, StoreError>;

    /// Users with SMS enabled and a verified phone
    async fn opted_in_subscribers(&self) -> Result<Vec<Subscriber>, StoreError>;
}
