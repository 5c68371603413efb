//! In-memory store ordered by primary key.
//!
//! Scan semantics follow DynamoDB: `limit` bounds the items *evaluated*,
//! the filter is applied afterwards, and `last_evaluated_key` is reported
//! whenever items remain past the evaluated window. Fault injection hooks let
//! tests simulate partial batch failures and store outages.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::{BatchWriteOutcome, PersonStore, ScanFilter, ScanPage, ScanRequest};
use crate::config::STORE_BATCH_WRITE_LIMIT;
use crate::error::StoreError;
use crate::model::{Item, ItemKey, Subscriber};

#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<BTreeMap<ItemKey, Item>>,
    faults: RwLock<Faults>,
    fail_scans: AtomicBool,
    scan_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    put_calls: AtomicUsize,
}

#[derive(Default)]
struct Faults {
    /// Returned as unprocessed by batch writes
    batch_rejects: HashSet<ItemKey>,
    /// Fail individual puts
    put_failures: HashSet<ItemKey>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from raw items; items without a key are dropped
    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Self {
        let map = items
            .into_iter()
            .filter_map(|item| ItemKey::of_item(&item).map(|k| (k, item)))
            .collect();
        Self {
            items: RwLock::new(map),
            ..Self::default()
        }
    }

    /// All items in key order
    pub async fn snapshot(&self) -> Vec<Item> {
        self.items.read().await.values().cloned().collect()
    }

    pub async fn get(&self, key: &ItemKey) -> Option<Item> {
        self.items.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Leave this item unprocessed whenever it is part of a batch write
    pub async fn reject_in_batch(&self, key: ItemKey) {
        self.faults.write().await.batch_rejects.insert(key);
    }

    /// Fail individual puts of this item
    pub async fn fail_puts_for(&self, key: ItemKey) {
        self.faults.write().await.put_failures.insert(key);
    }

    /// Make every scan return an error until switched off
    pub fn set_scan_failure(&self, fail: bool) {
        self.fail_scans.store(fail, Ordering::SeqCst);
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    fn key_of(item: &Item) -> Result<ItemKey, StoreError> {
        ItemKey::of_item(item).ok_or_else(|| StoreError::InvalidItem {
            key: "<no key>".to_string(),
            reason: "item lacks PK/SK".to_string(),
        })
    }
}

#[async_trait]
impl PersonStore for MemoryStore {
    async fn scan(&self, request: &ScanRequest) -> Result<ScanPage, StoreError> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_scans.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("scan failure injected".to_string()));
        }

        let items = self.items.read().await;
        let lower = match &request.exclusive_start_key {
            Some(key) => Bound::Excluded(key.clone()),
            None => Bound::Unbounded,
        };
        let mut window = items.range((lower, Bound::Unbounded));

        let mut page = ScanPage::default();
        let mut last_key = None;
        for (key, item) in window.by_ref().take(request.limit.max(1)) {
            if request.filter.matches(item) {
                page.items.push(item.clone());
            }
            last_key = Some(key.clone());
        }
        if window.next().is_some() {
            page.last_evaluated_key = last_key;
        }
        Ok(page)
    }

    async fn put_item(&self, item: Item) -> Result<(), StoreError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let key = Self::key_of(&item)?;
        if self.faults.read().await.put_failures.contains(&key) {
            return Err(StoreError::Throttled(format!("put of {key} rejected")));
        }
        self.items.write().await.insert(key, item);
        Ok(())
    }

    async fn batch_write(&self, items: Vec<Item>) -> Result<BatchWriteOutcome, StoreError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if items.len() > STORE_BATCH_WRITE_LIMIT {
            return Err(StoreError::BatchTooLarge(items.len()));
        }

        let faults = self.faults.read().await;
        let mut stored = self.items.write().await;
        let mut outcome = BatchWriteOutcome::default();
        for item in items {
            let key = Self::key_of(&item)?;
            if faults.batch_rejects.contains(&key) {
                outcome.unprocessed.push(item);
            } else {
                stored.insert(key, item);
            }
        }
        Ok(outcome)
    }

    async fn opted_in_subscribers(&self) -> Result<Vec<Subscriber>, StoreError> {
        let filter = ScanFilter::users();
        let items = self.items.read().await;
        Ok(items
            .values()
            .filter(|item| filter.matches(item))
            .filter_map(|item| {
                serde_json::from_value::<Subscriber>(serde_json::Value::Object(item.clone())).ok()
            })
            .filter(Subscriber::is_opted_in)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person(id: &str, dead: bool) -> Item {
        let mut v = json!({"PK": format!("PERSON#{id}"), "SK": "DETAILS", "Name": id});
        if dead {
            v["DeathDate"] = json!("2020-01-01");
        }
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn scan_limit_counts_evaluated_items() {
        let store = MemoryStore::from_items(vec![
            person("a", false),
            person("b", true),
            person("c", false),
            person("d", false),
        ]);
        let request = ScanRequest {
            filter: ScanFilter::pending_persons(),
            exclusive_start_key: None,
            limit: 2,
        };
        let page = store.scan(&request).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.last_evaluated_key, Some(ItemKey::person("b")));

        let next = ScanRequest {
            exclusive_start_key: page.last_evaluated_key,
            ..request
        };
        let page = store.scan(&next).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.last_evaluated_key, None);
    }

    #[tokio::test]
    async fn batch_rejects_are_unprocessed() {
        let store = MemoryStore::new();
        store.reject_in_batch(ItemKey::person("b")).await;
        let outcome = store
            .batch_write(vec![person("a", false), person("b", false)])
            .await
            .unwrap();
        assert_eq!(outcome.unprocessed.len(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn oversized_batches_are_refused() {
        let store = MemoryStore::new();
        let items = (0..26).map(|i| person(&i.to_string(), false)).collect();
        assert!(matches!(
            store.batch_write(items).await,
            Err(StoreError::BatchTooLarge(26))
        ));
    }

    #[tokio::test]
    async fn subscribers_must_be_enabled_and_verified() {
        let users = vec![
            json!({"PK": "USER#1", "SK": "DETAILS", "SmsNotificationsEnabled": true, "PhoneVerified": true}),
            json!({"PK": "USER#2", "SK": "DETAILS", "SmsNotificationsEnabled": true, "PhoneVerified": false}),
            json!({"PK": "USER#3", "SK": "DETAILS"}),
        ];
        let store =
            MemoryStore::from_items(users.into_iter().map(|v| v.as_object().cloned().unwrap()));
        let subs = store.opted_in_subscribers().await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].pk, "USER#1");
    }
}
