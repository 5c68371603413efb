//! Bounded memo of date lookups.
//!
//! Historical dates do not change during a run, so entries never expire.
//! Once the bound is reached new results are simply not remembered.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::model::{DateProperty, EntityId};

pub struct DateCache {
    capacity: usize,
    entries: Mutex<HashMap<(EntityId, DateProperty), Option<NaiveDate>>>,
}

impl DateCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// `Some(result)` on a hit; the result itself may be a confirmed absence
    pub fn get(&self, entity: &EntityId, property: DateProperty) -> Option<Option<NaiveDate>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(&(entity.clone(), property)).copied()
    }

    /// Returns false when the cache is full and the entry was dropped
    pub fn insert(&self, entity: &EntityId, property: DateProperty, value: Option<NaiveDate>) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let key = (entity.clone(), property);
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, value);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
