//! Shared fixtures for the integration tests
//!
//! `Harness` wires a reconciler to in-memory collaborators (store, knowledge
//! source, notification transport, self-invoker) so each test can inspect
//! what the loop did.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;

use status_checker::config::CheckerConfig;
use status_checker::knowledge::FixtureKnowledge;
use status_checker::model::{Item, ItemKey, PersonRecord};
use status_checker::notify::{DeathNotifier, MemoryTransport};
use status_checker::reconcile::{RecordingInvoker, Reconciler};
use status_checker::store::{MemoryStore, StoreAdapter};

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn today() -> NaiveDate {
    d(2024, 6, 1)
}

/// Loop settings with pacing disabled and a notification topic set
pub fn config(page_size: usize, max_items: usize) -> CheckerConfig {
    let mut config = CheckerConfig {
        page_size,
        max_items_per_invocation: max_items,
        sub_batch_size: 10,
        pacing_min_ms: 0,
        pacing_max_ms: 0,
        ..Default::default()
    };
    config.notify.topic = Some("deaths".to_string());
    config
}

/// `n` pending people with zero-padded ids so key order matches index order
pub fn pending_people(n: usize) -> Vec<PersonRecord> {
    (0..n)
        .map(|i| PersonRecord::new(format!("{i:04}"), format!("Person {i}")))
        .collect()
}

/// A knowledge source that knows every `Person {i}` for `i < n`, all alive
pub fn knowledge_for_people(n: usize) -> FixtureKnowledge {
    (0..n).fold(FixtureKnowledge::new(), |k, i| {
        let entity = format!("Q{}", 1000 + i);
        k.with_title(&format!("Person_{i}"), &entity)
            .with_entity(&entity, Some(d(1950, 1, 1)), None)
    })
}

pub fn items(records: &[PersonRecord]) -> Vec<Item> {
    records.iter().map(PersonRecord::to_item).collect()
}

pub fn subscriber_item(id: &str, enabled: bool, verified: bool) -> Item {
    json!({
        "PK": format!("USER#{id}"),
        "SK": "DETAILS",
        "PhoneNumber": "+15550100",
        "SmsNotificationsEnabled": enabled,
        "PhoneVerified": verified
    })
    .as_object()
    .cloned()
    .unwrap()
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub adapter: StoreAdapter,
    pub knowledge: Arc<FixtureKnowledge>,
    pub transport: Arc<MemoryTransport>,
    pub invoker: Arc<RecordingInvoker>,
    pub reconciler: Reconciler,
}

impl Harness {
    pub fn new(items: Vec<Item>, knowledge: FixtureKnowledge, config: &CheckerConfig) -> Self {
        Self::with_transport(items, knowledge, config, MemoryTransport::new())
    }

    pub fn with_transport(
        items: Vec<Item>,
        knowledge: FixtureKnowledge,
        config: &CheckerConfig,
        transport: MemoryTransport,
    ) -> Self {
        let store = Arc::new(MemoryStore::from_items(items));
        let adapter = StoreAdapter::new(store.clone());
        let knowledge = Arc::new(knowledge);
        let transport = Arc::new(transport);
        let invoker = Arc::new(RecordingInvoker::new());

        let notifier = DeathNotifier::new(
            config.notify.topic.clone(),
            transport.clone(),
            Arc::new(adapter.clone()),
        );
        let reconciler = Reconciler::new(adapter.clone(), knowledge.clone(), notifier, config)
            .with_invoker(invoker.clone())
            .with_today(today());

        Self {
            store,
            adapter,
            knowledge,
            transport,
            invoker,
            reconciler,
        }
    }

    pub async fn record(&self, id: &str) -> PersonRecord {
        let item = self
            .store
            .get(&ItemKey::person(id))
            .await
            .unwrap_or_else(|| panic!("no record {id}"));
        PersonRecord::from_item(&item).unwrap()
    }

    /// Ids of people that already carry an entity id
    pub async fn resolved_ids(&self) -> Vec<String> {
        self.store
            .snapshot()
            .await
            .iter()
            .filter_map(|item| PersonRecord::from_item(item).ok())
            .filter(|r| r.entity_id.is_some())
            .map(|r| r.id)
            .collect()
    }
}
