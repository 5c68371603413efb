//! Store adapter behaviour over the in-memory and JSON-file stores

mod helpers;

use std::collections::HashSet;
use std::sync::Arc;

use helpers::*;
use status_checker::model::PersonRecord;
use status_checker::store::{JsonFileStore, MemoryStore, StoreAdapter};

fn adapter_over(records: &[PersonRecord]) -> (Arc<MemoryStore>, StoreAdapter) {
    let store = Arc::new(MemoryStore::from_items(items(records)));
    let adapter = StoreAdapter::new(store.clone());
    (store, adapter)
}

#[tokio::test]
async fn batch_put_issues_one_call_per_chunk() {
    let records = pending_people(60);
    let (store, adapter) = adapter_over(&[]);

    let report = adapter.batch_put(&records, 25).await;

    assert_eq!(store.batch_calls(), 3);
    assert_eq!(store.put_calls(), 0);
    assert_eq!(report.succeeded, 60);
    assert_eq!(report.failed, 0);
    assert_eq!(store.len().await, 60);
}

#[tokio::test]
async fn oversized_batch_setting_is_clamped_to_store_limit() {
    let records = pending_people(51);
    let (store, adapter) = adapter_over(&[]);

    let report = adapter.batch_put(&records, 100).await;

    assert_eq!(store.batch_calls(), 3);
    assert_eq!(report.succeeded, 51);
}

#[tokio::test]
async fn rejected_item_retried_individually_counts_as_succeeded() {
    let records = pending_people(10);
    let (store, adapter) = adapter_over(&[]);
    store.reject_in_batch(records[4].key()).await;

    let report = adapter.batch_put(&records, 25).await;

    assert_eq!(store.batch_calls(), 1);
    assert_eq!(store.put_calls(), 1);
    assert_eq!(report.succeeded, 10);
    assert_eq!(report.failed, 0);
    assert!(report.failed_ids.is_empty());
    assert!(store.get(&records[4].key()).await.is_some());
}

#[tokio::test]
async fn paging_with_tokens_covers_pending_records_exactly_once() {
    let death = d(2020, 1, 1);
    let records: Vec<PersonRecord> = pending_people(47)
        .into_iter()
        .enumerate()
        .map(|(i, r)| if i % 4 == 1 { r.with_death_date(death) } else { r })
        .collect();
    let mut stored = items(&records);
    stored.push(subscriber_item("1", true, true));
    let store = Arc::new(MemoryStore::from_items(stored));
    let adapter = StoreAdapter::new(store);

    let mut seen = Vec::new();
    let mut cursor = None;
    loop {
        let page = adapter.scan_pending(5, cursor.as_ref()).await.unwrap();
        assert!(page.records.len() <= 5);
        assert!(page.records.iter().all(|r| r.death_date.is_none()));
        seen.extend(page.records.into_iter().map(|r| r.id));
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    let expected: Vec<String> = records
        .iter()
        .filter(|r| r.is_pending())
        .map(|r| r.id.clone())
        .collect();
    let unique: HashSet<&String> = seen.iter().collect();
    assert_eq!(unique.len(), seen.len());
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn invalid_items_are_skipped() {
    let mut stored = items(&pending_people(3));
    stored.push(
        serde_json::json!({"PK": "PERSON#0001x", "SK": "DETAILS", "WikiID": "banana"})
            .as_object()
            .cloned()
            .unwrap(),
    );
    let adapter = StoreAdapter::new(Arc::new(MemoryStore::from_items(stored)));

    let page = adapter.scan_pending(10, None).await.unwrap();
    let ids: Vec<_> = page.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["0000", "0001", "0002"]);
}

#[tokio::test]
async fn json_table_persists_enrichment_results() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table.json");

    let table = Arc::new(JsonFileStore::open(&path).await.unwrap());
    let adapter = StoreAdapter::new(table);
    let records = vec![PersonRecord::new("x", "Jane Doe").with_page_title("Jane_Doe")];
    let report = adapter.batch_put(&records, 25).await;
    assert_eq!(report.succeeded, 1);

    let mut written = records[0].clone();
    written.death_date = Some(d(2024, 3, 5));
    adapter.put(&written).await.unwrap();

    let reopened = JsonFileStore::open(&path).await.unwrap();
    let item = reopened.inner().snapshot().await.remove(0);
    let record = PersonRecord::from_item(&item).unwrap();
    assert_eq!(record.death_date, Some(d(2024, 3, 5)));
    assert_eq!(record.page_title.as_deref(), Some("Jane_Doe"));
}
