//! Typed store operations used by the reconciliation loop

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{ContinuationToken, PersonStore, ScanFilter, ScanRequest};
use crate::config::STORE_BATCH_WRITE_LIMIT;
use crate::error::StoreError;
use crate::model::{ItemKey, PersonRecord, Subscriber};

/// One page of pending records
#[derive(Debug, Clone, Default)]
pub struct PendingPage {
    pub records: Vec<PersonRecord>,
    /// Resume point; `None` once the store is exhausted
    pub next_cursor: Option<ContinuationToken>,
}

/// Outcome of a batch put
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPutReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Ids of records that failed both the batch write and the single put
    pub failed_ids: Vec<String>,
}

impl BatchPutReport {
    pub fn merge(&mut self, other: BatchPutReport) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.failed_ids.extend(other.failed_ids);
    }
}

#[derive(Clone)]
pub struct StoreAdapter {
    store: Arc<dyn PersonStore>,
}

impl StoreAdapter {
    pub fn new(store: Arc<dyn PersonStore>) -> Self {
        Self { store }
    }

    /// Up to `page_size` records without a death date, strictly after `cursor`.
    ///
    /// The raw scan limit counts evaluated items, so raw pages are read until
    /// the page is full or the store is exhausted. Items that fail validation
    /// are logged and skipped.
    pub async fn scan_pending(
        &self,
        page_size: usize,
        cursor: Option<&ContinuationToken>,
    ) -> Result<PendingPage, StoreError> {
        let page_size = page_size.max(1);
        let mut start = cursor.map(ContinuationToken::to_key).transpose()?;
        let mut records = Vec::with_capacity(page_size);
        let mut rounds = 0usize;

        let next_cursor = loop {
            rounds += 1;
            let raw = self
                .store
                .scan(&ScanRequest {
                    filter: ScanFilter::pending_persons(),
                    exclusive_start_key: start.take(),
                    limit: page_size,
                })
                .await?;

            let mut truncated = false;
            for item in raw.items {
                if records.len() == page_size {
                    truncated = true;
                    break;
                }
                match PersonRecord::from_item(&item) {
                    Ok(record) if record.is_pending() => records.push(record),
                    Ok(record) => debug!(person_id = %record.id, "Skipping record with death date"),
                    Err(e) => warn!(error = %e, "Skipping invalid person item"),
                }
            }

            if truncated {
                break records.last().map(Self::cursor_after);
            }
            match raw.last_evaluated_key {
                None => break None,
                Some(key) if records.len() == page_size => {
                    break Some(ContinuationToken::from_key(&key))
                }
                Some(key) => start = Some(key),
            }
        };

        debug!(
            records = records.len(),
            rounds,
            more = next_cursor.is_some(),
            "Scanned pending records"
        );
        Ok(PendingPage {
            records,
            next_cursor,
        })
    }

    /// Token resuming immediately after `record`
    pub fn cursor_after(record: &PersonRecord) -> ContinuationToken {
        ContinuationToken::from_key(&record.key())
    }

    pub async fn put(&self, record: &PersonRecord) -> Result<(), StoreError> {
        self.store.put_item(record.to_item()).await
    }

    /// Write `records` in chunks of at most `min(max_batch_size, 25)`.
    ///
    /// Items the store leaves unprocessed, or every item of a chunk whose
    /// batch call fails, are retried once with a single put.
    pub async fn batch_put(&self, records: &[PersonRecord], max_batch_size: usize) -> BatchPutReport {
        let chunk_size = max_batch_size.clamp(1, STORE_BATCH_WRITE_LIMIT);
        let mut report = BatchPutReport::default();

        for chunk in records.chunks(chunk_size) {
            let items = chunk.iter().map(PersonRecord::to_item).collect();
            let retry: Vec<&PersonRecord> = match self.store.batch_write(items).await {
                Ok(outcome) => {
                    let unprocessed: HashSet<ItemKey> = outcome
                        .unprocessed
                        .iter()
                        .filter_map(ItemKey::of_item)
                        .collect();
                    chunk
                        .iter()
                        .filter(|r| unprocessed.contains(&r.key()))
                        .collect()
                }
                Err(e) => {
                    warn!(error = %e, items = chunk.len(), "Batch write failed, retrying items individually");
                    chunk.iter().collect()
                }
            };

            report.succeeded += chunk.len() - retry.len();
            for record in retry {
                match self.put(record).await {
                    Ok(()) => report.succeeded += 1,
                    Err(e) => {
                        warn!(person_id = %record.id, error = %e, "Individual put failed");
                        report.failed += 1;
                        report.failed_ids.push(record.id.clone());
                    }
                }
            }
        }
        report
    }

    pub async fn opted_in_subscribers(&self) -> Result<Vec<Subscriber>, StoreError> {
        self.store.opted_in_subscribers().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    fn pending(n: usize) -> Vec<PersonRecord> {
        (0..n)
            .map(|i| PersonRecord::new(format!("{i:04}"), format!("Person {i}")))
            .collect()
    }

    fn adapter(records: &[PersonRecord]) -> (Arc<MemoryStore>, StoreAdapter) {
        let store = Arc::new(MemoryStore::from_items(records.iter().map(|r| r.to_item())));
        (store.clone(), StoreAdapter::new(store))
    }

    #[tokio::test]
    async fn sparse_matches_are_gathered_across_raw_pages() {
        let death = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let records: Vec<_> = pending(10)
            .into_iter()
            .enumerate()
            .map(|(i, r)| if i % 3 == 0 { r } else { r.with_death_date(death) })
            .collect();
        let (store, adapter) = adapter(&records);

        let page = adapter.scan_pending(3, None).await.unwrap();
        let ids: Vec<_> = page.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["0000", "0003", "0006"]);
        assert!(store.scan_calls() > 1);

        let rest = adapter
            .scan_pending(3, page.next_cursor.as_ref())
            .await
            .unwrap();
        let ids: Vec<_> = rest.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["0009"]);
        assert!(rest.next_cursor.is_none());
    }

    #[tokio::test]
    async fn cursor_after_resumes_past_record() {
        let records = pending(5);
        let (_, adapter) = adapter(&records);
        let token = StoreAdapter::cursor_after(&records[1]);
        let page = adapter.scan_pending(10, Some(&token)).await.unwrap();
        assert_eq!(page.records.first().map(|r| r.id.as_str()), Some("0002"));
        assert_eq!(page.records.len(), 3);
    }

    #[tokio::test]
    async fn failed_single_put_counts_as_failed() {
        let records = pending(3);
        let (store, adapter) = adapter(&[]);
        store.reject_in_batch(records[0].key()).await;
        store.fail_puts_for(records[0].key()).await;

        let report = adapter.batch_put(&records, 25).await;
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failed_ids, vec!["0000".to_string()]);
    }
}
