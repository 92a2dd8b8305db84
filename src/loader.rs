// Table reset and batched loading.

use crate::error::StoreError;
use crate::store::TableStore;
use log::{info, warn};
use serde::Serialize;
use std::collections::VecDeque;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Outcome of refreshing a single table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshResult {
    pub table: String,
    pub attempted: usize,
    pub succeeded: usize,
    pub errors: Vec<String>,
}

impl RefreshResult {
    pub fn new(table: &str) -> Self {
        RefreshResult {
            table: table.to_string(),
            attempted: 0,
            succeeded: 0,
            errors: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

pub async fn reset_table(store: &dyn TableStore, table: &str) -> Result<(), StoreError> {
    store.truncate(table).await
}

/// Drains `records` front to back in chunks of `batch_size`, one insert per
/// chunk. A failed chunk is recorded and the next one is still submitted.
pub async fn load_batches<R>(
    store: &dyn TableStore,
    table: &str,
    records: Vec<R>,
    batch_size: usize,
) -> RefreshResult
where
    R: Serialize + Send,
{
    let batch_size = batch_size.max(1);
    let mut result = RefreshResult::new(table);
    result.attempted = records.len();

    let mut pending: VecDeque<R> = records.into();
    let mut batch_number = 0;

    while !pending.is_empty() {
        let take = batch_size.min(pending.len());
        let batch: Vec<R> = pending.drain(..take).collect();
        batch_number += 1;

        let rows = match batch
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!("⚠️  {} batch {}: could not serialize rows: {}", table, batch_number, e);
                result
                    .errors
                    .push(format!("batch {} ({} records): {}", batch_number, take, e));
                continue;
            }
        };

        match store.bulk_insert(table, rows).await {
            Ok(acknowledged) => result.succeeded += acknowledged,
            Err(e) => {
                warn!("⚠️  {} batch {} failed: {}", table, batch_number, e);
                result
                    .errors
                    .push(format!("batch {} ({} records): {}", batch_number, take, e));
            }
        }
    }

    info!(
        "   ✓ {}: {}/{} records loaded in {} batches",
        table, result.succeeded, result.attempted, batch_number
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingStore;
    use serde_json::{json, Value};

    fn numbered(count: usize) -> Vec<Value> {
        (0..count).map(|i| json!({ "n": i })).collect()
    }

    #[tokio::test]
    async fn submits_ceil_l_over_b_batches_in_order() {
        let store = RecordingStore::default();
        let result = load_batches(&store, "shapes", numbered(2501), 1000).await;

        assert_eq!(store.insert_sizes("shapes"), vec![1000, 1000, 501]);
        assert_eq!(result.attempted, 2501);
        assert_eq!(result.succeeded, 2501);
        assert!(result.is_success());

        let stored = store.rows("shapes").await;
        let order: Vec<_> = stored.iter().map(|r| r["n"].as_u64().unwrap()).collect();
        assert_eq!(order, (0..2501).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn exact_multiple_has_no_trailing_batch() {
        let store = RecordingStore::default();
        load_batches(&store, "trips", numbered(6), 3).await;
        assert_eq!(store.insert_sizes("trips"), vec![3, 3]);
    }

    #[tokio::test]
    async fn nothing_to_load_means_no_insert_calls() {
        let store = RecordingStore::default();
        let result = load_batches(&store, "calendar", Vec::<Value>::new(), 1000).await;
        assert!(store.insert_sizes("calendar").is_empty());
        assert_eq!(result, RefreshResult::new("calendar"));
    }

    #[tokio::test]
    async fn failed_batch_does_not_stop_the_rest() {
        let store = RecordingStore::default();
        store.fail_insert_call("trips", 2);

        let result = load_batches(&store, "trips", numbered(25), 10).await;

        assert_eq!(store.insert_sizes("trips"), vec![10, 10, 5]);
        assert_eq!(result.attempted, 25);
        assert_eq!(result.succeeded, 15);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("batch 2 (10 records)"), "{}", result.errors[0]);
        assert_eq!(store.row_count("trips"), 15);
    }

    #[tokio::test]
    async fn zero_batch_size_is_clamped_to_one() {
        let store = RecordingStore::default();
        load_batches(&store, "routes", numbered(3), 0).await;
        assert_eq!(store.insert_sizes("routes"), vec![1, 1, 1]);
    }

    #[tokio::test]
    async fn reset_propagates_store_failures() {
        let store = RecordingStore::default();
        store.fail_truncate("routes");
        assert!(reset_table(&store, "routes").await.is_err());
        assert!(reset_table(&store, "trips").await.is_ok());
        assert_eq!(store.truncated(), vec!["routes", "trips"]);
    }
}
