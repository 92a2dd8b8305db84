// Refresh orchestration: one download, then every table in turn.
//
//   FETCH -> for each table: RESET -> EXTRACT -> PARSE -> LOAD
//
// Only the fetch is fatal. Everything after it is best-effort per table: a
// failed truncate is recorded and the load still runs, a failed table does
// not stop the next one, and nothing is rolled back.

use crate::archive::{fetch_archive, GtfsArchive};
use crate::error::{RefreshError, Result};
use crate::gtfs_models::{GtfsRecord, GtfsTable};
use crate::loader::{load_batches, reset_table, RefreshResult};
use crate::parser::{parse_table, ParseOptions};
use crate::store::TableStore;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use reqwest::Client;
use serde::Serialize;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub feed_url: String,
    pub batch_size: usize,
    pub parse: ParseOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<RefreshResult>,
}

impl RefreshReport {
    pub fn total_loaded(&self) -> usize {
        self.results.iter().map(|r| r.succeeded).sum()
    }

    pub fn failed_tables(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| r.table.as_str())
            .collect()
    }
}

pub struct Refresher {
    client: Client,
    store: Arc<dyn TableStore>,
    settings: RefreshSettings,
    running: tokio::sync::Mutex<()>,
    last_report: Mutex<Option<RefreshReport>>,
}

impl Refresher {
    pub fn new(client: Client, store: Arc<dyn TableStore>, settings: RefreshSettings) -> Self {
        Refresher {
            client,
            store,
            settings,
            running: tokio::sync::Mutex::new(()),
            last_report: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &RefreshSettings {
        &self.settings
    }

    /// Refreshes `tables` from the feed at `source_url`, in the given order.
    ///
    /// Returns one result per table, or a single error if the feed could not
    /// be downloaded or opened (or another refresh is still running), in
    /// which case no table has been touched.
    pub async fn refresh(&self, source_url: &str, tables: &[GtfsTable]) -> Result<Vec<RefreshResult>> {
        let _running = self.running.try_lock().map_err(|_| RefreshError::InProgress)?;

        info!("📥 Downloading GTFS feed from {}", source_url);
        let archive = fetch_archive(&self.client, source_url).await?;
        debug!("archive members: {:?}", archive.member_names());
        let archive = Arc::new(Mutex::new(archive));

        let mut results = Vec::with_capacity(tables.len());
        for &table in tables {
            results.push(self.refresh_table(&archive, table).await);
        }
        Ok(results)
    }

    async fn refresh_table(&self, archive: &Arc<Mutex<GtfsArchive>>, table: GtfsTable) -> RefreshResult {
        let name = table.table_name();
        info!("🔄 Refreshing {}...", name);

        let reset_error = match reset_table(self.store.as_ref(), name).await {
            Ok(()) => None,
            Err(e) => {
                warn!("⚠️  Could not truncate {} ({}), loading anyway", name, e);
                Some(format!("reset: {}", e))
            }
        };

        let mut result = match read_table(archive.clone(), table, self.settings.parse).await {
            Err(e) => {
                warn!("⚠️  Skipping {}: {}", name, e);
                let mut result = RefreshResult::new(name);
                result.errors.push(e);
                result
            }
            Ok(records) => {
                debug!("parsed {} {} records", records.len(), name);
                load_batches(self.store.as_ref(), name, records, self.settings.batch_size).await
            }
        };

        if let Some(error) = reset_error {
            result.errors.insert(0, error);
        }
        result
    }

    /// Refreshes every table from the configured feed and remembers the report.
    pub async fn refresh_all(&self) -> Result<RefreshReport> {
        let started_at = Utc::now();
        let results = self.refresh(&self.settings.feed_url, &GtfsTable::ALL).await?;

        let report = RefreshReport {
            started_at,
            finished_at: Utc::now(),
            results,
        };

        let failed = report.failed_tables();
        if failed.is_empty() {
            info!("✓ Refresh complete: {} rows loaded", report.total_loaded());
        } else {
            warn!(
                "⚠️  Refresh finished with errors in {}: {} rows loaded",
                failed.join(", "),
                report.total_loaded()
            );
        }

        match self.last_report.lock() {
            Ok(mut last) => *last = Some(report.clone()),
            Err(e) => warn!("⚠️  Failed to record refresh report: {}", e),
        }
        Ok(report)
    }

    pub fn last_report(&self) -> Option<RefreshReport> {
        self.last_report.lock().ok().and_then(|last| last.clone())
    }
}

/// Inflates and parses one member on the blocking pool. Errors carry the
/// stage they came from.
async fn read_table(
    archive: Arc<Mutex<GtfsArchive>>,
    table: GtfsTable,
    options: ParseOptions,
) -> std::result::Result<Vec<GtfsRecord>, String> {
    let task = tokio::task::spawn_blocking(move || {
        let text = {
            let mut archive = archive
                .lock()
                .map_err(|e| format!("extract: archive unavailable: {}", e))?;
            archive
                .extract_text(table.file_name())
                .map_err(|e| format!("extract: {}", e))?
        };
        parse_table(&text, table, options).map_err(|e| format!("parse: {}", e))
    });

    task.await
        .map_err(|e| format!("extract: {} task failed: {}", table, e))?
}
