// Table store access.
//
// The refresh pipeline and the read endpoints only see `TableStore`. The
// production backend is a PostgREST API (Supabase); `MemoryStore` keeps rows
// in process for local runs without a database.

use crate::error::StoreError;
use crate::gtfs_models::GtfsTable;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Duration;

#[async_trait]
pub trait TableStore: Send + Sync {
    /// Deletes every row of `table`.
    async fn truncate(&self, table: &str) -> Result<(), StoreError>;

    /// Inserts `rows` and returns how many the store acknowledged.
    async fn bulk_insert(&self, table: &str, rows: Vec<Value>) -> Result<usize, StoreError>;

    /// Rows whose `column` equals `value` exactly.
    async fn select(&self, table: &str, column: &str, value: &str) -> Result<Vec<Value>, StoreError>;

    async fn select_all(&self, table: &str) -> Result<Vec<Value>, StoreError>;
}

// ============================================================================
// PostgREST backend
// ============================================================================

pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(RestStore {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Union of the keys across `rows`, comma separated. PostgREST rejects a
    /// bulk insert whose objects differ in keys unless the target columns are
    /// listed; omitted ones then take their column default.
    fn column_list(rows: &[Value]) -> Option<String> {
        let columns: BTreeSet<&str> = rows
            .iter()
            .filter_map(Value::as_object)
            .flat_map(|row| row.keys().map(String::as_str))
            .collect();
        (!columns.is_empty()).then(|| columns.into_iter().collect::<Vec<_>>().join(","))
    }

    async fn rows(response: Response) -> Result<Vec<Value>, StoreError> {
        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TableStore for RestStore {
    async fn truncate(&self, table: &str) -> Result<(), StoreError> {
        // PostgREST refuses unfiltered deletes; the key column is never null.
        let key = table
            .parse::<GtfsTable>()
            .map_err(StoreError::UnknownTable)?
            .key_column();

        let response = self
            .request(Method::DELETE, table)
            .query(&[(key, "not.is.null")])
            .send()
            .await?;
        Self::check(response).await?;
        debug!("truncated {}", table);
        Ok(())
    }

    async fn bulk_insert(&self, table: &str, rows: Vec<Value>) -> Result<usize, StoreError> {
        let mut request = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation");
        if let Some(columns) = Self::column_list(&rows) {
            request = request.query(&[("columns", columns)]);
        }

        let response = request.json(&rows).send().await?;
        let inserted = Self::rows(Self::check(response).await?).await?;
        Ok(inserted.len())
    }

    async fn select(&self, table: &str, column: &str, value: &str) -> Result<Vec<Value>, StoreError> {
        let filter = format!("eq.{}", value);
        let response = self
            .request(Method::GET, table)
            .query(&[("select", "*"), (column, filter.as_str())])
            .send()
            .await?;
        Self::rows(Self::check(response).await?).await
    }

    async fn select_all(&self, table: &str) -> Result<Vec<Value>, StoreError> {
        let response = self
            .request(Method::GET, table)
            .query(&[("select", "*")])
            .send()
            .await?;
        Self::rows(Self::check(response).await?).await
    }
}

// ============================================================================
// In-process backend
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tables<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Vec<Value>>) -> T,
    ) -> Result<T, StoreError> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("Failed to lock table store: {}", e)))?;
        Ok(f(&mut tables))
    }

    #[cfg(test)]
    pub fn row_count(&self, table: &str) -> usize {
        self.with_tables(|tables| tables.get(table).map_or(0, Vec::len))
            .unwrap_or_default()
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn truncate(&self, table: &str) -> Result<(), StoreError> {
        self.with_tables(|tables| {
            tables.remove(table);
        })
    }

    async fn bulk_insert(&self, table: &str, rows: Vec<Value>) -> Result<usize, StoreError> {
        self.with_tables(|tables| {
            let count = rows.len();
            tables.entry(table.to_string()).or_default().extend(rows);
            count
        })
    }

    async fn select(&self, table: &str, column: &str, value: &str) -> Result<Vec<Value>, StoreError> {
        self.with_tables(|tables| {
            tables
                .get(table)
                .map(|rows| {
                    rows.iter()
                        .filter(|row| row.get(column).and_then(Value::as_str) == Some(value))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    async fn select_all(&self, table: &str) -> Result<Vec<Value>, StoreError> {
        self.with_tables(|tables| tables.get(table).cloned().unwrap_or_default())
    }
}
