// Shared fixtures for unit tests: in-memory zips, a throwaway feed server and
// a store that records calls and fails on demand.

use crate::error::StoreError;
use crate::store::{MemoryStore, TableStore};
use actix_web::http::StatusCode;
use actix_web::{web, App, HttpResponse, HttpServer};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use zip::write::FileOptions;
use zip::ZipWriter;

pub const ROUTES_TXT: &str = "route_id,agency_id,route_short_name,route_long_name,route_desc,route_type,route_url,route_color,route_text_color\r\n\
901,TBM,A,Tram A,,0,,E1007A,FFFFFF\r\n\
902,TBM,B,Tram B,,0,,C0D22D,000000\r\n";

pub const TRIPS_TXT: &str = "route_id,service_id,trip_id,trip_headsign,direction_id,block_id,shape_id\r\n\
901,WEEK,T1,Le Haillan,0,,S1\r\n\
901,WEEK,T2,Floirac,1,,S2\r\n\
901,SAT,T3,Le Haillan,0,,S1\r\n\
902,WEEK,T4,Pessac,0,,S3\r\n";

pub const SHAPES_TXT: &str = "shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence\r\n\
S1,44.8412,-0.5801,1\r\n\
S1,44.8420,-0.5790,2\r\n\
S2,44.8377,-0.5720,1\r\n\
S3,44.8029,-0.6301,1\r\n\
S3,44.8035,-0.6310,2\r\n";

pub const CALENDAR_TXT: &str = "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\r\n\
WEEK,1,1,1,1,1,0,0,20260101,20261231\r\n\
SAT,0,0,0,0,0,1,0,20260101,20261231\r\n";

pub fn build_zip(members: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in members {
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn full_feed() -> Vec<u8> {
    build_zip(&[
        ("agency.txt", "agency_id,agency_name\r\nTBM,TBM\r\n"),
        ("routes.txt", ROUTES_TXT),
        ("trips.txt", TRIPS_TXT),
        ("shapes.txt", SHAPES_TXT),
        ("calendar.txt", CALENDAR_TXT),
    ])
}

/// Serves `body` with `status` at `/feed.zip` on an ephemeral port and
/// returns the full URL. Must be called from an actix runtime.
pub async fn serve_payload(status: StatusCode, body: Vec<u8>) -> String {
    serve_payload_after(Duration::ZERO, status, body).await
}

/// Like `serve_payload`, but every response is held back for `delay`.
pub async fn serve_payload_after(delay: Duration, status: StatusCode, body: Vec<u8>) -> String {
    let body = web::Bytes::from(body);
    let server = HttpServer::new(move || {
        let body = body.clone();
        App::new().route(
            "/feed.zip",
            web::get().to(move || {
                let body = body.clone();
                async move {
                    if !delay.is_zero() {
                        actix_web::rt::time::sleep(delay).await;
                    }
                    HttpResponse::build(status)
                        .content_type("application/zip")
                        .body(body)
                }
            }),
        )
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();

    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    format!("http://{}/feed.zip", addr)
}

/// `MemoryStore` plus a call log and injectable failures.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    inserts: Mutex<Vec<(String, usize)>>,
    truncates: Mutex<Vec<String>>,
    failing_truncates: Mutex<HashSet<String>>,
    failing_inserts: Mutex<HashSet<(String, usize)>>,
    failing_selects: AtomicBool,
}

impl RecordingStore {
    pub fn fail_truncate(&self, table: &str) {
        self.failing_truncates.lock().unwrap().insert(table.to_string());
    }

    /// `call` counts inserts into `table`, starting at 1.
    pub fn fail_insert_call(&self, table: &str, call: usize) {
        self.failing_inserts
            .lock()
            .unwrap()
            .insert((table.to_string(), call));
    }

    pub fn fail_selects(&self) {
        self.failing_selects.store(true, Ordering::SeqCst);
    }

    pub fn insert_sizes(&self, table: &str) -> Vec<usize> {
        self.inserts
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == table)
            .map(|(_, size)| *size)
            .collect()
    }

    pub fn truncated(&self) -> Vec<String> {
        self.truncates.lock().unwrap().clone()
    }

    pub async fn rows(&self, table: &str) -> Vec<Value> {
        self.inner.select_all(table).await.unwrap()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.inner.row_count(table)
    }
}

#[async_trait]
impl TableStore for RecordingStore {
    async fn truncate(&self, table: &str) -> Result<(), StoreError> {
        self.truncates.lock().unwrap().push(table.to_string());
        if self.failing_truncates.lock().unwrap().contains(table) {
            return Err(StoreError::Status {
                status: 500,
                body: format!("truncate {} refused", table),
            });
        }
        self.inner.truncate(table).await
    }

    async fn bulk_insert(&self, table: &str, rows: Vec<Value>) -> Result<usize, StoreError> {
        let call = {
            let mut inserts = self.inserts.lock().unwrap();
            inserts.push((table.to_string(), rows.len()));
            inserts.iter().filter(|(t, _)| t == table).count()
        };
        if self
            .failing_inserts
            .lock()
            .unwrap()
            .contains(&(table.to_string(), call))
        {
            return Err(StoreError::Status {
                status: 409,
                body: "duplicate key value violates unique constraint".to_string(),
            });
        }
        self.inner.bulk_insert(table, rows).await
    }

    async fn select(&self, table: &str, column: &str, value: &str) -> Result<Vec<Value>, StoreError> {
        if self.failing_selects.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.select(table, column, value).await
    }

    async fn select_all(&self, table: &str) -> Result<Vec<Value>, StoreError> {
        if self.failing_selects.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.select_all(table).await
    }
}
