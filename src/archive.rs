// GTFS zip download and member extraction.

use crate::error::{RefreshError, Result};
use bytes::Bytes;
use log::info;
use reqwest::Client;
use std::io::{Cursor, Read};
use std::time::Duration;
use zip::ZipArchive;

/// An opened GTFS archive, held in memory for the duration of one refresh.
pub struct GtfsArchive {
    archive: ZipArchive<Cursor<Bytes>>,
}

impl GtfsArchive {
    pub fn from_bytes(zip_bytes: Bytes) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(zip_bytes))
            .map_err(|e| RefreshError::ArchiveFormat(format!("Failed to open GTFS zip: {}", e)))?;
        Ok(GtfsArchive { archive })
    }

    pub fn member_names(&self) -> Vec<String> {
        self.archive.file_names().map(String::from).collect()
    }

    /// Reads the whole member as UTF-8 text.
    pub fn extract_text(&mut self, member: &str) -> Result<String> {
        let mut file = self
            .archive
            .by_name(member)
            .map_err(|e| RefreshError::ArchiveFormat(format!("{} not found: {}", member, e)))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| RefreshError::ArchiveFormat(format!("Failed to read {}: {}", member, e)))?;

        Ok(contents)
    }
}

pub fn create_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RefreshError::Network(format!("Failed to create HTTP client: {}", e)))
}

/// Downloads the feed at `url`. The client's timeout bounds the whole request.
pub async fn fetch_archive(client: &Client, url: &str) -> Result<GtfsArchive> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| RefreshError::Network(format!("Failed to download GTFS feed: {}", e)))?;

    if !response.status().is_success() {
        return Err(RefreshError::Network(format!(
            "Download failed with status: {}",
            response.status()
        )));
    }

    let zip_bytes = response
        .bytes()
        .await
        .map_err(|e| RefreshError::Network(format!("Failed to read GTFS zip: {}", e)))?;

    info!("✓ Downloaded {} KB, extracting...", zip_bytes.len() / 1024);

    GtfsArchive::from_bytes(zip_bytes)
}
