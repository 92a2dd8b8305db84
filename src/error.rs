// ============================================================================
// Error Handling
// ============================================================================

use thiserror::Error;

/// Fatal errors of a refresh pass. Anything here aborts the whole refresh
/// before a single table is touched.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Archive format error: {0}")]
    ArchiveFormat(String),

    #[error("A refresh is already in progress")]
    InProgress,
}

/// Only raised by the opt-in strict parsing paths; the default parser
/// tolerates malformed lines.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Header mismatch in {file}: expected '{expected}' at column {index}, found '{found}'")]
    HeaderMismatch {
        file: String,
        index: usize,
        expected: String,
        found: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode store response: {0}")]
    Decode(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, RefreshError>;
