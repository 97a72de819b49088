//! Error types for store access and configuration

use std::path::PathBuf;
use thiserror::Error;

/// Whether a failed request could have reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Delivery {
    /// The request never left (connection refused, auth rejected, bad input).
    NotSent,
    /// The request may have been applied (timeout after send, dropped reply).
    Unknown,
}

/// Error reported by a [`crate::store::TabularStore`].
///
/// `Display` is the store's message, untouched, so operators can match it
/// against what the spreadsheet service itself reports.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct RemoteError {
    /// HTTP-like status, when the store reported one
    pub status: Option<u16>,
    /// Message as reported by the store
    pub message: String,
    pub delivery: Delivery,
}

impl RemoteError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        RemoteError {
            status,
            message: message.into(),
            delivery: Delivery::NotSent,
        }
    }

    /// Status 429 with the store's usual wording.
    pub fn rate_limited() -> Self {
        RemoteError::new(Some(429), "Quota exceeded for quota metric 'Read requests'")
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        RemoteError::new(Some(404), what)
    }

    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }
}

/// Accessor error
#[derive(Debug, Error)]
pub enum StoreError {
    /// Permanent failure, surfaced on the first attempt
    #[error("{0}")]
    Remote(RemoteError),

    /// Quota errors kept coming until the retry policy ran out
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: RemoteError },

    /// Row numbers start at 2; row 1 holds the headers
    #[error("row {0} is not a data row")]
    InvalidRow(u32),

    /// The worksheet has no header row to map a submission onto
    #[error("worksheet '{0}' has no header row")]
    NoHeaderRow(String),
}

impl StoreError {
    /// The underlying store error, if the failure came from the store.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            StoreError::Remote(e) => Some(e),
            StoreError::RetriesExhausted { last, .. } => Some(last),
            StoreError::InvalidRow(_) | StoreError::NoHeaderRow(_) => None,
        }
    }

    /// `NotSent` when the write definitely did not happen.
    pub fn delivery(&self) -> Delivery {
        self.remote()
            .map(|e| e.delivery)
            .unwrap_or(Delivery::NotSent)
    }
}

/// Configuration loading error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A form definition failed validation
    #[error("form '{form}': {reason}")]
    InvalidForm { form: String, reason: String },

    #[error("unknown sheet type '{0}'")]
    UnknownSheetType(String),
}
