//! Storage-specific error type wrapping IO and JSON failures.

use std::path::PathBuf;

use relayhub_domain::error::HubError;

/// Errors originating from the JSON file store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The data directory could not be created.
    #[error("failed to prepare data directory {}", .path.display())]
    Prepare {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A table file exists but could not be read.
    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A table file is not valid JSON for its table.
    #[error("failed to decode {}", .path.display())]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A table could not be encoded.
    #[error("failed to encode the {table} table")]
    Encode {
        table: &'static str,
        source: serde_json::Error,
    },

    /// Writing or renaming the replacement file failed.
    #[error("failed to write {}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<StoreError> for HubError {
    fn from(err: StoreError) -> Self {
        Self::Storage(Box::new(err))
    }
}
