use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading, refreshing or installing from a catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed catalog document {location}: {message}")]
    Format { location: String, message: String },

    #[error("No catalog entry for {identity} in organization '{organization}'")]
    NotFound {
        organization: String,
        identity: String,
    },

    #[error("Failed to fetch {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to fetch {url}: HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("SHA-256 mismatch for {url}: expected {expected}, got {actual}")]
    HashMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("Failed to install {identity}: {reason}")]
    Install { identity: String, reason: String },

    #[error("Invalid helper arguments: {0}")]
    InvalidArgs(String),

    #[error("Failed to serialize catalog: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl CatalogError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        CatalogError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn format(location: impl Into<String>, message: impl Into<String>) -> Self {
        CatalogError::Format {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Whether this is the recoverable "nothing recorded" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound { .. })
    }
}
