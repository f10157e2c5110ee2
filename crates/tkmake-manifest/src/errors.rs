use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during manifest and plugin index operations
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed document {path}: {message}")]
    Format { path: PathBuf, message: String },

    #[error("Failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },
}

impl ManifestError {
    pub(crate) fn io(path: &std::path::Path, source: io::Error) -> Self {
        ManifestError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn format(path: &std::path::Path, message: impl Into<String>) -> Self {
        ManifestError::Format {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}
