//! Byte transport for catalog documents and archives
//!
//! `http(s)://` goes through a blocking reqwest client, `file://` URLs and
//! bare paths are read from disk.

use crate::errors::CatalogError;
use std::path::{Path, PathBuf};

/// Fetches the bytes behind a URL.
pub trait Transport {
    fn get(&self, url: &str) -> Result<Vec<u8>, CatalogError>;
}

fn local_path(url: &str) -> Option<PathBuf> {
    if let Some(rest) = url.strip_prefix("file://") {
        return Some(PathBuf::from(rest));
    }
    if url.contains("://") {
        return None;
    }
    Some(PathBuf::from(url))
}

pub struct DefaultTransport {
    client: reqwest::blocking::Client,
}

impl DefaultTransport {
    pub fn new() -> Result<Self, CatalogError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("tkmake/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| CatalogError::Network {
                url: String::new(),
                source,
            })?;
        Ok(DefaultTransport { client })
    }

    fn read_local(path: &Path) -> Result<Vec<u8>, CatalogError> {
        std::fs::read(path).map_err(|e| CatalogError::io(path, e))
    }
}

impl Transport for DefaultTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        if let Some(path) = local_path(url) {
            tracing::debug!("Reading {}", path.display());
            return Self::read_local(&path);
        }

        tracing::debug!("Downloading {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|source| CatalogError::Network {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().map_err(|source| CatalogError::Network {
            url: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }
}

/// Only reads local files and `file://` URLs. Remote URLs are an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalTransport;

impl Transport for LocalTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        match local_path(url) {
            Some(path) => DefaultTransport::read_local(&path),
            None => Err(CatalogError::InvalidArgs(format!(
                "remote URL '{url}' needs a network transport"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_paths_and_file_urls() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let path = dir.path().join("blob");
        assert!(std::fs::write(&path, b"payload").is_ok());

        let url = format!("file://{}", path.display());
        assert_eq!(LocalTransport.get(&url).ok(), Some(b"payload".to_vec()));
        assert_eq!(
            LocalTransport.get(&path.to_string_lossy()).ok(),
            Some(b"payload".to_vec())
        );
        assert!(matches!(
            LocalTransport.get("https://example.invalid/blob"),
            Err(CatalogError::InvalidArgs(_))
        ));
        assert!(matches!(
            LocalTransport.get(&format!("file://{}", dir.path().join("none").display())),
            Err(CatalogError::Io { .. })
        ));
    }
}
