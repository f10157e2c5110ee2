//! Error types for resolution, generation and builds
//!
//! Library crates own their own errors; these cover the layers that live in
//! this crate plus [`CliError`], which the binary reports and exits on.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tkmake_catalog::CatalogError;
use tkmake_config::ConfigError;
use tkmake_manifest::ManifestError;

/// Fatal resolution failures. "Not found" is `Ok(None)`, not an error.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ResolveError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        ResolveError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Generator '{0}' is registered twice")]
    Duplicate(String),

    #[error("Unknown generator '{name}' (available: {})", available.join(", "))]
    Unknown { name: String, available: Vec<String> },

    #[error("Generator '{generator}' failed for {root}: {reason}")]
    Failed {
        generator: String,
        root: PathBuf,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Failed to load project at {root}: {reason}")]
    Descriptor { root: PathBuf, reason: String },

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error("Build failed for {root}: {status}")]
    Driver { root: PathBuf, status: String },

    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("{0} was not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidArgument(String),
}
