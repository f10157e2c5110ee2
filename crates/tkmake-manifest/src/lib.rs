//! tkmake install manifests
//!
//! Reference-counted records of which copied files each install directory
//! still needs, plus the sorted plugin sets that hosts load and the diff used
//! to keep a host's copy of a plugin set in step with its source.

pub mod document;
pub mod errors;
pub mod manifest;
pub mod plugins;
pub mod propagate;

pub use errors::ManifestError;
pub use manifest::{Manifest, Manifests, MANIFEST_FILE_NAME};
pub use plugins::{
    diff, file_sha256, index_path, load_index, save_index, Modified, PluginDiff, PluginRecord,
    PluginSet,
};
pub use propagate::{apply, copy_into, PropagationReport};
