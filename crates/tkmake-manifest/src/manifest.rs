//! Manifest operations - loading, saving and reference counting
//!
//! Every install directory that receives copied binaries keeps a manifest
//! mapping each file name to the set of artifacts that still need it. A file
//! entry never holds an empty set: removing the last dependent removes the
//! entry, and that is the only signal callers use to delete the file itself.

use crate::document;
use crate::errors::ManifestError;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE_NAME: &str = "thekogans_manifest.toml";
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ManifestDocument {
    schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    generated_at: Option<String>,
    #[serde(default, rename = "file")]
    files: Vec<FileEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    name: String,
    #[serde(default)]
    dependents: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    files: BTreeMap<String, BTreeSet<String>>,
    dirty: bool,
}

impl Manifest {
    /// Empty manifest that will persist to `dir`.
    pub fn new(dir: &Path) -> Self {
        Manifest {
            path: dir.join(MANIFEST_FILE_NAME),
            files: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Load the manifest for `dir`, empty if none has been written yet.
    pub fn load(dir: &Path) -> Result<Self, ManifestError> {
        let mut manifest = Manifest::new(dir);
        let Some(doc) = document::read::<ManifestDocument>(&manifest.path)? else {
            return Ok(manifest);
        };

        if doc.schema_version > MANIFEST_SCHEMA_VERSION {
            tracing::warn!(
                "{} has schema version {} (supported: {}), reading anyway",
                manifest.path.display(),
                doc.schema_version,
                MANIFEST_SCHEMA_VERSION
            );
        }

        for entry in doc.files {
            if entry.dependents.is_empty() {
                tracing::debug!("Dropping unreferenced entry '{}'", entry.name);
                continue;
            }
            manifest
                .files
                .entry(entry.name)
                .or_default()
                .extend(entry.dependents);
        }
        Ok(manifest)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Record that `dependent` needs `file`. Returns whether the pair is new.
    pub fn add_file(&mut self, file: &str, dependent: &str) -> bool {
        let inserted = self
            .files
            .entry(file.to_string())
            .or_default()
            .insert(dependent.to_string());
        if inserted {
            self.dirty = true;
        }
        inserted
    }

    /// Drop `dependent` from `file`.
    ///
    /// Returns true only when that leaves `file` with no dependents, in which
    /// case the entry is removed and the caller may delete the file.
    pub fn delete_file(&mut self, file: &str, dependent: &str) -> bool {
        let Some(dependents) = self.files.get_mut(file) else {
            return false;
        };
        if !dependents.remove(dependent) {
            return false;
        }
        self.dirty = true;
        if dependents.is_empty() {
            self.files.remove(file);
            true
        } else {
            false
        }
    }

    pub fn dependents(&self, file: &str) -> Option<&BTreeSet<String>> {
        self.files.get(file)
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.files.iter().map(|(name, deps)| (name.as_str(), deps))
    }

    /// Write to disk if anything changed since load. Returns whether it wrote.
    pub fn save(&mut self) -> Result<bool, ManifestError> {
        if !self.dirty {
            return Ok(false);
        }
        let doc = ManifestDocument {
            schema_version: MANIFEST_SCHEMA_VERSION,
            generated_at: Some(chrono::Utc::now().to_rfc3339()),
            files: self
                .files
                .iter()
                .map(|(name, deps)| FileEntry {
                    name: name.clone(),
                    dependents: deps.iter().cloned().collect(),
                })
                .collect(),
        };
        document::write(&self.path, &doc)?;
        self.dirty = false;
        tracing::debug!("Saved manifest {}", self.path.display());
        Ok(true)
    }
}

/// Manifests for several install directories, loaded on first use.
#[derive(Debug, Default)]
pub struct Manifests {
    loaded: AHashMap<PathBuf, Manifest>,
}

impl Manifests {
    pub fn new() -> Self {
        Manifests::default()
    }

    pub fn get_mut(&mut self, dir: &Path) -> Result<&mut Manifest, ManifestError> {
        if !self.loaded.contains_key(dir) {
            let manifest = Manifest::load(dir)?;
            self.loaded.insert(dir.to_path_buf(), manifest);
        }
        self.loaded
            .get_mut(dir)
            .ok_or_else(|| ManifestError::format(dir, "manifest vanished from cache"))
    }

    /// Save every dirty manifest; returns how many were written.
    pub fn save_all(&mut self) -> Result<usize, ManifestError> {
        let mut written = 0;
        for manifest in self.loaded.values_mut() {
            if manifest.save()? {
                written += 1;
            }
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_add_file_is_idempotent() {
        let mut manifest = Manifest::new(Path::new("/unused"));
        assert!(manifest.add_file("libz.so", "app"));
        assert!(!manifest.add_file("libz.so", "app"));
        assert!(manifest.add_file("libz.so", "tool"));
        assert_eq!(manifest.dependents("libz.so").map(BTreeSet::len), Some(2));
    }

    #[test]
    fn test_delete_file_reports_last_dependent() {
        let mut manifest = Manifest::new(Path::new("/unused"));
        manifest.add_file("libz.so", "app");
        manifest.add_file("libz.so", "tool");

        assert!(!manifest.delete_file("libz.so", "app"));
        assert!(manifest.dependents("libz.so").is_some());
        assert!(manifest.delete_file("libz.so", "tool"));
        assert!(manifest.dependents("libz.so").is_none());
        assert!(manifest.is_empty());

        assert!(!manifest.delete_file("libz.so", "tool"));
        assert!(!manifest.delete_file("missing.so", "app"));
    }

    #[test]
    fn test_save_and_reload() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let mut manifest = Manifest::new(dir.path());
        manifest.add_file("a.so", "x");
        manifest.add_file("b.so", "y");
        assert!(matches!(manifest.save(), Ok(true)));
        assert!(!manifest.is_dirty());

        let loaded = Manifest::load(dir.path()).ok();
        let names: Vec<String> = loaded
            .iter()
            .flat_map(|m| m.files().map(|(n, _)| n.to_string()).collect::<Vec<_>>())
            .collect();
        assert_eq!(names, ["a.so", "b.so"]);
    }

    #[test]
    fn test_read_only_access_leaves_bytes_unchanged() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let mut manifest = Manifest::new(dir.path());
        manifest.add_file("a.so", "x");
        assert!(manifest.save().is_ok());
        let before = std::fs::read(manifest.path()).ok();

        let Ok(mut reloaded) = Manifest::load(dir.path()) else {
            panic!("reload failed");
        };
        assert!(!reloaded.add_file("a.so", "x"));
        assert!(!reloaded.delete_file("a.so", "nobody"));
        assert!(matches!(reloaded.save(), Ok(false)));

        assert_eq!(std::fs::read(reloaded.path()).ok(), before);
    }

    #[test]
    fn test_corrupt_document_is_format_error() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let path = dir.path().join(MANIFEST_FILE_NAME);
        assert!(std::fs::write(&path, "schema_version = [").is_ok());
        assert!(matches!(
            Manifest::load(dir.path()),
            Err(ManifestError::Format { .. })
        ));
    }

    #[test]
    fn test_empty_dependent_sets_are_dropped_on_load() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let path = dir.path().join(MANIFEST_FILE_NAME);
        let doc = "schema_version = 1\n\n[[file]]\nname = \"a.so\"\ndependents = []\n\n[[file]]\nname = \"b.so\"\ndependents = [\"x\"]\n";
        assert!(std::fs::write(&path, doc).is_ok());
        let Ok(manifest) = Manifest::load(dir.path()) else {
            panic!("load failed");
        };
        assert!(manifest.dependents("a.so").is_none());
        assert!(manifest.dependents("b.so").is_some());
    }

    #[test]
    fn test_manifests_load_lazily_and_save_dirty_only() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let bin = dir.path().join("bin");
        let lib = dir.path().join("lib");
        let mut manifests = Manifests::new();
        if let Ok(m) = manifests.get_mut(&bin) {
            m.add_file("libz.so", "app");
        }
        assert!(manifests.get_mut(&lib).is_ok());
        assert!(matches!(manifests.save_all(), Ok(1)));
        assert!(bin.join(MANIFEST_FILE_NAME).exists());
        assert!(!lib.join(MANIFEST_FILE_NAME).exists());
    }
}
