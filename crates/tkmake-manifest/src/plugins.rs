//! Plugin records, sorted plugin sets and their three-way diff
//!
//! A host keeps the plugins it loads in `<goal>.plugins` next to its goal.
//! Sets are always sorted by path so two snapshots can be compared in a
//! single merge pass.

use crate::document;
use crate::errors::ManifestError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::{Path, PathBuf};

pub const PLUGIN_INDEX_EXTENSION: &str = "plugins";
pub const PLUGIN_INDEX_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRecord {
    /// Source path of the plugin goal.
    pub path: String,
    pub version: String,
    pub sha256: String,
    /// Source paths of shared libraries the plugin needs beside it.
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
}

impl PluginRecord {
    /// File name the plugin has once copied into a host directory.
    pub fn file_name(&self) -> String {
        file_name_of(&self.path)
    }

    fn same_content(&self, other: &PluginRecord) -> bool {
        self.version == other.version
            && self.sha256 == other.sha256
            && self.dependencies == other.dependencies
    }
}

pub(crate) fn file_name_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map_or_else(|| path.to_string(), |n| n.to_string_lossy().into_owned())
}

/// Plugin records kept sorted by path, one record per path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PluginRecord>", into = "Vec<PluginRecord>")]
pub struct PluginSet {
    records: Vec<PluginRecord>,
}

impl From<Vec<PluginRecord>> for PluginSet {
    fn from(records: Vec<PluginRecord>) -> Self {
        let mut set = PluginSet::default();
        for record in records {
            set.insert(record);
        }
        set
    }
}

impl From<PluginSet> for Vec<PluginRecord> {
    fn from(set: PluginSet) -> Self {
        set.records
    }
}

impl PluginSet {
    pub fn new() -> Self {
        PluginSet::default()
    }

    fn position(&self, path: &str) -> Result<usize, usize> {
        self.records
            .binary_search_by(|r| r.path.as_str().cmp(path))
    }

    /// Insert or replace the record with the same path.
    pub fn insert(&mut self, record: PluginRecord) {
        match self.position(&record.path) {
            Ok(idx) => self.records[idx] = record,
            Err(idx) => self.records.insert(idx, record),
        }
    }

    pub fn remove(&mut self, path: &str) -> Option<PluginRecord> {
        self.position(path).ok().map(|idx| self.records.remove(idx))
    }

    pub fn get(&self, path: &str) -> Option<&PluginRecord> {
        self.position(path).ok().map(|idx| &self.records[idx])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PluginRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a PluginSet {
    type Item = &'a PluginRecord;
    type IntoIter = std::slice::Iter<'a, PluginRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PluginIndexDocument {
    schema_version: u32,
    #[serde(default, rename = "plugin")]
    plugins: PluginSet,
}

/// `<goal>.plugins` for the goal at `goal_path`.
pub fn index_path(goal_path: &Path) -> PathBuf {
    let mut name = goal_path.as_os_str().to_owned();
    name.push(".");
    name.push(PLUGIN_INDEX_EXTENSION);
    PathBuf::from(name)
}

/// Read a plugin index; a missing file is an empty set.
pub fn load_index(path: &Path) -> Result<PluginSet, ManifestError> {
    let Some(doc) = document::read::<PluginIndexDocument>(path)? else {
        return Ok(PluginSet::new());
    };
    if doc.schema_version > PLUGIN_INDEX_SCHEMA_VERSION {
        tracing::warn!(
            "{} has schema version {} (supported: {}), reading anyway",
            path.display(),
            doc.schema_version,
            PLUGIN_INDEX_SCHEMA_VERSION
        );
    }
    Ok(doc.plugins)
}

/// Write a plugin index, removing the file when the set is empty.
pub fn save_index(path: &Path, plugins: &PluginSet) -> Result<(), ManifestError> {
    if plugins.is_empty() {
        return match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ManifestError::io(path, e)),
        };
    }
    let doc = PluginIndexDocument {
        schema_version: PLUGIN_INDEX_SCHEMA_VERSION,
        plugins: plugins.clone(),
    };
    document::write(path, &doc)
}

/// Lowercase hex SHA-256 of a file's contents.
pub fn file_sha256(path: &Path) -> Result<String, ManifestError> {
    let mut file = std::fs::File::open(path).map_err(|e| ManifestError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|e| ManifestError::io(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modified {
    pub from: PluginRecord,
    pub to: PluginRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginDiff {
    pub added: Vec<PluginRecord>,
    pub deleted: Vec<PluginRecord>,
    pub modified: Vec<Modified>,
}

impl PluginDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }
}

/// Compare two snapshots of a plugin set in one linear pass.
pub fn diff(from: &PluginSet, to: &PluginSet) -> PluginDiff {
    let mut result = PluginDiff::default();
    let mut left = from.records.iter().peekable();
    let mut right = to.records.iter().peekable();

    loop {
        match (left.peek(), right.peek()) {
            (Some(a), Some(b)) => match a.path.cmp(&b.path) {
                Ordering::Less => {
                    result.deleted.push((*a).clone());
                    left.next();
                }
                Ordering::Greater => {
                    result.added.push((*b).clone());
                    right.next();
                }
                Ordering::Equal => {
                    if !a.same_content(b) {
                        result.modified.push(Modified {
                            from: (*a).clone(),
                            to: (*b).clone(),
                        });
                    }
                    left.next();
                    right.next();
                }
            },
            (Some(a), None) => {
                result.deleted.push((*a).clone());
                left.next();
            }
            (None, Some(b)) => {
                result.added.push((*b).clone());
                right.next();
            }
            (None, None) => break,
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(path: &str, version: &str) -> PluginRecord {
        PluginRecord {
            path: path.to_string(),
            version: version.to_string(),
            sha256: format!("hash-{path}-{version}"),
            dependencies: BTreeSet::new(),
        }
    }

    #[test]
    fn test_set_stays_sorted() {
        let mut set = PluginSet::new();
        set.insert(record("c", "1"));
        set.insert(record("a", "1"));
        set.insert(record("b", "1"));
        set.insert(record("a", "2"));
        let paths: Vec<&str> = set.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, ["a", "b", "c"]);
        assert_eq!(set.get("a").map(|r| r.version.as_str()), Some("2"));
        assert!(set.remove("b").is_some());
        assert!(set.remove("b").is_none());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_diff_classifies_changes() {
        let from = PluginSet::from(vec![record("A", "v1"), record("B", "v1"), record("C", "v1")]);
        let to = PluginSet::from(vec![record("B", "v2"), record("C", "v1"), record("D", "v1")]);

        let d = diff(&from, &to);
        assert_eq!(d.added, vec![record("D", "v1")]);
        assert_eq!(d.deleted, vec![record("A", "v1")]);
        assert_eq!(
            d.modified,
            vec![Modified {
                from: record("B", "v1"),
                to: record("B", "v2"),
            }]
        );
    }

    #[test]
    fn test_diff_detects_dependency_change() {
        let from = PluginSet::from(vec![record("A", "v1")]);
        let mut changed = record("A", "v1");
        changed.dependencies.insert("libdep.so".to_string());
        let to = PluginSet::from(vec![changed]);
        assert_eq!(diff(&from, &to).modified.len(), 1);
        assert!(diff(&to, &to).is_empty());
    }

    #[test]
    fn test_index_roundtrip_and_empty_removal() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let goal = dir.path().join("host.so");
        let path = index_path(&goal);
        assert!(path.to_string_lossy().ends_with("host.so.plugins"));

        let set = PluginSet::from(vec![record("/x/b.so", "1.0.0"), record("/x/a.so", "1.0.0")]);
        assert!(save_index(&path, &set).is_ok());
        assert_eq!(load_index(&path).ok(), Some(set));

        assert!(save_index(&path, &PluginSet::new()).is_ok());
        assert!(!path.exists());
        assert_eq!(load_index(&path).ok(), Some(PluginSet::new()));
    }

    #[test]
    fn test_file_sha256() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let path = dir.path().join("f");
        assert!(std::fs::write(&path, b"abc").is_ok());
        assert_eq!(
            file_sha256(&path).ok().as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }
}
