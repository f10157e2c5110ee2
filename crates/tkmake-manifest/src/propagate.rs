//! Apply a [`PluginDiff`] to a destination directory
//!
//! Plugin files are registered in the destination manifest against the host
//! that loads them, and each plugin's dependency files against the plugin.
//! Files are only physically removed once the manifest reports them
//! unreferenced.

use crate::errors::ManifestError;
use crate::manifest::Manifest;
use crate::plugins::{file_name_of, PluginDiff, PluginRecord, PluginSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PropagationReport {
    pub added: usize,
    pub deleted: usize,
    pub modified: usize,
    /// Source files that were missing and skipped.
    pub missing: Vec<PathBuf>,
    /// Files removed from the destination.
    pub removed: Vec<PathBuf>,
}

/// Copy `source` into `dest_dir`. A missing source is recorded and skipped.
pub fn copy_into(
    source: &Path,
    dest_dir: &Path,
    report: &mut PropagationReport,
) -> Result<Option<PathBuf>, ManifestError> {
    if !source.is_file() {
        tracing::warn!("Skipping missing file {}", source.display());
        report.missing.push(source.to_path_buf());
        return Ok(None);
    }
    std::fs::create_dir_all(dest_dir).map_err(|e| ManifestError::io(dest_dir, e))?;
    let Some(name) = source.file_name() else {
        report.missing.push(source.to_path_buf());
        return Ok(None);
    };
    let target = dest_dir.join(name);
    std::fs::copy(source, &target).map_err(|e| ManifestError::io(&target, e))?;
    tracing::debug!("Copied {} -> {}", source.display(), target.display());
    Ok(Some(target))
}

fn remove_from(
    dest_dir: &Path,
    file: &str,
    report: &mut PropagationReport,
) -> Result<(), ManifestError> {
    let target = dest_dir.join(file);
    match std::fs::remove_file(&target) {
        Ok(()) => {
            tracing::debug!("Removed {}", target.display());
            report.removed.push(target);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ManifestError::io(&target, e)),
    }
}

fn add_dependency(
    dep: &str,
    plugin_name: &str,
    dest_dir: &Path,
    manifest: &mut Manifest,
    report: &mut PropagationReport,
) -> Result<(), ManifestError> {
    if copy_into(Path::new(dep), dest_dir, report)?.is_some() {
        manifest.add_file(&file_name_of(dep), plugin_name);
    }
    Ok(())
}

fn drop_dependency(
    dep: &str,
    plugin_name: &str,
    dest_dir: &Path,
    manifest: &mut Manifest,
    report: &mut PropagationReport,
) -> Result<(), ManifestError> {
    let dep_name = file_name_of(dep);
    if manifest.delete_file(&dep_name, plugin_name) {
        remove_from(dest_dir, &dep_name, report)?;
    }
    Ok(())
}

fn add_plugin(
    record: &PluginRecord,
    host: &str,
    dest_dir: &Path,
    manifest: &mut Manifest,
    report: &mut PropagationReport,
) -> Result<bool, ManifestError> {
    let plugin_name = record.file_name();
    if copy_into(Path::new(&record.path), dest_dir, report)?.is_none() {
        return Ok(false);
    }
    manifest.add_file(&plugin_name, host);
    for dep in &record.dependencies {
        add_dependency(dep, &plugin_name, dest_dir, manifest, report)?;
    }
    Ok(true)
}

fn delete_plugin(
    record: &PluginRecord,
    host: &str,
    dest_dir: &Path,
    manifest: &mut Manifest,
    report: &mut PropagationReport,
) -> Result<(), ManifestError> {
    let plugin_name = record.file_name();
    if !manifest.delete_file(&plugin_name, host) {
        // Still loaded by another host in this directory.
        return Ok(());
    }
    remove_from(dest_dir, &plugin_name, report)?;
    for dep in &record.dependencies {
        drop_dependency(dep, &plugin_name, dest_dir, manifest, report)?;
    }
    Ok(())
}

fn modify_plugin(
    from: &PluginRecord,
    to: &PluginRecord,
    host: &str,
    dest_dir: &Path,
    manifest: &mut Manifest,
    report: &mut PropagationReport,
) -> Result<(), ManifestError> {
    let plugin_name = to.file_name();
    copy_into(Path::new(&to.path), dest_dir, report)?;
    manifest.add_file(&plugin_name, host);
    for dep in from.dependencies.difference(&to.dependencies) {
        drop_dependency(dep, &plugin_name, dest_dir, manifest, report)?;
    }
    for dep in to.dependencies.difference(&from.dependencies) {
        add_dependency(dep, &plugin_name, dest_dir, manifest, report)?;
    }
    Ok(())
}

/// Apply `diff` to `dest_dir`, keeping `manifest` and `index` in step.
///
/// `host` is the name plugin files are registered against. A missing source
/// file does not abort the remaining merge; it is listed in the report.
pub fn apply(
    diff: &PluginDiff,
    dest_dir: &Path,
    host: &str,
    manifest: &mut Manifest,
    index: &mut PluginSet,
) -> Result<PropagationReport, ManifestError> {
    let mut report = PropagationReport::default();

    for record in &diff.deleted {
        delete_plugin(record, host, dest_dir, manifest, &mut report)?;
        index.remove(&record.path);
        report.deleted += 1;
    }
    for change in &diff.modified {
        modify_plugin(&change.from, &change.to, host, dest_dir, manifest, &mut report)?;
        index.insert(change.to.clone());
        report.modified += 1;
    }
    for record in &diff.added {
        if add_plugin(record, host, dest_dir, manifest, &mut report)? {
            index.insert(record.clone());
            report.added += 1;
        }
    }

    if !report.missing.is_empty() {
        tracing::warn!(
            "{} source file(s) missing while propagating into {}",
            report.missing.len(),
            dest_dir.display()
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::diff;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        src: PathBuf,
        dest: PathBuf,
    }

    fn fixture() -> Option<Fixture> {
        let dir = TempDir::new().ok()?;
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        std::fs::create_dir_all(&src).ok()?;
        Some(Fixture {
            _dir: dir,
            src,
            dest,
        })
    }

    fn make_file(dir: &Path, name: &str, content: &str) -> String {
        let path = dir.join(name);
        assert!(std::fs::write(&path, content).is_ok());
        path.to_string_lossy().into_owned()
    }

    fn record(path: &str, version: &str, deps: &[&str]) -> PluginRecord {
        PluginRecord {
            path: path.to_string(),
            version: version.to_string(),
            sha256: version.to_string(),
            dependencies: deps.iter().map(|d| (*d).to_string()).collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn test_added_plugin_copies_files_and_registers() {
        let Some(fx) = fixture() else {
            return;
        };
        let plugin = make_file(&fx.src, "p.so", "p");
        let dep = make_file(&fx.src, "libd.so", "d");
        let to = PluginSet::from(vec![record(&plugin, "1", &[&dep])]);

        let mut manifest = Manifest::new(&fx.dest);
        let mut index = PluginSet::new();
        let report = apply(&diff(&PluginSet::new(), &to), &fx.dest, "host", &mut manifest, &mut index);

        assert_eq!(report.ok().map(|r| r.added), Some(1));
        assert!(fx.dest.join("p.so").is_file());
        assert!(fx.dest.join("libd.so").is_file());
        assert!(manifest.dependents("p.so").is_some_and(|d| d.contains("host")));
        assert!(manifest.dependents("libd.so").is_some_and(|d| d.contains("p.so")));
        assert_eq!(index, to);
    }

    #[test]
    fn test_deleted_plugin_removes_unreferenced_files() {
        let Some(fx) = fixture() else {
            return;
        };
        let plugin = make_file(&fx.src, "p.so", "p");
        let dep = make_file(&fx.src, "libd.so", "d");
        let full = PluginSet::from(vec![record(&plugin, "1", &[&dep])]);

        let mut manifest = Manifest::new(&fx.dest);
        let mut index = PluginSet::new();
        assert!(apply(&diff(&PluginSet::new(), &full), &fx.dest, "host", &mut manifest, &mut index).is_ok());
        // A second host keeps the shared dependency alive.
        manifest.add_file("libd.so", "other.so");

        let report = apply(&diff(&full, &PluginSet::new()), &fx.dest, "host", &mut manifest, &mut index);
        assert_eq!(report.ok().map(|r| r.deleted), Some(1));
        assert!(!fx.dest.join("p.so").exists());
        assert!(fx.dest.join("libd.so").exists());
        assert!(manifest.dependents("p.so").is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_modified_plugin_swaps_dependencies() {
        let Some(fx) = fixture() else {
            return;
        };
        let plugin = make_file(&fx.src, "p.so", "p1");
        let old_dep = make_file(&fx.src, "libold.so", "o");
        let new_dep = make_file(&fx.src, "libnew.so", "n");
        let v1 = PluginSet::from(vec![record(&plugin, "1", &[&old_dep])]);

        let mut manifest = Manifest::new(&fx.dest);
        let mut index = PluginSet::new();
        assert!(apply(&diff(&PluginSet::new(), &v1), &fx.dest, "host", &mut manifest, &mut index).is_ok());

        make_file(&fx.src, "p.so", "p2");
        let v2 = PluginSet::from(vec![record(&plugin, "2", &[&new_dep])]);
        let report = apply(&diff(&v1, &v2), &fx.dest, "host", &mut manifest, &mut index);

        assert_eq!(report.ok().map(|r| r.modified), Some(1));
        assert_eq!(std::fs::read_to_string(fx.dest.join("p.so")).ok().as_deref(), Some("p2"));
        assert!(!fx.dest.join("libold.so").exists());
        assert!(fx.dest.join("libnew.so").exists());
        assert_eq!(index, v2);
    }

    #[test]
    fn test_missing_source_does_not_abort_merge() {
        let Some(fx) = fixture() else {
            return;
        };
        let present = make_file(&fx.src, "b.so", "b");
        let missing = fx.src.join("a.so").to_string_lossy().into_owned();
        let to = PluginSet::from(vec![record(&missing, "1", &[]), record(&present, "1", &[])]);

        let mut manifest = Manifest::new(&fx.dest);
        let mut index = PluginSet::new();
        let Ok(report) = apply(&diff(&PluginSet::new(), &to), &fx.dest, "host", &mut manifest, &mut index) else {
            panic!("merge aborted");
        };
        assert_eq!(report.added, 1);
        assert_eq!(report.missing, vec![PathBuf::from(&missing)]);
        assert!(fx.dest.join("b.so").is_file());
        assert!(index.get(&missing).is_none());
        assert!(manifest.dependents("a.so").is_none());
    }
}
