//! The local catalog cache: every known organization and its entry
//!
//! Loaded from and saved to one `Sources.toml`. Refreshing an organization
//! replaces its entry with the remote `url/<org>/Source.toml` and keeps a
//! per-organization copy under the sources directory.

use crate::entry::{CatalogEntry, RawEntry, CATALOG_SCHEMA_VERSION};
use crate::errors::CatalogError;
use crate::fetch::{FetchKind, FetchRequest};
use crate::helper::InstallHelper;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tkmake_naming::codec::join;
use tkmake_naming::{BuildConfig, LinkType};

pub const SOURCES_FILE_NAME: &str = "Sources.toml";
pub const SOURCE_FILE_NAME: &str = "Source.toml";
pub const MAX_CATALOG_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct RawSources {
    schema_version: Option<u32>,
    #[serde(default)]
    source: Vec<RawEntry>,
}

#[derive(Debug, Serialize)]
struct SourcesDocument<'a> {
    schema_version: u32,
    source: Vec<&'a CatalogEntry>,
}

/// Outcome of [`CatalogSet::update_all`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub updated: Vec<String>,
    /// Organization and the reason its refresh failed.
    pub failed: Vec<(String, String)>,
}

impl RefreshReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CatalogSet {
    path: PathBuf,
    entries: BTreeMap<String, CatalogEntry>,
}

fn parse_text(bytes: &[u8], location: &str) -> Result<String, CatalogError> {
    if bytes.len() > MAX_CATALOG_SIZE {
        return Err(CatalogError::format(
            location,
            format!("document is {} bytes, limit is {}", bytes.len(), MAX_CATALOG_SIZE),
        ));
    }
    String::from_utf8(bytes.to_vec()).map_err(|e| CatalogError::format(location, e.to_string()))
}

/// Parse a single organization's `Source.toml`.
pub fn parse_source(
    bytes: &[u8],
    organization: &str,
    url: &str,
    location: &str,
) -> Result<CatalogEntry, CatalogError> {
    let text = parse_text(bytes, location)?;
    let raw: RawEntry =
        toml::from_str(&text).map_err(|e| CatalogError::format(location, e.to_string()))?;
    let mut entry = raw.validate(Some(organization), Some(url), location)?;
    // The local organization name wins over whatever the mirror calls itself.
    entry.organization = organization.to_string();
    if entry.url.is_empty() {
        entry.url = url.to_string();
    }
    Ok(entry)
}

fn write_atomic(path: &Path, content: &str) -> Result<(), CatalogError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CatalogError::io(parent, e))?;
    }
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);
    {
        let file = std::fs::File::create(&temp_path).map_err(|e| CatalogError::io(&temp_path, e))?;
        let mut writer = std::io::BufWriter::new(file);
        writer
            .write_all(content.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(|e| CatalogError::io(&temp_path, e))?;
    }
    std::fs::rename(&temp_path, path).map_err(|e| CatalogError::io(path, e))
}

/// One toolchain version built for a given configuration and link type.
#[derive(Debug, Clone, Copy)]
pub struct ToolchainVariant<'a> {
    pub organization: &'a str,
    pub name: &'a str,
    pub version: &'a str,
    pub config: BuildConfig,
    pub link: LinkType,
}

impl CatalogSet {
    /// Empty set that will be saved to `path`.
    pub fn new(path: &Path) -> Self {
        CatalogSet {
            path: path.to_path_buf(),
            entries: BTreeMap::new(),
        }
    }

    /// Load `path`; a missing file is an empty set.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let mut set = CatalogSet::new(path);
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No catalog cache at {}", path.display());
                return Ok(set);
            }
            Err(e) => return Err(CatalogError::io(path, e)),
        };

        let location = path.display().to_string();
        let text = parse_text(&bytes, &location)?;
        let raw: RawSources =
            toml::from_str(&text).map_err(|e| CatalogError::format(&location, e.to_string()))?;
        let schema_version = raw.schema_version.unwrap_or(CATALOG_SCHEMA_VERSION);
        if schema_version > CATALOG_SCHEMA_VERSION {
            tracing::warn!(
                "{} has schema version {} (supported: {}), reading anyway",
                location,
                schema_version,
                CATALOG_SCHEMA_VERSION
            );
        }

        for raw_entry in raw.source {
            let entry = raw_entry.validate(None, None, &location)?;
            set.entries.insert(entry.organization.clone(), entry);
        }
        tracing::debug!("Loaded {} catalog source(s) from {}", set.entries.len(), location);
        Ok(set)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the whole set to its cache file.
    pub fn save(&self) -> Result<(), CatalogError> {
        let doc = SourcesDocument {
            schema_version: CATALOG_SCHEMA_VERSION,
            source: self.entries.values().collect(),
        };
        let content = toml::to_string_pretty(&doc)?;
        write_atomic(&self.path, &content)?;
        tracing::debug!("Saved catalog cache {}", self.path.display());
        Ok(())
    }

    pub fn get(&self, organization: &str) -> Option<&CatalogEntry> {
        self.entries.get(organization)
    }

    pub fn get_mut(&mut self, organization: &str) -> Option<&mut CatalogEntry> {
        self.entries.get_mut(organization)
    }

    pub fn organizations(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register an organization. An existing one keeps its entries and gets
    /// the new URL. Returns whether anything changed.
    pub fn add_source(&mut self, organization: &str, url: &str) -> bool {
        match self.entries.get_mut(organization) {
            Some(entry) if entry.url == url => false,
            Some(entry) => {
                entry.url = url.to_string();
                true
            }
            None => {
                self.entries
                    .insert(organization.to_string(), CatalogEntry::new(organization, url));
                true
            }
        }
    }

    pub fn delete_source(&mut self, organization: &str) -> bool {
        self.entries.remove(organization).is_some()
    }

    /// Replace `organization`'s entry with its remote registry file and keep
    /// a copy at `sources_dir/<org>/Source.toml`.
    pub fn update_source(
        &mut self,
        organization: &str,
        transport: &dyn Transport,
        sources_dir: &Path,
    ) -> Result<(), CatalogError> {
        let url = self
            .entries
            .get(organization)
            .map(|e| e.url.clone())
            .ok_or_else(|| CatalogError::NotFound {
                organization: organization.to_string(),
                identity: "source".to_string(),
            })?;

        let remote = join(&join(&url, organization), SOURCE_FILE_NAME);
        tracing::info!("Refreshing '{}' from {}", organization, remote);
        let bytes = transport.get(&remote)?;
        let entry = parse_source(&bytes, organization, &url, &remote)?;

        let copy = sources_dir.join(organization).join(SOURCE_FILE_NAME);
        write_atomic(&copy, &toml::to_string_pretty(&entry)?)?;

        tracing::debug!(
            "'{}' now lists {} project(s) and {} toolchain(s)",
            organization,
            entry.projects.len(),
            entry.toolchains.len()
        );
        self.entries.insert(organization.to_string(), entry);
        Ok(())
    }

    /// Refresh every organization. Failures are reported, never propagated.
    pub fn update_all(&mut self, transport: &dyn Transport, sources_dir: &Path) -> RefreshReport {
        let mut report = RefreshReport::default();
        let organizations: Vec<String> = self.entries.keys().cloned().collect();
        for organization in organizations {
            match self.update_source(&organization, transport, sources_dir) {
                Ok(()) => report.updated.push(organization),
                Err(e) => {
                    tracing::warn!("Failed to refresh '{}': {}", organization, e);
                    report.failed.push((organization, e.to_string()));
                }
            }
        }
        report
    }

    /// Install one project version through `helper`.
    pub fn get_source_project(
        &self,
        organization: &str,
        project: &str,
        branch: &str,
        version: &str,
        destination: &Path,
        helper: &dyn InstallHelper,
    ) -> Result<(), CatalogError> {
        let not_found = || CatalogError::NotFound {
            organization: organization.to_string(),
            identity: tkmake_naming::encode_name(organization, project, branch, version, ""),
        };
        let entry = self.entries.get(organization).ok_or_else(not_found)?;
        let project_entry = entry
            .find_project(project, branch, version)
            .ok_or_else(not_found)?;

        helper.fetch(&FetchRequest {
            organization: organization.to_string(),
            url: entry.url.clone(),
            name: project.to_string(),
            version: version.to_string(),
            sha256: project_entry.sha256.clone(),
            destination: destination.to_path_buf(),
            kind: FetchKind::Project {
                branch: branch.to_string(),
            },
        })
    }

    /// Install one toolchain variant through `helper`.
    pub fn install_source_toolchain(
        &self,
        toolchain: &ToolchainVariant<'_>,
        destination: &Path,
        helper: &dyn InstallHelper,
    ) -> Result<(), CatalogError> {
        let ToolchainVariant {
            organization,
            name,
            version,
            config,
            link,
        } = *toolchain;
        let not_found = || CatalogError::NotFound {
            organization: organization.to_string(),
            identity: tkmake_naming::encode_name(organization, name, "", version, ""),
        };
        let entry = self.entries.get(organization).ok_or_else(not_found)?;
        let toolchain = entry.find_toolchain(name, version).ok_or_else(not_found)?;

        helper.fetch(&FetchRequest {
            organization: organization.to_string(),
            url: entry.url.clone(),
            name: name.to_string(),
            version: version.to_string(),
            sha256: toolchain.sha256.clone(),
            destination: destination.to_path_buf(),
            kind: FetchKind::Toolchain {
                file: toolchain.file.clone(),
                config,
                link,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::{sha256_hex, tarball};
    use crate::helper::InProcessHelper;
    use crate::transport::LocalTransport;
    use tempfile::TempDir;

    #[test]
    fn test_missing_cache_is_empty() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let set = CatalogSet::load(&dir.path().join(SOURCES_FILE_NAME));
        assert!(set.is_ok_and(|s| s.is_empty()));
    }

    #[test]
    fn test_save_and_reload() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let path = dir.path().join(SOURCES_FILE_NAME);
        let mut set = CatalogSet::new(&path);
        assert!(set.add_source("acme", "https://mirror.invalid"));
        assert!(!set.add_source("acme", "https://mirror.invalid"));
        if let Some(entry) = set.get_mut("acme") {
            entry.add_project("widget", "", "1.0.0", "aa");
            entry.add_project("widget", "", "2.0.0", "bb");
            entry.add_toolchain("zlib", "1.3.0", Some("zlib.tar.gz"), "cc");
        }
        assert!(set.save().is_ok());

        let Ok(loaded) = CatalogSet::load(&path) else {
            panic!("reload failed");
        };
        assert_eq!(loaded.get("acme"), set.get("acme"));
        assert_eq!(loaded.organizations().collect::<Vec<_>>(), ["acme"]);
    }

    #[test]
    fn test_element_missing_field_is_format_error() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let path = dir.path().join(SOURCES_FILE_NAME);
        let doc = "schema_version = 1\n\n[[source]]\norganization = \"acme\"\nurl = \"u\"\n\n[[source.project]]\nname = \"widget\"\nversion = \"1.0.0\"\n";
        assert!(std::fs::write(&path, doc).is_ok());
        let Err(CatalogError::Format { message, .. }) = CatalogSet::load(&path) else {
            panic!("expected format error");
        };
        assert!(message.contains("sha256"));
    }

    #[test]
    fn test_syntax_error_is_format_error() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let path = dir.path().join(SOURCES_FILE_NAME);
        assert!(std::fs::write(&path, "[[source]\n").is_ok());
        assert!(matches!(CatalogSet::load(&path), Err(CatalogError::Format { .. })));
    }

    #[test]
    fn test_newer_schema_is_accepted() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let path = dir.path().join(SOURCES_FILE_NAME);
        let doc = "schema_version = 99\n\n[[source]]\norganization = \"acme\"\nurl = \"u\"\nschema_version = 99\n";
        assert!(std::fs::write(&path, doc).is_ok());
        let set = CatalogSet::load(&path);
        assert!(set.is_ok_and(|s| s.get("acme").is_some()));
    }

    #[test]
    fn test_update_all_isolates_failures() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let mirror = dir.path().join("mirror");
        let remote = "[[project]]\nname = \"widget\"\nversion = \"3.0.0\"\nsha256 = \"ff\"\n";
        assert!(std::fs::create_dir_all(mirror.join("acme")).is_ok());
        assert!(std::fs::write(mirror.join("acme").join(SOURCE_FILE_NAME), remote).is_ok());

        let mut set = CatalogSet::new(&dir.path().join(SOURCES_FILE_NAME));
        set.add_source("acme", &mirror.to_string_lossy());
        set.add_source("broken", &dir.path().join("nowhere").to_string_lossy());
        if let Some(entry) = set.get_mut("acme") {
            entry.add_project("stale", "", "1.0.0", "00");
        }

        let sources = dir.path().join("sources");
        let report = set.update_all(&LocalTransport, &sources);
        assert_eq!(report.updated, ["acme"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "broken");

        let acme = set.get("acme");
        assert!(acme.is_some_and(|e| e.find_project("stale", "", "1.0.0").is_none()));
        assert!(acme.is_some_and(|e| e.find_project("widget", "", "3.0.0").is_some()));
        assert!(sources.join("acme").join(SOURCE_FILE_NAME).is_file());
        assert!(set.get("broken").is_some());
    }

    #[test]
    fn test_get_source_project_not_found() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let set = CatalogSet::new(&dir.path().join(SOURCES_FILE_NAME));
        let helper = InProcessHelper::new(LocalTransport);
        let dest = dir.path().join("dev/acme/widget/1.0.0");
        let result = set.get_source_project("acme", "widget", "", "1.0.0", &dest, &helper);
        assert!(result.is_err_and(|e| e.is_not_found()));
        assert!(!dest.exists());
    }

    #[test]
    fn test_install_source_toolchain() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let mirror = dir.path().join("mirror");
        let archive = tarball("zlib-1.3.0", &[("include/zlib.h", "//")]);
        assert!(std::fs::create_dir_all(mirror.join("acme")).is_ok());
        assert!(std::fs::write(mirror.join("acme/acme_zlib-1.3.0.tar.gz"), &archive).is_ok());

        let mut set = CatalogSet::new(&dir.path().join(SOURCES_FILE_NAME));
        set.add_source("acme", &mirror.to_string_lossy());
        if let Some(entry) = set.get_mut("acme") {
            entry.add_toolchain("zlib", "1.3.0", None, &sha256_hex(&archive));
        }

        let dest = dir.path().join("toolchain/acme/zlib/1.3.0");
        let helper = InProcessHelper::new(LocalTransport);
        let variant = ToolchainVariant {
            organization: "acme",
            name: "zlib",
            version: "1.3.0",
            config: BuildConfig::Release,
            link: LinkType::Static,
        };
        let result = set.install_source_toolchain(&variant, &dest, &helper);
        assert!(result.is_ok());
        assert!(dest.join("include/zlib.h").is_file());
    }
}
