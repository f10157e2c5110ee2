//! One organization's catalog: installable project and toolchain versions
//!
//! Entries of the same group (project name and branch, or toolchain name) are
//! kept version-descending, so the first match is always the latest.

use crate::errors::CatalogError;
use serde::{Deserialize, Serialize};
use tkmake_naming::Version;

pub const CATALOG_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectEntry {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub branch: String,
    pub version: String,
    pub sha256: String,
}

impl ProjectEntry {
    fn in_group(&self, name: &str, branch: &str) -> bool {
        self.name == name && self.branch == branch
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolchainEntry {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub organization: String,
    pub url: String,
    pub schema_version: u32,
    #[serde(rename = "project")]
    pub projects: Vec<ProjectEntry>,
    #[serde(rename = "toolchain")]
    pub toolchains: Vec<ToolchainEntry>,
}

/// Shape of a `[[source]]` table before validation.
#[derive(Debug, Deserialize)]
pub(crate) struct RawEntry {
    organization: Option<String>,
    url: Option<String>,
    schema_version: Option<u32>,
    #[serde(default)]
    project: Vec<RawProject>,
    #[serde(default)]
    toolchain: Vec<RawToolchain>,
}

#[derive(Debug, Deserialize)]
struct RawProject {
    name: Option<String>,
    branch: Option<String>,
    version: Option<String>,
    sha256: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawToolchain {
    name: Option<String>,
    version: Option<String>,
    file: Option<String>,
    sha256: Option<String>,
}

fn required(value: Option<String>, field: &str, element: &str, location: &str) -> Result<String, CatalogError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| CatalogError::format(location, format!("{element} is missing '{field}'")))
}

impl RawEntry {
    /// Validate into a [`CatalogEntry`].
    ///
    /// `organization` and `url` fill in fields a remote registry file may omit.
    pub(crate) fn validate(
        self,
        organization: Option<&str>,
        url: Option<&str>,
        location: &str,
    ) -> Result<CatalogEntry, CatalogError> {
        let organization = self
            .organization
            .or_else(|| organization.map(str::to_string));
        let organization = required(organization, "organization", "source", location)?;
        let url = self.url.or_else(|| url.map(str::to_string)).unwrap_or_default();
        let schema_version = self.schema_version.unwrap_or(CATALOG_SCHEMA_VERSION);
        if schema_version > CATALOG_SCHEMA_VERSION {
            tracing::warn!(
                "Catalog for '{}' in {} has schema version {} (supported: {}), reading anyway",
                organization,
                location,
                schema_version,
                CATALOG_SCHEMA_VERSION
            );
        }

        let mut entry = CatalogEntry::new(&organization, &url);
        entry.schema_version = schema_version;
        for (i, raw) in self.project.into_iter().enumerate() {
            let element = format!("{organization} project #{}", i + 1);
            let name = required(raw.name, "name", &element, location)?;
            let version = required(raw.version, "version", &element, location)?;
            let sha256 = required(raw.sha256, "sha256", &element, location)?;
            entry.add_project(&name, raw.branch.as_deref().unwrap_or(""), &version, &sha256);
        }
        for (i, raw) in self.toolchain.into_iter().enumerate() {
            let element = format!("{organization} toolchain #{}", i + 1);
            let name = required(raw.name, "name", &element, location)?;
            let version = required(raw.version, "version", &element, location)?;
            let sha256 = required(raw.sha256, "sha256", &element, location)?;
            entry.add_toolchain(&name, &version, raw.file.as_deref(), &sha256);
        }
        Ok(entry)
    }
}

/// Position at which a new version goes: before the first lower version of
/// its group, or at the end.
fn insertion_point<T>(items: &[T], in_group: impl Fn(&T) -> bool, version_of: impl Fn(&T) -> &str, version: Version) -> usize {
    items
        .iter()
        .position(|item| in_group(item) && Version::parse(version_of(item)) < version)
        .unwrap_or(items.len())
}

impl CatalogEntry {
    pub fn new(organization: &str, url: &str) -> Self {
        CatalogEntry {
            organization: organization.to_string(),
            url: url.to_string(),
            schema_version: CATALOG_SCHEMA_VERSION,
            projects: Vec::new(),
            toolchains: Vec::new(),
        }
    }

    /// Add a project version, or update its hash if the identity exists.
    /// Returns whether the entry changed.
    pub fn add_project(&mut self, name: &str, branch: &str, version: &str, sha256: &str) -> bool {
        if let Some(existing) = self
            .projects
            .iter_mut()
            .find(|p| p.in_group(name, branch) && p.version == version)
        {
            if existing.sha256 == sha256 {
                return false;
            }
            existing.sha256 = sha256.to_string();
            return true;
        }

        let at = insertion_point(
            &self.projects,
            |p| p.in_group(name, branch),
            |p| &p.version,
            Version::parse(version),
        );
        self.projects.insert(
            at,
            ProjectEntry {
                name: name.to_string(),
                branch: branch.to_string(),
                version: version.to_string(),
                sha256: sha256.to_string(),
            },
        );
        true
    }

    /// Add a toolchain version, or update its hash/file if the identity exists.
    pub fn add_toolchain(&mut self, name: &str, version: &str, file: Option<&str>, sha256: &str) -> bool {
        if let Some(existing) = self
            .toolchains
            .iter_mut()
            .find(|t| t.name == name && t.version == version)
        {
            let file = file.map(str::to_string);
            if existing.sha256 == sha256 && existing.file == file {
                return false;
            }
            existing.sha256 = sha256.to_string();
            existing.file = file;
            return true;
        }

        let at = insertion_point(
            &self.toolchains,
            |t| t.name == name,
            |t| &t.version,
            Version::parse(version),
        );
        self.toolchains.insert(
            at,
            ToolchainEntry {
                name: name.to_string(),
                version: version.to_string(),
                file: file.map(str::to_string),
                sha256: sha256.to_string(),
            },
        );
        true
    }

    pub fn delete_project(&mut self, name: &str, branch: &str, version: &str) -> bool {
        let before = self.projects.len();
        self.projects
            .retain(|p| !(p.in_group(name, branch) && p.version == version));
        self.projects.len() != before
    }

    pub fn delete_toolchain(&mut self, name: &str, version: &str) -> bool {
        let before = self.toolchains.len();
        self.toolchains
            .retain(|t| !(t.name == name && t.version == version));
        self.toolchains.len() != before
    }

    /// Keep only the highest version of (name, branch). Returns how many were removed.
    pub fn cleanup_project(&mut self, name: &str, branch: &str) -> usize {
        let Some(keep) = self
            .projects
            .iter()
            .filter(|p| p.in_group(name, branch))
            .max_by_key(|p| Version::parse(&p.version))
            .cloned()
        else {
            return 0;
        };
        let before = self.projects.len();
        self.projects
            .retain(|p| !p.in_group(name, branch) || *p == keep);
        before - self.projects.len()
    }

    /// Keep only the highest version of a toolchain. Returns how many were removed.
    pub fn cleanup_toolchain(&mut self, name: &str) -> usize {
        let Some(keep) = self
            .toolchains
            .iter()
            .filter(|t| t.name == name)
            .max_by_key(|t| Version::parse(&t.version))
            .cloned()
        else {
            return 0;
        };
        let before = self.toolchains.len();
        self.toolchains.retain(|t| t.name != name || *t == keep);
        before - self.toolchains.len()
    }

    pub fn find_project(&self, name: &str, branch: &str, version: &str) -> Option<&ProjectEntry> {
        self.projects
            .iter()
            .find(|p| p.in_group(name, branch) && p.version == version)
    }

    pub fn find_toolchain(&self, name: &str, version: &str) -> Option<&ToolchainEntry> {
        self.toolchains
            .iter()
            .find(|t| t.name == name && t.version == version)
    }

    /// Versions of (name, branch), highest first.
    pub fn project_versions(&self, name: &str, branch: &str) -> Vec<Version> {
        let mut versions: Vec<Version> = self
            .projects
            .iter()
            .filter(|p| p.in_group(name, branch))
            .map(|p| Version::parse(&p.version))
            .collect();
        versions.sort_by(|a, b| b.cmp(a));
        versions.dedup();
        versions
    }

    /// Versions of a toolchain, highest first.
    pub fn toolchain_versions(&self, name: &str) -> Vec<Version> {
        let mut versions: Vec<Version> = self
            .toolchains
            .iter()
            .filter(|t| t.name == name)
            .map(|t| Version::parse(&t.version))
            .collect();
        versions.sort_by(|a, b| b.cmp(a));
        versions.dedup();
        versions
    }

    pub fn latest_project_version(&self, name: &str, branch: &str) -> Option<Version> {
        self.project_versions(name, branch).into_iter().next()
    }

    pub fn latest_toolchain_version(&self, name: &str) -> Option<Version> {
        self.toolchain_versions(name).into_iter().next()
    }
}
