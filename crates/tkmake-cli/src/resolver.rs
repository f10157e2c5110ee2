//! Turn an artifact reference into an installed root
//!
//! Resolution is a fixed fallback chain: the exact version, then the
//! configured default branch and version, then every known version highest
//! first. Anything missing locally but listed in the catalog is installed on
//! the way. Not finding anything is a normal `Ok(None)`.

use crate::errors::ResolveError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tkmake_catalog::{CatalogSet, InstallHelper, ToolchainVariant};
use tkmake_config::{Config, ConfigError, Environment};
use tkmake_naming::codec::split_root_segment;
use tkmake_naming::{install_root, ArtifactRef, BuildConfig, LinkType, Version};

/// Descriptor whose presence marks a project root as installed.
pub const PROJECT_DESCRIPTOR: &str = "thekogans_make.xml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roots {
    pub development: PathBuf,
    pub toolchain: PathBuf,
}

impl Roots {
    pub fn from_config(config: &Config, env: &dyn Environment) -> Result<Self, ConfigError> {
        Ok(Roots {
            development: config.development_root(env)?,
            toolchain: config.toolchain_root(env)?,
        })
    }
}

/// A successfully resolved artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub root: PathBuf,
    pub branch: String,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Project,
    Toolchain,
}

pub struct Resolver<'a> {
    roots: Roots,
    config: &'a Config,
    env: &'a dyn Environment,
    catalog: &'a CatalogSet,
    helper: &'a dyn InstallHelper,
    build_config: BuildConfig,
    link: LinkType,
}

fn is_project_installed(root: &Path) -> bool {
    root.join(PROJECT_DESCRIPTOR).is_file()
}

fn is_toolchain_installed(root: &Path) -> bool {
    std::fs::read_dir(root).is_ok_and(|mut entries| entries.next().is_some())
}

impl<'a> Resolver<'a> {
    pub fn new(
        roots: Roots,
        config: &'a Config,
        env: &'a dyn Environment,
        catalog: &'a CatalogSet,
        helper: &'a dyn InstallHelper,
    ) -> Self {
        Resolver {
            roots,
            config,
            env,
            catalog,
            helper,
            build_config: BuildConfig::Debug,
            link: LinkType::Static,
        }
    }

    /// Configuration and link type requested when installing toolchains.
    pub fn with_toolchain_build(mut self, config: BuildConfig, link: LinkType) -> Self {
        self.build_config = config;
        self.link = link;
        self
    }

    pub fn roots(&self) -> &Roots {
        &self.roots
    }

    /// Resolve a source project.
    pub fn find_project(&self, reference: &ArtifactRef) -> Result<Option<Resolved>, ResolveError> {
        tracing::debug!("Resolving project {}", reference);
        let organization = &reference.organization;
        let project = &reference.project;
        let mut branch = reference.branch.clone();

        if !reference.version.is_empty() {
            if let Some(found) = self.try_version(Target::Project, organization, project, &branch, &reference.version)? {
                return Ok(Some(found));
            }
        }

        if branch.is_empty() {
            branch = self.config.default_branch(organization, project, self.env);
            if !branch.is_empty() {
                tracing::debug!("Using default branch '{}' for {}_{}", branch, organization, project);
                if !reference.version.is_empty() {
                    if let Some(found) =
                        self.try_version(Target::Project, organization, project, &branch, &reference.version)?
                    {
                        return Ok(Some(found));
                    }
                }
            }
        }

        self.find_fallback(Target::Project, organization, project, &branch, &reference.version)
    }

    /// Resolve a toolchain; same chain as projects without a branch.
    pub fn find_toolchain(
        &self,
        organization: &str,
        name: &str,
        version: &str,
    ) -> Result<Option<Resolved>, ResolveError> {
        tracing::debug!("Resolving toolchain {}_{} {}", organization, name, version);
        if !version.is_empty() {
            if let Some(found) = self.try_version(Target::Toolchain, organization, name, "", version)? {
                return Ok(Some(found));
            }
        }
        self.find_fallback(Target::Toolchain, organization, name, "", version)
    }

    /// Default version (only when none was requested), then every known
    /// version highest first. `requested` has already been tried.
    fn find_fallback(
        &self,
        target: Target,
        organization: &str,
        name: &str,
        branch: &str,
        requested: &str,
    ) -> Result<Option<Resolved>, ResolveError> {
        let mut tried: BTreeSet<String> = BTreeSet::new();
        if requested.is_empty() {
            let default_version = self.config.default_version(organization, name, self.env);
            if !default_version.is_empty() {
                tracing::debug!("Using default version '{}' for {}_{}", default_version, organization, name);
                if let Some(found) = self.try_version(target, organization, name, branch, &default_version)? {
                    return Ok(Some(found));
                }
                tried.insert(default_version);
            }
        } else {
            tried.insert(requested.to_string());
        }

        for candidate in self.candidates(target, organization, name, branch)? {
            if !tried.insert(candidate.clone()) {
                continue;
            }
            if let Some(found) = self.try_version(target, organization, name, branch, &candidate)? {
                return Ok(Some(found));
            }
        }
        tracing::debug!("No installable version of {}_{} found", organization, name);
        Ok(None)
    }

    fn base_root(&self, target: Target) -> &Path {
        match target {
            Target::Project => &self.roots.development,
            Target::Toolchain => &self.roots.toolchain,
        }
    }

    /// Installed and catalog versions, highest first.
    fn candidates(
        &self,
        target: Target,
        organization: &str,
        name: &str,
        branch: &str,
    ) -> Result<Vec<String>, ResolveError> {
        let mut versions: BTreeSet<Version> = BTreeSet::new();

        let dir = self.base_root(target).join(organization).join(name);
        match std::fs::read_dir(&dir) {
            Ok(entries) => {
                for entry in entries.filter_map(Result::ok) {
                    let segment = entry.file_name().to_string_lossy().into_owned();
                    let (found_branch, found_version) = split_root_segment(&segment);
                    if found_branch != branch {
                        continue;
                    }
                    if let Some(version) = Version::try_parse(&found_version) {
                        versions.insert(version);
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ResolveError::io(&dir, e)),
        }

        if let Some(entry) = self.catalog.get(organization) {
            let listed = match target {
                Target::Project => entry.project_versions(name, branch),
                Target::Toolchain => entry.toolchain_versions(name),
            };
            versions.extend(listed.into_iter().filter(|v| !v.is_empty()));
        }

        Ok(versions.iter().rev().map(ToString::to_string).collect())
    }

    fn is_installed(target: Target, root: &Path) -> bool {
        match target {
            Target::Project => is_project_installed(root),
            Target::Toolchain => is_toolchain_installed(root),
        }
    }

    fn in_catalog(&self, target: Target, organization: &str, name: &str, branch: &str, version: &str) -> bool {
        self.catalog.get(organization).is_some_and(|entry| match target {
            Target::Project => entry.find_project(name, branch, version).is_some(),
            Target::Toolchain => entry.find_toolchain(name, version).is_some(),
        })
    }

    /// Check one exact identity, installing it from the catalog if needed.
    fn try_version(
        &self,
        target: Target,
        organization: &str,
        name: &str,
        branch: &str,
        version: &str,
    ) -> Result<Option<Resolved>, ResolveError> {
        let root = install_root(self.base_root(target), organization, name, branch, version, "");
        let resolved = || Resolved {
            root: root.clone(),
            branch: branch.to_string(),
            version: version.to_string(),
        };

        if Self::is_installed(target, &root) {
            tracing::debug!("Found {}", root.display());
            return Ok(Some(resolved()));
        }
        if !self.in_catalog(target, organization, name, branch, version) {
            return Ok(None);
        }

        let outcome = match target {
            Target::Project => self.catalog.get_source_project(
                organization,
                name,
                branch,
                version,
                &root,
                self.helper,
            ),
            Target::Toolchain => self.catalog.install_source_toolchain(
                &ToolchainVariant {
                    organization,
                    name,
                    version,
                    config: self.build_config,
                    link: self.link,
                },
                &root,
                self.helper,
            ),
        };
        if let Err(e) = outcome {
            tracing::warn!("Install of {} failed: {}", root.display(), e);
        }

        if Self::is_installed(target, &root) {
            return Ok(Some(resolved()));
        }
        if root.exists() {
            tracing::warn!("Removing incomplete install {}", root.display());
            std::fs::remove_dir_all(&root).map_err(|e| ResolveError::io(&root, e))?;
        }
        Ok(None)
    }
}
