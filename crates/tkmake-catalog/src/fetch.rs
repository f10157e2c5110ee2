//! Download, verify and unpack one catalog archive
//!
//! The archive is hashed before anything touches the destination. It is then
//! unpacked into a temporary directory beside the destination and renamed
//! into place, so a failed fetch never leaves a partial install root behind.

use crate::errors::CatalogError;
use crate::transport::Transport;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tkmake_naming::codec::join;
use tkmake_naming::{encode_name, BuildConfig, LinkType};

pub const ARCHIVE_EXTENSION: &str = "tar.gz";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchKind {
    Project {
        branch: String,
    },
    Toolchain {
        file: Option<String>,
        config: BuildConfig,
        link: LinkType,
    },
}

/// Everything the install helper needs to materialize one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub organization: String,
    pub url: String,
    pub name: String,
    pub version: String,
    pub sha256: String,
    pub destination: PathBuf,
    pub kind: FetchKind,
}

impl FetchRequest {
    /// `org_project[-branch]-version.tar.gz`, `org_name-version.tar.gz`, or
    /// the toolchain's explicit file.
    pub fn archive_name(&self) -> String {
        match &self.kind {
            FetchKind::Project { branch } => encode_name(
                &self.organization,
                &self.name,
                branch,
                &self.version,
                ARCHIVE_EXTENSION,
            ),
            FetchKind::Toolchain {
                file: Some(file), ..
            } if !file.is_empty() => file.clone(),
            FetchKind::Toolchain { .. } => encode_name(
                &self.organization,
                &self.name,
                "",
                &self.version,
                ARCHIVE_EXTENSION,
            ),
        }
    }

    pub fn archive_url(&self) -> String {
        join(&join(&self.url, &self.organization), &self.archive_name())
    }

    pub fn identity(&self) -> String {
        match &self.kind {
            FetchKind::Project { branch } if !branch.is_empty() => {
                format!("{}_{}-{}-{}", self.organization, self.name, branch, self.version)
            }
            _ => format!("{}_{}-{}", self.organization, self.name, self.version),
        }
    }

    /// Command line for the helper binary.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("-o:{}", self.organization),
            format!("-u:{}", self.url),
            format!("-p:{}", self.name),
        ];
        match &self.kind {
            FetchKind::Project { branch } => {
                if !branch.is_empty() {
                    args.push(format!("-b:{branch}"));
                }
                args.push(format!("-v:{}", self.version));
            }
            FetchKind::Toolchain { file, config, link } => {
                args.push(format!("-v:{}", self.version));
                if let Some(file) = file.as_deref().filter(|f| !f.is_empty()) {
                    args.push(format!("-f:{file}"));
                }
                args.push(format!("-c:{config}"));
                args.push(format!("-t:{link}"));
            }
        }
        args.push(format!("-s:{}", self.sha256));
        args.push(format!("-r:{}", self.destination.display()));
        args
    }

    /// Parse a helper command line. `-c`/`-t` mark a toolchain request.
    pub fn from_args<I, S>(args: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut organization = None;
        let mut url = None;
        let mut name = None;
        let mut branch = String::new();
        let mut version = None;
        let mut file = None;
        let mut config = None;
        let mut link = None;
        let mut sha256 = None;
        let mut destination = None;

        for arg in args {
            let arg = arg.as_ref();
            let Some((flag, value)) = arg.strip_prefix('-').and_then(|a| a.split_once(':')) else {
                return Err(CatalogError::InvalidArgs(format!("unrecognized argument '{arg}'")));
            };
            let value = value.to_string();
            match flag {
                "o" => organization = Some(value),
                "u" => url = Some(value),
                "p" => name = Some(value),
                "b" => branch = value,
                "v" => version = Some(value),
                "f" => file = Some(value),
                "c" => {
                    config = Some(value.parse::<BuildConfig>().map_err(|e| {
                        CatalogError::InvalidArgs(format!("-c: {e}"))
                    })?);
                }
                "t" => {
                    link = Some(value.parse::<LinkType>().map_err(|e| {
                        CatalogError::InvalidArgs(format!("-t: {e}"))
                    })?);
                }
                "s" => sha256 = Some(value),
                "r" => destination = Some(PathBuf::from(value)),
                other => {
                    return Err(CatalogError::InvalidArgs(format!("unknown flag '-{other}'")));
                }
            }
        }

        fn need<T>(value: Option<T>, flag: &str) -> Result<T, CatalogError> {
            value.ok_or_else(|| CatalogError::InvalidArgs(format!("missing -{flag}:")))
        }

        let kind = match (config, link) {
            (None, None) => {
                if file.is_some() {
                    return Err(CatalogError::InvalidArgs(
                        "-f: only applies to toolchains".to_string(),
                    ));
                }
                FetchKind::Project { branch }
            }
            (config, link) => FetchKind::Toolchain {
                file,
                config: need(config, "c")?,
                link: need(link, "t")?,
            },
        };

        Ok(FetchRequest {
            organization: need(organization, "o")?,
            url: need(url, "u")?,
            name: need(name, "p")?,
            version: need(version, "v")?,
            sha256: need(sha256, "s")?,
            destination: need(destination, "r")?,
            kind,
        })
    }
}

/// Compare `bytes` with an expected hex digest, case-insensitively.
/// A leading `sha256:` on the expectation is ignored.
pub fn verify_sha256(url: &str, bytes: &[u8], expected: &str) -> Result<(), CatalogError> {
    let actual = hex::encode(Sha256::digest(bytes));
    let expected = expected.trim();
    let expected = expected.strip_prefix("sha256:").unwrap_or(expected);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(CatalogError::HashMismatch {
            url: url.to_string(),
            expected: expected.to_string(),
            actual,
        })
    }
}

fn unpack(bytes: &[u8], dest: &Path) -> Result<(), CatalogError> {
    let decoder = flate2::read::GzDecoder::new(Cursor::new(bytes));
    let mut archive = tar::Archive::new(decoder);
    archive.unpack(dest).map_err(|e| CatalogError::io(dest, e))
}

/// The directory holding the unpacked contents: a lone top-level directory
/// is stripped.
fn content_root(dir: &Path, request: &FetchRequest) -> Result<PathBuf, CatalogError> {
    let entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| CatalogError::io(dir, e))?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .collect();
    match entries.as_slice() {
        [only] if only.is_dir() && is_wrapper(only, request) => Ok(only.clone()),
        _ => Ok(dir.to_path_buf()),
    }
}

/// A wrapper directory is named after the artifact (`widget`,
/// `widget-1.2.0`, `acme_widget-1.2.0`). Anything else is content.
fn is_wrapper(path: &Path, request: &FetchRequest) -> bool {
    let Some(dir_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let encoded = format!("{}_{}", request.organization, request.name);
    [request.name.as_str(), encoded.as_str()].iter().any(|stem| {
        dir_name
            .strip_prefix(stem)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('-'))
    })
}

fn remove_existing(path: &Path) -> Result<(), CatalogError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CatalogError::io(path, e)),
    }
}

/// Fetch the archive for `request`, verify it and install it at
/// `request.destination`, replacing whatever was there.
pub fn fetch_verify_unpack(
    transport: &dyn Transport,
    request: &FetchRequest,
) -> Result<PathBuf, CatalogError> {
    let url = request.archive_url();
    tracing::info!("Fetching {} from {}", request.identity(), url);
    let bytes = transport.get(&url)?;
    verify_sha256(&url, &bytes, &request.sha256)?;
    tracing::debug!("Verified sha256 of {}", url);

    let dest = &request.destination;
    let parent = dest.parent().ok_or_else(|| CatalogError::Install {
        identity: request.identity(),
        reason: format!("destination {} has no parent directory", dest.display()),
    })?;
    std::fs::create_dir_all(parent).map_err(|e| CatalogError::io(parent, e))?;

    let staging = tempfile::Builder::new()
        .prefix(".tkmake-fetch-")
        .tempdir_in(parent)
        .map_err(|e| CatalogError::io(parent, e))?;
    unpack(&bytes, staging.path())?;
    let root = content_root(staging.path(), request)?;

    remove_existing(dest)?;
    std::fs::rename(&root, dest).map_err(|e| CatalogError::io(dest, e))?;
    tracing::info!("Installed {} at {}", request.identity(), dest.display());
    Ok(dest.clone())
}
