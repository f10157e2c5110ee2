use crate::environment::{
    scoped_key, Environment, CONFIG_OVERRIDE, DEVELOPMENT_ROOT, TOOLCHAIN_ROOT,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use which::which;

/// Name of the fetch/unpack helper binary looked up on `PATH`.
pub const HELPER_BINARY: &str = "tkmake-fetch";

/// Keys accepted by [`Config::get`] and [`Config::set`].
pub const KEYS: &[&str] = &[
    "development-root",
    "toolchain-root",
    "default-branch",
    "default-version",
    "helper-path",
    "make-path",
];

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
    /// A root directory is neither configured nor exported.
    MissingRoot(&'static str),
    /// A required external tool could not be found.
    ToolNotFound(String),
    UnknownKey(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::Serialize(e) => write!(f, "Failed to serialize config: {}", e),
            ConfigError::MissingRoot(var) => write!(
                f,
                "{} is not set; export it or run `tkmake config set {} <path>`",
                var,
                var.to_ascii_lowercase().replace('_', "-")
            ),
            ConfigError::ToolNotFound(tool) => write!(f, "Could not find '{}' on PATH", tool),
            ConfigError::UnknownKey(key) => {
                write!(f, "Unknown config key '{}' (expected one of: {})", key, KEYS.join(", "))
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(e: toml::ser::Error) -> Self {
        ConfigError::Serialize(e)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub development_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub helper_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make_path: Option<String>,
}

impl Config {
    pub fn path() -> PathBuf {
        // Honor explicit override via TKMAKE_CONFIG for tests / isolated runs.
        if let Ok(env_path) = std::env::var(CONFIG_OVERRIDE) {
            let trimmed = env_path.trim();
            if !trimmed.is_empty() {
                return PathBuf::from(trimmed);
            }
        }

        #[cfg(not(target_os = "windows"))]
        {
            dirs::home_dir().map_or_else(
                || PathBuf::from(".config/tkmake/tkmake.toml"),
                |h| h.join(".config").join("tkmake").join("tkmake.toml"),
            )
        }

        #[cfg(target_os = "windows")]
        {
            dirs::config_dir().map_or_else(
                || PathBuf::from("config\\tkmake\\tkmake.toml"),
                |c| c.join("tkmake").join("tkmake.toml"),
            )
        }
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(&Self::path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to_path(&Self::path())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        match key {
            "development-root" => Some(&mut self.development_root),
            "toolchain-root" => Some(&mut self.toolchain_root),
            "default-branch" => Some(&mut self.default_branch),
            "default-version" => Some(&mut self.default_version),
            "helper-path" => Some(&mut self.helper_path),
            "make-path" => Some(&mut self.make_path),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "development-root" => self.development_root.clone(),
            "toolchain-root" => self.toolchain_root.clone(),
            "default-branch" => self.default_branch.clone(),
            "default-version" => self.default_version.clone(),
            "helper-path" => self.helper_path.clone(),
            "make-path" => self.make_path.clone(),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: String) -> Result<(), ConfigError> {
        let slot = self
            .slot(key)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        *slot = Some(value);
        Ok(())
    }

    pub fn unset(&mut self, key: &str) -> Result<(), ConfigError> {
        let slot = self
            .slot(key)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        *slot = None;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        KEYS.iter().all(|key| self.get(key).is_none())
    }

    pub fn values_iter(&self) -> Vec<(&'static str, String)> {
        KEYS.iter()
            .filter_map(|key| self.get(key).map(|v| (*key, v)))
            .collect()
    }

    /// Root under which source projects are installed.
    pub fn development_root(&self, env: &dyn Environment) -> Result<PathBuf, ConfigError> {
        self.development_root
            .clone()
            .or_else(|| env.var(DEVELOPMENT_ROOT))
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingRoot(DEVELOPMENT_ROOT))
    }

    /// Root under which toolchains and the aggregate catalog cache live.
    pub fn toolchain_root(&self, env: &dyn Environment) -> Result<PathBuf, ConfigError> {
        self.toolchain_root
            .clone()
            .or_else(|| env.var(TOOLCHAIN_ROOT))
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingRoot(TOOLCHAIN_ROOT))
    }

    /// Branch used when a reference leaves it empty.
    ///
    /// `<ORG>_<PROJECT>_DEFAULT_BRANCH`, then `<ORG>_DEFAULT_BRANCH`, then the
    /// configured global default. Empty when none is set.
    pub fn default_branch(&self, organization: &str, project: &str, env: &dyn Environment) -> String {
        scoped_default(
            organization,
            project,
            "DEFAULT_BRANCH",
            self.default_branch.as_deref(),
            env,
        )
    }

    /// Version used when a reference leaves it empty; same precedence as branches.
    pub fn default_version(
        &self,
        organization: &str,
        project: &str,
        env: &dyn Environment,
    ) -> String {
        scoped_default(
            organization,
            project,
            "DEFAULT_VERSION",
            self.default_version.as_deref(),
            env,
        )
    }

    /// Location of the fetch/unpack helper.
    ///
    /// Configured path, then `PATH`, then next to the running executable.
    pub fn helper_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = self.helper_path.as_deref() {
            return Ok(PathBuf::from(path));
        }
        if let Ok(path) = which(HELPER_BINARY) {
            return Ok(path);
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(HELPER_BINARY)))
            .filter(|candidate| candidate.exists())
            .ok_or_else(|| ConfigError::ToolNotFound(HELPER_BINARY.to_string()))
    }

    /// Location of the make-compatible build driver.
    pub fn make_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = self.make_path.as_deref() {
            return Ok(PathBuf::from(path));
        }
        which("make").map_err(|_| ConfigError::ToolNotFound("make".to_string()))
    }
}

fn scoped_default(
    organization: &str,
    project: &str,
    suffix: &str,
    global: Option<&str>,
    env: &dyn Environment,
) -> String {
    env.var(&scoped_key(&[organization, project], suffix))
        .or_else(|| env.var(&scoped_key(&[organization], suffix)))
        .or_else(|| global.map(str::to_string))
        .unwrap_or_default()
}
