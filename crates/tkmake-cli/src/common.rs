//! Common types and utilities shared across commands

use crate::errors::CliError;
use crate::resolver::Roots;
use clap::Parser;
use std::path::PathBuf;
use tkmake_catalog::{CatalogSet, ProcessHelper, SOURCES_FILE_NAME};
use tkmake_config::{Config, ProcessEnv};

/// Directory under the development root holding per-organization catalogs.
pub const SOURCES_DIR: &str = "sources";

/// Global CLI options available to all commands
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    #[arg(short, long, global = true, help = "Only show warnings and errors")]
    pub quiet: bool,

    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "Increase verbosity (-v for debug, -vv for trace)")]
    pub verbose: u8,

    #[arg(long, global = true, help = "Only write log messages to the log file")]
    pub no_stdout: bool,
}

impl GlobalOpts {
    /// Get the effective verbosity level
    /// - 0: quiet/warn only
    /// - 1: debug (-v)
    /// - 2: trace (-vv)
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

/// Configuration plus the locations derived from it.
pub struct Context {
    pub config: Config,
    pub env: ProcessEnv,
}

impl Context {
    pub fn load() -> Result<Self, CliError> {
        Ok(Context {
            config: Config::load()?,
            env: ProcessEnv,
        })
    }

    pub fn roots(&self) -> Result<Roots, CliError> {
        Ok(Roots::from_config(&self.config, &self.env)?)
    }

    /// `$TOOLCHAIN_ROOT/Sources.toml`
    pub fn catalog_path(&self) -> Result<PathBuf, CliError> {
        Ok(self.config.toolchain_root(&self.env)?.join(SOURCES_FILE_NAME))
    }

    /// `$DEVELOPMENT_ROOT/sources`
    pub fn sources_dir(&self) -> Result<PathBuf, CliError> {
        Ok(self.config.development_root(&self.env)?.join(SOURCES_DIR))
    }

    pub fn load_catalog(&self) -> Result<CatalogSet, CliError> {
        Ok(CatalogSet::load(&self.catalog_path()?)?)
    }

    pub fn helper(&self) -> Result<ProcessHelper, CliError> {
        Ok(ProcessHelper::new(self.config.helper_path()?))
    }
}
