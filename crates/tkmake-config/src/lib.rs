//! Configuration for tkmake
//!
//! A small TOML file under `~/.config/tkmake/` holds the install roots,
//! global default branch/version and tool locations. Anything not configured
//! falls back to the environment (`DEVELOPMENT_ROOT`, `TOOLCHAIN_ROOT`) or to
//! a `PATH` lookup.

pub mod config;
pub mod environment;

pub use config::{Config, ConfigError, HELPER_BINARY, KEYS};
pub use environment::{Environment, ProcessEnv};
