//! Remote catalogs of installable projects and toolchains
//!
//! Each organization publishes a `Source.toml` listing versions and the
//! SHA-256 of their archives. The local [`CatalogSet`] caches every known
//! organization and installs entries through an [`InstallHelper`].

pub mod entry;
pub mod errors;
pub mod fetch;
pub mod helper;
pub mod set;
pub mod transport;

pub use entry::{CatalogEntry, ProjectEntry, ToolchainEntry};
pub use errors::CatalogError;
pub use fetch::{fetch_verify_unpack, FetchKind, FetchRequest};
pub use helper::{InProcessHelper, InstallHelper, ProcessHelper};
pub use set::{CatalogSet, RefreshReport, ToolchainVariant, SOURCES_FILE_NAME, SOURCE_FILE_NAME};
pub use transport::{DefaultTransport, LocalTransport, Transport};
