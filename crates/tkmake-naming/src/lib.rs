//! Naming primitives for tkmake
//!
//! Pure functions and small value types shared by every other crate:
//! artifact identities, the file name codec, install/goal path layout and
//! version ordering.

pub mod codec;
pub mod types;
pub mod version;

pub use codec::{decode_name, encode_name, install_root, DecodedName, GoalName};
pub use types::{ArtifactKind, ArtifactRef, BuildConfig, LinkType, NamingConvention};
pub use version::Version;
