//! Identity and classification types shared across tkmake crates

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Abstract reference to an artifact. Empty branch/version mean "default"/"latest".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub organization: String,
    pub project: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub branch: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

impl ArtifactRef {
    pub fn new(organization: &str, project: &str, branch: &str, version: &str) -> Self {
        ArtifactRef {
            organization: organization.to_string(),
            project: project.to_string(),
            branch: branch.to_string(),
            version: version.to_string(),
        }
    }

    pub fn with_branch(&self, branch: &str) -> Self {
        ArtifactRef {
            branch: branch.to_string(),
            ..self.clone()
        }
    }

    pub fn with_version(&self, version: &str) -> Self {
        ArtifactRef {
            version: version.to_string(),
            ..self.clone()
        }
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.organization, self.project)?;
        if !self.branch.is_empty() {
            write!(f, " branch {}", self.branch)?;
        }
        if !self.version.is_empty() {
            write!(f, " version {}", self.version)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseKindError(pub String);

impl fmt::Display for ParseKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized value: {}", self.0)
    }
}

impl std::error::Error for ParseKindError {}

macro_rules! named_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseKindError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s))
                    .ok_or_else(|| ParseKindError(s.to_string()))
            }
        }
    };
}

named_enum! {
    /// What a project produces; selects the output directory and file suffix.
    ArtifactKind {
        Library => "Library",
        Program => "Program",
        Plugin => "Plugin",
    }
}

named_enum! {
    /// Flat embeds branch/config/type in the file name, Hierarchical uses directories.
    NamingConvention {
        Flat => "Flat",
        Hierarchical => "Hierarchical",
    }
}

named_enum! {
    BuildConfig {
        Debug => "Debug",
        Release => "Release",
    }
}

named_enum! {
    LinkType {
        Static => "Static",
        Shared => "Shared",
    }
}
