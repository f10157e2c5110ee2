//! Reversible mapping between artifact identities and on-disk names
//!
//! Names have the shape `organization_project[-branch][-version][.ext]`.
//! Install roots and goal paths are derived from the same identity, with the
//! naming convention deciding whether branch/config/type become directory
//! segments (Hierarchical) or file name decorations (Flat).

use crate::types::{ArtifactKind, BuildConfig, LinkType, NamingConvention};
use std::path::{Path, PathBuf};

pub const EXAMPLES_DIR: &str = "examples";
pub const LIB_DIR: &str = "lib";
pub const BIN_DIR: &str = "bin";

#[cfg(windows)]
const SHARED_SUFFIX: &str = ".dll";
#[cfg(target_os = "macos")]
const SHARED_SUFFIX: &str = ".dylib";
#[cfg(not(any(windows, target_os = "macos")))]
const SHARED_SUFFIX: &str = ".so";

#[cfg(windows)]
const STATIC_SUFFIX: &str = ".lib";
#[cfg(not(windows))]
const STATIC_SUFFIX: &str = ".a";

#[cfg(windows)]
const PROGRAM_SUFFIX: &str = ".exe";
#[cfg(not(windows))]
const PROGRAM_SUFFIX: &str = "";

#[cfg(windows)]
const LIBRARY_PREFIX: &str = "";
#[cfg(not(windows))]
const LIBRARY_PREFIX: &str = "lib";

/// Build `organization_project[-branch][-version][.ext]`.
pub fn encode_name(
    organization: &str,
    project: &str,
    branch: &str,
    version: &str,
    extension: &str,
) -> String {
    let mut name = format!("{organization}_{project}");
    for part in [branch, version] {
        if !part.is_empty() {
            name.push('-');
            name.push_str(part);
        }
    }
    if !extension.is_empty() {
        name.push('.');
        name.push_str(extension.trim_start_matches('.'));
    }
    name
}

/// Result of [`decode_name`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedName {
    pub organization: String,
    pub project: String,
    pub branch: Option<String>,
    pub version: Option<String>,
    pub extension: Option<String>,
    /// A version was recognized with no branch before it. The same text could
    /// have been produced by a version-shaped branch and no version.
    pub ambiguous: bool,
}

/// Inverse of [`encode_name`].
///
/// The version is the first `-`-introduced `N.N[.N]` token that ends the name
/// or is followed by a non-numeric `.ext`. A branch shaped like a version is
/// indistinguishable from one when nothing follows it; such results carry
/// `ambiguous = true`. A version with more than three numeric components is
/// rejected.
pub fn decode_name(name: &str) -> Option<DecodedName> {
    let (organization, rest) = name.split_once('_')?;
    if organization.is_empty() || rest.is_empty() {
        return None;
    }

    let (head, version, extension) = match find_version(rest) {
        VersionScan::TooLong => return None,
        VersionScan::Found(start, end) => {
            let tail = &rest[end..];
            let extension = tail.strip_prefix('.').map(str::to_string);
            (
                &rest[..start],
                Some(rest[start + 1..end].to_string()),
                extension,
            )
        }
        VersionScan::Absent => match rest.split_once('.') {
            Some((head, ext)) => (head, None, Some(ext.to_string())),
            None => (rest, None, None),
        },
    };

    let (project, branch) = match head.split_once('-') {
        Some((project, branch)) => (project, Some(branch.to_string())),
        None => (head, None),
    };
    if project.is_empty() || branch.as_deref() == Some("") {
        return None;
    }

    let ambiguous = version.is_some() && branch.is_none();
    Some(DecodedName {
        organization: organization.to_string(),
        project: project.to_string(),
        branch,
        version,
        extension: extension.filter(|e| !e.is_empty()),
        ambiguous,
    })
}

enum VersionScan {
    /// Index of the '-' and end of the token.
    Found(usize, usize),
    /// A `-N.N.N` token runs on into more numeric components.
    TooLong,
    Absent,
}

/// Locate `-N.N[.N]`.
fn find_version(s: &str) -> VersionScan {
    let bytes = s.as_bytes();
    let mut too_long = false;
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'-' {
            continue;
        }
        let Some(len) = version_token_len(&bytes[i + 1..]) else {
            continue;
        };
        let end = i + 1 + len;
        let tail = &bytes[end..];
        match tail {
            [] => return VersionScan::Found(i, end),
            [b'.', next, ..] if !next.is_ascii_digit() => return VersionScan::Found(i, end),
            [b'.', ..] => too_long = true,
            _ => {}
        }
    }
    if too_long {
        VersionScan::TooLong
    } else {
        VersionScan::Absent
    }
}

fn version_token_len(bytes: &[u8]) -> Option<usize> {
    let digits = |from: usize| bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count();

    let major = digits(0);
    if major == 0 || bytes.get(major) != Some(&b'.') {
        return None;
    }
    let minor_start = major + 1;
    let minor = digits(minor_start);
    if minor == 0 {
        return None;
    }
    let mut end = minor_start + minor;
    if bytes.get(end) == Some(&b'.') {
        let patch = digits(end + 1);
        if patch > 0 {
            end += 1 + patch;
        }
    }
    Some(end)
}

/// Join two path or URL fragments with a single `/`.
///
/// Backslashes become `/` and an empty operand leaves the other unchanged.
pub fn join(a: &str, b: &str) -> String {
    let a = a.replace('\\', "/");
    let b = b.replace('\\', "/");
    if a.is_empty() {
        return b;
    }
    if b.is_empty() {
        return a;
    }
    format!("{}/{}", a.trim_end_matches('/'), b.trim_start_matches('/'))
}

/// `root/organization/project_dir[/branch-version][/examples/example]`
///
/// The optional segment is the non-empty parts of (branch, version) joined by `-`.
pub fn install_root(
    root: &Path,
    organization: &str,
    project_dir: &str,
    branch: &str,
    version: &str,
    example: &str,
) -> PathBuf {
    let mut path = root.join(organization).join(project_dir);
    let segment = [branch, version]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("-");
    if !segment.is_empty() {
        path.push(segment);
    }
    if !example.is_empty() {
        path.push(EXAMPLES_DIR);
        path.push(example);
    }
    path
}

/// Inverse of the optional install root segment: `branch-version`, `version` or `branch`.
pub fn split_root_segment(segment: &str) -> (String, String) {
    if crate::Version::try_parse(segment).is_some() {
        return (String::new(), segment.to_string());
    }
    match segment.rsplit_once('-') {
        Some((branch, version)) if crate::Version::try_parse(version).is_some() => {
            (branch.to_string(), version.to_string())
        }
        _ => (segment.to_string(), String::new()),
    }
}

/// `arch-os` of the compilation target.
pub fn host_triplet() -> String {
    format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS)
}

/// Everything needed to name a build goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalName {
    pub organization: String,
    pub project: String,
    pub example: String,
    pub branch: String,
    pub version: String,
    pub kind: ArtifactKind,
    pub convention: NamingConvention,
    pub config: BuildConfig,
    pub link: LinkType,
    pub triplet: String,
}

impl GoalName {
    pub fn new(organization: &str, project: &str, kind: ArtifactKind) -> Self {
        GoalName {
            organization: organization.to_string(),
            project: project.to_string(),
            example: String::new(),
            branch: String::new(),
            version: String::new(),
            kind,
            convention: NamingConvention::Flat,
            config: BuildConfig::Debug,
            link: LinkType::Static,
            triplet: host_triplet(),
        }
    }

    fn prefix(&self) -> &'static str {
        match self.kind {
            ArtifactKind::Library => LIBRARY_PREFIX,
            ArtifactKind::Program | ArtifactKind::Plugin => "",
        }
    }

    fn suffix(&self) -> &'static str {
        match (self.kind, self.link) {
            (ArtifactKind::Library, LinkType::Static) => STATIC_SUFFIX,
            (ArtifactKind::Library, LinkType::Shared) | (ArtifactKind::Plugin, _) => SHARED_SUFFIX,
            (ArtifactKind::Program, _) => PROGRAM_SUFFIX,
        }
    }

    fn output_dir(&self) -> &'static str {
        match self.kind {
            ArtifactKind::Program => BIN_DIR,
            ArtifactKind::Library | ArtifactKind::Plugin => LIB_DIR,
        }
    }

    /// File name of the goal, without any directory.
    pub fn file_name(&self) -> String {
        let mut name = format!("{}{}_{}", self.prefix(), self.organization, self.project);
        if !self.example.is_empty() {
            name.push('_');
            name.push_str(&self.example);
        }
        if self.convention == NamingConvention::Flat {
            name.push_str(&format!("-{}-{}-{}", self.triplet, self.config, self.link));
        }
        if !self.version.is_empty() {
            name.push('-');
            name.push_str(&self.version);
        }
        name.push_str(self.suffix());
        name
    }

    /// `root/{lib|bin}[/branch/config/type]/file_name`
    pub fn goal_path(&self, root: &Path) -> PathBuf {
        let mut path = root.join(self.output_dir());
        if self.convention == NamingConvention::Hierarchical {
            if !self.branch.is_empty() {
                path.push(&self.branch);
            }
            path.push(self.config.as_str());
            path.push(self.link.as_str());
        }
        path.join(self.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoded(
        project: &str,
        branch: Option<&str>,
        version: Option<&str>,
        ext: Option<&str>,
    ) -> DecodedName {
        DecodedName {
            organization: "acme".to_string(),
            project: project.to_string(),
            branch: branch.map(str::to_string),
            version: version.map(str::to_string),
            extension: ext.map(str::to_string),
            ambiguous: version.is_some() && branch.is_none(),
        }
    }

    #[test]
    fn test_decode_all_six_shapes() {
        let cases = [
            ("acme_widget", decoded("widget", None, None, None)),
            ("acme_widget.tar.gz", decoded("widget", None, None, Some("tar.gz"))),
            ("acme_widget-dev", decoded("widget", Some("dev"), None, None)),
            (
                "acme_widget-dev.tar.gz",
                decoded("widget", Some("dev"), None, Some("tar.gz")),
            ),
            (
                "acme_widget-dev-1.2.3",
                decoded("widget", Some("dev"), Some("1.2.3"), None),
            ),
            (
                "acme_widget-1.2.3.tar.gz",
                decoded("widget", None, Some("1.2.3"), Some("tar.gz")),
            ),
        ];
        for (input, expected) in cases {
            assert_eq!(decode_name(input), Some(expected), "decoding {input}");
        }
    }

    #[test]
    fn test_encode_decode_inverse() {
        let name = encode_name("acme", "widget", "feature", "2.0.1", "tar.gz");
        assert_eq!(name, "acme_widget-feature-2.0.1.tar.gz");
        let d = decode_name(&name);
        assert_eq!(
            d,
            Some(decoded("widget", Some("feature"), Some("2.0.1"), Some("tar.gz")))
        );
    }

    #[test]
    fn test_version_shaped_branch_is_read_as_version() {
        let d = decode_name("acme_widget-1.4").unwrap_or_default();
        assert_eq!(d.version.as_deref(), Some("1.4"));
        assert_eq!(d.branch, None);
        assert!(d.ambiguous);

        let d = decode_name("acme_widget-1.4-2.0.0").unwrap_or_default();
        assert_eq!(d.branch.as_deref(), Some("1.4"));
        assert_eq!(d.version.as_deref(), Some("2.0.0"));
        assert!(!d.ambiguous);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(decode_name("widget"), None);
        assert_eq!(decode_name("_widget"), None);
        assert_eq!(decode_name("acme_"), None);
    }

    #[test]
    fn test_decode_rejects_four_part_version() {
        assert_eq!(decode_name("acme_widget-1.2.3.4"), None);
        assert_eq!(decode_name("acme_widget-dev-1.2.3.4.tar.gz"), None);
        let Some(d) = decode_name("acme_widget-1.2.3.tar.gz") else {
            panic!("three-part version must decode");
        };
        assert_eq!(d.version.as_deref(), Some("1.2.3"));
        assert_eq!(d.extension.as_deref(), Some("tar.gz"));
    }

    #[test]
    fn test_join() {
        assert_eq!(join("a/", "/b"), "a/b");
        assert_eq!(join("", "b"), "b");
        assert_eq!(join("a\\x", ""), "a/x");
        assert_eq!(join("https://host/reg", "acme"), "https://host/reg/acme");
    }

    #[test]
    fn test_install_root_segments() {
        let root = Path::new("/dev");
        assert_eq!(
            install_root(root, "acme", "widget", "", "", ""),
            PathBuf::from("/dev/acme/widget")
        );
        assert_eq!(
            install_root(root, "acme", "widget", "dev", "1.0.0", "demo"),
            PathBuf::from("/dev/acme/widget/dev-1.0.0/examples/demo")
        );
        assert_eq!(
            install_root(root, "acme", "widget", "", "1.0.0", ""),
            PathBuf::from("/dev/acme/widget/1.0.0")
        );
    }

    #[test]
    fn test_split_root_segment() {
        assert_eq!(
            split_root_segment("1.2.3"),
            (String::new(), "1.2.3".to_string())
        );
        assert_eq!(
            split_root_segment("feature-x-1.2.3"),
            ("feature-x".to_string(), "1.2.3".to_string())
        );
        assert_eq!(split_root_segment("dev"), ("dev".to_string(), String::new()));
    }

    #[test]
    fn test_goal_paths() {
        let mut goal = GoalName::new("acme", "widget", ArtifactKind::Program);
        goal.version = "1.0.0".to_string();
        goal.triplet = "x86_64-linux".to_string();
        let flat = goal.goal_path(Path::new("/r"));
        assert!(flat
            .to_string_lossy()
            .starts_with("/r/bin/acme_widget-x86_64-linux-Debug-Static-1.0.0"));

        goal.convention = NamingConvention::Hierarchical;
        goal.branch = "dev".to_string();
        goal.kind = ArtifactKind::Plugin;
        goal.link = LinkType::Shared;
        let nested = goal.goal_path(Path::new("/r"));
        let expected = format!("/r/lib/dev/Debug/Shared/acme_widget-1.0.0{SHARED_SUFFIX}");
        assert_eq!(nested, PathBuf::from(expected));
    }
}
