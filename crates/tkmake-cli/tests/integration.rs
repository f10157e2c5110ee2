//! Integration tests for tkmake

use assert_cmd::{cargo::cargo_bin_cmd, Command};
use flate2::write::GzEncoder;
use flate2::Compression;
use predicates::prelude::*;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Isolated home, config file and install roots for one test.
struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Option<Self> {
        let dir = TempDir::new().ok()?;
        let sandbox = Sandbox { dir };
        fs::create_dir_all(sandbox.home()).ok()?;
        let config = format!(
            "development-root = '{}'\ntoolchain-root = '{}'\nhelper-path = '{}'\n",
            sandbox.development_root().display(),
            sandbox.toolchain_root().display(),
            env!("CARGO_BIN_EXE_tkmake-fetch"),
        );
        fs::write(sandbox.config_path(), config).ok()?;
        Some(sandbox)
    }

    fn home(&self) -> PathBuf {
        self.dir.path().join("home")
    }

    fn config_path(&self) -> PathBuf {
        self.dir.path().join("tkmake.toml")
    }

    fn development_root(&self) -> PathBuf {
        self.dir.path().join("dev")
    }

    fn toolchain_root(&self) -> PathBuf {
        self.dir.path().join("toolchain")
    }

    fn mirror(&self) -> PathBuf {
        self.dir.path().join("mirror")
    }

    fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("tkmake");
        cmd.env("TKMAKE_CONFIG", self.config_path())
            .env("HOME", self.home())
            .env_remove("DEVELOPMENT_ROOT")
            .env_remove("TOOLCHAIN_ROOT")
            .env_remove("TKMAKE_LOG");
        cmd
    }

    /// Put `org_project-version.tar.gz` in the mirror and return its sha256.
    fn publish(&self, organization: &str, project: &str, version: &str) -> String {
        let mut bytes = Vec::new();
        {
            let encoder = GzEncoder::new(&mut bytes, Compression::default());
            let mut builder = tar::Builder::new(encoder);
            let content = b"<thekogans_make/>";
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            assert!(builder
                .append_data(&mut header, format!("{project}/thekogans_make.xml"), &content[..])
                .is_ok());
            assert!(builder.into_inner().is_ok_and(|e| e.finish().is_ok()));
        }
        let dir = self.mirror().join(organization);
        assert!(fs::create_dir_all(&dir).is_ok());
        let name = format!("{organization}_{project}-{version}.tar.gz");
        assert!(fs::write(dir.join(name), &bytes).is_ok());
        hex::encode(Sha256::digest(&bytes))
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn test_version() {
    let Some(sandbox) = Sandbox::new() else {
        return;
    };
    sandbox
        .cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tkmake"));
}

#[test]
fn test_help() {
    let Some(sandbox) = Sandbox::new() else {
        return;
    };
    sandbox
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("resolves organization/project references"));
    sandbox
        .cmd()
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("Resolve, fetch and build"));
}

#[test]
fn test_invalid_command() {
    let Some(sandbox) = Sandbox::new() else {
        return;
    };
    sandbox.cmd().arg("invalid").assert().failure();
}

#[test]
fn test_config_show_and_set() {
    let Some(sandbox) = Sandbox::new() else {
        return;
    };
    sandbox
        .cmd()
        .args(["config", "set", "default-branch", "release"])
        .assert()
        .success();
    sandbox
        .cmd()
        .args(["config", "get", "default-branch"])
        .assert()
        .success()
        .stdout(predicate::str::contains("release"));
    sandbox
        .cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration:"));
    sandbox
        .cmd()
        .args(["config", "set", "no-such-key", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown config key"));
}

#[test]
fn test_decode() {
    let Some(sandbox) = Sandbox::new() else {
        return;
    };
    sandbox
        .cmd()
        .args(["decode", "acme_widget-dev-1.2.0.tar.gz"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dev").and(predicate::str::contains("1.2.0")));
    sandbox.cmd().args(["decode", "nounderscore"]).assert().failure();
}

#[test]
fn test_generators_lists_builtin_and_make_path() {
    let Some(sandbox) = Sandbox::new() else {
        return;
    };
    sandbox
        .cmd()
        .args(["config", "set", "make-path", "/opt/gnu/bin/gmake"])
        .assert()
        .success();
    sandbox
        .cmd()
        .arg("generators")
        .assert()
        .success()
        .stdout(predicate::str::contains("makefile").and(predicate::str::contains("/opt/gnu/bin/gmake")));
}

#[test]
fn test_catalog_add_and_list() {
    let Some(sandbox) = Sandbox::new() else {
        return;
    };
    let mirror = path_str(&sandbox.mirror());
    sandbox
        .cmd()
        .args(["catalog", "add-source", "acme", &mirror])
        .assert()
        .success();
    sandbox
        .cmd()
        .args(["catalog", "add-project", "acme", "widget", "1.0.0", "abc"])
        .assert()
        .success();
    sandbox
        .cmd()
        .args(["catalog", "add-project", "acme", "widget", "2.0.0", "def"])
        .assert()
        .success();
    sandbox
        .cmd()
        .args(["catalog", "list", "acme"])
        .assert()
        .success()
        .stdout(predicate::str::contains("widget").and(predicate::str::contains("2.0.0")));

    sandbox
        .cmd()
        .args(["catalog", "cleanup", "acme", "widget"])
        .assert()
        .success();
    sandbox
        .cmd()
        .args(["catalog", "list", "acme"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1.0.0").not());
    assert!(sandbox.toolchain_root().join("Sources.toml").is_file());
}

#[test]
fn test_catalog_update_from_mirror() {
    let Some(sandbox) = Sandbox::new() else {
        return;
    };
    let source = "[[project]]\nname = \"widget\"\nversion = \"4.0.0\"\nsha256 = \"aa\"\n";
    assert!(fs::create_dir_all(sandbox.mirror().join("acme")).is_ok());
    assert!(fs::write(sandbox.mirror().join("acme/Source.toml"), source).is_ok());

    let mirror = path_str(&sandbox.mirror());
    sandbox
        .cmd()
        .args(["catalog", "add-source", "acme", &mirror])
        .assert()
        .success();
    sandbox.cmd().args(["catalog", "update", "acme"]).assert().success();
    sandbox
        .cmd()
        .args(["catalog", "list", "acme"])
        .assert()
        .success()
        .stdout(predicate::str::contains("4.0.0"));
    assert!(sandbox
        .development_root()
        .join("sources/acme/Source.toml")
        .is_file());
}

#[test]
fn test_find_installs_through_helper() {
    let Some(sandbox) = Sandbox::new() else {
        return;
    };
    let sha = sandbox.publish("acme", "widget", "1.0.0");
    let mirror = path_str(&sandbox.mirror());
    sandbox
        .cmd()
        .args(["catalog", "add-source", "acme", &mirror])
        .assert()
        .success();
    sandbox
        .cmd()
        .args(["catalog", "add-project", "acme", "widget", "1.0.0", &sha])
        .assert()
        .success();

    let root = sandbox.development_root().join("acme/widget/1.0.0");
    sandbox
        .cmd()
        .args(["find", "acme", "widget"])
        .assert()
        .success()
        .stdout(predicate::str::contains(path_str(&root)));
    assert!(root.join("thekogans_make.xml").is_file());
}

#[test]
fn test_find_not_found_creates_nothing() {
    let Some(sandbox) = Sandbox::new() else {
        return;
    };
    sandbox
        .cmd()
        .args(["find", "acme", "missing", "--version", "1.0.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
    assert!(!sandbox.development_root().join("acme").exists());
}

#[test]
fn test_manifest_add_and_remove() {
    let Some(sandbox) = Sandbox::new() else {
        return;
    };
    let dir = sandbox.dir.path().join("bin");
    assert!(fs::create_dir_all(&dir).is_ok());
    assert!(fs::write(dir.join("libz.so"), "z").is_ok());
    let dir_arg = path_str(&dir);

    sandbox
        .cmd()
        .args(["manifest", "add", &dir_arg, "libz.so", "app"])
        .assert()
        .success();
    sandbox
        .cmd()
        .args(["manifest", "add", &dir_arg, "libz.so", "tool"])
        .assert()
        .success();
    sandbox
        .cmd()
        .args(["manifest", "show", &dir_arg])
        .assert()
        .success()
        .stdout(predicate::str::contains("app, tool"));

    sandbox
        .cmd()
        .args(["manifest", "remove", &dir_arg, "libz.so", "app"])
        .assert()
        .success();
    assert!(dir.join("libz.so").exists());
    sandbox
        .cmd()
        .args(["manifest", "remove", &dir_arg, "libz.so", "tool"])
        .assert()
        .success();
    assert!(!dir.join("libz.so").exists());
}

#[test]
fn test_fetch_helper_rejects_bad_arguments() {
    let mut cmd = cargo_bin_cmd!("tkmake-fetch");
    cmd.arg("-o:acme")
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing"));
}
