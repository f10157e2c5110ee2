//! External build driver invocation

use crate::errors::BuildError;
use crate::project::ProjectInfo;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tkmake_config::{Config, ConfigError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    All,
    Tests,
    Clean,
    CleanSelf,
    Tags,
}

impl Target {
    pub fn as_str(self) -> &'static str {
        match self {
            Target::All => "all",
            Target::Tests => "tests",
            Target::Clean => "clean",
            Target::CleanSelf => "clean_self",
            Target::Tags => "tags",
        }
    }

    /// Targets after which produced artifacts are copied to their consumers.
    pub fn propagates(self) -> bool {
        matches!(self, Target::All | Target::Tests)
    }

    pub fn is_clean(self) -> bool {
        matches!(self, Target::Clean | Target::CleanSelf)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Development,
    Install,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Development => "Development",
            Mode::Install => "Install",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub mode: Mode,
    pub parallel: bool,
    pub quiet: bool,
    pub hide_commands: bool,
}

pub trait BuildDriver {
    fn build(
        &self,
        project: &ProjectInfo,
        build_file: &Path,
        target: Target,
        options: &BuildOptions,
    ) -> Result<(), BuildError>;
}

/// Runs a make-compatible program in the build file's directory.
#[derive(Debug, Clone)]
pub struct MakeDriver {
    program: PathBuf,
}

impl MakeDriver {
    pub fn new(program: PathBuf) -> Self {
        MakeDriver { program }
    }

    /// Driver for the configured `make-path`, or `make` on `PATH`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(MakeDriver::new(config.make_path()?))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(build_file: &Path, target: Target, options: &BuildOptions) -> Vec<String> {
        let mut args = vec!["-f".to_string(), build_file.display().to_string()];
        if options.quiet {
            args.push("--quiet".to_string());
        }
        if options.parallel {
            args.push("-j".to_string());
            args.push("--output-sync".to_string());
        }
        args.push(format!("mode={}", options.mode.as_str()));
        args.push(format!(
            "hide_commands={}",
            if options.hide_commands { "yes" } else { "no" }
        ));
        args.push(target.as_str().to_string());
        args
    }
}

impl BuildDriver for MakeDriver {
    fn build(
        &self,
        project: &ProjectInfo,
        build_file: &Path,
        target: Target,
        options: &BuildOptions,
    ) -> Result<(), BuildError> {
        let args = Self::args(build_file, target, options);
        let dir = build_file.parent().unwrap_or(project.root());
        tracing::info!("Building {} ({})", project.root().display(), target);
        tracing::debug!("Running {} {}", self.program.display(), args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(dir)
            .output()
            .map_err(|source| BuildError::Launch {
                program: self.program.clone(),
                source,
            })?;
        tkmake_logger::capture_output(&self.program.display().to_string(), &output);

        if output.status.success() {
            Ok(())
        } else {
            Err(BuildError::Driver {
                root: project.root().to_path_buf(),
                status: output.status.to_string(),
            })
        }
    }
}
