//! Install helper seam
//!
//! The catalog never unpacks archives itself; it hands a [`FetchRequest`] to
//! an [`InstallHelper`]. The production helper runs the `tkmake-fetch`
//! binary, tests and offline setups call the fetch routine in-process.

use crate::errors::CatalogError;
use crate::fetch::{fetch_verify_unpack, FetchRequest};
use crate::transport::Transport;
use std::path::PathBuf;
use std::process::Command;

pub trait InstallHelper {
    fn fetch(&self, request: &FetchRequest) -> Result<(), CatalogError>;
}

/// Runs the external fetch helper; any non-zero exit is a failed install.
#[derive(Debug, Clone)]
pub struct ProcessHelper {
    program: PathBuf,
}

impl ProcessHelper {
    pub fn new(program: PathBuf) -> Self {
        ProcessHelper { program }
    }
}

impl InstallHelper for ProcessHelper {
    fn fetch(&self, request: &FetchRequest) -> Result<(), CatalogError> {
        let args = request.to_args();
        tracing::debug!("Running {} {}", self.program.display(), args.join(" "));
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| CatalogError::Install {
                identity: request.identity(),
                reason: format!("failed to launch {}: {e}", self.program.display()),
            })?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(CatalogError::Install {
            identity: request.identity(),
            reason: format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            ),
        })
    }
}

/// Fetches through a [`Transport`] without spawning a process.
pub struct InProcessHelper<T> {
    transport: T,
}

impl<T: Transport> InProcessHelper<T> {
    pub fn new(transport: T) -> Self {
        InProcessHelper { transport }
    }
}

impl<T: Transport> InstallHelper for InProcessHelper<T> {
    fn fetch(&self, request: &FetchRequest) -> Result<(), CatalogError> {
        fetch_verify_unpack(&self.transport, request)
            .map(|_| ())
            .map_err(|e| CatalogError::Install {
                identity: request.identity(),
                reason: e.to_string(),
            })
    }
}
