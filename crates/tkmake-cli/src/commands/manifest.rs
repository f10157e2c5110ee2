use crate::errors::CliError;
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use tkmake_manifest::Manifest;

#[derive(Subcommand, Debug, Clone)]
pub enum ManifestAction {
    /// List the files an install directory tracks and who needs them
    Show { dir: PathBuf },
    /// Record that `dependent` needs `file`
    Add {
        dir: PathBuf,
        file: String,
        dependent: String,
    },
    /// Drop a dependent; the file is deleted once nothing needs it
    Remove {
        dir: PathBuf,
        file: String,
        dependent: String,
    },
}

pub fn handle_manifest(action: ManifestAction) -> Result<(), CliError> {
    match action {
        ManifestAction::Show { dir } => {
            let manifest = Manifest::load(&dir)?;
            if manifest.is_empty() {
                println!("{}", "No tracked files".yellow());
            }
            for (file, dependents) in manifest.files() {
                let names: Vec<&str> = dependents.iter().map(String::as_str).collect();
                println!("  {} <- {}", file.cyan(), names.join(", "));
            }
        }
        ManifestAction::Add {
            dir,
            file,
            dependent,
        } => {
            let mut manifest = Manifest::load(&dir)?;
            if manifest.add_file(&file, &dependent) {
                manifest.save()?;
                tkmake_logger::success(&format!("{} now needed by {}", file, dependent));
            }
        }
        ManifestAction::Remove {
            dir,
            file,
            dependent,
        } => {
            let mut manifest = Manifest::load(&dir)?;
            let unreferenced = manifest.delete_file(&file, &dependent);
            manifest.save()?;
            if unreferenced {
                let path = dir.join(&file);
                match std::fs::remove_file(&path) {
                    Ok(()) => tkmake_logger::success(&format!("Removed {}", path.display())),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        tkmake_logger::debug(&format!("{} was already gone", path.display()));
                    }
                    Err(e) => {
                        return Err(tkmake_manifest::ManifestError::Io { path, source: e }.into());
                    }
                }
            }
        }
    }
    Ok(())
}
