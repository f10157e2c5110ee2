use crate::errors::CliError;
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use tkmake_manifest::{diff, load_index, PluginRecord};

#[derive(Subcommand, Debug, Clone)]
pub enum PluginsAction {
    /// List the plugins in a `.plugins` index
    Show { index: PathBuf },
    /// Compare two `.plugins` indexes
    Diff { from: PathBuf, to: PathBuf },
}

fn print_record(marker: colored::ColoredString, record: &PluginRecord) {
    println!("  {} {} {}", marker, record.path, record.version.dimmed());
}

pub fn handle_plugins(action: PluginsAction) -> Result<(), CliError> {
    match action {
        PluginsAction::Show { index } => {
            let plugins = load_index(&index)?;
            if plugins.is_empty() {
                println!("{}", "No plugins".yellow());
            }
            for record in &plugins {
                print_record("*".cyan(), record);
                for dependency in &record.dependencies {
                    println!("      {}", dependency.dimmed());
                }
            }
        }
        PluginsAction::Diff { from, to } => {
            let changes = diff(&load_index(&from)?, &load_index(&to)?);
            if changes.is_empty() {
                println!("{}", "No differences".green());
            }
            for record in &changes.added {
                print_record("+".green(), record);
            }
            for record in &changes.deleted {
                print_record("-".red(), record);
            }
            for change in &changes.modified {
                println!(
                    "  {} {} {} -> {}",
                    "~".yellow(),
                    change.to.path,
                    change.from.version.dimmed(),
                    change.to.version
                );
            }
        }
    }
    Ok(())
}
