use crate::common::Context;
use crate::errors::CliError;
use crate::GlobalOpts;
use clap::Subcommand;
use colored::Colorize;
use tkmake_catalog::{CatalogEntry, CatalogSet, DefaultTransport};

#[derive(Subcommand, Debug, Clone)]
pub enum CatalogAction {
    /// List organizations, or one organization's projects and toolchains
    List { organization: Option<String> },
    /// Register an organization and the URL of its catalog
    AddSource { organization: String, url: String },
    /// Forget an organization
    RemoveSource { organization: String },
    /// Refresh one organization, or all of them, from their remote catalogs
    Update { organization: Option<String> },
    /// Record a project archive
    AddProject {
        organization: String,
        name: String,
        version: String,
        sha256: String,
        #[arg(short, long, default_value = "")]
        branch: String,
    },
    /// Remove a project version
    DeleteProject {
        organization: String,
        name: String,
        version: String,
        #[arg(short, long, default_value = "")]
        branch: String,
    },
    /// Record a toolchain archive
    AddToolchain {
        organization: String,
        name: String,
        version: String,
        sha256: String,
        /// Archive file name when it differs from org_name-version.tar.gz
        #[arg(short, long)]
        file: Option<String>,
    },
    /// Remove a toolchain version
    DeleteToolchain {
        organization: String,
        name: String,
        version: String,
    },
    /// Keep only the newest version of a project (or toolchain)
    Cleanup {
        organization: String,
        name: String,
        #[arg(short, long, default_value = "")]
        branch: String,
        #[arg(long)]
        toolchain: bool,
    },
}

fn entry_mut<'a>(catalog: &'a mut CatalogSet, organization: &str) -> Result<&'a mut CatalogEntry, CliError> {
    catalog
        .get_mut(organization)
        .ok_or_else(|| CliError::NotFound(format!("Organization '{organization}'")))
}

fn print_entry(entry: &CatalogEntry, opts: &GlobalOpts) {
    println!("{} {}", entry.organization.bold().green(), entry.url.dimmed());
    for project in &entry.projects {
        let branch = if project.branch.is_empty() {
            String::new()
        } else {
            format!(" [{}]", project.branch)
        };
        println!("  {} {}{}", project.name.cyan(), project.version, branch);
        if opts.verbosity_level() > 0 {
            println!("      sha256 {}", project.sha256.dimmed());
        }
    }
    for toolchain in &entry.toolchains {
        println!("  {} {} {}", "toolchain".yellow(), toolchain.name.cyan(), toolchain.version);
        if opts.verbosity_level() > 0 {
            if let Some(file) = &toolchain.file {
                println!("      file {}", file.dimmed());
            }
            println!("      sha256 {}", toolchain.sha256.dimmed());
        }
    }
}

pub fn handle_catalog(action: CatalogAction, opts: &GlobalOpts) -> Result<(), CliError> {
    let context = Context::load()?;
    let mut catalog = context.load_catalog()?;

    let changed = match action {
        CatalogAction::List { organization } => {
            match organization {
                Some(organization) => {
                    let entry = catalog
                        .get(&organization)
                        .ok_or_else(|| CliError::NotFound(format!("Organization '{organization}'")))?;
                    print_entry(entry, opts);
                }
                None if catalog.is_empty() => {
                    println!("{}", "No catalog sources registered".yellow());
                }
                None => {
                    for entry in catalog.entries() {
                        println!(
                            "{} {} ({} projects, {} toolchains)",
                            entry.organization.bold().green(),
                            entry.url.dimmed(),
                            entry.projects.len(),
                            entry.toolchains.len()
                        );
                    }
                }
            }
            false
        }
        CatalogAction::AddSource { organization, url } => {
            let changed = catalog.add_source(&organization, &url);
            if changed {
                tkmake_logger::success(&format!("Added source '{}' at {}", organization, url));
            }
            changed
        }
        CatalogAction::RemoveSource { organization } => {
            if !catalog.delete_source(&organization) {
                return Err(CliError::NotFound(format!("Organization '{organization}'")));
            }
            tkmake_logger::success(&format!("Removed source '{}'", organization));
            true
        }
        CatalogAction::Update { organization } => {
            let transport = DefaultTransport::new()?;
            let sources_dir = context.sources_dir()?;
            match organization {
                Some(organization) => {
                    tkmake_logger::spinner_start(&format!("Refreshing {organization}"));
                    match catalog.update_source(&organization, &transport, &sources_dir) {
                        Ok(()) => tkmake_logger::spinner_success(&format!("Refreshed {organization}")),
                        Err(e) => {
                            tkmake_logger::spinner_error(&format!("Failed to refresh {organization}"));
                            return Err(e.into());
                        }
                    }
                }
                None => {
                    tkmake_logger::spinner_start("Refreshing catalog sources");
                    let report = catalog.update_all(&transport, &sources_dir);
                    tkmake_logger::spinner_stop();
                    for organization in &report.updated {
                        tkmake_logger::success(&format!("Refreshed {organization}"));
                    }
                    for (organization, reason) in &report.failed {
                        tkmake_logger::warn(&format!("Could not refresh {organization}: {reason}"));
                    }
                    if !report.is_clean() {
                        tkmake_logger::show_log_path();
                    }
                }
            }
            true
        }
        CatalogAction::AddProject {
            organization,
            name,
            version,
            sha256,
            branch,
        } => entry_mut(&mut catalog, &organization)?.add_project(&name, &branch, &version, &sha256),
        CatalogAction::DeleteProject {
            organization,
            name,
            version,
            branch,
        } => {
            let removed = entry_mut(&mut catalog, &organization)?.delete_project(&name, &branch, &version);
            if !removed {
                return Err(CliError::NotFound(format!("{name} {version}")));
            }
            true
        }
        CatalogAction::AddToolchain {
            organization,
            name,
            version,
            sha256,
            file,
        } => entry_mut(&mut catalog, &organization)?.add_toolchain(&name, &version, file.as_deref(), &sha256),
        CatalogAction::DeleteToolchain {
            organization,
            name,
            version,
        } => {
            let removed = entry_mut(&mut catalog, &organization)?.delete_toolchain(&name, &version);
            if !removed {
                return Err(CliError::NotFound(format!("Toolchain {name} {version}")));
            }
            true
        }
        CatalogAction::Cleanup {
            organization,
            name,
            branch,
            toolchain,
        } => {
            let entry = entry_mut(&mut catalog, &organization)?;
            let removed = if toolchain {
                entry.cleanup_toolchain(&name)
            } else {
                entry.cleanup_project(&name, &branch)
            };
            tkmake_logger::info(&format!("Removed {} older version(s) of {}", removed, name));
            removed > 0
        }
    };

    if changed {
        catalog.save()?;
        tkmake_logger::debug(&format!("Saved {}", catalog.path().display()));
    }
    Ok(())
}
