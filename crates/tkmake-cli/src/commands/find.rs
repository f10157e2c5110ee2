use crate::common::Context;
use crate::errors::CliError;
use crate::resolver::Resolver;
use tkmake_naming::{ArtifactRef, BuildConfig, LinkType};

/// Resolve a source project, installing it from the catalog if needed, and
/// print its root.
pub fn handle_find(reference: &ArtifactRef) -> Result<(), CliError> {
    let context = Context::load()?;
    let catalog = context.load_catalog()?;
    let helper = context.helper()?;
    let roots = context.roots()?;
    tkmake_logger::step(&format!(
        "Searching {} (catalog {})",
        roots.development.display(),
        catalog.path().display()
    ));
    let resolver = Resolver::new(roots, &context.config, &context.env, &catalog, &helper);

    tkmake_logger::spinner_start(&format!("Resolving {reference}"));
    let found = resolver.find_project(reference);
    tkmake_logger::spinner_stop();

    match found? {
        Some(resolved) => {
            tkmake_logger::debug(&format!(
                "Resolved {} to branch '{}' version '{}'",
                reference, resolved.branch, resolved.version
            ));
            println!("{}", resolved.root.display());
            Ok(())
        }
        None => Err(CliError::NotFound(reference.to_string())),
    }
}

/// Resolve a toolchain and print its root.
pub fn handle_toolchain(
    organization: &str,
    name: &str,
    version: &str,
    config: BuildConfig,
    link: LinkType,
) -> Result<(), CliError> {
    let context = Context::load()?;
    let catalog = context.load_catalog()?;
    let helper = context.helper()?;
    let resolver = Resolver::new(context.roots()?, &context.config, &context.env, &catalog, &helper)
        .with_toolchain_build(config, link);

    tkmake_logger::spinner_start(&format!("Resolving toolchain {organization}_{name}"));
    let found = resolver.find_toolchain(organization, name, version);
    tkmake_logger::spinner_stop();

    match found? {
        Some(resolved) => {
            println!("{}", resolved.root.display());
            Ok(())
        }
        None => Err(CliError::NotFound(format!("Toolchain {organization}_{name} {version}"))),
    }
}
