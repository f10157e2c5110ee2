use crate::common::Context;
use crate::driver::MakeDriver;
use crate::errors::{BuildError, CliError};
use crate::generator::builtin_registry;
use colored::Colorize;

/// List the built-in generators and the make program builds would run.
pub fn handle_generators() -> Result<(), CliError> {
    let context = Context::load()?;
    let registry = builtin_registry().map_err(BuildError::from)?;

    println!("{}", "Generators:".bold());
    for name in registry.names() {
        println!("  {}", name.cyan());
    }
    match MakeDriver::from_config(&context.config) {
        Ok(driver) => println!("  {}: {}", "make".cyan(), driver.program().display()),
        Err(e) => tkmake_logger::warn(&e.to_string()),
    }
    Ok(())
}
