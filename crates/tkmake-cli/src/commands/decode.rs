use crate::errors::CliError;
use colored::Colorize;
use tkmake_naming::decode_name;

/// Print the identity encoded in an artifact file name.
pub fn handle_decode(name: &str) -> Result<(), CliError> {
    let decoded = decode_name(name)
        .ok_or_else(|| CliError::InvalidArgument(format!("'{name}' is not an organization_project name")))?;

    println!("  {}: {}", "organization".cyan(), decoded.organization);
    println!("  {}: {}", "project".cyan(), decoded.project);
    if let Some(branch) = &decoded.branch {
        println!("  {}: {}", "branch".cyan(), branch);
    }
    if let Some(version) = &decoded.version {
        println!("  {}: {}", "version".cyan(), version);
    }
    if let Some(extension) = &decoded.extension {
        println!("  {}: {}", "extension".cyan(), extension);
    }
    if decoded.ambiguous {
        // A version-shaped branch with no version encodes to the same text.
        println!("  {}: {}", "ambiguous".cyan(), "yes".yellow());
    }
    Ok(())
}
