use crate::errors::CliError;
use crate::GlobalOpts;
use clap::Subcommand;
use colored::Colorize;
use tkmake_config::Config;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show every configured value
    Show,
    /// Print one value
    Get { key: String },
    /// Set a value
    Set { key: String, value: String },
    /// Remove a value
    Unset { key: String },
    /// Print the path of the configuration file
    Path,
}

pub fn handle_config(action: Option<ConfigAction>, opts: &GlobalOpts) -> Result<(), CliError> {
    match action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => {
            let config = Config::load()?;
            println!("{}", "Configuration:".bold().green());
            if config.is_empty() {
                if opts.verbosity_level() > 0 {
                    println!("  {}", "(empty)".yellow());
                }
            } else {
                for (key, value) in config.values_iter() {
                    println!("  {}: {}", key.cyan(), value);
                }
            }
        }
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            if !tkmake_config::KEYS.contains(&key.as_str()) {
                return Err(tkmake_config::ConfigError::UnknownKey(key).into());
            }
            match config.get(&key) {
                Some(value) => println!("{}", value),
                None => tkmake_logger::debug(&format!("{} is not set", key)),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, value.clone())?;
            config.save()?;
            tkmake_logger::success(&format!("Set {} = {}", key, value));
        }
        ConfigAction::Unset { key } => {
            let mut config = Config::load()?;
            config.unset(&key)?;
            config.save()?;
            tkmake_logger::success(&format!("Unset {}", key));
        }
        ConfigAction::Path => {
            let path = Config::path();
            tkmake_logger::debug(&format!("Reading config from: {}", path.display()));
            println!("{}", path.display());
        }
    }
    Ok(())
}
