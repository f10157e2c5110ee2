use clap::{Parser, Subcommand};
use tkmake::commands::{
    catalog::{self, CatalogAction},
    config::{self, ConfigAction},
    decode, find, generators,
    manifest::{self, ManifestAction},
    plugins::{self, PluginsAction},
};
use tkmake::errors::CliError;
use tkmake::GlobalOpts;
use tkmake_naming::{ArtifactRef, BuildConfig, LinkType};
use tracing_subscriber::EnvFilter;

/// Overrides the tracing filter derived from -v.
const LOG_FILTER_ENV: &str = "TKMAKE_LOG";

#[derive(Parser)]
#[command(name = "tkmake")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Resolve, fetch and build native projects",
    long_about = "tkmake resolves organization/project references to installed roots, fetching verified archives from organization catalogs when needed."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure tkmake
    #[command(subcommand_required = false, arg_required_else_help = false)]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
    /// Manage organization catalogs
    #[command(subcommand)]
    Catalog(CatalogAction),
    /// Resolve a project, installing it if needed, and print its root
    Find {
        organization: String,
        project: String,
        #[arg(short, long, default_value = "")]
        branch: String,
        #[arg(short = 'V', long, default_value = "")]
        version: String,
    },
    /// Resolve a toolchain, installing it if needed, and print its root
    Toolchain {
        organization: String,
        name: String,
        #[arg(short = 'V', long, default_value = "")]
        version: String,
        #[arg(short, long, default_value = "Debug")]
        config: BuildConfig,
        #[arg(short = 't', long = "type", default_value = "Static")]
        link: LinkType,
    },
    /// Inspect or edit an install directory's manifest
    #[command(subcommand)]
    Manifest(ManifestAction),
    /// Inspect plugin indexes
    #[command(subcommand)]
    Plugins(PluginsAction),
    /// Show the identity encoded in an artifact file name
    Decode { name: String },
    /// List build-file generators and the make program in use
    Generators,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(tkmake_logger::verbosity_to_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Config { action } => config::handle_config(action, &cli.global),
        Commands::Catalog(action) => catalog::handle_catalog(action, &cli.global),
        Commands::Find {
            organization,
            project,
            branch,
            version,
        } => find::handle_find(&ArtifactRef::new(&organization, &project, &branch, &version)),
        Commands::Toolchain {
            organization,
            name,
            version,
            config,
            link,
        } => find::handle_toolchain(&organization, &name, &version, config, link),
        Commands::Manifest(action) => manifest::handle_manifest(action),
        Commands::Plugins(action) => plugins::handle_plugins(action),
        Commands::Decode { name } => decode::handle_decode(&name),
        Commands::Generators => generators::handle_generators(),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = tkmake_logger::init_with_verbosity(cli.global.verbosity_level(), cli.global.no_stdout) {
        eprintln!("Warning: Failed to initialize logger: {}", e);
    }
    init_tracing();

    if let Err(e) = dispatch(cli) {
        tkmake_logger::spinner_stop();
        tkmake_logger::error(&e.to_string());
        if tkmake_logger::get_verbosity() > 0 {
            tkmake_logger::show_log_path();
        }
        std::process::exit(1);
    }
}
