mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, export::ExportSubcommand};
use geotrack_core::config::Config;
use geotrack_core::paths::DEFAULT_CONFIG_FILE;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "geotrack",
    about = "GPS fleet telemetry: periodic location snapshots and GeoJSON exports",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (YAML); built-in defaults apply when it does not exist
    #[arg(long, global = true, env = "GEOTRACK_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (auto-update starts unless disabled)
    Serve {
        /// Port to listen on (default: server.port from config)
        #[arg(long)]
        port: Option<u16>,
        /// Open the status endpoint in a browser
        #[arg(long)]
        open: bool,
        /// Do not start auto-update on launch
        #[arg(long)]
        no_auto_start: bool,
    },

    /// List devices on the vendor account
    Devices,

    /// Export GeoJSON artifacts
    Export {
        #[command(subcommand)]
        subcommand: ExportSubcommand,
    },

    /// Show or check the effective configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let result = Config::load_or_default(&cli.config)
        .map_err(anyhow::Error::from)
        .and_then(|config| match cli.command {
            Commands::Serve {
                port,
                open,
                no_auto_start,
            } => cmd::serve::run(&config, port, open, no_auto_start),
            Commands::Devices => cmd::devices::run(&config, cli.json),
            Commands::Export { subcommand } => cmd::export::run(&config, subcommand, cli.json),
            Commands::Config { subcommand } => {
                cmd::config::run(&cli.config, &config, subcommand, cli.json)
            }
        });

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
