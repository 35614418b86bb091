use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use plugscout::config::{LogFormat, ScoutConfig};
use plugscout::plugins::NestingPolicy;

mod cli;

use cli::{cmd_files, cmd_scan, ScanOptions};

#[derive(Parser)]
#[command(name = "plugscout")]
#[command(about = "Discover plugin bundles on disk", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.plugscout/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover plugins in every configured source
    Scan {
        /// Keep plugin views live instead of freezing them
        #[arg(long)]
        dev: bool,
        /// Extra source as CLASS=PATH (core, bundled, external)
        #[arg(long = "source", value_name = "CLASS=PATH")]
        sources: Vec<String>,
        /// How nested plugins attach: all-ancestors or nearest-ancestor
        #[arg(long)]
        nesting: Option<NestingPolicy>,
        /// Print JSON instead of a tree
        #[arg(long)]
        json: bool,
    },
    /// List the files a plugin directory would expose
    Files {
        dir: PathBuf,
        /// Show the live view instead of the frozen one
        #[arg(long)]
        dev: bool,
    },
    /// Show version information
    Version,
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // A broken config file is reported by the command that loads it.
    let config_path = cli.config.clone().unwrap_or_else(ScoutConfig::path);
    let log_format = ScoutConfig::from_file(&config_path)
        .map(|c| c.log_format)
        .unwrap_or_default();
    init_logging(log_format);

    match cli.command {
        Some(Commands::Version) | None => {
            println!("plugscout {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Scan {
            dev,
            sources,
            nesting,
            json,
        }) => {
            cmd_scan(ScanOptions {
                config: cli.config,
                dev,
                sources,
                nesting,
                json,
            })
            .await?;
        }
        Some(Commands::Files { dir, dev }) => {
            cmd_files(dir, dev)?;
        }
    }

    Ok(())
}
