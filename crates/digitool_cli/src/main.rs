//! DigitoolDB CLI
//!
//! Command-line tools for DigitoolDB.
//!
//! # Commands
//!
//! - `serve` - Run the TCP server
//! - `client` - Send one request to a running server
//! - `inspect` - Display databases, collections and index statistics
//! - `verify` - Rebuild every index and report stale or corrupt ones

mod commands;

use clap::{Parser, Subcommand};
use commands::client::ClientOp;
use commands::inspect::OutputFormat;
use commands::serve::ServeArgs;
use digitool_server::DEFAULT_PORT;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// DigitoolDB command-line tools.
#[derive(Parser)]
#[command(name = "digi")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server
    Serve(ServeArgs),

    /// Send a request to a running server
    Client {
        /// Server host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Server port
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        #[command(subcommand)]
        op: ClientOp,
    },

    /// Display databases, collections and indexes
    Inspect {
        /// Path to the data directory
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Rebuild every index and report stale or corrupt ones
    Verify {
        /// Path to the data directory
        #[arg(short, long)]
        data_dir: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            let config = args.into_config()?;
            init_logging(cli.verbose, &config.log_level);
            commands::serve::run(config)?;
        }
        Commands::Client { host, port, op } => {
            init_logging(cli.verbose, "warn");
            commands::client::run(&host, port, op)?;
        }
        Commands::Inspect { data_dir, format } => {
            init_logging(cli.verbose, "warn");
            commands::inspect::run(&data_dir, format)?;
        }
        Commands::Verify { data_dir } => {
            init_logging(cli.verbose, "info");
            commands::verify::run(&data_dir)?;
        }
        Commands::Version => {
            println!("DigitoolDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("DigitoolDB Core v{}", digitool_core::VERSION);
        }
    }

    Ok(())
}

/// Installs the log subscriber. `RUST_LOG` wins over `default`;
/// `--verbose` wins over both.
fn init_logging(verbose: bool, default: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
