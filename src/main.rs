use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use currentlog::app::{self, Outcome};
use currentlog::capture::cancel::{install_interrupt_handler, CancelToken};
use currentlog::config::{LoggerConfig, DEFAULT_DATA_DIR};

/// Serial current logger and offline analyzer for the CS1237 measurement board.
#[derive(Parser, Debug)]
#[command(name = "currentlog")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose diagnostics on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record readings from the serial port into a new CSV file.
    Log {
        /// Serial port to prefer over the configured default.
        #[arg(short, long)]
        port: Option<String>,
        /// Baud rate.
        #[arg(short, long)]
        baud: Option<u32>,
        /// Directory for capture files.
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// JSON config file (defaults to ./currentlog.json when present).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Analyze a capture file; without a path, choose from the data directory.
    Analyze {
        /// CSV file to analyze.
        csv: Option<PathBuf>,
        /// Directory searched when no file is given.
        #[arg(long, default_value = DEFAULT_DATA_DIR)]
        data_dir: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> Result<Outcome> {
    match args.command {
        Command::Log {
            port,
            baud,
            data_dir,
            config,
        } => {
            let mut cfg = LoggerConfig::load(config.as_deref())?;
            if let Some(port) = port {
                cfg.preferred_port = Some(port);
            }
            if let Some(baud) = baud {
                cfg.baud_rate = baud;
            }
            if let Some(dir) = data_dir {
                cfg.data_dir = dir;
            }
            tracing::debug!("Logger config: {cfg:?}");

            let cancel = CancelToken::new();
            install_interrupt_handler(cancel.clone())?;
            app::run_logger(cfg, cancel)
        }
        Command::Analyze { csv, data_dir } => {
            let cancel = CancelToken::new();
            install_interrupt_handler(cancel.clone())?;
            app::run_analyzer(csv, &data_dir, &cancel)
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(Outcome::Completed | Outcome::Cancelled) => ExitCode::SUCCESS,
        Ok(Outcome::Failed) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
