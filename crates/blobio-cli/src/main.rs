//! blobio-cli - Command-line interface for blobio
//!
//! This crate provides the `blobio` binary:
//! - Blob metadata lookup
//! - Ranged and whole-blob downloads with parallel workers
//! - Streaming uploads from files or stdin

use anyhow::{Context as _, Result};
use blobio::{parse_size, BlobAddress, BlobError, Config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod transfer;

/// blobio - Random-access I/O for Azure Blob Storage
///
/// Addresses take the form `az://account/container/path` or
/// `https://account.blob.core.windows.net/container/path`. Credentials are
/// read from the environment.
#[derive(Parser)]
#[command(name = "blobio")]
#[command(author, version, about = "Random-access I/O for Azure Blob Storage", long_about = None)]
struct Cli {
    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Show progress bar during transfers
    #[arg(long, global = true)]
    progress: bool,

    /// Configuration file to use instead of the default one
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum number of parallel download workers
    #[arg(long, global = true)]
    max_workers: Option<u16>,

    /// Minimum bytes per download worker (e.g. 16MiB)
    #[arg(long, global = true, value_name = "SIZE")]
    min_bytes_per_worker: Option<String>,

    /// Read buffer size (e.g. 8MiB)
    #[arg(long, global = true, value_name = "SIZE")]
    buffer_size: Option<String>,

    /// Retries per request
    #[arg(long, global = true)]
    max_retries: Option<usize>,

    /// Deadline for the whole command, in seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show size, kind and modification time of a blob or prefix
    Stat {
        /// Blob address
        address: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write blob contents to stdout
    Cat {
        /// Blob address
        address: String,

        /// Start reading at this byte offset
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Read at most this many bytes
        #[arg(long)]
        length: Option<u64>,
    },

    /// Download a blob to a local file
    Get {
        /// Blob address
        address: String,

        /// Output file (defaults to the blob's name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload a local file, or stdin with `-`, to a blob
    Put {
        /// Input file, or `-` for stdin
        input: PathBuf,

        /// Blob address
        address: String,
    },

    /// Show or initialize configuration
    Config {
        /// Show the effective configuration
        #[arg(long, conflicts_with_all = ["path", "init"])]
        show: bool,

        /// Show configuration file path
        #[arg(long, conflicts_with_all = ["show", "init"])]
        path: bool,

        /// Write a documented default configuration file
        #[arg(long, conflicts_with_all = ["show", "path"])]
        init: bool,
    },
}

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let result = run();

    match result {
        Ok(_) => process::exit(0),
        Err(e) => {
            eprintln!("Error: {:#}", e);

            let exit_code = map_error_to_exit_code(&e);
            process::exit(exit_code);
        }
    }
}

/// Load the configuration file and apply command-line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };

    if let Some(workers) = cli.max_workers {
        config.transfer.max_workers = workers;
    }
    if let Some(size) = &cli.min_bytes_per_worker {
        config.transfer.min_bytes_per_worker = parse_size(size)?;
    }
    if let Some(size) = &cli.buffer_size {
        config.transfer.buffer_size = parse_size(size)?;
    }
    if let Some(retries) = cli.max_retries {
        config.client.max_retries = retries;
    }
    if let Some(secs) = cli.timeout {
        config.client.timeout_secs = Some(secs);
    }

    // Reject zero workers before any transfer starts.
    config.concurrency_policy()?;
    Ok(config)
}

fn parse_address(address: &str) -> Result<BlobAddress> {
    Ok(BlobAddress::parse(address)?)
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match &cli.command {
        Commands::Stat { address, json } => {
            let address = parse_address(address)?;
            open_session(&cli)?.stat(&address, *json)?;
        }

        Commands::Cat {
            address,
            offset,
            length,
        } => {
            let address = parse_address(address)?;
            open_session(&cli)?.cat(&address, *offset, *length)?;
        }

        Commands::Get { address, output } => {
            let address = parse_address(address)?;
            let output = match output {
                Some(path) => path.clone(),
                None if !address.path.is_empty() && !address.path.ends_with('/') => {
                    PathBuf::from(address.base())
                }
                None => {
                    return Err(BlobError::Parse(address.to_string()))
                        .context("Address names no blob; pass --output");
                }
            };
            info!("Downloading {} to {}", address, output.display());
            open_session(&cli)?.get(&address, &output)?;
        }

        Commands::Put { input, address } => {
            let address = parse_address(address)?;
            info!("Uploading {} to {}", input.display(), address);
            open_session(&cli)?.put(input, &address)?;
        }

        Commands::Config { show, path, init } => {
            handle_config(&cli, *show, *path, *init)?;
        }
    }

    Ok(())
}

fn open_session(cli: &Cli) -> Result<transfer::Session> {
    let config = load_config(cli)?;
    transfer::Session::new(&config, cli.progress && !cli.quiet)
}

fn handle_config(cli: &Cli, show: bool, path: bool, init: bool) -> Result<()> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::config_path().context("Failed to get config path")?,
    };

    if show {
        let config = load_config(cli)?;
        let toml_str = toml::to_string_pretty(&config).context("Failed to serialize config")?;
        println!("{}", toml_str);
    } else if path {
        println!("{}", config_path.display());
    } else if init {
        let written = Config::init(&config_path)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        if written {
            info!("Wrote default configuration to {}", config_path.display());
        } else {
            info!("Configuration file already exists: {}", config_path.display());
        }
    } else {
        eprintln!("Please specify --show, --path, or --init");
    }
    Ok(())
}

/// Map errors to exit codes:
/// - 0: Success
/// - 1: General or configuration error
/// - 2: Not found or local IO error
/// - 3: Invalid input
/// - 4: Transfer failure
/// - 5: Client creation failure
fn map_error_to_exit_code(err: &anyhow::Error) -> i32 {
    if let Some(blob_err) = err.downcast_ref::<BlobError>() {
        return blob_exit_code(blob_err);
    }
    if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
        // Reader errors surface through std::io.
        if let Some(blob_err) = io_err.get_ref().and_then(|e| e.downcast_ref::<BlobError>()) {
            return blob_exit_code(blob_err);
        }
        return 2;
    }
    1
}

fn blob_exit_code(err: &BlobError) -> i32 {
    if err.is_not_found() {
        return 2;
    }
    match err {
        BlobError::Parse(_) | BlobError::Seek { .. } | BlobError::InvalidPolicy(_) => 3,
        BlobError::ClientCreation { .. } => 5,
        BlobError::Stat { .. }
        | BlobError::RangeRead { .. }
        | BlobError::Write { .. }
        | BlobError::ShortRead { .. }
        | BlobError::TooLarge { .. } => 4,
        BlobError::NotFound { .. } | BlobError::Io(_) => 2,
        BlobError::Config(_) => 1,
    }
}
