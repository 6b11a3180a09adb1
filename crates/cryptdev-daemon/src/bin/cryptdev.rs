//! cryptdev CLI - Encrypt and decrypt files through a cryptdev device
//!
//! Usage:
//!   cryptdev encrypt <input> <output>     Encrypt a file
//!   cryptdev decrypt <input> <output>     Decrypt a file
//!   cryptdev shift <value>                Change the device shift (0-25)
//!   cryptdev status                       Show whether a device is connected
//!   cryptdev config                       Show the device path and a sample config

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use cryptdev_core::{Config, Shift};
use cryptdev_daemon::{CryptoClient, DeviceFile};

#[derive(Parser)]
#[command(name = "cryptdev")]
#[command(about = "Encrypt and decrypt files with a cryptdev device", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Device path (default: from config)
    #[arg(short, long, global = true, env = "CRYPTDEV_DEVICE")]
    device: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt input file to output file
    Encrypt {
        /// Plaintext file
        input: PathBuf,
        /// Where to write the ciphertext
        output: PathBuf,
    },

    /// Decrypt input file to output file
    Decrypt {
        /// Ciphertext file
        input: PathBuf,
        /// Where to write the plaintext
        output: PathBuf,
    },

    /// Change the device shift
    Shift {
        /// New shift (0-25)
        #[arg(value_parser = parse_shift, allow_hyphen_values = true)]
        value: Shift,
    },

    /// Show device status
    Status,

    /// Show the effective device path and a sample configuration
    Config,
}

fn parse_shift(s: &str) -> Result<Shift, String> {
    let value: i64 = s.parse().map_err(|_| format!("{:?} is not a number", s))?;
    Shift::new(value).map_err(|e| e.to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Set up logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    if let Some(device) = cli.device {
        config.client.device_path = Some(device);
    }
    config.validate()?;

    let device_path = config.device_path();
    let client = CryptoClient::new(DeviceFile::new(&device_path), config.client.read_chunk_size);

    let result = match cli.command {
        Commands::Encrypt { input, output } => client.encrypt_file(&input, &output).map(drop),
        Commands::Decrypt { input, output } => client.decrypt_file(&input, &output).map(drop),
        Commands::Shift { value } => client.set_shift(value),
        Commands::Status => {
            let status_path = config.status_path();
            match std::fs::read_to_string(&status_path) {
                Ok(status) => info!("{:?}: {}", device_path, status.trim_end()),
                Err(e) => info!("{:?}: disconnected ({})", device_path, e),
            }
            Ok(())
        }
        Commands::Config => {
            info!("Device path: {:?}", device_path);
            match Config::default_path() {
                Some(path) => info!("Config file: {:?}", path),
                None => info!("Config file: none (no config directory)"),
            }
            println!("{}", Config::sample());
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("Error: {}", e);
        return Err(e.into());
    }
    Ok(())
}
