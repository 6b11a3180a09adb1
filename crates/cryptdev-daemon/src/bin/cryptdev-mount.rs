//! Expose a cryptdev device file
//!
//! Usage:
//!   cryptdev-mount [mount_point] [--shift N]
//!
//! Example:
//!   cryptdev-mount /tmp/cryptdev --shift 5
//!   echo -n "E:hello" > /tmp/cryptdev/crypto0 && cat /tmp/cryptdev/crypto0

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use fuser::MountOption;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use cryptdev_core::{Config, Shift};
use cryptdev_daemon::{CryptoFS, DeviceSession, IoAdapter};

#[derive(Parser)]
#[command(name = "cryptdev-mount")]
#[command(about = "Expose a shift-cipher device file")]
struct Cli {
    /// Mount point (default: from config, or <tmp>/cryptdev)
    mount_point: Option<PathBuf>,

    /// Initial Caesar shift (0-25)
    #[arg(short, long, env = "CRYPTDEV_SHIFT", value_parser = parse_shift)]
    shift: Option<Shift>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Let other users open the device
    #[arg(long)]
    allow_other: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
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
    if let Some(shift) = cli.shift {
        config.device.default_shift = shift;
    }
    if let Some(mount_point) = cli.mount_point {
        config.mount.mount_point = Some(mount_point);
    }
    config.mount.allow_other |= cli.allow_other;
    config.validate()?;

    let mount_point = config.mount_point();
    if !mount_point.exists() {
        std::fs::create_dir_all(&mount_point)?;
    }

    info!("Mount point: {:?}", mount_point);
    info!(
        "Device: {:?} (shift {}, buffer {} bytes)",
        mount_point.join(&config.device.name),
        config.device.default_shift,
        config.device.buffer_capacity
    );

    let session = Arc::new(DeviceSession::new(config.device.clone()));
    let adapter = Arc::new(IoAdapter::new(session));
    let fs = CryptoFS::new(adapter, config.device.name.clone());

    let mut mount_options = vec![
        MountOption::FSName(config.mount.fs_name.clone()),
        MountOption::DefaultPermissions,
        MountOption::NoExec,
    ];
    if config.mount.auto_unmount {
        mount_options.push(MountOption::AutoUnmount);
    }
    if config.mount.allow_other {
        mount_options.push(MountOption::AllowOther);
    }

    // This blocks until unmounted
    info!("Mounting device...");
    if let Err(e) = fuser::mount2(fs, &mount_point, &mount_options) {
        error!("Mount failed: {}", e);
        error!("Common issues:");
        error!("  1. FUSE not installed");
        error!("  2. Mount point busy - unmount first: umount {:?}", mount_point);
        return Err(e.into());
    }

    info!("Device unmounted");
    Ok(())
}
