//! Cryptdev Daemon - Device session, device file, and file client
//!
//! This crate provides:
//! - The device session state machine (attach → ready → detach)
//! - An I/O adapter that maps file reads/writes onto the session
//! - A FUSE filesystem exposing the session as a device file (Unix)
//! - The client used by the `cryptdev` command-line application
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐      ┌──────────────────────────────┐
//! │  cryptdev encrypt a.txt a.enc│      │  cat /mnt/cryptdev/crypto0   │
//! └──────────────┬───────────────┘      └──────────────┬───────────────┘
//!                │ write "E:..."                       │ read(offset)
//!                ▼                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  CryptoFS (FUSE)  ──►  IoAdapter (handles + cursors)                │
//! └─────────────────────────────────┬───────────────────────────────────┘
//!                                   ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  DeviceSession: RwLock { SessionBuffer, Shift, generation }         │
//! │    execute() under the write lock, fetch() under the read lock      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

pub mod adapter;
pub mod client;
pub mod session;

// FUSE-related modules (Unix-only)
#[cfg(unix)]
pub mod fuse;

pub use adapter::IoAdapter;
pub use client::{ClientError, CryptoClient, CryptoDevice, DeviceFile};
pub use session::DeviceSession;

#[cfg(unix)]
pub use fuse::CryptoFS;
