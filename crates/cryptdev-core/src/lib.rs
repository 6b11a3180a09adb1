//! Cryptdev Core - Command protocol, shift cipher, and session buffer
//!
//! This crate contains the device logic that does not depend on how bytes
//! reach the device. It has no dependencies on FUSE or filesystem code.
//!
//! # Wire format
//!
//! ```text
//! write:  <opcode:1><':'><payload...>     opcode ∈ {E,e,D,d,S,s}
//! read:   <most recent transform result>  streamed from a caller-held offset
//! ```

pub mod buffer;
pub mod cipher;
pub mod command;
pub mod config;
pub mod error;
pub mod types;

pub use buffer::SessionBuffer;
pub use cipher::{transform, transform_into};
pub use command::Command;
pub use config::{ClientConfig, Config, ConfigError, DeviceConfig, MountConfig};
pub use error::*;
pub use types::*;

/// Byte separating the opcode from the payload
pub const SEPARATOR: u8 = b':';

/// Shortest well-formed command (`E:x`)
pub const MIN_COMMAND_LEN: usize = 3;

/// Default session buffer capacity and command size limit (64 KB)
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// Default read size used by the command-line application (4 KB)
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;

/// Default device file name
pub const DEFAULT_DEVICE_NAME: &str = "crypto0";

/// Name of the read-only status file next to the device
pub const STATUS_FILE_NAME: &str = "status";
