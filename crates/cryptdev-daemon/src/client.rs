//! File encryption client
//!
//! Reads a plaintext file, frames it as one `E:`/`D:` command, writes the
//! command to the device, reads the result back until end-of-data, and
//! writes it to the output file. The device is anything implementing
//! [`CryptoDevice`]: the device file of a mounted `cryptdev-mount`, or an
//! in-process [`IoAdapter`].

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use cryptdev_core::{Command, DeviceError, Direction, Shift};

use crate::adapter::IoAdapter;

/// Client-side errors, with enough context to say what failed
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("cannot read file {path:?}: {source}")]
    Input { path: PathBuf, source: io::Error },

    #[error("file {0:?} is empty")]
    EmptyInput(PathBuf),

    #[error("cannot write file {path:?}: {source}")]
    Output { path: PathBuf, source: io::Error },

    #[error("cannot {op} device {path:?}: {source}")]
    Device {
        op: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    #[error("device rejected {op}: {source}")]
    Rejected {
        op: &'static str,
        source: DeviceError,
    },

    #[error("no data received from device")]
    NoData,
}

/// Something commands can be written to and results read back from
pub trait CryptoDevice {
    /// Write one whole command
    fn submit(&self, command: &[u8]) -> Result<usize, ClientError>;

    /// Read the current result until end-of-data, `chunk_size` bytes at a time
    fn read_result(&self, chunk_size: usize) -> Result<Vec<u8>, ClientError>;
}

/// A device reached through its file path
#[derive(Clone, Debug)]
pub struct DeviceFile {
    path: PathBuf,
}

impl DeviceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn device_error(&self, op: &'static str, source: io::Error) -> ClientError {
        ClientError::Device {
            op,
            path: self.path.clone(),
            source,
        }
    }
}

impl CryptoDevice for DeviceFile {
    fn submit(&self, command: &[u8]) -> Result<usize, ClientError> {
        let mut file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|e| self.device_error("open", e))?;

        // The device treats each write as a complete command
        file.write_all(command)
            .map_err(|e| self.device_error("write to", e))?;
        Ok(command.len())
    }

    fn read_result(&self, chunk_size: usize) -> Result<Vec<u8>, ClientError> {
        let mut file = File::open(&self.path).map_err(|e| self.device_error("open", e))?;
        let mut chunk = vec![0u8; chunk_size.max(1)];
        let mut result = Vec::new();

        loop {
            match file.read(&mut chunk) {
                Ok(0) => return Ok(result),
                Ok(n) => result.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.device_error("read from", e)),
            }
        }
    }
}

impl CryptoDevice for IoAdapter {
    fn submit(&self, command: &[u8]) -> Result<usize, ClientError> {
        let reject = |source| ClientError::Rejected {
            op: "write",
            source,
        };
        let fh = self.open().map_err(reject)?;
        let written = self.write(fh, command);
        self.release(fh).map_err(reject)?;
        written.map_err(reject)
    }

    fn read_result(&self, chunk_size: usize) -> Result<Vec<u8>, ClientError> {
        let reject = |source| ClientError::Rejected { op: "read", source };
        let fh = self.open().map_err(reject)?;
        let mut result = Vec::new();

        let outcome = loop {
            match self.read(fh, chunk_size.max(1)) {
                Ok(data) if data.is_empty() => break Ok(()),
                Ok(data) => result.extend_from_slice(&data),
                Err(e) => break Err(reject(e)),
            }
        };
        self.release(fh).map_err(reject)?;
        outcome.map(|()| result)
    }
}

/// Encrypts and decrypts files through a device
pub struct CryptoClient<D> {
    device: D,
    read_chunk_size: usize,
}

impl<D: CryptoDevice> CryptoClient<D> {
    pub fn new(device: D, read_chunk_size: usize) -> Self {
        Self {
            device,
            read_chunk_size,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Encrypt `input` into `output`, returning the bytes written
    pub fn encrypt_file(&self, input: &Path, output: &Path) -> Result<usize, ClientError> {
        info!("Encrypting: {:?} -> {:?}", input, output);
        let written = self.transform_file(Direction::Forward, input, output)?;
        info!("Encryption complete. Saved to {:?}", output);
        Ok(written)
    }

    /// Decrypt `input` into `output`, returning the bytes written
    pub fn decrypt_file(&self, input: &Path, output: &Path) -> Result<usize, ClientError> {
        info!("Decrypting: {:?} -> {:?}", input, output);
        let written = self.transform_file(Direction::Reverse, input, output)?;
        info!("Decryption complete. Saved to {:?}", output);
        Ok(written)
    }

    /// Run one transform through the device and return its result
    pub fn transform_bytes(&self, direction: Direction, data: &[u8]) -> Result<Vec<u8>, ClientError> {
        let command = Command::encode_transform(direction, data);
        self.device.submit(&command)?;

        let result = self.device.read_result(self.read_chunk_size)?;
        if result.is_empty() {
            return Err(ClientError::NoData);
        }
        debug!("received {} bytes from device", result.len());
        Ok(result)
    }

    /// Change the device shift
    pub fn set_shift(&self, shift: Shift) -> Result<(), ClientError> {
        self.device.submit(&Command::encode_set_shift(shift))?;
        info!("Shift set to {}", shift);
        Ok(())
    }

    fn transform_file(
        &self,
        direction: Direction,
        input: &Path,
        output: &Path,
    ) -> Result<usize, ClientError> {
        let data = std::fs::read(input).map_err(|source| ClientError::Input {
            path: input.to_path_buf(),
            source,
        })?;
        if data.is_empty() {
            return Err(ClientError::EmptyInput(input.to_path_buf()));
        }

        let result = self.transform_bytes(direction, &data)?;

        std::fs::write(output, &result).map_err(|source| ClientError::Output {
            path: output.to_path_buf(),
            source,
        })?;
        Ok(result.len())
    }
}
