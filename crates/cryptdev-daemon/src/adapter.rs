//! I/O boundary adapter
//!
//! Turns file-style calls into session operations. Writes are whole
//! commands; reads stream the current result from a cursor. Callers can
//! either track their own cursor ([`IoAdapter::fetch`]) or open a handle
//! and let the adapter track it per handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace, warn};

use cryptdev_core::{Command, DeviceError, HandleId};

use crate::session::DeviceSession;

/// Per-handle read state
#[derive(Clone, Copy, Debug)]
struct OpenHandle {
    /// Session generation the handle was opened under
    generation: u64,
    cursor: u64,
}

/// Adapter between file operations and the device session
pub struct IoAdapter {
    session: Arc<DeviceSession>,
    handles: DashMap<HandleId, OpenHandle>,
    next_handle: AtomicU64,
}

impl IoAdapter {
    pub fn new(session: Arc<DeviceSession>) -> Self {
        Self {
            session,
            handles: DashMap::new(),
            next_handle: AtomicU64::new(1),
        }
    }

    pub fn session(&self) -> &Arc<DeviceSession> {
        &self.session
    }

    /// Longest accepted write
    pub fn max_command_len(&self) -> usize {
        self.session.config().buffer_capacity
    }

    /// Parse and execute one command
    ///
    /// Returns the number of bytes consumed, always `raw.len()`.
    pub fn submit(&self, raw: &[u8]) -> Result<usize, DeviceError> {
        let max = self.max_command_len();
        if raw.len() > max {
            warn!("submit rejected: {} byte command (max {})", raw.len(), max);
            return Err(DeviceError::CommandTooLarge {
                size: raw.len(),
                max,
            });
        }

        let command = Command::parse(raw).map_err(|e| {
            debug!("submit rejected: {}", e);
            DeviceError::from(e)
        })?;
        self.session.execute(&command)?;
        Ok(raw.len())
    }

    /// Up to `max_len` bytes of the current result from `cursor`
    ///
    /// The cursor is not advanced; the caller adds the returned length.
    pub fn fetch(&self, cursor: u64, max_len: usize) -> Result<Vec<u8>, DeviceError> {
        self.session.fetch(cursor, max_len)
    }

    /// Open a handle on the attached device
    pub fn open(&self) -> Result<HandleId, DeviceError> {
        let generation = self.session.generation().ok_or(DeviceError::NoDevice)?;
        let fh = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.handles.insert(
            fh,
            OpenHandle {
                generation,
                cursor: 0,
            },
        );
        trace!("open: fh={} generation={}", fh, generation);
        Ok(fh)
    }

    /// Read from the handle's own cursor and advance it
    pub fn read(&self, fh: HandleId, max_len: usize) -> Result<Vec<u8>, DeviceError> {
        let mut handle = self.handles.get_mut(&fh).ok_or(DeviceError::BadHandle(fh))?;
        let data = self
            .session
            .fetch_for(handle.generation, handle.cursor, max_len)?;
        handle.cursor += data.len() as u64;
        Ok(data)
    }

    /// Read at an explicit offset (the caller's position wins)
    pub fn read_at(
        &self,
        fh: HandleId,
        offset: u64,
        max_len: usize,
    ) -> Result<Vec<u8>, DeviceError> {
        let mut handle = self.handles.get_mut(&fh).ok_or(DeviceError::BadHandle(fh))?;
        let data = self.session.fetch_for(handle.generation, offset, max_len)?;
        handle.cursor = offset + data.len() as u64;
        Ok(data)
    }

    /// Submit a command through a handle
    pub fn write(&self, fh: HandleId, raw: &[u8]) -> Result<usize, DeviceError> {
        let generation = self
            .handles
            .get(&fh)
            .map(|h| h.generation)
            .ok_or(DeviceError::BadHandle(fh))?;
        if self.session.generation() != Some(generation) {
            return Err(DeviceError::NoDevice);
        }
        self.submit(raw)
    }

    /// Close a handle
    pub fn release(&self, fh: HandleId) -> Result<(), DeviceError> {
        match self.handles.remove(&fh) {
            Some(_) => {
                trace!("release: fh={}", fh);
                Ok(())
            }
            None => Err(DeviceError::BadHandle(fh)),
        }
    }

    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }
}
