//! Device session state machine
//!
//! ```text
//!            attach()                 execute(cmd) / fetch()
//! Detached ───────────► Attached ◄──────────────────────────┐
//!    ▲                     │   └────────────────────────────┘
//!    └─────── detach() ────┘
//! ```
//!
//! One session owns one [`SessionBuffer`] and the current shift. Commands
//! run under the write lock so two results can never interleave; reads
//! copy out under the read lock so they never see a half-written result.
//! Every attach starts a new generation, which lets handles opened under an
//! earlier attachment detect that their cursor is stale.

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use cryptdev_core::{Command, DeviceConfig, DeviceError, DeviceStatus, Direction, SessionBuffer, Shift};

/// State that only exists while a device is attached
#[derive(Debug)]
struct Attached {
    buffer: SessionBuffer,
    shift: Shift,
    generation: u64,
}

#[derive(Debug)]
struct Slot {
    attached: Option<Attached>,
    /// Generation of the most recent attach (0 = never attached)
    generation: u64,
    /// Shift in effect at the last detach
    last_shift: Shift,
}

/// The single device session
#[derive(Debug)]
pub struct DeviceSession {
    config: DeviceConfig,
    slot: RwLock<Slot>,
}

impl DeviceSession {
    /// Create a detached session
    pub fn new(config: DeviceConfig) -> Self {
        let last_shift = config.default_shift;
        Self {
            config,
            slot: RwLock::new(Slot {
                attached: None,
                generation: 0,
                last_shift,
            }),
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Detached → Attached
    ///
    /// Returns the new generation. A second attach while attached is a
    /// conflict. If the buffer cannot be allocated the session stays
    /// detached and the caller may retry.
    pub fn attach(&self) -> Result<u64, DeviceError> {
        let mut slot = self.slot.write();
        if slot.attached.is_some() {
            warn!("attach rejected: device already attached");
            return Err(DeviceError::AlreadyAttached);
        }

        let buffer = SessionBuffer::allocate(self.config.buffer_capacity).map_err(|e| {
            warn!("attach failed: {}", e);
            e
        })?;

        let shift = if self.config.retain_shift_on_reattach {
            slot.last_shift
        } else {
            self.config.default_shift
        };
        slot.generation += 1;
        let generation = slot.generation;
        slot.attached = Some(Attached {
            buffer,
            shift,
            generation,
        });

        info!(
            "Device attached (generation {}, shift {}, buffer {} bytes)",
            generation, shift, self.config.buffer_capacity
        );
        Ok(generation)
    }

    /// Attached → Detached, releasing the buffer
    pub fn detach(&self) -> Result<(), DeviceError> {
        let mut slot = self.slot.write();
        let attached = slot.attached.take().ok_or(DeviceError::NoDevice)?;
        slot.last_shift = attached.shift;
        info!("Device detached (generation {})", attached.generation);
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.slot.read().attached.is_some()
    }

    /// Generation of the current attachment
    pub fn generation(&self) -> Option<u64> {
        self.slot.read().attached.as_ref().map(|a| a.generation)
    }

    /// Run one command against the attached device
    ///
    /// On error nothing changes.
    pub fn execute(&self, command: &Command) -> Result<(), DeviceError> {
        let mut slot = self.slot.write();
        let attached = slot.attached.as_mut().ok_or(DeviceError::NoDevice)?;

        let (payload, direction) = match command {
            Command::SetShift(shift) => {
                debug!("shift {} -> {}", attached.shift, shift);
                attached.shift = *shift;
                return Ok(());
            }
            Command::Encrypt(payload) => (payload, Direction::Forward),
            Command::Decrypt(payload) => (payload, Direction::Reverse),
        };

        attached
            .buffer
            .replace_with_transform(payload, attached.shift, direction)?;
        debug!(
            "{}: {} bytes with shift {}",
            command.name(),
            payload.len(),
            attached.shift
        );
        Ok(())
    }

    /// Copy up to `max_len` bytes of the current result starting at `cursor`
    pub fn fetch(&self, cursor: u64, max_len: usize) -> Result<Vec<u8>, DeviceError> {
        let slot = self.slot.read();
        let attached = slot.attached.as_ref().ok_or(DeviceError::NoDevice)?;
        Ok(attached.buffer.read_at(cursor, max_len).to_vec())
    }

    /// Like [`fetch`](Self::fetch), but only for the given generation
    pub fn fetch_for(
        &self,
        generation: u64,
        cursor: u64,
        max_len: usize,
    ) -> Result<Vec<u8>, DeviceError> {
        let slot = self.slot.read();
        match slot.attached.as_ref() {
            Some(attached) if attached.generation == generation => {
                Ok(attached.buffer.read_at(cursor, max_len).to_vec())
            }
            _ => Err(DeviceError::NoDevice),
        }
    }

    /// Current shift
    pub fn shift(&self) -> Result<Shift, DeviceError> {
        let slot = self.slot.read();
        slot.attached
            .as_ref()
            .map(|a| a.shift)
            .ok_or(DeviceError::NoDevice)
    }

    /// Length of the current result (0 when detached)
    pub fn buffered_len(&self) -> usize {
        self.slot
            .read()
            .attached
            .as_ref()
            .map_or(0, |a| a.buffer.len())
    }

    pub fn status(&self) -> DeviceStatus {
        match self.slot.read().attached.as_ref() {
            Some(a) => DeviceStatus::Connected {
                shift: a.shift,
                buffered: a.buffer.len(),
            },
            None => DeviceStatus::Disconnected,
        }
    }
}

impl Default for DeviceSession {
    fn default() -> Self {
        Self::new(DeviceConfig::default())
    }
}
