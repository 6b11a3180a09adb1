//! Core type definitions for cryptdev

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Letters in each case's alphabet
pub const ALPHABET_LEN: u8 = 26;

/// Shift used when nothing else is configured
pub const DEFAULT_SHIFT: u8 = 13;

/// Largest accepted shift
pub const MAX_SHIFT: u8 = ALPHABET_LEN - 1;

/// Rotation applied to alphabetic bytes, always in [0, 25]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Shift(u8);

impl Shift {
    /// Validate an integer shift
    pub fn new(value: i64) -> Result<Self, ParseError> {
        if (0..=i64::from(MAX_SHIFT)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ParseError::InvalidShift(value.to_string()))
        }
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// The shift that undoes this one: `(26 - shift) mod 26`
    pub const fn inverse(self) -> Self {
        Self((ALPHABET_LEN - self.0) % ALPHABET_LEN)
    }

    /// Effective rotation for the given direction
    pub const fn for_direction(self, direction: Direction) -> Self {
        match direction {
            Direction::Forward => self,
            Direction::Reverse => self.inverse(),
        }
    }
}

impl Default for Shift {
    fn default() -> Self {
        Self(DEFAULT_SHIFT)
    }
}

impl TryFrom<i64> for Shift {
    type Error = ParseError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Shift> for u8 {
    fn from(shift: Shift) -> Self {
        shift.0
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which way the rotation runs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Encrypt: rotate by `+shift`
    Forward,
    /// Decrypt: rotate by `26 - shift`
    Reverse,
}

/// Identifies an open handle on the device
pub type HandleId = u64;

/// Human-readable device state for the status side channel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceStatus {
    Connected { shift: Shift, buffered: usize },
    Disconnected,
}

impl DeviceStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, DeviceStatus::Connected { .. })
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceStatus::Connected { shift, buffered } => {
                write!(f, "connected shift={} buffered={}", shift, buffered)
            }
            DeviceStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_bounds() {
        assert!(Shift::new(0).is_ok());
        assert!(Shift::new(25).is_ok());
        assert!(matches!(Shift::new(26), Err(ParseError::InvalidShift(_))));
        assert!(matches!(Shift::new(-1), Err(ParseError::InvalidShift(_))));
    }

    #[test]
    fn test_shift_inverse() {
        assert_eq!(Shift::new(0).unwrap().inverse().value(), 0);
        assert_eq!(Shift::new(1).unwrap().inverse().value(), 25);
        assert_eq!(Shift::new(13).unwrap().inverse().value(), 13);
        assert_eq!(Shift::default().value(), DEFAULT_SHIFT);
    }

    #[test]
    fn test_shift_serde() {
        #[derive(Deserialize)]
        struct Wrapper {
            shift: Shift,
        }

        let ok: Wrapper = toml::from_str("shift = 7").unwrap();
        assert_eq!(ok.shift.value(), 7);
        assert!(toml::from_str::<Wrapper>("shift = 30").is_err());
    }

    #[test]
    fn test_status_display() {
        let status = DeviceStatus::Connected {
            shift: Shift::default(),
            buffered: 5,
        };
        assert!(status.is_connected());
        assert_eq!(status.to_string(), "connected shift=13 buffered=5");
        assert_eq!(DeviceStatus::Disconnected.to_string(), "disconnected");
    }
}
