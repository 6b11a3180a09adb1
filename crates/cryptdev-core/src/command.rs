//! Command parsing
//!
//! A command is one contiguous write: `<opcode><':'><payload>`. There is no
//! other framing, so the write length is the command length.

use crate::error::ParseError;
use crate::types::{Direction, Shift};
use crate::SEPARATOR;

/// A decoded device command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Encrypt(Vec<u8>),
    Decrypt(Vec<u8>),
    SetShift(Shift),
}

impl Command {
    /// Decode a raw write
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        let (opcode, payload) = match raw {
            [opcode, sep, payload @ ..] if *sep == SEPARATOR => (*opcode, payload),
            [_, found, ..] => return Err(ParseError::BadFraming { found: *found }),
            _ => return Err(ParseError::TooShort { len: raw.len() }),
        };

        match opcode.to_ascii_lowercase() {
            b'e' => Ok(Command::Encrypt(non_empty(payload)?.to_vec())),
            b'd' => Ok(Command::Decrypt(non_empty(payload)?.to_vec())),
            b's' => parse_shift(payload).map(Command::SetShift),
            _ => Err(ParseError::UnknownOperation(opcode)),
        }
    }

    /// Frame a transform request for the given direction
    pub fn encode_transform(direction: Direction, payload: &[u8]) -> Vec<u8> {
        let opcode = match direction {
            Direction::Forward => b'E',
            Direction::Reverse => b'D',
        };
        let mut raw = Vec::with_capacity(payload.len() + 2);
        raw.push(opcode);
        raw.push(SEPARATOR);
        raw.extend_from_slice(payload);
        raw
    }

    /// Frame a shift change
    pub fn encode_set_shift(shift: Shift) -> Vec<u8> {
        format!("S:{}", shift).into_bytes()
    }

    /// Direction of a transform command, `None` for `SetShift`
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Command::Encrypt(_) => Some(Direction::Forward),
            Command::Decrypt(_) => Some(Direction::Reverse),
            Command::SetShift(_) => None,
        }
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Command::Encrypt(_) => "encrypt",
            Command::Decrypt(_) => "decrypt",
            Command::SetShift(_) => "set-shift",
        }
    }
}

fn non_empty(payload: &[u8]) -> Result<&[u8], ParseError> {
    if payload.is_empty() {
        Err(ParseError::EmptyPayload)
    } else {
        Ok(payload)
    }
}

/// Strict shift grammar: `[+-]?[0-9]+\n?`
fn parse_shift(payload: &[u8]) -> Result<Shift, ParseError> {
    let invalid = || ParseError::InvalidShift(String::from_utf8_lossy(payload).into_owned());

    let text = payload.strip_suffix(b"\n").unwrap_or(payload);
    let digits = match text {
        [b'+' | b'-', rest @ ..] => rest,
        _ => text,
    };
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }

    let text = std::str::from_utf8(text).map_err(|_| invalid())?;
    let value: i64 = text.parse().map_err(|_| invalid())?;
    Shift::new(value).map_err(|_| invalid())
}
