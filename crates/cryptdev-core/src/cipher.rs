//! Shift cipher
//!
//! Rotates ASCII letters within their own case. Every other byte, including
//! non-ASCII, passes through untouched, so output length always equals
//! input length.

use crate::types::{Direction, Shift, ALPHABET_LEN};

/// Rotate a single byte
#[inline]
pub fn rotate_byte(byte: u8, shift: Shift) -> u8 {
    let base = match byte {
        b'A'..=b'Z' => b'A',
        b'a'..=b'z' => b'a',
        _ => return byte,
    };
    (byte - base + shift.value()) % ALPHABET_LEN + base
}

/// Transform `input` into a new buffer
pub fn transform(input: &[u8], shift: Shift, direction: Direction) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    transform_into(input, shift, direction, &mut out);
    out
}

/// Transform `input`, replacing the contents of `out`
///
/// `out` is cleared first. It does not reallocate when its capacity already
/// covers `input.len()`.
pub fn transform_into(input: &[u8], shift: Shift, direction: Direction, out: &mut Vec<u8>) {
    let effective = shift.for_direction(direction);
    out.clear();
    out.extend(input.iter().map(|&b| rotate_byte(b, effective)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn shift(v: i64) -> Shift {
        Shift::new(v).unwrap()
    }

    #[test]
    fn test_case_and_non_alpha_preserved() {
        assert_eq!(transform(b"Ab3!", shift(1), Direction::Forward), b"Bc3!");
    }

    #[test]
    fn test_wrap_around() {
        assert_eq!(transform(b"z", shift(1), Direction::Forward), b"a");
        assert_eq!(transform(b"Z", shift(1), Direction::Forward), b"A");
        assert_eq!(transform(b"a", shift(1), Direction::Reverse), b"z");
    }

    #[test]
    fn test_rot13_is_self_inverse() {
        let once = transform(b"Hello, World", Shift::default(), Direction::Forward);
        assert_eq!(once, b"Uryyb, Jbeyq");
        assert_eq!(
            transform(&once, Shift::default(), Direction::Forward),
            b"Hello, World"
        );
    }

    #[test]
    fn test_zero_shift_is_identity() {
        let input = b"The quick brown fox";
        assert_eq!(transform(input, shift(0), Direction::Forward), input);
        assert_eq!(transform(input, shift(0), Direction::Reverse), input);
    }

    #[test]
    fn test_non_ascii_passthrough() {
        let input = "đã mã hoá".as_bytes();
        let out = transform(input, shift(5), Direction::Forward);
        assert_eq!(out.len(), input.len());
        for (a, b) in input.iter().zip(&out) {
            if !a.is_ascii_alphabetic() {
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn test_transform_into_reuses_storage() {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(b"previous result that is longer");
        let ptr = out.as_ptr();
        transform_into(b"hi", shift(1), Direction::Forward, &mut out);
        assert_eq!(out, b"ij");
        assert_eq!(out.as_ptr(), ptr);
    }

    #[test]
    fn test_every_shift_round_trips_alphabet() {
        let alphabet: Vec<u8> = (b'A'..=b'Z').chain(b'a'..=b'z').collect();
        for s in 0..=25 {
            let enc = transform(&alphabet, shift(s), Direction::Forward);
            assert_eq!(transform(&enc, shift(s), Direction::Reverse), alphabet);
        }
    }

    proptest! {
        #[test]
        fn prop_round_trip(payload in proptest::collection::vec(any::<u8>(), 0..512), s in 0i64..=25) {
            let s = shift(s);
            let enc = transform(&payload, s, Direction::Forward);
            prop_assert_eq!(enc.len(), payload.len());
            prop_assert_eq!(transform(&enc, s, Direction::Reverse), payload);
        }

        #[test]
        fn prop_only_letters_change(payload in proptest::collection::vec(any::<u8>(), 0..512), s in 0i64..=25) {
            let enc = transform(&payload, shift(s), Direction::Forward);
            for (a, b) in payload.iter().zip(&enc) {
                prop_assert_eq!(a.is_ascii_alphabetic(), b.is_ascii_alphabetic());
                if a.is_ascii_alphabetic() {
                    prop_assert_eq!(a.is_ascii_uppercase(), b.is_ascii_uppercase());
                } else {
                    prop_assert_eq!(a, b);
                }
            }
        }
    }
}
