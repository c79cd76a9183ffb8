// Copyright (C) 2022 Yehowshua Immanuel
// This program is distributed under both the GPLV3 license
// and the YEHOWSHUA license, both of which can be found at
// the root of the folder containing the sources for this program.

//! Conversion between vcd identifier codes and dense integer ids.
//!
//! Identifier codes are strings over the 94 printable characters `!`..=`~`.
//! We read them as a bijective base-94 numeral whose first character is the
//! least significant digit, with `!` worth 1 and `~` worth 94. So `!` is id
//! 1, `~` is 94, `!!` is 95, and no two codes share an id.

use super::error::ParseError;

const FIRST: u8 = b'!';
const LAST: u8 = b'~';
const RADIX: u64 = (LAST - FIRST) as u64 + 1;

/// Compound signals draw their ids from here upward, which keeps them out of
/// reach of anything [`decode`] can produce.
pub const SYNTHETIC_ID_BASE: u64 = 1 << 48;

/// Allocation-free decode used on the hot path. Returns `None` for codes
/// that are empty, contain a non printable byte, or overflow the file
/// identifier space.
pub fn try_decode(ident: &[u8]) -> Option<u64> {
    if ident.is_empty() {
        return None;
    }

    let mut id = 0u64;
    let mut weight = 1u64;
    for (pos, chr) in ident.iter().enumerate() {
        if !(FIRST..=LAST).contains(chr) {
            return None;
        }
        let digit = (chr - FIRST) as u64 + 1;
        id = id.checked_add(digit.checked_mul(weight)?)?;
        if pos + 1 < ident.len() {
            weight = weight.checked_mul(RADIX)?;
        }
    }

    if id >= SYNTHETIC_ID_BASE {
        return None;
    }
    Some(id)
}

pub fn decode(ident: &str) -> Result<u64, ParseError> {
    try_decode(ident.as_bytes()).ok_or_else(|| ParseError::InvalidIdentifier {
        ident: ident.to_string(),
        cursor: None,
    })
}

/// Inverse of [`decode`]. Id 0 has no identifier code.
pub fn encode(id: u64) -> Option<String> {
    if id == 0 || id >= SYNTHETIC_ID_BASE {
        return None;
    }

    let mut ident = String::new();
    let mut rest = id;
    while rest > 0 {
        let digit = (rest - 1) % RADIX;
        ident.push((FIRST + digit as u8) as char);
        rest = (rest - 1) / RADIX;
    }
    Some(ident)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_characters() {
        assert_eq!(decode("!").unwrap(), 1);
        assert_eq!(decode("\"").unwrap(), 2);
        assert_eq!(decode("~").unwrap(), 94);
    }

    #[test]
    fn first_character_is_least_significant() {
        assert_eq!(decode("!!").unwrap(), 95);
        assert_eq!(decode("\"!").unwrap(), 96);
        assert_eq!(decode("!\"").unwrap(), 1 + 2 * 94);
        assert_ne!(decode("!").unwrap(), decode("!!").unwrap());
    }

    #[test]
    fn rejects_bad_codes() {
        assert!(matches!(
            decode(""),
            Err(ParseError::InvalidIdentifier { .. })
        ));
        assert!(try_decode(b"a b").is_none());
        assert!(try_decode(&[0x7f]).is_none());
        assert!(try_decode("é".as_bytes()).is_none());
        // far past the file id space
        assert!(try_decode(&[b'~'; 12]).is_none());
    }

    #[test]
    fn encode_matches_icarus_ordering() {
        assert_eq!(encode(1).unwrap(), "!");
        assert_eq!(encode(94).unwrap(), "~");
        assert_eq!(encode(95).unwrap(), "!!");
        assert!(encode(0).is_none());
        assert!(encode(SYNTHETIC_ID_BASE).is_none());
    }

    #[test]
    fn round_trip_over_code_lengths() {
        // boundaries of every code length up to 6 characters, plus a spread
        // of values in between
        let mut edge = 0u64;
        let mut width = RADIX;
        for len in 1..=6 {
            for id in [edge + 1, edge + 2, edge + width / 2 + 1, edge + width] {
                let ident = encode(id).unwrap();
                assert_eq!(ident.len(), len);
                assert_eq!(decode(&ident).unwrap(), id, "{ident}");
            }
            edge += width;
            width *= RADIX;
        }
        for id in (1..200_000u64).step_by(97) {
            assert_eq!(decode(&encode(id).unwrap()).unwrap(), id);
        }
    }

    #[test]
    fn decode_then_encode_is_identity() {
        for ident in ["!", "~", "!!", "#a", "abc", "~~~~~~", "v{Z"] {
            assert_eq!(encode(decode(ident).unwrap()).unwrap(), ident);
        }
    }
}
