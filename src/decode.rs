//! Fixed-width field decoding.
//!
//! Binary columns hold small unsigned big-endian integers. Decoding is total:
//! anything that is not a long-enough buffer yields [`Reading::NotAvailable`].

use serde::{Serialize, Serializer};
use static_assertions::const_assert;

/// Width of route, point, battery and screen-info columns.
pub const WORD_WIDTH: usize = 2;
/// Width of traffic zone request/busy columns.
pub const FLAG_WIDTH: usize = 1;

const MAX_WIDTH: usize = 2;

const_assert!(WORD_WIDTH <= MAX_WIDTH);
const_assert!(FLAG_WIDTH <= MAX_WIDTH);
const_assert!(MAX_WIDTH <= core::mem::size_of::<u16>());

/// Text shown in place of a value that could not be decoded.
pub const NOT_AVAILABLE: &str = "N/A";

/// Result of decoding one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reading {
    Value(u16),
    /// The sentinel: buffer absent, too short, or an unsupported width.
    NotAvailable,
}

impl Reading {
    pub fn value(self) -> Option<u16> {
        match self {
            Reading::Value(v) => Some(v),
            Reading::NotAvailable => None,
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, Reading::Value(_))
    }
}

impl core::fmt::Display for Reading {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Reading::Value(v) => write!(f, "{}", v),
            Reading::NotAvailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

// Numbers serialize as numbers, the sentinel as "N/A".
impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Reading::Value(v) => serializer.serialize_u16(*v),
            Reading::NotAvailable => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

/// Decode the first `expected_len` bytes of `buffer` as an unsigned
/// big-endian integer.
///
/// Supported widths are 1 (0-255) and 2 (0-65535). Extra trailing bytes are
/// ignored.
pub fn decode(buffer: Option<&[u8]>, expected_len: usize) -> Reading {
    let Some(bytes) = buffer else {
        return Reading::NotAvailable;
    };
    if bytes.len() < expected_len {
        return Reading::NotAvailable;
    }

    match expected_len {
        1 => Reading::Value(u16::from(bytes[0])),
        2 => Reading::Value(u16::from_be_bytes([bytes[0], bytes[1]])),
        _ => Reading::NotAvailable,
    }
}

/// Encode `value` into a big-endian buffer of `width` bytes, the inverse of
/// [`decode`]. Returns `None` when the value does not fit.
pub fn encode(value: u16, width: usize) -> Option<Vec<u8>> {
    match width {
        1 => u8::try_from(value).ok().map(|b| vec![b]),
        2 => Some(value.to_be_bytes().to_vec()),
        _ => None,
    }
}
