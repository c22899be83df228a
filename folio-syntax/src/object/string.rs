//! Strings.

use crate::trivia::{hex_value, is_octal_digit, is_white_space_character};
use log::warn;
use std::fmt::{Debug, Formatter};
use std::ops::Deref;

/// A PDF string, holding its decoded bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct String {
    bytes: Vec<u8>,
    hex: bool,
}

impl String {
    /// Create a new literal string from decoded bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, hex: false }
    }

    /// Create a new string that was written in hexadecimal form.
    pub fn new_hex(bytes: Vec<u8>) -> Self {
        Self { bytes, hex: true }
    }

    /// Returns the decoded content of the string.
    pub fn get(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether the string was written in hexadecimal form.
    pub fn is_hex(&self) -> bool {
        self.hex
    }
}

impl Deref for String {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.bytes
    }
}

impl Debug for String {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match std::str::from_utf8(&self.bytes) {
            Ok(s) if !self.hex => write!(f, "({s})"),
            _ => {
                write!(f, "<")?;
                for b in &self.bytes {
                    write!(f, "{b:02X}")?;
                }
                write!(f, ">")
            }
        }
    }
}

/// Decode the content of a literal string (without the outer parentheses).
pub(crate) fn decode_literal(data: &[u8]) -> Vec<u8> {
    if !data.iter().any(|b| matches!(b, b'\\' | b'\r')) {
        return data.to_vec();
    }

    let mut cleaned = Vec::with_capacity(data.len());
    let mut i = 0;

    while let Some(&byte) = data.get(i) {
        i += 1;

        match byte {
            b'\\' => {
                let Some(&next) = data.get(i) else {
                    // A trailing backslash is silently dropped.
                    break;
                };
                i += 1;

                if is_octal_digit(next) {
                    let mut value = u32::from(next - b'0');

                    for _ in 0..2 {
                        match data.get(i) {
                            Some(&d) if is_octal_digit(d) => {
                                value = value * 8 + u32::from(d - b'0');
                                i += 1;
                            }
                            _ => break,
                        }
                    }

                    if value > 0xff {
                        warn!("overflow occurred while parsing octal literal string");
                    }

                    cleaned.push((value & 0xff) as u8);
                } else {
                    match next {
                        b'n' => cleaned.push(0x0a),
                        b'r' => cleaned.push(0x0d),
                        b't' => cleaned.push(0x09),
                        b'b' => cleaned.push(0x08),
                        b'f' => cleaned.push(0x0c),
                        b'\r' => {
                            // Line continuation, "\\\r\n" counts as a single marker.
                            if data.get(i) == Some(&b'\n') {
                                i += 1;
                            }
                        }
                        b'\n' => {}
                        // Covers `\(`, `\)` and `\\`. For unknown escapes the solidus is
                        // ignored.
                        other => cleaned.push(other),
                    }
                }
            }
            // An end-of-line marker without a preceding solidus is read as a single LF,
            // whether it was CR, LF or CRLF.
            b'\r' => {
                if data.get(i) == Some(&b'\n') {
                    i += 1;
                }

                cleaned.push(b'\n');
            }
            other => cleaned.push(other),
        }
    }

    cleaned
}

/// Decode the content of a hex string (without the angle brackets).
///
/// White space is ignored and an odd number of digits is padded with a zero.
/// Returns the offset of the first invalid character on failure.
pub(crate) fn decode_hex(data: &[u8]) -> Result<Vec<u8>, usize> {
    let mut out = Vec::with_capacity(data.len() / 2 + 1);
    let mut high = None;

    for (pos, b) in data.iter().copied().enumerate() {
        if is_white_space_character(b) {
            continue;
        }

        let value = hex_value(b).ok_or(pos)?;

        match high.take() {
            Some(h) => out.push((h << 4) | value),
            None => high = Some(value),
        }
    }

    if let Some(h) = high {
        out.push(h << 4);
    }

    Ok(out)
}
