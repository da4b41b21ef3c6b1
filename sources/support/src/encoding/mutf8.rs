//! The "modified UTF-8" used by classfile `Utf8` constants.
//!
//! Differs from standard UTF-8 in two ways: NUL is written as the two byte
//! form `C0 80`, and supplementary characters are written as a surrogate pair
//! of three byte sequences rather than one four byte sequence.

use std::borrow::Cow;

use super::{EncodingError, EncodingFormat};

pub struct ModifiedUtf8;

impl EncodingFormat for ModifiedUtf8 {
    fn into_java(str: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(str.len());

        for unit in str.encode_utf16() {
            match unit {
                0x0001..=0x007F => out.push(unit as u8),
                0x0000 | 0x0080..=0x07FF => {
                    out.push(0xC0 | (unit >> 6) as u8);
                    out.push(0x80 | (unit & 0x3F) as u8);
                }
                _ => {
                    out.push(0xE0 | (unit >> 12) as u8);
                    out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                    out.push(0x80 | (unit & 0x3F) as u8);
                }
            }
        }

        out
    }

    fn from_java(data: &[u8]) -> Result<String, EncodingError> {
        let mut units: Vec<u16> = Vec::with_capacity(data.len());
        let mut offset = 0;

        let continuation = |offset: usize| -> Result<u16, EncodingError> {
            let byte = *data.get(offset).ok_or(EncodingError::Truncated { offset })?;
            if byte & 0xC0 != 0x80 {
                return Err(EncodingError::InvalidByte { byte, offset });
            }

            Ok((byte & 0x3F) as u16)
        };

        while offset < data.len() {
            let byte = data[offset];

            let unit = if byte != 0 && byte & 0x80 == 0 {
                offset += 1;
                byte as u16
            } else if byte & 0xE0 == 0xC0 {
                let low = continuation(offset + 1)?;
                offset += 2;
                ((byte & 0x1F) as u16) << 6 | low
            } else if byte & 0xF0 == 0xE0 {
                let mid = continuation(offset + 1)?;
                let low = continuation(offset + 2)?;
                offset += 3;
                ((byte & 0x0F) as u16) << 12 | mid << 6 | low
            } else {
                return Err(EncodingError::InvalidByte { byte, offset });
            };

            units.push(unit);
        }

        String::from_utf16(&units).map_err(|_| EncodingError::UnpairedSurrogate)
    }
}

/// Decode, falling back to a lossy standard UTF-8 reading for malformed input.
pub fn decode_lossy(data: &[u8]) -> Cow<'_, str> {
    match ModifiedUtf8::from_java(data) {
        Ok(decoded) => Cow::Owned(decoded),
        Err(_) => String::from_utf8_lossy(data),
    }
}
