pub mod mutf8;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("truncated sequence at byte {offset}")]
    Truncated { offset: usize },

    #[error("invalid byte {byte:#04x} at offset {offset}")]
    InvalidByte { byte: u8, offset: usize },

    #[error("unpaired surrogate in decoded string")]
    UnpairedSurrogate,
}

pub trait EncodingFormat {
    fn into_java(str: &str) -> Vec<u8>;
    fn from_java(data: &[u8]) -> Result<String, EncodingError>;
}
