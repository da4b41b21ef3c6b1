use support::bytes_ext::OutOfBytes;
use thiserror::Error;

/// Every way decoding a single classfile can fail.
///
/// All variants are fatal to the class being defined and to nothing else.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid magic value {0:#010x}")]
    BadMagic(u32),

    #[error("classfile was truncated ({0})")]
    TruncatedInput(#[from] OutOfBytes),

    #[error("unsupported constant pool tag {tag} at index {index}")]
    UnsupportedConstantTag { tag: u8, index: u16 },

    #[error("{referrer} references constant #{index}, which is not a {expected}")]
    DanglingConstantReference {
        index: u16,
        expected: &'static str,
        referrer: String,
    },

    #[error("attribute '{name}' declares {declared} bytes but its contents occupy {consumed}")]
    MalformedAttribute {
        name: String,
        declared: usize,
        consumed: usize,
    },

    #[error("classfile has {0} trailing bytes")]
    TrailingBytes(usize),
}

pub type ParseResult<T> = Result<T, ParseError>;
