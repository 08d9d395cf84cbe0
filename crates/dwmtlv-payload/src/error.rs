/// Errors that can occur while decoding a TLV value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The tag is not one this decoder understands.
    #[error("unsupported TLV type {0:#04x}")]
    UnsupportedType(u8),

    /// The value is shorter than the layout of a known tag requires.
    #[error("TLV type {tag:#04x} needs {needed} bytes, value has {actual}")]
    ShortPayload {
        tag: u8,
        needed: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, DecodeError>;
