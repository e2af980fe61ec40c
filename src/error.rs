//! Error types for decoding.

/// Errors that can occur while decoding a packed stream.
///
/// Encoding is infallible. Any decode error invalidates the whole result;
/// there is no partial recovery from a malformed node anywhere in the
/// stream.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unsupported format version: {0}")]
    Version(u8),

    #[error("unknown tag byte 0x{tag:02X} at offset {offset}")]
    UnknownTag { tag: u8, offset: usize },

    #[error("need {needed} more bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("back-reference to unknown offset {0}")]
    BadBackref(u32),

    #[error("invalid UTF-8 at offset {offset}")]
    Utf8 {
        offset: usize,
        #[source]
        source: std::string::FromUtf8Error,
    },
}
