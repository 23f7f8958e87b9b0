//! Error types for the codec.

/// Errors that can occur while packing or unpacking MessagePack data.
///
/// Unpack errors carry the byte offset at which the decoder stood when the
/// failure was detected, counted from the start of the input (or from the
/// creation of the streaming unpacker).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Pack path: the value has no native encoding and no registered
    /// extension, or a length exceeds the widest wire family.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// Unpack path: the input ended with `needed` more bytes required to
    /// complete a prefix-declared field.
    #[error("insufficient data: input ended at offset {offset} with {needed} more bytes required")]
    InsufficientData { offset: u64, needed: usize },

    /// Unpack path: a str field did not decode as UTF-8.
    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidString { offset: u64 },

    /// Unpack path: a spec-reserved prefix byte (0xc1), or an ext type code
    /// in the reserved negative range.
    #[error("reserved code 0x{code:02x} at offset {offset}")]
    ReservedCode { code: u8, offset: u64 },

    /// Unpack path: a map key has no hashable form in this value model.
    #[error("unhashable map key {key} at offset {offset}")]
    UnhashableKey { key: String, offset: u64 },

    /// Unpack path: a map contains two structurally equal keys.
    #[error("duplicate map key {key} at offset {offset}")]
    DuplicateKey { key: String, offset: u64 },

    /// A source or sink failed; streaming reader failures propagate here.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
