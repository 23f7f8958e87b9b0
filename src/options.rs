//! Pack and unpack configuration.

/// Float width for one pack call.
///
/// The choice is made once per call, never per value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FloatPrecision {
    /// Host float width. Rust floats are binary64, so this emits `float 64`.
    #[default]
    Auto,
    /// Emit `float 32` (values are narrowed to binary32).
    Single,
    /// Emit `float 64`.
    Double,
}

/// Options for [`dumps`](crate::dumps) and [`dump`](crate::dump).
#[derive(Debug, Clone, Copy, Default)]
pub struct PackOptions {
    pub force_float_precision: FloatPrecision,
}

/// Options for [`loads`](crate::loads), [`load`](crate::load) and the
/// streaming unpacker.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnpackOptions {
    /// A str field that is not valid UTF-8 decodes to [`Value::Bin`]
    /// with the raw bytes instead of failing.
    ///
    /// [`Value::Bin`]: crate::Value::Bin
    pub allow_invalid_utf8: bool,
    /// Decoded maps are entry vectors and keep wire encounter order
    /// unconditionally; the flag is accepted for option-set parity with
    /// bindings whose default maps are unordered.
    pub use_ordered_dict: bool,
    /// Arrays have a single owned representation; the flag is accepted for
    /// option-set parity with bindings that distinguish immutable
    /// sequences.
    pub use_tuple: bool,
}
