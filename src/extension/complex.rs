//! Complex number extension (ext code 0x50).
//!
//! The payload is two big-endian IEEE-754 binary32 values, real part
//! first, carried in a fixext 8 envelope on the wire.

use std::sync::Once;

use crate::error::Error;
use crate::extension::{self, code};
use crate::options::{PackOptions, UnpackOptions};

/// Single-precision complex number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Complex32 {
    pub re: f32,
    pub im: f32,
}

impl Complex32 {
    pub fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }
}

/// Registers the complex extension under [`code::COMPLEX`].
///
/// Idempotent; call once during startup alongside other registrations.
pub fn register() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        extension::register_builtin::<Complex32, _, _>(code::COMPLEX, pack, unpack);
    });
}

fn pack(value: &Complex32, _options: &PackOptions) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(8);
    out.extend_from_slice(&value.re.to_be_bytes());
    out.extend_from_slice(&value.im.to_be_bytes());
    Ok(out)
}

fn unpack(data: &[u8], _options: &UnpackOptions) -> Result<Complex32, Error> {
    match data {
        [a, b, c, d, e, f, g, h] => Ok(Complex32 {
            re: f32::from_be_bytes([*a, *b, *c, *d]),
            im: f32::from_be_bytes([*e, *f, *g, *h]),
        }),
        _ => Err(Error::UnsupportedType(format!(
            "complex payload of {} bytes",
            data.len()
        ))),
    }
}
