//! mpstream — a pure-Rust MessagePack codec with streaming support.
//!
//! This crate serializes [`Value`] trees into the MessagePack wire format
//! and deserializes them back, with minimal-width encoding, strict framing,
//! and an unpacker that also runs over async byte streams of unknown total
//! length.
//!
//! # Architecture
//!
//! - **`value`** — the value taxonomy (`Nil` through `Ext`) and the
//!   signed/unsigned [`Int`]
//! - **`encode`** — packer: value → bytes, narrowest family that fits
//! - **`decode`** — unpacker core, written once against a "read exactly N
//!   bytes" capability, plus the synchronous front-ends
//! - **`stream`** — streaming unpacker over `tokio::io::AsyncRead`
//!   (feature-gated)
//! - **`extension`** — process-wide ext registry and the built-in
//!   extensions
//! - **`marker`** — wire prefix constants
//!
//! # Example
//!
//! ```
//! use mpstream::{dumps, loads, PackOptions, UnpackOptions, Value};
//!
//! let value = Value::Array(vec![Value::from(1), Value::from("two")]);
//! let bytes = dumps(&value, &PackOptions::default())?;
//! assert_eq!(loads(&bytes, &UnpackOptions::default())?, value);
//! # Ok::<(), mpstream::Error>(())
//! ```

pub mod decode;
pub mod encode;
pub mod error;
pub mod extension;
pub mod marker;
pub mod options;
pub mod value;

#[cfg(feature = "stream")]
pub mod stream;

pub use error::Error;
pub use options::{FloatPrecision, PackOptions, UnpackOptions};
pub use value::{Int, Value};

#[cfg(feature = "stream")]
pub use stream::{observer_fn, ChunkObserver, StreamUnpacker};

use std::any::Any;
use std::io;

use bytes::{Bytes, BytesMut};

/// Packs a value into a freshly owned byte buffer holding one document.
pub fn dumps(value: &Value, options: &PackOptions) -> Result<Bytes, Error> {
    let mut buf = BytesMut::new();
    encode::pack_value(&mut buf, value, options)?;
    Ok(buf.freeze())
}

/// Packs a value and writes the document to `sink`.
pub fn dump<W: io::Write>(value: &Value, sink: &mut W, options: &PackOptions) -> Result<(), Error> {
    let buf = dumps(value, options)?;
    sink.write_all(&buf)?;
    Ok(())
}

/// Unpacks one document from the front of `bytes`.
///
/// Trailing bytes are left unread and are not an error; documents are
/// self-delimiting.
pub fn loads(bytes: &[u8], options: &UnpackOptions) -> Result<Value, Error> {
    decode::decode_from_slice(bytes, options)
}

/// Unpacks one document from a blocking reader, consuming only the bytes
/// the document needs.
pub fn load<R: io::Read + Send>(source: &mut R, options: &UnpackOptions) -> Result<Value, Error> {
    decode::decode_from_reader(source, options)
}

/// Packs a value of a registered extension type (see [`extension`]) as one
/// document carrying its ext envelope.
pub fn dumps_ext<T: Any>(value: &T, options: &PackOptions) -> Result<Bytes, Error> {
    dumps(&extension::to_value(value, options)?, options)
}

/// Unpacks one document that must be the ext envelope of the registered
/// type `T`.
pub fn loads_ext<T: Any>(bytes: &[u8], options: &UnpackOptions) -> Result<T, Error> {
    extension::from_value(&loads(bytes, options)?, options)
}
