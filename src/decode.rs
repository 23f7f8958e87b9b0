//! MessagePack decoding: bytes → `Value`.
//!
//! One decoder serves both the synchronous and the streaming front-ends.
//! It is written against the [`Source`] capability ("read exactly N bytes",
//! possibly suspending) and never looks at the transport. The synchronous
//! entry points drive the same future over sources that never suspend.

use std::collections::HashSet;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use crate::error::Error;
use crate::marker;
use crate::options::UnpackOptions;
use crate::value::{Int, Value};

/// Byte source the decoder reads from.
///
/// `read_exact` either fills `out` completely or fails: `InsufficientData`
/// when the source is exhausted, `Io` when the transport itself fails.
pub(crate) trait Source: Send {
    fn read_exact(&mut self, out: &mut [u8]) -> impl Future<Output = Result<(), Error>> + Send;

    /// Total bytes consumed so far, used for error offsets.
    fn pos(&self) -> u64;
}

/// Decodes exactly one document from the source.
pub(crate) async fn decode_document<S: Source>(
    src: &mut S,
    options: &UnpackOptions,
) -> Result<Value, Error> {
    decode_value(src, options).await
}

// Recursing through arrays and maps would give the future an infinite size,
// so the recursive step goes through a boxed future.
fn decode_value<'a, S: Source>(
    src: &'a mut S,
    options: &'a UnpackOptions,
) -> Pin<Box<dyn Future<Output = Result<Value, Error>> + Send + 'a>> {
    Box::pin(async move {
        let offset = src.pos();
        let m = read_u8(src).await?;
        match m {
            marker::NIL => Ok(Value::Nil),
            marker::RESERVED => Err(Error::ReservedCode { code: m, offset }),
            marker::FALSE => Ok(Value::Bool(false)),
            marker::TRUE => Ok(Value::Bool(true)),

            marker::BIN_8 => {
                let len = usize::from(read_u8(src).await?);
                decode_bin(src, len).await
            }
            marker::BIN_16 => {
                let len = usize::from(read_u16(src).await?);
                decode_bin(src, len).await
            }
            marker::BIN_32 => {
                let len = read_u32(src).await? as usize;
                decode_bin(src, len).await
            }

            marker::EXT_8 => {
                let len = usize::from(read_u8(src).await?);
                decode_ext(src, len).await
            }
            marker::EXT_16 => {
                let len = usize::from(read_u16(src).await?);
                decode_ext(src, len).await
            }
            marker::EXT_32 => {
                let len = read_u32(src).await? as usize;
                decode_ext(src, len).await
            }

            marker::FLOAT_32 => {
                let bits = f32::from_be_bytes(read_n(src).await?);
                Ok(Value::Float(f64::from(bits)))
            }
            marker::FLOAT_64 => Ok(Value::Float(f64::from_be_bytes(read_n(src).await?))),

            marker::UINT_8 => Ok(Value::Int(Int::from(read_u8(src).await?))),
            marker::UINT_16 => Ok(Value::Int(Int::from(read_u16(src).await?))),
            marker::UINT_32 => Ok(Value::Int(Int::from(read_u32(src).await?))),
            marker::UINT_64 => Ok(Value::Int(Int::from(u64::from_be_bytes(
                read_n(src).await?,
            )))),

            marker::INT_8 => Ok(Value::Int(Int::from(read_u8(src).await? as i8))),
            marker::INT_16 => Ok(Value::Int(Int::from(i16::from_be_bytes(
                read_n(src).await?,
            )))),
            marker::INT_32 => Ok(Value::Int(Int::from(i32::from_be_bytes(
                read_n(src).await?,
            )))),
            marker::INT_64 => Ok(Value::Int(Int::from(i64::from_be_bytes(
                read_n(src).await?,
            )))),

            marker::FIXEXT_1 => decode_ext(src, 1).await,
            marker::FIXEXT_2 => decode_ext(src, 2).await,
            marker::FIXEXT_4 => decode_ext(src, 4).await,
            marker::FIXEXT_8 => decode_ext(src, 8).await,
            marker::FIXEXT_16 => decode_ext(src, 16).await,

            marker::STR_8 => {
                let len = usize::from(read_u8(src).await?);
                decode_str(src, len, options).await
            }
            marker::STR_16 => {
                let len = usize::from(read_u16(src).await?);
                decode_str(src, len, options).await
            }
            marker::STR_32 => {
                let len = read_u32(src).await? as usize;
                decode_str(src, len, options).await
            }

            marker::ARRAY_16 => {
                let len = usize::from(read_u16(src).await?);
                decode_array(src, len, options).await
            }
            marker::ARRAY_32 => {
                let len = read_u32(src).await? as usize;
                decode_array(src, len, options).await
            }

            marker::MAP_16 => {
                let len = usize::from(read_u16(src).await?);
                decode_map(src, len, options).await
            }
            marker::MAP_32 => {
                let len = read_u32(src).await? as usize;
                decode_map(src, len, options).await
            }

            // Every 0xC0..=0xDF prefix is named above, so what remains are
            // the fix families.
            _ if m <= 0x7F => Ok(Value::Int(Int::from(m))),
            _ if m >= 0xE0 => Ok(Value::Int(Int::from(m as i8))),
            _ if m & 0xF0 == marker::FIXMAP_NIBBLE => {
                decode_map(src, usize::from(m & 0x0F), options).await
            }
            _ if m & 0xF0 == marker::FIXARRAY_NIBBLE => {
                decode_array(src, usize::from(m & 0x0F), options).await
            }
            // Remaining range is fixstr: 0xA0..=0xBF.
            _ => decode_str(src, usize::from(m & 0x1F), options).await,
        }
    })
}

async fn read_u8<S: Source>(src: &mut S) -> Result<u8, Error> {
    Ok(read_n::<1, S>(src).await?[0])
}

async fn read_u16<S: Source>(src: &mut S) -> Result<u16, Error> {
    Ok(u16::from_be_bytes(read_n(src).await?))
}

async fn read_u32<S: Source>(src: &mut S) -> Result<u32, Error> {
    Ok(u32::from_be_bytes(read_n(src).await?))
}

async fn read_n<const N: usize, S: Source>(src: &mut S) -> Result<[u8; N], Error> {
    let mut buf = [0u8; N];
    src.read_exact(&mut buf).await?;
    Ok(buf)
}

async fn decode_bin<S: Source>(src: &mut S, len: usize) -> Result<Value, Error> {
    let mut data = vec![0u8; len];
    src.read_exact(&mut data).await?;
    Ok(Value::Bin(data))
}

async fn decode_str<S: Source>(
    src: &mut S,
    len: usize,
    options: &UnpackOptions,
) -> Result<Value, Error> {
    let offset = src.pos();
    let mut data = vec![0u8; len];
    src.read_exact(&mut data).await?;
    match String::from_utf8(data) {
        Ok(s) => Ok(Value::Str(s)),
        Err(e) if options.allow_invalid_utf8 => Ok(Value::Bin(e.into_bytes())),
        Err(_) => Err(Error::InvalidString { offset }),
    }
}

async fn decode_ext<S: Source>(src: &mut S, len: usize) -> Result<Value, Error> {
    let offset = src.pos();
    let code = read_u8(src).await? as i8;
    if code < 0 {
        // The negative range is reserved by the MessagePack spec (the
        // timestamp family lives at -1); none of it is implemented here.
        return Err(Error::ReservedCode {
            code: code as u8,
            offset,
        });
    }
    let mut data = vec![0u8; len];
    src.read_exact(&mut data).await?;
    Ok(Value::Ext(code, data))
}

async fn decode_array<S: Source>(
    src: &mut S,
    len: usize,
    options: &UnpackOptions,
) -> Result<Value, Error> {
    let mut items = Vec::with_capacity(len);
    for _ in 0..len {
        items.push(decode_value(src, options).await?);
    }
    Ok(Value::Array(items))
}

async fn decode_map<S: Source>(
    src: &mut S,
    len: usize,
    options: &UnpackOptions,
) -> Result<Value, Error> {
    let mut entries = Vec::with_capacity(len);
    let mut seen = HashSet::with_capacity(len);
    for _ in 0..len {
        let key_offset = src.pos();
        let key = decode_value(src, options).await?;
        match MapKey::project(&key) {
            Some(k) => {
                if !seen.insert(k) {
                    return Err(Error::DuplicateKey {
                        key: key.to_string(),
                        offset: key_offset,
                    });
                }
            }
            None => {
                return Err(Error::UnhashableKey {
                    key: key.to_string(),
                    offset: key_offset,
                });
            }
        }
        let value = decode_value(src, options).await?;
        entries.push((key, value));
    }
    Ok(Value::Map(entries))
}

/// Structural projection of a map key for duplicate detection.
///
/// Floats (no total equality) and maps (mirrors the source model, where
/// mappings cannot key a mapping) have no projection and are rejected as
/// unhashable.
#[derive(PartialEq, Eq, Hash)]
enum MapKey {
    Nil,
    Bool(bool),
    Int(Int),
    Str(String),
    Bin(Vec<u8>),
    Array(Vec<MapKey>),
    Ext(i8, Vec<u8>),
}

impl MapKey {
    fn project(value: &Value) -> Option<MapKey> {
        match value {
            Value::Nil => Some(MapKey::Nil),
            Value::Bool(b) => Some(MapKey::Bool(*b)),
            Value::Int(n) => Some(MapKey::Int(*n)),
            Value::Str(s) => Some(MapKey::Str(s.clone())),
            Value::Bin(b) => Some(MapKey::Bin(b.clone())),
            Value::Array(items) => items
                .iter()
                .map(MapKey::project)
                .collect::<Option<Vec<_>>>()
                .map(MapKey::Array),
            Value::Ext(code, data) => Some(MapKey::Ext(*code, data.clone())),
            Value::Float(_) | Value::Map(_) => None,
        }
    }
}

// -- Synchronous sources and front-ends --

/// Source over a byte slice. Never suspends.
struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Source for SliceSource<'_> {
    async fn read_exact(&mut self, out: &mut [u8]) -> Result<(), Error> {
        let rest = &self.data[self.pos..];
        if rest.len() < out.len() {
            return Err(Error::InsufficientData {
                offset: self.data.len() as u64,
                needed: out.len() - rest.len(),
            });
        }
        out.copy_from_slice(&rest[..out.len()]);
        self.pos += out.len();
        Ok(())
    }

    fn pos(&self) -> u64 {
        self.pos as u64
    }
}

/// Source over a blocking reader. Tolerates short reads; never suspends.
struct ReadSource<R> {
    reader: R,
    pos: u64,
}

impl<R: io::Read + Send> Source for ReadSource<R> {
    async fn read_exact(&mut self, out: &mut [u8]) -> Result<(), Error> {
        let mut filled = 0;
        while filled < out.len() {
            match self.reader.read(&mut out[filled..]) {
                Ok(0) => {
                    return Err(Error::InsufficientData {
                        offset: self.pos,
                        needed: out.len() - filled,
                    });
                }
                Ok(n) => {
                    filled += n;
                    self.pos += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(())
    }

    fn pos(&self) -> u64 {
        self.pos
    }
}

/// Polls a future that is known to complete without suspending.
///
/// The synchronous sources above never return `Poll::Pending`, so the
/// decoder future they feed resolves on the first poll.
fn drive<F: Future>(fut: F) -> F::Output {
    let mut fut = std::pin::pin!(fut);
    let mut cx = Context::from_waker(Waker::noop());
    match fut.as_mut().poll(&mut cx) {
        Poll::Ready(out) => out,
        Poll::Pending => unreachable!("synchronous source suspended"),
    }
}

/// Decodes one document from the front of `bytes`.
///
/// Trailing bytes are left unread and are not an error; the document is
/// self-delimiting.
pub fn decode_from_slice(bytes: &[u8], options: &UnpackOptions) -> Result<Value, Error> {
    let mut src = SliceSource { data: bytes, pos: 0 };
    drive(decode_document(&mut src, options))
}

/// Decodes one document from a blocking reader, consuming only the bytes
/// the document needs.
pub fn decode_from_reader<R: io::Read + Send>(
    reader: &mut R,
    options: &UnpackOptions,
) -> Result<Value, Error> {
    let mut src = ReadSource { reader, pos: 0 };
    drive(decode_document(&mut src, options))
}
