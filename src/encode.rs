//! MessagePack encoding: `Value` → bytes.

use bytes::{BufMut, BytesMut};

use crate::error::Error;
use crate::marker;
use crate::options::{FloatPrecision, PackOptions};
use crate::value::{Int, IntRepr, Value};

/// Largest length the 32-bit wire families can carry.
const MAX_LEN: u64 = u32::MAX as u64;

/// Encodes a `Value` into the buffer as one MessagePack document.
///
/// Every integer and length field uses the narrowest family that holds it;
/// nonnegative integers never use a signed family.
pub fn pack_value(buf: &mut BytesMut, value: &Value, options: &PackOptions) -> Result<(), Error> {
    match value {
        Value::Nil => buf.put_u8(marker::NIL),
        Value::Bool(b) => buf.put_u8(if *b { marker::TRUE } else { marker::FALSE }),
        Value::Int(n) => pack_int(buf, *n),
        Value::Float(f) => pack_float(buf, *f, options),
        Value::Str(s) => pack_str(buf, s)?,
        Value::Bin(b) => pack_bin(buf, b)?,
        Value::Array(items) => pack_array(buf, items, options)?,
        Value::Map(entries) => pack_map(buf, entries, options)?,
        Value::Ext(code, data) => pack_ext(buf, *code, data)?,
    }
    Ok(())
}

/// Encodes an integer using the smallest possible representation.
fn pack_int(buf: &mut BytesMut, value: Int) {
    match value.repr() {
        IntRepr::Pos(n) => {
            if n < 128 {
                // positive fixint
                buf.put_u8(n as u8);
            } else if n <= u64::from(u8::MAX) {
                buf.put_u8(marker::UINT_8);
                buf.put_u8(n as u8);
            } else if n <= u64::from(u16::MAX) {
                buf.put_u8(marker::UINT_16);
                buf.put_u16(n as u16);
            } else if n <= u64::from(u32::MAX) {
                buf.put_u8(marker::UINT_32);
                buf.put_u32(n as u32);
            } else {
                buf.put_u8(marker::UINT_64);
                buf.put_u64(n);
            }
        }
        IntRepr::Neg(n) => {
            if n >= -32 {
                // negative fixint
                buf.put_i8(n as i8);
            } else if n >= i64::from(i8::MIN) {
                buf.put_u8(marker::INT_8);
                buf.put_i8(n as i8);
            } else if n >= i64::from(i16::MIN) {
                buf.put_u8(marker::INT_16);
                buf.put_i16(n as i16);
            } else if n >= i64::from(i32::MIN) {
                buf.put_u8(marker::INT_32);
                buf.put_i32(n as i32);
            } else {
                buf.put_u8(marker::INT_64);
                buf.put_i64(n);
            }
        }
    }
}

fn pack_float(buf: &mut BytesMut, value: f64, options: &PackOptions) {
    // Auto resolves to the host float width, which is binary64 here.
    match options.force_float_precision {
        FloatPrecision::Single => {
            buf.put_u8(marker::FLOAT_32);
            buf.put_f32(value as f32);
        }
        FloatPrecision::Auto | FloatPrecision::Double => {
            buf.put_u8(marker::FLOAT_64);
            buf.put_f64(value);
        }
    }
}

/// Encodes a string (size = byte length, not char count).
fn pack_str(buf: &mut BytesMut, value: &str) -> Result<(), Error> {
    let len = value.len();
    if len < 32 {
        buf.put_u8(marker::FIXSTR_BITS | len as u8);
    } else if len <= usize::from(u8::MAX) {
        buf.put_u8(marker::STR_8);
        buf.put_u8(len as u8);
    } else if len <= usize::from(u16::MAX) {
        buf.put_u8(marker::STR_16);
        buf.put_u16(len as u16);
    } else if len as u64 <= MAX_LEN {
        buf.put_u8(marker::STR_32);
        buf.put_u32(len as u32);
    } else {
        return Err(Error::UnsupportedType(format!("string of {len} bytes")));
    }
    buf.put_slice(value.as_bytes());
    Ok(())
}

fn pack_bin(buf: &mut BytesMut, value: &[u8]) -> Result<(), Error> {
    let len = value.len();
    if len <= usize::from(u8::MAX) {
        buf.put_u8(marker::BIN_8);
        buf.put_u8(len as u8);
    } else if len <= usize::from(u16::MAX) {
        buf.put_u8(marker::BIN_16);
        buf.put_u16(len as u16);
    } else if len as u64 <= MAX_LEN {
        buf.put_u8(marker::BIN_32);
        buf.put_u32(len as u32);
    } else {
        return Err(Error::UnsupportedType(format!("binary of {len} bytes")));
    }
    buf.put_slice(value);
    Ok(())
}

fn pack_array(buf: &mut BytesMut, items: &[Value], options: &PackOptions) -> Result<(), Error> {
    let len = items.len();
    if len < 16 {
        buf.put_u8(marker::FIXARRAY_NIBBLE | len as u8);
    } else if len <= usize::from(u16::MAX) {
        buf.put_u8(marker::ARRAY_16);
        buf.put_u16(len as u16);
    } else if len as u64 <= MAX_LEN {
        buf.put_u8(marker::ARRAY_32);
        buf.put_u32(len as u32);
    } else {
        return Err(Error::UnsupportedType(format!("array of {len} items")));
    }
    for item in items {
        pack_value(buf, item, options)?;
    }
    Ok(())
}

/// Encodes a map in the entry vector's order. Duplicate keys are not
/// checked on pack.
fn pack_map(
    buf: &mut BytesMut,
    entries: &[(Value, Value)],
    options: &PackOptions,
) -> Result<(), Error> {
    let len = entries.len();
    if len < 16 {
        buf.put_u8(marker::FIXMAP_NIBBLE | len as u8);
    } else if len <= usize::from(u16::MAX) {
        buf.put_u8(marker::MAP_16);
        buf.put_u16(len as u16);
    } else if len as u64 <= MAX_LEN {
        buf.put_u8(marker::MAP_32);
        buf.put_u32(len as u32);
    } else {
        return Err(Error::UnsupportedType(format!("map of {len} entries")));
    }
    for (key, value) in entries {
        pack_value(buf, key, options)?;
        pack_value(buf, value, options)?;
    }
    Ok(())
}

/// Encodes an ext header and payload: fixext for the five fixed sizes,
/// explicit-length families otherwise.
fn pack_ext(buf: &mut BytesMut, code: i8, data: &[u8]) -> Result<(), Error> {
    match data.len() {
        1 => buf.put_u8(marker::FIXEXT_1),
        2 => buf.put_u8(marker::FIXEXT_2),
        4 => buf.put_u8(marker::FIXEXT_4),
        8 => buf.put_u8(marker::FIXEXT_8),
        16 => buf.put_u8(marker::FIXEXT_16),
        len if len <= usize::from(u8::MAX) => {
            buf.put_u8(marker::EXT_8);
            buf.put_u8(len as u8);
        }
        len if len <= usize::from(u16::MAX) => {
            buf.put_u8(marker::EXT_16);
            buf.put_u16(len as u16);
        }
        len if len as u64 <= MAX_LEN => {
            buf.put_u8(marker::EXT_32);
            buf.put_u32(len as u32);
        }
        len => {
            return Err(Error::UnsupportedType(format!("ext payload of {len} bytes")));
        }
    }
    buf.put_i8(code);
    buf.put_slice(data);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(value: &Value) -> BytesMut {
        let mut buf = BytesMut::new();
        pack_value(&mut buf, value, &PackOptions::default()).expect("pack failed");
        buf
    }

    #[test]
    fn pack_nil_marker() {
        assert_eq!(&packed(&Value::Nil)[..], &[0xC0]);
    }

    #[test]
    fn pack_booleans() {
        assert_eq!(&packed(&Value::Bool(true))[..], &[0xC3]);
        assert_eq!(&packed(&Value::Bool(false))[..], &[0xC2]);
    }

    #[test]
    fn pack_positive_fixint() {
        assert_eq!(&packed(&Value::from(0u64))[..], &[0x00]);
        assert_eq!(&packed(&Value::from(0x10u64))[..], &[0x10]);
        assert_eq!(&packed(&Value::from(127u64))[..], &[0x7F]);
    }

    #[test]
    fn pack_negative_fixint() {
        assert_eq!(&packed(&Value::from(-1i64))[..], &[0xFF]);
        assert_eq!(&packed(&Value::from(-32i64))[..], &[0xE0]);
    }

    #[test]
    fn pack_uint_widths() {
        assert_eq!(&packed(&Value::from(128u64))[..], &[0xCC, 0x80]);
        assert_eq!(&packed(&Value::from(255u64))[..], &[0xCC, 0xFF]);
        assert_eq!(&packed(&Value::from(256u64))[..], &[0xCD, 0x01, 0x00]);
        assert_eq!(&packed(&Value::from(65535u64))[..], &[0xCD, 0xFF, 0xFF]);
        assert_eq!(
            &packed(&Value::from(65536u64))[..],
            &[0xCE, 0x00, 0x01, 0x00, 0x00]
        );
        assert_eq!(
            &packed(&Value::from(u64::from(u32::MAX)))[..],
            &[0xCE, 0xFF, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(
            &packed(&Value::from(u64::from(u32::MAX) + 1))[..],
            &[0xCF, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            &packed(&Value::from(u64::MAX))[..],
            &[0xCF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn pack_int_widths() {
        assert_eq!(&packed(&Value::from(-33i64))[..], &[0xD0, 0xDF]);
        assert_eq!(&packed(&Value::from(-128i64))[..], &[0xD0, 0x80]);
        assert_eq!(&packed(&Value::from(-129i64))[..], &[0xD1, 0xFF, 0x7F]);
        assert_eq!(&packed(&Value::from(-32768i64))[..], &[0xD1, 0x80, 0x00]);
        assert_eq!(
            &packed(&Value::from(-32769i64))[..],
            &[0xD2, 0xFF, 0xFF, 0x7F, 0xFF]
        );
        assert_eq!(
            &packed(&Value::from(i64::from(i32::MIN)))[..],
            &[0xD2, 0x80, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            &packed(&Value::from(i64::from(i32::MIN) - 1))[..],
            &[0xD3, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(
            &packed(&Value::from(i64::MIN))[..],
            &[0xD3, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn nonnegative_never_uses_signed_families() {
        for n in [0u64, 127, 128, 65535, 65536, u64::MAX] {
            let out = packed(&Value::from(n));
            assert!(
                !(marker::INT_8..=marker::INT_64).contains(&out[0]),
                "value {n} used signed family 0x{:02X}",
                out[0]
            );
        }
    }

    #[test]
    fn pack_float_precision() {
        let mut buf = BytesMut::new();
        let opts = PackOptions {
            force_float_precision: FloatPrecision::Single,
        };
        pack_value(&mut buf, &Value::Float(2.5), &opts).unwrap();
        assert_eq!(&buf[..], &[0xCA, 0x40, 0x20, 0x00, 0x00]);

        buf.clear();
        let opts = PackOptions {
            force_float_precision: FloatPrecision::Double,
        };
        pack_value(&mut buf, &Value::Float(2.5), &opts).unwrap();
        assert_eq!(&buf[..], &[0xCB, 0x40, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

        // Auto resolves to double on this host.
        assert_eq!(&packed(&Value::Float(2.5))[..], &buf[..]);
    }

    #[test]
    fn pack_str_widths() {
        assert_eq!(&packed(&Value::from(""))[..], &[0xA0]);
        assert_eq!(&packed(&Value::from("a"))[..], &[0xA1, 0x61]);
        let s = "a".repeat(31);
        let out = packed(&Value::from(s.as_str()));
        assert_eq!(out[0], 0xBF);

        let s = "b".repeat(32);
        let out = packed(&Value::from(s.as_str()));
        assert_eq!(&out[..2], &[marker::STR_8, 32]);

        let s = "c".repeat(256);
        let out = packed(&Value::from(s.as_str()));
        assert_eq!(&out[..3], &[marker::STR_16, 0x01, 0x00]);

        let s = "d".repeat(65536);
        let out = packed(&Value::from(s.as_str()));
        assert_eq!(&out[..5], &[marker::STR_32, 0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn pack_bin_widths() {
        let out = packed(&Value::Bin(vec![0x80; 2]));
        assert_eq!(&out[..], &[marker::BIN_8, 0x02, 0x80, 0x80]);

        let out = packed(&Value::Bin(vec![0x80; 256]));
        assert_eq!(&out[..3], &[marker::BIN_16, 0x01, 0x00]);

        let out = packed(&Value::Bin(vec![0x80; 65536]));
        assert_eq!(&out[..5], &[marker::BIN_32, 0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn pack_fix_array() {
        let items = vec![Value::from(1u64), Value::from(2u64), Value::from(3u64)];
        assert_eq!(&packed(&Value::Array(items))[..], &[0x93, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn pack_array_widths() {
        let out = packed(&Value::Array(vec![Value::from(5u64); 16]));
        assert_eq!(&out[..3], &[marker::ARRAY_16, 0x00, 0x10]);

        let out = packed(&Value::Array(vec![Value::from(5u64); 65536]));
        assert_eq!(&out[..5], &[marker::ARRAY_32, 0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn pack_fix_map() {
        let entries = vec![(Value::from("foo"), Value::from(1u64))];
        assert_eq!(
            &packed(&Value::Map(entries))[..],
            &[0x81, 0xA3, 0x66, 0x6F, 0x6F, 0x01]
        );
    }

    #[test]
    fn pack_map_widths() {
        let entries: Vec<_> = (0u64..16).map(|k| (Value::from(k), Value::Nil)).collect();
        let out = packed(&Value::Map(entries));
        assert_eq!(&out[..3], &[marker::MAP_16, 0x00, 0x10]);
    }

    #[test]
    fn pack_fixext_sizes() {
        for (len, m) in [
            (1, marker::FIXEXT_1),
            (2, marker::FIXEXT_2),
            (4, marker::FIXEXT_4),
            (8, marker::FIXEXT_8),
            (16, marker::FIXEXT_16),
        ] {
            let out = packed(&Value::Ext(0x42, vec![0xAB; len]));
            assert_eq!(out[0], m, "payload of {len} bytes");
            assert_eq!(out[1], 0x42);
            assert_eq!(out.len(), 2 + len);
        }
    }

    #[test]
    fn pack_ext_explicit_lengths() {
        let out = packed(&Value::Ext(0x05, vec![0x01, 0x02, 0x03]));
        assert_eq!(&out[..], &[marker::EXT_8, 0x03, 0x05, 0x01, 0x02, 0x03]);

        let out = packed(&Value::Ext(0x05, vec![]));
        assert_eq!(&out[..], &[marker::EXT_8, 0x00, 0x05]);

        let out = packed(&Value::Ext(0x05, vec![0xAA; 256]));
        assert_eq!(&out[..4], &[marker::EXT_16, 0x01, 0x00, 0x05]);

        let out = packed(&Value::Ext(0x05, vec![0xAA; 65536]));
        assert_eq!(&out[..6], &[marker::EXT_32, 0x00, 0x01, 0x00, 0x00, 0x05]);
    }

    #[test]
    fn pack_is_deterministic() {
        let value = Value::Map(vec![
            (Value::from("a"), Value::Float(1.5)),
            (Value::from("b"), Value::Array(vec![Value::Nil])),
        ]);
        assert_eq!(packed(&value), packed(&value));
    }
}
