//! Byte-level value encoding.
//!
//! Every function appends one complete encoding (descriptor, length and
//! body) to `out`. [`BinaryWriter`](crate::BinaryWriter) builds on these;
//! tests that need byte sequences the writer refuses to produce (oversized
//! integers, malformed wrappers) can call them directly.
//!
//! ```text
//! ┌──────────────────┬─────────────────────┬────────────────┐
//! │ descriptor (1)   │ length (VarUInt)    │ body           │
//! │ code<<4 | L      │ only when L == 0xE  │ length bytes   │
//! └──────────────────┴─────────────────────┴────────────────┘
//! ```

use ion_types::system_symbols::ION_SYMBOL_TABLE;
use ion_types::{Decimal, Timestamp};
use ion_wire::type_descriptor::{LENGTH_NULL, LENGTH_VAR_UINT};
use ion_wire::varint::{MAX_VAR_INT_BYTES, encode_uint, encode_var_uint, var_uint_len};
use ion_wire::{SignedMagnitude, TypeCode};

/// Largest length that fits in the low nibble.
const MAX_LITERAL_LENGTH: usize = 13;

/// Append a VarUInt.
pub fn write_var_uint(out: &mut Vec<u8>, value: u64) {
    let mut buf = [0u8; MAX_VAR_INT_BYTES];
    let n = encode_var_uint(value, &mut buf);
    out.extend_from_slice(&buf[..n]);
}

/// Append a descriptor and length for a body of `len` bytes.
///
/// A struct body of exactly one byte takes the VarUInt form, because low
/// nibble 1 marks an ordered struct.
pub fn write_header(out: &mut Vec<u8>, code: TypeCode, len: usize) {
    let high = code.nibble() << 4;
    let literal = len <= MAX_LITERAL_LENGTH && !(code == TypeCode::Struct && len == 1);
    if literal {
        #[allow(clippy::cast_possible_truncation)]
        out.push(high | len as u8);
    } else {
        out.push(high | LENGTH_VAR_UINT);
        write_var_uint(out, len as u64);
    }
}

/// Append a value whose body is already encoded.
pub fn write_value(out: &mut Vec<u8>, code: TypeCode, body: &[u8]) {
    write_header(out, code, body.len());
    out.extend_from_slice(body);
}

/// Append a typed null (`0x0F` for `null.null`).
pub fn write_null(out: &mut Vec<u8>, code: TypeCode) {
    out.push(code.nibble() << 4 | LENGTH_NULL);
}

pub fn write_bool(out: &mut Vec<u8>, value: bool) {
    out.push(TypeCode::Bool.nibble() << 4 | u8::from(value));
}

/// Append an integer. Negative zero is written as type code 3 with a
/// single zero magnitude byte, which readers reject.
pub fn write_int(out: &mut Vec<u8>, value: SignedMagnitude) {
    let code = if value.negative {
        TypeCode::NegativeInt
    } else {
        TypeCode::PositiveInt
    };
    let bytes = value.magnitude.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    let mut body: &[u8] = &bytes[skip..];
    if value.is_negative_zero() {
        body = &[0];
    }
    write_value(out, code, body);
}

/// Append a 64-bit float. Positive zero uses the zero-length form.
pub fn write_float64(out: &mut Vec<u8>, value: f64) {
    if value == 0.0 && value.is_sign_positive() {
        write_header(out, TypeCode::Float, 0);
    } else {
        write_value(out, TypeCode::Float, &value.to_be_bytes());
    }
}

pub fn write_float32(out: &mut Vec<u8>, value: f32) {
    if value == 0.0 && value.is_sign_positive() {
        write_header(out, TypeCode::Float, 0);
    } else {
        write_value(out, TypeCode::Float, &value.to_be_bytes());
    }
}

pub fn write_decimal(out: &mut Vec<u8>, value: &Decimal) {
    let mut body = Vec::new();
    value.encode(&mut body);
    write_value(out, TypeCode::Decimal, &body);
}

pub fn write_timestamp(out: &mut Vec<u8>, value: &Timestamp) {
    let mut body = Vec::new();
    value.encode(&mut body);
    write_value(out, TypeCode::Timestamp, &body);
}

/// Append a symbol by SID. SID 0 has an empty body.
pub fn write_symbol_id(out: &mut Vec<u8>, sid: usize) {
    let mut buf = [0u8; 8];
    let n = encode_uint(sid as u64, &mut buf);
    write_value(out, TypeCode::Symbol, &buf[..n]);
}

/// Append an ordered struct (`0xD1` followed by a VarUInt length).
pub fn write_ordered_struct(out: &mut Vec<u8>, body: &[u8]) {
    out.push(TypeCode::Struct.nibble() << 4 | 1);
    write_var_uint(out, body.len() as u64);
    out.extend_from_slice(body);
}

/// Wrap an encoded value in an annotation wrapper.
///
/// ```text
/// 0xE? | wrapper length | annot_length (VarUInt) | SIDs (VarUInt…) | value
/// ```
pub fn write_annotated(out: &mut Vec<u8>, annotations: &[usize], value: &[u8]) {
    let mut sids = Vec::new();
    for &sid in annotations {
        write_var_uint(&mut sids, sid as u64);
    }
    let mut body = Vec::with_capacity(sids.len() + value.len() + 2);
    write_var_uint(&mut body, sids.len() as u64);
    body.extend_from_slice(&sids);
    body.extend_from_slice(value);
    write_value(out, TypeCode::Annotation, &body);
}

/// Append NOP padding occupying exactly `total` bytes.
///
/// Some totals cannot be a single pad (the VarUInt length would change
/// the size it describes); those get a one-byte pad in front.
pub fn write_nop_pad(out: &mut Vec<u8>, total: usize) {
    if total == 0 {
        return;
    }
    if total <= MAX_LITERAL_LENGTH + 1 {
        #[allow(clippy::cast_possible_truncation)]
        out.push((total - 1) as u8);
        out.resize(out.len() + total - 1, 0);
        return;
    }
    for prefix in 1..=MAX_VAR_INT_BYTES {
        let Some(body) = total.checked_sub(1 + prefix) else {
            break;
        };
        if var_uint_len(body as u64) == prefix {
            out.push(LENGTH_VAR_UINT);
            write_var_uint(out, body as u64);
            out.resize(out.len() + body, 0);
            return;
        }
    }
    out.push(0x00);
    write_nop_pad(out, total - 1);
}

/// Append the annotation wrapper prefix that marks a local symbol table,
/// around an already-encoded struct.
pub fn write_symbol_table_struct(out: &mut Vec<u8>, encoded_struct: &[u8]) {
    write_annotated(out, &[ION_SYMBOL_TABLE], encoded_struct);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(f: impl FnOnce(&mut Vec<u8>)) -> Vec<u8> {
        let mut out = Vec::new();
        f(&mut out);
        out
    }

    #[test]
    fn short_and_long_headers() {
        assert_eq!(bytes(|o| write_value(o, TypeCode::String, b"a")), [0x81, b'a']);
        let long = bytes(|o| write_value(o, TypeCode::String, &[b'x'; 14]));
        assert_eq!(&long[..2], &[0x8E, 0x8E]);
        assert_eq!(long.len(), 16);
    }

    #[test]
    fn one_byte_struct_avoids_ordered_form() {
        assert_eq!(bytes(|o| write_value(o, TypeCode::Struct, &[0x80])), [0xDE, 0x81, 0x80]);
        assert_eq!(bytes(|o| write_ordered_struct(o, &[0x84, 0x20])), [0xD1, 0x82, 0x84, 0x20]);
    }

    #[test]
    fn ints() {
        assert_eq!(bytes(|o| write_int(o, SignedMagnitude::from_i64(0))), [0x20]);
        assert_eq!(bytes(|o| write_int(o, SignedMagnitude::from_i64(-1))), [0x31, 0x01]);
        assert_eq!(
            bytes(|o| write_int(o, SignedMagnitude::from_i64(256))),
            [0x22, 0x01, 0x00]
        );
        assert_eq!(bytes(|o| write_int(o, SignedMagnitude::new(0, true))), [0x31, 0x00]);
    }

    #[test]
    fn floats() {
        assert_eq!(bytes(|o| write_float64(o, 0.0)), [0x40]);
        assert_eq!(bytes(|o| write_float64(o, -0.0)).len(), 9);
        assert_eq!(bytes(|o| write_float32(o, 1.5))[0], 0x44);
    }

    #[test]
    fn annotation_wrapper() {
        let mut value = Vec::new();
        write_symbol_id(&mut value, 10);
        let out = bytes(|o| write_annotated(o, &[4, 5], &value));
        assert_eq!(out, [0xE5, 0x82, 0x84, 0x85, 0x71, 0x0A]);
    }

    #[test]
    fn nop_pads_hit_exact_sizes() {
        for total in [1, 2, 14, 15, 129, 130, 131, 16_400] {
            let out = bytes(|o| write_nop_pad(o, total));
            assert_eq!(out.len(), total, "total {total}");
            assert!(out[0] >> 4 == 0);
        }
    }

    #[test]
    fn nulls_and_bools() {
        assert_eq!(bytes(|o| write_null(o, TypeCode::NullOrPad)), [0x0F]);
        assert_eq!(bytes(|o| write_null(o, TypeCode::String)), [0x8F]);
        assert_eq!(bytes(|o| write_bool(o, true)), [0x11]);
    }
}
