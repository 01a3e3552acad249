use crate::error::WireError;

/// Maximum number of bytes a VarUInt or VarInt may occupy.
/// ceil(64 / 7) = 10 bytes.
pub const MAX_VAR_INT_BYTES: usize = 10;

/// Maximum number of bytes written by [`encode_int`]: eight magnitude
/// bytes plus one byte to hold the sign bit.
pub const MAX_INT_BYTES: usize = 9;

/// Terminal-byte flag shared by VarUInt and VarInt.
const END_FLAG: u8 = 0x80;

/// Sign bit in the first byte of a VarInt.
const VAR_INT_SIGN: u8 = 0x40;

/// Sign bit in the first byte of a fixed-width Int.
const INT_SIGN: u8 = 0x80;

/// A sign plus a 64-bit magnitude.
///
/// Both signed encodings (VarInt and Int) can express negative zero,
/// which carries meaning in some positions (an unknown timestamp offset,
/// the sign of a decimal zero), so the sign is kept apart from the
/// magnitude instead of collapsing into an `i64` straight away.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SignedMagnitude {
    pub magnitude: u64,
    pub negative: bool,
}

impl SignedMagnitude {
    #[must_use]
    pub fn new(magnitude: u64, negative: bool) -> Self {
        Self {
            magnitude,
            negative,
        }
    }

    #[must_use]
    pub fn from_i64(value: i64) -> Self {
        Self {
            magnitude: value.unsigned_abs(),
            negative: value < 0,
        }
    }

    #[must_use]
    pub fn is_negative_zero(self) -> bool {
        self.negative && self.magnitude == 0
    }

    /// Convert to `i64`, or `None` when the magnitude does not fit.
    /// Negative zero converts to `0`.
    #[must_use]
    pub fn to_i64(self) -> Option<i64> {
        if self.negative {
            if self.magnitude == 1u64 << 63 {
                Some(i64::MIN)
            } else {
                i64::try_from(self.magnitude).ok().map(|m| -m)
            }
        } else {
            i64::try_from(self.magnitude).ok()
        }
    }
}

/// Number of bytes needed to encode `value` as a VarUInt (1–10).
#[must_use]
pub fn var_uint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Encode a `u64` as a VarUInt into the provided buffer.
///
/// Seven value bits per byte, most significant group first. The final
/// byte carries the end flag (`0x80`).
///
/// # Returns
///
/// The number of bytes written (1–10).
///
/// # Panics
///
/// Panics if `buf` is shorter than [`var_uint_len`] of the value.
/// A [`MAX_VAR_INT_BYTES`] buffer is always sufficient.
///
/// # Wire format examples
///
/// | Value   | Encoded bytes        |
/// |---------|----------------------|
/// | 0       | `[0x80]`             |
/// | 3       | `[0x83]`             |
/// | 127     | `[0xFF]`             |
/// | 128     | `[0x01, 0x80]`       |
/// | 16383   | `[0x7F, 0xFF]`       |
/// | 16384   | `[0x01, 0x00, 0x80]` |
pub fn encode_var_uint(value: u64, buf: &mut [u8]) -> usize {
    let len = var_uint_len(value);
    for (i, slot) in buf[..len].iter_mut().enumerate() {
        let shift = 7 * (len - 1 - i);
        #[allow(clippy::cast_possible_truncation)]
        let group = ((value >> shift) & 0x7F) as u8;
        *slot = group;
    }
    buf[len - 1] |= END_FLAG;
    len
}

/// Decode a VarUInt from the start of `buf`.
///
/// # Returns
///
/// `(value, bytes_consumed)` on success.
///
/// # Errors
///
/// - [`WireError::VarIntTooLong`] if the encoding exceeds 10 bytes or
///   overflows 64 bits.
/// - [`WireError::UnexpectedEof`] if the slice ends before the end flag.
pub fn decode_var_uint(buf: &[u8]) -> Result<(u64, usize), WireError> {
    let mut result: u64 = 0;

    for (i, &byte) in buf.iter().enumerate() {
        if i >= MAX_VAR_INT_BYTES || result > (u64::MAX >> 7) {
            return Err(WireError::VarIntTooLong);
        }
        result = (result << 7) | u64::from(byte & 0x7F);

        if byte & END_FLAG != 0 {
            return Ok((result, i + 1));
        }
    }

    Err(WireError::UnexpectedEof { offset: buf.len() })
}

/// Number of bytes needed to encode a magnitude as a VarInt (1–10).
#[must_use]
pub fn var_int_len(magnitude: u64) -> usize {
    let bits = 64 - magnitude.leading_zeros() as usize;
    if bits <= 6 {
        1
    } else {
        1 + (bits - 6).div_ceil(7)
    }
}

/// Encode a signed magnitude as a VarInt.
///
/// The first byte holds the sign (`0x40`) and the six most significant
/// magnitude bits; following bytes hold seven bits each. Negative zero
/// encodes as `[0xC0]`.
///
/// # Panics
///
/// Panics if `buf` is shorter than [`var_int_len`] of the magnitude.
pub fn encode_var_int(value: SignedMagnitude, buf: &mut [u8]) -> usize {
    let len = var_int_len(value.magnitude);
    for (i, slot) in buf[..len].iter_mut().enumerate() {
        let shift = 7 * (len - 1 - i);
        #[allow(clippy::cast_possible_truncation)]
        let group = if i == 0 {
            ((value.magnitude >> shift) & 0x3F) as u8
        } else {
            ((value.magnitude >> shift) & 0x7F) as u8
        };
        *slot = group;
    }
    if value.negative {
        buf[0] |= VAR_INT_SIGN;
    }
    buf[len - 1] |= END_FLAG;
    len
}

/// Decode a VarInt from the start of `buf`.
///
/// # Errors
///
/// Same as [`decode_var_uint`].
pub fn decode_var_int(buf: &[u8]) -> Result<(SignedMagnitude, usize), WireError> {
    let Some(&first) = buf.first() else {
        return Err(WireError::UnexpectedEof { offset: 0 });
    };
    let negative = first & VAR_INT_SIGN != 0;
    let mut magnitude = u64::from(first & 0x3F);
    if first & END_FLAG != 0 {
        return Ok((SignedMagnitude::new(magnitude, negative), 1));
    }

    for (i, &byte) in buf.iter().enumerate().skip(1) {
        if i >= MAX_VAR_INT_BYTES || magnitude > (u64::MAX >> 7) {
            return Err(WireError::VarIntTooLong);
        }
        magnitude = (magnitude << 7) | u64::from(byte & 0x7F);

        if byte & END_FLAG != 0 {
            return Ok((SignedMagnitude::new(magnitude, negative), i + 1));
        }
    }

    Err(WireError::UnexpectedEof { offset: buf.len() })
}

/// Number of bytes in the minimal UInt encoding of `value`. Zero needs none.
#[must_use]
pub fn uint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(8)
}

/// Encode a big-endian UInt with no leading zero bytes.
///
/// # Panics
///
/// Panics if `buf` is shorter than [`uint_len`] of the value.
pub fn encode_uint(value: u64, buf: &mut [u8]) -> usize {
    let len = uint_len(value);
    let bytes = value.to_be_bytes();
    buf[..len].copy_from_slice(&bytes[8 - len..]);
    len
}

/// Decode a big-endian UInt occupying all of `buf`.
///
/// Leading zero bytes are permitted. An empty slice is zero.
///
/// # Errors
///
/// [`WireError::IntTooLong`] if the significant bytes exceed eight.
pub fn decode_uint(buf: &[u8]) -> Result<u64, WireError> {
    let significant = buf.iter().skip_while(|&&b| b == 0).count();
    if significant > 8 {
        return Err(WireError::IntTooLong { len: buf.len() });
    }
    Ok(buf[buf.len() - significant..]
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

/// Number of bytes in the minimal Int encoding of a signed magnitude.
///
/// Positive zero needs no bytes; negative zero needs one (`0x80`).
#[must_use]
pub fn int_len(value: SignedMagnitude) -> usize {
    if value.magnitude == 0 {
        return usize::from(value.negative);
    }
    let bits = 64 - value.magnitude.leading_zeros() as usize;
    // One bit of the first byte is reserved for the sign.
    (bits + 1).div_ceil(8)
}

/// Encode a big-endian sign-magnitude Int.
///
/// # Panics
///
/// Panics if `buf` is shorter than [`int_len`] of the value. A
/// [`MAX_INT_BYTES`] buffer is always sufficient.
pub fn encode_int(value: SignedMagnitude, buf: &mut [u8]) -> usize {
    let len = int_len(value);
    if len == 0 {
        return 0;
    }
    let bytes = value.magnitude.to_be_bytes();
    if len > 8 {
        buf[0] = 0;
        buf[1..len].copy_from_slice(&bytes);
    } else {
        buf[..len].copy_from_slice(&bytes[8 - len..]);
    }
    if value.negative {
        buf[0] |= INT_SIGN;
    }
    len
}

/// Decode a big-endian sign-magnitude Int occupying all of `buf`.
///
/// An empty slice is positive zero.
///
/// # Errors
///
/// [`WireError::IntTooLong`] if the magnitude does not fit in 64 bits.
pub fn decode_int(buf: &[u8]) -> Result<SignedMagnitude, WireError> {
    let Some((&first, rest)) = buf.split_first() else {
        return Ok(SignedMagnitude::default());
    };
    let negative = first & INT_SIGN != 0;
    let mut magnitude = u64::from(first & !INT_SIGN);
    for &byte in rest {
        if magnitude > (u64::MAX >> 8) {
            return Err(WireError::IntTooLong { len: buf.len() });
        }
        magnitude = (magnitude << 8) | u64::from(byte);
    }
    Ok(SignedMagnitude::new(magnitude, negative))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var_uint(value: u64) -> Vec<u8> {
        let mut buf = [0u8; MAX_VAR_INT_BYTES];
        let len = encode_var_uint(value, &mut buf);
        buf[..len].to_vec()
    }

    fn var_int(value: SignedMagnitude) -> Vec<u8> {
        let mut buf = [0u8; MAX_VAR_INT_BYTES];
        let len = encode_var_int(value, &mut buf);
        buf[..len].to_vec()
    }

    fn int(value: SignedMagnitude) -> Vec<u8> {
        let mut buf = [0u8; MAX_INT_BYTES];
        let len = encode_int(value, &mut buf);
        buf[..len].to_vec()
    }

    #[test]
    fn var_uint_single_byte() {
        assert_eq!(var_uint(0), vec![0x80]);
        assert_eq!(var_uint(3), vec![0x83]);
        assert_eq!(var_uint(127), vec![0xFF]);
    }

    #[test]
    fn var_uint_multi_byte() {
        assert_eq!(var_uint(128), vec![0x01, 0x80]);
        assert_eq!(var_uint(16383), vec![0x7F, 0xFF]);
        assert_eq!(var_uint(16384), vec![0x01, 0x00, 0x80]);
    }

    #[test]
    fn var_uint_max_is_ten_bytes() {
        let bytes = var_uint(u64::MAX);
        assert_eq!(bytes.len(), MAX_VAR_INT_BYTES);
        assert_eq!(decode_var_uint(&bytes).unwrap(), (u64::MAX, 10));
    }

    #[test]
    fn var_uint_decode_stops_at_end_flag() {
        // Trailing bytes belong to the next field.
        let (value, used) = decode_var_uint(&[0x01, 0x80, 0x21, 0x01]).unwrap();
        assert_eq!((value, used), (128, 2));
    }

    #[test]
    fn var_uint_truncated() {
        let err = decode_var_uint(&[0x01, 0x00]).unwrap_err();
        assert!(matches!(err, WireError::UnexpectedEof { offset: 2 }));
        assert!(matches!(
            decode_var_uint(&[]).unwrap_err(),
            WireError::UnexpectedEof { offset: 0 }
        ));
    }

    #[test]
    fn var_uint_overflow() {
        let mut bytes = vec![0x7F; 10];
        bytes.push(0xFF);
        assert!(matches!(
            decode_var_uint(&bytes).unwrap_err(),
            WireError::VarIntTooLong
        ));
    }

    #[test]
    fn var_int_sign_and_negative_zero() {
        assert_eq!(var_int(SignedMagnitude::from_i64(0)), vec![0x80]);
        assert_eq!(var_int(SignedMagnitude::from_i64(-1)), vec![0xC1]);
        assert_eq!(var_int(SignedMagnitude::from_i64(63)), vec![0xBF]);
        assert_eq!(var_int(SignedMagnitude::from_i64(64)), vec![0x00, 0xC0]);
        assert_eq!(var_int(SignedMagnitude::new(0, true)), vec![0xC0]);

        let (decoded, used) = decode_var_int(&[0xC0]).unwrap();
        assert!(decoded.is_negative_zero());
        assert_eq!(used, 1);
    }

    #[test]
    fn var_int_multi_byte_roundtrip() {
        for value in [-1_000_000i64, -8191, -64, 64, 8191, 1 << 40, i64::MAX, i64::MIN] {
            let bytes = var_int(SignedMagnitude::from_i64(value));
            let (decoded, used) = decode_var_int(&bytes).unwrap();
            assert_eq!(used, bytes.len());
            assert_eq!(decoded.to_i64(), Some(value), "value {value}");
        }
    }

    #[test]
    fn uint_minimal_encoding() {
        let mut buf = [0u8; 8];
        assert_eq!(encode_uint(0, &mut buf), 0);
        assert_eq!(encode_uint(0x1234, &mut buf), 2);
        assert_eq!(&buf[..2], &[0x12, 0x34]);
        assert_eq!(decode_uint(&[]).unwrap(), 0);
        assert_eq!(decode_uint(&[0x00, 0x00, 0x12, 0x34]).unwrap(), 0x1234);
    }

    #[test]
    fn uint_too_long() {
        assert!(matches!(
            decode_uint(&[1, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap_err(),
            WireError::IntTooLong { len: 9 }
        ));
        // Leading zeros do not count against the limit.
        assert_eq!(decode_uint(&[0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap(), u64::MAX);
    }

    #[test]
    fn int_sign_magnitude() {
        assert_eq!(int(SignedMagnitude::from_i64(0)), Vec::<u8>::new());
        assert_eq!(int(SignedMagnitude::new(0, true)), vec![0x80]);
        assert_eq!(int(SignedMagnitude::from_i64(127)), vec![0x7F]);
        // 128 needs a second byte so the sign bit stays clear.
        assert_eq!(int(SignedMagnitude::from_i64(128)), vec![0x00, 0x80]);
        assert_eq!(int(SignedMagnitude::from_i64(-128)), vec![0x80, 0x80]);
        assert_eq!(decode_int(&[0x80, 0x80]).unwrap().to_i64(), Some(-128));
        assert!(decode_int(&[0x80]).unwrap().is_negative_zero());
    }

    #[test]
    fn int_extreme_magnitudes() {
        let bytes = int(SignedMagnitude::new(u64::MAX, true));
        assert_eq!(bytes.len(), MAX_INT_BYTES);
        assert_eq!(decode_int(&bytes).unwrap(), SignedMagnitude::new(u64::MAX, true));
        assert_eq!(SignedMagnitude::new(1 << 63, true).to_i64(), Some(i64::MIN));
        assert_eq!(SignedMagnitude::new(1 << 63, false).to_i64(), None);
    }
}
