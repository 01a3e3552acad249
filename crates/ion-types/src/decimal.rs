use ion_wire::varint::{
    MAX_INT_BYTES, MAX_VAR_INT_BYTES, decode_int, decode_var_int, encode_int, encode_var_int,
};
use ion_wire::{SignedMagnitude, WireError};

use crate::error::TypeError;

/// A decimal value `coefficient × 10^exponent`.
///
/// Precision is bounded to a 64-bit coefficient. `negative_zero` keeps
/// the sign of a zero coefficient (`-0d0` is a distinct value from `0d0`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Decimal {
    pub coefficient: i64,
    pub exponent: i32,
    pub negative_zero: bool,
}

impl Decimal {
    #[must_use]
    pub fn new(coefficient: i64, exponent: i32) -> Self {
        Self {
            coefficient,
            exponent,
            negative_zero: false,
        }
    }

    #[must_use]
    pub fn negative_zero(exponent: i32) -> Self {
        Self {
            coefficient: 0,
            exponent,
            negative_zero: true,
        }
    }

    /// Decode a decimal body: a VarInt exponent followed by an Int
    /// coefficient that fills the rest of the body. An empty body is `0d0`.
    ///
    /// # Errors
    ///
    /// - [`TypeError::Wire`] if the exponent is truncated.
    /// - [`TypeError::DecimalOverflow`] if either part exceeds its width.
    pub fn decode(body: &[u8]) -> Result<Self, TypeError> {
        if body.is_empty() {
            return Ok(Self::default());
        }
        let (exponent, used) = decode_var_int(body)?;
        let coefficient = decode_int(&body[used..]).map_err(|e| match e {
            WireError::IntTooLong { .. } => TypeError::DecimalOverflow,
            other => TypeError::Wire(other),
        })?;
        Self::from_parts(coefficient, exponent)
    }

    /// Build from raw wire parts.
    ///
    /// # Errors
    ///
    /// [`TypeError::DecimalOverflow`] if a part does not fit.
    pub fn from_parts(
        coefficient: SignedMagnitude,
        exponent: SignedMagnitude,
    ) -> Result<Self, TypeError> {
        let exponent = exponent
            .to_i64()
            .and_then(|e| i32::try_from(e).ok())
            .ok_or(TypeError::DecimalOverflow)?;
        let value = coefficient.to_i64().ok_or(TypeError::DecimalOverflow)?;
        Ok(Self {
            coefficient: value,
            exponent,
            negative_zero: coefficient.is_negative_zero(),
        })
    }

    /// Append the decimal body (without a type descriptor) to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        if self.coefficient == 0 && self.exponent == 0 && !self.negative_zero {
            return;
        }
        let mut buf = [0u8; MAX_VAR_INT_BYTES];
        let n = encode_var_int(SignedMagnitude::from_i64(i64::from(self.exponent)), &mut buf);
        out.extend_from_slice(&buf[..n]);

        let coefficient = if self.negative_zero {
            SignedMagnitude::new(0, true)
        } else {
            SignedMagnitude::from_i64(self.coefficient)
        };
        let mut buf = [0u8; MAX_INT_BYTES];
        let n = encode_int(coefficient, &mut buf);
        out.extend_from_slice(&buf[..n]);
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.coefficient == 0
    }

    /// Nearest `f64`. Lossy by nature.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(&self) -> f64 {
        let magnitude = self.coefficient as f64 * 10f64.powi(self.exponent);
        if self.negative_zero { -0.0 } else { magnitude }
    }
}

impl std::fmt::Display for Decimal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.negative_zero { "-" } else { "" };
        write!(f, "{sign}{}d{}", self.coefficient, self.exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(decimal: Decimal) -> Vec<u8> {
        let mut out = Vec::new();
        decimal.encode(&mut out);
        out
    }

    #[test]
    fn empty_body_is_zero() {
        assert_eq!(Decimal::decode(&[]).unwrap(), Decimal::new(0, 0));
        assert!(encoded(Decimal::new(0, 0)).is_empty());
    }

    #[test]
    fn one_point_five() {
        // 15 × 10^-1: exponent VarInt 0xC1, coefficient Int 0x0F.
        let decimal = Decimal::decode(&[0xC1, 0x0F]).unwrap();
        assert_eq!(decimal, Decimal::new(15, -1));
        assert_eq!(encoded(decimal), vec![0xC1, 0x0F]);
        assert_eq!(decimal.to_string(), "15d-1");
    }

    #[test]
    fn negative_zero_survives() {
        let decimal = Decimal::decode(&[0x80, 0x80]).unwrap();
        assert!(decimal.negative_zero);
        assert!(decimal.is_zero());
        assert_eq!(encoded(decimal), vec![0x80, 0x80]);
        assert_eq!(decimal.to_string(), "-0d0");
    }

    #[test]
    fn zero_coefficient_with_exponent() {
        // 0d3 has an exponent but no coefficient bytes.
        assert_eq!(Decimal::decode(&[0x83]).unwrap(), Decimal::new(0, 3));
        assert_eq!(encoded(Decimal::new(0, 3)), vec![0x83]);
    }

    #[test]
    fn oversized_coefficient() {
        let mut body = vec![0x80];
        body.extend_from_slice(&[0x7F; 10]);
        assert!(matches!(
            Decimal::decode(&body).unwrap_err(),
            TypeError::DecimalOverflow
        ));
    }
}
