use ion_wire::varint::{
    MAX_VAR_INT_BYTES, decode_var_int, decode_var_uint, encode_var_int, encode_var_uint,
};
use ion_wire::SignedMagnitude;

use crate::decimal::Decimal;
use crate::error::TypeError;

/// How many fields a timestamp carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimestampPrecision {
    Year,
    Month,
    Day,
    Minute,
    Second,
    Fraction,
}

/// A timestamp as it appears on the wire.
///
/// Binary timestamps store their fields in UTC next to the local offset
/// they were written with; no conversion happens here. An offset of
/// `None` is the "unknown local offset" encoded as VarInt negative zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timestamp {
    pub precision: TimestampPrecision,
    pub offset_minutes: Option<i32>,
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub fraction: Option<Decimal>,
}

impl Timestamp {
    /// A year-precision timestamp with unknown offset.
    #[must_use]
    pub fn year(year: u16) -> Self {
        Self {
            precision: TimestampPrecision::Year,
            offset_minutes: None,
            year,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
            fraction: None,
        }
    }

    /// A day-precision timestamp with unknown offset.
    #[must_use]
    pub fn date(year: u16, month: u8, day: u8) -> Self {
        Self {
            precision: TimestampPrecision::Day,
            month,
            day,
            ..Self::year(year)
        }
    }

    /// A second-precision timestamp at the given offset.
    #[must_use]
    pub fn with_time(mut self, hour: u8, minute: u8, second: u8, offset_minutes: i32) -> Self {
        self.precision = TimestampPrecision::Second;
        self.hour = hour;
        self.minute = minute;
        self.second = second;
        self.offset_minutes = Some(offset_minutes);
        self
    }

    #[must_use]
    pub fn with_fraction(mut self, fraction: Decimal) -> Self {
        self.precision = TimestampPrecision::Fraction;
        self.fraction = Some(fraction);
        self
    }

    /// Decode a timestamp body.
    ///
    /// ```text
    /// offset  VarInt   (0xC0 = unknown)
    /// year    VarUInt
    /// month   VarUInt  optional
    /// day     VarUInt  optional
    /// hour    VarUInt  optional, only together with minute
    /// minute  VarUInt  optional
    /// second  VarUInt  optional
    /// fraction         optional: VarInt exponent + Int coefficient
    /// ```
    ///
    /// # Errors
    ///
    /// - [`TypeError::Wire`] for truncated fields.
    /// - [`TypeError::InvalidTimestamp`] for out-of-range fields or an
    ///   hour without a minute.
    pub fn decode(body: &[u8]) -> Result<Self, TypeError> {
        let (offset, mut pos) = decode_var_int(body)?;
        let offset_minutes = if offset.is_negative_zero() {
            None
        } else {
            let minutes = offset
                .to_i64()
                .and_then(|m| i32::try_from(m).ok())
                .ok_or(TypeError::InvalidTimestamp { reason: "offset out of range" })?;
            Some(minutes)
        };

        let mut fields = [0u64; 6];
        let mut count = 0;
        while pos < body.len() && count < fields.len() {
            let (value, used) = decode_var_uint(&body[pos..])?;
            fields[count] = value;
            count += 1;
            pos += used;
        }

        let precision = match count {
            0 => return Err(TypeError::InvalidTimestamp { reason: "missing year" }),
            1 => TimestampPrecision::Year,
            2 => TimestampPrecision::Month,
            3 => TimestampPrecision::Day,
            4 => return Err(TypeError::InvalidTimestamp { reason: "hour without minute" }),
            5 => TimestampPrecision::Minute,
            _ => TimestampPrecision::Second,
        };

        let fraction = if pos < body.len() {
            if precision != TimestampPrecision::Second {
                return Err(TypeError::InvalidTimestamp { reason: "fraction without seconds" });
            }
            Some(Decimal::decode(&body[pos..])?)
        } else {
            None
        };

        let narrow = |value: u64, reason: &'static str| {
            u8::try_from(value).map_err(|_| TypeError::InvalidTimestamp { reason })
        };
        let timestamp = Self {
            precision: if fraction.is_some() { TimestampPrecision::Fraction } else { precision },
            offset_minutes,
            year: u16::try_from(fields[0])
                .map_err(|_| TypeError::InvalidTimestamp { reason: "year out of range" })?,
            month: if count > 1 { narrow(fields[1], "month out of range")? } else { 1 },
            day: if count > 2 { narrow(fields[2], "day out of range")? } else { 1 },
            hour: narrow(fields[3], "hour out of range")?,
            minute: narrow(fields[4], "minute out of range")?,
            second: narrow(fields[5], "second out of range")?,
            fraction,
        };
        timestamp.validate()?;
        Ok(timestamp)
    }

    /// Check calendar ranges.
    ///
    /// # Errors
    ///
    /// [`TypeError::InvalidTimestamp`] naming the first bad field.
    pub fn validate(&self) -> Result<(), TypeError> {
        let fail = |reason| Err(TypeError::InvalidTimestamp { reason });
        if !(1..=9999).contains(&self.year) {
            return fail("year out of range");
        }
        if !(1..=12).contains(&self.month) {
            return fail("month out of range");
        }
        if self.day < 1 || self.day > days_in_month(self.year, self.month) {
            return fail("day out of range");
        }
        if self.hour > 23 {
            return fail("hour out of range");
        }
        if self.minute > 59 {
            return fail("minute out of range");
        }
        if self.second > 59 {
            return fail("second out of range");
        }
        if let Some(offset) = self.offset_minutes {
            if offset.abs() >= 24 * 60 {
                return fail("offset out of range");
            }
        }
        if let Some(fraction) = &self.fraction {
            let below_one = fraction.coefficient == 0
                || (fraction.exponent < 0
                    && fraction.coefficient > 0
                    && fraction.coefficient.unsigned_abs()
                        < 10u64.saturating_pow(fraction.exponent.unsigned_abs()));
            if !below_one {
                return fail("fraction outside [0, 1)");
            }
        }
        Ok(())
    }

    /// Append the timestamp body (without a type descriptor) to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        let mut buf = [0u8; MAX_VAR_INT_BYTES];
        let offset = match self.offset_minutes {
            Some(minutes) => SignedMagnitude::from_i64(i64::from(minutes)),
            None => SignedMagnitude::new(0, true),
        };
        let n = encode_var_int(offset, &mut buf);
        out.extend_from_slice(&buf[..n]);

        let mut fields = vec![u64::from(self.year)];
        if self.precision >= TimestampPrecision::Month {
            fields.push(u64::from(self.month));
        }
        if self.precision >= TimestampPrecision::Day {
            fields.push(u64::from(self.day));
        }
        if self.precision >= TimestampPrecision::Minute {
            fields.push(u64::from(self.hour));
            fields.push(u64::from(self.minute));
        }
        if self.precision >= TimestampPrecision::Second {
            fields.push(u64::from(self.second));
        }
        for field in fields {
            let n = encode_var_uint(field, &mut buf);
            out.extend_from_slice(&buf[..n]);
        }

        if let Some(fraction) = &self.fraction {
            let start = out.len();
            fraction.encode(out);
            // A zero fraction with zero exponent encodes to nothing; keep an
            // explicit exponent so the precision survives.
            if out.len() == start {
                out.push(0x80);
            }
        }
    }
}

fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 => 29,
        2 => 28,
        _ => 31,
    }
}
