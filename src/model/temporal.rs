//! Partial-precision temporal values.
//!
//! FHIRPath date/time literals may omit trailing components (`@2023`,
//! `@2023-01`, `@2023-01-01T12:30`), and two values are only comparable when
//! their precisions line up — otherwise comparison yields empty rather than
//! `false`, per spec §4.3.

use std::cmp::Ordering;

use crate::error::{FhirPathError, Result};

/// How much of a date/time literal was actually specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precision {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

/// A parsed, partial-precision date or datetime.
///
/// Fields beyond `precision` are zero-filled but never compared directly —
/// comparisons go through [`PartialDateTime::compare`], which returns
/// `None` across mismatched precisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialDateTime {
    pub precision: Precision,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub millisecond: u32,
    /// Offset from UTC in minutes, if a timezone was specified.
    pub offset_minutes: Option<i32>,
}

impl PartialDateTime {
    /// Parse a `@`-literal's body (without the leading `@`), e.g.
    /// `"2023-01-15T12:30:00Z"`, `"2023"`, `"T12:30"`.
    pub fn parse(text: &str) -> Result<Self> {
        let bad = || FhirPathError::type_error(format!("invalid date/time literal '{text}'"));

        let (date_part, time_part) = match text.split_once('T') {
            Some((d, t)) => (d, Some(t)),
            None => (text, None),
        };

        let mut result = PartialDateTime {
            precision: Precision::Year,
            year: 0,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
            millisecond: 0,
            offset_minutes: None,
        };

        if !date_part.is_empty() {
            let mut parts = date_part.split('-');
            result.year = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
            result.precision = Precision::Year;
            if let Some(m) = parts.next() {
                result.month = m.parse().map_err(|_| bad())?;
                result.precision = Precision::Month;
            }
            if let Some(d) = parts.next() {
                result.day = d.parse().map_err(|_| bad())?;
                result.precision = Precision::Day;
            }
        }

        if let Some(time) = time_part {
            let (time, offset) = split_timezone(time);
            result.offset_minutes = offset;
            let mut parts = time.split(':');
            if let Some(h) = parts.next().filter(|s| !s.is_empty()) {
                result.hour = h.parse().map_err(|_| bad())?;
                result.precision = Precision::Hour;
            }
            if let Some(m) = parts.next() {
                result.minute = m.parse().map_err(|_| bad())?;
                result.precision = Precision::Minute;
            }
            if let Some(s) = parts.next() {
                let (sec, ms) = match s.split_once('.') {
                    Some((sec, frac)) => {
                        let ms: u32 = format!("{frac:0<3}")[..3].parse().map_err(|_| bad())?;
                        (sec, ms)
                    }
                    None => (s, 0),
                };
                result.second = sec.parse().map_err(|_| bad())?;
                result.millisecond = ms;
                result.precision = if ms > 0 || s.contains('.') {
                    Precision::Millisecond
                } else {
                    Precision::Second
                };
            }
        }

        Ok(result)
    }

    /// Compare two values; `None` when precisions differ (spec: "mixed
    /// precision yields empty").
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        if self.precision != other.precision {
            return None;
        }
        Some(
            (
                self.year,
                self.month,
                self.day,
                self.hour,
                self.minute,
                self.second,
                self.millisecond,
                self.offset_minutes.unwrap_or(0),
            )
                .cmp(&(
                    other.year,
                    other.month,
                    other.day,
                    other.hour,
                    other.minute,
                    other.second,
                    other.millisecond,
                    other.offset_minutes.unwrap_or(0),
                )),
        )
    }

    /// Structural equality, which (unlike `compare`) is only ever `true` or
    /// `false` for same-precision values and `false` across precisions
    /// (equality does not collapse to empty the way ordering does).
    pub fn equals(&self, other: &Self) -> bool {
        self.precision == other.precision && self.compare(other) == Some(Ordering::Equal)
    }
}

fn split_timezone(time: &str) -> (&str, Option<i32>) {
    if let Some(stripped) = time.strip_suffix('Z') {
        return (stripped, Some(0));
    }
    // Look for a +HH:MM or -HH:MM suffix after the first ':' to avoid
    // mistaking the time's own leading digits for a sign.
    if let Some(idx) = time.rfind(['+', '-']) {
        if idx > 0 {
            let (head, tz) = time.split_at(idx);
            if let Some(minutes) = parse_offset(tz) {
                return (head, Some(minutes));
            }
        }
    }
    (time, None)
}

fn parse_offset(tz: &str) -> Option<i32> {
    let sign = if tz.starts_with('-') { -1 } else { 1 };
    let rest = &tz[1..];
    let (h, m) = rest.split_once(':')?;
    let hours: i32 = h.parse().ok()?;
    let minutes: i32 = m.parse().ok()?;
    Some(sign * (hours * 60 + minutes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_only_precision() {
        let dt = PartialDateTime::parse("2023").unwrap();
        assert_eq!(dt.precision, Precision::Year);
        assert_eq!(dt.year, 2023);
    }

    #[test]
    fn full_datetime_with_offset() {
        let dt = PartialDateTime::parse("2023-01-15T12:30:00+02:00").unwrap();
        assert_eq!(dt.precision, Precision::Second);
        assert_eq!(dt.offset_minutes, Some(120));
    }

    #[test]
    fn mixed_precision_comparison_is_none() {
        let a = PartialDateTime::parse("2023").unwrap();
        let b = PartialDateTime::parse("2023-01").unwrap();
        assert_eq!(a.compare(&b), None);
    }

    #[test]
    fn same_precision_orders_correctly() {
        let a = PartialDateTime::parse("2023-01-01").unwrap();
        let b = PartialDateTime::parse("2023-06-01").unwrap();
        assert_eq!(a.compare(&b), Some(Ordering::Less));
    }

    #[test]
    fn time_only_literal() {
        let t = PartialDateTime::parse("T12:30:00").unwrap();
        assert_eq!(t.hour, 12);
        assert_eq!(t.minute, 30);
        assert_eq!(t.precision, Precision::Second);
    }
}
