//! UCUM-aware quantity values and the internal canonical unit table.
//!
//! This is a deterministic table, not a general UCUM expression evaluator:
//! it covers the unit codes a FHIRPath engine actually encounters (mass,
//! volume, length, time/calendar durations) and treats anything else as an
//! opaque code compared only by exact match, per the canonicalize-on-demand
//! design.

use std::fmt;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::error::{FhirPathError, Result};

/// Epsilon used when comparing canonicalized Decimal quantities, to absorb
/// rounding noise from scale-factor multiplication.
const EPSILON: &str = "0.00000001";

fn epsilon() -> Decimal {
    EPSILON.parse().expect("valid epsilon literal")
}

#[derive(Debug, Clone, Copy)]
struct UnitEntry {
    /// The canonical UCUM code this unit reduces to.
    canonical: &'static str,
    /// Multiply a value in this unit by this factor to get a value in the
    /// canonical unit.
    scale: f64,
}

/// `(code, canonical, scale)` rows for units this engine recognizes.
/// Grouped by dimension; codes within a dimension are mutually comparable.
const UNIT_TABLE: &[(&str, &str, f64)] = &[
    // mass, canonical = g
    ("g", "g", 1.0),
    ("kg", "g", 1000.0),
    ("mg", "g", 0.001),
    ("ug", "g", 0.000_001),
    ("mcg", "g", 0.000_001),
    // volume, canonical = L
    ("L", "L", 1.0),
    ("l", "L", 1.0),
    ("mL", "L", 0.001),
    ("ml", "L", 0.001),
    ("ML", "L", 0.001),
    ("dL", "L", 0.1),
    // length, canonical = m
    ("m", "m", 1.0),
    ("km", "m", 1000.0),
    ("cm", "m", 0.01),
    ("mm", "m", 0.001),
    ("in", "m", 0.0254),
    ("ft", "m", 0.3048),
    // pressure, canonical = mm[Hg]
    ("mm[Hg]", "mm[Hg]", 1.0),
    ("mmHg", "mm[Hg]", 1.0),
    // time / calendar duration, canonical = s
    ("s", "s", 1.0),
    ("ms", "s", 0.001),
    ("min", "s", 60.0),
    ("h", "s", 3600.0),
    ("d", "s", 86_400.0),
    ("wk", "s", 604_800.0),
    ("mo", "s", 2_592_000.0), // 30-day calendar month, per the spec's "deterministic mapping" rule
    ("a", "s", 31_536_000.0), // 365-day calendar year
];

/// Calendar-duration keywords the lexer/parser accept as bare quantity
/// units (spec §4.1), mapped to their UCUM time codes.
const CALENDAR_KEYWORDS: &[(&str, &str)] = &[
    ("year", "a"),
    ("years", "a"),
    ("month", "mo"),
    ("months", "mo"),
    ("week", "wk"),
    ("weeks", "wk"),
    ("day", "d"),
    ("days", "d"),
    ("hour", "h"),
    ("hours", "h"),
    ("minute", "min"),
    ("minutes", "min"),
    ("second", "s"),
    ("seconds", "s"),
    ("millisecond", "ms"),
    ("milliseconds", "ms"),
];

/// Resolve a raw unit string (as written by a user, case-sensitive unless
/// on the documented case-insensitive whitelist) to its table entry.
fn lookup(code: &str) -> Option<UnitEntry> {
    if let Some(keyword) = CALENDAR_KEYWORDS
        .iter()
        .find(|(name, _)| *name == code)
        .map(|(_, ucum)| *ucum)
    {
        return lookup(keyword);
    }
    for (raw, canonical, scale) in UNIT_TABLE {
        if *raw == code {
            return Some(UnitEntry { canonical, scale: *scale });
        }
    }
    // Case-insensitive whitelist: liter and milliliter spellings only.
    let lower = code.to_ascii_lowercase();
    match lower.as_str() {
        "l" => Some(UnitEntry {
            canonical: "L",
            scale: 1.0,
        }),
        "ml" => Some(UnitEntry {
            canonical: "L",
            scale: 0.001,
        }),
        _ => None,
    }
}

/// A Quantity value: a Decimal magnitude paired with a unit code.
#[derive(Debug, Clone)]
pub struct Quantity {
    pub value: Decimal,
    pub unit: Option<String>,
}

impl Quantity {
    pub fn new(value: Decimal, unit: impl Into<Option<String>>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }

    /// Canonical `(code, scale)` for this quantity's unit, if recognized.
    fn canonical_entry(&self) -> Option<UnitEntry> {
        self.unit.as_deref().and_then(lookup)
    }

    /// The canonical unit code this quantity's unit reduces to, or the raw
    /// unit string unchanged if unrecognized (opaque pass-through).
    pub fn canonical_code(&self) -> Option<&str> {
        match self.canonical_entry() {
            Some(entry) => Some(entry.canonical),
            None => self.unit.as_deref(),
        }
    }

    /// The magnitude expressed in the canonical unit.
    pub fn canonical_value(&self) -> Decimal {
        match self.canonical_entry() {
            Some(entry) => self.value * scale_decimal(entry.scale),
            None => self.value,
        }
    }

    /// Whether `self` and `other` share a recognized, comparable dimension
    /// (same canonical code), or are both unrecognized with identical raw
    /// unit codes, or are both unitless.
    pub fn is_comparable_to(&self, other: &Quantity) -> bool {
        match (self.canonical_code(), other.canonical_code()) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Structural equality per spec §4.5: canonical `(value, code)` pairs
    /// equal, within epsilon.
    pub fn equals(&self, other: &Quantity) -> bool {
        self.is_comparable_to(other)
            && (self.canonical_value() - other.canonical_value()).abs() <= epsilon()
    }

    /// Ordering by canonical value; `None` if the units are not comparable.
    pub fn partial_cmp(&self, other: &Quantity) -> Option<std::cmp::Ordering> {
        if !self.is_comparable_to(other) {
            return None;
        }
        self.canonical_value().partial_cmp(&other.canonical_value())
    }

    /// `+`/`-`: requires equal canonical units; result in that canonical unit.
    pub fn add(&self, other: &Quantity) -> Result<Quantity> {
        if !self.is_comparable_to(other) {
            return Err(FhirPathError::ArithmeticError(format!(
                "incompatible units: '{}' and '{}'",
                self.unit.as_deref().unwrap_or(""),
                other.unit.as_deref().unwrap_or(""),
            )));
        }
        Ok(Quantity::new(
            self.canonical_value() + other.canonical_value(),
            self.canonical_code().map(str::to_string),
        ))
    }

    pub fn subtract(&self, other: &Quantity) -> Result<Quantity> {
        if !self.is_comparable_to(other) {
            return Err(FhirPathError::ArithmeticError(format!(
                "incompatible units: '{}' and '{}'",
                self.unit.as_deref().unwrap_or(""),
                other.unit.as_deref().unwrap_or(""),
            )));
        }
        Ok(Quantity::new(
            self.canonical_value() - other.canonical_value(),
            self.canonical_code().map(str::to_string),
        ))
    }

    /// `*`: multiply values, compose the unit string without dimensional
    /// simplification (spec §4.5).
    pub fn multiply(&self, other: &Quantity) -> Quantity {
        let unit = compose_units(self.unit.as_deref(), other.unit.as_deref(), '.');
        Quantity::new(self.value * other.value, unit)
    }

    /// `/`: divide values, compose the unit string with a division marker.
    pub fn divide(&self, other: &Quantity) -> Result<Quantity> {
        if other.value.is_zero() {
            return Err(FhirPathError::ArithmeticError("division by zero".to_string()));
        }
        let unit = compose_units(self.unit.as_deref(), other.unit.as_deref(), '/');
        Ok(Quantity::new(self.value / other.value, unit))
    }

    pub fn multiply_scalar(&self, scalar: Decimal) -> Quantity {
        Quantity::new(self.value * scalar, self.unit.clone())
    }
}

fn compose_units(a: Option<&str>, b: Option<&str>, joiner: char) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) => Some(format!("{a}{joiner}{b}")),
        (Some(a), None) => Some(a.to_string()),
        (None, Some(b)) => Some(b.to_string()),
        (None, None) => None,
    }
}

fn scale_decimal(scale: f64) -> Decimal {
    Decimal::from_f64_retain(scale).unwrap_or(Decimal::ONE)
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.unit {
            Some(unit) => write!(f, "{} '{}'", self.value, unit),
            None => write!(f, "{}", self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    fn q(value: &str, unit: &str) -> Quantity {
        Quantity::new(Decimal::from_str(value).unwrap(), Some(unit.to_string()))
    }

    #[rstest]
    #[case("1000", "mg", "1", "g")]
    #[case("100", "cm", "1", "m")]
    #[case("60", "min", "1", "h")]
    #[case("1", "L", "1", "l")]
    #[case("1", "mL", "1", "ml")]
    #[case("1000", "g", "1", "kg")]
    #[case("1", "s", "1000", "ms")]
    fn conversion_table_pairs_are_equal(
        #[case] lhs_value: &str,
        #[case] lhs_unit: &str,
        #[case] rhs_value: &str,
        #[case] rhs_unit: &str,
    ) {
        assert!(q(lhs_value, lhs_unit).equals(&q(rhs_value, rhs_unit)));
    }

    #[test]
    fn incompatible_dimensions_are_not_comparable() {
        assert!(!q("1", "g").is_comparable_to(&q("1", "m")));
    }

    #[test]
    fn unrecognized_units_compare_by_exact_code_only() {
        assert!(q("1", "widget").equals(&q("1", "widget")));
        assert!(!q("1", "widget").equals(&q("1", "gadget")));
    }

    #[test]
    fn multiply_composes_units_without_simplification() {
        let result = q("2", "m").multiply(&q("3", "m"));
        assert_eq!(result.unit.as_deref(), Some("m.m"));
        assert_eq!(result.value, Decimal::from_str("6").unwrap());
    }

    #[test]
    fn divide_by_zero_is_arithmetic_error() {
        let err = q("1", "g").divide(&q("0", "g")).unwrap_err();
        assert_eq!(err.kind(), "ArithmeticError");
    }

    #[test]
    fn liter_case_insensitive_whitelist() {
        assert!(q("1", "L").equals(&q("1", "l")));
        assert!(q("1", "mL").equals(&q("1", "ml")));
    }
}
