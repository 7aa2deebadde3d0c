//! The runtime value model: scalar variants plus the `Collection` they flow
//! through.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::Value as Json;

use super::object::FhirObject;
use super::quantity::Quantity;
use super::temporal::PartialDateTime;

/// A single FHIRPath runtime value. Every evaluation result is a
/// [`Collection`] of these.
#[derive(Debug, Clone, PartialEq)]
pub enum FhirPathValue {
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    String(String),
    Date(PartialDateTime),
    DateTime(PartialDateTime),
    Time(PartialDateTime),
    Quantity(Quantity),
    /// An opaque FHIR subtree: a resource, backbone element, or primitive
    /// wrapped in its typed context (e.g. the result of navigating to a
    /// `CodeableConcept`).
    Object(FhirObject),
}

impl FhirPathValue {
    /// The fixed type name used by `is`/`as`/`type()`, per spec §3.
    pub fn type_name(&self) -> &str {
        match self {
            FhirPathValue::Boolean(_) => "Boolean",
            FhirPathValue::Integer(_) => "Integer",
            FhirPathValue::Decimal(_) => "Decimal",
            FhirPathValue::String(_) => "String",
            FhirPathValue::Date(_) => "Date",
            FhirPathValue::DateTime(_) => "DateTime",
            FhirPathValue::Time(_) => "Time",
            FhirPathValue::Quantity(_) => "Quantity",
            FhirPathValue::Object(obj) => obj.type_name().unwrap_or("Object"),
        }
    }

    /// Structural equality per spec §4.3 (scalars only; `Collection`
    /// equality is defined on the container, element-wise using this).
    pub fn equals(&self, other: &FhirPathValue) -> Option<bool> {
        match (self, other) {
            (FhirPathValue::Boolean(a), FhirPathValue::Boolean(b)) => Some(a == b),
            (FhirPathValue::Integer(a), FhirPathValue::Integer(b)) => Some(a == b),
            (FhirPathValue::Decimal(a), FhirPathValue::Decimal(b)) => Some(a == b),
            (FhirPathValue::Integer(a), FhirPathValue::Decimal(b))
            | (FhirPathValue::Decimal(b), FhirPathValue::Integer(a)) => {
                Some(Decimal::from(*a) == *b)
            }
            (FhirPathValue::String(a), FhirPathValue::String(b)) => Some(a == b),
            (FhirPathValue::Date(a), FhirPathValue::Date(b))
            | (FhirPathValue::DateTime(a), FhirPathValue::DateTime(b))
            | (FhirPathValue::Time(a), FhirPathValue::Time(b)) => {
                if a.precision == b.precision {
                    Some(a.equals(b))
                } else {
                    None
                }
            }
            (FhirPathValue::String(s), FhirPathValue::Date(d))
            | (FhirPathValue::Date(d), FhirPathValue::String(s))
            | (FhirPathValue::String(s), FhirPathValue::DateTime(d))
            | (FhirPathValue::DateTime(d), FhirPathValue::String(s))
            | (FhirPathValue::String(s), FhirPathValue::Time(d))
            | (FhirPathValue::Time(d), FhirPathValue::String(s)) => {
                let parsed = PartialDateTime::parse(s).ok()?;
                if parsed.precision == d.precision {
                    Some(parsed.equals(d))
                } else {
                    None
                }
            }
            (FhirPathValue::Quantity(a), FhirPathValue::Quantity(b)) => {
                if a.is_comparable_to(b) {
                    Some(a.equals(b))
                } else {
                    None
                }
            }
            (FhirPathValue::Object(a), FhirPathValue::Object(b)) => Some(a == b),
            _ => Some(false),
        }
    }

    /// Case-insensitive-for-strings, dimension-normalized-for-quantities
    /// equivalence (`~`), per spec §4.3. Unlike `equals`, never returns
    /// `None`: mismatched-precision temporals and incompatible quantities
    /// are simply not equivalent.
    pub fn equivalent(&self, other: &FhirPathValue) -> bool {
        match (self, other) {
            (FhirPathValue::String(a), FhirPathValue::String(b)) => {
                a.trim().eq_ignore_ascii_case(b.trim())
            }
            (FhirPathValue::Quantity(a), FhirPathValue::Quantity(b)) => {
                a.is_comparable_to(b) && a.equals(b)
            }
            (FhirPathValue::Decimal(_), _) | (_, FhirPathValue::Decimal(_)) => {
                self.equals(other).unwrap_or(false)
            }
            _ => self.equals(other).unwrap_or(false),
        }
    }

    /// Ordering for `< <= > >=`, `None` when undefined (different kinds,
    /// mismatched temporal precision, incompatible quantity units).
    pub fn partial_cmp(&self, other: &FhirPathValue) -> Option<Ordering> {
        match (self, other) {
            (FhirPathValue::Integer(a), FhirPathValue::Integer(b)) => a.partial_cmp(b),
            (FhirPathValue::Decimal(a), FhirPathValue::Decimal(b)) => a.partial_cmp(b),
            (FhirPathValue::Integer(a), FhirPathValue::Decimal(b)) => {
                Decimal::from(*a).partial_cmp(b)
            }
            (FhirPathValue::Decimal(a), FhirPathValue::Integer(b)) => {
                a.partial_cmp(&Decimal::from(*b))
            }
            (FhirPathValue::String(a), FhirPathValue::String(b)) => a.partial_cmp(b),
            (FhirPathValue::Date(a), FhirPathValue::Date(b))
            | (FhirPathValue::DateTime(a), FhirPathValue::DateTime(b))
            | (FhirPathValue::Time(a), FhirPathValue::Time(b)) => a.compare(b),
            (FhirPathValue::String(s), FhirPathValue::Date(d))
            | (FhirPathValue::String(s), FhirPathValue::DateTime(d))
            | (FhirPathValue::String(s), FhirPathValue::Time(d)) => {
                PartialDateTime::parse(s).ok()?.compare(d)
            }
            (FhirPathValue::Date(d), FhirPathValue::String(s))
            | (FhirPathValue::DateTime(d), FhirPathValue::String(s))
            | (FhirPathValue::Time(d), FhirPathValue::String(s)) => {
                d.compare(&PartialDateTime::parse(s).ok()?)
            }
            (FhirPathValue::Quantity(a), FhirPathValue::Quantity(b)) => a.partial_cmp(b),
            _ => None,
        }
    }

    /// Best-effort conversion from a JSON leaf/subtree reached during path
    /// navigation into a runtime value. Quantity-shaped objects
    /// (`{"value": ..., "unit"|"code": ...}`) are recognized heuristically;
    /// everything else that is a JSON object becomes an `Object`.
    pub fn from_json(json: Json, type_hint: Option<&str>) -> FhirPathValue {
        match type_hint {
            Some("boolean") => {
                if let Some(b) = json.as_bool() {
                    return FhirPathValue::Boolean(b);
                }
            }
            Some("integer") | Some("positiveInt") | Some("unsignedInt") => {
                if let Some(n) = json.as_i64() {
                    return FhirPathValue::Integer(n);
                }
            }
            Some("decimal") => {
                if let Some(d) = json_to_decimal(&json) {
                    return FhirPathValue::Decimal(d);
                }
            }
            Some("date") => {
                if let Some(s) = json.as_str() {
                    if let Ok(dt) = PartialDateTime::parse(s) {
                        return FhirPathValue::Date(dt);
                    }
                }
            }
            Some("dateTime" | "instant") => {
                if let Some(s) = json.as_str() {
                    if let Ok(dt) = PartialDateTime::parse(s) {
                        return FhirPathValue::DateTime(dt);
                    }
                }
            }
            Some("time") => {
                if let Some(s) = json.as_str() {
                    if let Ok(dt) = PartialDateTime::parse(s) {
                        return FhirPathValue::Time(dt);
                    }
                }
            }
            _ => {}
        }
        match &json {
            Json::Bool(b) => FhirPathValue::Boolean(*b),
            Json::Number(_) => {
                if let Some(n) = json.as_i64() {
                    FhirPathValue::Integer(n)
                } else {
                    FhirPathValue::Decimal(json_to_decimal(&json).unwrap_or_default())
                }
            }
            Json::String(s) => FhirPathValue::String(s.clone()),
            Json::Object(map) if is_quantity_shaped(map) => {
                let value = map
                    .get("value")
                    .and_then(json_to_decimal)
                    .unwrap_or_default();
                let unit = map
                    .get("code")
                    .or_else(|| map.get("unit"))
                    .and_then(Json::as_str)
                    .map(str::to_string);
                FhirPathValue::Quantity(Quantity::new(value, unit))
            }
            _ => FhirPathValue::Object(FhirObject::new(json)),
        }
    }

    /// Render as JSON, the inverse of `from_json` for the scalar cases.
    pub fn to_json(&self) -> Json {
        match self {
            FhirPathValue::Boolean(b) => Json::Bool(*b),
            FhirPathValue::Integer(n) => Json::Number((*n).into()),
            FhirPathValue::Decimal(d) => serde_json::Number::from_f64(
                d.to_string().parse::<f64>().unwrap_or(0.0),
            )
            .map(Json::Number)
            .unwrap_or(Json::Null),
            FhirPathValue::String(s) => Json::String(s.clone()),
            FhirPathValue::Date(d) | FhirPathValue::DateTime(d) | FhirPathValue::Time(d) => {
                Json::String(format!("{d:?}"))
            }
            FhirPathValue::Quantity(q) => serde_json::json!({
                "value": q.value.to_string(),
                "unit": q.unit,
            }),
            FhirPathValue::Object(obj) => obj.json().clone(),
        }
    }
}

fn is_quantity_shaped(map: &serde_json::Map<String, Json>) -> bool {
    map.contains_key("value") && (map.contains_key("unit") || map.contains_key("code"))
        && map.get("value").is_some_and(Json::is_number)
}

fn json_to_decimal(json: &Json) -> Option<Decimal> {
    match json {
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else {
                n.as_f64().and_then(|f| Decimal::try_from(f).ok())
            }
        }
        _ => None,
    }
}

impl fmt::Display for FhirPathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FhirPathValue::Boolean(b) => write!(f, "{b}"),
            FhirPathValue::Integer(n) => write!(f, "{n}"),
            FhirPathValue::Decimal(d) => write!(f, "{d}"),
            FhirPathValue::String(s) => write!(f, "{s}"),
            FhirPathValue::Date(d) | FhirPathValue::DateTime(d) | FhirPathValue::Time(d) => {
                write!(f, "{:04}-{:02}-{:02}", d.year, d.month, d.day)
            }
            FhirPathValue::Quantity(q) => write!(f, "{q}"),
            FhirPathValue::Object(obj) => write!(f, "{}", obj.json()),
        }
    }
}

/// An ordered, possibly-empty sequence of values — the universal result
/// type of every FHIRPath expression. Backed by `Arc<[FhirPathValue]>` so
/// sharing a focus across sibling evaluations (e.g. inside `where`) is a
/// cheap clone rather than a deep copy.
#[derive(Debug, Clone, Default)]
pub struct Collection(Arc<[FhirPathValue]>);

impl Collection {
    pub fn empty() -> Self {
        Collection(Arc::from(Vec::new()))
    }

    pub fn single(value: FhirPathValue) -> Self {
        Collection(Arc::from(vec![value]))
    }

    pub fn from_vec(values: Vec<FhirPathValue>) -> Self {
        Collection(Arc::from(values))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FhirPathValue> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[FhirPathValue] {
        &self.0
    }

    /// The sole element, if this collection has exactly one. Does not
    /// implement the spec's `single()` *function* semantics (which errors
    /// on >1); this is a plain accessor used internally wherever a scalar
    /// operand is required.
    pub fn as_singleton(&self) -> Option<&FhirPathValue> {
        match self.0.as_ref() {
            [value] => Some(value),
            _ => None,
        }
    }

    /// Concatenate two collections preserving order (used by `combine`,
    /// path-step flattening, and `|`'s pre-dedup step).
    pub fn concat(&self, other: &Collection) -> Collection {
        let mut out = Vec::with_capacity(self.len() + other.len());
        out.extend(self.iter().cloned());
        out.extend(other.iter().cloned());
        Collection::from_vec(out)
    }

    /// `true` iff `self` and `other` have equal length and pairwise-equal
    /// elements in order (spec §4.3 collection equality); `None` if any
    /// pairwise comparison is itself undefined.
    pub fn equals(&self, other: &Collection) -> Option<bool> {
        if self.len() != other.len() {
            return Some(false);
        }
        let mut all_equal = true;
        for (a, b) in self.iter().zip(other.iter()) {
            match a.equals(b) {
                Some(true) => {}
                Some(false) => all_equal = false,
                None => return None,
            }
        }
        Some(all_equal)
    }

    /// `true` iff `self` and `other` have equal length and pairwise-
    /// equivalent elements in order (spec §4.3 collection equivalence, `~`).
    /// Unlike `equals`, never undefined.
    pub fn equivalent(&self, other: &Collection) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|(a, b)| a.equivalent(b))
    }

    pub fn to_json(&self) -> Json {
        Json::Array(self.iter().map(FhirPathValue::to_json).collect())
    }
}

impl FromIterator<FhirPathValue> for Collection {
    fn from_iter<T: IntoIterator<Item = FhirPathValue>>(iter: T) -> Self {
        Collection::from_vec(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a FhirPathValue;
    type IntoIter = std::slice::Iter<'a, FhirPathValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn integer_and_decimal_compare_equal() {
        let a = FhirPathValue::Integer(5);
        let b = FhirPathValue::Decimal(Decimal::from_str("5.0").unwrap());
        assert_eq!(a.equals(&b), Some(true));
    }

    #[test]
    fn string_equivalence_is_case_insensitive_and_trims() {
        let a = FhirPathValue::String(" Hello ".to_string());
        let b = FhirPathValue::String("HELLO".to_string());
        assert!(a.equivalent(&b));
    }

    #[test]
    fn collection_equals_checks_order_and_length() {
        let a = Collection::from_vec(vec![FhirPathValue::Integer(1), FhirPathValue::Integer(2)]);
        let b = Collection::from_vec(vec![FhirPathValue::Integer(2), FhirPathValue::Integer(1)]);
        assert_eq!(a.equals(&b), Some(false));
    }

    #[test]
    fn mismatched_date_precision_is_incomparable() {
        let a = FhirPathValue::Date(PartialDateTime::parse("2023").unwrap());
        let b = FhirPathValue::Date(PartialDateTime::parse("2023-01").unwrap());
        assert_eq!(a.equals(&b), None);
        assert_eq!(a.partial_cmp(&b), None);
    }

    #[test]
    fn quantity_shaped_json_becomes_quantity_value() {
        let json = serde_json::json!({"value": 120, "unit": "mmHg"});
        let value = FhirPathValue::from_json(json, None);
        assert!(matches!(value, FhirPathValue::Quantity(_)));
    }
}
