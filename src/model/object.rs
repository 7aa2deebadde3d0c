//! Opaque FHIR object handles and polymorphic element resolution.
//!
//! A FHIR resource or backbone element is carried around as a thin wrapper
//! over `serde_json::Value` rather than being deserialized into generated
//! types — this crate has no code generator, by design (see the Non-goals
//! in the requirements document).

use std::sync::Arc;

use serde_json::Value as Json;

/// A FHIR object subtree, reference-counted so path navigation can hand out
/// children without cloning the underlying JSON.
#[derive(Debug, Clone)]
pub struct FhirObject {
    inner: Arc<Json>,
    /// The FHIR type name this node is known to be, when available (the
    /// resource's own `resourceType`, or the suffix recovered from a
    /// polymorphic `value[x]` resolution).
    type_name: Option<String>,
}

impl FhirObject {
    pub fn new(value: Json) -> Self {
        let type_name = value
            .as_object()
            .and_then(|o| o.get("resourceType"))
            .and_then(Json::as_str)
            .map(str::to_string);
        Self {
            inner: Arc::new(value),
            type_name,
        }
    }

    fn with_type(inner: Arc<Json>, type_name: Option<String>) -> Self {
        Self { inner, type_name }
    }

    pub fn json(&self) -> &Json {
        &self.inner
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    /// Direct child access by field name. Arrays under `name` expand to one
    /// `FhirObject`/primitive per element via [`FhirObject::expand`]; this
    /// method returns the raw JSON at that key, still possibly an array.
    pub fn get(&self, name: &str) -> Option<&Json> {
        self.inner.as_object()?.get(name)
    }

    /// Resolve a bare `value` step against this object's polymorphic
    /// `value[x]` elements: any key named `value` followed by an
    /// upper-case-initial suffix (`valueQuantity`, `valueString`, ...).
    /// Returns `(suffix, json)` pairs; there should be at most one per
    /// well-formed FHIR element, but callers fold over however many match.
    pub fn resolve_polymorphic<'a>(&'a self, prefix: &str) -> Vec<(&'a str, &'a Json)> {
        let Some(obj) = self.inner.as_object() else {
            return Vec::new();
        };
        obj.iter()
            .filter_map(|(key, val)| {
                let suffix = key.strip_prefix(prefix)?;
                if suffix.is_empty() {
                    return None;
                }
                if suffix.chars().next()?.is_uppercase() {
                    Some((suffix, val))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Expand a JSON value reached via a child key into zero or more
    /// `FhirObject`s (flattening arrays, dropping `null`).
    pub fn expand(&self, json: &Json) -> Vec<Json> {
        match json {
            Json::Null => Vec::new(),
            Json::Array(items) => items.iter().filter(|v| !v.is_null()).cloned().collect(),
            other => vec![other.clone()],
        }
    }

    /// A child object carrying the same `Arc` root where possible, used so
    /// nested navigation doesn't re-wrap every step from scratch. `type_name`
    /// is the caller's best guess at the child's FHIR type (from a
    /// polymorphic suffix, or `None` for untyped backbone elements).
    pub fn child(&self, value: Json, type_name: Option<String>) -> Self {
        Self::with_type(Arc::new(value), type_name)
    }
}

impl PartialEq for FhirObject {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_type_is_captured() {
        let obj = FhirObject::new(json!({"resourceType": "Patient", "id": "1"}));
        assert_eq!(obj.type_name(), Some("Patient"));
    }

    #[test]
    fn polymorphic_resolution_finds_typed_suffix() {
        let obj = FhirObject::new(json!({
            "code": {"coding": []},
            "valueQuantity": {"value": 120, "unit": "mmHg"}
        }));
        let matches = obj.resolve_polymorphic("value");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].0, "Quantity");
    }

    #[test]
    fn expand_flattens_arrays_and_drops_nulls() {
        let obj = FhirObject::new(json!({}));
        let expanded = obj.expand(&json!(["a", null, "b"]));
        assert_eq!(expanded, vec![json!("a"), json!("b")]);
    }
}
