//! End-to-end scenarios over representative FHIR resources.

use octofhir_fhirpath::{count, evaluate, evaluate_to_boolean, evaluate_to_strings, exists, must_compile};
use serde_json::json;

fn patient() -> serde_json::Value {
    json!({
        "resourceType": "Patient",
        "active": true,
        "name": [
            {"use": "official", "family": "Chalmers", "given": ["Peter", "James"]},
            {"use": "usual", "given": ["Jim"]}
        ],
        "birthDate": "1974-12-25"
    })
}

fn observation_with_components() -> serde_json::Value {
    json!({
        "resourceType": "Observation",
        "status": "final",
        "component": [
            {"code": {"text": "systolic"}, "valueQuantity": {"value": 120, "unit": "mmHg"}},
            {"code": {"text": "diastolic"}, "valueQuantity": {"value": 80, "unit": "mmHg"}}
        ]
    })
}

#[test]
fn navigates_nested_arrays_and_flattens() {
    let given = evaluate_to_strings(patient(), "name.given").unwrap();
    assert_eq!(given, vec!["Peter", "James", "Jim"]);
}

#[test]
fn where_filters_by_predicate_on_this() {
    let family = evaluate_to_strings(patient(), "name.where(use = 'official').family").unwrap();
    assert_eq!(family, vec!["Chalmers"]);
}

#[test]
fn arithmetic_and_boolean_logic() {
    assert!(evaluate_to_boolean(patient(), "1 + 2 = 3").unwrap());
    assert!(evaluate_to_boolean(patient(), "active and name.exists()").unwrap());
}

#[test]
fn date_string_compares_against_date_literal() {
    let resource = json!({
        "resourceType": "Patient",
        "id": "123",
        "active": true,
        "name": [
            {"use": "official", "family": "Doe", "given": ["John", "James"]},
            {"use": "nickname", "given": ["Johnny"]}
        ],
        "birthDate": "1990-01-15"
    });
    assert!(evaluate_to_boolean(resource, "Patient.birthDate > @1980-01-01").unwrap());
}

#[test]
fn quantity_equality_across_units() {
    let resource = json!({});
    assert!(evaluate_to_boolean(resource.clone(), "1000 'mg' = 1 'g'").unwrap());
    assert!(evaluate_to_boolean(resource.clone(), "100 'cm' ~ 1 'm'").unwrap());
    assert!(evaluate_to_boolean(resource, "60 'min' = 1 'h'").unwrap());
}

#[test]
fn observation_components_sum_via_polymorphic_value() {
    let total = evaluate(
        observation_with_components(),
        "component.value.value.sum()",
    )
    .unwrap();
    assert_eq!(total.len(), 1);
    let rendered = evaluate_to_strings(observation_with_components(), "component.value.value.sum()").unwrap();
    assert_eq!(rendered, vec!["200"]);
}

#[test]
fn string_function_pipeline() {
    let result = evaluate_to_strings(
        patient(),
        "name.first().family.upper().startsWith('CHAL').toString()",
    )
    .unwrap();
    assert_eq!(result, vec!["true"]);
}

#[test]
fn iif_only_evaluates_the_taken_branch() {
    // the 1/0 branch would raise ArithmeticError if evaluated eagerly
    assert!(evaluate_to_boolean(patient(), "iif(active, true, (1/0) > 0)").unwrap());
}

#[test]
fn exists_and_count_on_missing_element() {
    assert!(!exists(patient(), "deceasedDateTime").unwrap());
    assert_eq!(count(patient(), "name").unwrap(), 2);
}

#[test]
fn compiled_expression_is_reusable_across_resources() {
    let expr = must_compile("name.given.count()");
    let a = expr.evaluate(patient()).unwrap();
    let b = expr
        .evaluate(json!({"resourceType": "Patient", "name": [{"given": ["Solo"]}]}))
        .unwrap();
    assert_eq!(a.len(), 1);
    assert_eq!(b.len(), 1);
}

#[test]
fn resource_type_prefix_is_transparent() {
    let with_prefix = evaluate_to_strings(patient(), "Patient.name.given").unwrap();
    let without_prefix = evaluate_to_strings(patient(), "name.given").unwrap();
    assert_eq!(with_prefix, without_prefix);
}

#[test]
fn unknown_function_surfaces_as_typed_error() {
    let err = evaluate(patient(), "name.bogusFunction()").unwrap_err();
    assert_eq!(err.kind(), "UnknownFunction");
}
