//! Cross-cutting properties that should hold for (almost) any expression:
//! empty propagation, three-valued truth tables, cache correctness,
//! cancellation, and collection-order preservation.

use std::time::Duration;

use octofhir_fhirpath::cache::{CacheConfig, ExpressionCache};
use octofhir_fhirpath::options::{CancellationToken, EvaluateOptions};
use octofhir_fhirpath::{evaluate, evaluate_to_boolean, evaluate_with_options, must_compile};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn arithmetic_propagates_empty_from_either_side() {
    let resource = json!({"resourceType": "Patient"});
    for expr in ["missing + 1", "1 + missing", "missing * 2", "missing > 1"] {
        let result = evaluate(resource.clone(), expr).unwrap();
        assert!(result.is_empty(), "expected empty for '{expr}'");
    }
}

#[test]
fn concat_is_exempt_from_empty_propagation() {
    let resource = json!({"resourceType": "Patient"});
    let result = evaluate(resource, "missing & 'x'").unwrap();
    assert_eq!(result.len(), 1);
}

#[test]
fn three_valued_and_or_tables() {
    let resource = json!({});
    // false and <anything> is always false, even with an unknown operand
    assert_eq!(
        evaluate(resource.clone(), "false and missing").unwrap().len(),
        1
    );
    // true and <unknown> is unknown (empty)
    assert!(evaluate(resource.clone(), "true and missing").unwrap().is_empty());
    // true or <anything> is always true
    assert_eq!(evaluate(resource.clone(), "true or missing").unwrap().len(), 1);
    // false or <unknown> is unknown (empty)
    assert!(evaluate(resource, "false or missing").unwrap().is_empty());
}

#[test]
fn distinct_and_union_preserve_first_occurrence_order() {
    let resource = json!({"resourceType": "Patient", "values": [3, 1, 3, 2, 1]});
    let result = evaluate(resource, "values.distinct()").unwrap();
    let nums: Vec<i64> = result
        .iter()
        .map(|v| match v {
            octofhir_fhirpath::FhirPathValue::Integer(n) => *n,
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(nums, vec![3, 1, 2]);
}

#[test]
fn first_combine_tail_reconstructs_original_collection() {
    let resource = json!({"resourceType": "Patient", "values": [10, 20, 30]});
    let reconstructed = evaluate(resource.clone(), "values.first().combine(values.tail())").unwrap();
    let original = evaluate(resource, "values").unwrap();
    assert_eq!(reconstructed.as_slice(), original.as_slice());
}

#[test]
fn multi_element_collections_compare_with_the_equality_operator() {
    let resource = json!({"resourceType": "Patient", "values": [1, 2, 3]});
    assert!(evaluate_to_boolean(resource.clone(), "values = values").unwrap());
    assert!(evaluate_to_boolean(resource.clone(), "(1 | 2 | 3) = values").unwrap());
    assert!(evaluate_to_boolean(resource, "(1 | 2) != values").unwrap());
}

#[test]
fn cache_hits_on_repeated_source_and_recompiles_after_clear() {
    let cache = ExpressionCache::new(CacheConfig::with_capacity(4));
    cache.get("1 + 1").unwrap();
    cache.get("1 + 1").unwrap();
    assert_eq!(cache.stats().hits, 1);
    cache.clear();
    cache.get("1 + 1").unwrap();
    assert_eq!(cache.stats().misses, 1);
    assert_eq!(cache.stats().hits, 0);
}

#[test]
fn cancellation_token_aborts_in_flight_evaluation() {
    let token = CancellationToken::new();
    token.cancel();
    let options = EvaluateOptions::default().with_cancellation(token);
    let err = evaluate_with_options(json!({}), "1 + 1", &options).unwrap_err();
    assert_eq!(err.kind(), "CancellationError");
}

#[test]
fn zero_timeout_aborts_before_completion() {
    let options = EvaluateOptions::default().with_timeout(Duration::from_nanos(1));
    std::thread::sleep(Duration::from_millis(5));
    let err = evaluate_with_options(json!({}), "1 + 1", &options).unwrap_err();
    assert_eq!(err.kind(), "CancellationError");
}

#[test]
fn compile_is_deterministic_for_the_same_source() {
    let a = must_compile("Patient.name.where(use = 'official').family");
    let b = must_compile("Patient.name.where(use = 'official').family");
    let resource = json!({"resourceType": "Patient", "name": [{"use": "official", "family": "Doe"}]});
    assert_eq!(
        a.evaluate(resource.clone()).unwrap().as_slice(),
        b.evaluate(resource).unwrap().as_slice()
    );
}

#[test]
fn resource_limit_error_on_excessive_recursion_depth() {
    let resource = json!({
        "resourceType": "Patient",
        "contained": [{"resourceType": "Patient", "contained": [{"resourceType": "Patient"}]}]
    });
    let options = EvaluateOptions::default().with_max_depth(1);
    let err = evaluate_with_options(resource, "descendants()", &options).unwrap_err();
    assert_eq!(err.kind(), "ResourceLimitError");
}
