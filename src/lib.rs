//! A FHIRPath expression engine: lexer, parser, tree-walking evaluator, and
//! UCUM-aware quantity arithmetic over FHIR JSON resources.
//!
//! The common entry points are [`compile`] (parse once, evaluate many
//! times) and [`evaluate`] (parse-and-run in one call, using the
//! process-wide cache). For typed results, see [`evaluate_to_boolean`] and
//! friends.

pub mod ast;
pub mod cache;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod model;
pub mod options;
pub mod parser;
pub mod registry;

use std::sync::Arc;
use std::sync::OnceLock;

use ast::ExpressionNode;
pub use error::{FhirPathError, Result};
use evaluator::{eval_node, Context};
pub use model::{Collection, FhirObject, FhirPathValue};
pub use options::EvaluateOptions;
use registry::FunctionRegistry;

use cache::{CacheConfig, ExpressionCache};

fn default_registry() -> &'static Arc<FunctionRegistry> {
    static REGISTRY: OnceLock<Arc<FunctionRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(|| Arc::new(FunctionRegistry::standard()))
}

fn default_cache() -> &'static ExpressionCache {
    static CACHE: OnceLock<ExpressionCache> = OnceLock::new();
    CACHE.get_or_init(|| ExpressionCache::new(CacheConfig::default_sized()))
}

/// A parsed, ready-to-evaluate FHIRPath expression.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    node: ExpressionNode,
}

impl Expression {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against `resource` with default options.
    pub fn evaluate(&self, resource: serde_json::Value) -> Result<Collection> {
        self.evaluate_with_options(resource, &EvaluateOptions::default())
    }

    /// Evaluate against `resource`, honoring `options` (timeout, variables,
    /// resolver, cancellation, ...).
    pub fn evaluate_with_options(
        &self,
        resource: serde_json::Value,
        options: &EvaluateOptions,
    ) -> Result<Collection> {
        let ctx = Context::new(FhirObject::new(resource), options, default_registry().clone());
        eval_node(&self.node, &ctx)
    }
}

/// Parse `source` into a reusable [`Expression`]. Does not consult the
/// process cache — use [`evaluate`] or [`ExpressionCache`] directly for
/// cached compilation.
pub fn compile(source: &str) -> Result<Expression> {
    let node = parser::parse(source)?;
    Ok(Expression {
        source: source.to_string(),
        node,
    })
}

/// `compile`, panicking on a parse error. For call sites with a
/// statically-known-valid expression (tests, constants).
pub fn must_compile(source: &str) -> Expression {
    compile(source).unwrap_or_else(|err| panic!("invalid FHIRPath expression '{source}': {err}"))
}

/// Parse (via the process-wide cache) and evaluate `source` against
/// `resource` in one call.
pub fn evaluate(resource: serde_json::Value, source: &str) -> Result<Collection> {
    evaluate_with_options(resource, source, &EvaluateOptions::default())
}

pub fn evaluate_with_options(
    resource: serde_json::Value,
    source: &str,
    options: &EvaluateOptions,
) -> Result<Collection> {
    let node = default_cache().get(source)?;
    let ctx = Context::new(FhirObject::new(resource), options, default_registry().clone());
    eval_node(&node, &ctx)
}

/// `evaluate`, panicking on any error. For call sites with statically-known
/// valid expressions and resources.
pub fn must_evaluate(resource: serde_json::Value, source: &str) -> Collection {
    evaluate(resource, source).unwrap_or_else(|err| panic!("evaluation of '{source}' failed: {err}"))
}

/// Evaluate and collapse to a single boolean, per FHIRPath's "singleton
/// boolean evaluation" convention: non-empty singleton `true`/`false` maps
/// directly, an empty result is `false`, anything else is a `TypeError`.
pub fn evaluate_to_boolean(resource: serde_json::Value, source: &str) -> Result<bool> {
    let result = evaluate(resource, source)?;
    match result.as_singleton() {
        Some(FhirPathValue::Boolean(b)) => Ok(*b),
        None if result.is_empty() => Ok(false),
        _ => Err(FhirPathError::type_error(format!(
            "expression '{source}' did not evaluate to a single Boolean"
        ))),
    }
}

/// Evaluate and require a single String result.
pub fn evaluate_to_string(resource: serde_json::Value, source: &str) -> Result<String> {
    let result = evaluate(resource, source)?;
    match result.as_singleton() {
        Some(value) => Ok(value.to_string()),
        None => Err(FhirPathError::singleton(format!(
            "expression '{source}' did not evaluate to a single value"
        ))),
    }
}

/// Evaluate and render every result element via its `Display` impl.
pub fn evaluate_to_strings(resource: serde_json::Value, source: &str) -> Result<Vec<String>> {
    let result = evaluate(resource, source)?;
    Ok(result.iter().map(FhirPathValue::to_string).collect())
}

/// `true` iff the expression yields at least one element.
pub fn exists(resource: serde_json::Value, source: &str) -> Result<bool> {
    Ok(!evaluate(resource, source)?.is_empty())
}

/// The number of elements the expression yields.
pub fn count(resource: serde_json::Value, source: &str) -> Result<usize> {
    Ok(evaluate(resource, source)?.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compile_then_evaluate_matches_one_shot_evaluate() {
        let resource = json!({"resourceType": "Patient", "active": true});
        let via_compile = must_compile("Patient.active").evaluate(resource.clone()).unwrap();
        let via_evaluate = evaluate(resource, "Patient.active").unwrap();
        assert_eq!(via_compile.equals(&via_evaluate), Some(true));
    }

    #[test]
    fn evaluate_to_boolean_treats_empty_as_false() {
        let resource = json!({"resourceType": "Patient"});
        assert!(!evaluate_to_boolean(resource, "deceased.exists()").unwrap());
    }

    #[test]
    fn exists_and_count_agree() {
        let resource = json!({
            "resourceType": "Patient",
            "name": [{"family": "Doe"}, {"family": "Roe"}]
        });
        assert!(exists(resource.clone(), "name").unwrap());
        assert_eq!(count(resource, "name").unwrap(), 2);
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let err = evaluate(json!({}), "%bogus").unwrap_err();
        assert_eq!(err.kind(), "UnknownVariable");
    }
}
