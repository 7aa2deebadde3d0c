//! The function trait and registry.
//!
//! Every built-in is a trait object in a `HashMap<String, Arc<dyn
//! FhirPathFunction>>`, so the registry is open to embedder-defined
//! functions without touching this crate. Arguments are passed as
//! unevaluated AST nodes plus an `eval` callback rather than as
//! pre-evaluated collections: eager functions call `eval` once per
//! argument against the ambient context, lazy functions (`where`,
//! `select`, `iif`, `repeat`, `all`, `aggregate`, `trace`) call it once per
//! element of the focus against a rebound context — the same signature
//! serves both without a separate lazy/eager split in the trait.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::ExpressionNode;
use crate::error::{FhirPathError, Result};
use crate::evaluator::Context;
use crate::model::Collection;

/// Evaluates a single AST node against a context; implemented by the
/// tree-walking evaluator and handed down into function calls so lazy
/// functions can re-evaluate an argument per element of the focus.
pub type EvalFn<'a> = &'a dyn Fn(&ExpressionNode, &Context) -> Result<Collection>;

/// A callable FHIRPath function.
pub trait FhirPathFunction: Send + Sync {
    fn name(&self) -> &str;
    fn min_arity(&self) -> usize;
    fn max_arity(&self) -> Option<usize>;
    fn call(
        &self,
        ctx: &Context,
        focus: &Collection,
        args: &[ExpressionNode],
        eval: EvalFn,
    ) -> Result<Collection>;
}

/// Adapts a plain closure into a [`FhirPathFunction`], so built-ins read as
/// data (name, arity, body) instead of one struct definition each.
pub struct ClosureFunction<F> {
    name: &'static str,
    min_arity: usize,
    max_arity: Option<usize>,
    body: F,
}

impl<F> ClosureFunction<F>
where
    F: Fn(&Context, &Collection, &[ExpressionNode], EvalFn) -> Result<Collection> + Send + Sync,
{
    pub fn new(name: &'static str, min_arity: usize, max_arity: Option<usize>, body: F) -> Self {
        Self {
            name,
            min_arity,
            max_arity,
            body,
        }
    }
}

impl<F> FhirPathFunction for ClosureFunction<F>
where
    F: Fn(&Context, &Collection, &[ExpressionNode], EvalFn) -> Result<Collection> + Send + Sync,
{
    fn name(&self) -> &str {
        self.name
    }

    fn min_arity(&self) -> usize {
        self.min_arity
    }

    fn max_arity(&self) -> Option<usize> {
        self.max_arity
    }

    fn call(
        &self,
        ctx: &Context,
        focus: &Collection,
        args: &[ExpressionNode],
        eval: EvalFn,
    ) -> Result<Collection> {
        (self.body)(ctx, focus, args, eval)
    }
}

/// The set of callable functions available to an evaluation. Immutable
/// after construction and safely shared across concurrent evaluations
/// (spec §5), so it's handed around as an `Arc<FunctionRegistry>`.
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn FhirPathFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    pub fn register(&mut self, function: Arc<dyn FhirPathFunction>) {
        self.functions.insert(function.name().to_string(), function);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn FhirPathFunction>> {
        self.functions.get(name)
    }

    /// The full built-in registry (spec §4.4's minimum function set).
    pub fn standard() -> Self {
        let mut registry = Self::new();
        super::functions::register_all(&mut registry);
        registry
    }

    pub fn check_arity(&self, name: &str, actual: usize) -> Result<()> {
        let function = self
            .get(name)
            .ok_or_else(|| FhirPathError::UnknownFunction(name.to_string()))?;
        let ok = actual >= function.min_arity()
            && function.max_arity().map(|max| actual <= max).unwrap_or(true);
        if ok {
            Ok(())
        } else {
            Err(FhirPathError::arity(
                name,
                function.min_arity(),
                function.max_arity(),
                actual,
            ))
        }
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_function_arity_check_fails() {
        let registry = FunctionRegistry::standard();
        let err = registry.check_arity("notAFunction", 0).unwrap_err();
        assert_eq!(err.kind(), "UnknownFunction");
    }

    #[test]
    fn known_function_rejects_bad_arity() {
        let registry = FunctionRegistry::standard();
        let err = registry.check_arity("first", 1).unwrap_err();
        assert_eq!(err.kind(), "ArityError");
    }
}
