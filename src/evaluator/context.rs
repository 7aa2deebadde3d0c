//! The evaluation `Context`: the mutable-per-evaluation bundle of focus,
//! bindings, limits, and collaborators the tree walk threads through every
//! node.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{FhirPathError, Result};
use crate::model::{Collection, FhirObject, FhirPathValue};
use crate::options::{EvaluateOptions, Resolver};
use crate::registry::FunctionRegistry;

/// Per-evaluation state threaded through the tree walk.
///
/// Cloning a `Context` is cheap (an `Arc` bump plus a few small fields) —
/// every path step and function call clones and rebinds `focus`/`this` on
/// the way down rather than mutating a shared structure, matching the "born
/// and discarded per evaluation" lifecycle of spec §2.
#[derive(Clone)]
pub struct Context {
    /// Current input collection to the expression node being evaluated.
    pub focus: Collection,
    /// `$this` inside iterative function bodies; `None` at the top level.
    pub this: Option<FhirPathValue>,
    /// `$index` inside iterative function bodies.
    pub index: Option<i64>,
    /// `$total` inside `aggregate()`.
    pub total: Option<Collection>,
    variables: Arc<HashMap<String, Collection>>,
    resolver: Option<Resolver>,
    registry: Arc<FunctionRegistry>,
    deadline: Instant,
    max_depth: usize,
    max_collection_size: usize,
    cancellation: Option<crate::options::CancellationToken>,
    depth: usize,
}

impl Context {
    /// Build the root context for a fresh evaluation: focus is the
    /// singleton root resource, `%resource`/`%context`/`%ucum` are
    /// pre-seeded per the supplemented-features decision.
    pub fn new(root: FhirObject, options: &EvaluateOptions, registry: Arc<FunctionRegistry>) -> Self {
        let root_value = FhirPathValue::Object(root);
        let mut variables = options.variables.clone();
        variables
            .entry("resource".to_string())
            .or_insert_with(|| Collection::single(root_value.clone()));
        variables
            .entry("context".to_string())
            .or_insert_with(|| Collection::single(root_value.clone()));
        variables.entry("ucum".to_string()).or_insert_with(|| {
            Collection::single(FhirPathValue::String(
                "http://unitsofmeasure.org".to_string(),
            ))
        });

        Self {
            focus: Collection::single(root_value),
            this: None,
            index: None,
            total: None,
            variables: Arc::new(variables),
            resolver: options.resolver.clone(),
            registry,
            deadline: Instant::now() + options.timeout,
            max_depth: options.max_depth,
            max_collection_size: options.max_collection_size,
            cancellation: options.cancellation.clone(),
            depth: 0,
        }
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> Option<&Resolver> {
        self.resolver.as_ref()
    }

    pub fn lookup_variable(&self, name: &str) -> Option<&Collection> {
        self.variables.get(name)
    }

    /// A copy of `self` with a new focus collection, clearing `$this`/
    /// `$index`/`$total` as a bare path-step context (not an iterative one).
    pub fn with_focus(&self, focus: Collection) -> Self {
        Self {
            focus,
            this: None,
            index: None,
            total: None,
            ..self.clone()
        }
    }

    /// A copy of `self` bound to one element of an iterative function's
    /// focus: `$this` is the element, `$index` its position, focus becomes
    /// the singleton so plain navigation inside the body works as expected.
    pub fn with_iteration(&self, value: &FhirPathValue, index: i64) -> Self {
        Self {
            focus: Collection::single(value.clone()),
            this: Some(value.clone()),
            index: Some(index),
            total: self.total.clone(),
            ..self.clone()
        }
    }

    pub fn with_total(&self, total: Collection) -> Self {
        Self {
            total: Some(total),
            ..self.clone()
        }
    }

    /// Enter one level of recursion (`descendants()`, `repeat()`); fails
    /// once `max_depth` is exceeded.
    pub fn enter_recursion(&self) -> Result<Self> {
        if self.depth + 1 > self.max_depth {
            return Err(FhirPathError::limit(format!(
                "recursion depth exceeded configured maximum {}",
                self.max_depth
            )));
        }
        Ok(Self {
            depth: self.depth + 1,
            ..self.clone()
        })
    }

    /// Checked at every node entry and before each iterative-function loop
    /// iteration, per spec §5's suspension-point description.
    pub fn check_budget(&self) -> Result<()> {
        if let Some(token) = &self.cancellation {
            if token.is_cancelled() {
                return Err(FhirPathError::CancellationError);
            }
        }
        if Instant::now() >= self.deadline {
            return Err(FhirPathError::CancellationError);
        }
        Ok(())
    }

    pub fn check_collection_size(&self, len: usize) -> Result<()> {
        if self.max_collection_size != 0 && len > self.max_collection_size {
            return Err(FhirPathError::limit(format!(
                "collection size {len} exceeds configured maximum {}",
                self.max_collection_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FunctionRegistry;
    use serde_json::json;

    fn ctx() -> Context {
        let root = FhirObject::new(json!({"resourceType": "Patient"}));
        Context::new(root, &EvaluateOptions::default(), Arc::new(FunctionRegistry::standard()))
    }

    #[test]
    fn resource_and_context_variables_are_preseeded() {
        let c = ctx();
        assert!(c.lookup_variable("resource").is_some());
        assert!(c.lookup_variable("context").is_some());
        assert!(c.lookup_variable("ucum").is_some());
    }

    #[test]
    fn recursion_limit_is_enforced() {
        let mut c = ctx();
        for opt in [EvaluateOptions::default().with_max_depth(2)] {
            c = Context::new(
                FhirObject::new(json!({})),
                &opt,
                Arc::new(FunctionRegistry::standard()),
            );
        }
        let c1 = c.enter_recursion().unwrap();
        let c2 = c1.enter_recursion().unwrap();
        assert!(c2.enter_recursion().is_err());
    }
}
