//! Built-in function families, one module per spec §4.4 grouping.

use std::sync::Arc;

use crate::ast::ExpressionNode;
use crate::error::Result;
use crate::evaluator::Context;
use crate::model::Collection;

use super::function::{ClosureFunction, EvalFn, FunctionRegistry};

mod aggregate;
mod combining;
mod conversions;
mod existence;
mod filtering;
mod math;
mod string;
mod subsetting;
mod temporal;
mod utility;

pub(crate) fn register_all(registry: &mut FunctionRegistry) {
    existence::register(registry);
    filtering::register(registry);
    subsetting::register(registry);
    combining::register(registry);
    string::register(registry);
    math::register(registry);
    aggregate::register(registry);
    conversions::register(registry);
    temporal::register(registry);
    utility::register(registry);
}

/// Registers one closure-backed function; shared by every family module so
/// each built-in reads as `name, arity, body` instead of a struct.
pub(super) fn reg<F>(
    registry: &mut FunctionRegistry,
    name: &'static str,
    min_arity: usize,
    max_arity: Option<usize>,
    body: F,
) where
    F: Fn(&Context, &Collection, &[ExpressionNode], EvalFn) -> Result<Collection> + Send + Sync + 'static,
{
    registry.register(Arc::new(ClosureFunction::new(name, min_arity, max_arity, body)));
}

/// Best-effort recovery of a bare or dotted type name from a function
/// argument written as a type specifier (`ofType(FHIR.Quantity)`), since
/// the parser has no separate type-specifier grammar — `ofType`'s argument
/// parses as an ordinary identifier/path expression.
pub(super) fn extract_type_name(node: &ExpressionNode) -> Option<String> {
    match node {
        ExpressionNode::Identifier { name, .. } => Some(name.clone()),
        ExpressionNode::Path { step, .. } => extract_type_name(step),
        _ => None,
    }
}
