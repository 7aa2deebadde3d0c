//! `first()`, `last()`, `tail()`, `take(n)`, `skip(n)`, `single()`.

use crate::error::FhirPathError;
use crate::model::{Collection, FhirPathValue};

use super::reg;
use crate::registry::FunctionRegistry;

pub(super) fn register(registry: &mut FunctionRegistry) {
    reg(registry, "first", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(focus
            .iter()
            .next()
            .cloned()
            .map(Collection::single)
            .unwrap_or_else(Collection::empty))
    });

    reg(registry, "last", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(focus
            .iter()
            .last()
            .cloned()
            .map(Collection::single)
            .unwrap_or_else(Collection::empty))
    });

    reg(registry, "tail", 0, Some(0), |_ctx, focus, _args, _eval| {
        if focus.is_empty() {
            return Ok(Collection::empty());
        }
        Ok(focus.iter().skip(1).cloned().collect())
    });

    reg(registry, "take", 1, Some(1), |ctx, focus, args, eval| {
        let n = eval_count(ctx, args, eval)?;
        Ok(focus.iter().take(n.max(0) as usize).cloned().collect())
    });

    reg(registry, "skip", 1, Some(1), |ctx, focus, args, eval| {
        let n = eval_count(ctx, args, eval)?;
        Ok(focus.iter().skip(n.max(0) as usize).cloned().collect())
    });

    reg(registry, "single", 0, Some(0), |_ctx, focus, _args, _eval| {
        match focus.len() {
            0 => Ok(Collection::empty()),
            1 => Ok(focus.clone()),
            n => Err(FhirPathError::singleton(format!(
                "single() requires exactly one element, got {n}"
            ))),
        }
    });
}

fn eval_count(
    ctx: &crate::evaluator::Context,
    args: &[crate::ast::ExpressionNode],
    eval: crate::registry::EvalFn,
) -> crate::error::Result<i64> {
    let arg = eval(&args[0], ctx)?;
    match arg.as_singleton() {
        Some(FhirPathValue::Integer(n)) => Ok(*n),
        _ => Err(FhirPathError::type_error("expected a single Integer argument")),
    }
}
