//! `empty()`, `exists()`, `all()`, `allTrue()`/`anyTrue()`/`allFalse()`/
//! `anyFalse()`, `count()`, `distinct()`, `isDistinct()`.

use crate::evaluator::tri_state::Tribool;
use crate::model::{Collection, FhirPathValue};

use super::reg;
use crate::registry::FunctionRegistry;

pub(super) fn register(registry: &mut FunctionRegistry) {
    reg(registry, "empty", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(Collection::single(FhirPathValue::Boolean(focus.is_empty())))
    });

    reg(registry, "exists", 0, Some(1), |ctx, focus, args, eval| {
        if args.is_empty() {
            return Ok(Collection::single(FhirPathValue::Boolean(!focus.is_empty())));
        }
        for (i, value) in focus.iter().enumerate() {
            ctx.check_budget()?;
            let iter_ctx = ctx.with_iteration(value, i as i64);
            if Tribool::from_collection(&eval(&args[0], &iter_ctx)?) == Tribool::True {
                return Ok(Collection::single(FhirPathValue::Boolean(true)));
            }
        }
        Ok(Collection::single(FhirPathValue::Boolean(false)))
    });

    reg(registry, "all", 1, Some(1), |ctx, focus, args, eval| {
        let mut result = Tribool::True;
        for (i, value) in focus.iter().enumerate() {
            ctx.check_budget()?;
            let iter_ctx = ctx.with_iteration(value, i as i64);
            let this = Tribool::from_collection(&eval(&args[0], &iter_ctx)?);
            result = result.and(this);
        }
        Ok(result.to_collection())
    });

    reg(registry, "allTrue", 0, Some(0), |_ctx, focus, _args, _eval| {
        let all_true = focus.iter().all(|v| matches!(v, FhirPathValue::Boolean(true)));
        Ok(Collection::single(FhirPathValue::Boolean(all_true)))
    });

    reg(registry, "anyTrue", 0, Some(0), |_ctx, focus, _args, _eval| {
        let any_true = focus.iter().any(|v| matches!(v, FhirPathValue::Boolean(true)));
        Ok(Collection::single(FhirPathValue::Boolean(any_true)))
    });

    reg(registry, "allFalse", 0, Some(0), |_ctx, focus, _args, _eval| {
        let all_false = focus.iter().all(|v| matches!(v, FhirPathValue::Boolean(false)));
        Ok(Collection::single(FhirPathValue::Boolean(all_false)))
    });

    reg(registry, "anyFalse", 0, Some(0), |_ctx, focus, _args, _eval| {
        let any_false = focus.iter().any(|v| matches!(v, FhirPathValue::Boolean(false)));
        Ok(Collection::single(FhirPathValue::Boolean(any_false)))
    });

    reg(registry, "count", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(Collection::single(FhirPathValue::Integer(focus.len() as i64)))
    });

    reg(registry, "distinct", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(dedup(focus))
    });

    reg(registry, "isDistinct", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(Collection::single(FhirPathValue::Boolean(
            dedup(focus).len() == focus.len(),
        )))
    });
}

fn dedup(focus: &Collection) -> Collection {
    let mut out: Vec<FhirPathValue> = Vec::new();
    for value in focus.iter() {
        if !out.iter().any(|existing| existing.equals(value) == Some(true)) {
            out.push(value.clone());
        }
    }
    Collection::from_vec(out)
}
