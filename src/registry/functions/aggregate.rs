//! `sum`, `min`, `max`, `avg`, `aggregate(init, accumulator)`.

use rust_decimal::Decimal;

use crate::error::{FhirPathError, Result};
use crate::model::{Collection, FhirPathValue};

use super::reg;
use crate::registry::FunctionRegistry;

fn as_decimal(v: &FhirPathValue) -> Result<Decimal> {
    match v {
        FhirPathValue::Integer(n) => Ok(Decimal::from(*n)),
        FhirPathValue::Decimal(d) => Ok(*d),
        other => Err(FhirPathError::type_error(format!(
            "expected a numeric element, found {}",
            other.type_name()
        ))),
    }
}

pub(super) fn register(registry: &mut FunctionRegistry) {
    reg(registry, "sum", 0, Some(0), |_ctx, focus, _args, _eval| {
        if focus.is_empty() {
            return Ok(Collection::empty());
        }
        let mut total = Decimal::ZERO;
        let mut all_integer = true;
        for v in focus.iter() {
            total += as_decimal(v)?;
            all_integer &= matches!(v, FhirPathValue::Integer(_));
        }
        Ok(Collection::single(to_numeric(total, all_integer)))
    });

    reg(registry, "min", 0, Some(0), |_ctx, focus, _args, _eval| {
        fold_extreme(focus, std::cmp::Ordering::Less)
    });

    reg(registry, "max", 0, Some(0), |_ctx, focus, _args, _eval| {
        fold_extreme(focus, std::cmp::Ordering::Greater)
    });

    reg(registry, "avg", 0, Some(0), |_ctx, focus, _args, _eval| {
        if focus.is_empty() {
            return Ok(Collection::empty());
        }
        let mut total = Decimal::ZERO;
        for v in focus.iter() {
            total += as_decimal(v)?;
        }
        Ok(Collection::single(FhirPathValue::Decimal(
            total / Decimal::from(focus.len() as i64),
        )))
    });

    // Signature is `aggregate(init, accumulator)`: args[0] seeds $total,
    // args[1] is evaluated per element with $total bound to the running
    // value.
    reg(registry, "aggregate", 2, Some(2), |ctx, focus, args, eval| {
        let mut total = eval(&args[0], ctx)?;
        for (i, value) in focus.iter().enumerate() {
            ctx.check_budget()?;
            let iter_ctx = ctx.with_iteration(value, i as i64).with_total(total.clone());
            total = eval(&args[1], &iter_ctx)?;
        }
        Ok(total)
    });
}

fn to_numeric(total: Decimal, all_integer: bool) -> FhirPathValue {
    if all_integer {
        if let Some(n) = rust_decimal::prelude::ToPrimitive::to_i64(&total) {
            return FhirPathValue::Integer(n);
        }
    }
    FhirPathValue::Decimal(total)
}

fn fold_extreme(focus: &Collection, want: std::cmp::Ordering) -> Result<Collection> {
    let mut best: Option<&FhirPathValue> = None;
    for value in focus.iter() {
        match best {
            None => best = Some(value),
            Some(current) => {
                let cmp = value
                    .partial_cmp(current)
                    .ok_or_else(|| FhirPathError::type_error("elements are not mutually comparable"))?;
                if cmp == want {
                    best = Some(value);
                }
            }
        }
    }
    Ok(best.cloned().map(Collection::single).unwrap_or_else(Collection::empty))
}
