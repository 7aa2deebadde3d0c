//! `abs`, `ceiling`, `floor`, `truncate`, `round([precision])`, `exp`,
//! `ln`, `log(base)`, `power(exp)`, `sqrt`.
//!
//! Transcendental functions round-trip through `f64`; precision of this
//! subsystem is implementation-defined, matching the spec's own caveat
//! about composed-unit arithmetic precision.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::error::{FhirPathError, Result};
use crate::model::{Collection, FhirPathValue};

use super::reg;
use crate::registry::FunctionRegistry;

fn focus_decimal(focus: &Collection) -> Result<Option<Decimal>> {
    match focus.as_singleton() {
        None if focus.is_empty() => Ok(None),
        Some(FhirPathValue::Integer(n)) => Ok(Some(Decimal::from(*n))),
        Some(FhirPathValue::Decimal(d)) => Ok(Some(*d)),
        _ => Err(FhirPathError::type_error("expected a single numeric focus")),
    }
}

fn decimal(d: Decimal) -> Collection {
    Collection::single(FhirPathValue::Decimal(d))
}

fn via_f64(d: Decimal, f: impl Fn(f64) -> f64) -> Result<Decimal> {
    let input = d.to_f64().ok_or_else(|| FhirPathError::ArithmeticError("value out of range".to_string()))?;
    Decimal::from_f64(f(input))
        .ok_or_else(|| FhirPathError::ArithmeticError("result out of range".to_string()))
}

pub(super) fn register(registry: &mut FunctionRegistry) {
    reg(registry, "abs", 0, Some(0), |_ctx, focus, _args, _eval| {
        let Some(d) = focus_decimal(focus)? else {
            return Ok(Collection::empty());
        };
        Ok(decimal(d.abs()))
    });

    reg(registry, "ceiling", 0, Some(0), |_ctx, focus, _args, _eval| {
        let Some(d) = focus_decimal(focus)? else {
            return Ok(Collection::empty());
        };
        Ok(Collection::single(FhirPathValue::Integer(
            d.ceil().to_i64().unwrap_or_default(),
        )))
    });

    reg(registry, "floor", 0, Some(0), |_ctx, focus, _args, _eval| {
        let Some(d) = focus_decimal(focus)? else {
            return Ok(Collection::empty());
        };
        Ok(Collection::single(FhirPathValue::Integer(
            d.floor().to_i64().unwrap_or_default(),
        )))
    });

    reg(registry, "truncate", 0, Some(0), |_ctx, focus, _args, _eval| {
        let Some(d) = focus_decimal(focus)? else {
            return Ok(Collection::empty());
        };
        Ok(Collection::single(FhirPathValue::Integer(
            d.trunc().to_i64().unwrap_or_default(),
        )))
    });

    reg(registry, "round", 0, Some(1), |ctx, focus, args, eval| {
        let Some(d) = focus_decimal(focus)? else {
            return Ok(Collection::empty());
        };
        let precision = match args.first() {
            Some(node) => match eval(node, ctx)?.as_singleton() {
                Some(FhirPathValue::Integer(n)) => *n as u32,
                _ => return Err(FhirPathError::type_error("round() precision must be an Integer")),
            },
            None => 0,
        };
        Ok(decimal(d.round_dp(precision)))
    });

    reg(registry, "exp", 0, Some(0), |_ctx, focus, _args, _eval| {
        let Some(d) = focus_decimal(focus)? else {
            return Ok(Collection::empty());
        };
        Ok(decimal(via_f64(d, f64::exp)?))
    });

    reg(registry, "ln", 0, Some(0), |_ctx, focus, _args, _eval| {
        let Some(d) = focus_decimal(focus)? else {
            return Ok(Collection::empty());
        };
        Ok(decimal(via_f64(d, f64::ln)?))
    });

    reg(registry, "log", 1, Some(1), |ctx, focus, args, eval| {
        let Some(d) = focus_decimal(focus)? else {
            return Ok(Collection::empty());
        };
        let base = match eval(&args[0], ctx)?.as_singleton() {
            Some(FhirPathValue::Integer(n)) => *n as f64,
            Some(FhirPathValue::Decimal(b)) => b.to_f64().unwrap_or(std::f64::consts::E),
            _ => return Err(FhirPathError::type_error("log() base must be numeric")),
        };
        Ok(decimal(via_f64(d, |x| x.log(base))?))
    });

    reg(registry, "power", 1, Some(1), |ctx, focus, args, eval| {
        let Some(d) = focus_decimal(focus)? else {
            return Ok(Collection::empty());
        };
        let exponent = match eval(&args[0], ctx)?.as_singleton() {
            Some(FhirPathValue::Integer(n)) => *n as f64,
            Some(FhirPathValue::Decimal(e)) => e.to_f64().unwrap_or(1.0),
            _ => return Err(FhirPathError::type_error("power() exponent must be numeric")),
        };
        Ok(decimal(via_f64(d, |x| x.powf(exponent))?))
    });

    reg(registry, "sqrt", 0, Some(0), |_ctx, focus, _args, _eval| {
        let Some(d) = focus_decimal(focus)? else {
            return Ok(Collection::empty());
        };
        if d.is_sign_negative() {
            return Ok(Collection::empty());
        }
        Ok(decimal(via_f64(d, f64::sqrt)?))
    });
}
