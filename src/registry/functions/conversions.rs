//! `toBoolean`, `toInteger`, `toDecimal`, `toString`, `toDate`,
//! `toDateTime`, `toTime`, `toQuantity([unit])`, and the matching
//! `convertsToX` predicates.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::model::{Collection, FhirPathValue, PartialDateTime, Quantity};

use super::reg;
use crate::registry::FunctionRegistry;

fn try_to_boolean(v: &FhirPathValue) -> Option<bool> {
    match v {
        FhirPathValue::Boolean(b) => Some(*b),
        FhirPathValue::String(s) => match s.to_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" | "1.0" => Some(true),
            "false" | "f" | "no" | "n" | "0" | "0.0" => Some(false),
            _ => None,
        },
        FhirPathValue::Integer(1) => Some(true),
        FhirPathValue::Integer(0) => Some(false),
        _ => None,
    }
}

fn try_to_integer(v: &FhirPathValue) -> Option<i64> {
    match v {
        FhirPathValue::Integer(n) => Some(*n),
        FhirPathValue::String(s) => s.trim().parse().ok(),
        FhirPathValue::Boolean(b) => Some(if *b { 1 } else { 0 }),
        _ => None,
    }
}

fn try_to_decimal(v: &FhirPathValue) -> Option<Decimal> {
    match v {
        FhirPathValue::Decimal(d) => Some(*d),
        FhirPathValue::Integer(n) => Some(Decimal::from(*n)),
        FhirPathValue::String(s) => Decimal::from_str(s.trim()).ok(),
        FhirPathValue::Boolean(b) => Some(if *b { Decimal::ONE } else { Decimal::ZERO }),
        _ => None,
    }
}

fn try_to_date(v: &FhirPathValue) -> Option<PartialDateTime> {
    match v {
        FhirPathValue::Date(d) | FhirPathValue::DateTime(d) => Some(*d),
        FhirPathValue::String(s) => PartialDateTime::parse(s).ok(),
        _ => None,
    }
}

fn try_to_time(v: &FhirPathValue) -> Option<PartialDateTime> {
    match v {
        FhirPathValue::Time(t) => Some(*t),
        FhirPathValue::String(s) => PartialDateTime::parse(s.trim_start_matches('T')).ok(),
        _ => None,
    }
}

fn try_to_quantity(v: &FhirPathValue, unit: Option<&str>) -> Option<Quantity> {
    let base = match v {
        FhirPathValue::Quantity(q) => q.clone(),
        FhirPathValue::Integer(n) => Quantity::new(Decimal::from(*n), None),
        FhirPathValue::Decimal(d) => Quantity::new(*d, None),
        FhirPathValue::String(s) => {
            let trimmed = s.trim();
            if let Some((value, unit)) = trimmed.split_once(' ') {
                Quantity::new(Decimal::from_str(value).ok()?, Some(unit.trim_matches('\'').to_string()))
            } else {
                Quantity::new(Decimal::from_str(trimmed).ok()?, None)
            }
        }
        _ => return None,
    };
    match unit {
        Some(unit) if base.unit.is_none() => Some(Quantity::new(base.value, Some(unit.to_string()))),
        _ => Some(base),
    }
}

pub(super) fn register(registry: &mut FunctionRegistry) {
    reg(registry, "toBoolean", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(focus
            .as_singleton()
            .and_then(try_to_boolean)
            .map(FhirPathValue::Boolean)
            .map(Collection::single)
            .unwrap_or_else(Collection::empty))
    });

    reg(registry, "convertsToBoolean", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(predicate(focus, |v| try_to_boolean(v).is_some()))
    });

    reg(registry, "toInteger", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(focus
            .as_singleton()
            .and_then(try_to_integer)
            .map(FhirPathValue::Integer)
            .map(Collection::single)
            .unwrap_or_else(Collection::empty))
    });

    reg(registry, "convertsToInteger", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(predicate(focus, |v| try_to_integer(v).is_some()))
    });

    reg(registry, "toDecimal", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(focus
            .as_singleton()
            .and_then(try_to_decimal)
            .map(FhirPathValue::Decimal)
            .map(Collection::single)
            .unwrap_or_else(Collection::empty))
    });

    reg(registry, "convertsToDecimal", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(predicate(focus, |v| try_to_decimal(v).is_some()))
    });

    reg(registry, "toString", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(focus
            .as_singleton()
            .map(|v| FhirPathValue::String(v.to_string()))
            .map(Collection::single)
            .unwrap_or_else(Collection::empty))
    });

    reg(registry, "convertsToString", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(predicate(focus, |_| true))
    });

    reg(registry, "toDate", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(focus
            .as_singleton()
            .and_then(try_to_date)
            .map(FhirPathValue::Date)
            .map(Collection::single)
            .unwrap_or_else(Collection::empty))
    });

    reg(registry, "convertsToDate", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(predicate(focus, |v| try_to_date(v).is_some()))
    });

    reg(registry, "toDateTime", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(focus
            .as_singleton()
            .and_then(try_to_date)
            .map(FhirPathValue::DateTime)
            .map(Collection::single)
            .unwrap_or_else(Collection::empty))
    });

    reg(registry, "convertsToDateTime", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(predicate(focus, |v| try_to_date(v).is_some()))
    });

    reg(registry, "toTime", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(focus
            .as_singleton()
            .and_then(try_to_time)
            .map(FhirPathValue::Time)
            .map(Collection::single)
            .unwrap_or_else(Collection::empty))
    });

    reg(registry, "convertsToTime", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(predicate(focus, |v| try_to_time(v).is_some()))
    });

    reg(registry, "toQuantity", 0, Some(1), |ctx, focus, args, eval| {
        let unit = match args.first() {
            Some(node) => match eval(node, ctx)?.as_singleton() {
                Some(FhirPathValue::String(s)) => Some(s.clone()),
                _ => None,
            },
            None => None,
        };
        Ok(focus
            .as_singleton()
            .and_then(|v| try_to_quantity(v, unit.as_deref()))
            .map(FhirPathValue::Quantity)
            .map(Collection::single)
            .unwrap_or_else(Collection::empty))
    });

    reg(registry, "convertsToQuantity", 0, Some(1), |_ctx, focus, _args, _eval| {
        Ok(predicate(focus, |v| try_to_quantity(v, None).is_some()))
    });
}

fn predicate(focus: &Collection, f: impl Fn(&FhirPathValue) -> bool) -> Collection {
    match focus.as_singleton() {
        Some(v) => Collection::single(FhirPathValue::Boolean(f(v))),
        None => Collection::empty(),
    }
}
