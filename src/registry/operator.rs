//! Binary and unary operator evaluation over `Collection`s.
//!
//! Three-valued logic (`and`/`or`/`xor`/`implies`) is delegated to
//! [`crate::evaluator::tri_state::Tribool`]; everything else lives here.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::ast::{BinaryOp, UnaryOp};
use crate::error::{FhirPathError, Result};
use crate::evaluator::tri_state::Tribool;
use crate::model::{Collection, FhirPathValue};

/// Operators that propagate empty: if either operand is empty, the result
/// is empty, without a type or arithmetic error (spec §8's universal
/// property).
fn propagates_empty(op: BinaryOp) -> bool {
    matches!(
        op,
        BinaryOp::Add
            | BinaryOp::Subtract
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::Div
            | BinaryOp::Mod
            | BinaryOp::Less
            | BinaryOp::LessOrEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterOrEqual
            | BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::Equivalent
            | BinaryOp::NotEquivalent
            | BinaryOp::In
            | BinaryOp::Contains
    )
}

pub fn evaluate_binary(op: BinaryOp, lhs: &Collection, rhs: &Collection) -> Result<Collection> {
    match op {
        BinaryOp::And => {
            return Ok(Tribool::from_collection(lhs)
                .and(Tribool::from_collection(rhs))
                .to_collection())
        }
        BinaryOp::Or => {
            return Ok(Tribool::from_collection(lhs)
                .or(Tribool::from_collection(rhs))
                .to_collection())
        }
        BinaryOp::Xor => {
            return Ok(Tribool::from_collection(lhs)
                .xor(Tribool::from_collection(rhs))
                .to_collection())
        }
        BinaryOp::Implies => {
            return Ok(Tribool::from_collection(lhs)
                .implies(Tribool::from_collection(rhs))
                .to_collection())
        }
        BinaryOp::Concat => return Ok(concat(lhs, rhs)),
        BinaryOp::Union => return Ok(union(lhs, rhs)),
        _ => {}
    }

    if propagates_empty(op) && (lhs.is_empty() || rhs.is_empty()) {
        return Ok(Collection::empty());
    }

    match op {
        BinaryOp::In => return Ok(membership(lhs, rhs)?),
        BinaryOp::Contains => return Ok(membership(rhs, lhs)?),
        // Collection equality/equivalence compares element-wise across the
        // whole collection, so these must run before the singleton
        // extraction below — a >1-element operand is a legitimate input,
        // not a SingletonError.
        BinaryOp::Equal => {
            return Ok(lhs
                .equals(rhs)
                .map(FhirPathValue::Boolean)
                .map(Collection::single)
                .unwrap_or_else(Collection::empty))
        }
        BinaryOp::NotEqual => {
            return Ok(lhs
                .equals(rhs)
                .map(|b| FhirPathValue::Boolean(!b))
                .map(Collection::single)
                .unwrap_or_else(Collection::empty))
        }
        BinaryOp::Equivalent => {
            return Ok(Collection::single(FhirPathValue::Boolean(lhs.equivalent(rhs))))
        }
        BinaryOp::NotEquivalent => {
            return Ok(Collection::single(FhirPathValue::Boolean(!lhs.equivalent(rhs))))
        }
        _ => {}
    }

    let a = singleton(lhs, op)?;
    let b = singleton(rhs, op)?;

    let result = match op {
        BinaryOp::Add => arithmetic_add(a, b)?,
        BinaryOp::Subtract => arithmetic_subtract(a, b)?,
        BinaryOp::Multiply => arithmetic_multiply(a, b)?,
        BinaryOp::Divide => arithmetic_divide(a, b)?,
        BinaryOp::Div => integer_div(a, b)?,
        BinaryOp::Mod => integer_mod(a, b)?,
        BinaryOp::Less => compare(a, b, op)?,
        BinaryOp::LessOrEqual => compare(a, b, op)?,
        BinaryOp::Greater => compare(a, b, op)?,
        BinaryOp::GreaterOrEqual => compare(a, b, op)?,
        BinaryOp::Equal
        | BinaryOp::NotEqual
        | BinaryOp::Equivalent
        | BinaryOp::NotEquivalent
        | BinaryOp::In
        | BinaryOp::Contains
        | BinaryOp::And
        | BinaryOp::Or
        | BinaryOp::Xor
        | BinaryOp::Implies
        | BinaryOp::Concat
        | BinaryOp::Union => {
            unreachable!("handled above")
        }
    };
    Ok(Collection::single(result))
}

pub fn evaluate_unary(op: UnaryOp, operand: &Collection) -> Result<Collection> {
    if operand.is_empty() {
        return Ok(Collection::empty());
    }
    let value = singleton(operand, BinaryOp::Add)?;
    let result = match (op, value) {
        (UnaryOp::Plus, FhirPathValue::Integer(_) | FhirPathValue::Decimal(_) | FhirPathValue::Quantity(_)) => {
            value.clone()
        }
        (UnaryOp::Negate, FhirPathValue::Integer(n)) => FhirPathValue::Integer(-n),
        (UnaryOp::Negate, FhirPathValue::Decimal(d)) => FhirPathValue::Decimal(-d),
        (UnaryOp::Negate, FhirPathValue::Quantity(q)) => {
            FhirPathValue::Quantity(q.multiply_scalar(Decimal::NEGATIVE_ONE))
        }
        _ => {
            return Err(FhirPathError::type_error(format!(
                "unary operator cannot be applied to {}",
                value.type_name()
            )))
        }
    };
    Ok(Collection::single(result))
}

fn singleton(c: &Collection, op: BinaryOp) -> Result<&FhirPathValue> {
    c.as_singleton().ok_or_else(|| {
        FhirPathError::singleton(format!(
            "operator '{op:?}' requires a single-valued operand, got {} elements",
            c.len()
        ))
    })
}

fn concat(lhs: &Collection, rhs: &Collection) -> Collection {
    let a = as_string_or_empty(lhs);
    let b = as_string_or_empty(rhs);
    Collection::single(FhirPathValue::String(format!("{a}{b}")))
}

fn as_string_or_empty(c: &Collection) -> String {
    match c.as_singleton() {
        Some(value) => value.to_string(),
        None => String::new(),
    }
}

fn union(lhs: &Collection, rhs: &Collection) -> Collection {
    let mut out: Vec<FhirPathValue> = Vec::new();
    for value in lhs.iter().chain(rhs.iter()) {
        let duplicate = out.iter().any(|existing| existing.equals(value) == Some(true));
        if !duplicate {
            out.push(value.clone());
        }
    }
    Collection::from_vec(out)
}

fn membership(needle: &Collection, haystack: &Collection) -> Result<Collection> {
    let value = singleton(needle, BinaryOp::In)?;
    let found = haystack.iter().any(|v| v.equals(value) == Some(true));
    Ok(Collection::single(FhirPathValue::Boolean(found)))
}

fn arithmetic_add(a: &FhirPathValue, b: &FhirPathValue) -> Result<FhirPathValue> {
    match (a, b) {
        (FhirPathValue::Integer(x), FhirPathValue::Integer(y)) => Ok(FhirPathValue::Integer(x + y)),
        (FhirPathValue::String(x), FhirPathValue::String(y)) => {
            Ok(FhirPathValue::String(format!("{x}{y}")))
        }
        (FhirPathValue::Quantity(x), FhirPathValue::Quantity(y)) => {
            Ok(FhirPathValue::Quantity(x.add(y)?))
        }
        _ => {
            let (x, y) = as_decimals(a, b)?;
            Ok(FhirPathValue::Decimal(x + y))
        }
    }
}

fn arithmetic_subtract(a: &FhirPathValue, b: &FhirPathValue) -> Result<FhirPathValue> {
    match (a, b) {
        (FhirPathValue::Integer(x), FhirPathValue::Integer(y)) => Ok(FhirPathValue::Integer(x - y)),
        (FhirPathValue::Quantity(x), FhirPathValue::Quantity(y)) => {
            Ok(FhirPathValue::Quantity(x.subtract(y)?))
        }
        _ => {
            let (x, y) = as_decimals(a, b)?;
            Ok(FhirPathValue::Decimal(x - y))
        }
    }
}

fn arithmetic_multiply(a: &FhirPathValue, b: &FhirPathValue) -> Result<FhirPathValue> {
    match (a, b) {
        (FhirPathValue::Integer(x), FhirPathValue::Integer(y)) => Ok(FhirPathValue::Integer(x * y)),
        (FhirPathValue::Quantity(x), FhirPathValue::Quantity(y)) => {
            Ok(FhirPathValue::Quantity(x.multiply(y)))
        }
        _ => {
            let (x, y) = as_decimals(a, b)?;
            Ok(FhirPathValue::Decimal(x * y))
        }
    }
}

fn arithmetic_divide(a: &FhirPathValue, b: &FhirPathValue) -> Result<FhirPathValue> {
    if let (FhirPathValue::Quantity(x), FhirPathValue::Quantity(y)) = (a, b) {
        return Ok(FhirPathValue::Quantity(x.divide(y)?));
    }
    let (x, y) = as_decimals(a, b)?;
    if y.is_zero() {
        return Err(FhirPathError::ArithmeticError("division by zero".to_string()));
    }
    Ok(FhirPathValue::Decimal(x / y))
}

fn integer_div(a: &FhirPathValue, b: &FhirPathValue) -> Result<FhirPathValue> {
    let (x, y) = as_decimals(a, b)?;
    if y.is_zero() {
        return Err(FhirPathError::ArithmeticError("division by zero".to_string()));
    }
    (x / y)
        .trunc()
        .to_i64()
        .map(FhirPathValue::Integer)
        .ok_or_else(|| FhirPathError::ArithmeticError("'div' result overflowed Integer".to_string()))
}

fn integer_mod(a: &FhirPathValue, b: &FhirPathValue) -> Result<FhirPathValue> {
    let (x, y) = as_decimals(a, b)?;
    if y.is_zero() {
        return Err(FhirPathError::ArithmeticError("division by zero".to_string()));
    }
    (x % y)
        .trunc()
        .to_i64()
        .map(FhirPathValue::Integer)
        .ok_or_else(|| FhirPathError::ArithmeticError("'mod' result overflowed Integer".to_string()))
}

fn as_decimals(a: &FhirPathValue, b: &FhirPathValue) -> Result<(Decimal, Decimal)> {
    let to_decimal = |v: &FhirPathValue| -> Result<Decimal> {
        match v {
            FhirPathValue::Integer(n) => Ok(Decimal::from(*n)),
            FhirPathValue::Decimal(d) => Ok(*d),
            other => Err(FhirPathError::type_error(format!(
                "expected a numeric operand, got {}",
                other.type_name()
            ))),
        }
    };
    Ok((to_decimal(a)?, to_decimal(b)?))
}

fn compare(a: &FhirPathValue, b: &FhirPathValue, op: BinaryOp) -> Result<FhirPathValue> {
    let Some(ordering) = a.partial_cmp(b) else {
        return Err(FhirPathError::type_error(format!(
            "'{op:?}' is undefined between {} and {}",
            a.type_name(),
            b.type_name()
        )));
    };
    use std::cmp::Ordering::*;
    let result = match op {
        BinaryOp::Less => ordering == Less,
        BinaryOp::LessOrEqual => ordering != Greater,
        BinaryOp::Greater => ordering == Greater,
        BinaryOp::GreaterOrEqual => ordering != Less,
        _ => unreachable!(),
    };
    Ok(FhirPathValue::Boolean(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    fn int(n: i64) -> Collection {
        Collection::single(FhirPathValue::Integer(n))
    }

    #[test]
    fn integer_plus_integer_is_integer() {
        let result = evaluate_binary(BinaryOp::Add, &int(2), &int(3)).unwrap();
        assert!(matches!(result.as_singleton(), Some(FhirPathValue::Integer(5))));
    }

    #[test]
    fn divide_always_produces_decimal() {
        let result = evaluate_binary(BinaryOp::Divide, &int(4), &int(2)).unwrap();
        assert!(matches!(result.as_singleton(), Some(FhirPathValue::Decimal(_))));
    }

    #[test]
    fn empty_propagates_through_arithmetic() {
        let result = evaluate_binary(BinaryOp::Add, &Collection::empty(), &int(1)).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn concat_treats_empty_as_empty_string() {
        let result = evaluate_binary(BinaryOp::Concat, &Collection::empty(), &int(1)).unwrap();
        assert_eq!(result.as_singleton(), Some(&FhirPathValue::String("1".to_string())));
    }

    #[test]
    fn division_by_zero_is_arithmetic_error() {
        let err = evaluate_binary(BinaryOp::Divide, &int(1), &int(0)).unwrap_err();
        assert_eq!(err.kind(), "ArithmeticError");
    }

    #[test]
    fn union_removes_duplicates_preserving_first_occurrence_order() {
        let a = Collection::from_vec(vec![FhirPathValue::Integer(1), FhirPathValue::Integer(2)]);
        let b = Collection::from_vec(vec![FhirPathValue::Integer(2), FhirPathValue::Integer(3)]);
        let result = union(&a, &b);
        let nums: Vec<i64> = result
            .iter()
            .map(|v| match v {
                FhirPathValue::Integer(n) => *n,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(nums, vec![1, 2, 3]);
    }

    #[test]
    fn decimal_equality_is_exact_via_rust_decimal() {
        let d = FhirPathValue::Decimal(Decimal::from_str("1.50").unwrap());
        let i = FhirPathValue::Decimal(Decimal::from_str("1.5").unwrap());
        assert_eq!(d.equals(&i), Some(true));
    }

    fn dec(s: &str) -> Collection {
        Collection::single(FhirPathValue::Decimal(Decimal::from_str(s).unwrap()))
    }

    #[rstest]
    #[case(BinaryOp::Equal, 2, "2.0", true)]
    #[case(BinaryOp::Equal, 2, "2.01", false)]
    #[case(BinaryOp::NotEqual, 2, "2.01", true)]
    #[case(BinaryOp::Less, 2, "2.01", true)]
    #[case(BinaryOp::Less, 2, "2.0", false)]
    #[case(BinaryOp::LessOrEqual, 2, "2.0", true)]
    #[case(BinaryOp::Greater, 3, "2.99", true)]
    #[case(BinaryOp::GreaterOrEqual, 2, "2.0", true)]
    fn scalar_comparison_table(
        #[case] op: BinaryOp,
        #[case] integer: i64,
        #[case] decimal: &str,
        #[case] expected: bool,
    ) {
        let result = evaluate_binary(op, &int(integer), &dec(decimal)).unwrap();
        assert_eq!(result.as_singleton(), Some(&FhirPathValue::Boolean(expected)));
    }
}
