//! The tree-walking evaluator.

use crate::ast::{ExpressionNode, Literal, TypeOp};
use crate::error::{FhirPathError, Result};
use crate::model::{Collection, FhirPathValue, PartialDateTime, Quantity};
use crate::registry::{evaluate_binary, evaluate_unary};

use super::context::Context;

/// Evaluate one AST node against `ctx`, producing the resulting Collection.
///
/// This is also handed down into function calls as the `eval` callback
/// (its signature matches [`crate::registry::EvalFn`] exactly), so lazy
/// functions can re-enter the walker per element of their focus.
pub fn eval_node(node: &ExpressionNode, ctx: &Context) -> Result<Collection> {
    ctx.check_budget()?;
    let result = match node {
        ExpressionNode::Literal { value, .. } => eval_literal(value)?,
        ExpressionNode::Identifier { name, .. } => eval_identifier(name, ctx)?,
        ExpressionNode::This(_) => ctx
            .this
            .clone()
            .map(Collection::single)
            .unwrap_or_else(|| ctx.focus.clone()),
        ExpressionNode::Index(_) => ctx
            .index
            .map(FhirPathValue::Integer)
            .map(Collection::single)
            .unwrap_or_else(Collection::empty),
        ExpressionNode::Total(_) => ctx.total.clone().unwrap_or_else(Collection::empty),
        ExpressionNode::Variable { name, .. } => ctx
            .lookup_variable(name)
            .cloned()
            .ok_or_else(|| FhirPathError::UnknownVariable(name.clone()))?,
        ExpressionNode::Path { base, step, .. } => {
            let base_result = eval_node(base, ctx)?;
            let step_ctx = ctx.with_focus(base_result);
            eval_node(step, &step_ctx)?
        }
        ExpressionNode::Indexer { base, index, .. } => {
            let base_result = eval_node(base, ctx)?;
            let index_result = eval_node(index, ctx)?;
            eval_indexer(&base_result, &index_result)?
        }
        ExpressionNode::FunctionCall { name, args, .. } => eval_function_call(name, args, ctx)?,
        ExpressionNode::Unary { op, operand, .. } => {
            let value = eval_node(operand, ctx)?;
            evaluate_unary(*op, &value)?
        }
        ExpressionNode::Binary { op, lhs, rhs, .. } => {
            let left = eval_node(lhs, ctx)?;
            let right = eval_node(rhs, ctx)?;
            evaluate_binary(*op, &left, &right)?
        }
        ExpressionNode::TypeExpr {
            op,
            operand,
            target,
            ..
        } => {
            let value = eval_node(operand, ctx)?;
            eval_type_expr(*op, &value, &target.name)?
        }
        ExpressionNode::Parenthesized { inner, .. } => eval_node(inner, ctx)?,
    };
    ctx.check_collection_size(result.len())?;
    Ok(result)
}

fn eval_literal(literal: &Literal) -> Result<Collection> {
    let value = match literal {
        Literal::Boolean(b) => FhirPathValue::Boolean(*b),
        Literal::Integer(n) => FhirPathValue::Integer(*n),
        Literal::Decimal(s) => FhirPathValue::Decimal(
            s.parse()
                .map_err(|_| FhirPathError::type_error(format!("invalid decimal literal '{s}'")))?,
        ),
        Literal::String(s) => FhirPathValue::String(s.clone()),
        Literal::Date(s) => FhirPathValue::Date(PartialDateTime::parse(s)?),
        Literal::DateTime(s) => FhirPathValue::DateTime(PartialDateTime::parse(s)?),
        Literal::Time(s) => FhirPathValue::Time(PartialDateTime::parse(s.trim_start_matches('T'))?),
        Literal::Quantity { value, unit } => FhirPathValue::Quantity(Quantity::new(
            value
                .parse()
                .map_err(|_| FhirPathError::type_error(format!("invalid quantity value '{value}'")))?,
            Some(unit.clone()),
        )),
        Literal::Empty => return Ok(Collection::empty()),
    };
    Ok(Collection::single(value))
}

/// Maps a polymorphic `value[x]` suffix to the type hint `FhirPathValue::
/// from_json` expects, so e.g. `valueDate` becomes a `Date`, not a bare
/// `String`.
fn suffix_type_hint(suffix: &str) -> Option<&'static str> {
    Some(match suffix {
        "Boolean" => "boolean",
        "Integer" | "PositiveInt" | "UnsignedInt" => "integer",
        "Decimal" => "decimal",
        "Date" => "date",
        "DateTime" | "Instant" => "dateTime",
        "Time" => "time",
        _ => return None,
    })
}

fn eval_identifier(name: &str, ctx: &Context) -> Result<Collection> {
    let mut out = Vec::new();
    for value in ctx.focus.iter() {
        match value {
            FhirPathValue::Quantity(q) => match name {
                "value" => out.push(FhirPathValue::Decimal(q.value)),
                "unit" | "code" => {
                    if let Some(unit) = &q.unit {
                        out.push(FhirPathValue::String(unit.clone()));
                    }
                }
                _ => {}
            },
            FhirPathValue::Object(obj) => {
                if obj.type_name() == Some(name) {
                    out.push(value.clone());
                    continue;
                }
                if name == "value" {
                    for (suffix, json) in obj.resolve_polymorphic("value") {
                        let hint = suffix_type_hint(suffix);
                        for expanded in obj.expand(json) {
                            out.push(FhirPathValue::from_json(expanded, hint));
                        }
                    }
                } else if let Some(json) = obj.get(name) {
                    for expanded in obj.expand(json) {
                        out.push(FhirPathValue::from_json(expanded, None));
                    }
                }
            }
            _ => {}
        }
    }
    Ok(Collection::from_vec(out))
}

fn eval_indexer(base: &Collection, index: &Collection) -> Result<Collection> {
    match index.as_singleton() {
        Some(FhirPathValue::Integer(i)) => {
            if *i < 0 {
                return Ok(Collection::empty());
            }
            Ok(base
                .as_slice()
                .get(*i as usize)
                .cloned()
                .map(Collection::single)
                .unwrap_or_else(Collection::empty))
        }
        Some(_) => Err(FhirPathError::type_error("index operand must be an Integer")),
        None if index.is_empty() => Ok(Collection::empty()),
        None => Err(FhirPathError::singleton(
            "index operand must be a single Integer",
        )),
    }
}

fn eval_function_call(name: &str, args: &[ExpressionNode], ctx: &Context) -> Result<Collection> {
    ctx.registry().check_arity(name, args.len())?;
    let function = ctx
        .registry()
        .get(name)
        .ok_or_else(|| FhirPathError::UnknownFunction(name.to_string()))?;
    function.call(ctx, &ctx.focus, args, &eval_node)
}

fn eval_type_expr(op: TypeOp, value: &Collection, target_name: &str) -> Result<Collection> {
    if value.is_empty() {
        return Ok(Collection::empty());
    }
    let singleton = value.as_singleton().ok_or_else(|| {
        FhirPathError::singleton("'is'/'as' require a single-valued operand")
    })?;
    let matches = singleton.type_name() == target_name;
    match op {
        TypeOp::Is => Ok(Collection::single(FhirPathValue::Boolean(matches))),
        TypeOp::As => Ok(if matches {
            Collection::single(singleton.clone())
        } else {
            Collection::empty()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FhirObject;
    use crate::options::EvaluateOptions;
    use crate::parser::parse;
    use crate::registry::FunctionRegistry;
    use serde_json::json;
    use std::sync::Arc;

    fn eval(source: &str, resource: serde_json::Value) -> Result<Collection> {
        let node = parse(source)?;
        let ctx = Context::new(
            FhirObject::new(resource),
            &EvaluateOptions::default(),
            Arc::new(FunctionRegistry::standard()),
        );
        eval_node(&node, &ctx)
    }

    #[test]
    fn resource_type_prefix_is_noop() {
        let result = eval("Patient.active", json!({"resourceType": "Patient", "active": true})).unwrap();
        assert!(matches!(result.as_singleton(), Some(FhirPathValue::Boolean(true))));
    }

    #[test]
    fn path_navigation_flattens_arrays() {
        let result = eval(
            "Patient.name.given",
            json!({
                "resourceType": "Patient",
                "name": [{"given": ["John", "James"]}, {"given": ["Johnny"]}]
            }),
        )
        .unwrap();
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn polymorphic_value_resolution() {
        let result = eval(
            "component.value.value",
            json!({
                "resourceType": "Observation",
                "component": [{"valueQuantity": {"value": 120, "unit": "mmHg"}}]
            }),
        )
        .unwrap();
        assert!(matches!(result.as_singleton(), Some(FhirPathValue::Decimal(_) | FhirPathValue::Integer(_))));
    }

    #[test]
    fn indexer_out_of_range_is_empty() {
        let result = eval(
            "Patient.name[5]",
            json!({"resourceType": "Patient", "name": [{"family": "Doe"}]}),
        )
        .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn iif_is_lazy_and_does_not_evaluate_unused_branch() {
        let result = eval(
            "iif(true, 'yes', 1/0)",
            json!({"resourceType": "Patient"}),
        )
        .unwrap();
        assert_eq!(result.as_singleton(), Some(&FhirPathValue::String("yes".to_string())));
    }

    #[test]
    fn unknown_function_is_an_error() {
        let err = eval("notAFunction()", json!({})).unwrap_err();
        assert_eq!(err.kind(), "UnknownFunction");
    }
}
