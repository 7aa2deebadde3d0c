//! String functions: `startsWith`, `endsWith`, `contains`, `indexOf`,
//! `substring`, `replace`, `matches`, `replaceMatches`, `length`, `lower`,
//! `upper`, `toChars`, `trim`, `split`, `join`, `encode`, `decode`.

use regex::Regex;

use crate::error::{FhirPathError, Result};
use crate::evaluator::Context;
use crate::model::{Collection, FhirPathValue};

use super::reg;
use crate::ast::ExpressionNode;
use crate::registry::{EvalFn, FunctionRegistry};

fn focus_string(focus: &Collection) -> Result<Option<String>> {
    match focus.as_singleton() {
        None if focus.is_empty() => Ok(None),
        Some(FhirPathValue::String(s)) => Ok(Some(s.clone())),
        _ => Err(FhirPathError::type_error("expected a single String focus")),
    }
}

fn arg_string(ctx: &Context, node: &ExpressionNode, eval: EvalFn) -> Result<String> {
    match eval(node, ctx)?.as_singleton() {
        Some(FhirPathValue::String(s)) => Ok(s.clone()),
        _ => Err(FhirPathError::type_error("expected a single String argument")),
    }
}

fn arg_int(ctx: &Context, node: &ExpressionNode, eval: EvalFn) -> Result<i64> {
    match eval(node, ctx)?.as_singleton() {
        Some(FhirPathValue::Integer(n)) => Ok(*n),
        _ => Err(FhirPathError::type_error("expected a single Integer argument")),
    }
}

fn boolean(b: bool) -> Collection {
    Collection::single(FhirPathValue::Boolean(b))
}

fn string(s: impl Into<String>) -> Collection {
    Collection::single(FhirPathValue::String(s.into()))
}

pub(super) fn register(registry: &mut FunctionRegistry) {
    reg(registry, "startsWith", 1, Some(1), |ctx, focus, args, eval| {
        let Some(s) = focus_string(focus)? else {
            return Ok(Collection::empty());
        };
        Ok(boolean(s.starts_with(&arg_string(ctx, &args[0], eval)?)))
    });

    reg(registry, "endsWith", 1, Some(1), |ctx, focus, args, eval| {
        let Some(s) = focus_string(focus)? else {
            return Ok(Collection::empty());
        };
        Ok(boolean(s.ends_with(&arg_string(ctx, &args[0], eval)?)))
    });

    reg(registry, "contains", 1, Some(1), |ctx, focus, args, eval| {
        let Some(s) = focus_string(focus)? else {
            return Ok(Collection::empty());
        };
        Ok(boolean(s.contains(&arg_string(ctx, &args[0], eval)?)))
    });

    reg(registry, "indexOf", 1, Some(1), |ctx, focus, args, eval| {
        let Some(s) = focus_string(focus)? else {
            return Ok(Collection::empty());
        };
        let needle = arg_string(ctx, &args[0], eval)?;
        let index = s.find(&needle).map(|byte_pos| s[..byte_pos].chars().count() as i64);
        Ok(Collection::single(FhirPathValue::Integer(index.unwrap_or(-1))))
    });

    reg(registry, "substring", 1, Some(2), |ctx, focus, args, eval| {
        let Some(s) = focus_string(focus)? else {
            return Ok(Collection::empty());
        };
        let chars: Vec<char> = s.chars().collect();
        let start = arg_int(ctx, &args[0], eval)?;
        if start < 0 || start as usize >= chars.len() {
            return Ok(Collection::empty());
        }
        let length = match args.get(1) {
            Some(node) => arg_int(ctx, node, eval)? as usize,
            None => chars.len() - start as usize,
        };
        let end = (start as usize + length).min(chars.len());
        Ok(string(chars[start as usize..end].iter().collect::<String>()))
    });

    reg(registry, "replace", 2, Some(2), |ctx, focus, args, eval| {
        let Some(s) = focus_string(focus)? else {
            return Ok(Collection::empty());
        };
        let pattern = arg_string(ctx, &args[0], eval)?;
        let replacement = arg_string(ctx, &args[1], eval)?;
        Ok(string(s.replace(&pattern, &replacement)))
    });

    reg(registry, "matches", 1, Some(1), |ctx, focus, args, eval| {
        let Some(s) = focus_string(focus)? else {
            return Ok(Collection::empty());
        };
        let pattern = arg_string(ctx, &args[0], eval)?;
        let regex = Regex::new(&pattern)
            .map_err(|e| FhirPathError::type_error(format!("invalid regular expression: {e}")))?;
        Ok(boolean(regex.is_match(&s)))
    });

    reg(registry, "replaceMatches", 2, Some(2), |ctx, focus, args, eval| {
        let Some(s) = focus_string(focus)? else {
            return Ok(Collection::empty());
        };
        let pattern = arg_string(ctx, &args[0], eval)?;
        let replacement = arg_string(ctx, &args[1], eval)?;
        let regex = Regex::new(&pattern)
            .map_err(|e| FhirPathError::type_error(format!("invalid regular expression: {e}")))?;
        Ok(string(regex.replace_all(&s, replacement.replace('$', "$$")).into_owned()))
    });

    reg(registry, "length", 0, Some(0), |_ctx, focus, _args, _eval| {
        let Some(s) = focus_string(focus)? else {
            return Ok(Collection::empty());
        };
        Ok(Collection::single(FhirPathValue::Integer(s.chars().count() as i64)))
    });

    reg(registry, "lower", 0, Some(0), |_ctx, focus, _args, _eval| {
        let Some(s) = focus_string(focus)? else {
            return Ok(Collection::empty());
        };
        Ok(string(s.to_lowercase()))
    });

    reg(registry, "upper", 0, Some(0), |_ctx, focus, _args, _eval| {
        let Some(s) = focus_string(focus)? else {
            return Ok(Collection::empty());
        };
        Ok(string(s.to_uppercase()))
    });

    reg(registry, "toChars", 0, Some(0), |_ctx, focus, _args, _eval| {
        let Some(s) = focus_string(focus)? else {
            return Ok(Collection::empty());
        };
        Ok(s.chars()
            .map(|c| FhirPathValue::String(c.to_string()))
            .collect())
    });

    reg(registry, "trim", 0, Some(0), |_ctx, focus, _args, _eval| {
        let Some(s) = focus_string(focus)? else {
            return Ok(Collection::empty());
        };
        Ok(string(s.trim().to_string()))
    });

    reg(registry, "split", 1, Some(1), |ctx, focus, args, eval| {
        let Some(s) = focus_string(focus)? else {
            return Ok(Collection::empty());
        };
        let sep = arg_string(ctx, &args[0], eval)?;
        if sep.is_empty() {
            return Ok(string(s));
        }
        Ok(s.split(&sep).map(|part| FhirPathValue::String(part.to_string())).collect())
    });

    reg(registry, "join", 0, Some(1), |ctx, focus, args, eval| {
        let sep = match args.first() {
            Some(node) => arg_string(ctx, node, eval)?,
            None => String::new(),
        };
        let parts: Result<Vec<String>> = focus
            .iter()
            .map(|v| match v {
                FhirPathValue::String(s) => Ok(s.clone()),
                other => Err(FhirPathError::type_error(format!(
                    "join() requires a collection of Strings, found {}",
                    other.type_name()
                ))),
            })
            .collect();
        Ok(string(parts?.join(&sep)))
    });

    reg(registry, "encode", 1, Some(1), |ctx, focus, args, eval| {
        let Some(s) = focus_string(focus)? else {
            return Ok(Collection::empty());
        };
        let format = arg_string(ctx, &args[0], eval)?;
        let encoded = match format.as_str() {
            "base64" => base64::Engine::encode(&base64::engine::general_purpose::STANDARD, s.as_bytes()),
            "hex" => hex::encode(s.as_bytes()),
            other => {
                return Err(FhirPathError::type_error(format!(
                    "unsupported encode() target '{other}'"
                )))
            }
        };
        Ok(string(encoded))
    });

    reg(registry, "decode", 1, Some(1), |ctx, focus, args, eval| {
        let Some(s) = focus_string(focus)? else {
            return Ok(Collection::empty());
        };
        let format = arg_string(ctx, &args[0], eval)?;
        let bytes = match format.as_str() {
            "base64" => base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &s)
                .map_err(|e| FhirPathError::type_error(format!("invalid base64: {e}")))?,
            "hex" => hex::decode(&s).map_err(|e| FhirPathError::type_error(format!("invalid hex: {e}")))?,
            other => {
                return Err(FhirPathError::type_error(format!(
                    "unsupported decode() source '{other}'"
                )))
            }
        };
        let text = String::from_utf8(bytes)
            .map_err(|_| FhirPathError::type_error("decoded bytes are not valid UTF-8"))?;
        Ok(string(text))
    });
}
