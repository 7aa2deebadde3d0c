//! `trace([name])`, `children()`, `descendants()`, `iif(cond, then[,
//! else])`, `resolve()`.

use crate::error::FhirPathError;
use crate::evaluator::tri_state::Tribool;
use crate::model::{Collection, FhirPathValue};

use super::reg;
use crate::registry::FunctionRegistry;

fn direct_children(value: &FhirPathValue) -> Vec<FhirPathValue> {
    let FhirPathValue::Object(obj) = value else {
        return Vec::new();
    };
    let Some(map) = obj.json().as_object() else {
        return Vec::new();
    };
    map.iter()
        .filter(|(key, _)| key.as_str() != "resourceType")
        .flat_map(|(_, json)| obj.expand(json))
        .map(|json| FhirPathValue::from_json(json, None))
        .collect()
}

pub(super) fn register(registry: &mut FunctionRegistry) {
    reg(registry, "trace", 0, Some(2), |ctx, focus, args, eval| {
        let name = match args.first() {
            Some(node) => match eval(node, ctx)?.as_singleton() {
                Some(FhirPathValue::String(s)) => s.clone(),
                _ => "trace".to_string(),
            },
            None => "trace".to_string(),
        };
        let traced = match args.get(1) {
            Some(node) => eval(node, ctx)?,
            None => focus.clone(),
        };
        log::debug!("trace({name}): {} element(s): {:?}", traced.len(), traced.to_json());
        Ok(focus.clone())
    });

    reg(registry, "children", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(focus.iter().flat_map(direct_children).collect())
    });

    reg(registry, "descendants", 0, Some(0), |ctx, focus, _args, _eval| {
        let mut out = Vec::new();
        let mut frontier: Vec<FhirPathValue> = focus.iter().cloned().collect();
        let mut rec_ctx = ctx.clone();
        while !frontier.is_empty() {
            rec_ctx = rec_ctx.enter_recursion()?;
            rec_ctx.check_budget()?;
            let mut next = Vec::new();
            for value in &frontier {
                next.extend(direct_children(value));
            }
            out.extend(next.iter().cloned());
            frontier = next;
        }
        let result = Collection::from_vec(out);
        ctx.check_collection_size(result.len())?;
        Ok(result)
    });

    reg(registry, "iif", 2, Some(3), |ctx, _focus, args, eval| {
        let condition = Tribool::from_collection(&eval(&args[0], ctx)?);
        match condition {
            Tribool::True => eval(&args[1], ctx),
            _ => match args.get(2) {
                Some(node) => eval(node, ctx),
                None => Ok(Collection::empty()),
            },
        }
    });

    reg(registry, "resolve", 0, Some(0), |ctx, focus, _args, _eval| {
        let Some(resolver) = ctx.resolver() else {
            return Ok(Collection::empty());
        };
        let mut out = Vec::new();
        for value in focus.iter() {
            let FhirPathValue::String(reference) = value else {
                return Err(FhirPathError::type_error("resolve() requires String references"));
            };
            out.extend(resolver(reference)?.iter().cloned());
        }
        Ok(Collection::from_vec(out))
    });
}
