//! `where()`, `select()`, `repeat()`, `ofType()`.

use crate::evaluator::tri_state::Tribool;
use crate::model::Collection;

use super::{extract_type_name, reg};
use crate::registry::FunctionRegistry;

pub(super) fn register(registry: &mut FunctionRegistry) {
    reg(registry, "where", 1, Some(1), |ctx, focus, args, eval| {
        let mut out = Vec::new();
        for (i, value) in focus.iter().enumerate() {
            ctx.check_budget()?;
            let iter_ctx = ctx.with_iteration(value, i as i64);
            if Tribool::from_collection(&eval(&args[0], &iter_ctx)?) == Tribool::True {
                out.push(value.clone());
            }
        }
        Ok(Collection::from_vec(out))
    });

    reg(registry, "select", 1, Some(1), |ctx, focus, args, eval| {
        let mut out = Vec::new();
        for (i, value) in focus.iter().enumerate() {
            ctx.check_budget()?;
            let iter_ctx = ctx.with_iteration(value, i as i64);
            out.extend(eval(&args[0], &iter_ctx)?.iter().cloned());
        }
        let result = Collection::from_vec(out);
        ctx.check_collection_size(result.len())?;
        Ok(result)
    });

    reg(registry, "repeat", 1, Some(1), |ctx, focus, args, eval| {
        // `seen` dedups across the seed and every generation so a cycle
        // back to an already-produced element doesn't loop forever, but
        // the seed itself is excluded from `collected` — repeat() returns
        // only the projected descendants, not the starting focus.
        let mut seen: Vec<_> = focus.iter().cloned().collect();
        let mut collected = Vec::new();
        let mut frontier = focus.clone();
        let mut rec_ctx = ctx.clone();
        loop {
            rec_ctx = rec_ctx.enter_recursion()?;
            let mut next = Vec::new();
            for (i, value) in frontier.iter().enumerate() {
                rec_ctx.check_budget()?;
                let iter_ctx = rec_ctx.with_iteration(value, i as i64);
                for produced in eval(&args[0], &iter_ctx)?.iter() {
                    if !seen.iter().any(|s| s.equals(produced) == Some(true)) {
                        seen.push(produced.clone());
                        collected.push(produced.clone());
                        next.push(produced.clone());
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = Collection::from_vec(next);
        }
        let result = Collection::from_vec(collected);
        ctx.check_collection_size(result.len())?;
        Ok(result)
    });

    reg(registry, "ofType", 1, Some(1), |_ctx, focus, args, _eval| {
        let Some(target) = extract_type_name(&args[0]) else {
            return Ok(Collection::empty());
        };
        Ok(focus
            .iter()
            .filter(|v| v.type_name() == target)
            .cloned()
            .collect())
    });
}
