//! `union(other)`, `combine(other)`, `intersect(other)`, `exclude(other)`.

use crate::model::{Collection, FhirPathValue};

use super::reg;
use crate::registry::FunctionRegistry;

pub(super) fn register(registry: &mut FunctionRegistry) {
    reg(registry, "union", 1, Some(1), |ctx, focus, args, eval| {
        let other = eval(&args[0], ctx)?;
        Ok(dedup_concat(focus, &other))
    });

    reg(registry, "combine", 1, Some(1), |ctx, focus, args, eval| {
        let other = eval(&args[0], ctx)?;
        Ok(focus.concat(&other))
    });

    reg(registry, "intersect", 1, Some(1), |ctx, focus, args, eval| {
        let other = eval(&args[0], ctx)?;
        let mut out: Vec<FhirPathValue> = Vec::new();
        for value in focus.iter() {
            let in_other = other.iter().any(|o| o.equals(value) == Some(true));
            let already = out.iter().any(|existing| existing.equals(value) == Some(true));
            if in_other && !already {
                out.push(value.clone());
            }
        }
        Ok(Collection::from_vec(out))
    });

    reg(registry, "exclude", 1, Some(1), |ctx, focus, args, eval| {
        let other = eval(&args[0], ctx)?;
        Ok(focus
            .iter()
            .filter(|value| !other.iter().any(|o| o.equals(value) == Some(true)))
            .cloned()
            .collect())
    });
}

fn dedup_concat(a: &Collection, b: &Collection) -> Collection {
    let mut out: Vec<FhirPathValue> = Vec::new();
    for value in a.iter().chain(b.iter()) {
        if !out.iter().any(|existing| existing.equals(value) == Some(true)) {
            out.push(value.clone());
        }
    }
    Collection::from_vec(out)
}
