//! `now`, `today`, `timeOfDay`, and the date/time component accessors
//! `year`, `month`, `day`, `hour`, `minute`, `second`, `millisecond`.

use chrono::{Datelike, Timelike};

use crate::model::{Collection, FhirPathValue, PartialDateTime, Precision};

use super::reg;
use crate::registry::FunctionRegistry;

fn now_as_partial() -> PartialDateTime {
    let now = chrono::Local::now();
    PartialDateTime {
        precision: Precision::Millisecond,
        year: now.year(),
        month: now.month(),
        day: now.day(),
        hour: now.hour(),
        minute: now.minute(),
        second: now.second(),
        millisecond: now.timestamp_subsec_millis(),
        offset_minutes: Some(now.offset().local_minus_utc() / 60),
    }
}

fn component(focus: &Collection, f: impl Fn(&PartialDateTime) -> Option<i64>) -> Collection {
    match focus.as_singleton() {
        Some(FhirPathValue::Date(d) | FhirPathValue::DateTime(d) | FhirPathValue::Time(d)) => {
            f(d).map(FhirPathValue::Integer).map(Collection::single).unwrap_or_else(Collection::empty)
        }
        _ => Collection::empty(),
    }
}

pub(super) fn register(registry: &mut FunctionRegistry) {
    reg(registry, "now", 0, Some(0), |_ctx, _focus, _args, _eval| {
        Ok(Collection::single(FhirPathValue::DateTime(now_as_partial())))
    });

    reg(registry, "today", 0, Some(0), |_ctx, _focus, _args, _eval| {
        let mut d = now_as_partial();
        d.precision = Precision::Day;
        Ok(Collection::single(FhirPathValue::Date(d)))
    });

    reg(registry, "timeOfDay", 0, Some(0), |_ctx, _focus, _args, _eval| {
        Ok(Collection::single(FhirPathValue::Time(now_as_partial())))
    });

    reg(registry, "year", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(component(focus, |d| {
            (d.precision >= Precision::Year).then_some(d.year as i64)
        }))
    });

    reg(registry, "month", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(component(focus, |d| {
            (d.precision >= Precision::Month).then_some(d.month as i64)
        }))
    });

    reg(registry, "day", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(component(focus, |d| {
            (d.precision >= Precision::Day).then_some(d.day as i64)
        }))
    });

    reg(registry, "hour", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(component(focus, |d| {
            (d.precision >= Precision::Hour).then_some(d.hour as i64)
        }))
    });

    reg(registry, "minute", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(component(focus, |d| {
            (d.precision >= Precision::Minute).then_some(d.minute as i64)
        }))
    });

    reg(registry, "second", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(component(focus, |d| {
            (d.precision >= Precision::Second).then_some(d.second as i64)
        }))
    });

    reg(registry, "millisecond", 0, Some(0), |_ctx, focus, _args, _eval| {
        Ok(component(focus, |d| {
            (d.precision >= Precision::Millisecond).then_some(d.millisecond as i64)
        }))
    });
}
