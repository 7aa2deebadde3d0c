use criterion::{black_box, criterion_group, criterion_main, Criterion};
use octofhir_fhirpath::{compile, evaluate, evaluate_with_options, options::EvaluateOptions};
use serde_json::json;

fn patient() -> serde_json::Value {
    json!({
        "resourceType": "Patient",
        "active": true,
        "name": [
            {"use": "official", "family": "Chalmers", "given": ["Peter", "James"]},
            {"use": "usual", "given": ["Jim"]}
        ],
        "birthDate": "1974-12-25"
    })
}

fn observation() -> serde_json::Value {
    json!({
        "resourceType": "Observation",
        "status": "final",
        "component": [
            {"code": {"text": "systolic"}, "valueQuantity": {"value": 120, "unit": "mmHg"}},
            {"code": {"text": "diastolic"}, "valueQuantity": {"value": 80, "unit": "mmHg"}}
        ]
    })
}

fn bench_lex_and_parse(c: &mut Criterion) {
    c.bench_function("compile simple path", |b| {
        b.iter(|| compile(black_box("Patient.name.where(use = 'official').family")).unwrap())
    });
}

fn bench_evaluate_uncached(c: &mut Criterion) {
    c.bench_function("evaluate simple path (parse + run)", |b| {
        b.iter(|| evaluate(black_box(patient()), "name.given").unwrap())
    });
}

fn bench_evaluate_compiled(c: &mut Criterion) {
    let expr = compile("name.where(use = 'official').family").unwrap();
    c.bench_function("evaluate pre-compiled expression", |b| {
        b.iter(|| expr.evaluate(black_box(patient())).unwrap())
    });
}

fn bench_aggregate_quantities(c: &mut Criterion) {
    let expr = compile("component.value.value.sum()").unwrap();
    c.bench_function("aggregate observation components", |b| {
        b.iter(|| expr.evaluate(black_box(observation())).unwrap())
    });
}

fn bench_with_options(c: &mut Criterion) {
    let options = EvaluateOptions::default();
    c.bench_function("evaluate with explicit options", |b| {
        b.iter(|| evaluate_with_options(black_box(patient()), "name.given.count()", &options).unwrap())
    });
}

criterion_group!(
    benches,
    bench_lex_and_parse,
    bench_evaluate_uncached,
    bench_evaluate_compiled,
    bench_aggregate_quantities,
    bench_with_options
);
criterion_main!(benches);
