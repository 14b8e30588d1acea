use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;
use std::hint::black_box;
use todo_ai::services::recommendation::parse_recommendations;

fn benchmark_parse_recommendations(c: &mut Criterion) {
    let entries: Vec<_> = (0..5)
        .map(|i| {
            json!({
                "title": format!("How to get task {} done", i),
                "link": format!("https://example.com/guides/{}", i)
            })
        })
        .collect();
    let plain = serde_json::Value::Array(entries).to_string();
    let fenced = format!("```json\n{}\n```", plain);

    // Mixed valid and malformed entries
    let noisy = json!([
        { "title": "A", "link": "https://a.example" },
        { "title": "missing link" },
        "stray text",
        { "title": "x".repeat(400), "link": "y".repeat(900) }
    ])
    .to_string();

    let mut group = c.benchmark_group("parse_recommendations");

    group.bench_function("plain_array", |b| {
        b.iter(|| parse_recommendations(black_box(&plain)))
    });

    group.bench_function("code_fenced", |b| {
        b.iter(|| parse_recommendations(black_box(&fenced)))
    });

    group.bench_function("noisy_entries", |b| {
        b.iter(|| parse_recommendations(black_box(&noisy)))
    });

    group.bench_function("not_json", |b| {
        b.iter(|| parse_recommendations(black_box("Sorry, I cannot help with that.")))
    });

    group.finish();
}

criterion_group!(benches, benchmark_parse_recommendations);
criterion_main!(benches);
