use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fpvtune_core::{Locale, RawResponse, ResponseExtractor, TuningHints};
use fpvtune_engine::recover::repair::parse_lenient;
use fpvtune_engine::TuneEngine;

const CANONICAL: &str = r#"{"analysis": {"summary": "Prop wash on descents", "issues": ["Pitch bounce back", "Hot motors"]}, "pid": {"roll": {"p": 52, "i": 80, "d": 45, "f": 130}, "pitch": {"p": 55, "i": 84, "d": 48, "f": 135}, "yaw": {"p": 45, "i": 80, "d": 0, "f": 120}}, "filters": {"gyro_lpf1_static_hz": 250, "dterm_lpf1_static_hz": 90}}"#;

/// A long prose report with the gains buried at the end, so every fallback pass runs.
fn synthetic_report(paragraphs: usize) -> String {
    let mut text = String::with_capacity(paragraphs * 160);
    text.push_str("## Issues\n");
    for i in 0..paragraphs {
        text.push_str(&format!(
            "- Oscillation number {i} shows up around {} Hz during punch-outs and hard turns.\n",
            100 + i % 400
        ));
    }
    text.push_str("\n## Recommendations\n- Raise D on pitch\n\n");
    text.push_str("| Axis | P | I | D | F |\n|---|---|---|---|---|\n");
    text.push_str("| Roll | 45 → 52 | 80 | 45 | 130 |\n| Pitch | 55 | 84 | 48 | 135 |\n| Yaw | 45 | 80 | 0 | 120 |\n");
    text
}

fn truncated(text: &str) -> &str {
    &text[..text.len() * 2 / 3]
}

fn bench_extract(c: &mut Criterion) {
    let engine = TuneEngine::new();
    let hints = TuningHints::default();

    let canonical = RawResponse::new(CANONICAL, Locale::En);
    c.bench_function("extract_canonical_json", |b| {
        b.iter(|| black_box(engine.extract(black_box(&canonical), &hints)));
    });

    let report = RawResponse::new(synthetic_report(2_000), Locale::En);
    c.bench_function("extract_markdown_report_2k_lines", |b| {
        b.iter(|| black_box(engine.extract(black_box(&report), &hints)));
    });
}

fn bench_repair(c: &mut Criterion) {
    let cut = truncated(CANONICAL);
    c.bench_function("parse_lenient_truncated", |b| {
        b.iter(|| black_box(parse_lenient(black_box(cut))));
    });
}

criterion_group!(extract, bench_extract, bench_repair);
criterion_main!(extract);
