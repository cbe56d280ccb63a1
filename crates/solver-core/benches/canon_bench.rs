// SPDX-License-Identifier: MIT OR Apache-2.0
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use solver_core::{canonical_bytes, ids, Intent, IntentInputs, JobType, SafeReportInputs};
use std::collections::BTreeMap;

fn sample_intent() -> Intent {
    let mut data = BTreeMap::new();
    for i in 0..64 {
        data.insert(format!("key_{i:02}"), serde_json::json!(format!("value_{i}")));
    }

    Intent {
        intent_version: "0.1.0".into(),
        intent_id: None,
        requester: "0xabc0000000000000000000000000000000000f".into(),
        created_at: "2026-01-01T00:00:00.000Z".parse().unwrap(),
        expires_at: None,
        job_type: JobType::SafeReport,
        inputs: IntentInputs::SafeReport(SafeReportInputs { subject: "Quarterly summary".into(), data }),
        constraints: None,
        acceptance_criteria: None,
        meta: None,
    }
}

fn bench_canonical_bytes_intent(c: &mut Criterion) {
    let intent = sample_intent();
    c.bench_function("canonical_bytes/intent_64_keys", |b| b.iter(|| canonical_bytes(black_box(&intent)).unwrap()));
}

fn bench_intent_id(c: &mut Criterion) {
    let intent = sample_intent();
    c.bench_function("ids::intent_id", |b| {
        b.iter(|| {
            ids::intent_id(
                black_box(&intent.intent_version),
                black_box(&intent.requester),
                black_box(&intent.job_type),
                black_box(&intent.inputs),
                black_box(intent.constraints.as_ref()),
            )
            .unwrap()
        })
    });
}

fn bench_sha256_hex(c: &mut Criterion) {
    let bytes = vec![0xABu8; 4096];
    c.bench_function("ids::sha256_hex/4kb", |b| b.iter(|| ids::sha256_hex(black_box(&bytes))));
}

criterion_group!(benches, bench_canonical_bytes_intent, bench_intent_id, bench_sha256_hex);
criterion_main!(benches);
