//! Session token hot paths: minting on login and verification on every
//! protected request.
//!
//! Run: `cargo bench --bench token_benchmarks`

use criterion::{criterion_group, criterion_main, Criterion};
use research_core::auth::{CredentialSet, FailedAttemptLedger, TokenSigner};
use std::hint::black_box;

const SECRET: &str = "bench-secret";
const FAR_FUTURE: i64 = 4_102_444_800;

fn bench_mint(c: &mut Criterion) {
    let signer = TokenSigner::new(SECRET);
    c.bench_function("token_mint", |b| {
        b.iter(|| signer.mint(black_box("admin"), black_box(FAR_FUTURE)));
    });
}

fn bench_verify(c: &mut Criterion) {
    let signer = TokenSigner::new(SECRET);
    let valid = signer.mint("admin", FAR_FUTURE);
    let mut forged = valid.clone();
    forged.pop();
    forged.push('0');

    let mut group = c.benchmark_group("token_verify");
    group.bench_function("valid", |b| {
        b.iter(|| signer.verify(black_box(&valid)));
    });
    group.bench_function("forged", |b| {
        b.iter(|| signer.verify(black_box(&forged)));
    });
    group.bench_function("garbage", |b| {
        b.iter(|| signer.verify(black_box("not-a-token")));
    });
    group.finish();
}

fn bench_credentials(c: &mut Criterion) {
    let entries: Vec<String> = (0..64).map(|i| format!("user{i}:pass{i}")).collect();
    let set = CredentialSet::parse(&entries);
    c.bench_function("credential_match", |b| {
        b.iter(|| set.matches(black_box("user63"), black_box("pass63")));
    });
}

fn bench_ledger(c: &mut Criterion) {
    let ledger = FailedAttemptLedger::new(5, 900);
    c.bench_function("ledger_check_and_record", |b| {
        let mut now = 0_i64;
        b.iter(|| {
            now += 1;
            let status = ledger.check_at(black_box("203.0.113.5"), now);
            ledger.record_failure_at("203.0.113.5", now);
            status
        });
    });
}

criterion_group!(benches, bench_mint, bench_verify, bench_credentials, bench_ledger);
criterion_main!(benches);
