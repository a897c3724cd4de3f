//! Configuration-path benchmarks
//!
//! Session caches compare configurations on every lookup, so clone and
//! matches are the hot paths worth watching alongside keyed construction
//! and the digest primitive used for cache keys.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vtls::engine::openssl::OpensslEngine;
use vtls::engine::Engine;
use vtls::TlsConfig;

fn bench_from_pairs(c: &mut Criterion) {
    c.bench_function("config_from_pairs", |b| {
        b.iter(|| {
            TlsConfig::from_pairs(black_box([
                ("tls-version", Some("TLSv1.2")),
                ("verify-peer", Some("1")),
                ("verify-host", Some("1")),
                ("ca-path", Some("/etc/ssl/certs")),
                ("cipher-list", Some("HIGH:!aNULL")),
                ("connect-timeout-ms", Some("30000")),
            ]))
            .unwrap()
        })
    });
}

fn bench_clone_and_matches(c: &mut Criterion) {
    let config = TlsConfig::builder()
        .ca_path("/etc/ssl/certs")
        .ca_file("/etc/ssl/ca.pem")
        .cipher_list("HIGH:!aNULL")
        .build();

    c.bench_function("config_clone", |b| b.iter(|| black_box(&config).clone()));

    let other = config.clone();
    c.bench_function("config_matches", |b| {
        b.iter(|| black_box(&config).matches(black_box(&other)))
    });
}

fn bench_digest(c: &mut Criterion) {
    let input = vec![0xa5u8; 1024];
    let mut output = [0u8; 16];
    c.bench_function("engine_digest_1k", |b| {
        b.iter(|| {
            OpensslEngine
                .digest(black_box(&input), black_box(&mut output))
                .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_from_pairs,
    bench_clone_and_matches,
    bench_digest
);
criterion_main!(benches);
