//! Benchmarks for config file parsing and value resolution.

#![allow(clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use oslocfg_core::{ConfigOpts, IniDocument, Opt};
use std::hint::black_box;

fn sample_text(sections: usize, keys: usize) -> String {
    let mut text = String::from("# generated\n[DEFAULT]\nstate_path = /var/lib/demo\n\n");
    for s in 0..sections {
        text.push_str(&format!("[section{}]\n", s));
        for k in 0..keys {
            text.push_str(&format!("key{} = value {} of {}\n", k, k, s));
        }
        text.push_str("multi = first\n  continued\n\n");
    }
    text
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("ini_parse");

    for (label, sections, keys) in [("small", 2, 10), ("medium", 20, 50), ("large", 100, 100)] {
        let text = sample_text(sections, keys);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", label), &text, |b, t| {
            b.iter(|| IniDocument::parse(black_box(t)).unwrap());
        });
    }

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let mut conf = ConfigOpts::new();
    conf.register_opt(Opt::string("state-path").default_value("/var/lib/demo"), None)
        .unwrap();
    conf.register_opt(Opt::string("lock-path").default_value("$state_path/lock"), None)
        .unwrap();
    conf.register_opt(Opt::integer("workers").default_value(4), None)
        .unwrap();

    c.bench_function("resolve_default", |b| {
        b.iter(|| conf.get_int(None, black_box("workers")).unwrap());
    });
    c.bench_function("resolve_template", |b| {
        b.iter(|| conf.get_str(None, black_box("lock_path")).unwrap());
    });
}

criterion_group!(benches, bench_parse, bench_resolve);
criterion_main!(benches);
