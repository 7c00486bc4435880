use criterion::{criterion_group, criterion_main, Criterion};
use plp::{
    codegen::{classfile::ClassFileEmitter, listing::Listing},
    driver,
    util::intern::Interner,
};
use std::hint::black_box;

static INPUTS: &[(&str, &str)] = &[
    ("bounce", include_str!("../../demos/bounce.plp")),
    ("gradient", include_str!("../../demos/gradient.plp")),
];

fn criterion_benchmark(c: &mut Criterion) {
    for (name, src) in INPUTS {
        c.bench_function(&format!("compile {name} to listing"), |b| {
            b.iter(|| {
                let mut interner = Interner::with_capacity(16);
                let compiled = driver::compile(black_box(src), "demo.plp", &mut interner, Listing::new());
                _ = black_box(compiled);
            });
        });
        c.bench_function(&format!("compile {name} to class"), |b| {
            b.iter(|| {
                let mut interner = Interner::with_capacity(16);
                let compiled =
                    driver::compile(black_box(src), "demo.plp", &mut interner, ClassFileEmitter::new());
                _ = black_box(compiled);
            });
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
