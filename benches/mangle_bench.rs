//! Benchmarks for symbol mangling and binding lookups

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rustjni::ffi::mangle::{demangle, long_symbol, short_symbol};
use rustjni::ffi::{LibraryLoader, MethodSignature, NativeDecl, Registry};

const HOST_CLASS: &str = "com.devfigas.rustjni.sample.MainActivity";

/// Benchmark short and long symbol construction
fn bench_mangle(c: &mut Criterion) {
    let mut group = c.benchmark_group("mangle");

    let sig = MethodSignature::parse("(ILjava/lang/String;[B)Z").unwrap();
    group.bench_function("short_symbol", |b| {
        b.iter(|| black_box(short_symbol(black_box(HOST_CLASS), "sayHello")))
    });
    group.bench_function("long_symbol", |b| {
        b.iter(|| black_box(long_symbol(black_box(HOST_CLASS), "process_data", &sig)))
    });
    group.bench_function("non_ascii", |b| {
        b.iter(|| black_box(short_symbol("com.example.Caf\u{e9}$Inner", "m\u{e9}thode")))
    });

    group.finish();
}

fn bench_demangle(c: &mut Criterion) {
    let symbol = "Java_com_example_Example_f__Ljava_lang_String_2_3I";
    c.bench_function("demangle_long", |b| {
        b.iter(|| black_box(demangle(black_box(symbol))))
    });
}

/// Benchmark descriptor parsing for growing parameter lists
fn bench_descriptor_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("descriptor_parse");

    for &params in &[0usize, 4, 16, 64] {
        let descriptor = format!("({})V", "Ljava/lang/String;".repeat(params));
        group.throughput(Throughput::Elements(params as u64));
        group.bench_function(format!("{}_params", params), |b| {
            b.iter(|| black_box(MethodSignature::parse(black_box(&descriptor))))
        });
    }

    group.finish();
}

/// Lookup of an already settled registry entry
fn bench_registry_require(c: &mut Criterion) {
    let registry = Registry::with_loader(LibraryLoader::empty());
    let _ = registry.load_library("rustjni_bench_missing");

    c.bench_function("registry_require", |b| {
        b.iter(|| black_box(registry.require(black_box("rustjni_bench_missing"))))
    });

    let decl = NativeDecl::parse_jni(HOST_CLASS, "sayHello", "()Ljava/lang/String;").unwrap();
    c.bench_function("decl_symbols", |b| b.iter(|| black_box(decl.symbols())));
}

criterion_group!(
    benches,
    bench_mangle,
    bench_demangle,
    bench_descriptor_parse,
    bench_registry_require
);
criterion_main!(benches);
