//! Demangling throughput benchmarks.
//!
//! Symbol decoding sits on the hot path of crash symbolication, where
//! a single log can carry tens of thousands of manglings, so both
//! directions and the free-text scanner are measured.

use criterion::{
    black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput,
};
use kea_demangle::{scan_line, ToolOptions};
use kea_mangle::{
    demangle_required, demangle_symbol_as_string, mangle_node, DemangleOptions, ManglingFlavor,
};

/// Plain function, the most common shape in a symbol table.
const SIMPLE: &str = "$s4main3fooyyF";

/// Generic function with a protocol-constrained signature.
const GENERIC: &str = "$s4main4sortyySayxGSLRzlF";

/// Optimizer-produced specialization record.
const SPECIALIZED: &str = "$s4main3fooyySiFTfq4pi42_n";

/// Property accessor under a class subscript.
const ACCESSOR: &str = "$s4main3BoxCyS2icig";

/// A function taking a tuple of `width` stdlib integers.
fn tuple_symbol(width: usize) -> String {
    let mut symbol = String::from("$s4main3fooyySi_");
    for _ in 1..width {
        symbol.push_str("Si");
    }
    symbol.push_str("tF");
    symbol
}

fn bench_demangle_vectors(c: &mut Criterion) {
    let options = DemangleOptions::default();
    for (name, symbol) in [
        ("simple_function", SIMPLE),
        ("generic_function", GENERIC),
        ("specialization", SPECIALIZED),
        ("subscript_accessor", ACCESSOR),
    ] {
        c.bench_function(&format!("demangle/{name}"), |b| {
            b.iter(|| black_box(demangle_symbol_as_string(black_box(symbol), &options)));
        });
    }
}

fn bench_demangle_scaling(c: &mut Criterion) {
    let options = DemangleOptions::default();
    let mut group = c.benchmark_group("demangle/tuple_width");
    for width in &[4usize, 16, 64, 256] {
        let symbol = tuple_symbol(*width);
        group.throughput(Throughput::Bytes(symbol.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &symbol, |b, symbol| {
            b.iter(|| black_box(demangle_symbol_as_string(black_box(symbol), &options)));
        });
    }
    group.finish();
}

fn bench_remangle(c: &mut Criterion) {
    let demangled = demangle_required(GENERIC);
    c.bench_function("remangle/generic_function", |b| {
        b.iter(|| {
            match mangle_node(&demangled.arena, demangled.root, ManglingFlavor::Default) {
                Ok(symbol) => black_box(symbol),
                Err(err) => panic!("benchmark symbol did not remangle: {err}"),
            }
        });
    });
}

fn bench_scan_line(c: &mut Criterion) {
    let options = ToolOptions::default();
    let line = format!("0x00007fff  {SIMPLE} + 124  ({GENERIC})  in frame 3");
    c.bench_function("scan/crash_log_line", |b| {
        b.iter(|| black_box(scan_line(black_box(&line), &options)));
    });
}

criterion_group!(
    benches,
    bench_demangle_vectors,
    bench_demangle_scaling,
    bench_remangle,
    bench_scan_line
);
criterion_main!(benches);
