//! Benchmark: parse-only vs full build (imports, merge, resolution) on a
//! generated three-file project with a few hundred entities.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use defwrangler::{load_def_file, parse};
use std::fmt::Write as _;
use tempfile::TempDir;

fn generate_base(enums: usize) -> String {
    let mut src = String::new();
    for i in 0..enums {
        writeln!(src, "enum Kind{} {{ A, B, C, D = 100, E }}", i).unwrap();
    }
    src.push_str("message Header { field id: int field stamp: float }\n");
    src
}

fn generate_main(messages: usize) -> String {
    let mut src = String::from("import \"base.def\" as Base\n");
    for i in 0..messages {
        writeln!(
            src,
            r#"
message Msg{i} : Base::Header {{
    /// Generated message body.
    field kind: Base::Kind{k}
    field mode: enum {{ IDLE, ACTIVE, FAULT }}
    field tags: string[]
    field index: Map<string, int>
    field note: optional string = "none"
}}"#,
            i = i,
            k = i % 50
        )
        .unwrap();
    }
    src
}

fn bench_build_model(c: &mut Criterion) {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("base.def"), generate_base(50)).expect("write base");
    let main_path = dir.path().join("main.def");
    let main_src = generate_main(100);
    std::fs::write(&main_path, &main_src).expect("write main");

    c.bench_function("parse_only_100_messages", |b| {
        b.iter(|| {
            let tree = parse(black_box(&main_src)).expect("parse");
            black_box(tree)
        });
    });

    c.bench_function("full_build_100_messages", |b| {
        b.iter(|| {
            let build = load_def_file(black_box(&main_path)).expect("build");
            black_box(build.model.messages.len())
        });
    });
}

criterion_group!(benches, bench_build_model);
criterion_main!(benches);
