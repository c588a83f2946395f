use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::path::Path;

use patchinbox::config::ArchiveConfig;
use patchinbox::deadline::Deadline;
use patchinbox::index::DEFAULT_MAX_DEPTH;
use patchinbox::parser::{body, diff};
use patchinbox::source::MboxSource;
use patchinbox::store::MemStore;

/// A reply quoting a patch, followed by a 40-file patch.
fn large_body() -> String {
    let mut out = String::from("Hi,\n\n> some earlier review\n> comment\n\nUpdated below.\n---\n");
    for i in 0..40 {
        out.push_str(&format!(
            "diff --git a/src/f{i}.c b/src/f{i}.c\nindex 1..2 100644\n--- a/src/f{i}.c\n+++ b/src/f{i}.c\n@@ -1,3 +1,3 @@\n context\n-old {i}\n+new {i}\n"
        ));
    }
    out.push_str("-- \n2.43.0\n");
    out
}

fn bench_segment_body(c: &mut Criterion) {
    let text = large_body();
    c.bench_function("segment_body_40_files", |b| {
        b.iter(|| body::segment_body(black_box(&text)))
    });
}

fn bench_split_diffs(c: &mut Criterion) {
    let text = large_body();
    c.bench_function("split_diffs_40_files", |b| {
        b.iter(|| diff::split_diffs(black_box(&text)).unwrap())
    });
}

fn bench_index_build(c: &mut Criterion) {
    let fixture_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("series.mbox");

    c.bench_function("build_index_series", |b| {
        b.iter(|| {
            let source = MboxSource::new(&fixture_path, &ArchiveConfig::default()).unwrap();
            MemStore::open(source, &Deadline::none(), DEFAULT_MAX_DEPTH).unwrap()
        })
    });
}

criterion_group!(benches, bench_segment_body, bench_split_diffs, bench_index_build);
criterion_main!(benches);
