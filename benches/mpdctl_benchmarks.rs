//! # mpdctl Performance Benchmarks
//!
//! - **Response Parsing**: grouping `key: value` pairs into records, quoting
//! - **Enqueue Composition**: exact match, fuzzy fallback and replace paths
//!   against the in-memory daemon
//!
//! ```bash
//! cargo bench
//! cargo bench parsing
//! cargo bench enqueue
//! ```

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use mpdctl::memory::MemoryDaemon;
use mpdctl::protocol::{group_records, parse_pair, quote, ENTRY_KEYS};
use mpdctl::{Connection, PlaybackController, QueueMode};
use std::hint::black_box;

/// A `listall`-style response with `count` songs and a few tags each.
fn response_lines(count: usize) -> Vec<String> {
    (0..count)
        .flat_map(|i| {
            [
                format!("file: artist{}/album{}/{i:03}.flac", i % 17, i % 5),
                format!("Artist: Artist {}", i % 17),
                format!("Album: Album {}", i % 5),
                format!("Title: Track {i}"),
                format!("Pos: {i}"),
                format!("Id: {}", i + 1),
            ]
        })
        .collect()
}

fn library(count: usize) -> MemoryDaemon {
    let daemon = MemoryDaemon::new();
    for i in 0..count {
        let artist = format!("Artist {}", i % 17);
        let title = format!("Track {i}");
        daemon.add_track(&format!("lib/{i:05}.flac"), &[("Artist", artist.as_str()), ("Title", title.as_str())]);
    }
    daemon
}

fn controller(daemon: MemoryDaemon) -> PlaybackController<MemoryDaemon> {
    let connection = Connection::establish("bench", None, move |_, _| Ok(daemon))
        .expect("memory connection never fails");
    PlaybackController::new(connection)
}

fn benchmark_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");

    for count in [10, 100, 1000] {
        let lines = response_lines(count);
        group.bench_with_input(BenchmarkId::new("parse_and_group", count), &lines, |b, lines| {
            b.iter(|| {
                let pairs: Vec<(String, String)> = lines
                    .iter()
                    .filter_map(|line| parse_pair(line).ok())
                    .collect();
                black_box(group_records(pairs, ENTRY_KEYS))
            })
        });
    }

    group.bench_function("quote_with_escapes", |b| {
        b.iter(|| black_box(quote(black_box(r#"Say "Hi" \ Bye"#))))
    });

    group.finish();
}

fn benchmark_enqueue(c: &mut Criterion) {
    let mut group = c.benchmark_group("enqueue");

    group.bench_function("exact_artist_append", |b| {
        b.iter_batched(
            || controller(library(500)),
            |ctl| black_box(ctl.add_artist("Artist 3", QueueMode::Append)),
            BatchSize::SmallInput,
        )
    });

    group.bench_function("exact_artist_replace", |b| {
        b.iter_batched(
            || controller(library(500)),
            |ctl| black_box(ctl.add_artist("Artist 3", QueueMode::Replace)),
            BatchSize::SmallInput,
        )
    });

    group.bench_function("fuzzy_fallback", |b| {
        b.iter_batched(
            || controller(library(500)),
            |ctl| black_box(ctl.add_title("track 49")),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, benchmark_parsing, benchmark_enqueue);
criterion_main!(benches);
