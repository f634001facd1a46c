//! Performance measurement for event activation ordering and tick drains

// Criterion macros generate undocumented functions
#![allow(missing_docs)]

use brickfield::events::EventId;
use brickfield::level::SeededHost;
use brickfield::{Level, LevelInit, TeamInit};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn bench_level(events: usize) -> (Level, Vec<EventId>) {
    let mut level = Level::new(
        Box::new(SeededHost::new(1, 1)),
        0,
        LevelInit {
            teams: vec![TeamInit { mates: 1 }],
            ..LevelInit::default()
        },
    )
    .expect("level construction");
    let ids = (0..events)
        .map(|i| {
            level.add_event(
                Box::new(|_: &mut Level, _: EventId, _: i32, _: i32, _: Option<EventId>| {}),
                (i % 7) as i32,
            )
        })
        .collect();
    (level, ids)
}

/// Measures the front-scan insertion as the active queue grows
fn bench_activation(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_activation");

    for count in &[16_usize, 64, 256] {
        let (mut level, ids) = bench_level(*count);
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| {
                for (i, id) in ids.iter().enumerate() {
                    level.activate_event(*id, black_box((i * 13 % 97) as i32));
                }
                for id in &ids {
                    level.deactivate_event(*id);
                }
            });
        });
    }

    group.finish();
}

/// Measures draining a tick with every event due
fn bench_drain(c: &mut Criterion) {
    c.bench_function("event_drain_64", |b| {
        let (mut level, ids) = bench_level(64);
        level.host_mut().begin_tick();
        b.iter(|| {
            for (i, id) in ids.iter().enumerate() {
                level.activate_event(*id, (i % 2) as i32);
            }
            level.process_tick();
            black_box(level.game_tick());
        });
    });
}

criterion_group!(benches, bench_activation, bench_drain);
criterion_main!(benches);
