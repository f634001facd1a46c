//! Performance measurement for coordinate set churn and bounding queries

// Criterion macros generate undocumented functions
#![allow(missing_docs)]

use brickfield::board::Tile;
use brickfield::spatial::{Coords, Point, Rect, TileCoords};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

/// Measures add/remove churn cost as the working set grows
fn bench_coords_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("coords_churn");

    for side in &[8, 16, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(side), side, |b, &side| {
            b.iter(|| {
                let mut coords = Coords::new();
                for x in 0..side {
                    for y in 0..side {
                        coords.add(Point::new(x, y));
                    }
                }
                for x in 0..side {
                    for y in 0..side {
                        let _ = coords.remove(black_box(Point::new(x, y)));
                    }
                }
                black_box(coords.len());
            });
        });
    }

    group.finish();
}

/// Measures the lazy bounding rectangle rescan after removals
fn bench_min_max_after_removal(c: &mut Criterion) {
    let mut base = Coords::new();
    base.add_rect(Rect::new(0, 0, 64, 64));

    c.bench_function("min_max_after_removal", |b| {
        b.iter(|| {
            let mut coords = base.clone();
            let _ = coords.remove(Point::new(63, 63));
            black_box(coords.min_max());
        });
    });
}

/// Measures dense value maintenance under tile overwrite churn
fn bench_tile_coords_overwrite(c: &mut Criterion) {
    c.bench_function("tile_coords_overwrite", |b| {
        b.iter(|| {
            let mut tc = TileCoords::new();
            for round in 1..16_u32 {
                for x in 0..32 {
                    tc.add(Point::new(x, 0), Tile::new(round));
                }
            }
            for x in 0..32 {
                let _ = tc.remove(black_box(Point::new(x, 0)));
            }
            black_box(tc.tile_count());
        });
    });
}

criterion_group!(
    benches,
    bench_coords_churn,
    bench_min_max_after_removal,
    bench_tile_coords_overwrite
);
criterion_main!(benches);
