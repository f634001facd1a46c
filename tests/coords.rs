//! Validates the sparse coordinate sets against brute-force models

use std::collections::{HashMap, HashSet};

use brickfield::board::Tile;
use brickfield::spatial::{Coords, Point, Rect, TileCoords};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// The minimal bounding rectangle of a point set, computed the slow way
fn brute_force_min_max(points: &HashSet<(i32, i32)>) -> Rect {
    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_x = i32::MIN;
    let mut max_y = i32::MIN;
    for (x, y) in points {
        min_x = min_x.min(*x);
        min_y = min_y.min(*y);
        max_x = max_x.max(*x);
        max_y = max_y.max(*y);
    }
    if min_x > max_x {
        return Rect::default();
    }
    Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
}

#[test]
fn test_membership_and_size_track_a_model_under_random_churn() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut coords = Coords::new();
    let mut model: HashSet<(i32, i32)> = HashSet::new();

    for step in 0..4000 {
        let x = rng.random_range(-8..8);
        let y = rng.random_range(-8..8);
        if rng.random_range(0..3) == 0 {
            let existed = coords.remove(Point::new(x, y));
            assert_eq!(existed, model.remove(&(x, y)), "step {step}");
        } else {
            coords.add(Point::new(x, y));
            let _ = model.insert((x, y));
        }
        assert_eq!(coords.len(), model.len(), "step {step}");
    }

    for x in -8..8 {
        for y in -8..8 {
            assert_eq!(coords.contains(Point::new(x, y)), model.contains(&(x, y)));
        }
    }
}

#[test]
fn test_min_max_equals_brute_force_after_any_operation_sequence() {
    let mut rng = StdRng::seed_from_u64(0xb0a2d);
    let mut coords = Coords::new();
    let mut model: HashSet<(i32, i32)> = HashSet::new();

    for step in 0..1500 {
        let x = rng.random_range(-20..20);
        let y = rng.random_range(-20..20);
        match rng.random_range(0..4) {
            0 => {
                let _ = coords.remove(Point::new(x, y));
                let _ = model.remove(&(x, y));
            }
            1 => {
                let rect = Rect::new(x, y, rng.random_range(1..4), rng.random_range(1..4));
                coords.remove_in_rect(rect);
                model.retain(|(px, py)| !rect.contains(Point::new(*px, *py)));
            }
            _ => {
                coords.add(Point::new(x, y));
                let _ = model.insert((x, y));
            }
        }
        assert_eq!(coords.min_max(), brute_force_min_max(&model), "step {step}");
    }
}

#[test]
fn test_tile_coords_follow_a_model_and_stay_dense() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut tc = TileCoords::new();
    // position -> tile value, 0 for the empty tile
    let mut model: HashMap<(i32, i32), u32> = HashMap::new();

    for _ in 0..4000 {
        let x = rng.random_range(-5..5);
        let y = rng.random_range(-5..5);
        match rng.random_range(0..4) {
            0 => {
                let existed = tc.remove(Point::new(x, y));
                assert_eq!(existed, model.remove(&(x, y)).is_some());
            }
            1 => {
                tc.add(Point::new(x, y), Tile::EMPTY);
                let _ = model.insert((x, y), 0);
            }
            _ => {
                let value = rng.random_range(1..6);
                tc.add(Point::new(x, y), Tile::new(value));
                let _ = model.insert((x, y), value);
            }
        }

        let non_empty = model.values().filter(|v| **v != 0).count();
        assert_eq!(tc.tile_count(), non_empty, "dense array must stay compact");
        assert_eq!(tc.len(), model.len());
    }

    for ((x, y), value) in &model {
        assert_eq!(tc.tile_at(Point::new(*x, *y)), Some(Tile::new(*value)));
    }
}

#[test]
fn test_iteration_is_stable_between_mutations() {
    let mut coords = Coords::new();
    coords.add_rect(Rect::new(0, 0, 5, 5));
    let first: Vec<Point> = coords.iter().collect();
    let second: Vec<Point> = coords.iter().collect();
    assert_eq!(first, second);
}
