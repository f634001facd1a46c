//! Sparse coordinate set carrying a tile value per position
//!
//! Non-empty tiles live in a dense array kept compact by swap-removal; the
//! position map stores the array index. A position holding the designated
//! empty tile stays a member of the set without occupying a dense slot, so
//! "present but empty" and "absent" remain distinct answers.

use crate::board::tile::Tile;
use crate::spatial::coords::{Coords, NO_SLOT};
use crate::spatial::geometry::{Point, Rect};

/// One dense entry: the position it belongs to and its tile
#[derive(Debug, Clone, Copy)]
struct PosTile {
    pos: Point,
    tile: Tile,
}

/// Sparse set of positions with an associated tile each
#[derive(Debug, Clone, Default)]
pub struct TileCoords {
    coords: Coords,
    /// Dense array of the non-empty tiles, indexed by the coords slots
    tiles: Vec<PosTile>,
}

impl TileCoords {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty set sized for at least `capacity` positions
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            coords: Coords::with_capacity(capacity),
            tiles: Vec::with_capacity(capacity),
        }
    }

    /// Remove all positions
    pub fn clear(&mut self) {
        self.coords.clear();
        self.tiles.clear();
    }

    /// Number of positions in the set
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Whether the set has no positions
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Number of dense value slots currently allocated
    ///
    /// Always at most [`len`](Self::len); swap-removal keeps it from growing
    /// past the number of distinct non-empty positions ever live at once.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Set the tile for a position, adding the position if missing
    ///
    /// An existing tile at the position is overwritten. Setting the empty
    /// tile keeps the position in the set but releases its dense slot.
    pub fn add(&mut self, p: Point, tile: Tile) {
        if tile.is_empty() {
            let cur = *self.coords.insert_slot(p);
            if cur < 0 {
                // freshly created, or already empty
                return;
            }
            self.release_slot(cur as usize);
            self.coords.set_slot(p, NO_SLOT);
        } else {
            let cur = *self.coords.insert_slot(p);
            if cur < 0 {
                let idx = self.tiles.len() as i32;
                self.tiles.push(PosTile { pos: p, tile });
                self.coords.set_slot(p, idx);
            } else if let Some(entry) = self.tiles.get_mut(cur as usize) {
                entry.tile = tile;
            }
        }
    }

    /// Set the tile for every position of a rectangle
    pub fn add_rect(&mut self, rect: Rect, tile: Tile) {
        for x in rect.x..rect.x + rect.w {
            for y in rect.y..rect.y + rect.h {
                self.add(Point::new(x, y), tile);
            }
        }
    }

    /// Merge another tile set into this one, overwriting shared positions
    pub fn add_tile_coords(&mut self, other: &Self) {
        for (p, tile) in other.iter() {
            self.add(p, tile);
        }
    }

    /// Whether the set contains a position
    pub fn contains(&self, p: Point) -> bool {
        self.coords.contains(p)
    }

    /// The tile stored at a position, or `None` if the position is absent
    ///
    /// A present position without a dense slot reads as the empty tile.
    pub fn tile_at(&self, p: Point) -> Option<Tile> {
        let slot = self.coords.slot(p)?;
        if slot < 0 {
            return Some(Tile::EMPTY);
        }
        Some(
            self.tiles
                .get(slot as usize)
                .map_or(Tile::EMPTY, |entry| entry.tile),
        )
    }

    /// Remove a position, reporting whether it existed
    pub fn remove(&mut self, p: Point) -> bool {
        let Some(slot) = self.coords.remove_entry(p) else {
            return false;
        };
        if slot >= 0 {
            self.release_slot(slot as usize);
        }
        true
    }

    /// Remove every position lying within a rectangle
    pub fn remove_in_rect(&mut self, rect: Rect) {
        let doomed: Vec<Point> = self.coords.iter().filter(|p| rect.contains(*p)).collect();
        for p in doomed {
            let _ = self.remove(p);
        }
    }

    /// Remove every position of a plain coordinate set
    pub fn remove_coords(&mut self, other: &Coords) {
        for p in other.iter().collect::<Vec<_>>() {
            let _ = self.remove(p);
        }
    }

    /// Iterate over the positions and their tiles
    pub fn iter(&self) -> impl Iterator<Item = (Point, Tile)> + '_ {
        self.coords.iter().map(|p| {
            let tile = self
                .coords
                .slot(p)
                .filter(|slot| *slot >= 0)
                .and_then(|slot| self.tiles.get(slot as usize))
                .map_or(Tile::EMPTY, |entry| entry.tile);
            (p, tile)
        })
    }

    /// The smallest rectangle containing all positions
    pub fn min_max(&self) -> Rect {
        self.coords.min_max()
    }

    /// The positions of the set as a plain coordinate set
    pub fn positions(&self) -> Coords {
        self.coords.iter().collect()
    }

    /// Free a dense slot, moving the last entry into the gap
    ///
    /// The moved entry's recorded slot index is fixed up in the position map.
    fn release_slot(&mut self, idx: usize) {
        debug_assert!(idx < self.tiles.len(), "release_slot: index out of range");
        let _ = self.tiles.swap_remove(idx);
        if let Some(moved) = self.tiles.get(idx) {
            self.coords.set_slot(moved.pos, idx as i32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_overwrites_and_empty_stays_member() {
        let mut tc = TileCoords::new();
        tc.add(Point::new(1, 1), Tile::new(7));
        tc.add(Point::new(1, 1), Tile::new(8));
        assert_eq!(tc.tile_at(Point::new(1, 1)), Some(Tile::new(8)));
        assert_eq!(tc.len(), 1);
        assert_eq!(tc.tile_count(), 1);

        tc.add(Point::new(1, 1), Tile::EMPTY);
        assert_eq!(tc.tile_at(Point::new(1, 1)), Some(Tile::EMPTY));
        assert_eq!(tc.len(), 1);
        assert_eq!(tc.tile_count(), 0);
        assert_eq!(tc.tile_at(Point::new(0, 0)), None);

        assert!(tc.remove(Point::new(1, 1)));
        assert!(tc.is_empty());
    }

    #[test]
    fn test_swap_removal_fixes_moved_slot() {
        let mut tc = TileCoords::new();
        tc.add(Point::new(0, 0), Tile::new(1));
        tc.add(Point::new(1, 0), Tile::new(2));
        tc.add(Point::new(2, 0), Tile::new(3));
        // removing the first slot moves the last entry into its place
        assert!(tc.remove(Point::new(0, 0)));
        assert_eq!(tc.tile_at(Point::new(2, 0)), Some(Tile::new(3)));
        assert_eq!(tc.tile_at(Point::new(1, 0)), Some(Tile::new(2)));
        assert_eq!(tc.tile_count(), 2);
    }

    #[test]
    fn test_dense_array_stays_bounded_under_churn() {
        let mut tc = TileCoords::new();
        for round in 0..100 {
            for x in 0..8 {
                tc.add(Point::new(x, 0), Tile::new(round + 1));
            }
            for x in 0..8 {
                assert!(tc.remove(Point::new(x, 0)));
            }
        }
        assert_eq!(tc.tile_count(), 0);
        assert!(tc.is_empty());
    }
}
