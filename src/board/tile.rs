//! Opaque tile values and rectangular tile buffers
//!
//! The simulation core never interprets tile contents; it only distinguishes
//! the designated empty tile from everything else. Rendering layers map the
//! raw value onto glyphs, colors or sprites.

use crate::spatial::geometry::{Point, Size};

/// A board tile
///
/// `Tile::EMPTY` is the designated empty value; all other values are opaque
/// to the core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Tile(u32);

impl Tile {
    /// The designated empty tile
    pub const EMPTY: Self = Self(0);

    /// Create a tile from its raw value
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// The raw value of the tile
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Whether this is the designated empty tile
    pub const fn is_empty(self) -> bool {
        self.0 == Self::EMPTY.0
    }
}

/// A width x height rectangle of tiles handed to scroll and insert operations
#[derive(Debug, Clone)]
pub struct TileBuffer {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
}

impl TileBuffer {
    /// Create a buffer filled with empty tiles
    ///
    /// Zero-sized buffers are permitted and behave like an all-empty source.
    pub fn new(width: i32, height: i32) -> Self {
        let len = (width.max(0) as usize) * (height.max(0) as usize);
        Self {
            width: width.max(0),
            height: height.max(0),
            tiles: vec![Tile::EMPTY; len],
        }
    }

    /// The buffer size
    pub const fn size(&self) -> Size {
        Size {
            w: self.width,
            h: self.height,
        }
    }

    /// The tile at a buffer-local position, empty when out of range
    pub fn get(&self, p: Point) -> Tile {
        if p.x < 0 || p.x >= self.width || p.y < 0 || p.y >= self.height {
            return Tile::EMPTY;
        }
        self.tiles
            .get((p.y * self.width + p.x) as usize)
            .copied()
            .unwrap_or(Tile::EMPTY)
    }

    /// Set the tile at a buffer-local position; out-of-range writes are ignored
    pub fn set(&mut self, p: Point, tile: Tile) {
        if p.x < 0 || p.x >= self.width || p.y < 0 || p.y >= self.height {
            debug_assert!(false, "TileBuffer::set: position out of range");
            return;
        }
        if let Some(slot) = self.tiles.get_mut((p.y * self.width + p.x) as usize) {
            *slot = tile;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_reads_empty_outside_range() {
        let mut buffer = TileBuffer::new(2, 1);
        buffer.set(Point::new(1, 0), Tile::new(9));
        assert_eq!(buffer.get(Point::new(1, 0)), Tile::new(9));
        assert_eq!(buffer.get(Point::new(2, 0)), Tile::EMPTY);
        assert_eq!(buffer.get(Point::new(-1, 0)), Tile::EMPTY);
    }
}
