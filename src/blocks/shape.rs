//! Shape templates: bricks, per-shape placement and contact geometry
//!
//! A block is a set of bricks (tile-carrying units with identifiers stable
//! across shape changes) plus one or more shapes giving each brick a relative
//! position and visibility. Freed brick identifiers are recycled through a
//! freelist so identifiers stay small.

use std::collections::HashMap;

use bitvec::vec::BitVec;

use crate::board::tile::Tile;
use crate::spatial::geometry::{Direction, Point, Rect, Size};

/// A brick definition used when constructing blocks
#[derive(Debug, Clone, Copy)]
pub struct BrickDef {
    /// The brick's tile
    pub tile: Tile,
    /// Position relative to the block origin
    pub pos: Point,
    /// Whether the brick is visible in the initial shape
    pub visible: bool,
}

impl BrickDef {
    /// Shorthand for a visible brick
    pub const fn new(tile: Tile, x: i32, y: i32) -> Self {
        Self {
            tile,
            pos: Point::new(x, y),
            visible: true,
        }
    }
}

/// A contact cell of a shape in some direction
///
/// The position is the neighbor cell a brick touches, relative to the block
/// origin (not the brick's own position).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    /// Contact cell relative to the block origin
    pub pos: Point,
    /// The brick the contact belongs to
    pub brick: usize,
}

/// Per-shape brick placement
#[derive(Debug, Clone)]
struct Shape {
    /// Brick position by brick id, meaningful only for live ids
    pos: Vec<Point>,
    /// Brick visibility by brick id
    visible: BitVec,
}

impl Shape {
    fn with_len(len: usize) -> Self {
        Self {
            pos: vec![Point::default(); len],
            visible: BitVec::repeat(false, len),
        }
    }

    fn push(&mut self, pos: Point, visible: bool) {
        self.pos.push(pos);
        self.visible.push(visible);
    }

    fn set(&mut self, brick: usize, pos: Point, visible: bool) {
        if let Some(slot) = self.pos.get_mut(brick) {
            *slot = pos;
        }
        if let Some(mut bit) = self.visible.get_mut(brick) {
            *bit = visible;
        }
    }

    /// The shape rotated a quarter turn counterclockwise inside a square
    fn rotated_ccw(&self, side: i32) -> Self {
        Self {
            pos: self.pos.iter().map(|p| Point::new(p.y, side - 1 - p.x)).collect(),
            visible: self.visible.clone(),
        }
    }
}

/// Result of fusing two blocks
#[derive(Debug)]
pub struct FuseOutcome {
    /// The merged block
    pub block: Block,
    /// Offset to add to the master's origin so brick cells stay in place
    pub origin_delta: Point,
    /// Master brick id -> merged brick id
    pub master_bricks: HashMap<usize, usize>,
    /// Victim brick id -> merged brick id
    pub victim_bricks: HashMap<usize, usize>,
}

/// A shape template: bricks plus one or more shapes
#[derive(Debug, Clone, Default)]
pub struct Block {
    /// Tile by brick id; `None` marks a freed id
    tiles: Vec<Option<Tile>>,
    free_ids: Vec<usize>,
    shapes: Vec<Shape>,
}

impl Block {
    /// Create a single-shape block from brick definitions
    pub fn from_bricks(bricks: &[BrickDef]) -> Self {
        let mut shape = Shape::with_len(0);
        let mut tiles = Vec::with_capacity(bricks.len());
        for def in bricks {
            tiles.push(Some(def.tile));
            shape.push(def.pos, def.visible);
        }
        Self {
            tiles,
            free_ids: Vec::new(),
            shapes: vec![shape],
        }
    }

    /// Create a block with four shapes rotated inside a `side` x `side` box
    ///
    /// Shape `k + 1` is shape `k` turned a quarter counterclockwise.
    pub fn with_rotations(bricks: &[BrickDef], side: i32) -> Self {
        let mut block = Self::from_bricks(bricks);
        for _ in 0..3 {
            let last = block.shapes.len() - 1;
            let rotated = block.shapes[last].rotated_ccw(side);
            block.shapes.push(rotated);
        }
        block
    }

    /// Merge the visible bricks of two blocks into a fresh four-shape block
    ///
    /// `rel` is the victim origin relative to the master origin. The merged
    /// block's bricks are renumbered from zero (master's first); the outcome
    /// carries the id remap tables and the origin adjustment.
    pub fn fuse(
        master: &Self,
        master_shape: usize,
        victim: &Self,
        victim_shape: usize,
        rel: Point,
    ) -> FuseOutcome {
        let mut defs: Vec<BrickDef> = Vec::new();
        let mut master_bricks = HashMap::new();
        let mut victim_bricks = HashMap::new();
        for (brick, pos) in master.visible_cells(master_shape) {
            let _ = master_bricks.insert(brick, defs.len());
            defs.push(BrickDef::new(master.tile_of(brick), pos.x, pos.y));
        }
        for (brick, pos) in victim.visible_cells(victim_shape) {
            let _ = victim_bricks.insert(brick, defs.len());
            defs.push(BrickDef::new(
                victim.tile_of(brick),
                pos.x + rel.x,
                pos.y + rel.y,
            ));
        }

        // normalize so the merged shape starts at the origin
        let min_x = defs.iter().map(|d| d.pos.x).min().unwrap_or(0);
        let min_y = defs.iter().map(|d| d.pos.y).min().unwrap_or(0);
        let max_x = defs.iter().map(|d| d.pos.x).max().unwrap_or(0);
        let max_y = defs.iter().map(|d| d.pos.y).max().unwrap_or(0);
        for def in &mut defs {
            def.pos = Point::new(def.pos.x - min_x, def.pos.y - min_y);
        }
        let side = (max_x - min_x + 1).max(max_y - min_y + 1);

        FuseOutcome {
            block: Self::with_rotations(&defs, side),
            origin_delta: Point::new(min_x, min_y),
            master_bricks,
            victim_bricks,
        }
    }

    /// Whether the block has no live bricks
    pub fn is_empty(&self) -> bool {
        self.brick_count() == 0
    }

    /// Number of live bricks
    pub fn brick_count(&self) -> usize {
        self.tiles.len() - self.free_ids.len()
    }

    /// The live brick ids in ascending order
    pub fn brick_ids(&self) -> Vec<usize> {
        self.tiles
            .iter()
            .enumerate()
            .filter_map(|(id, tile)| tile.map(|_| id))
            .collect()
    }

    /// Whether a brick id is live
    pub fn is_brick(&self, brick: usize) -> bool {
        self.tiles.get(brick).is_some_and(Option::is_some)
    }

    /// The tile of a live brick
    pub fn tile_of(&self, brick: usize) -> Tile {
        debug_assert!(self.is_brick(brick), "tile_of: dead brick id");
        self.tiles
            .get(brick)
            .copied()
            .flatten()
            .unwrap_or(Tile::EMPTY)
    }

    /// Replace the tile of a live brick
    pub fn set_brick_tile(&mut self, brick: usize, tile: Tile) {
        debug_assert!(self.is_brick(brick), "set_brick_tile: dead brick id");
        if let Some(slot) = self.tiles.get_mut(brick) {
            if slot.is_some() {
                *slot = Some(tile);
            }
        }
    }

    /// Add a brick at the same position and visibility in every shape
    ///
    /// Returns the brick id, reusing a freed id when available.
    pub fn add_brick(&mut self, tile: Tile, pos: Point, visible: bool) -> usize {
        if let Some(id) = self.free_ids.pop() {
            self.tiles[id] = Some(tile);
            for shape in &mut self.shapes {
                shape.set(id, pos, visible);
            }
            return id;
        }
        let id = self.tiles.len();
        self.tiles.push(Some(tile));
        for shape in &mut self.shapes {
            shape.push(pos, visible);
        }
        id
    }

    /// Remove a brick from every shape, freeing its id for reuse
    pub fn remove_brick(&mut self, brick: usize) {
        debug_assert!(self.is_brick(brick), "remove_brick: dead brick id");
        if let Some(slot) = self.tiles.get_mut(brick) {
            if slot.take().is_some() {
                self.free_ids.push(brick);
                for shape in &mut self.shapes {
                    shape.set(brick, Point::default(), false);
                }
            }
        }
    }

    /// Number of shapes
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// The shape id following `shape`, wrapping around
    pub fn next_shape(&self, shape: usize) -> usize {
        (shape + 1) % self.shapes.len().max(1)
    }

    /// The position of a brick in a shape, relative to the block origin
    pub fn brick_pos(&self, shape: usize, brick: usize) -> Point {
        debug_assert!(self.is_brick(brick), "brick_pos: dead brick id");
        self.shapes
            .get(shape)
            .and_then(|s| s.pos.get(brick).copied())
            .unwrap_or_default()
    }

    /// Whether a brick is visible in a shape
    pub fn brick_visible(&self, shape: usize, brick: usize) -> bool {
        self.shapes
            .get(shape)
            .and_then(|s| s.visible.get(brick).map(|bit| *bit))
            .unwrap_or(false)
    }

    /// Reposition a brick within one shape
    pub fn set_brick_pos_visible(&mut self, shape: usize, brick: usize, pos: Point, visible: bool) {
        debug_assert!(self.is_brick(brick), "set_brick_pos_visible: dead brick id");
        if let Some(s) = self.shapes.get_mut(shape) {
            s.set(brick, pos, visible);
        }
    }

    /// Number of visible bricks in a shape
    pub fn visible_count(&self, shape: usize) -> usize {
        self.visible_cells(shape).count()
    }

    /// Iterate over the visible bricks of a shape as `(brick, position)`
    pub fn visible_cells(&self, shape: usize) -> impl Iterator<Item = (usize, Point)> + '_ {
        let s = self.shapes.get(shape);
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, tile)| tile.is_some())
            .filter_map(move |(brick, _)| {
                let shape_ref = s?;
                if shape_ref.visible.get(brick).is_some_and(|bit| *bit) {
                    Some((brick, shape_ref.pos.get(brick).copied().unwrap_or_default()))
                } else {
                    None
                }
            })
    }

    /// The smallest rectangle containing a shape's visible bricks
    ///
    /// Zero-sized when the shape has no visible bricks.
    pub fn visible_min_max(&self, shape: usize) -> Rect {
        let mut min_x = i32::MAX;
        let mut min_y = i32::MAX;
        let mut max_x = i32::MIN;
        let mut max_y = i32::MIN;
        for (_, p) in self.visible_cells(shape) {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        if min_x > max_x {
            return Rect::default();
        }
        Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
    }

    /// The size of a shape's visible extent
    pub fn shape_size(&self, shape: usize) -> Size {
        self.visible_min_max(shape).size()
    }

    /// The contact cells of a shape in a direction
    ///
    /// A contact is a cell adjacent to a visible brick in `dir` that no
    /// visible brick of the shape occupies.
    pub fn contacts(&self, shape: usize, dir: Direction) -> Vec<Contact> {
        let occupied: Vec<Point> = self.visible_cells(shape).map(|(_, p)| p).collect();
        let (dx, dy) = (dir.delta_x(), dir.delta_y());
        self.visible_cells(shape)
            .filter_map(|(brick, p)| {
                let q = p.offset(dx, dy);
                if occupied.contains(&q) {
                    None
                } else {
                    Some(Contact { pos: q, brick })
                }
            })
            .collect()
    }
}
