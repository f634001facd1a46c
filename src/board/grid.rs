//! Fixed-size board grid with per-aspect state arrays
//!
//! The grid keeps one 2D array per state aspect (tiles, cell owners, one
//! animator array per animation channel) to allow selective updates: scroll
//! moves all aspects, insert moves tiles and animators but never ownership.
//! The grid is sized once at level construction and never resized.

use ndarray::Array2;

use crate::blocks::piece::PieceId;
use crate::board::animator::{AnimAnchor, AnimatorSlot, INACTIVE_ELAPSED};
use crate::board::tile::{Tile, TileBuffer};
use crate::spatial::geometry::{Direction, Point, Rect};

/// The lane (single row or column) freed by a shift
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InsertedLane {
    /// A full row at the given y
    Row(i32),
    /// A full column at the given x
    Col(i32),
}

/// The per-level board grid
#[derive(Debug, Clone)]
pub struct Board {
    width: i32,
    height: i32,
    /// Tile per cell, indexed `[y, x]`
    cells: Array2<Tile>,
    /// Owning piece per cell, indexed `[y, x]`
    owners: Array2<Option<PieceId>>,
    /// One animator array per animation channel, each indexed `[y, x]`
    animators: Vec<Array2<Option<AnimatorSlot>>>,
}

impl Board {
    /// Create a board from row-major initial tiles
    ///
    /// The caller guarantees `tiles.len() == width * height` and positive
    /// dimensions; the level constructor validates this.
    pub(crate) fn new(width: i32, height: i32, tiles: &[Tile], channels: usize) -> Self {
        let (w, h) = (width as usize, height as usize);
        debug_assert!(width > 0 && height > 0);
        debug_assert_eq!(tiles.len(), w * h);
        let cells = Array2::from_shape_fn((h, w), |(y, x)| {
            tiles.get(y * w + x).copied().unwrap_or(Tile::EMPTY)
        });
        Self {
            width,
            height,
            cells,
            owners: Array2::from_elem((h, w), None),
            animators: (0..channels)
                .map(|_| Array2::from_elem((h, w), None))
                .collect(),
        }
    }

    /// The board width in cells
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// The board height in cells
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Number of animation channels
    pub fn channels(&self) -> usize {
        self.animators.len()
    }

    /// Whether a position lies on the board
    pub const fn in_bounds(&self, p: Point) -> bool {
        p.x >= 0 && p.x < self.width && p.y >= 0 && p.y < self.height
    }

    /// The tile of a cell; out-of-range reads answer empty
    pub fn tile(&self, p: Point) -> Tile {
        debug_assert!(self.in_bounds(p), "tile: position off the board");
        self.cells
            .get(Self::index(p))
            .copied()
            .unwrap_or(Tile::EMPTY)
    }

    /// Set the tile of a cell
    pub fn set_tile(&mut self, p: Point, tile: Tile) {
        debug_assert!(self.in_bounds(p), "set_tile: position off the board");
        if let Some(cell) = self.cells.get_mut(Self::index(p)) {
            *cell = tile;
        }
    }

    /// The owning piece of a cell, if any
    pub fn owner(&self, p: Point) -> Option<PieceId> {
        debug_assert!(self.in_bounds(p), "owner: position off the board");
        self.owners.get(Self::index(p)).copied().flatten()
    }

    /// Set or clear the owning piece of a cell
    pub fn set_owner(&mut self, p: Point, owner: Option<PieceId>) {
        debug_assert!(self.in_bounds(p), "set_owner: position off the board");
        if let Some(cell) = self.owners.get_mut(Self::index(p)) {
            *cell = owner;
        }
    }

    /// The animator installed on a cell and channel, if any
    pub fn animator(&self, p: Point, channel: usize) -> Option<&AnimatorSlot> {
        debug_assert!(self.in_bounds(p), "animator: position off the board");
        self.animators
            .get(channel)
            .and_then(|arr| arr.get(Self::index(p)))
            .and_then(Option::as_ref)
    }

    /// Install or clear the animator of a cell and channel
    pub fn set_animator(&mut self, p: Point, channel: usize, slot: Option<AnimatorSlot>) {
        debug_assert!(self.in_bounds(p), "set_animator: position off the board");
        debug_assert!(channel < self.animators.len(), "set_animator: bad channel");
        if let Some(cell) = self
            .animators
            .get_mut(channel)
            .and_then(|arr| arr.get_mut(Self::index(p)))
        {
            *cell = slot;
        }
    }

    /// The unary elapsed time of a cell's animation channel
    ///
    /// Answers [`INACTIVE_ELAPSED`] when no animator is installed.
    pub fn animator_elapsed(
        &self,
        p: Point,
        channel: usize,
        view_tick: i32,
        tot_view_ticks: i32,
    ) -> f64 {
        self.animator(p, channel).map_or(INACTIVE_ELAPSED, |slot| {
            slot.animator
                .elapsed01(slot.hash, AnimAnchor::Cell(p), channel, view_tick, tot_view_ticks)
        })
    }

    /// The whole board as a rectangle
    pub const fn full_rect(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    /// The lane shifted off the board by a full-board scroll in `dir`
    pub(crate) const fn doomed_lane(&self, dir: Direction) -> Rect {
        match dir {
            Direction::Down => Rect::new(0, self.height - 1, self.width, 1),
            Direction::Up => Rect::new(0, 0, self.width, 1),
            Direction::Right => Rect::new(self.width - 1, 0, 1, self.height),
            Direction::Left => Rect::new(0, 0, 1, self.height),
        }
    }

    /// Shift tiles and animators of an area, filling the freed lane
    ///
    /// Ownership stays untouched; the freed lane's animators are cleared and
    /// its tiles come from `tiles` (or are empty).
    pub(crate) fn shift_insert(
        &mut self,
        dir: Direction,
        area: Rect,
        tiles: Option<&TileBuffer>,
    ) -> InsertedLane {
        let lane = shift_area(&mut self.cells, dir, area);
        for arr in &mut self.animators {
            let _ = shift_area(arr, dir, area);
        }
        self.fill_lane(area, lane, tiles);
        lane
    }

    /// Shift the whole board, ownership included, filling the freed lane
    pub(crate) fn shift_scroll(&mut self, dir: Direction, tiles: Option<&TileBuffer>) {
        let area = self.full_rect();
        let lane = self.shift_insert(dir, area, tiles);
        let _ = shift_area(&mut self.owners, dir, area);
        self.for_lane(area, lane, |board, p| board.set_owner(p, None));
    }

    /// Write buffer (or empty) tiles into the freed lane and clear animators
    fn fill_lane(&mut self, area: Rect, lane: InsertedLane, tiles: Option<&TileBuffer>) {
        self.for_lane(area, lane, |board, p| {
            let local = Point::new(p.x - area.x, p.y - area.y);
            let tile = match lane {
                InsertedLane::Row(_) => {
                    tiles.map_or(Tile::EMPTY, |buf| buf.get(Point::new(local.x, 0)))
                }
                InsertedLane::Col(_) => {
                    tiles.map_or(Tile::EMPTY, |buf| buf.get(Point::new(0, local.y)))
                }
            };
            board.set_tile(p, tile);
            for channel in 0..board.channels() {
                board.set_animator(p, channel, None);
            }
        });
    }

    /// Apply a mutation to every cell of a freed lane
    fn for_lane(&mut self, area: Rect, lane: InsertedLane, mut apply: impl FnMut(&mut Self, Point)) {
        match lane {
            InsertedLane::Row(y) => {
                for x in area.x..area.x + area.w {
                    apply(self, Point::new(x, y));
                }
            }
            InsertedLane::Col(x) => {
                for y in area.y..area.y + area.h {
                    apply(self, Point::new(x, y));
                }
            }
        }
    }

    const fn index(p: Point) -> (usize, usize) {
        (p.y as usize, p.x as usize)
    }
}

/// Shift an area of a state array one step in `dir`, returning the freed lane
///
/// Content moves with the direction: shifting down copies each row onto the
/// one below it and frees the topmost row of the area.
fn shift_area<T: Clone>(arr: &mut Array2<T>, dir: Direction, area: Rect) -> InsertedLane {
    let (x0, y0) = (area.x as usize, area.y as usize);
    let (x1, y1) = ((area.x + area.w) as usize, (area.y + area.h) as usize);
    match dir {
        Direction::Down => {
            for y in ((y0 + 1)..y1).rev() {
                for x in x0..x1 {
                    arr[[y, x]] = arr[[y - 1, x]].clone();
                }
            }
            InsertedLane::Row(area.y)
        }
        Direction::Up => {
            for y in y0..y1 - 1 {
                for x in x0..x1 {
                    arr[[y, x]] = arr[[y + 1, x]].clone();
                }
            }
            InsertedLane::Row(area.y + area.h - 1)
        }
        Direction::Right => {
            for x in ((x0 + 1)..x1).rev() {
                for y in y0..y1 {
                    arr[[y, x]] = arr[[y, x - 1]].clone();
                }
            }
            InsertedLane::Col(area.x)
        }
        Direction::Left => {
            for x in x0..x1 - 1 {
                for y in y0..y1 {
                    arr[[y, x]] = arr[[y, x + 1]].clone();
                }
            }
            InsertedLane::Col(area.x + area.w - 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_3x3() -> Board {
        let tiles: Vec<Tile> = (1..=9).map(Tile::new).collect();
        Board::new(3, 3, &tiles, 1)
    }

    #[test]
    fn test_insert_down_moves_rows_and_fills_top() {
        let mut board = board_3x3();
        let mut buf = TileBuffer::new(3, 1);
        buf.set(Point::new(1, 0), Tile::new(42));
        let lane = board.shift_insert(Direction::Down, board.full_rect(), Some(&buf));
        assert_eq!(lane, InsertedLane::Row(0));
        // old top row moved to the middle
        assert_eq!(board.tile(Point::new(0, 1)), Tile::new(1));
        assert_eq!(board.tile(Point::new(1, 0)), Tile::new(42));
        assert_eq!(board.tile(Point::new(0, 0)), Tile::EMPTY);
        // old bottom row dropped off
        assert_eq!(board.tile(Point::new(0, 2)), Tile::new(4));
    }

    #[test]
    fn test_insert_left_frees_right_column(){
        let mut board = board_3x3();
        let lane = board.shift_insert(Direction::Left, board.full_rect(), None);
        assert_eq!(lane, InsertedLane::Col(2));
        assert_eq!(board.tile(Point::new(0, 0)), Tile::new(2));
        assert_eq!(board.tile(Point::new(2, 0)), Tile::EMPTY);
    }

    #[test]
    fn test_partial_area_insert_leaves_outside_untouched() {
        let mut board = board_3x3();
        let _ = board.shift_insert(Direction::Down, Rect::new(1, 0, 2, 2), None);
        // column 0 and row 2 untouched
        assert_eq!(board.tile(Point::new(0, 0)), Tile::new(1));
        assert_eq!(board.tile(Point::new(0, 1)), Tile::new(4));
        assert_eq!(board.tile(Point::new(1, 2)), Tile::new(8));
        // shifted cells
        assert_eq!(board.tile(Point::new(1, 1)), Tile::new(2));
        assert_eq!(board.tile(Point::new(1, 0)), Tile::EMPTY);
    }

    #[test]
    fn test_scroll_moves_ownership_and_clears_lane() {
        let mut board = board_3x3();
        let id = PieceId::new(5);
        board.set_owner(Point::new(1, 1), Some(id));
        board.shift_scroll(Direction::Down, None);
        assert_eq!(board.owner(Point::new(1, 2)), Some(id));
        assert_eq!(board.owner(Point::new(1, 1)), None);
        assert_eq!(board.owner(Point::new(1, 0)), None);
    }
}
