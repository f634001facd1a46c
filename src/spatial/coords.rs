//! Sparse set of board positions with O(1) average membership operations
//!
//! Positions are packed into a 64-bit key and hashed. The bounding rectangle
//! is maintained incrementally while it can only grow; any removal
//! invalidates it, and the next query recomputes it with a full scan. This
//! trades the impossible incremental shrink for a lazily amortized one.

use std::cell::Cell;
use std::collections::HashMap;

use crate::spatial::geometry::{Point, Rect};

/// Slot value marking a position that carries no dense-array value
pub(crate) const NO_SLOT: i32 = -1;

/// Pack a position into a hashable 64-bit key
pub(crate) const fn pack(p: Point) -> u64 {
    ((p.y as u32 as u64) << 32) | (p.x as u32 as u64)
}

/// Recover a position from its packed key
pub(crate) const fn unpack(key: u64) -> Point {
    Point::new(key as u32 as i32, (key >> 32) as u32 as i32)
}

/// Cached state of the bounding rectangle
#[derive(Debug, Clone, Copy, Default)]
enum Bounds {
    /// No members, rectangle is zero-sized
    #[default]
    Empty,
    /// Rectangle is exact for the current membership
    Exact(Rect),
    /// A removal happened since the last recompute
    Stale,
}

/// Sparse set of cell positions
///
/// `add` is idempotent and `remove` reports whether the position existed.
/// Iteration order is arbitrary but stable until the next mutation.
#[derive(Debug, Clone, Default)]
pub struct Coords {
    /// Packed position -> slot index into a sibling value array (or [`NO_SLOT`])
    slots: HashMap<u64, i32>,
    bounds: Cell<Bounds>,
}

impl Coords {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty set sized for at least `capacity` positions
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: HashMap::with_capacity(capacity),
            bounds: Cell::new(Bounds::Empty),
        }
    }

    /// Remove all positions
    pub fn clear(&mut self) {
        self.slots.clear();
        self.bounds.set(Bounds::Empty);
    }

    /// Number of positions in the set
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the set has no positions
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Add a position; adding an existing position is a no-op
    pub fn add(&mut self, p: Point) {
        let _ = self.insert_slot(p);
    }

    /// Add every position of a rectangle
    pub fn add_rect(&mut self, rect: Rect) {
        for x in rect.x..rect.x + rect.w {
            for y in rect.y..rect.y + rect.h {
                self.add(Point::new(x, y));
            }
        }
    }

    /// Add every position of another set
    pub fn add_coords(&mut self, other: &Self) {
        for key in other.slots.keys() {
            self.add(unpack(*key));
        }
    }

    /// Whether the set contains a position
    pub fn contains(&self, p: Point) -> bool {
        self.slots.contains_key(&pack(p))
    }

    /// Remove a position, reporting whether it existed
    pub fn remove(&mut self, p: Point) -> bool {
        self.remove_entry(p).is_some()
    }

    /// Remove every position lying within a rectangle
    pub fn remove_in_rect(&mut self, rect: Rect) {
        let doomed: Vec<u64> = self
            .slots
            .keys()
            .copied()
            .filter(|key| rect.contains(unpack(*key)))
            .collect();
        for key in doomed {
            let _ = self.remove_entry(unpack(key));
        }
    }

    /// Remove every position of another set
    pub fn remove_coords(&mut self, other: &Self) {
        for key in other.slots.keys() {
            let _ = self.remove_entry(unpack(*key));
        }
    }

    /// Iterate over the positions in the set
    pub fn iter(&self) -> impl Iterator<Item = Point> + '_ {
        self.slots.keys().map(|key| unpack(*key))
    }

    /// The smallest rectangle containing all positions
    ///
    /// Zero-sized when the set is empty. Cached between mutations; removals
    /// force a full rescan on the next call.
    pub fn min_max(&self) -> Rect {
        match self.bounds.get() {
            Bounds::Exact(rect) => rect,
            Bounds::Empty => Rect::default(),
            Bounds::Stale => {
                let rect = self.scan_bounds();
                self.bounds.set(Bounds::Exact(rect));
                rect
            }
        }
    }

    /// Look up the slot index stored for a position
    pub(crate) fn slot(&self, p: Point) -> Option<i32> {
        self.slots.get(&pack(p)).copied()
    }

    /// Overwrite the slot index stored for an existing position
    pub(crate) fn set_slot(&mut self, p: Point, slot: i32) {
        let entry = self.slots.get_mut(&pack(p));
        debug_assert!(entry.is_some(), "set_slot: position not present");
        if let Some(value) = entry {
            *value = slot;
        }
    }

    /// Insert a position if missing and return its slot entry
    pub(crate) fn insert_slot(&mut self, p: Point) -> &mut i32 {
        let key = pack(p);
        if !self.slots.contains_key(&key) {
            self.grow_bounds(p);
        }
        self.slots.entry(key).or_insert(NO_SLOT)
    }

    /// Remove a position and return its slot index if it existed
    pub(crate) fn remove_entry(&mut self, p: Point) -> Option<i32> {
        let slot = self.slots.remove(&pack(p));
        if slot.is_some() {
            if self.slots.is_empty() {
                self.bounds.set(Bounds::Empty);
            } else {
                self.bounds.set(Bounds::Stale);
            }
        }
        slot
    }

    /// Expand the cached bounding rectangle for a new member
    fn grow_bounds(&self, p: Point) {
        let grown = match self.bounds.get() {
            // a removal already invalidated the cache, nothing to maintain
            Bounds::Stale => Bounds::Stale,
            Bounds::Empty => Bounds::Exact(Rect::new(p.x, p.y, 1, 1)),
            Bounds::Exact(mut rect) => {
                if p.x < rect.x {
                    rect.w += rect.x - p.x;
                    rect.x = p.x;
                } else if p.x >= rect.x + rect.w {
                    rect.w = p.x - rect.x + 1;
                }
                if p.y < rect.y {
                    rect.h += rect.y - p.y;
                    rect.y = p.y;
                } else if p.y >= rect.y + rect.h {
                    rect.h = p.y - rect.y + 1;
                }
                Bounds::Exact(rect)
            }
        };
        self.bounds.set(grown);
    }

    /// Recompute the bounding rectangle with a full scan
    fn scan_bounds(&self) -> Rect {
        let mut min_x = i32::MAX;
        let mut min_y = i32::MAX;
        let mut max_x = i32::MIN;
        let mut max_y = i32::MIN;
        for key in self.slots.keys() {
            let p = unpack(*key);
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
}

impl FromIterator<Point> for Coords {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        let mut coords = Self::new();
        for p in iter {
            coords.add(p);
        }
        coords
    }
}

impl Extend<Point> for Coords {
    fn extend<I: IntoIterator<Item = Point>>(&mut self, iter: I) {
        for p in iter {
            self.add(p);
        }
    }
}
