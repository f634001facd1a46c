//! Spatial primitives and sparse coordinate structures
//!
//! This module contains position-related functionality including:
//! - Integer cell geometry and directions
//! - The sparse coordinate set with cached bounding rectangle
//! - The tile-valued coordinate set variant

/// Sparse coordinate set
pub mod coords;
/// Cell geometry and directions
pub mod geometry;
/// Tile-valued coordinate set
pub mod tilecoords;

pub use coords::Coords;
pub use geometry::{Direction, Point, Rect, Size};
pub use tilecoords::TileCoords;
