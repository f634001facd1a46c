//! Board grid, tiles and tile animation slots
//!
//! This module contains the per-level grid state including:
//! - Opaque tile values and rectangular tile buffers
//! - The fixed-size grid with tile, ownership and animator aspects
//! - The animator callback contract used by rendering layers

/// Tile animation contract and slots
pub mod animator;
/// The fixed-size grid
pub mod grid;
/// Tile values and buffers
pub mod tile;

pub use animator::{AnimAnchor, AnimatorSlot, INACTIVE_ELAPSED, TileAnimator};
pub use grid::Board;
pub use tile::{Tile, TileBuffer};
