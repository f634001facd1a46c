//! Deterministic simulation core for tile-based puzzle and arcade games
//!
//! The crate models one playable level at a time: a fixed board grid of
//! tiles, a registry of movable shaped pieces occupying it, a tick-driven
//! event scheduler advancing the game logic, and pre/post listener stacks
//! that keep external observers consistent through structural changes.

#![forbid(unsafe_code)]

/// Shape templates and placed pieces
pub mod blocks;
/// Board grid, tiles and animator slots
pub mod board;
/// Construction-time error handling
pub mod error;
/// Tick-driven event scheduling and message filters
pub mod events;
/// The per-level facade and its listener contracts
pub mod level;
/// Spatial primitives and sparse coordinate structures
pub mod spatial;

pub use error::{CoreError, Result};
pub use level::{Level, LevelInit, PieceModify, TeamInit};
