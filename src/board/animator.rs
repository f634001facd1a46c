//! Tile animation callbacks queried by the rendering layer
//!
//! The core stores an animator per cell (or per piece brick) and animation
//! channel together with an opaque hash chosen by whoever registered it. The
//! hash travels back on every query so pooled animator objects can detect
//! that a stale registration is being asked about and answer inactive.

use std::rc::Rc;

use crate::blocks::piece::PieceId;
use crate::spatial::geometry::Point;

/// Elapsed value reported when no animation is active
pub const INACTIVE_ELAPSED: f64 = -1.0;

/// Where an animator is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimAnchor {
    /// A board cell
    Cell(Point),
    /// A brick of a placed piece
    Brick(PieceId, usize),
}

/// Per-cell, per-channel animation timing source
pub trait TileAnimator {
    /// The unary elapsed time of the animation
    ///
    /// `hash` is the value registered alongside this animator. Returns a
    /// fraction in `0.0..=1.0`, or [`INACTIVE_ELAPSED`] when the animation is
    /// not active (for example because `hash` no longer matches the
    /// animator's current occupant).
    fn elapsed01(
        &self,
        hash: i32,
        anchor: AnimAnchor,
        channel: usize,
        view_tick: i32,
        tot_view_ticks: i32,
    ) -> f64;
}

/// An installed animator and the hash registered with it
#[derive(Clone)]
pub struct AnimatorSlot {
    /// The animator callback
    pub animator: Rc<dyn TileAnimator>,
    /// Opaque value handed back on every query
    pub hash: i32,
}

impl std::fmt::Debug for AnimatorSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimatorSlot")
            .field("hash", &self.hash)
            .finish_non_exhaustive()
    }
}
