//! Placed pieces: a shape template bound to a board position and owner state
//!
//! Pieces are registered with a level and addressed through [`PieceId`]
//! handles; the level owns the piece values, so freeze/destroy can never
//! leave a dangling reference behind.

use std::collections::HashMap;

use crate::blocks::shape::Block;
use crate::board::animator::{AnimAnchor, AnimatorSlot, INACTIVE_ELAPSED};
use crate::spatial::coords::Coords;
use crate::spatial::geometry::Point;

/// Handle of a placed piece within its level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PieceId(u32);

impl PieceId {
    /// Create a handle from its raw value
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// The raw handle value
    pub const fn value(self) -> u32 {
        self.0
    }
}

/// How the level manages a placed piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MgmtType {
    /// Not auto-scrolled, no cell ownership
    Normal,
    /// Moved along with board scrolls
    AutoScroll,
    /// Auto-scrolled, and the level maintains cell ownership per visible brick
    AutoOwner,
    /// Auto-owner, and owned cells are required to hold empty tiles
    AutoStrictOwner,
}

impl MgmtType {
    /// Whether board scrolls move the piece
    pub const fn is_auto_scrolled(self) -> bool {
        matches!(self, Self::AutoScroll | Self::AutoOwner | Self::AutoStrictOwner)
    }

    /// Whether the level maintains cell ownership for the piece
    pub const fn is_auto_owner(self) -> bool {
        matches!(self, Self::AutoOwner | Self::AutoStrictOwner)
    }

    /// Whether owned cells must hold empty tiles at placement
    pub const fn is_strict_owner(self) -> bool {
        matches!(self, Self::AutoStrictOwner)
    }
}

/// What a scroll does to a piece occupying the lane that falls off the board
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScrollEviction {
    /// Bake the piece into the board tiles
    #[default]
    Freeze,
    /// Detach the piece without writing tiles back
    Remove,
    /// Destroy the piece
    Destroy,
    /// Refuse eviction; the scroll aborts with a technical report
    Deny,
}

/// Construction-time settings of a piece
#[derive(Debug, Clone, Copy, Default)]
pub struct PieceConfig {
    /// Whether players may control the piece
    pub controllable: bool,
    /// Team allowed to control it, or `None` for any team
    pub controller_team: Option<usize>,
    /// Scroll eviction policy
    pub eviction: ScrollEviction,
}

/// A placed piece
#[derive(Debug, Clone)]
pub struct Piece {
    pub(crate) id: PieceId,
    pub(crate) block: Block,
    pub(crate) shape: usize,
    pub(crate) pos: Point,
    pub(crate) mgmt: MgmtType,
    pub(crate) controllable: bool,
    pub(crate) controller_team: Option<usize>,
    pub(crate) team: Option<usize>,
    pub(crate) mate: Option<usize>,
    pub(crate) player: Option<usize>,
    pub(crate) eviction: ScrollEviction,
    /// Re-entrancy guard: set while a structural mutation is in flight
    pub(crate) busy: bool,
    /// Stamp of the scroll that last auto-moved the piece
    pub(crate) scrolled_marker: u32,
    /// Per-brick animator slots, one per animation channel
    pub(crate) brick_anis: HashMap<usize, Vec<Option<AnimatorSlot>>>,
    pub(crate) channels: usize,
}

impl Piece {
    pub(crate) fn new(
        id: PieceId,
        block: Block,
        shape: usize,
        pos: Point,
        config: PieceConfig,
        mgmt: MgmtType,
        channels: usize,
    ) -> Self {
        Self {
            id,
            block,
            shape,
            pos,
            mgmt,
            controllable: config.controllable,
            controller_team: config.controller_team,
            team: None,
            mate: None,
            player: None,
            eviction: config.eviction,
            busy: false,
            scrolled_marker: 0,
            brick_anis: HashMap::new(),
            channels,
        }
    }

    /// The piece's handle
    pub const fn id(&self) -> PieceId {
        self.id
    }

    /// The origin position of the piece on the board
    pub const fn pos(&self) -> Point {
        self.pos
    }

    /// The active shape id
    pub const fn shape_id(&self) -> usize {
        self.shape
    }

    /// The underlying shape template
    pub const fn block(&self) -> &Block {
        &self.block
    }

    /// How the level manages this piece
    pub const fn mgmt(&self) -> MgmtType {
        self.mgmt
    }

    /// The scroll eviction policy
    pub const fn eviction(&self) -> ScrollEviction {
        self.eviction
    }

    /// Whether players may control the piece
    pub const fn is_controllable(&self) -> bool {
        self.controllable
    }

    /// Team allowed to control the piece; `None` means any team
    ///
    /// Meaningful only while [`is_controllable`](Self::is_controllable).
    pub const fn controller_team(&self) -> Option<usize> {
        self.controller_team
    }

    /// Team of the mate currently controlling the piece
    pub const fn team(&self) -> Option<usize> {
        self.team
    }

    /// Mate (within its team) currently controlling the piece
    pub const fn mate(&self) -> Option<usize> {
        self.mate
    }

    /// Level-wide player number currently controlling the piece
    pub const fn player(&self) -> Option<usize> {
        self.player
    }

    /// Board positions of the visible bricks of the active shape
    pub fn visible_board_cells(&self) -> Vec<(usize, Point)> {
        self.block
            .visible_cells(self.shape)
            .map(|(brick, p)| (brick, Point::new(self.pos.x + p.x, self.pos.y + p.y)))
            .collect()
    }

    /// The visible brick cells as a coordinate set
    pub fn coords(&self) -> Coords {
        self.visible_board_cells()
            .into_iter()
            .map(|(_, p)| p)
            .collect()
    }

    /// Install or clear a brick animator for an animation channel
    pub fn set_brick_animator(&mut self, brick: usize, channel: usize, slot: Option<AnimatorSlot>) {
        debug_assert!(self.block.is_brick(brick), "set_brick_animator: dead brick");
        debug_assert!(channel < self.channels, "set_brick_animator: bad channel");
        if channel >= self.channels {
            return;
        }
        let channels = self.channels;
        let anis = self
            .brick_anis
            .entry(brick)
            .or_insert_with(|| vec![None; channels]);
        if let Some(entry) = anis.get_mut(channel) {
            *entry = slot;
        }
    }

    /// The animator installed on a brick and channel, if any
    pub fn brick_animator(&self, brick: usize, channel: usize) -> Option<&AnimatorSlot> {
        self.brick_anis
            .get(&brick)
            .and_then(|anis| anis.get(channel))
            .and_then(Option::as_ref)
    }

    /// The unary elapsed time of a brick's animation channel
    pub fn brick_animator_elapsed(
        &self,
        brick: usize,
        channel: usize,
        view_tick: i32,
        tot_view_ticks: i32,
    ) -> f64 {
        self.brick_animator(brick, channel)
            .map_or(INACTIVE_ELAPSED, |slot| {
                slot.animator.elapsed01(
                    slot.hash,
                    AnimAnchor::Brick(self.id, brick),
                    channel,
                    view_tick,
                    tot_view_ticks,
                )
            })
    }
}
