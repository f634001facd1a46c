//! Shape templates and placed pieces
//!
//! This module contains the movable-piece model including:
//! - Blocks: brick/shape templates with contact geometry
//! - Pieces: placed instances with ownership and control state

/// Placed piece instances
pub mod piece;
/// Brick and shape templates
pub mod shape;

pub use piece::{MgmtType, Piece, PieceConfig, PieceId, ScrollEviction};
pub use shape::{Block, BrickDef, Contact, FuseOutcome};
