//! Listener stacks and the notification contracts of structural mutation
//!
//! Every structural operation notifies its listeners before and after the
//! change commits. The stack guarantees, even when callbacks add or remove
//! listeners mid-notification: each pre call is matched by a post call unless
//! the listener was removed in between, no post runs without its pre, posts
//! run in reverse pre order, and listeners registered during the pre phase
//! still receive it. Notification frames nest, so an operation triggered from
//! inside a callback keeps its own pre/post bookkeeping.

use std::collections::HashMap;
use std::rc::Rc;

use crate::blocks::piece::PieceId;
use crate::board::tile::TileBuffer;
use crate::level::Level;
use crate::spatial::coords::Coords;
use crate::spatial::geometry::{Direction, Rect};
use crate::spatial::tilecoords::TileCoords;

/// Identity key of a listener registration
pub(crate) fn listener_key<T: ?Sized>(listener: &Rc<T>) -> *const () {
    Rc::as_ptr(listener).cast()
}

/// One registered listener with its registration count
struct Entry<L: ?Sized> {
    listener: Rc<L>,
    count: u32,
}

/// Bookkeeping of one in-flight notification
struct Frame<L: ?Sized> {
    /// Listeners in pre order; removed ones are blanked so their post is skipped
    called: Vec<Option<Rc<L>>>,
}

/// Ordered multi-subscriber registry with pre/post pairing guarantees
pub(crate) struct ListenerStack<L: ?Sized> {
    listeners: Vec<Entry<L>>,
    /// In-flight frames, innermost last
    frames: Vec<Frame<L>>,
}

impl<L: ?Sized> ListenerStack<L> {
    pub(crate) fn new() -> Self {
        Self {
            listeners: Vec::new(),
            frames: Vec::new(),
        }
    }

    /// Register a listener; registering twice bumps a reference count
    pub(crate) fn add(&mut self, listener: Rc<L>) {
        let key = listener_key(&listener);
        if let Some(entry) = self
            .listeners
            .iter_mut()
            .find(|entry| listener_key(&entry.listener) == key)
        {
            entry.count += 1;
            return;
        }
        self.listeners.push(Entry { listener, count: 1 });
    }

    /// Unregister a listener; fully removed once its count drops to zero
    ///
    /// A fully removed listener loses its pending post calls in every
    /// in-flight frame.
    pub(crate) fn remove(&mut self, key: *const ()) {
        let Some(at) = self
            .listeners
            .iter()
            .position(|entry| listener_key(&entry.listener) == key)
        else {
            debug_assert!(false, "remove: listener not registered");
            return;
        };
        if self.listeners[at].count > 1 {
            self.listeners[at].count -= 1;
            return;
        }
        let _ = self.listeners.remove(at);
        for frame in &mut self.frames {
            for slot in &mut frame.called {
                if slot.as_ref().is_some_and(|l| listener_key(l) == key) {
                    *slot = None;
                }
            }
        }
    }

    /// Open a notification frame, returning its token
    pub(crate) fn push_frame(&mut self) -> usize {
        self.frames.push(Frame { called: Vec::new() });
        self.frames.len() - 1
    }

    /// The next listener whose pre call is owed, recording it for the post
    ///
    /// Rescans the registry on every call, so listeners added during the pre
    /// phase are picked up and removed ones are skipped.
    pub(crate) fn pre_next(&mut self, frame: usize) -> Option<Rc<L>> {
        let called = &self.frames.get(frame)?.called;
        let next = self.listeners.iter().find(|entry| {
            let key = listener_key(&entry.listener);
            !called
                .iter()
                .flatten()
                .any(|done| listener_key(done) == key)
        })?;
        let listener = next.listener.clone();
        self.frames[frame].called.push(Some(listener.clone()));
        Some(listener)
    }

    /// The next listener owed a post call, in reverse pre order
    pub(crate) fn post_next(&mut self, frame: usize) -> Option<Rc<L>> {
        let called = &mut self.frames.get_mut(frame)?.called;
        while let Some(slot) = called.pop() {
            if let Some(listener) = slot {
                return Some(listener);
            }
        }
        None
    }

    /// Close a notification frame
    pub(crate) fn pop_frame(&mut self, frame: usize) {
        debug_assert_eq!(frame + 1, self.frames.len(), "pop_frame: frames out of order");
        debug_assert!(
            self.frames.last().is_none_or(|f| f.called.iter().flatten().count() == 0),
            "pop_frame: post calls still owed"
        );
        let _ = self.frames.pop();
    }

    /// A plain snapshot of the registered listeners, for unpaired broadcasts
    pub(crate) fn snapshot(&self) -> Vec<Rc<L>> {
        self.listeners
            .iter()
            .map(|entry| entry.listener.clone())
            .collect()
    }
}

/// Pre/post hooks around board scrolls
pub trait BoardScrollListener {
    /// Called before a scroll shifts the board
    fn board_pre_scroll(&self, _level: &mut Level, _dir: Direction, _tiles: Option<&TileBuffer>) {}
    /// Called after a scroll committed
    fn board_post_scroll(&self, _level: &mut Level, _dir: Direction) {}
}

/// Pre/post hooks around pieces turning into board tiles and back
pub trait BoaBloListener {
    /// Called before a piece is baked into the board
    fn boablo_pre_freeze(&self, _level: &mut Level, _piece: PieceId) {}
    /// Called after a freeze; `coords` are the cells written
    fn boablo_post_freeze(&self, _level: &mut Level, _coords: &Coords) {}
    /// Called before board cells are carved into a fresh piece
    fn boablo_pre_unfreeze(&self, _level: &mut Level, _coords: &Coords) {}
    /// Called after an unfreeze created the piece
    fn boablo_post_unfreeze(&self, _level: &mut Level, _piece: PieceId) {}
}

/// Pre/post hooks around structural board mutation
pub trait BoardListener: BoardScrollListener + BoaBloListener {
    /// Called before a lane insertion shifts an area
    fn board_pre_insert(
        &self,
        _level: &mut Level,
        _dir: Direction,
        _area: Rect,
        _tiles: Option<&TileBuffer>,
    ) {
    }
    /// Called after a lane insertion committed
    fn board_post_insert(&self, _level: &mut Level, _dir: Direction, _area: Rect) {}
    /// Called before cells are destroyed (set to empty)
    fn board_pre_destroy(&self, _level: &mut Level, _coords: &Coords) {}
    /// Called after a destroy committed
    fn board_post_destroy(&self, _level: &mut Level, _coords: &Coords) {}
    /// Called before a multi-cell rewrite
    fn board_pre_modify(&self, _level: &mut Level, _tiles: &TileCoords) {}
    /// Called after a multi-cell rewrite committed
    fn board_post_modify(&self, _level: &mut Level, _tiles: &TileCoords) {}
}

/// Pre/post hooks around the piece registry
pub trait BlocksListener: BoaBloListener {
    /// Called before a piece joins the registry
    fn block_pre_add(&self, _level: &mut Level, _piece: PieceId) {}
    /// Called after a piece joined the registry
    fn block_post_add(&self, _level: &mut Level, _piece: PieceId) {}
    /// Called before a piece detaches without writing tiles back
    fn block_pre_remove(&self, _level: &mut Level, _piece: PieceId) {}
    /// Called after a removal; the id no longer resolves
    fn block_post_remove(&self, _level: &mut Level, _piece: PieceId) {}
    /// Called before a piece is destroyed
    fn block_pre_destroy(&self, _level: &mut Level, _piece: PieceId) {}
    /// Called after a destroy; the id no longer resolves
    fn block_post_destroy(&self, _level: &mut Level, _piece: PieceId) {}
    /// Called before a victim piece fuses into a master
    fn block_pre_fuse(&self, _level: &mut Level, _master: PieceId, _victim: PieceId) {}
    /// Called after a fuse with the brick id remap tables
    fn block_post_fuse(
        &self,
        _level: &mut Level,
        _master: PieceId,
        _victim: PieceId,
        _master_bricks: &HashMap<usize, usize>,
        _victim_bricks: &HashMap<usize, usize>,
    ) {
    }
    /// Called after a scroll committed, once per auto-scrolled piece
    fn block_scrolled(&self, _level: &mut Level, _piece: PieceId, _dir: Direction) {}
}

/// Pre/post hooks keyed on individual brick identifiers
pub trait BlocksBricksIdListener: BlocksListener {
    /// Called before bricks of a piece change
    fn block_pre_modify(
        &self,
        _level: &mut Level,
        _piece: PieceId,
        _deleted: &[usize],
        _repositioned: &[usize],
        _retiled: &[usize],
        _adds_bricks: bool,
    ) {
    }
    /// Called after bricks of a piece changed, with the added brick ids
    fn block_post_modify(
        &self,
        _level: &mut Level,
        _piece: PieceId,
        _deleted: &[usize],
        _repositioned: &[usize],
        _retiled: &[usize],
        _added: &[usize],
    ) {
    }
}

/// Notified whenever the player controlling a piece changes
pub trait BlocksPlayerChangeListener {
    /// `old_player` is the previous controller, `None` for "nobody"
    fn block_changed_player(&self, level: &mut Level, piece: PieceId, old_player: Option<usize>);
}

/// Privileged single observer receiving every pre/post notification
///
/// The primary renderer installs one of these; it is called between the
/// listener-stack pre phase and the structural change, and again right after
/// the change before the listener-stack post phase.
pub trait LevelObserver {
    /// See [`BoardScrollListener::board_pre_scroll`]
    fn board_pre_scroll(&self, _level: &mut Level, _dir: Direction, _tiles: Option<&TileBuffer>) {}
    /// See [`BoardScrollListener::board_post_scroll`]
    fn board_post_scroll(&self, _level: &mut Level, _dir: Direction) {}
    /// See [`BoardListener::board_pre_insert`]
    fn board_pre_insert(
        &self,
        _level: &mut Level,
        _dir: Direction,
        _area: Rect,
        _tiles: Option<&TileBuffer>,
    ) {
    }
    /// See [`BoardListener::board_post_insert`]
    fn board_post_insert(&self, _level: &mut Level, _dir: Direction, _area: Rect) {}
    /// See [`BoardListener::board_pre_destroy`]
    fn board_pre_destroy(&self, _level: &mut Level, _coords: &Coords) {}
    /// See [`BoardListener::board_post_destroy`]
    fn board_post_destroy(&self, _level: &mut Level, _coords: &Coords) {}
    /// See [`BoardListener::board_pre_modify`]
    fn board_pre_modify(&self, _level: &mut Level, _tiles: &TileCoords) {}
    /// See [`BoardListener::board_post_modify`]
    fn board_post_modify(&self, _level: &mut Level, _tiles: &TileCoords) {}
    /// See [`BoaBloListener::boablo_pre_freeze`]
    fn boablo_pre_freeze(&self, _level: &mut Level, _piece: PieceId) {}
    /// See [`BoaBloListener::boablo_post_freeze`]
    fn boablo_post_freeze(&self, _level: &mut Level, _coords: &Coords) {}
    /// See [`BoaBloListener::boablo_pre_unfreeze`]
    fn boablo_pre_unfreeze(&self, _level: &mut Level, _coords: &Coords) {}
    /// See [`BoaBloListener::boablo_post_unfreeze`]
    fn boablo_post_unfreeze(&self, _level: &mut Level, _piece: PieceId) {}
    /// See [`BlocksListener::block_pre_add`]
    fn block_pre_add(&self, _level: &mut Level, _piece: PieceId) {}
    /// See [`BlocksListener::block_post_add`]
    fn block_post_add(&self, _level: &mut Level, _piece: PieceId) {}
    /// See [`BlocksListener::block_pre_remove`]
    fn block_pre_remove(&self, _level: &mut Level, _piece: PieceId) {}
    /// See [`BlocksListener::block_post_remove`]
    fn block_post_remove(&self, _level: &mut Level, _piece: PieceId) {}
    /// See [`BlocksListener::block_pre_destroy`]
    fn block_pre_destroy(&self, _level: &mut Level, _piece: PieceId) {}
    /// See [`BlocksListener::block_post_destroy`]
    fn block_post_destroy(&self, _level: &mut Level, _piece: PieceId) {}
    /// See [`BlocksListener::block_pre_fuse`]
    fn block_pre_fuse(&self, _level: &mut Level, _master: PieceId, _victim: PieceId) {}
    /// See [`BlocksListener::block_post_fuse`]
    fn block_post_fuse(
        &self,
        _level: &mut Level,
        _master: PieceId,
        _victim: PieceId,
        _master_bricks: &HashMap<usize, usize>,
        _victim_bricks: &HashMap<usize, usize>,
    ) {
    }
    /// See [`BlocksListener::block_scrolled`]
    fn block_scrolled(&self, _level: &mut Level, _piece: PieceId, _dir: Direction) {}
}
