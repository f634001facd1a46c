//! The per-level facade composing board, pieces, events and listeners
//!
//! One `Level` owns every mutable structure of a playing field: the grid,
//! the piece registry with its control bookkeeping, the event scheduler and
//! the listener stacks. All mutation happens synchronously inside one call
//! from the driving loop; re-entrant structural mutation is policed by busy
//! flags (board-wide for scroll/insert, per piece for registry operations)
//! and turns into a debug assertion plus a no-op instead of corruption.

/// Control assignment
pub mod control;
/// The consumed game facade
pub mod host;
/// Listener stacks and notification contracts
pub mod listeners;
/// Win/lose/rank resolution
pub mod status;

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::rc::Rc;

use crate::blocks::piece::{MgmtType, Piece, PieceConfig, PieceId, ScrollEviction};
use crate::blocks::shape::{Block, BrickDef};
use crate::board::animator::AnimatorSlot;
use crate::board::grid::Board;
use crate::board::tile::{Tile, TileBuffer};
use crate::error::{Result, invalid_parameter};
use crate::events::filter::{MsgFilter, filter_msg};
use crate::events::scheduler::{EventId, EventLogic, ListenerReg, Scheduler};
use crate::level::control::TeamData;
use crate::level::listeners::{
    BlocksBricksIdListener, BlocksListener, BlocksPlayerChangeListener, BoaBloListener,
    BoardListener, BoardScrollListener, LevelObserver, ListenerStack, listener_key,
};
use crate::spatial::coords::Coords;
use crate::spatial::geometry::{Direction, Point, Rect};
use crate::spatial::tilecoords::TileCoords;

pub use host::{GameHost, SeededHost};
pub use status::{MateStatus, TeamStatus};

/// Team roster entry of a level
#[derive(Debug, Clone, Copy)]
pub struct TeamInit {
    /// Number of mates playing for the team
    pub mates: usize,
}

/// Construction data of a level
#[derive(Debug, Clone)]
pub struct LevelInit {
    /// Board width in cells
    pub width: i32,
    /// Board height in cells
    pub height: i32,
    /// Initial tiles in row-major order; empty means an all-empty board
    pub board: Vec<Tile>,
    /// Number of tile animation channels
    pub channels: usize,
    /// Team roster
    pub teams: Vec<TeamInit>,
    /// Initial interval in ticks between piece fall steps
    pub fall_each_ticks: i32,
    /// Requested tick interval in milliseconds
    pub interval_millis: f64,
}

impl Default for LevelInit {
    fn default() -> Self {
        Self {
            width: 10,
            height: 20,
            board: Vec::new(),
            channels: 0,
            teams: vec![TeamInit { mates: 1 }],
            fall_each_ticks: 8,
            interval_millis: 50.0,
        }
    }
}

/// Brick-level changes applied to a piece in one step
#[derive(Debug, Clone, Default)]
pub struct PieceModify {
    /// Cells the whole piece moves by
    pub delta: Point,
    /// Bricks detached from the piece
    pub remove_bricks: Vec<usize>,
    /// Bricks destroyed (distinguished for the rendering layer)
    pub destroy_bricks: Vec<usize>,
    /// Per-brick position and visibility changes in the active shape
    pub reposition_bricks: Vec<(usize, Point, bool)>,
    /// Per-brick tile replacements
    pub retile_bricks: Vec<(usize, Tile)>,
    /// Bricks added to every shape
    pub add_bricks: Vec<BrickDef>,
}

/// One playable board instance with its pieces, events and bookkeeping
pub struct Level {
    host: Box<dyn GameHost>,
    index: usize,

    board: Board,
    channels: usize,
    /// Structural board operation in flight (scroll/insert)
    board_busy: bool,
    /// Stamp distinguishing the auto-moves of one scroll from the next
    scrolled_unique: u32,

    pieces: BTreeMap<PieceId, Piece>,
    next_piece: u32,

    teams: Vec<TeamData>,
    /// Level player number -> (team, mate)
    players: Vec<(usize, usize)>,

    scroll_stack: ListenerStack<dyn BoardScrollListener>,
    board_stack: ListenerStack<dyn BoardListener>,
    boablo_stack: ListenerStack<dyn BoaBloListener>,
    blocks_stack: ListenerStack<dyn BlocksListener>,
    bricks_stack: ListenerStack<dyn BlocksBricksIdListener>,
    player_change_listeners: Vec<Rc<dyn BlocksPlayerChangeListener>>,
    player_change_nested: bool,
    observer: Option<Rc<dyn LevelObserver>>,

    scheduler: Scheduler,
    others_listeners: Vec<EventId>,
    others_nested: u32,

    fall_each_ticks: i32,
    interval_millis: f64,

    ended_teams: usize,
    technical_report: Option<Vec<String>>,
}

impl Level {
    /// Build a level from its construction data
    ///
    /// # Errors
    ///
    /// Returns an error when the dimensions are not positive, the initial
    /// board does not match them, or the interval is not positive.
    pub fn new(host: Box<dyn GameHost>, index: usize, init: LevelInit) -> Result<Self> {
        if init.width <= 0 {
            return Err(invalid_parameter("width", &init.width, &"must be positive"));
        }
        if init.height <= 0 {
            return Err(invalid_parameter("height", &init.height, &"must be positive"));
        }
        if init.interval_millis <= 0.0 {
            return Err(invalid_parameter(
                "interval_millis",
                &init.interval_millis,
                &"must be positive",
            ));
        }
        let cell_count = (init.width as usize) * (init.height as usize);
        let board_tiles = if init.board.is_empty() {
            vec![Tile::EMPTY; cell_count]
        } else if init.board.len() == cell_count {
            init.board
        } else {
            return Err(crate::error::CoreError::BoardShape {
                expected: cell_count,
                actual: init.board.len(),
            });
        };

        let mut teams = Vec::with_capacity(init.teams.len());
        let mut players = Vec::new();
        for team_init in &init.teams {
            if team_init.mates == 0 {
                return Err(invalid_parameter("mates", &0, &"a team needs at least one mate"));
            }
            let team = teams.len();
            let first_player = players.len();
            for mate in 0..team_init.mates {
                players.push((team, mate));
            }
            teams.push(TeamData::new(team_init.mates, first_player));
        }

        Ok(Self {
            host,
            index,
            board: Board::new(init.width, init.height, &board_tiles, init.channels),
            channels: init.channels,
            board_busy: false,
            scrolled_unique: 0,
            pieces: BTreeMap::new(),
            next_piece: 0,
            teams,
            players,
            scroll_stack: ListenerStack::new(),
            board_stack: ListenerStack::new(),
            boablo_stack: ListenerStack::new(),
            blocks_stack: ListenerStack::new(),
            bricks_stack: ListenerStack::new(),
            player_change_listeners: Vec::new(),
            player_change_nested: false,
            observer: None,
            scheduler: Scheduler::new(),
            others_listeners: Vec::new(),
            others_nested: 0,
            fall_each_ticks: init.fall_each_ticks.max(1),
            interval_millis: init.interval_millis,
            ended_teams: 0,
            technical_report: None,
        })
    }

    /// The level's number within the game
    pub const fn index(&self) -> usize {
        self.index
    }

    /// The game facade the level consumes
    pub fn host(&self) -> &dyn GameHost {
        self.host.as_ref()
    }

    /// Mutable access to the game facade
    pub fn host_mut(&mut self) -> &mut dyn GameHost {
        self.host.as_mut()
    }

    /// The board grid
    pub const fn board(&self) -> &Board {
        &self.board
    }

    /// Number of tile animation channels
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Number of teams playing the level
    pub fn team_count(&self) -> usize {
        self.teams.len()
    }

    /// Number of mates of a team
    pub fn mate_count(&self, team: usize) -> usize {
        self.teams.get(team).map_or(0, |td| td.mates.len())
    }

    /// Number of level players across all teams
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// The (team, mate) pair of a level player
    pub fn player_roster(&self, player: usize) -> Option<(usize, usize)> {
        self.players.get(player).copied()
    }

    /// Number of teams whose game has ended
    pub const fn teams_finished(&self) -> usize {
        self.ended_teams
    }

    /// Ticks elapsed since the game started
    pub fn game_tick(&self) -> i32 {
        self.host.game_tick()
    }

    /// Interval in ticks between piece fall steps
    pub const fn fall_each_ticks(&self) -> i32 {
        self.fall_each_ticks
    }

    /// Change the fall interval; clamped to at least one tick
    pub const fn set_fall_each_ticks(&mut self, ticks: i32) {
        self.fall_each_ticks = if ticks < 1 { 1 } else { ticks };
    }

    /// The level's requested tick interval in milliseconds
    pub const fn interval_millis(&self) -> f64 {
        self.interval_millis
    }

    /// Request a new tick interval, notifying the host
    pub fn set_interval_millis(&mut self, millis: f64) {
        debug_assert!(millis > 0.0);
        if millis == self.interval_millis {
            return;
        }
        self.interval_millis = millis;
        self.host.interval_changed(self.index);
    }

    // ------------------------------------------------------------------ ticks

    /// Advance the host clock by one tick and drain due events
    pub fn run_tick(&mut self) {
        self.host.begin_tick();
        self.process_tick();
    }

    /// Drain and trigger every event due at the current tick
    ///
    /// Events re-activated at or before the current tick during the drain
    /// trigger again in the same call; that is the documented way to run
    /// before higher-priority events.
    pub fn process_tick(&mut self) {
        let now = self.host.game_tick();
        while let Some(front) = self.scheduler.peek_due(now) {
            self.trigger_event(front, 0, 0, None);
        }
    }

    // ----------------------------------------------------------------- events

    /// Add an event (deactivated) and return its handle
    pub fn add_event(&mut self, logic: Box<dyn EventLogic>, priority: i32) -> EventId {
        self.scheduler.add(logic, priority)
    }

    /// Add a named event; an empty or already-taken name leaves it unnamed
    pub fn add_event_named(
        &mut self,
        name: &str,
        logic: Box<dyn EventLogic>,
        priority: i32,
    ) -> EventId {
        let id = self.scheduler.add(logic, priority);
        self.scheduler.name(name, id);
        id
    }

    /// Look up an event by name
    pub fn event_by_name(&self, name: &str) -> Option<EventId> {
        self.scheduler.lookup(name)
    }

    /// Number of events in the level
    pub fn event_count(&self) -> usize {
        self.scheduler.len()
    }

    /// Register `target` as listener of `source`'s group
    ///
    /// A negative `group` listens to every group; a negative `msg` forwards
    /// the fired group id as message.
    pub fn event_add_listener(&mut self, source: EventId, group: i32, target: EventId, msg: i32) {
        debug_assert!(self.scheduler.is_event(source) && self.scheduler.is_event(target));
        self.scheduler
            .slot_mut(source)
            .listeners
            .push(ListenerReg { group, target, msg });
    }

    /// Append a message filter to an event's chain
    pub fn event_add_filter(&mut self, event: EventId, filter: MsgFilter) {
        debug_assert!(self.scheduler.is_event(event));
        self.scheduler.slot_mut(event).filters.push(filter);
    }

    /// Schedule an event to trigger at a tick
    ///
    /// A tick at or before the current one triggers the event while the
    /// current tick drains, ahead of events with higher priority.
    pub fn activate_event(&mut self, event: EventId, tick: i32) {
        self.scheduler.activate(event, tick);
    }

    /// Remove an event from the active queue, clearing its trigger tick
    pub fn deactivate_event(&mut self, event: EventId) {
        self.scheduler.deactivate(event, false);
    }

    /// Whether an event sits in the active queue
    pub fn event_is_active(&self, event: EventId) -> bool {
        self.scheduler.slot(event).active
    }

    /// The tick an event is or was scheduled for
    ///
    /// Triggering keeps the tick readable so logic can tell a premature
    /// trigger from a timer one.
    pub fn event_trigger_tick(&self, event: EventId) -> Option<i32> {
        self.scheduler.slot(event).trigger_tick
    }

    /// Trigger an event now
    ///
    /// Deactivates it first (keeping the trigger tick readable), applies its
    /// filter chain when `origin` names a triggering event, then runs the
    /// logic. A nested trigger of an event already mid-trigger is queued and
    /// runs when the outer call returns.
    pub fn trigger_event(&mut self, event: EventId, msg: i32, value: i32, origin: Option<EventId>) {
        debug_assert!(self.scheduler.is_event(event));
        debug_assert!(msg >= -1);
        let mut msg = msg;
        let mut value = value;
        if origin.is_some() {
            let filters = &self.scheduler.slot(event).filters;
            if !filters.is_empty() && !filter_msg(filters, &mut msg, &mut value) {
                return;
            }
        }
        self.scheduler.deactivate(event, true);
        let slot = self.scheduler.slot_mut(event);
        if slot.logic.is_none() {
            slot.pending.push_back((msg, value, origin));
            return;
        }
        let mut work = Some((msg, value, origin));
        while let Some((m, v, o)) = work {
            let Some(mut logic) = self.scheduler.slot_mut(event).logic.take() else {
                break;
            };
            logic.trigger(self, event, m, v, o);
            let slot = self.scheduler.slot_mut(event);
            slot.logic = Some(logic);
            work = slot.pending.pop_front();
        }
    }

    /// Fire a listener group of an event
    ///
    /// Walks the event's registrations in order and triggers each matching
    /// target with this event as origin.
    pub fn event_inform_listeners(&mut self, source: EventId, group: i32, value: i32) {
        debug_assert!(group >= 0);
        let regs = self.scheduler.slot(source).listeners.clone();
        for reg in regs {
            if reg.group < 0 || reg.group == group {
                let msg = if reg.msg < 0 { group } else { reg.msg };
                self.trigger_event(reg.target, msg, value, Some(source));
            }
        }
    }

    // ----------------------------------------------------------- cross-level

    /// Subscribe an event to messages from other levels
    ///
    /// Returns false when it was already subscribed.
    pub fn others_add_listener(&mut self, event: EventId) -> bool {
        debug_assert!(self.scheduler.is_event(event));
        if self.others_listeners.contains(&event) {
            return false;
        }
        self.others_listeners.insert(0, event);
        true
    }

    /// Unsubscribe an event from other-level messages
    ///
    /// Returns false when it was not subscribed.
    pub fn others_remove_listener(&mut self, event: EventId) -> bool {
        let Some(at) = self.others_listeners.iter().position(|e| *e == event) else {
            return false;
        };
        let _ = self.others_listeners.remove(at);
        true
    }

    /// Broadcast a message to the game's other levels through the host
    pub fn post_to_others(&mut self, msg: i32, value: i32) {
        let index = self.index;
        self.host.send_to_others(index, msg, value);
    }

    /// Deliver a message broadcast by another level
    ///
    /// Legitimate short reaction chains across levels are expected, so this
    /// path uses a bounded nesting counter instead of a busy flag; past the
    /// cap the message is dropped with a diagnostic.
    #[allow(clippy::print_stderr)]
    pub fn others_receive(&mut self, sender_level: usize, msg: i32, value: i32) {
        debug_assert!(sender_level != self.index, "others_receive: own level");
        self.others_nested += 1;
        if self.others_nested >= 10 {
            eprintln!("Level::others_receive: too many nested calls, dropping message");
        } else {
            let listeners = self.others_listeners.clone();
            for event in listeners {
                // a listener still mid-trigger would have this delivery queued
                // past the nesting guard; drop it instead
                if self.scheduler.slot(event).logic.is_none() {
                    eprintln!("Level::others_receive: listener mid-trigger, dropping message");
                    continue;
                }
                self.trigger_event(event, msg, value, Some(event));
            }
        }
        self.others_nested -= 1;
    }

    // ------------------------------------------------------- board accessors

    /// The tile of a board cell
    pub fn board_tile(&self, p: Point) -> Tile {
        self.board.tile(p)
    }

    /// Write a single board tile
    ///
    /// Single-cell writes carry no notification protocol; use
    /// [`board_modify`](Self::board_modify) when listeners must see the
    /// change.
    pub fn board_set_tile(&mut self, p: Point, tile: Tile) {
        self.board.set_tile(p, tile);
    }

    /// The piece owning a board cell
    pub fn board_owner(&self, p: Point) -> Option<PieceId> {
        self.board.owner(p)
    }

    /// Install or clear the animator of a board cell and channel
    pub fn board_set_animator(&mut self, p: Point, channel: usize, slot: Option<AnimatorSlot>) {
        self.board.set_animator(p, channel, slot);
    }

    /// The unary elapsed time of a board cell's animation channel
    pub fn board_animator_elapsed(
        &self,
        p: Point,
        channel: usize,
        view_tick: i32,
        tot_view_ticks: i32,
    ) -> f64 {
        self.board.animator_elapsed(p, channel, view_tick, tot_view_ticks)
    }

    // -------------------------------------------------------- board protocol

    /// Rewrite several board cells at once
    ///
    /// Animators and cell ownership are left untouched. Every position must
    /// lie on the board.
    pub fn board_modify(&mut self, tiles: &TileCoords) {
        let frame = self.board_stack.push_frame();
        while let Some(l) = self.board_stack.pre_next(frame) {
            l.board_pre_modify(self, tiles);
        }
        if let Some(obs) = self.observer.clone() {
            obs.board_pre_modify(self, tiles);
        }

        for (p, tile) in tiles.iter() {
            debug_assert!(self.board.in_bounds(p), "board_modify: cell off the board");
            if self.board.in_bounds(p) {
                self.board.set_tile(p, tile);
            }
        }

        if let Some(obs) = self.observer.clone() {
            obs.board_post_modify(self, tiles);
        }
        while let Some(l) = self.board_stack.post_next(frame) {
            l.board_post_modify(self, tiles);
        }
        self.board_stack.pop_frame(frame);
    }

    /// Destroy board cells, setting their tiles to empty
    ///
    /// Distinguished from a modify so the rendering layer can spawn
    /// destruction effects. Animators and ownership are left untouched.
    pub fn board_destroy(&mut self, coords: &Coords) {
        let frame = self.board_stack.push_frame();
        while let Some(l) = self.board_stack.pre_next(frame) {
            l.board_pre_destroy(self, coords);
        }
        if let Some(obs) = self.observer.clone() {
            obs.board_pre_destroy(self, coords);
        }

        for p in coords.iter() {
            debug_assert!(self.board.in_bounds(p), "board_destroy: cell off the board");
        }
        let doomed: Vec<Point> = coords.iter().filter(|p| self.board.in_bounds(*p)).collect();
        for p in doomed {
            self.board.set_tile(p, Tile::EMPTY);
        }

        if let Some(obs) = self.observer.clone() {
            obs.board_post_destroy(self, coords);
        }
        while let Some(l) = self.board_stack.post_next(frame) {
            l.board_post_destroy(self, coords);
        }
        self.board_stack.pop_frame(frame);
    }

    /// Insert a lane into a rectangular area, shifting its content
    ///
    /// Tiles and animators move one step in `dir`; the freed lane is filled
    /// from `tiles` (or left empty) with cleared animators. Cell ownership
    /// does not move. No-op under assertion while another structural
    /// operation is in flight.
    pub fn board_insert(&mut self, dir: Direction, area: Rect, tiles: Option<&TileBuffer>) {
        debug_assert!(
            area.x >= 0
                && area.w > 0
                && area.x + area.w <= self.board.width()
                && area.y >= 0
                && area.h > 0
                && area.y + area.h <= self.board.height(),
            "board_insert: area not on the board"
        );
        if self.board_busy {
            debug_assert!(false, "board_insert: structural operation in flight");
            return;
        }
        self.board_busy = true;

        let frame = self.board_stack.push_frame();
        while let Some(l) = self.board_stack.pre_next(frame) {
            l.board_pre_insert(self, dir, area, tiles);
        }
        if let Some(obs) = self.observer.clone() {
            obs.board_pre_insert(self, dir, area, tiles);
        }

        let _ = self.board.shift_insert(dir, area, tiles);

        if let Some(obs) = self.observer.clone() {
            obs.board_post_insert(self, dir, area);
        }
        while let Some(l) = self.board_stack.post_next(frame) {
            l.board_post_insert(self, dir, area);
        }
        self.board_stack.pop_frame(frame);

        self.board_busy = false;
    }

    /// Scroll the whole board one step in a direction
    ///
    /// Pieces occupying the lane that falls off the board are evicted first
    /// according to their eviction policy; a piece that denies eviction
    /// aborts the scroll before anything changes, reporting a technical
    /// failure. Auto-scrolled pieces move with the board and get their
    /// scrolled callback once the change has fully committed. Returns
    /// whether the scroll went through.
    pub fn board_scroll(&mut self, dir: Direction, tiles: Option<&TileBuffer>) -> bool {
        if self.board_busy {
            debug_assert!(false, "board_scroll: structural operation in flight");
            return false;
        }

        // collect the lane's occupants before anything is notified, so a
        // denied eviction leaves the level untouched
        let lane = self.board.doomed_lane(dir);
        let mut evict: Vec<PieceId> = Vec::new();
        for p in rect_cells(lane) {
            let Some(owner) = self.board.owner(p) else {
                continue;
            };
            if evict.contains(&owner) {
                continue;
            }
            if self.pieces.get(&owner).is_some_and(|piece| piece.eviction == ScrollEviction::Deny)
            {
                self.status_technical(vec![
                    "board_scroll".to_owned(),
                    "a piece refused to be scrolled off the board".to_owned(),
                ]);
                return false;
            }
            evict.push(owner);
        }

        self.board_busy = true;
        let frame = self.scroll_stack.push_frame();
        while let Some(l) = self.scroll_stack.pre_next(frame) {
            l.board_pre_scroll(self, dir, tiles);
        }

        for id in evict {
            let policy = self.pieces.get(&id).map(|p| p.eviction);
            let done = match policy {
                Some(ScrollEviction::Freeze) => {
                    self.piece_freeze(id) || self.piece_remove(id) || self.piece_destroy(id)
                }
                Some(ScrollEviction::Remove) => self.piece_remove(id) || self.piece_destroy(id),
                Some(ScrollEviction::Destroy) => self.piece_destroy(id),
                // already evicted by a pre-scroll callback
                None => true,
                Some(ScrollEviction::Deny) => false,
            };
            if !done {
                self.status_technical(vec![
                    "board_scroll".to_owned(),
                    "a piece could not be evicted off the board".to_owned(),
                ]);
                while let Some(l) = self.scroll_stack.post_next(frame) {
                    l.board_post_scroll(self, dir);
                }
                self.scroll_stack.pop_frame(frame);
                self.board_busy = false;
                return false;
            }
        }

        if let Some(obs) = self.observer.clone() {
            obs.board_pre_scroll(self, dir, tiles);
        }

        self.scrolled_unique += 1;
        let stamp = self.scrolled_unique;
        self.board.shift_scroll(dir, tiles);

        let (dx, dy) = (dir.delta_x(), dir.delta_y());
        let auto_moved: Vec<PieceId> = self
            .pieces
            .values()
            .filter(|piece| piece.mgmt.is_auto_scrolled())
            .map(Piece::id)
            .collect();
        for id in &auto_moved {
            if let Some(piece) = self.pieces.get_mut(id) {
                piece.pos = piece.pos.offset(dx, dy);
                piece.scrolled_marker = stamp;
            }
        }

        if let Some(obs) = self.observer.clone() {
            obs.board_post_scroll(self, dir);
        }
        while let Some(l) = self.scroll_stack.post_next(frame) {
            l.board_post_scroll(self, dir);
        }
        self.scroll_stack.pop_frame(frame);
        self.board_busy = false;

        // scrolled callbacks run only after the change fully committed
        for id in auto_moved {
            if self.pieces.get(&id).is_some_and(|p| p.scrolled_marker == stamp) {
                for l in self.blocks_stack.snapshot() {
                    l.block_scrolled(self, id, dir);
                }
                if let Some(obs) = self.observer.clone() {
                    obs.block_scrolled(self, id, dir);
                }
            }
        }
        true
    }

    // -------------------------------------------------------------- placement

    /// Whether a block shape could be placed at a position
    ///
    /// Every visible brick cell must lie on the board and be unowned; in
    /// strict mode the cells must also hold empty tiles.
    pub fn can_place_block(&self, block: &Block, shape: usize, pos: Point, strict: bool) -> bool {
        self.can_place_cells(
            block
                .visible_cells(shape)
                .map(|(_, p)| Point::new(pos.x + p.x, pos.y + p.y)),
            strict,
        )
    }

    /// Whether every position of a set is placeable
    pub fn can_place_coords(&self, coords: &Coords, strict: bool) -> bool {
        self.can_place_cells(coords.iter(), strict)
    }

    fn can_place_cells(&self, cells: impl Iterator<Item = Point>, strict: bool) -> bool {
        for p in cells {
            if !self.board.in_bounds(p) {
                return false;
            }
            if self.board.owner(p).is_some() {
                return false;
            }
            if strict && !self.board.tile(p).is_empty() {
                return false;
            }
        }
        true
    }

    /// Whether any visible brick of a piece lies within a rectangle
    pub fn piece_intersects_area(&self, id: PieceId, area: Rect) -> bool {
        self.pieces.get(&id).is_some_and(|piece| {
            piece
                .visible_board_cells()
                .iter()
                .any(|(_, p)| area.contains(*p))
        })
    }

    /// Whether all visible bricks of a piece stay within a rectangle after a move
    pub fn piece_move_within_area(&self, id: PieceId, dx: i32, dy: i32, area: Rect) -> bool {
        self.pieces.get(&id).is_some_and(|piece| {
            piece
                .visible_board_cells()
                .iter()
                .all(|(_, p)| area.contains(p.offset(dx, dy)))
        })
    }

    // ------------------------------------------------------------ piece query

    /// A placed piece by handle
    pub fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.get(&id)
    }

    /// The handles of all placed pieces in ascending order
    pub fn piece_ids(&self) -> Vec<PieceId> {
        self.pieces.keys().copied().collect()
    }

    /// Install or clear a brick animator on a piece
    pub fn piece_set_brick_animator(
        &mut self,
        id: PieceId,
        brick: usize,
        channel: usize,
        slot: Option<AnimatorSlot>,
    ) {
        if let Some(piece) = self.pieces.get_mut(&id) {
            piece.set_brick_animator(brick, channel, slot);
        }
    }

    // ------------------------------------------------------------- piece ops

    /// Place a new piece on the level
    ///
    /// With an auto-owner management type the placement claims exclusive
    /// ownership of the covered cells and fails (returning `None`) when any
    /// cell is owned, or non-empty under the strict variant. Placement
    /// conflicts are expected outcomes, not errors.
    pub fn piece_add(
        &mut self,
        block: Block,
        shape: usize,
        pos: Point,
        config: PieceConfig,
        mgmt: MgmtType,
    ) -> Option<PieceId> {
        if mgmt.is_auto_owner() && !self.can_place_block(&block, shape, pos, mgmt.is_strict_owner())
        {
            return None;
        }
        let id = self.alloc_piece_id();
        let mut piece = Piece::new(id, block, shape, pos, config, mgmt, self.channels);
        piece.busy = true;
        let _ = self.pieces.insert(id, piece);

        let frame = self.blocks_stack.push_frame();
        while let Some(l) = self.blocks_stack.pre_next(frame) {
            l.block_pre_add(self, id);
        }
        if let Some(obs) = self.observer.clone() {
            obs.block_pre_add(self, id);
        }

        if mgmt.is_auto_owner() {
            self.owner_block_set(id);
        }
        self.piece_register_common(id);

        if let Some(obs) = self.observer.clone() {
            obs.block_post_add(self, id);
        }
        while let Some(l) = self.blocks_stack.post_next(frame) {
            l.block_post_add(self, id);
        }
        self.blocks_stack.pop_frame(frame);

        if let Some(piece) = self.pieces.get_mut(&id) {
            piece.busy = false;
        }
        Some(id)
    }

    /// Carve a set of non-empty board cells into a freshly placed piece
    ///
    /// The cells become the bricks of a single-shape block positioned at the
    /// set's bounding rectangle origin; the board cells are emptied. Fails
    /// (returning `None`) when an auto-owner placement finds an owned cell.
    pub fn piece_unfreeze(
        &mut self,
        coords: &Coords,
        config: PieceConfig,
        mgmt: MgmtType,
    ) -> Option<PieceId> {
        debug_assert!(!coords.is_empty(), "piece_unfreeze: empty coords");
        if coords.is_empty() {
            return None;
        }
        if mgmt.is_auto_owner() && !self.can_place_coords(coords, false) {
            return None;
        }

        let frame = self.boablo_stack.push_frame();
        while let Some(l) = self.boablo_stack.pre_next(frame) {
            l.boablo_pre_unfreeze(self, coords);
        }
        if let Some(obs) = self.observer.clone() {
            obs.boablo_pre_unfreeze(self, coords);
        }

        let origin = coords.min_max();
        let mut cells: Vec<Point> = coords.iter().collect();
        cells.sort_by_key(|p| (p.y, p.x));
        let mut defs = Vec::with_capacity(cells.len());
        for p in &cells {
            let tile = self.board.tile(*p);
            debug_assert!(!tile.is_empty(), "piece_unfreeze: empty board cell");
            defs.push(BrickDef::new(tile, p.x - origin.x, p.y - origin.y));
            self.board.set_tile(*p, Tile::EMPTY);
        }
        let block = Block::from_bricks(&defs);

        let id = self.alloc_piece_id();
        let mut piece = Piece::new(
            id,
            block,
            0,
            Point::new(origin.x, origin.y),
            config,
            mgmt,
            self.channels,
        );
        piece.busy = true;
        let _ = self.pieces.insert(id, piece);

        if mgmt.is_auto_owner() {
            self.owner_block_set(id);
        }
        self.piece_register_common(id);

        if let Some(obs) = self.observer.clone() {
            obs.boablo_post_unfreeze(self, id);
        }
        while let Some(l) = self.boablo_stack.post_next(frame) {
            l.boablo_post_unfreeze(self, id);
        }
        self.boablo_stack.pop_frame(frame);

        if let Some(piece) = self.pieces.get_mut(&id) {
            piece.busy = false;
        }
        Some(id)
    }

    /// Detach a piece without writing its tiles back to the board
    pub fn piece_remove(&mut self, id: PieceId) -> bool {
        let Some(piece) = self.pieces.get_mut(&id) else {
            return false;
        };
        if piece.busy {
            debug_assert!(false, "piece_remove: piece mid-mutation");
            return false;
        }
        piece.busy = true;
        let auto_owner = piece.mgmt.is_auto_owner();

        let frame = self.blocks_stack.push_frame();
        while let Some(l) = self.blocks_stack.pre_next(frame) {
            l.block_pre_remove(self, id);
        }
        if let Some(obs) = self.observer.clone() {
            obs.block_pre_remove(self, id);
        }

        if auto_owner {
            self.owner_block_clear(id);
        }
        self.piece_unregister_common(id);

        if let Some(obs) = self.observer.clone() {
            obs.block_post_remove(self, id);
        }
        while let Some(l) = self.blocks_stack.post_next(frame) {
            l.block_post_remove(self, id);
        }
        self.blocks_stack.pop_frame(frame);
        true
    }

    /// Destroy a piece
    ///
    /// Identical to a removal at this layer; the distinct notification lets
    /// the rendering layer spawn destruction effects.
    pub fn piece_destroy(&mut self, id: PieceId) -> bool {
        let Some(piece) = self.pieces.get_mut(&id) else {
            return false;
        };
        if piece.busy {
            debug_assert!(false, "piece_destroy: piece mid-mutation");
            return false;
        }
        piece.busy = true;
        let auto_owner = piece.mgmt.is_auto_owner();

        let frame = self.blocks_stack.push_frame();
        while let Some(l) = self.blocks_stack.pre_next(frame) {
            l.block_pre_destroy(self, id);
        }
        if let Some(obs) = self.observer.clone() {
            obs.block_pre_destroy(self, id);
        }

        if auto_owner {
            self.owner_block_clear(id);
        }
        self.piece_unregister_common(id);

        if let Some(obs) = self.observer.clone() {
            obs.block_post_destroy(self, id);
        }
        while let Some(l) = self.blocks_stack.post_next(frame) {
            l.block_post_destroy(self, id);
        }
        self.blocks_stack.pop_frame(frame);
        true
    }

    /// Bake a piece's visible bricks into the static board tiles
    pub fn piece_freeze(&mut self, id: PieceId) -> bool {
        let Some(piece) = self.pieces.get_mut(&id) else {
            return false;
        };
        if piece.busy {
            debug_assert!(false, "piece_freeze: piece mid-mutation");
            return false;
        }
        piece.busy = true;
        let auto_owner = piece.mgmt.is_auto_owner();

        let frame = self.boablo_stack.push_frame();
        while let Some(l) = self.boablo_stack.pre_next(frame) {
            l.boablo_pre_freeze(self, id);
        }
        if let Some(obs) = self.observer.clone() {
            obs.boablo_pre_freeze(self, id);
        }

        let mut coords = Coords::new();
        if let Some(piece) = self.pieces.get(&id) {
            for (brick, p) in piece.visible_board_cells() {
                coords.add(p);
                let tile = piece.block.tile_of(brick);
                debug_assert!(self.board.in_bounds(p), "piece_freeze: brick off the board");
                if self.board.in_bounds(p) {
                    self.board.set_tile(p, tile);
                }
            }
        }

        if auto_owner {
            self.owner_block_clear(id);
        }
        self.piece_unregister_common(id);

        if let Some(obs) = self.observer.clone() {
            obs.boablo_post_freeze(self, &coords);
        }
        while let Some(l) = self.boablo_stack.post_next(frame) {
            l.boablo_post_freeze(self, &coords);
        }
        self.boablo_stack.pop_frame(frame);
        true
    }

    /// Fuse a victim piece into a master piece
    ///
    /// The merged block concatenates the visible bricks of both active
    /// shapes and renumbers them; brick animators follow their bricks across
    /// the renumbering. The victim is unregistered. Returns false when
    /// either piece is unknown, busy or the same as the other.
    pub fn piece_fuse(&mut self, master: PieceId, victim: PieceId) -> bool {
        if master == victim {
            debug_assert!(false, "piece_fuse: piece fused with itself");
            return false;
        }
        let Some(master_piece) = self.pieces.get(&master) else {
            return false;
        };
        let Some(victim_piece) = self.pieces.get(&victim) else {
            return false;
        };
        if master_piece.busy || victim_piece.busy {
            debug_assert!(false, "piece_fuse: piece mid-mutation");
            return false;
        }
        let master_auto = master_piece.mgmt.is_auto_owner();
        let victim_auto = victim_piece.mgmt.is_auto_owner();
        if let Some(piece) = self.pieces.get_mut(&master) {
            piece.busy = true;
        }
        if let Some(piece) = self.pieces.get_mut(&victim) {
            piece.busy = true;
        }

        let frame = self.blocks_stack.push_frame();
        while let Some(l) = self.blocks_stack.pre_next(frame) {
            l.block_pre_fuse(self, master, victim);
        }
        if let Some(obs) = self.observer.clone() {
            obs.block_pre_fuse(self, master, victim);
        }

        if master_auto {
            self.owner_block_clear(master);
        }

        let outcome = {
            let master_piece = &self.pieces[&master];
            let victim_piece = &self.pieces[&victim];
            let rel = Point::new(
                victim_piece.pos.x - master_piece.pos.x,
                victim_piece.pos.y - master_piece.pos.y,
            );
            Block::fuse(
                &master_piece.block,
                master_piece.shape,
                &victim_piece.block,
                victim_piece.shape,
                rel,
            )
        };

        // brick animators follow their bricks across the renumbering
        let mut merged_anis = HashMap::new();
        if let Some(piece) = self.pieces.get_mut(&master) {
            for (old, new) in &outcome.master_bricks {
                if let Some(anis) = piece.brick_anis.remove(old) {
                    let _ = merged_anis.insert(*new, anis);
                }
            }
        }
        if let Some(piece) = self.pieces.get_mut(&victim) {
            for (old, new) in &outcome.victim_bricks {
                if let Some(anis) = piece.brick_anis.remove(old) {
                    let _ = merged_anis.insert(*new, anis);
                }
            }
        }

        if victim_auto {
            self.owner_block_clear(victim);
        }
        self.piece_unregister_common(victim);

        if let Some(piece) = self.pieces.get_mut(&master) {
            piece.block = outcome.block.clone();
            piece.shape = 0;
            piece.pos = piece.pos.offset(outcome.origin_delta.x, outcome.origin_delta.y);
            piece.brick_anis = merged_anis;
        }
        if master_auto {
            self.owner_block_set(master);
        }
        self.reposition_controllable(master);

        if let Some(obs) = self.observer.clone() {
            obs.block_post_fuse(
                self,
                master,
                victim,
                &outcome.master_bricks,
                &outcome.victim_bricks,
            );
        }
        while let Some(l) = self.blocks_stack.post_next(frame) {
            l.block_post_fuse(
                self,
                master,
                victim,
                &outcome.master_bricks,
                &outcome.victim_bricks,
            );
        }
        self.blocks_stack.pop_frame(frame);

        if let Some(piece) = self.pieces.get_mut(&master) {
            piece.busy = false;
        }
        true
    }

    /// Apply brick-level changes to a piece
    ///
    /// Removals, destructions, repositions, tile changes and additions are
    /// applied in that order after the brick-id listeners' pre phase; cell
    /// ownership is re-established afterwards for auto-owner pieces.
    pub fn piece_modify(&mut self, id: PieceId, modify: &PieceModify) -> bool {
        let Some(piece) = self.pieces.get_mut(&id) else {
            return false;
        };
        if piece.busy {
            debug_assert!(false, "piece_modify: piece mid-mutation");
            return false;
        }
        piece.busy = true;
        let auto_owner = piece.mgmt.is_auto_owner();

        let mut deleted: Vec<usize> = Vec::new();
        deleted.extend_from_slice(&modify.remove_bricks);
        deleted.extend_from_slice(&modify.destroy_bricks);
        let repositioned: Vec<usize> = modify.reposition_bricks.iter().map(|r| r.0).collect();
        let retiled: Vec<usize> = modify.retile_bricks.iter().map(|r| r.0).collect();
        let adds_bricks = !modify.add_bricks.is_empty();

        let frame = self.bricks_stack.push_frame();
        while let Some(l) = self.bricks_stack.pre_next(frame) {
            l.block_pre_modify(self, id, &deleted, &repositioned, &retiled, adds_bricks);
        }

        if auto_owner {
            self.owner_block_clear(id);
        }
        let mut added: Vec<usize> = Vec::new();
        if let Some(piece) = self.pieces.get_mut(&id) {
            for brick in &deleted {
                piece.block.remove_brick(*brick);
                let _ = piece.brick_anis.remove(brick);
            }
            let shape = piece.shape;
            for (brick, pos, visible) in &modify.reposition_bricks {
                piece.block.set_brick_pos_visible(shape, *brick, *pos, *visible);
            }
            for (brick, tile) in &modify.retile_bricks {
                piece.block.set_brick_tile(*brick, *tile);
            }
            for def in &modify.add_bricks {
                added.push(piece.block.add_brick(def.tile, def.pos, def.visible));
            }
            piece.pos = piece.pos.offset(modify.delta.x, modify.delta.y);
        }
        if auto_owner {
            self.owner_block_set(id);
        }

        while let Some(l) = self.bricks_stack.post_next(frame) {
            l.block_post_modify(self, id, &deleted, &repositioned, &retiled, &added);
        }
        self.bricks_stack.pop_frame(frame);

        if let Some(piece) = self.pieces.get_mut(&id) {
            piece.busy = false;
        }
        true
    }

    /// Move a piece by a cell delta, keeping its shape
    pub fn piece_move(&mut self, id: PieceId, dx: i32, dy: i32) -> bool {
        let Some(shape) = self.pieces.get(&id).map(|p| p.shape) else {
            return false;
        };
        self.piece_move_rotate(id, shape, dx, dy)
    }

    /// Set a piece's shape and move it in one step
    pub fn piece_move_rotate(&mut self, id: PieceId, shape: usize, dx: i32, dy: i32) -> bool {
        let Some(piece) = self.pieces.get_mut(&id) else {
            return false;
        };
        if piece.busy {
            debug_assert!(false, "piece_move_rotate: piece mid-mutation");
            return false;
        }
        debug_assert!(shape < piece.block.shape_count(), "piece_move_rotate: bad shape");
        piece.busy = true;
        let auto_owner = piece.mgmt.is_auto_owner();

        let frame = self.bricks_stack.push_frame();
        while let Some(l) = self.bricks_stack.pre_next(frame) {
            l.block_pre_modify(self, id, &[], &[], &[], false);
        }

        if auto_owner {
            self.owner_block_clear(id);
        }
        if let Some(piece) = self.pieces.get_mut(&id) {
            piece.shape = shape;
            piece.pos = piece.pos.offset(dx, dy);
        }
        if auto_owner {
            self.owner_block_set(id);
        }

        while let Some(l) = self.bricks_stack.post_next(frame) {
            l.block_post_modify(self, id, &[], &[], &[], &[]);
        }
        self.bricks_stack.pop_frame(frame);

        if let Some(piece) = self.pieces.get_mut(&id) {
            piece.busy = false;
        }
        true
    }

    // ---------------------------------------------------- listener registries

    /// Register a listener for insert/destroy/modify, scroll and freeze/unfreeze
    pub fn add_board_listener<T: BoardListener + 'static>(&mut self, listener: &Rc<T>) {
        self.board_stack.add(listener.clone());
        self.scroll_stack.add(listener.clone());
        self.boablo_stack.add(listener.clone());
    }

    /// Unregister a board listener
    pub fn remove_board_listener<T: BoardListener + 'static>(&mut self, listener: &Rc<T>) {
        let key = listener_key(listener);
        self.board_stack.remove(key);
        self.scroll_stack.remove(key);
        self.boablo_stack.remove(key);
    }

    /// Register a listener for scrolls only
    pub fn add_board_scroll_listener<T: BoardScrollListener + 'static>(&mut self, listener: &Rc<T>) {
        self.scroll_stack.add(listener.clone());
    }

    /// Unregister a scroll listener
    pub fn remove_board_scroll_listener<T: BoardScrollListener + 'static>(
        &mut self,
        listener: &Rc<T>,
    ) {
        self.scroll_stack.remove(listener_key(listener));
    }

    /// Register a listener for piece add/remove/destroy/fuse and freeze/unfreeze
    pub fn add_blocks_listener<T: BlocksListener + 'static>(&mut self, listener: &Rc<T>) {
        self.blocks_stack.add(listener.clone());
        self.boablo_stack.add(listener.clone());
    }

    /// Unregister a blocks listener
    pub fn remove_blocks_listener<T: BlocksListener + 'static>(&mut self, listener: &Rc<T>) {
        let key = listener_key(listener);
        self.blocks_stack.remove(key);
        self.boablo_stack.remove(key);
    }

    /// Register a listener keyed on individual brick identifiers
    pub fn add_bricks_id_listener<T: BlocksBricksIdListener + 'static>(&mut self, listener: &Rc<T>) {
        self.bricks_stack.add(listener.clone());
        self.blocks_stack.add(listener.clone());
        self.boablo_stack.add(listener.clone());
    }

    /// Unregister a brick-id listener
    pub fn remove_bricks_id_listener<T: BlocksBricksIdListener + 'static>(
        &mut self,
        listener: &Rc<T>,
    ) {
        let key = listener_key(listener);
        self.bricks_stack.remove(key);
        self.blocks_stack.remove(key);
        self.boablo_stack.remove(key);
    }

    /// Register a player-change listener
    pub fn add_player_change_listener(&mut self, listener: Rc<dyn BlocksPlayerChangeListener>) {
        debug_assert!(
            !self
                .player_change_listeners
                .iter()
                .any(|l| listener_key(l) == listener_key(&listener)),
            "add_player_change_listener: already registered"
        );
        self.player_change_listeners.push(listener);
    }

    /// Unregister a player-change listener
    pub fn remove_player_change_listener(&mut self, listener: &Rc<dyn BlocksPlayerChangeListener>) {
        let key = listener_key(listener);
        if let Some(at) = self
            .player_change_listeners
            .iter()
            .position(|l| listener_key(l) == key)
        {
            let _ = self.player_change_listeners.remove(at);
        }
    }

    /// Install the privileged observer, replacing any previous one
    pub fn set_observer(&mut self, observer: Option<Rc<dyn LevelObserver>>) {
        self.observer = observer;
    }

    // --------------------------------------------------------------- internal

    fn alloc_piece_id(&mut self) -> PieceId {
        let id = PieceId::new(self.next_piece);
        self.next_piece += 1;
        id
    }

    /// Claim cell ownership for every visible brick of a piece
    fn owner_block_set(&mut self, id: PieceId) {
        let Some(piece) = self.pieces.get(&id) else {
            return;
        };
        for (_, p) in piece.visible_board_cells() {
            debug_assert!(self.board.in_bounds(p), "owner_block_set: brick off the board");
        }
        let cells = piece.visible_board_cells();
        for (_, p) in cells {
            if self.board.in_bounds(p) {
                self.board.set_owner(p, Some(id));
            }
        }
    }

    /// Release the cell ownership of a piece's visible bricks
    fn owner_block_clear(&mut self, id: PieceId) {
        let Some(piece) = self.pieces.get(&id) else {
            return;
        };
        let cells = piece.visible_board_cells();
        for (_, p) in cells {
            if self.board.in_bounds(p) {
                debug_assert!(
                    self.board.owner(p).is_none_or(|owner| owner == id),
                    "owner_block_clear: cell owned by another piece"
                );
                self.board.set_owner(p, None);
            }
        }
    }

    /// Control bookkeeping for a newly placed piece
    fn piece_register_common(&mut self, id: PieceId) {
        let Some(piece) = self.pieces.get(&id) else {
            return;
        };
        if !piece.controllable {
            return;
        }
        let controller_team = piece.controller_team;
        self.add_to_controllable(id, controller_team, None);
        self.assign_control_to_longest_waiting(id, controller_team);
    }

    /// Undo the control bookkeeping of a departing piece and drop it
    fn piece_unregister_common(&mut self, id: PieceId) {
        let Some(piece) = self.pieces.get(&id) else {
            return;
        };
        let old_player = piece.player;
        let old_team = piece.team;
        let old_mate = piece.mate;
        let controllable = piece.controllable;

        let mut new_controlled = None;
        if old_player.is_some() {
            let (unassigned, next) = self.unassign_control_from_mate(id, None);
            debug_assert!(unassigned);
            new_controlled = next;
        }
        if controllable {
            self.remove_from_controllable(id, None);
        }
        if old_player.is_some() {
            self.inform_change_player(id, old_player);
            if let (Some(next), Some(team), Some(mate)) = (new_controlled, old_team, old_mate) {
                self.assign_to_mate(next, team, mate, true);
            }
        }
        let _ = self.pieces.remove(&id);
    }
}

/// Iterate the cells of a rectangle row by row
fn rect_cells(rect: Rect) -> impl Iterator<Item = Point> {
    (rect.y..rect.y + rect.h)
        .flat_map(move |y| (rect.x..rect.x + rect.w).map(move |x| Point::new(x, y)))
}
