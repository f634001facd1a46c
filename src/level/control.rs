//! Control assignment: which mate steers which piece
//!
//! Each team keeps its controllable pieces in a list ordered by ascending
//! origin x (ties keep insertion order). When a piece becomes controllable,
//! the mate that has waited longest since last being in control takes it;
//! ties resolve uniformly at random through the host. Cycling walks the
//! ordered list ring-wise from the currently controlled piece.

use crate::blocks::piece::PieceId;
use crate::level::Level;
use crate::level::status::{MateStatus, TeamStatus};

/// Per-mate control bookkeeping
pub(crate) struct MateData {
    /// Piece currently steered by this mate
    pub controlled: Option<PieceId>,
    /// Tick the mate last took control; drives the fairness ordering
    pub last_time_in_control: i32,
    /// Level-wide player number of this mate
    pub level_player: usize,
    pub status: MateStatus,
    /// Elapsed milliseconds when the mate's game ended
    pub finished_millis: Option<i32>,
}

/// Per-team control bookkeeping and outcome
pub(crate) struct TeamData {
    /// Controllable pieces ordered by ascending origin x, insertion order on ties
    pub ordered: Vec<PieceId>,
    /// Number of mates currently controlling a piece
    pub tot_in_control: usize,
    pub mates: Vec<MateData>,
    pub status: TeamStatus,
    /// Elapsed milliseconds when the team's game ended
    pub finished_millis: Option<i32>,
    pub rank: Option<i32>,
}

impl TeamData {
    pub(crate) fn new(mates: usize, first_level_player: usize) -> Self {
        Self {
            ordered: Vec::new(),
            tot_in_control: 0,
            mates: (0..mates)
                .map(|mate| MateData {
                    controlled: None,
                    last_time_in_control: -1,
                    level_player: first_level_player + mate,
                    status: MateStatus::Playing,
                    finished_millis: None,
                })
                .collect(),
            status: TeamStatus::Playing,
            finished_millis: None,
            rank: None,
        }
    }
}

impl Level {
    /// The piece currently controlled by a mate
    pub fn controlled_piece(&self, team: usize, mate: usize) -> Option<PieceId> {
        self.teams.get(team)?.mates.get(mate)?.controlled
    }

    /// The controllable pieces of a team in cycling order
    pub fn controllable_pieces(&self, team: usize) -> &[PieceId] {
        self.teams.get(team).map_or(&[], |td| &td.ordered)
    }

    /// Give a mate's controlled piece up in favor of another controllable one
    ///
    /// Walks the team's ordered list from the currently controlled piece and
    /// assigns the first uncontrolled one, or `preferred` when it is
    /// eligible. Does nothing when the piece is uncontrolled or no other
    /// piece is available.
    pub fn piece_cycle_control(&mut self, id: PieceId, preferred: Option<PieceId>) {
        let Some(piece) = self.pieces.get(&id) else {
            debug_assert!(false, "piece_cycle_control: unknown piece");
            return;
        };
        let (Some(player), Some(team), Some(mate)) = (piece.player, piece.team, piece.mate) else {
            return;
        };

        let preferred = preferred.filter(|p| {
            self.pieces.get(p).is_some_and(|cand| {
                cand.player.is_none()
                    && cand.controllable
                    && cand.controller_team.is_none_or(|t| t == team)
            })
        });

        let next = preferred.or_else(|| self.next_uncontrolled(team, id));
        let Some(next) = next else {
            return;
        };

        if let Some(piece) = self.pieces.get_mut(&id) {
            piece.team = None;
            piece.mate = None;
            piece.player = None;
        }
        let tick = self.host.game_tick();
        let td = &mut self.teams[team];
        debug_assert_eq!(td.mates[mate].controlled, Some(id));
        td.mates[mate].controlled = None;
        td.mates[mate].last_time_in_control = tick;
        td.tot_in_control -= 1;
        self.inform_change_player(id, Some(player));

        let td = &mut self.teams[team];
        td.mates[mate].controlled = Some(next);
        td.tot_in_control += 1;
        debug_assert!(td.tot_in_control <= td.mates.len());
        if let Some(piece) = self.pieces.get_mut(&next) {
            piece.team = Some(team);
            piece.mate = Some(mate);
            piece.player = Some(player);
        }
        self.inform_change_player(next, None);
    }

    /// Cycle the piece controlled by a level player
    ///
    /// See [`piece_cycle_control`](Self::piece_cycle_control); does nothing
    /// when the player controls no piece.
    pub fn player_cycle_control(&mut self, player: usize, preferred: Option<PieceId>) {
        let Some((team, mate)) = self.players.get(player).copied() else {
            debug_assert!(false, "player_cycle_control: unknown player");
            return;
        };
        let Some(id) = self.teams[team].mates[mate].controlled else {
            return;
        };
        self.piece_cycle_control(id, preferred);
    }

    /// Change whether and for which team a piece is controllable
    pub fn piece_set_controllable(
        &mut self,
        id: PieceId,
        controllable: bool,
        controller_team: Option<usize>,
    ) {
        let Some(piece) = self.pieces.get(&id) else {
            debug_assert!(false, "piece_set_controllable: unknown piece");
            return;
        };
        let was_controllable = piece.controllable;
        let old_controller_team = piece.controller_team;

        if controllable {
            debug_assert!(controller_team.is_none_or(|t| t < self.teams.len()));
            if was_controllable {
                if old_controller_team == controller_team {
                    return;
                }
                match (old_controller_team, controller_team) {
                    (Some(_), None) => {
                        // widening to every team keeps the current controller
                        self.add_to_controllable(id, None, old_controller_team);
                        self.set_control_config(id, true, None);
                    }
                    (None, Some(team)) => {
                        // narrowing: a controller of another team is dropped,
                        // only the chosen team's list entry survives
                        self.drop_controller_and_reassign(id, Some(team));
                        self.remove_from_controllable(id, Some(team));
                        self.set_control_config(id, true, Some(team));
                    }
                    (Some(_), Some(team)) => {
                        // switching teams drops the current controller
                        self.drop_controller_and_reassign(id, Some(team));
                        self.remove_from_controllable(id, None);
                        self.add_to_controllable(id, Some(team), None);
                        self.set_control_config(id, true, Some(team));
                    }
                    (None, None) => {}
                }
            } else {
                self.add_to_controllable(id, controller_team, None);
                self.set_control_config(id, true, controller_team);
                self.assign_control_to_longest_waiting(id, controller_team);
            }
        } else {
            if !was_controllable {
                return;
            }
            self.drop_controller_and_reassign(id, None);
            self.remove_from_controllable(id, None);
            self.set_control_config(id, false, None);
        }
    }

    /// Insert a piece into the ordered lists of the teams that may control it
    pub(crate) fn add_to_controllable(
        &mut self,
        id: PieceId,
        controller_team: Option<usize>,
        not_team: Option<usize>,
    ) {
        let x = self.pieces.get(&id).map_or(0, |p| p.pos.x);
        for team in self.controller_teams(controller_team) {
            if Some(team) == not_team {
                continue;
            }
            let at = self.teams[team]
                .ordered
                .iter()
                .position(|other| x < self.pieces.get(other).map_or(i32::MAX, |p| p.pos.x));
            let at = at.unwrap_or(self.teams[team].ordered.len());
            self.teams[team].ordered.insert(at, id);
        }
    }

    /// Remove a piece from the ordered lists it was inserted into
    pub(crate) fn remove_from_controllable(&mut self, id: PieceId, not_team: Option<usize>) {
        let controller_team = self.pieces.get(&id).and_then(|p| p.controller_team);
        for team in self.controller_teams(controller_team) {
            if Some(team) == not_team {
                continue;
            }
            if let Some(at) = self.teams[team].ordered.iter().position(|other| *other == id) {
                let _ = self.teams[team].ordered.remove(at);
            }
        }
    }

    /// Re-sort a piece whose origin changed into the ordered lists
    pub(crate) fn reposition_controllable(&mut self, id: PieceId) {
        let Some(piece) = self.pieces.get(&id) else {
            return;
        };
        if !piece.controllable {
            return;
        }
        let controller_team = piece.controller_team;
        self.remove_from_controllable(id, None);
        self.add_to_controllable(id, controller_team, None);
    }

    /// Hand a freshly controllable piece to the longest-waiting free mate
    ///
    /// The mate with the smallest last-in-control tick wins; ties resolve
    /// uniformly at random through the host.
    pub(crate) fn assign_control_to_longest_waiting(
        &mut self,
        id: PieceId,
        controller_team: Option<usize>,
    ) {
        let mut min_tick = i32::MAX;
        let mut candidates: Vec<(usize, usize)> = Vec::new();
        for team in self.controller_teams(controller_team) {
            for (mate, md) in self.teams[team].mates.iter().enumerate() {
                if md.controlled.is_some() {
                    continue;
                }
                if md.last_time_in_control < min_tick {
                    min_tick = md.last_time_in_control;
                    candidates.clear();
                    candidates.push((team, mate));
                } else if md.last_time_in_control == min_tick {
                    candidates.push((team, mate));
                }
            }
        }
        if candidates.is_empty() {
            return;
        }
        let pick = if candidates.len() > 1 {
            self.host.random(0, candidates.len() as i32 - 1) as usize
        } else {
            0
        };
        let (team, mate) = candidates[pick];
        self.assign_to_mate(id, team, mate, false);
    }

    /// Put a piece under a mate's control
    pub(crate) fn assign_to_mate(
        &mut self,
        id: PieceId,
        team: usize,
        mate: usize,
        wasnt_assigned: bool,
    ) {
        let tick = self.host.game_tick();
        let td = &mut self.teams[team];
        let md = &mut td.mates[mate];
        debug_assert!(md.controlled.is_none(), "assign_to_mate: mate already busy");
        md.controlled = Some(id);
        md.last_time_in_control = tick;
        let player = md.level_player;
        td.tot_in_control += 1;
        let old_player = if wasnt_assigned {
            None
        } else {
            self.pieces.get(&id).and_then(|p| p.player)
        };
        if let Some(piece) = self.pieces.get_mut(&id) {
            piece.team = Some(team);
            piece.mate = Some(mate);
            piece.player = Some(player);
        }
        self.inform_change_player(id, old_player);
    }

    /// Take a piece away from its controlling mate
    ///
    /// Returns whether it was controlled and, when it was, the next
    /// uncontrolled piece the defrauded mate could take over.
    pub(crate) fn unassign_control_from_mate(
        &mut self,
        id: PieceId,
        except_team: Option<usize>,
    ) -> (bool, Option<PieceId>) {
        let Some(piece) = self.pieces.get(&id) else {
            return (false, None);
        };
        let Some(team) = piece.team else {
            return (false, None);
        };
        if Some(team) == except_team {
            return (false, None);
        }
        let mate = piece.mate.unwrap_or(0);

        if let Some(piece) = self.pieces.get_mut(&id) {
            piece.team = None;
            piece.mate = None;
            piece.player = None;
        }
        let td = &mut self.teams[team];
        debug_assert_eq!(td.mates[mate].controlled, Some(id));
        td.mates[mate].controlled = None;
        td.tot_in_control -= 1;

        (true, self.next_uncontrolled(team, id))
    }

    /// Notify the player-change listeners of a controller transition
    pub(crate) fn inform_change_player(&mut self, id: PieceId, old_player: Option<usize>) {
        let current = self.pieces.get(&id).and_then(|p| p.player);
        if current == old_player {
            return;
        }
        if self.player_change_nested {
            debug_assert!(false, "inform_change_player: nested player change");
            return;
        }
        self.player_change_nested = true;
        let listeners = self.player_change_listeners.clone();
        for listener in listeners {
            listener.block_changed_player(self, id, old_player);
        }
        self.player_change_nested = false;
    }

    /// Walk a team's ordered list ring-wise for the next uncontrolled piece
    ///
    /// Starts after `from` and gives up when the walk comes back around.
    fn next_uncontrolled(&self, team: usize, from: PieceId) -> Option<PieceId> {
        let ordered = &self.teams.get(team)?.ordered;
        let start = ordered.iter().position(|other| *other == from)?;
        let len = ordered.len();
        for step in 1..=len {
            let candidate = ordered[(start + step) % len];
            if candidate == from {
                return None;
            }
            if self.pieces.get(&candidate).is_some_and(|p| p.player.is_none()) {
                return Some(candidate);
            }
        }
        None
    }

    /// The team indices a controller constraint expands to
    fn controller_teams(&self, controller_team: Option<usize>) -> std::ops::Range<usize> {
        match controller_team {
            Some(team) => {
                debug_assert!(team < self.teams.len());
                team..(team + 1).min(self.teams.len())
            }
            None => 0..self.teams.len(),
        }
    }

    /// Overwrite a piece's controllability settings
    fn set_control_config(&mut self, id: PieceId, controllable: bool, team: Option<usize>) {
        if let Some(piece) = self.pieces.get_mut(&id) {
            piece.controllable = controllable;
            piece.controller_team = team;
        }
    }

    /// Drop the piece's controller (honoring `except_team`) and hand the
    /// defrauded mate the next available piece
    fn drop_controller_and_reassign(&mut self, id: PieceId, except_team: Option<usize>) {
        let old = self.pieces.get(&id).map(|p| (p.team, p.mate, p.player));
        let Some((old_team, old_mate, old_player)) = old else {
            return;
        };
        let (unassigned, next) = self.unassign_control_from_mate(id, except_team);
        if unassigned {
            self.inform_change_player(id, old_player);
        }
        if let (Some(next), Some(team), Some(mate)) = (next, old_team, old_mate) {
            self.assign_to_mate(next, team, mate, true);
        }
    }
}
