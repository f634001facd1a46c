//! End-of-level status resolution: wins, losses, ranks, technical failures
//!
//! Outcomes are recorded per team and per mate. Rank numbers come from the
//! host, which is the only party that can compare teams across levels. A
//! technical failure never panics the simulation: it stores the report,
//! fails every team still playing and forwards the report to the host.

use crate::level::Level;

/// Outcome of a team
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TeamStatus {
    /// Still in the game
    #[default]
    Playing,
    /// Completed the level
    Completed,
    /// Failed the level
    Failed,
}

/// Outcome of a single mate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MateStatus {
    /// Still in the game
    #[default]
    Playing,
    /// Out of the game while the team plays on
    Out,
    /// The team completed the level
    Completed,
    /// The team failed the level
    Failed,
}

impl Level {
    /// The outcome of a team
    pub fn team_status(&self, team: usize) -> TeamStatus {
        self.teams.get(team).map_or(TeamStatus::Playing, |td| td.status)
    }

    /// The rank awarded to a finished team
    pub fn team_rank(&self, team: usize) -> Option<i32> {
        self.teams.get(team).and_then(|td| td.rank)
    }

    /// The outcome of a mate
    pub fn mate_status(&self, team: usize, mate: usize) -> MateStatus {
        self.teams
            .get(team)
            .and_then(|td| td.mates.get(mate))
            .map_or(MateStatus::Playing, |md| md.status)
    }

    /// Whether a team has neither completed nor failed yet
    pub fn is_team_playing(&self, team: usize) -> bool {
        self.teams.get(team).is_some_and(|td| td.finished_millis.is_none())
    }

    /// The stored technical issue report, if one was raised
    pub fn technical_report(&self) -> Option<&[String]> {
        self.technical_report.as_deref()
    }

    /// Declare a mate out of the game
    ///
    /// Fails the whole team when this was its last playing mate. Returns
    /// whether anything changed.
    pub fn status_player_out(&mut self, team: usize, mate: usize, force_other_completed: bool) -> bool {
        let Some(td) = self.teams.get_mut(team) else {
            debug_assert!(false, "status_player_out: unknown team");
            return false;
        };
        if td.finished_millis.is_some() {
            return false;
        }
        let now = self.host.elapsed_millis() as i32;
        let Some(md) = td.mates.get_mut(mate) else {
            debug_assert!(false, "status_player_out: unknown mate");
            return false;
        };
        if md.finished_millis.is_some() {
            return false;
        }
        md.finished_millis = Some(now);
        md.status = MateStatus::Out;
        let all_out = td.mates.iter().all(|m| m.finished_millis.is_some());
        if all_out {
            let _ = self.status_failed(team, force_other_completed);
        }
        true
    }

    /// Declare a team to have completed the level
    ///
    /// Returns false when the team already finished.
    pub fn status_completed(&mut self, team: usize, force_others_failed: bool) -> bool {
        if !self.close_team(team, true) {
            return false;
        }
        let rank = self.host.rank_completed(self.index, team, force_others_failed);
        debug_assert!(rank >= 1);
        self.teams[team].rank = Some(rank);
        true
    }

    /// Declare a team to have failed the level
    ///
    /// Returns false when the team already finished.
    pub fn status_failed(&mut self, team: usize, force_other_completed: bool) -> bool {
        if !self.close_team(team, false) {
            return false;
        }
        let rank = self.host.rank_failed(self.index, team, force_other_completed);
        debug_assert!(rank >= 1);
        self.teams[team].rank = Some(rank);
        true
    }

    /// Report a technical failure of the simulation
    ///
    /// Keeps the first report, fails every team still playing and hands the
    /// report to the host for display.
    pub fn status_technical(&mut self, issue: Vec<String>) {
        if self.technical_report.is_none() {
            self.technical_report = Some(issue.clone());
        }
        for team in 0..self.teams.len() {
            if self.is_team_playing(team) {
                let _ = self.status_failed(team, false);
            }
        }
        self.host.report_technical(self.index, &issue);
    }

    /// Mark a team and all its mates finished; false when already closed
    fn close_team(&mut self, team: usize, completed: bool) -> bool {
        let now = self.host.elapsed_millis() as i32;
        let Some(td) = self.teams.get_mut(team) else {
            debug_assert!(false, "close_team: unknown team");
            return false;
        };
        if td.finished_millis.is_some() {
            return false;
        }
        td.finished_millis = Some(now);
        td.status = if completed {
            TeamStatus::Completed
        } else {
            TeamStatus::Failed
        };
        for md in &mut td.mates {
            md.status = if completed {
                MateStatus::Completed
            } else {
                MateStatus::Failed
            };
            md.finished_millis = Some(now);
        }
        debug_assert!(self.ended_teams < self.teams.len());
        self.ended_teams += 1;
        true
    }
}
