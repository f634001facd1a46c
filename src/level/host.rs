//! The game facade a level consumes
//!
//! Levels never own the clock or the random source; the driving loop hands
//! them in through this trait, which also arbitrates end-of-game ranks across
//! levels and routes cross-level messages. A seeded single-level
//! implementation is provided for games and tests that need nothing more.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Clock, randomness and cross-level services consumed by a level
pub trait GameHost {
    /// Advance the clock by one simulation tick
    fn begin_tick(&mut self);

    /// Ticks elapsed since the game started
    fn game_tick(&self) -> i32;

    /// Milliseconds elapsed since the game started
    fn elapsed_millis(&self) -> f64;

    /// A uniformly random value in `from..=to`
    fn random(&mut self, from: i32, to: i32) -> i32;

    /// Rank awarded to a team that completed the game
    ///
    /// The default suits single-team games: everyone who finishes is first.
    fn rank_completed(&mut self, _level: usize, _team: usize, _force_others_failed: bool) -> i32 {
        1
    }

    /// Rank awarded to a team that failed the game
    fn rank_failed(&mut self, _level: usize, _team: usize, _force_other_completed: bool) -> i32 {
        1
    }

    /// A technical issue report from the status-resolution path
    fn report_technical(&mut self, _level: usize, _issue: &[String]) {}

    /// Deliver a message to the other levels of the game
    fn send_to_others(&mut self, _sender_level: usize, _msg: i32, _value: i32) {}

    /// The level's requested tick interval changed
    fn interval_changed(&mut self, _level: usize) {}
}

/// Deterministic single-level host driven by a seed
///
/// Wraps a seeded [`StdRng`] so control-assignment tie-breaks replay
/// identically for the same seed, and derives elapsed milliseconds from a
/// fixed tick interval.
pub struct SeededHost {
    tick: i32,
    interval_millis: f64,
    rng: StdRng,
    teams_total: usize,
    completed: usize,
    failed: usize,
}

impl SeededHost {
    /// Create a host for `teams_total` teams with a reproducible seed
    pub fn new(seed: u64, teams_total: usize) -> Self {
        Self {
            tick: 0,
            interval_millis: 50.0,
            rng: StdRng::seed_from_u64(seed),
            teams_total,
            completed: 0,
            failed: 0,
        }
    }

    /// Override the tick interval used to derive elapsed milliseconds
    pub const fn with_interval(mut self, interval_millis: f64) -> Self {
        self.interval_millis = interval_millis;
        self
    }

    /// Jump the clock to an absolute tick
    pub const fn set_tick(&mut self, tick: i32) {
        self.tick = tick;
    }
}

impl GameHost for SeededHost {
    fn begin_tick(&mut self) {
        self.tick += 1;
    }

    fn game_tick(&self) -> i32 {
        self.tick
    }

    fn elapsed_millis(&self) -> f64 {
        f64::from(self.tick) * self.interval_millis
    }

    fn random(&mut self, from: i32, to: i32) -> i32 {
        debug_assert!(from <= to, "random: inverted range");
        if from >= to {
            return from;
        }
        self.rng.random_range(from..=to)
    }

    fn rank_completed(&mut self, _level: usize, _team: usize, _force_others_failed: bool) -> i32 {
        self.completed += 1;
        self.completed as i32
    }

    fn rank_failed(&mut self, _level: usize, _team: usize, _force_other_completed: bool) -> i32 {
        self.failed += 1;
        (self.teams_total.max(self.failed) - self.failed + 1) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_replays_random_sequence() {
        let mut a = SeededHost::new(7, 1);
        let mut b = SeededHost::new(7, 1);
        let seq_a: Vec<i32> = (0..16).map(|_| a.random(0, 9)).collect();
        let seq_b: Vec<i32> = (0..16).map(|_| b.random(0, 9)).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn test_ranks_fill_from_both_ends() {
        let mut host = SeededHost::new(0, 3);
        assert_eq!(host.rank_completed(0, 0, false), 1);
        assert_eq!(host.rank_failed(0, 1, false), 3);
        assert_eq!(host.rank_failed(0, 2, false), 2);
    }
}
