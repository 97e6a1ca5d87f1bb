//! Pet state engine: lazy stat decay plus feed/play/care effects.
//!
//! Everything here is a pure function of the stored state and an explicit
//! `now`. Loading and persisting is the caller's job (see `service`).

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PetError;
use crate::models::Stats;

/// Stat points lost per elapsed hour.
pub const HUNGER_DECAY_PER_HOUR: f64 = 5.0;
pub const HAPPINESS_DECAY_PER_HOUR: f64 = 3.0;
pub const ENERGY_DECAY_PER_HOUR: f64 = 2.0;

/// The read path shows decay only past this many hours...
pub const READ_DECAY_THRESHOLD_HOURS: f64 = 1.0;
/// ...and writes it back only past this many.
pub const READ_PERSIST_THRESHOLD_HOURS: f64 = 3.0;

const SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Feed,
    Play,
    Care,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Feed => "feed",
            Action::Play => "play",
            Action::Care => "care",
        }
    }

    /// Signed adjustments as `(hunger, happiness, energy)`.
    pub fn effect(&self) -> (f64, f64, f64) {
        match self {
            Action::Feed => (30.0, 0.0, 10.0),
            Action::Play => (-10.0, 25.0, -15.0),
            Action::Care => (-5.0, 15.0, 5.0),
        }
    }
}

impl FromStr for Action {
    type Err = PetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feed" => Ok(Action::Feed),
            "play" => Ok(Action::Play),
            "care" => Ok(Action::Care),
            other => Err(PetError::Validation(format!("Invalid action type: '{}'", other))),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The mutable part of a pet as the engine sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PetState {
    pub stats: Stats,
    pub last_interaction: Option<DateTime<Utc>>,
}

/// Rounded stats as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsView {
    pub hunger: i64,
    pub happiness: i64,
    pub energy: i64,
    #[serde(rename = "lastInteraction")]
    pub last_interaction: Option<DateTime<Utc>>,
}

impl StatsView {
    pub fn from_state(state: &PetState) -> Self {
        let (hunger, happiness, energy) = state.stats.rounded();
        Self {
            hunger,
            happiness,
            energy,
            last_interaction: state.last_interaction,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionOutcome {
    /// Always persisted by the caller.
    pub state: PetState,
    pub view: StatsView,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadOutcome {
    pub view: StatsView,
    /// `Some` only when the decay crossed the write-back threshold.
    pub persist: Option<PetState>,
}

/// Hours elapsed between `last` and `now`. Zero when `last` is unknown or in the future.
pub fn elapsed_hours(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match last {
        Some(last) => {
            let millis = (now - last).num_milliseconds();
            (millis as f64 / 1000.0 / SECONDS_PER_HOUR).max(0.0)
        }
        None => 0.0,
    }
}

/// Linear decay over `hours`. Stats never drop below zero.
pub fn decay(stats: Stats, hours: f64) -> Stats {
    let hours = hours.max(0.0);
    Stats {
        hunger: stats.hunger - HUNGER_DECAY_PER_HOUR * hours,
        happiness: stats.happiness - HAPPINESS_DECAY_PER_HOUR * hours,
        energy: stats.energy - ENERGY_DECAY_PER_HOUR * hours,
    }
    .clamped()
}

pub fn apply_action(stats: Stats, action: Action) -> Stats {
    let (dh, dp, de) = action.effect();
    Stats {
        hunger: stats.hunger + dh,
        happiness: stats.happiness + dp,
        energy: stats.energy + de,
    }
    .clamped()
}

/// `last_interaction` never moves backwards, even if the clock does.
fn advance(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match last {
        Some(last) if last > now => last,
        _ => now,
    }
}

/// Interaction path: decay, then the action, then stamp `now`.
pub fn interact(current: &PetState, action: Action, now: DateTime<Utc>) -> InteractionOutcome {
    let hours = elapsed_hours(current.last_interaction, now);
    let decayed = decay(current.stats, hours);
    let stats = apply_action(decayed, action);
    log::debug!(
        "interact {}: {:.3}h elapsed, decayed {:?} -> {:?}",
        action,
        hours,
        decayed,
        stats
    );

    let state = PetState {
        stats,
        last_interaction: Some(advance(current.last_interaction, now)),
    };
    InteractionOutcome {
        view: StatsView::from_state(&state),
        message: format!("{} action successful", action),
        state,
    }
}

/// Read path: show decay past one hour, commit it past three.
pub fn read_stats(current: &PetState, now: DateTime<Utc>) -> ReadOutcome {
    let hours = elapsed_hours(current.last_interaction, now);
    if hours <= READ_DECAY_THRESHOLD_HOURS {
        return ReadOutcome {
            view: StatsView::from_state(current),
            persist: None,
        };
    }

    let decayed = decay(current.stats, hours);
    if hours > READ_PERSIST_THRESHOLD_HOURS {
        let state = PetState {
            stats: decayed,
            last_interaction: Some(advance(current.last_interaction, now)),
        };
        ReadOutcome {
            view: StatsView::from_state(&state),
            persist: Some(state),
        }
    } else {
        log::debug!("read: {:.3}h elapsed, showing decay without writing", hours);
        let shown = PetState {
            stats: decayed,
            last_interaction: current.last_interaction,
        };
        ReadOutcome {
            view: StatsView::from_state(&shown),
            persist: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn state(h: f64, p: f64, e: f64, hours_ago: Option<f64>) -> PetState {
        PetState {
            stats: Stats::new(h, p, e),
            last_interaction: hours_ago
                .map(|hrs| t0() - Duration::milliseconds((hrs * 3_600_000.0) as i64)),
        }
    }

    #[test]
    fn test_feed_after_ten_hours() {
        let s = state(100.0, 100.0, 100.0, Some(10.0));
        let out = interact(&s, Action::Feed, t0());
        assert_eq!(out.view.hunger, 80);
        assert_eq!(out.view.happiness, 70);
        assert_eq!(out.view.energy, 90);
        assert_eq!(out.message, "feed action successful");
        assert_eq!(out.state.last_interaction, Some(t0()));
    }

    #[test]
    fn test_play_clamps_hunger_at_zero() {
        let s = state(5.0, 50.0, 50.0, Some(0.0));
        let out = interact(&s, Action::Play, t0());
        assert_eq!(out.state.stats.hunger, 0.0);
        assert_eq!(out.view.happiness, 75);
        assert_eq!(out.view.energy, 35);
    }

    #[test]
    fn test_care_effect() {
        let s = state(50.0, 50.0, 50.0, Some(0.0));
        let out = interact(&s, Action::Care, t0());
        assert_eq!((out.view.hunger, out.view.happiness, out.view.energy), (45, 65, 55));
    }

    #[test]
    fn test_action_caps_at_hundred() {
        let s = state(95.0, 100.0, 98.0, Some(0.0));
        let out = interact(&s, Action::Feed, t0());
        assert_eq!(out.state.stats.hunger, 100.0);
        assert_eq!(out.state.stats.energy, 100.0);
    }

    #[test]
    fn test_interaction_always_advances_timestamp() {
        for hours in [None, Some(0.0), Some(0.25), Some(2.0), Some(500.0)] {
            let s = state(60.0, 60.0, 60.0, hours);
            let out = interact(&s, Action::Care, t0());
            assert_eq!(out.state.last_interaction, Some(t0()));
        }
    }

    #[test]
    fn test_timestamp_never_moves_backwards() {
        let future = t0() + Duration::hours(2);
        let s = PetState {
            stats: Stats::full(),
            last_interaction: Some(future),
        };
        let out = interact(&s, Action::Feed, t0());
        assert_eq!(out.state.last_interaction, Some(future));
        // No negative decay either.
        assert_eq!(out.state.stats, Stats::full());
    }

    #[test]
    fn test_decay_stays_in_range() {
        let samples = [0.0, 0.5, 1.0, 7.3, 19.9, 33.4, 50.0, 1e6];
        for &h in &samples {
            for &v in &[0.0, 1.0, 42.5, 99.9, 100.0] {
                let d = decay(Stats::new(v, v, v), h);
                for x in [d.hunger, d.happiness, d.energy] {
                    assert!((0.0..=100.0).contains(&x), "{} out of range for h={}", x, h);
                }
            }
        }
    }

    #[test]
    fn test_missing_timestamp_means_no_decay() {
        assert_eq!(elapsed_hours(None, t0()), 0.0);
        let s = state(40.0, 40.0, 40.0, None);
        let out = read_stats(&s, t0());
        assert_eq!((out.view.hunger, out.view.happiness, out.view.energy), (40, 40, 40));
        assert!(out.persist.is_none());
    }

    #[test]
    fn test_read_half_hour_no_decay_no_write() {
        let s = state(80.0, 80.0, 80.0, Some(0.5));
        let out = read_stats(&s, t0());
        assert_eq!((out.view.hunger, out.view.happiness, out.view.energy), (80, 80, 80));
        assert_eq!(out.view.last_interaction, s.last_interaction);
        assert!(out.persist.is_none());
    }

    #[test]
    fn test_read_two_hours_shows_decay_without_write() {
        let s = state(80.0, 80.0, 80.0, Some(2.0));
        let out = read_stats(&s, t0());
        assert_eq!((out.view.hunger, out.view.happiness, out.view.energy), (70, 74, 76));
        assert_eq!(out.view.last_interaction, s.last_interaction);
        assert!(out.persist.is_none());
    }

    #[test]
    fn test_read_four_hours_persists() {
        let s = state(100.0, 100.0, 100.0, Some(4.0));
        let out = read_stats(&s, t0());
        assert_eq!((out.view.hunger, out.view.happiness, out.view.energy), (80, 88, 92));
        let persisted = out.persist.expect("should persist past three hours");
        assert_eq!(persisted.last_interaction, Some(t0()));
        assert_eq!(persisted.stats, Stats::new(80.0, 88.0, 92.0));
    }

    #[test]
    fn test_read_idempotent_within_hour() {
        let s = state(55.0, 66.0, 77.0, Some(0.2));
        let first = read_stats(&s, t0());
        let second = read_stats(&s, t0() + Duration::minutes(20));
        assert_eq!(first, second);
        assert!(first.persist.is_none());
    }

    #[test]
    fn test_unknown_action_rejected() {
        let err = "dance".parse::<Action>().unwrap_err();
        assert!(matches!(err, PetError::Validation(_)));
    }

    #[test]
    fn test_action_parse() {
        assert_eq!("feed".parse::<Action>().unwrap(), Action::Feed);
        assert_eq!("play".parse::<Action>().unwrap(), Action::Play);
        assert_eq!("care".parse::<Action>().unwrap(), Action::Care);
        assert!("Feed".parse::<Action>().is_err());
        assert!("".parse::<Action>().is_err());
    }
}
