use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STAT_MIN: f64 = 0.0;
pub const STAT_MAX: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PetKind {
    Dog,
    Cat,
    Bird,
}

impl PetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PetKind::Dog => "Dog",
            PetKind::Cat => "Cat",
            PetKind::Bird => "Bird",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Dog" => Some(PetKind::Dog),
            "Cat" => Some(PetKind::Cat),
            "Bird" => Some(PetKind::Bird),
            _ => None,
        }
    }
}

impl std::fmt::Display for PetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The three decaying pet stats. Values are kept in `[STAT_MIN, STAT_MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub hunger: f64,
    pub happiness: f64,
    pub energy: f64,
}

impl Stats {
    pub fn full() -> Self {
        Self {
            hunger: STAT_MAX,
            happiness: STAT_MAX,
            energy: STAT_MAX,
        }
    }

    pub fn new(hunger: f64, happiness: f64, energy: f64) -> Self {
        Self {
            hunger,
            happiness,
            energy,
        }
        .clamped()
    }

    /// Clamp every stat into `[0, 100]`. NaN is treated as 0.
    pub fn clamped(self) -> Self {
        Self {
            hunger: clamp_stat(self.hunger),
            happiness: clamp_stat(self.happiness),
            energy: clamp_stat(self.energy),
        }
    }

    /// Stats rounded to the nearest integer for display.
    pub fn rounded(&self) -> (i64, i64, i64) {
        (
            self.hunger.round() as i64,
            self.happiness.round() as i64,
            self.energy.round() as i64,
        )
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::full()
    }
}

pub fn clamp_stat(value: f64) -> f64 {
    if value.is_nan() {
        return STAT_MIN;
    }
    value.clamp(STAT_MIN, STAT_MAX)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: Option<i64>,
    pub user_id: i64,
    pub kind: PetKind,
    pub photo: String,
    pub stats: Stats,
    pub last_interaction: Option<DateTime<Utc>>,
    /// Bumped on every stored write; compared on conditional updates.
    pub version: i64,
}

impl Pet {
    pub fn new(user_id: i64, kind: PetKind, photo: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            user_id,
            kind,
            photo,
            stats: Stats::full(),
            last_interaction: Some(created_at),
            version: 0,
        }
    }
}
