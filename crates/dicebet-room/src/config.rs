//! Room settings, process-wide limits and the round phase machine.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use dicebet_protocol::SettingsInput;
use dicebet_timer::{DEFAULT_ROUND_SECS, MAX_ROUND_SECS, MIN_ROUND_SECS};
use serde::Serialize;
use tracing::warn;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

pub const DEFAULT_STARTING_POINTS: i64 = 1000;
pub const DEFAULT_BET_MIN: i64 = 10;
pub const DEFAULT_BET_MAX: i64 = 500;
pub const DEFAULT_TARGET_POINTS: i64 = 2000;

const FLOOR_STARTING_POINTS: i64 = 1;
const FLOOR_BET_MIN: i64 = 1;
const FLOOR_BET_MAX: i64 = 10;
const FLOOR_TARGET_POINTS: i64 = 500;

/// Largest starting balance or single stake a room accepts.
const CEILING_POINTS: i64 = 1_000_000_000;
/// Largest target a room accepts.
const CEILING_TARGET_POINTS: i64 = 1_000_000_000_000;

/// How a game is won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WinCondition {
    /// First player (in join order) at or above the target.
    #[default]
    FirstToTarget,
    /// Last player with a positive balance.
    Elimination,
}

impl FromStr for WinCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_to_target" => Ok(Self::FirstToTarget),
            "elimination" => Ok(Self::Elimination),
            other => Err(other.to_string()),
        }
    }
}

/// Validated per-room rules, fixed when the room is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub starting_points: i64,
    pub round_timer_secs: u64,
    pub use_timer: bool,
    pub bet_min: i64,
    pub bet_max: i64,
    pub win_condition: WinCondition,
    pub target_points: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            starting_points: DEFAULT_STARTING_POINTS,
            round_timer_secs: DEFAULT_ROUND_SECS,
            use_timer: false,
            bet_min: DEFAULT_BET_MIN,
            bet_max: DEFAULT_BET_MAX,
            win_condition: WinCondition::FirstToTarget,
            target_points: DEFAULT_TARGET_POINTS,
        }
    }
}

impl Settings {
    /// Builds settings from client input.
    ///
    /// Missing or zero values take their defaults; everything else is
    /// clamped between its floor and ceiling with a warning. A bet maximum
    /// below the minimum is raised to the minimum.
    pub fn from_input(input: &SettingsInput) -> Self {
        let starting_points = bounded(
            "starting_points",
            or_default(input.starting_points, DEFAULT_STARTING_POINTS),
            FLOOR_STARTING_POINTS,
            CEILING_POINTS,
        );

        let requested_secs = or_default(input.round_timer_secs, DEFAULT_ROUND_SECS as i64);
        let round_timer_secs = requested_secs.clamp(MIN_ROUND_SECS as i64, MAX_ROUND_SECS as i64);
        if round_timer_secs != requested_secs {
            warn!(
                requested = requested_secs,
                clamped = round_timer_secs,
                "round timer clamped"
            );
        }

        let bet_min = bounded(
            "bet_min",
            or_default(input.bet_min, DEFAULT_BET_MIN),
            FLOOR_BET_MIN,
            CEILING_POINTS,
        );
        let mut bet_max = bounded(
            "bet_max",
            or_default(input.bet_max, DEFAULT_BET_MAX),
            FLOOR_BET_MAX,
            CEILING_POINTS,
        );
        if bet_max < bet_min {
            warn!(bet_min, bet_max, "bet maximum raised to bet minimum");
            bet_max = bet_min;
        }

        let win_condition = match input.win_condition.as_deref() {
            None | Some("") => WinCondition::default(),
            Some(name) => name.parse::<WinCondition>().unwrap_or_else(|unknown: String| {
                warn!(win_condition = %unknown, "unknown win condition, using first_to_target");
                WinCondition::FirstToTarget
            }),
        };

        let target_points = bounded(
            "target_points",
            or_default(input.target_points, DEFAULT_TARGET_POINTS),
            FLOOR_TARGET_POINTS,
            CEILING_TARGET_POINTS,
        );

        Self {
            starting_points,
            round_timer_secs: round_timer_secs as u64,
            use_timer: input.use_timer.unwrap_or(false),
            bet_min,
            bet_max,
            win_condition,
            target_points,
        }
    }

    pub fn round_duration(&self) -> Duration {
        Duration::from_secs(self.round_timer_secs)
    }
}

fn or_default(value: Option<i64>, default: i64) -> i64 {
    match value {
        None | Some(0) => default,
        Some(v) => v,
    }
}

fn bounded(field: &'static str, value: i64, floor: i64, ceiling: i64) -> i64 {
    if value < floor {
        warn!(field, value, floor, "setting raised to floor");
        floor
    } else if value > ceiling {
        warn!(field, value, ceiling, "setting lowered to ceiling");
        ceiling
    } else {
        value
    }
}

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Process-wide limits shared by every room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomConfig {
    /// Number bets one player may hold in a round.
    pub max_number_bets: usize,
    /// Chat messages retained per room.
    pub chat_capacity: usize,
    /// Round history entries retained per room.
    pub history_capacity: usize,
    /// Most recent chat messages included in a snapshot.
    pub snapshot_chat: usize,
    /// Most recent history entries included in a snapshot.
    pub snapshot_history: usize,
    pub max_name_len: usize,
    pub max_message_len: usize,
    pub max_emoji_len: usize,
    pub max_color_len: usize,
    /// Capacity of each room actor's command channel.
    pub channel_size: usize,
    /// How long a room may sit with no players before its actor stops.
    pub empty_room_grace: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_number_bets: 3,
            chat_capacity: 100,
            history_capacity: 30,
            snapshot_chat: 50,
            snapshot_history: 20,
            max_name_len: 20,
            max_message_len: 300,
            max_emoji_len: 4,
            max_color_len: 32,
            channel_size: 64,
            empty_room_grace: Duration::from_secs(300),
        }
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where a room is in its round cycle.
///
/// ```text
/// Lobby → Betting → Rolled → Betting → …
///                 ↘ GameOver
/// ```
///
/// `GameOver` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Lobby,
    Betting,
    Rolled,
    GameOver,
}

impl Phase {
    /// Only the lobby admits new players.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Lobby)
    }

    pub fn accepts_bets(self) -> bool {
        matches!(self, Self::Betting)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::GameOver)
    }

    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Lobby, Self::Betting)
                | (Self::Betting, Self::Rolled)
                | (Self::Betting, Self::GameOver)
                | (Self::Rolled, Self::Betting)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::Betting => "betting",
            Self::Rolled => "rolled",
            Self::GameOver => "game-over",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
