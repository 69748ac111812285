//! Side bets: named dice patterns with fixed fair-odds multipliers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::payout::round_tenths;
use crate::{DiceError, Multiplier, Roll};

/// The fixed set of side bets. Serialized by wire name (`"hard_8"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SideBetKind {
    #[serde(rename = "doubles")]
    Doubles,
    #[serde(rename = "over7")]
    Over7,
    #[serde(rename = "under7")]
    Under7,
    #[serde(rename = "exactly7")]
    Exactly7,
    #[serde(rename = "any_craps")]
    AnyCraps,
    #[serde(rename = "hard_6")]
    Hard6,
    #[serde(rename = "hard_8")]
    Hard8,
    #[serde(rename = "hard_10")]
    Hard10,
    #[serde(rename = "snake_eyes")]
    SnakeEyes,
    #[serde(rename = "boxcars")]
    Boxcars,
}

impl SideBetKind {
    pub const ALL: [SideBetKind; 10] = [
        Self::Doubles,
        Self::Over7,
        Self::Under7,
        Self::Exactly7,
        Self::AnyCraps,
        Self::Hard6,
        Self::Hard8,
        Self::Hard10,
        Self::SnakeEyes,
        Self::Boxcars,
    ];

    /// Wire name, identical to the serde representation.
    pub fn name(self) -> &'static str {
        match self {
            Self::Doubles => "doubles",
            Self::Over7 => "over7",
            Self::Under7 => "under7",
            Self::Exactly7 => "exactly7",
            Self::AnyCraps => "any_craps",
            Self::Hard6 => "hard_6",
            Self::Hard8 => "hard_8",
            Self::Hard10 => "hard_10",
            Self::SnakeEyes => "snake_eyes",
            Self::Boxcars => "boxcars",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Doubles => "Doubles",
            Self::Over7 => "Over 7",
            Self::Under7 => "Under 7",
            Self::Exactly7 => "Exactly 7",
            Self::AnyCraps => "Any Craps",
            Self::Hard6 => "Hard 6",
            Self::Hard8 => "Hard 8",
            Self::Hard10 => "Hard 10",
            Self::SnakeEyes => "Snake Eyes",
            Self::Boxcars => "Boxcars",
        }
    }

    /// Whether this bet wins on `roll`.
    pub fn wins(self, roll: &Roll) -> bool {
        let (d1, d2, sum) = (roll.d1(), roll.d2(), roll.sum());
        match self {
            Self::Doubles => roll.is_double(),
            Self::Over7 => sum > 7,
            Self::Under7 => sum < 7,
            Self::Exactly7 => sum == 7,
            Self::AnyCraps => matches!(sum, 2 | 3 | 12),
            Self::Hard6 => d1 == 3 && d2 == 3,
            Self::Hard8 => d1 == 4 && d2 == 4,
            Self::Hard10 => d1 == 5 && d2 == 5,
            Self::SnakeEyes => sum == 2,
            Self::Boxcars => sum == 12,
        }
    }

    /// Fair-odds multiplier: 36 over the number of winning combinations.
    pub fn multiplier(self) -> Multiplier {
        match self {
            Self::Doubles | Self::Exactly7 => Multiplier::new(36, 6),
            Self::Over7 | Self::Under7 => Multiplier::new(36, 15),
            Self::AnyCraps => Multiplier::new(36, 4),
            Self::Hard6 | Self::Hard8 | Self::Hard10 | Self::SnakeEyes | Self::Boxcars => {
                Multiplier::new(36, 1)
            }
        }
    }

    /// `floor(stake × multiplier)` on a win, zero otherwise.
    pub fn payout(self, stake: i64, roll: &Roll) -> i64 {
        if self.wins(roll) {
            self.multiplier().payout(stake)
        } else {
            0
        }
    }

    /// The catalogue clients render next to the number board.
    pub fn catalogue() -> Vec<SideBetInfo> {
        Self::ALL
            .iter()
            .map(|kind| SideBetInfo {
                kind: *kind,
                label: kind.label(),
                multiplier: round_tenths(kind.multiplier().as_f64()),
            })
            .collect()
    }
}

impl fmt::Display for SideBetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SideBetKind {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| DiceError::UnknownSideBet(s.to_string()))
    }
}

/// One catalogue entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideBetInfo {
    pub kind: SideBetKind,
    pub label: &'static str,
    pub multiplier: f64,
}
