//! Dice and odds for Dicebet.
//!
//! Pure building blocks with no async and no shared state:
//!
//! - [`Roll`] and the [`DiceSource`] trait (with [`RandomDice`] for play
//!   and [`LoadedDice`] for deterministic tests)
//! - the fair-odds [`payout`] table for number bets on sums 2–12
//! - [`SideBetKind`], the fixed set of pattern bets with their win
//!   predicates and multipliers
//!
//! Every multiplier is exact: `36 / ways`, kept as a reduced fraction so
//! that `floor(stake × multiplier)` never suffers float rounding.

mod error;
pub mod payout;
mod roll;
mod side_bet;

pub use error::DiceError;
pub use payout::{Multiplier, PayoutRow, Probability};
pub use roll::{DiceSource, LoadedDice, RandomDice, Roll};
pub use side_bet::{SideBetInfo, SideBetKind};
