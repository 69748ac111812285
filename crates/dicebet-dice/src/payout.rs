//! Fair-odds payout table for number bets on the sum of two dice.
//!
//! A sum that can be made `w` ways out of 36 pays `36 / w` times the
//! stake, so every bet has an expected return equal to the stake.

use serde::Serialize;

/// Lowest and highest sums two dice can make.
pub const MIN_SUM: u8 = 2;
pub const MAX_SUM: u8 = 12;

/// Number of two-die combinations, out of 36, producing `sum`.
///
/// Returns `None` outside 2–12.
pub fn ways_for_sum(sum: u8) -> Option<u32> {
    match sum {
        2..=7 => Some(u32::from(sum) - 1),
        8..=12 => Some(13 - u32::from(sum)),
        _ => None,
    }
}

/// Exact multiplier for a number bet on `sum`: `36 / ways`.
pub fn multiplier_for_sum(sum: u8) -> Option<Multiplier> {
    ways_for_sum(sum).map(|ways| Multiplier::new(36, ways))
}

/// Probability of rolling `sum`.
pub fn probability_for_sum(sum: u8) -> Option<Probability> {
    ways_for_sum(sum).map(|ways| Probability {
        ways,
        percent: round_tenths(f64::from(ways) / 36.0 * 100.0),
    })
}

/// Payout of a number bet: `floor(stake × 36 / ways)` when the chosen sum
/// was rolled, zero otherwise.
pub fn number_bet_payout(stake: i64, chosen: u8, rolled: u8) -> i64 {
    if chosen != rolled {
        return 0;
    }
    multiplier_for_sum(chosen).map_or(0, |m| m.payout(stake))
}

/// One row per sum 2–12, for clients that render the odds board.
pub fn payout_table() -> Vec<PayoutRow> {
    (MIN_SUM..=MAX_SUM)
        .filter_map(|number| {
            let m = multiplier_for_sum(number)?;
            let p = probability_for_sum(number)?;
            Some(PayoutRow {
                number,
                multiplier: m.as_f64(),
                ways: p.ways,
                probability: p.percent,
            })
        })
        .collect()
}

pub(crate) fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// Multiplier
// ---------------------------------------------------------------------------

/// A payout ratio kept as a reduced fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Multiplier {
    num: u32,
    den: u32,
}

impl Multiplier {
    /// Builds `num / den`, reduced. `den` must be non-zero.
    pub const fn new(num: u32, den: u32) -> Self {
        let g = gcd(num, den);
        Self {
            num: num / g,
            den: den / g,
        }
    }

    pub fn numerator(&self) -> u32 {
        self.num
    }

    pub fn denominator(&self) -> u32 {
        self.den
    }

    /// `floor(stake × self)`, saturating at `i64::MAX`. Non-positive stakes
    /// pay nothing.
    pub fn payout(&self, stake: i64) -> i64 {
        if stake <= 0 {
            return 0;
        }
        let exact = i128::from(stake) * i128::from(self.num) / i128::from(self.den);
        i64::try_from(exact).unwrap_or(i64::MAX)
    }

    pub fn as_f64(&self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }
}

const fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    if a == 0 { 1 } else { a }
}

/// Ways out of 36 and the matching percentage (one decimal place).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Probability {
    pub ways: u32,
    pub percent: f64,
}

/// A rendered row of the payout table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayoutRow {
    pub number: u8,
    pub multiplier: f64,
    pub ways: u32,
    pub probability: f64,
}
