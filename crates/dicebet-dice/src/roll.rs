//! Dice rolls and where they come from.

use std::collections::VecDeque;

use rand::Rng;
use serde::Serialize;

use crate::DiceError;

/// The outcome of throwing two dice. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Roll {
    d1: u8,
    d2: u8,
    sum: u8,
    is_double: bool,
}

impl Roll {
    /// Builds a roll from two faces.
    ///
    /// # Errors
    /// Returns [`DiceError::InvalidFace`] if either face is outside 1–6.
    pub fn new(d1: u8, d2: u8) -> Result<Self, DiceError> {
        for face in [d1, d2] {
            if !(1..=6).contains(&face) {
                return Err(DiceError::InvalidFace(face));
            }
        }
        Ok(Self::from_faces(d1, d2))
    }

    fn from_faces(d1: u8, d2: u8) -> Self {
        Self {
            d1,
            d2,
            sum: d1 + d2,
            is_double: d1 == d2,
        }
    }

    pub fn d1(&self) -> u8 {
        self.d1
    }

    pub fn d2(&self) -> u8 {
        self.d2
    }

    pub fn sum(&self) -> u8 {
        self.sum
    }

    pub fn is_double(&self) -> bool {
        self.is_double
    }
}

/// Anything that can produce rolls.
///
/// Rooms own a boxed `DiceSource`, so the production server uses
/// [`RandomDice`] while tests inject [`LoadedDice`] to force outcomes.
pub trait DiceSource: Send + 'static {
    fn roll(&mut self) -> Roll;
}

/// Two independent dice, each uniform over 1–6, from the thread RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomDice;

impl DiceSource for RandomDice {
    fn roll(&mut self) -> Roll {
        let mut rng = rand::rng();
        let d1 = rng.random_range(1..=6);
        let d2 = rng.random_range(1..=6);
        Roll::from_faces(d1, d2)
    }
}

/// Replays a fixed script of rolls, cycling back to the start when the
/// script runs out. An empty script degrades to [`RandomDice`].
#[derive(Debug, Clone, Default)]
pub struct LoadedDice {
    script: VecDeque<Roll>,
}

impl LoadedDice {
    pub fn new(rolls: impl IntoIterator<Item = Roll>) -> Self {
        Self {
            script: rolls.into_iter().collect(),
        }
    }
}

impl DiceSource for LoadedDice {
    fn roll(&mut self) -> Roll {
        match self.script.pop_front() {
            Some(roll) => {
                self.script.push_back(roll);
                roll
            }
            None => RandomDice.roll(),
        }
    }
}
