//! Round resolution: settles pending bets against a roll, evaluates the
//! win condition and renders the one-line round summary.
//!
//! Stakes are debited when a bet is placed, so settlement only ever
//! credits. A losing bet pays zero and its stake is already gone.

use std::collections::HashMap;

use dicebet_dice::payout::number_bet_payout;
use dicebet_dice::{Roll, SideBetKind};
use dicebet_protocol::PlayerId;
use serde::Serialize;

use crate::{Player, Settings, WinCondition};

/// A stake on the sum of the dice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NumberBet {
    pub number: u8,
    pub amount: i64,
}

/// A stake on a side-bet pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SideBet {
    #[serde(rename = "side_bet")]
    pub kind: SideBetKind,
    pub amount: i64,
}

/// What a settled bet was on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Wager {
    Number(u8),
    SideBet(SideBetKind),
}

/// The settled outcome of one bet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BetResult {
    pub player_id: PlayerId,
    pub player_name: String,
    #[serde(flatten)]
    pub wager: Wager,
    pub amount: i64,
    pub won: bool,
    pub payout: i64,
}

/// Settles every pending bet against `roll`, crediting payouts.
///
/// Both bet maps are drained. Results come out in the order of
/// `players` (join order), number bets before side bets per player.
pub fn settle(
    players: &mut [Player],
    bets: &mut HashMap<PlayerId, Vec<NumberBet>>,
    side_bets: &mut HashMap<PlayerId, Vec<SideBet>>,
    roll: &Roll,
) -> Vec<BetResult> {
    let mut results = Vec::new();

    for player in players.iter_mut() {
        for bet in bets.remove(&player.id).unwrap_or_default() {
            let payout = number_bet_payout(bet.amount, bet.number, roll.sum());
            player.points = player.points.saturating_add(payout);
            results.push(result(player, Wager::Number(bet.number), bet.amount, payout));
        }
        for bet in side_bets.remove(&player.id).unwrap_or_default() {
            let payout = bet.kind.payout(bet.amount, roll);
            player.points = player.points.saturating_add(payout);
            results.push(result(player, Wager::SideBet(bet.kind), bet.amount, payout));
        }
    }

    // Bets of players no longer seated were removed with them; anything
    // left here has no owner to credit.
    bets.clear();
    side_bets.clear();

    results
}

fn result(player: &Player, wager: Wager, amount: i64, payout: i64) -> BetResult {
    BetResult {
        player_id: player.id.clone(),
        player_name: player.name.clone(),
        wager,
        amount,
        won: payout > 0,
        payout,
    }
}

/// Applies the room's win condition to the current balances.
pub fn find_winner<'a>(players: &'a [Player], settings: &Settings) -> Option<&'a Player> {
    match settings.win_condition {
        WinCondition::FirstToTarget => players
            .iter()
            .find(|p| p.points >= settings.target_points),
        WinCondition::Elimination => {
            let mut solvent = players.iter().filter(|p| p.points > 0);
            match (solvent.next(), solvent.next()) {
                (Some(last), None) => Some(last),
                // Everyone busted: the first seat takes it.
                (None, _) => players.first(),
                _ => None,
            }
        }
    }
}

/// `Round 3: 2+5=7. Ann +600, Bob -50`
pub fn round_summary(round: u32, roll: &Roll, results: &[BetResult]) -> String {
    let head = format!(
        "Round {round}: {}+{}={}.",
        roll.d1(),
        roll.d2(),
        roll.sum()
    );
    if results.is_empty() {
        return format!("{head} No bets.");
    }
    let fragments: Vec<String> = results
        .iter()
        .map(|r| {
            if r.won {
                format!("{} +{}", r.player_name, r.payout)
            } else {
                format!("{} -{}", r.player_name, r.amount)
            }
        })
        .collect();
    format!("{head} {}", fragments.join(", "))
}
