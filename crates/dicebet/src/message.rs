//! Outbound frames: replies to requests, pushed room events, and errors.

use dicebet_dice::payout::payout_table;
use dicebet_dice::{PayoutRow, SideBetInfo, SideBetKind};
use dicebet_protocol::{PlayerId, RoomCode};
use dicebet_room::{PlayerView, ReadyEntry, RoomError, RoomEvent, RoomSnapshot, Settings};
use serde::Serialize;

/// Everything the server sends, tagged by `type`.
///
/// ```text
/// { "type": "event", "event": "bet-placed", "player_id": "p-1", ... }
/// { "type": "error", "code": 409, "message": "cannot place a bet while lobby" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    RoomCreated(RoomCreated),
    Joined(Joined),
    Snapshot(RoomSnapshot),
    Payouts(Payouts),
    /// The request succeeded; its effect arrives as a broadcast event.
    Ack { op: &'static str },
    Event(RoomEvent),
    Error { code: u16, message: String },
}

impl ServerMessage {
    pub fn ack(op: &'static str) -> Self {
        Self::Ack { op }
    }

    pub fn error(err: &RoomError) -> Self {
        Self::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Reply to `create-room`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomCreated {
    pub code: RoomCode,
    pub host_name: String,
    pub settings: Settings,
}

/// Reply to `join-room`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Joined {
    pub code: RoomCode,
    pub player_id: PlayerId,
    /// True when an existing member re-attached instead of taking a new seat.
    pub reconnected: bool,
    pub players: Vec<PlayerView>,
    pub ready: Vec<ReadyEntry>,
    pub settings: Settings,
}

/// The number-bet payout table and the side-bet catalogue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payouts {
    pub numbers: Vec<PayoutRow>,
    pub side_bets: Vec<SideBetInfo>,
}

impl Payouts {
    pub fn current() -> Self {
        Self {
            numbers: payout_table(),
            side_bets: SideBetKind::catalogue(),
        }
    }
}
