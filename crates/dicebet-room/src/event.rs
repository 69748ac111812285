//! What a room tells its attached players, and the full-state snapshot.

use dicebet_dice::{Roll, SideBetKind};
use dicebet_protocol::{PlayerId, RoomCode};
use serde::Serialize;

use crate::{BetResult, NumberBet, Phase, PlayerView, SideBet, Settings};

/// A broadcast from a room actor to attached connections.
///
/// Serialized with an `event` tag:
///
/// ```text
/// { "event": "bet-placed", "player_id": "p-1", "number": 7, "amount": 100, "players": [...] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum RoomEvent {
    PlayersUpdate {
        players: Vec<PlayerView>,
        ready: Vec<ReadyEntry>,
        #[serde(skip_serializing_if = "Option::is_none")]
        kicked_id: Option<PlayerId>,
    },
    GameStarted {
        phase: Phase,
        round: u32,
        round_ends_at: Option<u64>,
        settings: Settings,
        players: Vec<PlayerView>,
    },
    BetPlaced {
        player_id: PlayerId,
        number: u8,
        amount: i64,
        players: Vec<PlayerView>,
    },
    SideBetPlaced {
        player_id: PlayerId,
        side_bet: SideBetKind,
        amount: i64,
        players: Vec<PlayerView>,
    },
    DiceRolled {
        roll: Roll,
        results: Vec<BetResult>,
        summary: String,
        winner: Option<PlayerView>,
        players: Vec<PlayerView>,
    },
    NextRound {
        phase: Phase,
        round: u32,
        round_ends_at: Option<u64>,
        players: Vec<PlayerView>,
    },
    ChatMessage(ChatMessage),
    Reaction(Reaction),
    /// Sent only to the player who was removed.
    Kicked,
}

impl RoomEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlayersUpdate { .. } => "players-update",
            Self::GameStarted { .. } => "game-started",
            Self::BetPlaced { .. } => "bet-placed",
            Self::SideBetPlaced { .. } => "side-bet-placed",
            Self::DiceRolled { .. } => "dice-rolled",
            Self::NextRound { .. } => "next-round",
            Self::ChatMessage(_) => "chat-message",
            Self::Reaction(_) => "reaction",
            Self::Kicked => "kicked",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub player_id: PlayerId,
    pub player_name: String,
    pub color: Option<String>,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub at: u64,
}

/// An ephemeral emoji; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reaction {
    pub player_id: PlayerId,
    pub player_name: String,
    pub emoji: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadyEntry {
    pub player_id: PlayerId,
    pub ready: bool,
}

/// One resolved round, as kept in the room history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub round: u32,
    #[serde(flatten)]
    pub roll: Roll,
    pub results: Vec<BetResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingBets {
    pub player_id: PlayerId,
    pub bets: Vec<NumberBet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingSideBets {
    pub player_id: PlayerId,
    pub side_bets: Vec<SideBet>,
}

/// Everything a (re)connecting client needs to render the room.
///
/// `bets` and `side_bets` are empty outside the betting phase. `chat`
/// holds the most recent messages oldest first; `history` holds the most
/// recent rounds newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomSnapshot {
    pub code: RoomCode,
    pub host_id: Option<PlayerId>,
    pub host_name: String,
    pub phase: Phase,
    pub round: u32,
    pub last_roll: Option<Roll>,
    pub round_ends_at: Option<u64>,
    pub settings: Settings,
    pub winner: Option<PlayerId>,
    pub players: Vec<PlayerView>,
    pub ready: Vec<ReadyEntry>,
    pub all_ready: bool,
    pub bets: Vec<PendingBets>,
    pub side_bets: Vec<PendingSideBets>,
    pub chat: Vec<ChatMessage>,
    pub history: Vec<HistoryEntry>,
}

impl RoomSnapshot {
    pub fn player(&self, id: &PlayerId) -> Option<&PlayerView> {
        self.players.iter().find(|p| &p.id == id)
    }
}
