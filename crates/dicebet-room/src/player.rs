//! Room members.

use dicebet_protocol::{PlayerId, SessionId};
use serde::Serialize;

/// A member of a room.
///
/// `session` is the transport session currently attached to this player,
/// or `None` while they are disconnected. Disconnected players keep their
/// seat, balance and bets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub points: i64,
    pub color: Option<String>,
    pub session: Option<SessionId>,
}

impl Player {
    pub(crate) fn new(id: PlayerId, name: String, points: i64) -> Self {
        Self {
            id,
            name,
            points,
            color: None,
            session: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id.clone(),
            name: self.name.clone(),
            points: self.points,
            color: self.color.clone(),
            connected: self.is_connected(),
        }
    }
}

/// What other clients see of a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub points: i64,
    pub color: Option<String>,
    pub connected: bool,
}

/// Trims `raw` and keeps at most `max` characters.
pub(crate) fn clip(raw: &str, max: usize) -> String {
    raw.trim().chars().take(max).collect()
}

/// Display name for a joining player; blank names become `"Player"`.
pub(crate) fn display_name(raw: &str, max: usize) -> String {
    let name = clip(raw, max);
    if name.is_empty() {
        "Player".to_string()
    } else {
        name
    }
}
