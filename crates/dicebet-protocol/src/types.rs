//! Core protocol types: identities, requests, and the frame envelope.
//!
//! Everything in this module travels on the wire, so every type derives
//! `Serialize`/`Deserialize` and the JSON shapes are pinned by the tests
//! at the bottom of the file.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Stable identity of a player inside one room.
///
/// Clients keep this id across page reloads and present it again to
/// reconnect, so it is a free-form string rather than a server counter.
/// Distinct from [`SessionId`]: a player keeps the same `PlayerId` while
/// their transport session comes and goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Wraps an existing id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random id of the form `p-<16 hex digits>`.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self(format!("p-{:016x}", rng.random::<u64>()))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one transport session (one WebSocket connection).
///
/// Assigned by the server per accepted connection. A reconnecting
/// player gets a new `SessionId` but keeps their [`PlayerId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// The short code a room is addressed by, e.g. `K7QW2P`.
///
/// Codes are drawn from an alphabet without easily-confused characters
/// (no `I`, `O`, `0` or `1`). Lookups are case-insensitive: every code is
/// normalized to upper case on construction, including when it is
/// deserialized from a client request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Characters a generated code may contain.
    pub const ALPHABET: &'static [u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

    /// Length of a generated code.
    pub const LENGTH: usize = 6;

    /// Normalizes a client-supplied code (trimmed, upper case).
    pub fn new(code: &str) -> Self {
        Self(code.trim().to_ascii_uppercase())
    }

    /// Draws a random code. Uniqueness among live rooms is the registry's job.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let code = (0..Self::LENGTH)
            .map(|_| {
                let idx = rng.random_range(0..Self::ALPHABET.len());
                Self::ALPHABET[idx] as char
            })
            .collect();
        Self(code)
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RoomCode {
    fn from(code: String) -> Self {
        Self::new(&code)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Settings input
// ---------------------------------------------------------------------------

/// Room settings as the client submits them at creation time.
///
/// Every field is optional. The room layer fills in defaults and clamps
/// out-of-range values; see `Settings::from_input` in `dicebet-room`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsInput {
    pub starting_points: Option<i64>,
    pub round_timer_secs: Option<i64>,
    pub use_timer: Option<bool>,
    pub bet_min: Option<i64>,
    pub bet_max: Option<i64>,
    /// `"first_to_target"` or `"elimination"`.
    pub win_condition: Option<String>,
    pub target_points: Option<i64>,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Everything a client can ask the server to do.
///
/// Internally tagged by `op`, so a bet looks like:
///
/// ```text
/// { "op": "place-bet", "code": "K7QW2P", "player_id": "p-1", "number": 7, "amount": 100 }
/// ```
///
/// Numbers and amounts are signed. A negative amount or an out-of-range
/// sum still decodes and is rejected by the room layer with a validation
/// error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Request {
    /// Create a new room. Does not join it; the host joins like anyone else.
    CreateRoom {
        #[serde(default)]
        host_name: String,
        #[serde(default)]
        settings: SettingsInput,
    },

    /// Join a room, or re-attach to it when `player_id` is already a member.
    JoinRoom {
        code: RoomCode,
        #[serde(default)]
        player_name: String,
        player_id: Option<PlayerId>,
    },

    /// Re-attach an existing member and fetch the full room snapshot.
    Reconnect { code: RoomCode, player_id: PlayerId },

    SetReady {
        code: RoomCode,
        player_id: PlayerId,
        ready: bool,
    },

    SetColor {
        code: RoomCode,
        player_id: PlayerId,
        color: Option<String>,
    },

    /// Host only.
    StartGame { code: RoomCode, player_id: PlayerId },

    PlaceBet {
        code: RoomCode,
        player_id: PlayerId,
        number: i64,
        amount: i64,
    },

    PlaceSideBet {
        code: RoomCode,
        player_id: PlayerId,
        /// Wire name of the side bet, e.g. `"hard_8"`.
        side_bet: String,
        amount: i64,
    },

    Roll { code: RoomCode },

    NextRound { code: RoomCode },

    Chat {
        code: RoomCode,
        player_id: PlayerId,
        text: String,
    },

    Reaction {
        code: RoomCode,
        player_id: PlayerId,
        emoji: Option<String>,
    },

    /// Host only. `player_id` is the host issuing the kick.
    Kick {
        code: RoomCode,
        player_id: PlayerId,
        target_id: PlayerId,
    },

    Leave { code: RoomCode, player_id: PlayerId },

    /// Read-only room snapshot.
    Snapshot { code: RoomCode },

    /// Payout table and side-bet catalogue.
    Payouts,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level frame. Every message on the wire is an `Envelope`.
///
/// `seq` is per-sender and monotonically increasing; `timestamp` is
/// milliseconds since the sender started. The payload is a [`Request`]
/// inbound and the server's message type outbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub seq: u64,
    pub timestamp: u64,
    pub payload: T,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_player_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&PlayerId::new("p-42")).unwrap();
        assert_eq!(json, "\"p-42\"");
    }

    #[test]
    fn test_random_player_ids_differ() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = PlayerId::random(&mut rng);
        let b = PlayerId::random(&mut rng);
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("p-"));
        assert_eq!(a.as_str().len(), 18);
    }

    #[test]
    fn test_session_id_display() {
        assert_eq!(SessionId(3).to_string(), "S-3");
    }

    #[test]
    fn test_room_code_random_uses_unambiguous_alphabet() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let code = RoomCode::random(&mut rng);
            assert_eq!(code.as_str().len(), RoomCode::LENGTH);
            for c in code.as_str().bytes() {
                assert!(RoomCode::ALPHABET.contains(&c), "unexpected {}", c as char);
                assert!(!b"IO01".contains(&c));
            }
        }
    }

    #[test]
    fn test_room_code_normalizes_case_and_whitespace() {
        assert_eq!(RoomCode::new("  k7qw2p "), RoomCode::new("K7QW2P"));
    }

    #[test]
    fn test_room_code_deserialize_normalizes() {
        let code: RoomCode = serde_json::from_str("\"abcdef\"").unwrap();
        assert_eq!(code.as_str(), "ABCDEF");
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"ABCDEF\"");
    }

    #[test]
    fn test_create_room_defaults_missing_fields() {
        let req: Request = serde_json::from_str(r#"{"op":"create-room"}"#).unwrap();
        assert_eq!(
            req,
            Request::CreateRoom {
                host_name: String::new(),
                settings: SettingsInput::default(),
            }
        );
    }

    #[test]
    fn test_create_room_partial_settings() {
        let req: Request = serde_json::from_str(
            r#"{"op":"create-room","host_name":"Ann","settings":{"bet_min":5,"use_timer":true}}"#,
        )
        .unwrap();
        let Request::CreateRoom { host_name, settings } = req else {
            panic!("expected create-room");
        };
        assert_eq!(host_name, "Ann");
        assert_eq!(settings.bet_min, Some(5));
        assert_eq!(settings.use_timer, Some(true));
        assert_eq!(settings.bet_max, None);
    }

    #[test]
    fn test_join_room_player_id_optional() {
        let req: Request =
            serde_json::from_str(r#"{"op":"join-room","code":"abc","player_name":"Bo"}"#).unwrap();
        assert!(matches!(req, Request::JoinRoom { player_id: None, .. }));
    }

    #[test]
    fn test_request_tagged_by_op() {
        let json = serde_json::to_value(Request::NextRound { code: RoomCode::new("QQQQQQ") }).unwrap();
        assert_eq!(json["op"], "next-round");
        assert_eq!(json["code"], "QQQQQQ");

        let json = serde_json::to_value(Request::Payouts).unwrap();
        assert_eq!(json["op"], "payouts");
    }

    #[test]
    fn test_place_bet_accepts_negative_amount_on_the_wire() {
        let req: Request = serde_json::from_str(
            r#"{"op":"place-bet","code":"A","player_id":"p","number":13,"amount":-5}"#,
        )
        .unwrap();
        assert!(matches!(req, Request::PlaceBet { number: 13, amount: -5, .. }));
    }
}
