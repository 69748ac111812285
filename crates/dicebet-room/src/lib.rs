//! Rooms for Dicebet: the round state machine and everything around it.
//!
//! Each room runs as an isolated Tokio task (actor) that owns its
//! [`Room`], its round timer and the event senders of attached players.
//! Every operation is a command processed to completion before the next,
//! so a manual roll and a timer expiry never interleave.
//!
//! # Key types
//!
//! - [`Room`]: the synchronous, phase-gated state machine
//! - [`resolver`]: settles bets against a roll and finds the winner
//! - [`RoomRegistry`]: creates rooms, looks them up by code, drops empty ones
//! - [`RoomHandle`]: sends commands to a running room actor
//! - [`RoomEvent`]: what attached players receive
//! - [`Settings`] / [`RoomConfig`]: per-room rules and process-wide limits

mod actor;
mod config;
mod error;
mod event;
mod player;
mod registry;
pub mod resolver;
mod room;

pub use actor::{Attachment, EventSender, JoinReceipt, RoomHandle};
pub use config::{Phase, RoomConfig, Settings, WinCondition};
pub use error::RoomError;
pub use event::{
    ChatMessage, HistoryEntry, PendingBets, PendingSideBets, Reaction, ReadyEntry, RoomEvent,
    RoomSnapshot,
};
pub use player::{Player, PlayerView};
pub use registry::{DiceFactory, RoomRegistry};
pub use resolver::{BetResult, NumberBet, SideBet, Wager};
pub use room::{Departure, JoinOutcome, RollOutcome, Room};
