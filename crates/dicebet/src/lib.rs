//! # Dicebet
//!
//! A multiplayer dice-betting game server.
//!
//! Players gather in a room addressed by a short code, bet points on the
//! sum of two dice (and on side bets such as doubles or hard ways), and
//! the room settles every bet at fair odds when the dice are rolled. The
//! game ends when someone reaches the target or, in elimination mode,
//! when one player is left with points.
//!
//! Clients talk to the server over WebSocket with JSON
//! [`Envelope`](dicebet_protocol::Envelope) frames. Each request gets a
//! reply; everything that changes a room is also pushed as an `event` to
//! every attached player.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dicebet::prelude::*;
//!
//! # async fn run() -> Result<(), DicebetError> {
//! let server = Server::builder().bind("0.0.0.0:8000").build().await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod message;
mod server;
mod service;

pub use error::DicebetError;
pub use message::{Joined, Payouts, RoomCreated, ServerMessage};
pub use server::{DEFAULT_PORT, Server, ServerBuilder, resolve_bind_addr};
pub use service::RoomService;

pub mod prelude {
    pub use crate::{DicebetError, RoomService, Server, ServerBuilder, ServerMessage};
    pub use dicebet_dice::{DiceSource, LoadedDice, RandomDice, Roll, SideBetKind};
    pub use dicebet_protocol::{Envelope, PlayerId, Request, RoomCode, SessionId, SettingsInput};
    pub use dicebet_room::{Phase, RoomConfig, RoomError, RoomEvent, RoomRegistry, Settings};
    pub use dicebet_timer::{DEFAULT_ROUND_SECS, MAX_ROUND_SECS, MIN_ROUND_SECS};
}
