//! Wire protocol for Dicebet.
//!
//! This crate defines the vocabulary shared by the room core and the
//! transport-facing front end:
//!
//! - **Identity** ([`PlayerId`], [`SessionId`], [`RoomCode`]): the two
//!   id spaces for players and their transport sessions, and the short
//!   codes rooms are addressed by.
//! - **Requests** ([`Request`], [`SettingsInput`]): what a client can ask
//!   the server to do.
//! - **Framing** ([`Envelope`]) and **codecs** ([`Codec`], [`JsonCodec`]).
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope<Request>) → Service → Room
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{Envelope, PlayerId, Request, RoomCode, SessionId, SettingsInput};
