//! Per-connection handler: request routing and event push.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The task serves two inputs:
//!   1. Frames from the socket → decode `Envelope<Request>` → service call → reply
//!   2. Events from the room the connection is attached to → `event` frame
//!
//! A connection is attached to at most one (room, player) at a time.
//! Closing it detaches that player; it never leaves the room.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dicebet_protocol::{Codec, Envelope, PlayerId, Request, RoomCode, SessionId};
use dicebet_room::{Attachment, EventSender, RoomError, RoomEvent};
use dicebet_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::DicebetError;
use crate::message::ServerMessage;
use crate::server::ServerState;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Seat {
    code: RoomCode,
    player_id: PlayerId,
}

/// The connection's side of its attachment.
///
/// Dropping it detaches the seat, so cleanup happens however the handler
/// exits. `Drop` is synchronous, hence the fire-and-forget task.
struct ClientSession {
    id: SessionId,
    events: EventSender,
    seat: Option<Seat>,
    state: Arc<ServerState>,
}

impl ClientSession {
    fn attachment(&self) -> Attachment {
        Attachment {
            session: self.id,
            events: self.events.clone(),
        }
    }

    /// Records the new seat and detaches the previous one if it differs.
    async fn sit(&mut self, code: RoomCode, player_id: PlayerId) {
        let seat = Seat { code, player_id };
        if let Some(previous) = self.seat.replace(seat.clone()) {
            if previous != seat {
                self.state
                    .service
                    .detach(&previous.code, previous.player_id, self.id)
                    .await;
            }
        }
    }

    fn is_seated(&self, code: &RoomCode, player_id: &PlayerId) -> bool {
        self.seat
            .as_ref()
            .is_some_and(|seat| &seat.code == code && &seat.player_id == player_id)
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        if let Some(Seat { code, player_id }) = self.seat.take() {
            let state = Arc::clone(&self.state);
            let session = self.id;
            tokio::spawn(async move {
                state.service.detach(&code, player_id, session).await;
            });
        }
    }
}

/// Numbers and timestamps outbound frames.
struct Outbox {
    seq: u64,
    start: Instant,
}

impl Outbox {
    fn new() -> Self {
        Self {
            seq: 1,
            start: Instant::now(),
        }
    }

    async fn send(
        &mut self,
        conn: &WebSocketConnection,
        codec: &impl Codec,
        message: ServerMessage,
    ) -> Result<(), DicebetError> {
        let envelope = Envelope {
            seq: next_seq(&mut self.seq),
            timestamp: self.start.elapsed().as_millis() as u64,
            payload: message,
        };
        let bytes = codec.encode(&envelope)?;
        match std::str::from_utf8(&bytes) {
            Ok(text) => conn.send_text(text).await?,
            Err(_) => conn.send(&bytes).await?,
        }
        Ok(())
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), DicebetError> {
    let conn_id = conn.id();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut session = ClientSession {
        id: SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)),
        events: events_tx,
        seat: None,
        state: Arc::clone(&state),
    };
    let mut outbox = Outbox::new();
    tracing::debug!(%conn_id, session = %session.id, peer = %conn.peer_addr(), "handling new connection");

    loop {
        tokio::select! {
            incoming = conn.recv() => {
                let data = match incoming {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::debug!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                };

                let reply = match state.codec.decode::<Envelope<Request>>(&data) {
                    Ok(envelope) => dispatch(&mut session, envelope.payload).await,
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                        ServerMessage::Error {
                            code: 400,
                            message: e.to_string(),
                        }
                    }
                };
                outbox.send(&conn, &state.codec, reply).await?;
            }
            Some(event) = events_rx.recv() => {
                tracing::trace!(session = %session.id, event = event.name(), "pushing event");
                if matches!(event, RoomEvent::Kicked) {
                    // The room has already dropped this player.
                    session.seat = None;
                }
                outbox.send(&conn, &state.codec, ServerMessage::Event(event)).await?;
            }
        }
    }

    // session drops here → the seat is detached.
    Ok(())
}

/// Runs one request and turns the result into a reply frame.
async fn dispatch(session: &mut ClientSession, request: Request) -> ServerMessage {
    let op = op_name(&request);
    match execute(session, request).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::debug!(session = %session.id, op, error = %e, "request rejected");
            ServerMessage::error(&e)
        }
    }
}

async fn execute(
    session: &mut ClientSession,
    request: Request,
) -> Result<ServerMessage, RoomError> {
    let state = Arc::clone(&session.state);
    let service = &state.service;
    let op = op_name(&request);

    let reply = match request {
        Request::CreateRoom {
            host_name,
            settings,
        } => ServerMessage::RoomCreated(service.create_room(&host_name, &settings).await?),

        Request::JoinRoom {
            code,
            player_name,
            player_id,
        } => {
            let joined = service
                .join_room(&code, &player_name, player_id, Some(session.attachment()))
                .await?;
            session.sit(code, joined.player_id.clone()).await;
            ServerMessage::Joined(joined)
        }

        Request::Reconnect { code, player_id } => {
            let snapshot = service
                .reconnect(&code, player_id.clone(), Some(session.attachment()))
                .await?;
            session.sit(code, player_id).await;
            ServerMessage::Snapshot(snapshot)
        }

        Request::SetReady {
            code,
            player_id,
            ready,
        } => {
            service.set_ready(&code, player_id, ready).await?;
            ServerMessage::ack(op)
        }

        Request::SetColor {
            code,
            player_id,
            color,
        } => {
            service.set_color(&code, player_id, color).await?;
            ServerMessage::ack(op)
        }

        Request::StartGame { code, player_id } => {
            service.start_game(&code, player_id).await?;
            ServerMessage::ack(op)
        }

        Request::PlaceBet {
            code,
            player_id,
            number,
            amount,
        } => {
            service.place_bet(&code, player_id, number, amount).await?;
            ServerMessage::ack(op)
        }

        Request::PlaceSideBet {
            code,
            player_id,
            side_bet,
            amount,
        } => {
            service
                .place_side_bet(&code, player_id, &side_bet, amount)
                .await?;
            ServerMessage::ack(op)
        }

        Request::Roll { code } => {
            service.roll(&code).await?;
            ServerMessage::ack(op)
        }

        Request::NextRound { code } => {
            service.next_round(&code).await?;
            ServerMessage::ack(op)
        }

        Request::Chat {
            code,
            player_id,
            text,
        } => {
            service.chat(&code, player_id, &text).await?;
            ServerMessage::ack(op)
        }

        Request::Reaction {
            code,
            player_id,
            emoji,
        } => {
            service.react(&code, player_id, emoji).await?;
            ServerMessage::ack(op)
        }

        Request::Kick {
            code,
            player_id,
            target_id,
        } => {
            service.kick(&code, player_id, target_id).await?;
            ServerMessage::ack(op)
        }

        Request::Leave { code, player_id } => {
            let seated = session.is_seated(&code, &player_id);
            service.leave(&code, player_id).await?;
            if seated {
                session.seat = None;
            }
            ServerMessage::ack(op)
        }

        Request::Snapshot { code } => ServerMessage::Snapshot(service.snapshot(&code).await?),

        Request::Payouts => ServerMessage::Payouts(service.payouts()),
    };
    Ok(reply)
}

fn op_name(request: &Request) -> &'static str {
    match request {
        Request::CreateRoom { .. } => "create-room",
        Request::JoinRoom { .. } => "join-room",
        Request::Reconnect { .. } => "reconnect",
        Request::SetReady { .. } => "set-ready",
        Request::SetColor { .. } => "set-color",
        Request::StartGame { .. } => "start-game",
        Request::PlaceBet { .. } => "place-bet",
        Request::PlaceSideBet { .. } => "place-side-bet",
        Request::Roll { .. } => "roll",
        Request::NextRound { .. } => "next-round",
        Request::Chat { .. } => "chat",
        Request::Reaction { .. } => "reaction",
        Request::Kick { .. } => "kick",
        Request::Leave { .. } => "leave",
        Request::Snapshot { .. } => "snapshot",
        Request::Payouts => "payouts",
    }
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
