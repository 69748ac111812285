//! Room actor: an isolated Tokio task that owns one [`Room`].
//!
//! The actor serves two inputs from a single `select!` loop: commands
//! from [`RoomHandle`]s and the room's [`RoundTimer`]. Because both are
//! handled on the same task, a manual roll and a timer expiry can never
//! overlap. The room generation carried by the timer guards the rest.

use std::collections::HashMap;
use std::sync::Arc;

use dicebet_dice::DiceSource;
use dicebet_protocol::{PlayerId, RoomCode, SessionId};
use dicebet_timer::{Expiry, RoundTimer};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::resolver::{NumberBet, SideBet};
use crate::{
    ChatMessage, Departure, JoinOutcome, Phase, Reaction, RollOutcome, Room, RoomConfig,
    RoomError, RoomEvent, RoomSnapshot, Settings,
};

/// Channel an attached connection receives room events on.
pub type EventSender = mpsc::UnboundedSender<RoomEvent>;

/// A connection attaching itself to a player.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub session: SessionId,
    pub events: EventSender,
}

/// Reply to a join: who joined and the room as they now see it.
#[derive(Debug, Clone)]
pub struct JoinReceipt {
    pub outcome: JoinOutcome,
    pub snapshot: RoomSnapshot,
}

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

pub(crate) enum RoomCommand {
    Join {
        name: String,
        player_id: Option<PlayerId>,
        attachment: Option<Attachment>,
        reply: Reply<JoinReceipt>,
    },
    Reconnect {
        player_id: PlayerId,
        attachment: Option<Attachment>,
        reply: Reply<RoomSnapshot>,
    },
    Detach {
        player_id: PlayerId,
        session: SessionId,
    },
    SetReady {
        player_id: PlayerId,
        ready: bool,
        reply: Reply<()>,
    },
    SetColor {
        player_id: PlayerId,
        color: Option<String>,
        reply: Reply<()>,
    },
    Start {
        by: PlayerId,
        reply: Reply<()>,
    },
    PlaceBet {
        player_id: PlayerId,
        number: i64,
        amount: i64,
        reply: Reply<NumberBet>,
    },
    PlaceSideBet {
        player_id: PlayerId,
        side_bet: String,
        amount: i64,
        reply: Reply<SideBet>,
    },
    Roll {
        reply: Reply<RollOutcome>,
    },
    NextRound {
        reply: Reply<()>,
    },
    Chat {
        player_id: PlayerId,
        text: String,
        reply: Reply<ChatMessage>,
    },
    React {
        player_id: PlayerId,
        emoji: Option<String>,
        reply: Reply<Reaction>,
    },
    Kick {
        by: PlayerId,
        target: PlayerId,
        reply: Reply<Departure>,
    },
    Leave {
        player_id: PlayerId,
        reply: Reply<Departure>,
    },
    Snapshot {
        reply: Reply<RoomSnapshot>,
    },
    Shutdown,
}

// ---------------------------------------------------------------------------
// RoomHandle
// ---------------------------------------------------------------------------

/// Handle to a running room actor.
///
/// Cheap to clone. Every call fails with [`RoomError::Unavailable`] once
/// the actor has stopped.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    code: RoomCode,
    settings: Arc<Settings>,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// The room's settings; fixed at creation.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Whether the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))?
    }

    /// Seats a new player or re-attaches `player_id` if it is a member.
    pub async fn join(
        &self,
        name: impl Into<String>,
        player_id: Option<PlayerId>,
        attachment: Option<Attachment>,
    ) -> Result<JoinReceipt, RoomError> {
        let name = name.into();
        self.request(|reply| RoomCommand::Join {
            name,
            player_id,
            attachment,
            reply,
        })
        .await
    }

    /// Re-attaches an existing player and returns a full snapshot.
    pub async fn reconnect(
        &self,
        player_id: PlayerId,
        attachment: Option<Attachment>,
    ) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Reconnect {
            player_id,
            attachment,
            reply,
        })
        .await
    }

    /// Clears `player_id`'s attachment if it still belongs to `session`.
    /// Fire-and-forget; a stopped room is ignored.
    pub async fn detach(&self, player_id: PlayerId, session: SessionId) {
        let _ = self
            .sender
            .send(RoomCommand::Detach { player_id, session })
            .await;
    }

    pub async fn set_ready(&self, player_id: PlayerId, ready: bool) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::SetReady {
            player_id,
            ready,
            reply,
        })
        .await
    }

    pub async fn set_color(
        &self,
        player_id: PlayerId,
        color: Option<String>,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::SetColor {
            player_id,
            color,
            reply,
        })
        .await
    }

    pub async fn start(&self, by: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Start { by, reply }).await
    }

    pub async fn place_bet(
        &self,
        player_id: PlayerId,
        number: i64,
        amount: i64,
    ) -> Result<NumberBet, RoomError> {
        self.request(|reply| RoomCommand::PlaceBet {
            player_id,
            number,
            amount,
            reply,
        })
        .await
    }

    pub async fn place_side_bet(
        &self,
        player_id: PlayerId,
        side_bet: impl Into<String>,
        amount: i64,
    ) -> Result<SideBet, RoomError> {
        let side_bet = side_bet.into();
        self.request(|reply| RoomCommand::PlaceSideBet {
            player_id,
            side_bet,
            amount,
            reply,
        })
        .await
    }

    pub async fn roll(&self) -> Result<RollOutcome, RoomError> {
        self.request(|reply| RoomCommand::Roll { reply }).await
    }

    pub async fn next_round(&self) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::NextRound { reply }).await
    }

    pub async fn chat(
        &self,
        player_id: PlayerId,
        text: impl Into<String>,
    ) -> Result<ChatMessage, RoomError> {
        let text = text.into();
        self.request(|reply| RoomCommand::Chat {
            player_id,
            text,
            reply,
        })
        .await
    }

    pub async fn react(
        &self,
        player_id: PlayerId,
        emoji: Option<String>,
    ) -> Result<Reaction, RoomError> {
        self.request(|reply| RoomCommand::React {
            player_id,
            emoji,
            reply,
        })
        .await
    }

    /// Host-only removal. Prefer [`RoomRegistry::kick`](crate::RoomRegistry::kick),
    /// which also forgets the room when it empties.
    pub async fn kick(&self, by: PlayerId, target: PlayerId) -> Result<Departure, RoomError> {
        self.request(|reply| RoomCommand::Kick { by, target, reply })
            .await
    }

    /// Prefer [`RoomRegistry::leave`](crate::RoomRegistry::leave), which
    /// also forgets the room when it empties.
    pub async fn leave(&self, player_id: PlayerId) -> Result<Departure, RoomError> {
        self.request(|reply| RoomCommand::Leave { player_id, reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }
}

// ---------------------------------------------------------------------------
// RoomActor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

struct RoomActor {
    room: Room,
    dice: Box<dyn DiceSource>,
    timer: RoundTimer,
    subscribers: HashMap<PlayerId, Attachment>,
    receiver: mpsc::Receiver<RoomCommand>,
    /// When a room nobody has joined closes itself.
    abandon_at: Instant,
}

impl RoomActor {
    async fn run(mut self) {
        info!(room = %self.room.code(), "room actor started");

        loop {
            tokio::select! {
                command = self.receiver.recv() => {
                    let Some(command) = command else { break };
                    if self.handle(command) == Flow::Stop {
                        break;
                    }
                }
                expiry = self.timer.expired() => self.on_timer(expiry),
                _ = tokio::time::sleep_until(self.abandon_at), if self.room.is_empty() => {
                    info!(room = %self.room.code(), "room abandoned before anyone joined");
                    break;
                }
            }
        }

        info!(
            room = %self.room.code(),
            timed_rolls = self.timer.stats().fired,
            "room actor stopped"
        );
    }

    fn handle(&mut self, command: RoomCommand) -> Flow {
        match command {
            RoomCommand::Join {
                name,
                player_id,
                attachment,
                reply,
            } => {
                let _ = reply.send(self.handle_join(&name, player_id, attachment));
            }
            RoomCommand::Reconnect {
                player_id,
                attachment,
                reply,
            } => {
                let _ = reply.send(self.handle_reconnect(player_id, attachment));
            }
            RoomCommand::Detach { player_id, session } => self.handle_detach(player_id, session),
            RoomCommand::SetReady {
                player_id,
                ready,
                reply,
            } => {
                let result = self.room.set_ready(&player_id, ready);
                if result.is_ok() {
                    self.broadcast_players(None);
                }
                let _ = reply.send(self.logged("set ready", result));
            }
            RoomCommand::SetColor {
                player_id,
                color,
                reply,
            } => {
                let result = self.room.set_color(&player_id, color.as_deref());
                if result.is_ok() {
                    self.broadcast_players(None);
                }
                let _ = reply.send(self.logged("set color", result));
            }
            RoomCommand::Start { by, reply } => {
                let result = self.handle_start(&by);
                let _ = reply.send(self.logged("start", result));
            }
            RoomCommand::PlaceBet {
                player_id,
                number,
                amount,
                reply,
            } => {
                let result = self.room.place_bet(&player_id, number, amount);
                if let Ok(bet) = &result {
                    self.broadcast(RoomEvent::BetPlaced {
                        player_id,
                        number: bet.number,
                        amount: bet.amount,
                        players: self.room.player_views(),
                    });
                }
                let _ = reply.send(self.logged("place bet", result));
            }
            RoomCommand::PlaceSideBet {
                player_id,
                side_bet,
                amount,
                reply,
            } => {
                let result = self.room.place_side_bet(&player_id, &side_bet, amount);
                if let Ok(bet) = &result {
                    self.broadcast(RoomEvent::SideBetPlaced {
                        player_id,
                        side_bet: bet.kind,
                        amount: bet.amount,
                        players: self.room.player_views(),
                    });
                }
                let _ = reply.send(self.logged("place side bet", result));
            }
            RoomCommand::Roll { reply } => {
                let result = self.roll_and_broadcast();
                let _ = reply.send(self.logged("roll", result));
            }
            RoomCommand::NextRound { reply } => {
                let result = self.handle_next_round();
                let _ = reply.send(self.logged("next round", result));
            }
            RoomCommand::Chat {
                player_id,
                text,
                reply,
            } => {
                let result = self.room.chat_message(&player_id, &text);
                if let Ok(message) = &result {
                    self.broadcast(RoomEvent::ChatMessage(message.clone()));
                }
                let _ = reply.send(self.logged("chat", result));
            }
            RoomCommand::React {
                player_id,
                emoji,
                reply,
            } => {
                let result = self.room.reaction(&player_id, emoji.as_deref());
                if let Ok(reaction) = &result {
                    self.broadcast(RoomEvent::Reaction(reaction.clone()));
                }
                let _ = reply.send(self.logged("reaction", result));
            }
            RoomCommand::Kick { by, target, reply } => {
                let result = self.room.kick(&by, &target);
                return self.finish_departure("kick", result, true, reply);
            }
            RoomCommand::Leave { player_id, reply } => {
                let result = self.room.leave(&player_id);
                return self.finish_departure("leave", result, false, reply);
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(Ok(self.room.snapshot()));
            }
            RoomCommand::Shutdown => {
                info!(room = %self.room.code(), "room shutting down");
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    fn handle_join(
        &mut self,
        name: &str,
        player_id: Option<PlayerId>,
        attachment: Option<Attachment>,
    ) -> Result<JoinReceipt, RoomError> {
        let session = attachment.as_ref().map(|a| a.session);
        let joined = self.room.join(name, player_id, session);
        let outcome = self.logged("join", joined)?;
        let id = outcome.player_id().clone();

        if let Some(attachment) = attachment {
            self.subscribers.insert(id.clone(), attachment);
        }
        info!(
            room = %self.room.code(),
            player_id = %id,
            reconnected = outcome.is_reconnect(),
            players = self.room.players().len(),
            "player joined"
        );
        self.broadcast_players(None);

        Ok(JoinReceipt {
            outcome,
            snapshot: self.room.snapshot(),
        })
    }

    fn handle_reconnect(
        &mut self,
        player_id: PlayerId,
        attachment: Option<Attachment>,
    ) -> Result<RoomSnapshot, RoomError> {
        if let Some(attachment) = attachment {
            let attached = self.room.attach(&player_id, attachment.session);
            self.logged("reconnect", attached)?;
            self.subscribers.insert(player_id.clone(), attachment);
            self.broadcast_players(None);
        } else if self.room.player(&player_id).is_none() {
            return self.logged("reconnect", Err(RoomError::PlayerNotFound(player_id)));
        }
        info!(room = %self.room.code(), %player_id, "player reconnected");
        Ok(self.room.snapshot())
    }

    fn handle_detach(&mut self, player_id: PlayerId, session: SessionId) {
        if !self.room.detach(&player_id, session) {
            debug!(room = %self.room.code(), %player_id, %session, "stale detach ignored");
            return;
        }
        self.subscribers.remove(&player_id);
        info!(room = %self.room.code(), %player_id, "player disconnected");
        self.broadcast_players(None);
    }

    fn handle_start(&mut self, by: &PlayerId) -> Result<(), RoomError> {
        self.room.start(by)?;
        self.arm_timer();
        info!(
            room = %self.room.code(),
            players = self.room.players().len(),
            "game started"
        );
        self.broadcast(RoomEvent::GameStarted {
            phase: self.room.phase(),
            round: self.room.round(),
            round_ends_at: self.room.round_ends_at(),
            settings: self.room.settings().clone(),
            players: self.room.player_views(),
        });
        Ok(())
    }

    fn handle_next_round(&mut self) -> Result<(), RoomError> {
        self.room.next_round()?;
        self.arm_timer();
        info!(room = %self.room.code(), round = self.room.round(), "round opened");
        self.broadcast(RoomEvent::NextRound {
            phase: self.room.phase(),
            round: self.room.round(),
            round_ends_at: self.room.round_ends_at(),
            players: self.room.player_views(),
        });
        Ok(())
    }

    fn roll_and_broadcast(&mut self) -> Result<RollOutcome, RoomError> {
        let outcome = self.room.roll(self.dice.as_mut())?;
        self.timer.cancel();

        info!(
            room = %self.room.code(),
            round = outcome.round,
            sum = outcome.roll.sum(),
            bets = outcome.results.len(),
            "round rolled"
        );
        if let Some(winner) = &outcome.winner {
            info!(room = %self.room.code(), winner = %winner.id, "game over");
        }

        self.broadcast(RoomEvent::DiceRolled {
            roll: outcome.roll,
            results: outcome.results.clone(),
            summary: outcome.summary.clone(),
            winner: outcome.winner.clone(),
            players: self.room.player_views(),
        });
        Ok(outcome)
    }

    fn on_timer(&mut self, expiry: Expiry) {
        if self.room.phase() != Phase::Betting || self.room.generation() != expiry.generation {
            debug!(
                room = %self.room.code(),
                generation = expiry.generation,
                current = self.room.generation(),
                "stale round timer ignored"
            );
            return;
        }
        debug!(room = %self.room.code(), late_by = ?expiry.late_by, "round timer expired");
        let rolled = self.roll_and_broadcast();
        let _ = self.logged("auto roll", rolled);
    }

    fn arm_timer(&mut self) {
        if self.room.settings().use_timer {
            self.timer
                .arm(self.room.generation(), self.room.settings().round_duration());
        } else {
            self.timer.cancel();
        }
    }

    fn finish_departure(
        &mut self,
        action: &'static str,
        result: Result<Departure, RoomError>,
        kicked: bool,
        reply: Reply<Departure>,
    ) -> Flow {
        let departure = match self.logged(action, result) {
            Ok(departure) => departure,
            Err(err) => {
                let _ = reply.send(Err(err));
                return Flow::Continue;
            }
        };

        let id = departure.player.id.clone();
        if let Some(attachment) = self.subscribers.remove(&id) {
            if kicked {
                let _ = attachment.events.send(RoomEvent::Kicked);
            }
        }
        info!(
            room = %self.room.code(),
            player_id = %id,
            kicked,
            players = self.room.players().len(),
            "player left"
        );
        if let Some(host) = &departure.new_host {
            info!(room = %self.room.code(), host = %host, "host transferred");
        }

        let empty = departure.room_empty;
        if !empty {
            self.broadcast_players(kicked.then_some(id));
        }
        let _ = reply.send(Ok(departure));

        if empty {
            info!(room = %self.room.code(), "room closed");
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    fn logged<T>(&self, action: &'static str, result: Result<T, RoomError>) -> Result<T, RoomError> {
        if let Err(err) = &result {
            debug!(room = %self.room.code(), action, error = %err, "operation rejected");
        }
        result
    }

    fn broadcast_players(&self, kicked_id: Option<PlayerId>) {
        self.broadcast(RoomEvent::PlayersUpdate {
            players: self.room.player_views(),
            ready: self.room.ready_entries(),
            kicked_id,
        });
    }

    /// Sends to every attached player. Dropped receivers are skipped.
    fn broadcast(&self, event: RoomEvent) {
        for attachment in self.subscribers.values() {
            let _ = attachment.events.send(event.clone());
        }
    }
}

/// Spawns a room actor and returns its handle.
pub(crate) fn spawn_room(
    room: Room,
    dice: Box<dyn DiceSource>,
    config: &RoomConfig,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size);
    let handle = RoomHandle {
        code: room.code().clone(),
        settings: Arc::new(room.settings().clone()),
        sender: tx,
    };

    let actor = RoomActor {
        room,
        dice,
        timer: RoundTimer::new(),
        subscribers: HashMap::new(),
        receiver: rx,
        abandon_at: Instant::now() + config.empty_room_grace,
    };
    tokio::spawn(actor.run());

    handle
}
