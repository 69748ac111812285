//! The game's operations, one method each, over a shared registry.
//!
//! The registry lock is held only long enough to look up a room handle;
//! the room's own actor does the work. `leave` and `kick` are the
//! exception: they keep the lock so an emptied room is forgotten in the
//! same step.

use dicebet_protocol::{PlayerId, RoomCode, SessionId, SettingsInput};
use dicebet_room::{
    Attachment, ChatMessage, Departure, Reaction, RollOutcome, RoomError, RoomHandle,
    RoomRegistry, RoomSnapshot,
};
use tokio::sync::Mutex;
use tracing::info;

use crate::message::{Joined, Payouts, RoomCreated};

pub struct RoomService {
    registry: Mutex<RoomRegistry>,
}

impl Default for RoomService {
    fn default() -> Self {
        Self::new(RoomRegistry::default())
    }
}

impl RoomService {
    pub fn new(registry: RoomRegistry) -> Self {
        Self {
            registry: Mutex::new(registry),
        }
    }

    async fn room(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.registry.lock().await.require(code)
    }

    /// Opens a lobby. The host still has to join like everyone else.
    pub async fn create_room(
        &self,
        host_name: &str,
        settings: &SettingsInput,
    ) -> Result<RoomCreated, RoomError> {
        let handle = self.registry.lock().await.create_room(host_name, settings);
        let snapshot = handle.snapshot().await?;
        Ok(RoomCreated {
            code: snapshot.code,
            host_name: snapshot.host_name,
            settings: snapshot.settings,
        })
    }

    /// Seats a player, or re-attaches `player_id` when it is already a member.
    pub async fn join_room(
        &self,
        code: &RoomCode,
        player_name: &str,
        player_id: Option<PlayerId>,
        attachment: Option<Attachment>,
    ) -> Result<Joined, RoomError> {
        let handle = self.room(code).await?;
        let receipt = handle.join(player_name, player_id, attachment).await?;
        let snapshot = receipt.snapshot;
        Ok(Joined {
            code: snapshot.code,
            player_id: receipt.outcome.player_id().clone(),
            reconnected: receipt.outcome.is_reconnect(),
            players: snapshot.players,
            ready: snapshot.ready,
            settings: snapshot.settings,
        })
    }

    pub async fn reconnect(
        &self,
        code: &RoomCode,
        player_id: PlayerId,
        attachment: Option<Attachment>,
    ) -> Result<RoomSnapshot, RoomError> {
        self.room(code).await?.reconnect(player_id, attachment).await
    }

    /// Drops a closed session's attachment. The player keeps their seat.
    pub async fn detach(&self, code: &RoomCode, player_id: PlayerId, session: SessionId) {
        let handle = self.registry.lock().await.get(code);
        if let Some(handle) = handle {
            handle.detach(player_id, session).await;
        }
    }

    pub async fn set_ready(
        &self,
        code: &RoomCode,
        player_id: PlayerId,
        ready: bool,
    ) -> Result<(), RoomError> {
        self.room(code).await?.set_ready(player_id, ready).await
    }

    pub async fn set_color(
        &self,
        code: &RoomCode,
        player_id: PlayerId,
        color: Option<String>,
    ) -> Result<(), RoomError> {
        self.room(code).await?.set_color(player_id, color).await
    }

    pub async fn start_game(&self, code: &RoomCode, player_id: PlayerId) -> Result<(), RoomError> {
        self.room(code).await?.start(player_id).await
    }

    pub async fn place_bet(
        &self,
        code: &RoomCode,
        player_id: PlayerId,
        number: i64,
        amount: i64,
    ) -> Result<(), RoomError> {
        self.room(code)
            .await?
            .place_bet(player_id, number, amount)
            .await
            .map(|_| ())
    }

    pub async fn place_side_bet(
        &self,
        code: &RoomCode,
        player_id: PlayerId,
        side_bet: &str,
        amount: i64,
    ) -> Result<(), RoomError> {
        self.room(code)
            .await?
            .place_side_bet(player_id, side_bet, amount)
            .await
            .map(|_| ())
    }

    pub async fn roll(&self, code: &RoomCode) -> Result<RollOutcome, RoomError> {
        self.room(code).await?.roll().await
    }

    pub async fn next_round(&self, code: &RoomCode) -> Result<(), RoomError> {
        self.room(code).await?.next_round().await
    }

    pub async fn chat(
        &self,
        code: &RoomCode,
        player_id: PlayerId,
        text: &str,
    ) -> Result<ChatMessage, RoomError> {
        self.room(code).await?.chat(player_id, text).await
    }

    pub async fn react(
        &self,
        code: &RoomCode,
        player_id: PlayerId,
        emoji: Option<String>,
    ) -> Result<Reaction, RoomError> {
        self.room(code).await?.react(player_id, emoji).await
    }

    pub async fn kick(
        &self,
        code: &RoomCode,
        by: PlayerId,
        target: PlayerId,
    ) -> Result<Departure, RoomError> {
        self.registry.lock().await.kick(code, by, target).await
    }

    pub async fn leave(&self, code: &RoomCode, player_id: PlayerId) -> Result<Departure, RoomError> {
        let departure = self.registry.lock().await.leave(code, player_id).await?;
        if departure.room_empty {
            info!(room = %code, "last player left");
        }
        Ok(departure)
    }

    pub async fn snapshot(&self, code: &RoomCode) -> Result<RoomSnapshot, RoomError> {
        self.room(code).await?.snapshot().await
    }

    pub fn payouts(&self) -> Payouts {
        Payouts::current()
    }

    /// Live rooms, after dropping any whose actor has stopped.
    pub async fn room_count(&self) -> usize {
        let mut registry = self.registry.lock().await;
        registry.prune();
        registry.room_count()
    }
}

#[cfg(test)]
mod tests {
    use dicebet_dice::{DiceSource, LoadedDice, Roll};
    use dicebet_room::{Phase, RoomConfig};

    use super::*;

    fn loaded(d1: u8, d2: u8) -> RoomService {
        let roll = Roll::new(d1, d2).unwrap();
        let registry = RoomRegistry::new(RoomConfig::default())
            .with_dice(move || Box::new(LoadedDice::new([roll])) as Box<dyn DiceSource>);
        RoomService::new(registry)
    }

    fn target(points: i64) -> SettingsInput {
        SettingsInput {
            target_points: Some(points),
            ..SettingsInput::default()
        }
    }

    #[tokio::test]
    async fn test_create_room_reports_validated_settings() {
        let service = RoomService::default();
        let created = service
            .create_room(" Ann ", &SettingsInput {
                bet_min: Some(50),
                bet_max: Some(20),
                ..SettingsInput::default()
            })
            .await
            .unwrap();

        assert_eq!(created.host_name, "Ann");
        assert_eq!(created.settings.bet_min, 50);
        assert_eq!(created.settings.bet_max, 50);
        assert_eq!(service.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_blank_host_name_gets_placeholder() {
        let service = RoomService::default();
        let created = service.create_room("   ", &SettingsInput::default()).await.unwrap();
        assert_eq!(created.host_name, "Player");
    }

    #[tokio::test]
    async fn test_unknown_room_is_not_found() {
        let service = RoomService::default();
        let code = RoomCode::new("NOPE22");
        let err = service.snapshot(&code).await.unwrap_err();
        assert_eq!(err, RoomError::RoomNotFound(code.clone()));
        assert_eq!(err.code(), 404);
        assert_eq!(service.roll(&code).await.unwrap_err().code(), 404);
    }

    #[tokio::test]
    async fn test_single_bet_round_through_the_service() {
        let service = loaded(3, 4);
        let code = service.create_room("Alice", &target(1200)).await.unwrap().code;

        let joined = service.join_room(&code, "Alice", None, None).await.unwrap();
        assert!(!joined.reconnected);
        let alice = joined.player_id;

        service.start_game(&code, alice.clone()).await.unwrap();
        service.place_bet(&code, alice.clone(), 7, 100).await.unwrap();
        let outcome = service.roll(&code).await.unwrap();

        assert_eq!(outcome.roll.sum(), 7);
        assert_eq!(outcome.winner.map(|w| w.id), Some(alice.clone()));
        let snapshot = service.snapshot(&code).await.unwrap();
        assert_eq!(snapshot.phase, Phase::GameOver);
        assert_eq!(snapshot.player(&alice).map(|p| p.points), Some(1500));
    }

    #[tokio::test]
    async fn test_join_with_known_id_reattaches() {
        let service = RoomService::default();
        let code = service.create_room("Ann", &SettingsInput::default()).await.unwrap().code;
        let first = service.join_room(&code, "Ann", None, None).await.unwrap();

        let again = service
            .join_room(&code, "Someone else", Some(first.player_id.clone()), None)
            .await
            .unwrap();

        assert!(again.reconnected);
        assert_eq!(again.player_id, first.player_id);
        assert_eq!(again.players.len(), 1);
        assert_eq!(again.players[0].name, "Ann");
    }

    #[tokio::test]
    async fn test_last_leave_forgets_the_room() {
        let service = RoomService::default();
        let code = service.create_room("Ann", &SettingsInput::default()).await.unwrap().code;
        let ann = service.join_room(&code, "Ann", None, None).await.unwrap().player_id;

        let departure = service.leave(&code, ann).await.unwrap();

        assert!(departure.room_empty);
        assert_eq!(service.room_count().await, 0);
        assert!(matches!(
            service.snapshot(&code).await,
            Err(RoomError::RoomNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_kick_requires_host() {
        let service = RoomService::default();
        let code = service.create_room("Ann", &SettingsInput::default()).await.unwrap().code;
        let ann = service.join_room(&code, "Ann", None, None).await.unwrap().player_id;
        let bob = service.join_room(&code, "Bob", None, None).await.unwrap().player_id;

        let err = service.kick(&code, bob.clone(), ann.clone()).await.unwrap_err();
        assert_eq!(err.code(), 403);

        let departure = service.kick(&code, ann, bob).await.unwrap();
        assert_eq!(departure.player.name, "Bob");
        assert!(!departure.room_empty);
        assert_eq!(service.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_detach_of_unknown_room_is_ignored() {
        let service = RoomService::default();
        service
            .detach(&RoomCode::new("GONE22"), PlayerId::new("p-1"), SessionId(9))
            .await;
        assert_eq!(service.room_count().await, 0);
    }
}
