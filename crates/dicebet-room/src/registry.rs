//! Room registry: creates rooms, finds them by code, and forgets them
//! once they empty or their actor stops on its own.

use std::collections::HashMap;
use std::sync::Arc;

use dicebet_dice::{DiceSource, RandomDice};
use dicebet_protocol::{PlayerId, RoomCode, SettingsInput};
use tracing::{debug, info};

use crate::actor::spawn_room;
use crate::{Departure, Room, RoomConfig, RoomError, RoomHandle, Settings};

/// Builds the dice each new room rolls with.
pub type DiceFactory = Arc<dyn Fn() -> Box<dyn DiceSource> + Send + Sync>;

/// All live rooms, keyed by code.
///
/// An owned value: the server wraps one in a `tokio::sync::Mutex`, tests
/// build as many independent registries as they like.
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, RoomHandle>,
    config: RoomConfig,
    dice: DiceFactory,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}

impl RoomRegistry {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            config,
            dice: Arc::new(|| Box::new(RandomDice) as Box<dyn DiceSource>),
        }
    }

    /// Replaces the dice used by rooms created from now on.
    pub fn with_dice(
        mut self,
        factory: impl Fn() -> Box<dyn DiceSource> + Send + Sync + 'static,
    ) -> Self {
        self.dice = Arc::new(factory);
        self
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Creates a room in the lobby and starts its actor.
    ///
    /// Must be called from within a Tokio runtime. Rooms whose actors have
    /// stopped are dropped first. A room nobody joins within
    /// [`RoomConfig::empty_room_grace`] stops by itself.
    pub fn create_room(&mut self, host_name: &str, input: &SettingsInput) -> RoomHandle {
        self.prune();
        let code = self.unused_code();
        let settings = Settings::from_input(input);
        let room = Room::new(code.clone(), host_name, settings, self.config.clone());
        let handle = spawn_room(room, (self.dice)(), &self.config);

        self.rooms.insert(code.clone(), handle.clone());
        info!(room = %code, rooms = self.rooms.len(), "room created");
        handle
    }

    /// Looks up a live room.
    pub fn get(&self, code: &RoomCode) -> Option<RoomHandle> {
        self.rooms
            .get(code)
            .filter(|handle| !handle.is_closed())
            .cloned()
    }

    /// Like [`get`](Self::get), with a `RoomNotFound` error.
    pub fn require(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.get(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))
    }

    /// Removes a player; forgets the room if that emptied it.
    pub async fn leave(
        &mut self,
        code: &RoomCode,
        player_id: PlayerId,
    ) -> Result<Departure, RoomError> {
        let handle = self.require(code)?;
        let result = handle.leave(player_id).await;
        self.settle_departure(code, result)
    }

    /// Host-only removal; forgets the room if that emptied it.
    pub async fn kick(
        &mut self,
        code: &RoomCode,
        by: PlayerId,
        target: PlayerId,
    ) -> Result<Departure, RoomError> {
        let handle = self.require(code)?;
        let result = handle.kick(by, target).await;
        self.settle_departure(code, result)
    }

    fn settle_departure(
        &mut self,
        code: &RoomCode,
        result: Result<Departure, RoomError>,
    ) -> Result<Departure, RoomError> {
        match &result {
            Ok(departure) if departure.room_empty => self.forget(code),
            Err(RoomError::Unavailable(_)) => self.forget(code),
            _ => {}
        }
        result
    }

    fn forget(&mut self, code: &RoomCode) {
        if self.rooms.remove(code).is_some() {
            info!(room = %code, rooms = self.rooms.len(), "room removed");
        }
    }

    /// Drops handles whose actors have stopped.
    pub fn prune(&mut self) -> usize {
        let before = self.rooms.len();
        self.rooms.retain(|_, handle| !handle.is_closed());
        let pruned = before - self.rooms.len();
        if pruned > 0 {
            debug!(pruned, rooms = self.rooms.len(), "pruned stopped rooms");
        }
        pruned
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn unused_code(&self) -> RoomCode {
        let mut rng = rand::rng();
        loop {
            let code = RoomCode::random(&mut rng);
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_create_room_registers_unique_codes() {
        let mut registry = RoomRegistry::default();
        let a = registry.create_room("Ann", &SettingsInput::default());
        let b = registry.create_room("Bob", &SettingsInput::default());

        assert_ne!(a.code(), b.code());
        assert_eq!(registry.room_count(), 2);
        assert_eq!(a.code().as_str().len(), RoomCode::LENGTH);
        assert!(registry.get(a.code()).is_some());
        assert_eq!(a.settings(), &Settings::default());
    }

    #[tokio::test]
    async fn test_unknown_code_not_found() {
        let registry = RoomRegistry::default();
        let code = RoomCode::new("ZZZZZZ");
        assert!(registry.get(&code).is_none());
        assert_eq!(
            registry.require(&code).unwrap_err(),
            RoomError::RoomNotFound(code)
        );
    }

    #[tokio::test]
    async fn test_last_leave_removes_room() {
        let mut registry = RoomRegistry::default();
        let handle = registry.create_room("Ann", &SettingsInput::default());
        let code = handle.code().clone();
        let receipt = handle.join("Ann", None, None).await.unwrap();
        let id = receipt.outcome.player_id().clone();

        let departure = registry.leave(&code, id).await.unwrap();

        assert!(departure.room_empty);
        assert_eq!(registry.room_count(), 0);
        assert!(registry.get(&code).is_none());
        // The actor stopped with the room.
        assert!(matches!(
            handle.snapshot().await,
            Err(RoomError::Unavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unjoined_room_is_collected_after_grace() {
        let mut registry = RoomRegistry::default();
        let grace = registry.config().empty_room_grace;
        let idle = registry.create_room("Ann", &SettingsInput::default());
        let joined = registry.create_room("Bob", &SettingsInput::default());
        joined.join("Bob", None, None).await.unwrap();

        tokio::time::sleep(grace + Duration::from_secs(1)).await;
        while !idle.is_closed() {
            tokio::task::yield_now().await;
        }

        assert!(registry.get(idle.code()).is_none());
        assert!(registry.get(joined.code()).is_some());
        let fresh = registry.create_room("Cy", &SettingsInput::default());
        assert_eq!(registry.room_count(), 2);
        assert!(registry.get(fresh.code()).is_some());
    }

    #[tokio::test]
    async fn test_prune_drops_stopped_rooms() {
        let mut registry = RoomRegistry::default();
        let handle = registry.create_room("Ann", &SettingsInput::default());
        handle.shutdown().await.unwrap();
        // Wait for the actor to observe the shutdown and drop its receiver.
        while !handle.is_closed() {
            tokio::task::yield_now().await;
        }
        assert!(registry.get(handle.code()).is_none());
        assert_eq!(registry.prune(), 1);
        assert_eq!(registry.room_count(), 0);
    }
}
