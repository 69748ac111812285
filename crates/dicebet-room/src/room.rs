//! The room state machine.
//!
//! [`Room`] is plain synchronous state. Every operation validates fully
//! before mutating anything, so a rejected call leaves the room exactly
//! as it was. The actor in `actor.rs` owns one `Room` and is the only
//! thing that calls into it.

use std::collections::{HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use dicebet_dice::{DiceSource, Roll, SideBetKind};
use dicebet_protocol::{PlayerId, RoomCode, SessionId};
use tracing::debug;

use crate::event::{
    ChatMessage, HistoryEntry, PendingBets, PendingSideBets, Reaction, ReadyEntry, RoomSnapshot,
};
use crate::player::{clip, display_name};
use crate::resolver::{self, BetResult, NumberBet, SideBet};
use crate::{Phase, Player, PlayerView, RoomConfig, RoomError, Settings};

const DEFAULT_EMOJI: &str = "👍";

/// Result of [`Room::join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// A new player took a seat.
    Joined(PlayerId),
    /// An existing player re-attached; nothing else changed.
    Reattached(PlayerId),
}

impl JoinOutcome {
    pub fn player_id(&self) -> &PlayerId {
        match self {
            Self::Joined(id) | Self::Reattached(id) => id,
        }
    }

    pub fn is_reconnect(&self) -> bool {
        matches!(self, Self::Reattached(_))
    }
}

/// A player removed by leave or kick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub player: Player,
    /// Set when the departing player was host and someone remains.
    pub new_host: Option<PlayerId>,
    pub room_empty: bool,
}

/// Everything produced by one roll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollOutcome {
    pub round: u32,
    pub roll: Roll,
    pub results: Vec<BetResult>,
    pub summary: String,
    pub winner: Option<PlayerView>,
}

/// One game room.
#[derive(Debug)]
pub struct Room {
    code: RoomCode,
    host: Option<PlayerId>,
    host_name: String,
    settings: Settings,
    config: RoomConfig,
    players: Vec<Player>,
    ready: HashMap<PlayerId, bool>,
    bets: HashMap<PlayerId, Vec<NumberBet>>,
    side_bets: HashMap<PlayerId, Vec<SideBet>>,
    phase: Phase,
    round: u32,
    last_roll: Option<Roll>,
    round_ends_at: Option<u64>,
    winner: Option<PlayerId>,
    chat: VecDeque<ChatMessage>,
    /// Newest first.
    history: VecDeque<HistoryEntry>,
    /// Bumped whenever betting opens or closes; the round timer carries
    /// the value it was armed with.
    generation: u64,
}

impl Room {
    pub fn new(code: RoomCode, host_name: &str, settings: Settings, config: RoomConfig) -> Self {
        let host_name = display_name(host_name, config.max_name_len);
        Self {
            code,
            host: None,
            host_name,
            settings,
            config,
            players: Vec::new(),
            ready: HashMap::new(),
            bets: HashMap::new(),
            side_bets: HashMap::new(),
            phase: Phase::Lobby,
            round: 0,
            last_roll: None,
            round_ends_at: None,
            winner: None,
            chat: VecDeque::new(),
            history: VecDeque::new(),
            generation: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn host(&self) -> Option<&PlayerId> {
        self.host.as_ref()
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_roll(&self) -> Option<Roll> {
        self.last_roll
    }

    /// Betting deadline in Unix milliseconds, while a timed round is open.
    pub fn round_ends_at(&self) -> Option<u64> {
        self.round_ends_at
    }

    pub fn winner(&self) -> Option<&PlayerId> {
        self.winner.as_ref()
    }

    /// Players in join order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub fn player_views(&self) -> Vec<PlayerView> {
        self.players.iter().map(Player::view).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_ready(&self, id: &PlayerId) -> bool {
        self.ready.get(id).copied().unwrap_or(false)
    }

    /// True when the room has players and every one of them is ready.
    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| self.is_ready(&p.id))
    }

    pub fn ready_entries(&self) -> Vec<ReadyEntry> {
        self.players
            .iter()
            .map(|p| ReadyEntry {
                player_id: p.id.clone(),
                ready: self.is_ready(&p.id),
            })
            .collect()
    }

    pub fn number_bets(&self, id: &PlayerId) -> &[NumberBet] {
        self.bets.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn side_bets(&self, id: &PlayerId) -> &[SideBet] {
        self.side_bets.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Chat log, oldest first.
    pub fn chat(&self) -> impl Iterator<Item = &ChatMessage> {
        self.chat.iter()
    }

    /// Round history, newest first.
    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Seats a new player, or re-attaches an existing one when
    /// `requested_id` names a member.
    ///
    /// Re-attaching works in any phase and only touches the session.
    /// New players are admitted in the lobby only.
    pub fn join(
        &mut self,
        name: &str,
        requested_id: Option<PlayerId>,
        session: Option<SessionId>,
    ) -> Result<JoinOutcome, RoomError> {
        let requested_id = requested_id.filter(|id| !id.as_str().is_empty());

        if let Some(id) = &requested_id {
            if let Some(player) = self.player_mut(id) {
                if session.is_some() {
                    player.session = session;
                }
                return Ok(JoinOutcome::Reattached(id.clone()));
            }
        }

        if !self.phase.is_joinable() {
            return Err(self.wrong_phase("join"));
        }

        let id = match requested_id {
            Some(id) => id,
            None => self.fresh_player_id(),
        };
        let name = display_name(name, self.config.max_name_len);
        let mut player = Player::new(id.clone(), name, self.settings.starting_points);
        player.session = session;

        self.players.push(player);
        self.ready.insert(id.clone(), false);
        if self.host.is_none() {
            self.host = Some(id.clone());
        }
        Ok(JoinOutcome::Joined(id))
    }

    /// Attaches `session` to an existing player.
    pub fn attach(&mut self, id: &PlayerId, session: SessionId) -> Result<(), RoomError> {
        let player = self.require_player_mut(id)?;
        player.session = Some(session);
        Ok(())
    }

    /// Clears the player's session if it is still `session`.
    ///
    /// Returns `true` if something changed. Never removes the player.
    pub fn detach(&mut self, id: &PlayerId, session: SessionId) -> bool {
        match self.player_mut(id) {
            Some(player) if player.session == Some(session) => {
                player.session = None;
                true
            }
            _ => false,
        }
    }

    /// Removes a player at the host's request.
    pub fn kick(&mut self, by: &PlayerId, target: &PlayerId) -> Result<Departure, RoomError> {
        if self.host.as_ref() != Some(by) {
            return Err(RoomError::Unauthorized("only the host can kick players".into()));
        }
        self.remove(target)
    }

    pub fn leave(&mut self, id: &PlayerId) -> Result<Departure, RoomError> {
        self.remove(id)
    }

    fn remove(&mut self, id: &PlayerId) -> Result<Departure, RoomError> {
        let index = self
            .players
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| RoomError::PlayerNotFound(id.clone()))?;

        let player = self.players.remove(index);
        self.ready.remove(id);
        self.bets.remove(id);
        self.side_bets.remove(id);

        let mut new_host = None;
        if self.host.as_ref() == Some(id) {
            self.host = self.players.first().map(|p| p.id.clone());
            new_host = self.host.clone();
        }

        Ok(Departure {
            player,
            new_host,
            room_empty: self.players.is_empty(),
        })
    }

    // -----------------------------------------------------------------------
    // Lobby
    // -----------------------------------------------------------------------

    pub fn set_ready(&mut self, id: &PlayerId, ready: bool) -> Result<(), RoomError> {
        if self.phase != Phase::Lobby {
            return Err(self.wrong_phase("change readiness"));
        }
        self.require_player(id)?;
        self.ready.insert(id.clone(), ready);
        Ok(())
    }

    /// Sets or clears a player's display color.
    pub fn set_color(&mut self, id: &PlayerId, color: Option<&str>) -> Result<(), RoomError> {
        let max = self.config.max_color_len;
        let player = self.require_player_mut(id)?;
        player.color = color.map(|c| clip(c, max)).filter(|c| !c.is_empty());
        Ok(())
    }

    /// Opens round 1. Host only.
    pub fn start(&mut self, by: &PlayerId) -> Result<(), RoomError> {
        if self.host.as_ref() != Some(by) {
            return Err(RoomError::Unauthorized("only the host can start the game".into()));
        }
        if self.phase != Phase::Lobby {
            return Err(self.wrong_phase("start the game"));
        }
        if self.players.is_empty() {
            return Err(RoomError::validation("need at least one player"));
        }

        self.round = 1;
        self.winner = None;
        self.open_betting();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Betting
    // -----------------------------------------------------------------------

    /// Places a number bet and debits the stake.
    pub fn place_bet(
        &mut self,
        id: &PlayerId,
        number: i64,
        amount: i64,
    ) -> Result<NumberBet, RoomError> {
        if !self.phase.accepts_bets() {
            return Err(self.wrong_phase("place bets"));
        }
        let number = u8::try_from(number)
            .ok()
            .filter(|n| (2..=12).contains(n))
            .ok_or_else(|| RoomError::validation("number must be between 2 and 12"))?;
        self.check_amount(amount)?;
        let points = self.require_player(id)?.points;

        let existing = self.number_bets(id);
        let needed = existing
            .iter()
            .try_fold(amount, |total, b| total.checked_add(b.amount))
            .unwrap_or(i64::MAX);
        if points < needed {
            return Err(RoomError::InsufficientFunds {
                needed,
                available: points,
            });
        }
        if existing.len() >= self.config.max_number_bets {
            return Err(RoomError::LimitExceeded(format!(
                "at most {} number bets per round",
                self.config.max_number_bets
            )));
        }
        if existing.iter().any(|b| b.number == number) {
            return Err(RoomError::LimitExceeded(format!(
                "already bet on {number} this round"
            )));
        }

        let bet = NumberBet { number, amount };
        self.debit(id, amount);
        self.bets.entry(id.clone()).or_default().push(bet);
        Ok(bet)
    }

    /// Places a side bet and debits the stake.
    pub fn place_side_bet(
        &mut self,
        id: &PlayerId,
        kind: &str,
        amount: i64,
    ) -> Result<SideBet, RoomError> {
        let kind: SideBetKind = kind
            .parse()
            .map_err(|_| RoomError::validation(format!("unknown side bet {kind:?}")))?;
        if !self.phase.accepts_bets() {
            return Err(self.wrong_phase("place bets"));
        }
        self.check_amount(amount)?;
        let points = self.require_player(id)?.points;

        if self.side_bets(id).iter().any(|b| b.kind == kind) {
            return Err(RoomError::LimitExceeded(format!(
                "already placed a {kind} side bet this round"
            )));
        }
        if points < amount {
            return Err(RoomError::InsufficientFunds {
                needed: amount,
                available: points,
            });
        }

        let bet = SideBet { kind, amount };
        self.debit(id, amount);
        self.side_bets.entry(id.clone()).or_default().push(bet);
        Ok(bet)
    }

    fn check_amount(&self, amount: i64) -> Result<(), RoomError> {
        if amount <= 0 {
            return Err(RoomError::validation("amount must be positive"));
        }
        if amount < self.settings.bet_min {
            return Err(RoomError::validation(format!(
                "minimum bet is {}",
                self.settings.bet_min
            )));
        }
        if amount > self.settings.bet_max {
            return Err(RoomError::validation(format!(
                "maximum bet is {}",
                self.settings.bet_max
            )));
        }
        Ok(())
    }

    fn debit(&mut self, id: &PlayerId, amount: i64) {
        if let Some(player) = self.player_mut(id) {
            player.points = player.points.saturating_sub(amount);
        }
    }

    // -----------------------------------------------------------------------
    // Rounds
    // -----------------------------------------------------------------------

    /// Rolls `dice` and resolves the round.
    pub fn roll(&mut self, dice: &mut dyn DiceSource) -> Result<RollOutcome, RoomError> {
        if self.phase != Phase::Betting {
            return Err(self.wrong_phase("roll"));
        }
        let roll = dice.roll();
        self.resolve(roll)
    }

    /// Resolves the round with a roll decided by the caller.
    pub fn resolve(&mut self, roll: Roll) -> Result<RollOutcome, RoomError> {
        if self.phase != Phase::Betting {
            return Err(self.wrong_phase("roll"));
        }

        let results = resolver::settle(&mut self.players, &mut self.bets, &mut self.side_bets, &roll);
        let summary = resolver::round_summary(self.round, &roll, &results);

        self.history.push_front(HistoryEntry {
            round: self.round,
            roll,
            results: results.clone(),
        });
        self.history.truncate(self.config.history_capacity);

        self.last_roll = Some(roll);
        self.round_ends_at = None;
        self.generation += 1;

        let winner = resolver::find_winner(&self.players, &self.settings).map(Player::view);
        match &winner {
            Some(view) => {
                self.winner = Some(view.id.clone());
                self.transition(Phase::GameOver);
            }
            None => self.transition(Phase::Rolled),
        }

        Ok(RollOutcome {
            round: self.round,
            roll,
            results,
            summary,
            winner,
        })
    }

    /// Opens the next betting round after a roll.
    pub fn next_round(&mut self) -> Result<(), RoomError> {
        if self.phase != Phase::Rolled {
            return Err(self.wrong_phase("start a new round"));
        }
        self.round += 1;
        self.last_roll = None;
        self.open_betting();
        Ok(())
    }

    fn open_betting(&mut self) {
        self.bets.clear();
        self.side_bets.clear();
        self.generation += 1;
        self.round_ends_at = self.settings.use_timer.then(|| {
            now_millis() + self.settings.round_timer_secs * 1000
        });
        self.transition(Phase::Betting);
    }

    fn transition(&mut self, to: Phase) {
        debug_assert!(
            self.phase.can_transition_to(to),
            "illegal transition {} -> {}",
            self.phase,
            to
        );
        debug!(room = %self.code, from = %self.phase, %to, "phase changed");
        self.phase = to;
    }

    // -----------------------------------------------------------------------
    // Chat
    // -----------------------------------------------------------------------

    /// Appends a chat message, dropping the oldest past capacity.
    pub fn chat_message(&mut self, id: &PlayerId, text: &str) -> Result<ChatMessage, RoomError> {
        let player = self.require_player(id)?;
        let text = clip(text, self.config.max_message_len);
        if text.is_empty() {
            return Err(RoomError::validation("message is empty"));
        }

        let message = ChatMessage {
            player_id: player.id.clone(),
            player_name: player.name.clone(),
            color: player.color.clone(),
            text,
            at: now_millis(),
        };
        self.chat.push_back(message.clone());
        while self.chat.len() > self.config.chat_capacity {
            self.chat.pop_front();
        }
        Ok(message)
    }

    pub fn reaction(&self, id: &PlayerId, emoji: Option<&str>) -> Result<Reaction, RoomError> {
        let player = self.require_player(id)?;
        let emoji = emoji
            .map(|e| clip(e, self.config.max_emoji_len))
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_EMOJI.to_string());
        Ok(Reaction {
            player_id: player.id.clone(),
            player_name: player.name.clone(),
            emoji,
        })
    }

    // -----------------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> RoomSnapshot {
        let betting = self.phase == Phase::Betting;
        let bets = if betting {
            self.players
                .iter()
                .filter_map(|p| {
                    let bets = self.bets.get(&p.id).filter(|b| !b.is_empty())?;
                    Some(PendingBets {
                        player_id: p.id.clone(),
                        bets: bets.clone(),
                    })
                })
                .collect()
        } else {
            Vec::new()
        };
        let side_bets = if betting {
            self.players
                .iter()
                .filter_map(|p| {
                    let side_bets = self.side_bets.get(&p.id).filter(|b| !b.is_empty())?;
                    Some(PendingSideBets {
                        player_id: p.id.clone(),
                        side_bets: side_bets.clone(),
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        let skip = self.chat.len().saturating_sub(self.config.snapshot_chat);

        RoomSnapshot {
            code: self.code.clone(),
            host_id: self.host.clone(),
            host_name: self.host_name.clone(),
            phase: self.phase,
            round: self.round,
            last_roll: self.last_roll,
            round_ends_at: self.round_ends_at,
            settings: self.settings.clone(),
            winner: self.winner.clone(),
            players: self.player_views(),
            ready: self.ready_entries(),
            all_ready: self.all_ready(),
            bets,
            side_bets,
            chat: self.chat.iter().skip(skip).cloned().collect(),
            history: self
                .history
                .iter()
                .take(self.config.snapshot_history)
                .cloned()
                .collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    fn require_player(&self, id: &PlayerId) -> Result<&Player, RoomError> {
        self.player(id)
            .ok_or_else(|| RoomError::PlayerNotFound(id.clone()))
    }

    fn require_player_mut(&mut self, id: &PlayerId) -> Result<&mut Player, RoomError> {
        self.player_mut(id)
            .ok_or_else(|| RoomError::PlayerNotFound(id.clone()))
    }

    fn wrong_phase(&self, action: &'static str) -> RoomError {
        RoomError::InvalidPhase {
            action,
            phase: self.phase,
        }
    }

    fn fresh_player_id(&self) -> PlayerId {
        let mut rng = rand::rng();
        loop {
            let id = PlayerId::random(&mut rng);
            if self.player(&id).is_none() {
                return id;
            }
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use dicebet_dice::LoadedDice;
    use dicebet_protocol::SettingsInput;

    use super::*;
    use crate::WinCondition;

    fn room() -> Room {
        Room::new(
            RoomCode::new("ABC234"),
            "Host",
            Settings::default(),
            RoomConfig::default(),
        )
    }

    fn roll(d1: u8, d2: u8) -> Roll {
        Roll::new(d1, d2).unwrap()
    }

    /// A room in betting with players `a` (host) and `b`.
    fn betting_room() -> (Room, PlayerId, PlayerId) {
        let mut room = room();
        let a = room
            .join("Ann", Some(PlayerId::new("a")), None)
            .unwrap()
            .player_id()
            .clone();
        let b = room
            .join("Bob", Some(PlayerId::new("b")), None)
            .unwrap()
            .player_id()
            .clone();
        room.start(&a).unwrap();
        (room, a, b)
    }

    fn total_points(room: &Room) -> i64 {
        room.players().iter().map(|p| p.points).sum()
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    #[test]
    fn test_first_joiner_becomes_host() {
        let mut room = room();
        let first = room.join("Ann", None, None).unwrap();
        let second = room.join("Bob", None, None).unwrap();
        assert!(matches!(first, JoinOutcome::Joined(_)));
        assert_eq!(room.host(), Some(first.player_id()));
        assert_ne!(first.player_id(), second.player_id());
        assert_eq!(room.players()[0].points, 1000);
        assert!(!room.is_ready(second.player_id()));
    }

    #[test]
    fn test_rejoin_with_known_id_reattaches() {
        let mut room = room();
        let id = room
            .join("Ann", None, Some(SessionId(1)))
            .unwrap()
            .player_id()
            .clone();
        room.set_color(&id, Some("teal")).unwrap();

        let again = room.join("Impostor", Some(id.clone()), Some(SessionId(2))).unwrap();

        assert_eq!(again, JoinOutcome::Reattached(id.clone()));
        assert!(again.is_reconnect());
        assert_eq!(room.players().len(), 1);
        let player = room.player(&id).unwrap();
        assert_eq!(player.name, "Ann");
        assert_eq!(player.color.as_deref(), Some("teal"));
        assert_eq!(player.session, Some(SessionId(2)));
    }

    #[test]
    fn test_new_players_only_join_in_lobby() {
        let (mut room, a, _) = betting_room();
        let err = room.join("Late", None, None).unwrap_err();
        assert_eq!(err.code(), 409);
        // Existing members still get back in.
        assert!(room.join("", Some(a), None).unwrap().is_reconnect());
    }

    #[test]
    fn test_detach_only_for_matching_session() {
        let mut room = room();
        let id = room
            .join("Ann", None, Some(SessionId(1)))
            .unwrap()
            .player_id()
            .clone();
        room.attach(&id, SessionId(2)).unwrap();

        assert!(!room.detach(&id, SessionId(1)), "stale session must not detach");
        assert!(room.player(&id).unwrap().is_connected());
        assert!(room.detach(&id, SessionId(2)));
        assert!(!room.player(&id).unwrap().is_connected());
        assert_eq!(room.players().len(), 1);
    }

    #[test]
    fn test_host_leaving_promotes_next_in_join_order() {
        let mut room = room();
        let a = room.join("A", None, None).unwrap().player_id().clone();
        let b = room.join("B", None, None).unwrap().player_id().clone();
        let c = room.join("C", None, None).unwrap().player_id().clone();

        let departure = room.leave(&a).unwrap();
        assert_eq!(departure.new_host, Some(b.clone()));
        assert!(!departure.room_empty);
        assert_eq!(room.host(), Some(&b));

        let departure = room.leave(&c).unwrap();
        assert_eq!(departure.new_host, None);

        let departure = room.leave(&b).unwrap();
        assert!(departure.room_empty);
        assert_eq!(room.host(), None);
    }

    #[test]
    fn test_kick_requires_host() {
        let (mut room, a, b) = betting_room();
        room.place_bet(&b, 7, 50).unwrap();

        let err = room.kick(&b, &a).unwrap_err();
        assert_eq!(err.code(), 403);

        let departure = room.kick(&a, &b).unwrap();
        assert_eq!(departure.player.id, b);
        assert!(room.number_bets(&b).is_empty());
        assert!(room.ready_entries().iter().all(|r| r.player_id != b));

        let err = room.kick(&a, &b).unwrap_err();
        assert_eq!(err, RoomError::PlayerNotFound(b));
    }

    // -----------------------------------------------------------------------
    // Lobby
    // -----------------------------------------------------------------------

    #[test]
    fn test_all_ready_needs_everyone() {
        let mut room = room();
        assert!(!room.all_ready(), "empty room is never all ready");
        let a = room.join("A", None, None).unwrap().player_id().clone();
        let b = room.join("B", None, None).unwrap().player_id().clone();
        room.set_ready(&a, true).unwrap();
        assert!(!room.all_ready());
        room.set_ready(&b, true).unwrap();
        assert!(room.all_ready());
        assert!(room.snapshot().all_ready);
    }

    #[test]
    fn test_set_ready_outside_lobby_rejected() {
        let (mut room, a, _) = betting_room();
        assert_eq!(room.set_ready(&a, true).unwrap_err().code(), 409);
        let stranger = PlayerId::new("nobody");
        let mut lobby = self::room();
        assert_eq!(lobby.set_ready(&stranger, true).unwrap_err().code(), 404);
    }

    #[test]
    fn test_set_color_trims_caps_and_clears() {
        let mut room = room();
        let id = room.join("A", None, None).unwrap().player_id().clone();
        room.set_color(&id, Some(&format!("  {}  ", "c".repeat(50)))).unwrap();
        assert_eq!(room.player(&id).unwrap().color.as_ref().unwrap().len(), 32);
        room.set_color(&id, Some("   ")).unwrap();
        assert_eq!(room.player(&id).unwrap().color, None);
    }

    #[test]
    fn test_start_is_host_only_and_opens_round_one() {
        let mut room = room();
        let a = room.join("A", None, None).unwrap().player_id().clone();
        let b = room.join("B", None, None).unwrap().player_id().clone();

        assert_eq!(room.start(&b).unwrap_err().code(), 403);
        assert_eq!(room.phase(), Phase::Lobby);

        let before = room.generation();
        room.start(&a).unwrap();
        assert_eq!(room.phase(), Phase::Betting);
        assert_eq!(room.round(), 1);
        assert_eq!(room.round_ends_at(), None, "timer disabled by default");
        assert!(room.generation() > before);

        assert_eq!(room.start(&a).unwrap_err().code(), 409);
    }

    #[test]
    fn test_timed_room_sets_deadline() {
        let settings = Settings::from_input(&SettingsInput {
            use_timer: Some(true),
            round_timer_secs: Some(15),
            ..SettingsInput::default()
        });
        let mut room = Room::new(RoomCode::new("TIMED2"), "H", settings, RoomConfig::default());
        let a = room.join("A", None, None).unwrap().player_id().clone();
        let before = now_millis();
        room.start(&a).unwrap();
        let ends = room.round_ends_at().unwrap();
        assert!(ends >= before + 15_000);
        assert!(ends <= now_millis() + 15_000);

        room.resolve(roll(1, 2)).unwrap();
        assert_eq!(room.round_ends_at(), None);
    }

    // -----------------------------------------------------------------------
    // Betting
    // -----------------------------------------------------------------------

    #[test]
    fn test_place_bet_debits_stake() {
        let (mut room, a, _) = betting_room();
        let bet = room.place_bet(&a, 7, 100).unwrap();
        assert_eq!(bet, NumberBet { number: 7, amount: 100 });
        assert_eq!(room.player(&a).unwrap().points, 900);
        assert_eq!(room.number_bets(&a), &[bet]);
    }

    #[test]
    fn test_place_bet_validation_order() {
        let (mut room, a, _) = betting_room();
        let cases = [
            (1, 100, 400),
            (13, 100, 400),
            (7, 0, 400),
            (7, -5, 400),
            (7, 5, 400),
            (7, 501, 400),
        ];
        for (number, amount, code) in cases {
            let err = room.place_bet(&a, number, amount).unwrap_err();
            assert_eq!(err.code(), code, "number {number} amount {amount}");
        }
        let ghost = PlayerId::new("ghost");
        assert_eq!(room.place_bet(&ghost, 7, 10).unwrap_err().code(), 404);
        assert_eq!(room.player(&a).unwrap().points, 1000);
    }

    #[test]
    fn test_fourth_number_bet_rejected() {
        let (mut room, a, _) = betting_room();
        for number in [5, 6, 7] {
            room.place_bet(&a, number, 10).unwrap();
        }
        let err = room.place_bet(&a, 8, 10).unwrap_err();
        assert!(matches!(err, RoomError::LimitExceeded(_)));
        assert_eq!(room.number_bets(&a).len(), 3);
        assert_eq!(room.player(&a).unwrap().points, 970);
    }

    #[test]
    fn test_duplicate_number_rejected() {
        let (mut room, a, _) = betting_room();
        room.place_bet(&a, 7, 10).unwrap();
        let err = room.place_bet(&a, 7, 20).unwrap_err();
        assert_eq!(err.code(), 429);
    }

    #[test]
    fn test_funds_check_counts_existing_stakes() {
        let settings = Settings {
            starting_points: 300,
            ..Settings::default()
        };
        let mut room = Room::new(RoomCode::new("FUNDS2"), "H", settings, RoomConfig::default());
        let a = room.join("A", None, None).unwrap().player_id().clone();
        room.start(&a).unwrap();

        room.place_bet(&a, 6, 100).unwrap();
        // Balance is now 200; 200 >= 100 + 100.
        room.place_bet(&a, 7, 100).unwrap();
        // Balance is now 100; 100 < 200 + 50.
        let err = room.place_bet(&a, 8, 50).unwrap_err();
        assert_eq!(
            err,
            RoomError::InsufficientFunds {
                needed: 250,
                available: 100
            }
        );
    }

    #[test]
    fn test_side_bet_rules() {
        let (mut room, a, _) = betting_room();
        let err = room.place_side_bet(&a, "hard_4", 10).unwrap_err();
        assert_eq!(err.code(), 400);

        let bet = room.place_side_bet(&a, "hard_8", 20).unwrap();
        assert_eq!(bet.kind, SideBetKind::Hard8);
        assert_eq!(room.player(&a).unwrap().points, 980);

        let err = room.place_side_bet(&a, "hard_8", 20).unwrap_err();
        assert!(matches!(err, RoomError::LimitExceeded(_)));
        room.place_side_bet(&a, "doubles", 20).unwrap();
        assert_eq!(room.side_bets(&a).len(), 2);
    }

    #[test]
    fn test_bets_rejected_outside_betting() {
        let mut lobby = room();
        let a = lobby.join("A", None, None).unwrap().player_id().clone();
        assert_eq!(lobby.place_bet(&a, 7, 10).unwrap_err().code(), 409);
        assert_eq!(lobby.place_side_bet(&a, "doubles", 10).unwrap_err().code(), 409);
        assert_eq!(lobby.player(&a).unwrap().points, 1000);
    }

    // -----------------------------------------------------------------------
    // Rounds
    // -----------------------------------------------------------------------

    #[test]
    fn test_roll_settles_and_records_history() {
        let (mut room, a, b) = betting_room();
        room.place_bet(&a, 7, 100).unwrap();
        room.place_bet(&b, 8, 50).unwrap();
        room.place_side_bet(&b, "over7", 25).unwrap();

        let mut dice = LoadedDice::new([roll(3, 4)]);
        let outcome = room.roll(&mut dice).unwrap();

        assert_eq!(outcome.round, 1);
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.summary, "Round 1: 3+4=7. Ann +600, Bob -50, Bob -25");
        assert!(outcome.winner.is_none());
        assert_eq!(room.phase(), Phase::Rolled);
        assert_eq!(room.last_roll(), Some(roll(3, 4)));
        assert_eq!(room.player(&a).unwrap().points, 1500);
        assert_eq!(room.player(&b).unwrap().points, 925);
        assert!(room.number_bets(&a).is_empty());
        assert!(room.side_bets(&b).is_empty());

        let history: Vec<_> = room.history().collect();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].round, 1);
    }

    #[test]
    fn test_roll_outside_betting_leaves_dice_untouched() {
        let mut room = room();
        let mut dice = LoadedDice::new([roll(1, 1), roll(6, 6)]);
        assert_eq!(room.roll(&mut dice).unwrap_err().code(), 409);
        // The script was not advanced by the rejected roll.
        assert_eq!(dice.roll(), roll(1, 1));
    }

    #[test]
    fn test_next_round_clears_roll_and_advances() {
        let (mut room, _, _) = betting_room();
        assert_eq!(room.next_round().unwrap_err().code(), 409);
        room.resolve(roll(2, 2)).unwrap();
        room.next_round().unwrap();
        assert_eq!(room.phase(), Phase::Betting);
        assert_eq!(room.round(), 2);
        assert_eq!(room.last_roll(), None);
    }

    #[test]
    fn test_game_over_is_terminal() {
        let settings = Settings {
            target_points: 1200,
            ..Settings::default()
        };
        let mut room = Room::new(RoomCode::new("FINAL2"), "H", settings, RoomConfig::default());
        let a = room.join("A", None, None).unwrap().player_id().clone();
        room.start(&a).unwrap();
        room.place_bet(&a, 7, 100).unwrap();

        let outcome = room.resolve(roll(3, 4)).unwrap();
        assert_eq!(outcome.winner.as_ref().map(|w| &w.id), Some(&a));
        assert_eq!(room.phase(), Phase::GameOver);
        assert_eq!(room.winner(), Some(&a));

        let err = room.next_round().unwrap_err();
        assert_eq!(
            err,
            RoomError::InvalidPhase {
                action: "start a new round",
                phase: Phase::GameOver
            }
        );
        assert_eq!(room.place_bet(&a, 7, 10).unwrap_err().code(), 409);
    }

    #[test]
    fn test_elimination_single_player_ends_after_first_roll() {
        let settings = Settings {
            win_condition: WinCondition::Elimination,
            ..Settings::default()
        };
        let mut room = Room::new(RoomCode::new("SOLO23"), "H", settings, RoomConfig::default());
        let a = room.join("A", None, None).unwrap().player_id().clone();
        room.start(&a).unwrap();
        let outcome = room.resolve(roll(1, 2)).unwrap();
        assert!(outcome.winner.is_some());
        assert_eq!(room.phase(), Phase::GameOver);
    }

    #[test]
    fn test_history_is_capped_newest_first() {
        let config = RoomConfig {
            history_capacity: 3,
            snapshot_history: 2,
            ..RoomConfig::default()
        };
        let mut room = Room::new(RoomCode::new("HIST23"), "H", Settings::default(), config);
        let a = room.join("A", None, None).unwrap().player_id().clone();
        room.start(&a).unwrap();
        for _ in 0..5 {
            room.resolve(roll(1, 2)).unwrap();
            room.next_round().unwrap();
        }
        let rounds: Vec<u32> = room.history().map(|h| h.round).collect();
        assert_eq!(rounds, vec![5, 4, 3]);
        let snapshot: Vec<u32> = room.snapshot().history.iter().map(|h| h.round).collect();
        assert_eq!(snapshot, vec![5, 4]);
    }

    #[test]
    fn test_generation_changes_on_open_and_close() {
        let (mut room, _, _) = betting_room();
        let opened = room.generation();
        room.resolve(roll(1, 2)).unwrap();
        let closed = room.generation();
        assert_ne!(opened, closed);
        room.next_round().unwrap();
        assert_ne!(room.generation(), closed);
    }

    // -----------------------------------------------------------------------
    // Chat and snapshot
    // -----------------------------------------------------------------------

    #[test]
    fn test_chat_trims_caps_and_rejects_empty() {
        let mut room = room();
        let a = room.join("A", None, None).unwrap().player_id().clone();
        assert_eq!(room.chat_message(&a, "   ").unwrap_err().code(), 400);
        let long = "y".repeat(400);
        let message = room.chat_message(&a, &format!("  {long}")).unwrap();
        assert_eq!(message.text.len(), 300);
        assert_eq!(message.player_name, "A");
        let ghost = PlayerId::new("ghost");
        assert_eq!(room.chat_message(&ghost, "hi").unwrap_err().code(), 404);
    }

    #[test]
    fn test_reaction_defaults_and_caps() {
        let mut room = room();
        let a = room.join("A", None, None).unwrap().player_id().clone();
        assert_eq!(room.reaction(&a, None).unwrap().emoji, "👍");
        assert_eq!(room.reaction(&a, Some("")).unwrap().emoji, "👍");
        assert_eq!(room.reaction(&a, Some("🎲🎲🎲🎲🎲")).unwrap().emoji, "🎲🎲🎲🎲");
    }

    #[test]
    fn test_snapshot_shows_bets_only_while_betting() {
        let (mut room, a, b) = betting_room();
        room.place_bet(&a, 7, 10).unwrap();
        room.place_side_bet(&b, "doubles", 10).unwrap();

        let snapshot = room.snapshot();
        assert_eq!(snapshot.phase, Phase::Betting);
        assert_eq!(snapshot.bets.len(), 1);
        assert_eq!(snapshot.bets[0].player_id, a);
        assert_eq!(snapshot.side_bets.len(), 1);
        assert_eq!(snapshot.side_bets[0].player_id, b);
        assert_eq!(snapshot.host_id.as_ref(), Some(&a));
        assert_eq!(snapshot.host_name, "Host");

        room.resolve(roll(5, 6)).unwrap();
        let snapshot = room.snapshot();
        assert!(snapshot.bets.is_empty());
        assert!(snapshot.side_bets.is_empty());
        assert_eq!(snapshot.last_roll, Some(roll(5, 6)));
    }

    #[test]
    fn test_snapshot_keeps_latest_chat() {
        let config = RoomConfig {
            snapshot_chat: 2,
            ..RoomConfig::default()
        };
        let mut room = Room::new(RoomCode::new("CHAT23"), "H", Settings::default(), config);
        let a = room.join("A", None, None).unwrap().player_id().clone();
        for text in ["one", "two", "three"] {
            room.chat_message(&a, text).unwrap();
        }
        let texts: Vec<String> = room.snapshot().chat.into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["two", "three"]);
    }

    #[test]
    fn test_conservation_within_room() {
        let (mut room, a, b) = betting_room();
        let before = total_points(&room);
        room.place_bet(&a, 4, 30).unwrap();
        room.place_bet(&a, 9, 40).unwrap();
        room.place_side_bet(&b, "any_craps", 20).unwrap();
        let staked = 90;
        let outcome = room.resolve(roll(1, 2)).unwrap();
        let paid: i64 = outcome.results.iter().map(|r| r.payout).sum();
        assert_eq!(paid, 180);
        assert_eq!(total_points(&room), before - staked + paid);
    }
}
