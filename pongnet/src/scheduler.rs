//! Fixed-interval match driver.
//!
//! One [`TickScheduler`] steps every active room: match physics, forfeits,
//! bracket propagation and room completion. It also runs the periodic room
//! sweeps and hands finished rooms to the store on spawned tasks.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::bracket;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::lobby::Lobby;
use crate::matches::push_game;
use crate::outcome::{self, PersistReport, RoomOutcome};
use crate::protocol::ServerMessage;
use crate::room::{Room, RoomRegistry, RoomStatus};
use crate::session::ConnectionRegistry;
use crate::storage::GameStore;

/// Tick scheduler
pub struct TickScheduler {
    lobby: Arc<Lobby>,
    rooms: Arc<RoomRegistry>,
    connections: Arc<ConnectionRegistry>,
    store: Arc<dyn GameStore>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    last_housekeeping: AtomicI64,
    /// Held for a whole outcome; stat updates are read-modify-write.
    persist_gate: Arc<tokio::sync::Mutex<()>>,
}

impl TickScheduler {
    pub fn new(
        lobby: Arc<Lobby>,
        connections: Arc<ConnectionRegistry>,
        store: Arc<dyn GameStore>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let now = clock.now_millis();
        Self {
            rooms: lobby.rooms().clone(),
            lobby,
            connections,
            store,
            clock,
            config,
            last_housekeeping: AtomicI64::new(now),
            persist_gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Step every active room once. Returns the outcomes of rooms that
    /// completed on this tick.
    pub fn tick(&self) -> Vec<RoomOutcome> {
        let now = self.clock.now_millis();
        let mut rng = rand::thread_rng();
        let mut outcomes = Vec::new();

        for handle in self.rooms.handles() {
            let mut room = handle.lock();
            if room.status != RoomStatus::Active {
                continue;
            }
            if let Some(outcome) = self.tick_room(&mut room, now, &mut rng) {
                outcomes.push(outcome);
            }
        }

        // Room locks are released; completed rooms leave every listing
        if !outcomes.is_empty() {
            self.lobby.broadcast_rooms();
        }
        outcomes
    }

    fn tick_room<R: Rng + ?Sized>(&self, room: &mut Room, now: i64, rng: &mut R) -> Option<RoomOutcome> {
        let mut finished = Vec::new();

        for bracket in room.brackets.iter_mut() {
            let Some(game) = bracket.game.as_mut() else {
                continue;
            };
            if !game.is_completed() {
                game.tick(now, self.config.max_score, self.config.max_disconnect_ms, rng);
                push_game(&self.connections, game);
            }
            if bracket.record_result().is_some() {
                finished.push(bracket.id.clone());
            }
        }

        if finished.is_empty() {
            return None;
        }

        let room_id = room.id.clone();
        let players = room.connected_players.clone();
        for bracket_id in &finished {
            let spawned = bracket::propagate_winner(&mut room.brackets, bracket_id, &room_id, &players, now);
            for game_id in spawned {
                if let Some(game) = room.game(&game_id) {
                    let msg = ServerMessage::GameRoomJoin {
                        room_id: room_id.clone(),
                        game_id: game_id.clone(),
                    };
                    self.connections.send_many(&game.participant_ids(), &msg);
                }
            }
        }
        room.touch(now);

        if !bracket::all_completed(&room.brackets) {
            self.push_snapshot(room);
            return None;
        }

        Some(self.complete_room(room, now))
    }

    fn complete_room(&self, room: &mut Room, now: i64) -> RoomOutcome {
        room.status = RoomStatus::Completed;
        room.completed_at = now;
        self.rooms.release_name(&room.name, &room.id);

        let mut members = room.player_ids();
        for bracket in &room.brackets {
            members.extend([bracket.l_player, bracket.r_player]);
        }
        for player_id in members {
            self.rooms.detach(player_id, &room.id);
        }
        self.push_snapshot(room);

        let outcome = RoomOutcome::from_room(room);
        tracing::info!(
            room_id = %room.id,
            champion = ?outcome.champion,
            brackets = room.brackets.len(),
            "room completed"
        );
        outcome
    }

    fn push_snapshot(&self, room: &Room) {
        let msg = ServerMessage::LobbyRoomDataUpdate(Box::new(room.clone()));
        self.connections.send_many(&room.player_ids(), &msg);
    }

    /// Whether the room sweeps are due at `now`; claims the slot if so.
    fn housekeeping_due(&self, now: i64) -> bool {
        let interval = self.config.housekeeping_interval_ms as i64;
        let last = self.last_housekeeping.load(Ordering::Relaxed);
        now - last >= interval
            && self
                .last_housekeeping
                .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
    }

    /// Expire idle waiting rooms and drop old completed ones.
    pub fn housekeeping(&self, now: i64) -> (usize, usize) {
        let expired = self
            .lobby
            .expire_idle_rooms(now, self.config.idle_room_ttl_ms());
        let dropped = self
            .lobby
            .drop_completed_rooms(now, self.config.completed_room_retention_ms());
        if expired + dropped > 0 {
            tracing::debug!(expired, dropped, rooms = self.rooms.count(), "housekeeping");
        }
        (expired, dropped)
    }

    /// Hand an outcome to the store on its own task. Outcomes are written
    /// one at a time so overlapping rooms never lose a stat increment.
    pub fn spawn_persist(&self, finished: RoomOutcome) -> JoinHandle<PersistReport> {
        let store = self.store.clone();
        let gate = self.persist_gate.clone();
        tokio::spawn(async move {
            let _guard = gate.lock().await;
            outcome::persist(store.as_ref(), &finished).await
        })
    }

    /// One scheduler iteration: tick, sweep when due, persist finished rooms.
    pub fn step(&self) -> Vec<JoinHandle<PersistReport>> {
        let outcomes = self.tick();

        let now = self.clock.now_millis();
        if self.housekeeping_due(now) {
            self.housekeeping(now);
        }

        outcomes
            .into_iter()
            .map(|outcome| self.spawn_persist(outcome))
            .collect()
    }

    /// Drive [`step`](Self::step) at the configured interval forever.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(tick_ms = self.config.tick_interval_ms, "tick scheduler started");

        loop {
            interval.tick().await;
            self.step();
        }
    }
}
