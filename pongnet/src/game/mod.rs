//! Match sessions.
//!
//! A [`Game`] is the authoritative state of one contest between two players:
//! paddles, ball, score and timers. The state machine is
//!
//! ```text
//! waiting -> active <-> stopped -> completed
//! ```
//!
//! `active` is entered when both players are ready, `stopped` when either
//! disconnects mid-play, and `completed` on a winning score or a forfeit.

pub mod constants;
pub mod physics;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::PlayerId;
use constants::{CANVAS_HEIGHT, CANVAS_WIDTH, PADDLE_REST_Y};

/// Match operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("Game {0} does not exist")]
    NotFound(String),

    #[error("Room {0} does not exist")]
    RoomNotFound(String),

    #[error("Player {0} is not part of this game")]
    NotParticipant(PlayerId),

    #[error("Game is not waiting for players")]
    NotWaiting,

    #[error("Player {0} is not connected to the game")]
    NotConnected(PlayerId),

    #[error("Game is already completed")]
    Completed,
}

pub type Result<T> = std::result::Result<T, GameError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    Waiting,
    Active,
    Stopped,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaddleInput {
    pub up: bool,
    pub down: bool,
}

/// One side of a contest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestPlayer {
    pub id: PlayerId,
    pub display_name: String,
    pub ready: bool,
    pub connected: bool,
    pub paddle_y: f64,
    pub input: PaddleInput,
    pub score: u32,
    /// When the current absence began. Only read while disconnected during
    /// play; reset to 0 on reconnect.
    pub disconnected_at: i64,
    /// Total ms of previous absences.
    pub disconnected_time: i64,
}

impl ContestPlayer {
    pub fn new(id: PlayerId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            ready: false,
            connected: false,
            paddle_y: PADDLE_REST_Y,
            input: PaddleInput::default(),
            score: 0,
            disconnected_at: 0,
            disconnected_time: 0,
        }
    }

    /// Total absence as of `now`, including the ongoing one. The caller
    /// guarantees the session is in play.
    fn absence(&self, now: i64) -> i64 {
        let current = if self.connected {
            0
        } else {
            (now - self.disconnected_at).max(0)
        };
        current + self.disconnected_time
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f64,
    pub vy: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub position: Position,
    pub velocity: Velocity,
}

impl Ball {
    pub fn centered() -> Self {
        Self {
            position: Position {
                x: CANVAS_WIDTH / 2.0,
                y: CANVAS_HEIGHT / 2.0,
            },
            velocity: Velocity::default(),
        }
    }

    pub fn speed(&self) -> f64 {
        self.velocity.vx.hypot(self.velocity.vy)
    }

    pub fn at_rest(&self) -> bool {
        self.velocity.vx == 0.0 && self.velocity.vy == 0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameTimer {
    /// Countdown deadline; 0 while frozen.
    pub start_at: i64,
    /// Milliseconds of simulated play.
    pub elapsed: i64,
    pub started_at: i64,
    pub ended_at: i64,
}

/// Match session. Its id equals the id of the bracket that owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: String,
    pub room_id: String,
    pub state: GameState,
    pub left: ContestPlayer,
    pub right: ContestPlayer,
    pub ball: Ball,
    pub timer: GameTimer,
    pub winner: Option<Side>,
    pub last_update: i64,
    #[serde(skip)]
    last_step: i64,
}

impl Game {
    pub fn new(id: String, room_id: String, left: ContestPlayer, right: ContestPlayer, now: i64) -> Self {
        Self {
            id,
            room_id,
            state: GameState::Waiting,
            left,
            right,
            ball: Ball::centered(),
            timer: GameTimer::default(),
            winner: None,
            last_update: now,
            last_step: 0,
        }
    }

    pub fn player(&self, side: Side) -> &ContestPlayer {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn player_mut(&mut self, side: Side) -> &mut ContestPlayer {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    pub fn side_of(&self, player_id: PlayerId) -> Option<Side> {
        if self.left.id == player_id {
            Some(Side::Left)
        } else if self.right.id == player_id {
            Some(Side::Right)
        } else {
            None
        }
    }

    pub fn has_player(&self, player_id: PlayerId) -> bool {
        self.side_of(player_id).is_some()
    }

    pub fn participant_ids(&self) -> [PlayerId; 2] {
        [self.left.id, self.right.id]
    }

    pub fn is_completed(&self) -> bool {
        self.state == GameState::Completed
    }

    pub fn winner_id(&self) -> Option<PlayerId> {
        self.winner.map(|side| self.player(side).id)
    }

    pub fn loser_id(&self) -> Option<PlayerId> {
        self.winner.map(|side| self.player(side.opponent()).id)
    }

    fn side_or_err(&self, player_id: PlayerId) -> Result<Side> {
        self.side_of(player_id)
            .ok_or(GameError::NotParticipant(player_id))
    }

    /// Attach a participant (first join or reconnect).
    ///
    /// Closes the current absence window and, from `stopped`, resumes play
    /// behind a fresh countdown once both players are back.
    pub fn connect(&mut self, player_id: PlayerId, now: i64, countdown_ms: i64) -> Result<()> {
        let side = self.side_or_err(player_id)?;
        if self.is_completed() {
            return Ok(());
        }

        let in_play = matches!(self.state, GameState::Active | GameState::Stopped);
        let player = self.player_mut(side);
        if player.connected {
            return Ok(());
        }
        player.connected = true;
        if in_play {
            player.disconnected_time += (now - player.disconnected_at).max(0);
        }
        player.disconnected_at = 0;
        self.last_update = now;

        if self.state == GameState::Stopped && self.left.connected && self.right.connected {
            self.state = GameState::Active;
            self.timer.start_at = now + countdown_ms;
            self.last_step = 0;
            tracing::info!(game_id = %self.id, "game resumed");
        }
        Ok(())
    }

    /// Detach a participant. Returns `true` if anything changed.
    pub fn disconnect(&mut self, player_id: PlayerId, now: i64) -> Result<bool> {
        let side = self.side_or_err(player_id)?;
        if self.is_completed() || !self.player(side).connected {
            return Ok(false);
        }

        let state = self.state;
        let player = self.player_mut(side);
        player.connected = false;
        player.input = PaddleInput::default();

        match state {
            GameState::Waiting => {
                player.ready = false;
            }
            GameState::Active => {
                player.disconnected_at = now;
                self.state = GameState::Stopped;
                self.timer.start_at = 0;
                self.last_step = 0;
                tracing::info!(game_id = %self.id, player_id, "game stopped");
            }
            GameState::Stopped => {
                player.disconnected_at = now;
            }
            GameState::Completed => {}
        }
        self.last_update = now;
        Ok(true)
    }

    /// Set a player's ready flag. Returns `false` when the value is unchanged.
    pub fn set_ready(
        &mut self,
        player_id: PlayerId,
        ready: bool,
        now: i64,
        countdown_ms: i64,
    ) -> Result<bool> {
        let side = self.side_or_err(player_id)?;
        match self.state {
            GameState::Waiting => {}
            GameState::Completed => return Err(GameError::Completed),
            _ => return Err(GameError::NotWaiting),
        }

        let player = self.player_mut(side);
        if !player.connected {
            return Err(GameError::NotConnected(player_id));
        }
        if player.ready == ready {
            return Ok(false);
        }
        player.ready = ready;
        self.last_update = now;

        if self.left.ready && self.right.ready {
            self.activate(now, countdown_ms);
        }
        Ok(true)
    }

    fn activate(&mut self, now: i64, countdown_ms: i64) {
        self.state = GameState::Active;
        self.ball = Ball::centered();
        self.left.paddle_y = PADDLE_REST_Y;
        self.right.paddle_y = PADDLE_REST_Y;
        self.timer.start_at = now + countdown_ms;
        self.timer.started_at = now;
        self.last_step = 0;
        tracing::info!(game_id = %self.id, room_id = %self.room_id, "game started");
    }

    /// Queue paddle input for the next tick. Ignored unless active.
    pub fn set_input(&mut self, player_id: PlayerId, up: bool, down: bool) -> Result<()> {
        let side = self.side_or_err(player_id)?;
        if self.state != GameState::Active {
            return Ok(());
        }
        let player = self.player_mut(side);
        if player.connected {
            player.input = PaddleInput { up, down };
        }
        Ok(())
    }

    /// Whether physics should run at `now`.
    pub fn is_running(&self, now: i64) -> bool {
        self.state == GameState::Active && self.timer.start_at <= now
    }

    /// Advance the session one tick. Returns `true` if it completed on this
    /// call.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        now: i64,
        max_score: u32,
        max_disconnect_ms: i64,
        rng: &mut R,
    ) -> bool {
        match self.state {
            GameState::Active if self.is_running(now) => {
                self.step(now, max_score, rng)
            }
            GameState::Stopped => match self.check_forfeit(now, max_disconnect_ms) {
                Some(loser) => {
                    tracing::info!(
                        game_id = %self.id,
                        player_id = self.player(loser).id,
                        "player forfeited after disconnect"
                    );
                    self.complete(loser.opponent(), now);
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    fn step<R: Rng + ?Sized>(&mut self, now: i64, max_score: u32, rng: &mut R) -> bool {
        if self.last_step > 0 {
            self.timer.elapsed += (now - self.last_step).max(0);
        }
        self.last_step = now;
        self.last_update = now;

        if self.ball.at_rest() {
            let toward = if rng.gen_bool(0.5) { Side::Left } else { Side::Right };
            physics::serve(&mut self.ball, toward, rng);
        }

        self.left.paddle_y = physics::move_paddle(self.left.paddle_y, self.left.input);
        self.right.paddle_y = physics::move_paddle(self.right.paddle_y, self.right.input);

        let Some(scorer) = physics::step_ball(&mut self.ball, self.left.paddle_y, self.right.paddle_y)
        else {
            return false;
        };

        let score = {
            let player = self.player_mut(scorer);
            player.score = (player.score + 1).min(max_score);
            player.score
        };
        if score >= max_score {
            self.complete(scorer, now);
            return true;
        }

        self.reset_rally(scorer.opponent(), rng);
        false
    }

    fn reset_rally<R: Rng + ?Sized>(&mut self, toward: Side, rng: &mut R) {
        physics::center_ball(&mut self.ball);
        physics::serve(&mut self.ball, toward, rng);
        for side in [Side::Left, Side::Right] {
            let player = self.player_mut(side);
            player.paddle_y = PADDLE_REST_Y;
            player.input = PaddleInput::default();
        }
    }

    /// Side that must forfeit at `now`, if any.
    ///
    /// When both absences are over the limit the longer one forfeits, left on
    /// a tie.
    pub fn check_forfeit(&self, now: i64, max_disconnect_ms: i64) -> Option<Side> {
        if self.state != GameState::Stopped {
            return None;
        }
        let over = |p: &ContestPlayer| {
            let absence = p.absence(now);
            (!p.connected && absence >= max_disconnect_ms).then_some(absence)
        };

        match (over(&self.left), over(&self.right)) {
            (Some(l), Some(r)) => Some(if r > l { Side::Right } else { Side::Left }),
            (Some(_), None) => Some(Side::Left),
            (None, Some(_)) => Some(Side::Right),
            (None, None) => None,
        }
    }

    /// Freeze the session with `winner`.
    pub fn complete(&mut self, winner: Side, now: i64) {
        self.state = GameState::Completed;
        self.winner = Some(winner);
        self.timer.start_at = 0;
        self.timer.ended_at = now;
        if self.timer.started_at == 0 {
            self.timer.started_at = now;
        }
        self.ball.velocity = Velocity::default();
        self.left.input = PaddleInput::default();
        self.right.input = PaddleInput::default();
        self.last_update = now;
        tracing::info!(
            game_id = %self.id,
            room_id = %self.room_id,
            winner = self.player(winner).id,
            left = self.left.score,
            right = self.right.score,
            "game completed"
        );
    }
}
