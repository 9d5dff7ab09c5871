//! Persistence hand-off for finished rooms.
//!
//! A completed room is turned into a [`RoomOutcome`]: an owned, ordered list
//! of writes taken under the room lock. [`persist`] then replays it against a
//! [`GameStore`] on a spawned task. Each write is attempted on its own; a
//! failure is logged and the remaining writes still run.

use crate::bracket::Bracket;
use crate::room::{LobbyType, Room};
use crate::storage::{GameHistoryRecord, GameStore, UserStats};
use crate::PlayerId;

/// Counter bumped on a user's stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatChange {
    Win,
    Loss,
    TournamentWin,
    TournamentLoss,
}

impl StatChange {
    pub fn apply(self, stats: &mut UserStats) {
        match self {
            StatChange::Win => {
                stats.wins += 1;
                stats.total += 1;
            }
            StatChange::Loss => {
                stats.losses += 1;
                stats.total += 1;
            }
            StatChange::TournamentWin => stats.tournament_wins += 1,
            StatChange::TournamentLoss => stats.tournament_losses += 1,
        }
    }
}

/// One write against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    History(GameHistoryRecord),
    Stats { user_id: PlayerId, change: StatChange },
}

/// Everything to persist for one completed room, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomOutcome {
    pub room_id: String,
    pub lobby_type: LobbyType,
    pub champion: Option<PlayerId>,
    pub writes: Vec<Write>,
}

impl RoomOutcome {
    /// Collect the writes for `room`. Brackets without a finished match
    /// contribute nothing.
    pub fn from_room(room: &Room) -> Self {
        let final_id = crate::bracket::final_bracket(&room.brackets).map(|b| b.id.clone());
        let champion = room
            .brackets
            .iter()
            .find(|b| Some(&b.id) == final_id.as_ref())
            .and_then(Bracket::winner_id);

        let mut writes = Vec::new();
        for bracket in &room.brackets {
            let Some(record) = history_record(&room.id, bracket) else {
                continue;
            };
            let (winner, loser) = (record.winner_id, record.loser_id);
            writes.push(Write::History(record));
            writes.push(Write::Stats {
                user_id: winner,
                change: StatChange::Win,
            });
            writes.push(Write::Stats {
                user_id: loser,
                change: StatChange::Loss,
            });

            if room.lobby_type == LobbyType::Tournament && Some(&bracket.id) == final_id.as_ref() {
                for user_id in first_round_players(&room.brackets) {
                    let change = if Some(user_id) == champion {
                        StatChange::TournamentWin
                    } else {
                        StatChange::TournamentLoss
                    };
                    writes.push(Write::Stats { user_id, change });
                }
            }
        }

        Self {
            room_id: room.id.clone(),
            lobby_type: room.lobby_type,
            champion,
            writes,
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &GameHistoryRecord> {
        self.writes.iter().filter_map(|w| match w {
            Write::History(record) => Some(record),
            Write::Stats { .. } => None,
        })
    }
}

fn history_record(room_id: &str, bracket: &Bracket) -> Option<GameHistoryRecord> {
    let game = bracket.game.as_ref().filter(|g| g.is_completed())?;
    let side = game.winner?;
    let winner = game.player(side);
    let loser = game.player(side.opponent());

    Some(GameHistoryRecord {
        lobby_id: room_id.to_string(),
        winner_id: winner.id,
        loser_id: loser.id,
        score_winner: winner.score,
        score_loser: loser.score,
        start_time: game.timer.started_at,
        end_time: game.timer.ended_at,
        duration: (game.timer.ended_at - game.timer.started_at).max(0),
    })
}

/// Players seated in the first round, in bracket order.
fn first_round_players(brackets: &[Bracket]) -> Vec<PlayerId> {
    brackets
        .iter()
        .filter(|b| b.phase == 1)
        .flat_map(|b| [b.l_player, b.r_player])
        .collect()
}

/// Result of replaying an outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistReport {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Replay `outcome` against `store`.
pub async fn persist(store: &dyn GameStore, outcome: &RoomOutcome) -> PersistReport {
    let mut report = PersistReport::default();
    let room_id = outcome.room_id.as_str();

    for write in &outcome.writes {
        match write {
            Write::History(record) => match store.insert_game_history(record.clone()).await {
                Ok(()) => report.written += 1,
                Err(e) => {
                    tracing::error!(room_id, ?record, error = %e, "failed to insert game history");
                    report.failed += 1;
                }
            },
            Write::Stats { user_id, change } => {
                let user_id = *user_id;
                let mut stats = match store.get_user_stats(user_id).await {
                    Ok(Some(stats)) => stats,
                    Ok(None) => {
                        tracing::warn!(room_id, user_id, ?change, "stats skipped for unknown user");
                        report.skipped += 1;
                        continue;
                    }
                    Err(e) => {
                        tracing::error!(room_id, user_id, ?change, error = %e, "failed to read user stats");
                        report.failed += 1;
                        continue;
                    }
                };

                change.apply(&mut stats);
                match store.update_user_stats(user_id, stats).await {
                    Ok(()) => report.written += 1,
                    Err(e) => {
                        tracing::error!(room_id, user_id, ?change, error = %e, "failed to update user stats");
                        report.failed += 1;
                    }
                }
            }
        }
    }

    tracing::info!(
        room_id,
        written = report.written,
        skipped = report.skipped,
        failed = report.failed,
        "room outcome persisted"
    );
    report
}
