//! Bracket graph.
//!
//! A room's contests form a single-elimination tree. Leaves (phase 1) pair
//! consecutive lobby players and get their match right away; every later
//! bracket starts empty and lists the two feeder brackets in
//! `dependency_ids`. Winners flow upward through [`propagate_winner`], which
//! creates the next match once both slots are known.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::{ContestPlayer, Game, Side};
use crate::room::LobbyPlayer;
use crate::{PlayerId, UNDETERMINED};

/// One node of the bracket tree. Its match, when present, carries the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bracket {
    pub id: String,
    pub l_player: PlayerId,
    pub r_player: PlayerId,
    pub winner: Option<Side>,
    #[serde(rename = "match")]
    pub game: Option<Game>,
    pub dependency_ids: Vec<String>,
    /// 1-based round index.
    pub phase: u32,
    pub ready: bool,
}

impl Bracket {
    fn empty(phase: u32, dependency_ids: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            l_player: UNDETERMINED,
            r_player: UNDETERMINED,
            winner: None,
            game: None,
            dependency_ids,
            phase,
            ready: false,
        }
    }

    pub fn is_determined(&self) -> bool {
        self.l_player != UNDETERMINED && self.r_player != UNDETERMINED
    }

    pub fn is_completed(&self) -> bool {
        self.game.as_ref().is_some_and(Game::is_completed)
    }

    pub fn has_player(&self, player_id: PlayerId) -> bool {
        player_id != UNDETERMINED && (self.l_player == player_id || self.r_player == player_id)
    }

    pub fn winner_id(&self) -> Option<PlayerId> {
        self.winner.map(|side| match side {
            Side::Left => self.l_player,
            Side::Right => self.r_player,
        })
    }

    pub fn loser_id(&self) -> Option<PlayerId> {
        self.winner.map(|side| match side {
            Side::Left => self.r_player,
            Side::Right => self.l_player,
        })
    }

    /// Copy the finished match's winner onto the bracket.
    ///
    /// Returns the winner id the first time it is recorded, `None` if the
    /// match is still running or the result was already taken.
    pub fn record_result(&mut self) -> Option<PlayerId> {
        if self.winner.is_some() {
            return None;
        }
        let game = self.game.as_ref().filter(|g| g.is_completed())?;
        self.winner = game.winner;
        self.winner_id()
    }

    /// Create the match once both players are known. Returns `true` if a
    /// match was created.
    fn spawn_game(&mut self, room_id: &str, players: &[LobbyPlayer], now: i64) -> bool {
        if self.game.is_some() || !self.is_determined() {
            return false;
        }
        self.ready = true;
        self.game = Some(Game::new(
            self.id.clone(),
            room_id.to_string(),
            ContestPlayer::new(self.l_player, display_name(players, self.l_player)),
            ContestPlayer::new(self.r_player, display_name(players, self.r_player)),
            now,
        ));
        true
    }
}

fn display_name(players: &[LobbyPlayer], id: PlayerId) -> String {
    players
        .iter()
        .find(|p| p.id == id)
        .map(|p| p.display_name.clone())
        .unwrap_or_else(|| format!("Player {id}"))
}

/// Build the full bracket tree for `players` (a power of two, at least 2).
///
/// Two players yield a single phase-1 bracket; more yield leaves plus empty
/// later phases, halving each round.
pub fn build_brackets(room_id: &str, players: &[LobbyPlayer], now: i64) -> Vec<Bracket> {
    let mut brackets = Vec::with_capacity(players.len().saturating_sub(1));

    let mut previous: Vec<String> = Vec::new();
    for pair in players.chunks_exact(2) {
        let mut leaf = Bracket::empty(1, Vec::new());
        leaf.l_player = pair[0].id;
        leaf.r_player = pair[1].id;
        leaf.spawn_game(room_id, players, now);
        previous.push(leaf.id.clone());
        brackets.push(leaf);
    }

    let mut phase = 1;
    while previous.len() > 1 {
        phase += 1;
        let mut current = Vec::with_capacity(previous.len() / 2);
        for feeders in previous.chunks_exact(2) {
            let bracket = Bracket::empty(phase, feeders.to_vec());
            current.push(bracket.id.clone());
            brackets.push(bracket);
        }
        previous = current;
    }

    brackets
}

/// Advance the winner of `finished_id` into every bracket of the next phase
/// that depends on it.
///
/// Fills `l_player` before `r_player`. Returns the ids of brackets whose
/// match was created by this call.
pub fn propagate_winner(
    brackets: &mut [Bracket],
    finished_id: &str,
    room_id: &str,
    players: &[LobbyPlayer],
    now: i64,
) -> Vec<String> {
    let Some((phase, winner)) = brackets
        .iter()
        .find(|b| b.id == finished_id)
        .and_then(|b| Some((b.phase, b.winner_id()?)))
    else {
        return Vec::new();
    };

    let mut spawned = Vec::new();
    for bracket in brackets.iter_mut() {
        if bracket.phase != phase + 1 || !bracket.dependency_ids.iter().any(|d| d == finished_id) {
            continue;
        }
        if bracket.has_player(winner) {
            continue;
        }

        if bracket.l_player == UNDETERMINED {
            bracket.l_player = winner;
        } else if bracket.r_player == UNDETERMINED {
            bracket.r_player = winner;
        } else {
            continue;
        }

        if bracket.spawn_game(room_id, players, now) {
            tracing::debug!(room_id, bracket_id = %bracket.id, phase = bracket.phase, "bracket ready");
            spawned.push(bracket.id.clone());
        }
    }
    spawned
}

/// Every bracket's match has completed.
pub fn all_completed(brackets: &[Bracket]) -> bool {
    !brackets.is_empty() && brackets.iter().all(Bracket::is_completed)
}

/// The bracket of the last phase.
pub fn final_bracket(brackets: &[Bracket]) -> Option<&Bracket> {
    brackets.iter().max_by_key(|b| b.phase)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players(ids: &[PlayerId]) -> Vec<LobbyPlayer> {
        ids.iter()
            .map(|&id| LobbyPlayer::new(id, format!("P{id}")))
            .collect()
    }

    fn finish(brackets: &mut [Bracket], id: &str, winner: Side) {
        let bracket = brackets.iter_mut().find(|b| b.id == id).unwrap();
        bracket.game.as_mut().unwrap().complete(winner, 100);
        bracket.record_result();
    }

    #[test]
    fn test_one_vs_one_single_bracket() {
        let brackets = build_brackets("r", &players(&[1, 2]), 0);
        assert_eq!(brackets.len(), 1);

        let b = &brackets[0];
        assert_eq!((b.l_player, b.r_player, b.phase), (1, 2, 1));
        assert!(b.ready);
        assert!(b.dependency_ids.is_empty());

        let game = b.game.as_ref().unwrap();
        assert_eq!(game.id, b.id);
        assert_eq!(game.left.display_name, "P1");
    }

    #[test]
    fn test_tournament_shape() {
        let brackets = build_brackets("r", &players(&[1, 2, 3, 4, 5, 6, 7, 8]), 0);
        assert_eq!(brackets.len(), 7);

        let by_phase = |p| brackets.iter().filter(|b| b.phase == p).count();
        assert_eq!((by_phase(1), by_phase(2), by_phase(3)), (4, 2, 1));

        for b in &brackets {
            // A match exists exactly when both slots are filled
            assert_eq!(b.game.is_some(), b.is_determined());
            if b.phase > 1 {
                assert_eq!(b.dependency_ids.len(), 2);
                for dep in &b.dependency_ids {
                    let feeder = brackets.iter().find(|f| &f.id == dep).unwrap();
                    assert_eq!(feeder.phase, b.phase - 1);
                }
            }
        }
        assert_eq!(final_bracket(&brackets).unwrap().phase, 3);
    }

    #[test]
    fn test_propagation_fills_left_then_right() {
        let roster = players(&[10, 20, 30, 40]);
        let mut brackets = build_brackets("r", &roster, 0);
        let leaves: Vec<String> = brackets.iter().filter(|b| b.phase == 1).map(|b| b.id.clone()).collect();

        finish(&mut brackets, &leaves[0], Side::Left);
        assert!(propagate_winner(&mut brackets, &leaves[0], "r", &roster, 100).is_empty());

        finish(&mut brackets, &leaves[1], Side::Right);
        let spawned = propagate_winner(&mut brackets, &leaves[1], "r", &roster, 200);
        assert_eq!(spawned.len(), 1);

        let last = final_bracket(&brackets).unwrap();
        assert_eq!(last.id, spawned[0]);
        assert_eq!((last.l_player, last.r_player), (10, 40));
        assert!(last.ready);
        let game = last.game.as_ref().unwrap();
        assert_eq!(game.right.display_name, "P40");
        assert_eq!(game.last_update, 200);
    }

    #[test]
    fn test_propagation_order_independent() {
        let roster = players(&[1, 2, 3, 4]);
        let mut brackets = build_brackets("r", &roster, 0);
        let leaves: Vec<String> = brackets.iter().filter(|b| b.phase == 1).map(|b| b.id.clone()).collect();

        finish(&mut brackets, &leaves[1], Side::Left);
        propagate_winner(&mut brackets, &leaves[1], "r", &roster, 0);
        finish(&mut brackets, &leaves[0], Side::Right);
        propagate_winner(&mut brackets, &leaves[0], "r", &roster, 0);

        let last = final_bracket(&brackets).unwrap();
        assert_eq!((last.l_player, last.r_player), (3, 2));
        assert!(last.game.is_some());
        assert!(!all_completed(&brackets));
    }

    #[test]
    fn test_propagation_is_not_repeated() {
        let roster = players(&[1, 2, 3, 4]);
        let mut brackets = build_brackets("r", &roster, 0);
        let leaf = brackets[0].id.clone();

        finish(&mut brackets, &leaf, Side::Left);
        propagate_winner(&mut brackets, &leaf, "r", &roster, 0);
        propagate_winner(&mut brackets, &leaf, "r", &roster, 0);

        let last = final_bracket(&brackets).unwrap();
        assert_eq!((last.l_player, last.r_player), (1, UNDETERMINED));
        assert!(last.game.is_none());
    }

    #[test]
    fn test_record_result_once() {
        let mut brackets = build_brackets("r", &players(&[1, 2]), 0);
        assert_eq!(brackets[0].record_result(), None);

        brackets[0].game.as_mut().unwrap().complete(Side::Right, 5);
        assert_eq!(brackets[0].record_result(), Some(2));
        assert_eq!(brackets[0].record_result(), None);
        assert_eq!(brackets[0].loser_id(), Some(1));
        assert!(all_completed(&brackets));
    }

    #[test]
    fn test_unknown_name_falls_back() {
        assert_eq!(display_name(&[], 9), "Player 9");
    }

    #[test]
    fn test_serialized_shape() {
        let brackets = build_brackets("r", &players(&[1, 2]), 0);
        let json = serde_json::to_value(&brackets[0]).unwrap();
        assert_eq!(json["lPlayer"], 1);
        assert_eq!(json["rPlayer"], 2);
        assert!(json["match"].is_object());
        assert!(json["dependencyIds"].as_array().unwrap().is_empty());
    }
}
