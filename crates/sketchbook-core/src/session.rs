//! Session model: the client's view of one game, and how server events move it.

use serde::Serialize;
use tracing::{debug, warn};

use crate::protocol::ServerEvent;
use crate::types::{GameResult, Player, PlayerId};

/// Round number of the guessing phase.
pub const GUESS_ROUND: u32 = 2;

/// Snapshot of one game session as seen by this client.
///
/// Snapshots are immutable once published; [`Session::apply`] returns a new
/// value rather than mutating in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    pub my_id: Option<PlayerId>,
    pub host_id: Option<PlayerId>,
    pub round: u32,
    /// Currently connected players.
    pub total: usize,
    /// Join order.
    pub players: Vec<Player>,
    pub now_loading: bool,
    pub end_game: bool,
    pub error: bool,
    /// Index into `players` of the next result to request.
    pub current_idx: usize,
    pub game_result: Vec<GameResult>,
    pub img_src: Option<String>,
    /// Bumped whenever `game_result` is replaced wholesale.
    pub result_generation: u64,
}

impl Session {
    /// Apply one server event, returning the next snapshot.
    pub fn apply(&self, event: &ServerEvent) -> Session {
        let mut next = self.clone();
        match event {
            ServerEvent::Connected { player_id } => {
                next.my_id = Some(*player_id);
            }
            ServerEvent::RosterUpdated { players, host_id } => {
                next.players = players.clone();
                next.total = players.len();
                let flagged = players.iter().find(|p| p.is_host).map(|p| p.player_id);
                if let Some(host) = (*host_id).or(flagged) {
                    next.host_id = Some(host);
                }
            }
            ServerEvent::RoundChanged { round } => {
                next.round = *round;
            }
            ServerEvent::Loading => {
                next.now_loading = true;
            }
            ServerEvent::ImageReady { img_src } => {
                next.img_src = Some(img_src.clone());
                next.now_loading = false;
            }
            ServerEvent::ResultReady(result) => {
                if next.push_result(result.clone()) {
                    next.current_idx = next.first_unrevealed();
                    next.now_loading = false;
                } else {
                    debug!(player = %result.player_name, "Duplicate result ignored");
                }
            }
            ServerEvent::EndGame => {
                next.end_game = true;
                next.now_loading = false;
            }
            ServerEvent::Error { message } => {
                warn!(%message, "Server reported an error");
                next.error = true;
            }
            ServerEvent::ConnectionLost => {
                warn!("Connection to game server lost");
                next.error = true;
            }
            ServerEvent::NameAck | ServerEvent::Ping | ServerEvent::Pong => {}
            ServerEvent::Unknown { event } => {
                warn!(event = %event, "Ignoring unknown server event");
            }
            ServerEvent::Malformed { event, reason } => {
                warn!(event = ?event, %reason, "Ignoring malformed server frame");
            }
        }
        next
    }

    /// Append unless a result for the same player is already present.
    fn push_result(&mut self, result: GameResult) -> bool {
        if self
            .game_result
            .iter()
            .any(|r| r.player_name == result.player_name)
        {
            return false;
        }
        self.game_result.push(result);
        true
    }

    /// Index of the first player with no result yet, or `players.len()`.
    /// Results may arrive out of order, so this is recomputed rather than
    /// stepped.
    fn first_unrevealed(&self) -> usize {
        self.players
            .iter()
            .position(|p| {
                !self
                    .game_result
                    .iter()
                    .any(|r| r.player_name == p.player_name)
            })
            .unwrap_or(self.players.len())
    }

    pub fn is_host(&self) -> bool {
        self.my_id.is_some() && self.my_id == self.host_id
    }

    /// Player whose result is next in line, if `current_idx` is in range.
    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.current_idx)
    }

    pub fn name_of_current_result(&self) -> Option<&str> {
        self.current_player().map(|p| p.player_name.as_str())
    }

    /// Whether another player's result is still pending.
    ///
    /// Compared against `total`, so a disconnect mid-reveal shrinks it.
    pub fn is_image_left(&self) -> bool {
        self.current_idx < self.total
    }

    pub fn results_remaining(&self) -> usize {
        self.total.saturating_sub(self.current_idx)
    }

    /// Clear per-round state ahead of a new game.
    pub fn reset_round(&self) -> Session {
        Session {
            round: 0,
            current_idx: 0,
            game_result: Vec::new(),
            img_src: None,
            end_game: false,
            result_generation: self.result_generation + 1,
            ..self.clone()
        }
    }
}
