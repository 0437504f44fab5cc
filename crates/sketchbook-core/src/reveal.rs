//! Reveal sequencer: staggered disclosure of results in the gallery.
//!
//! Each result starts hidden and becomes visible `ordinal * interval` after
//! it was first seen. Timing is local to this client. When the result
//! collection is replaced (new game), every slot goes back to hidden.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::session::Session;
use crate::store::SessionStore;
use crate::types::GameResult;

pub const REVEAL_INTERVAL: Duration = Duration::from_millis(2000);

pub fn reveal_delay(ordinal: usize, interval: Duration) -> Duration {
    interval.saturating_mul(u32::try_from(ordinal).unwrap_or(u32::MAX))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RevealState {
    Hidden,
    Visible,
}

#[derive(Debug, Clone)]
struct Slot {
    state: RevealState,
    deadline: Instant,
}

#[derive(Debug)]
pub struct RevealSequencer {
    interval: Duration,
    generation: Option<u64>,
    slots: Vec<Slot>,
}

impl Default for RevealSequencer {
    fn default() -> Self {
        Self::new(REVEAL_INTERVAL)
    }
}

impl RevealSequencer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            generation: None,
            slots: Vec::new(),
        }
    }

    /// Register any results not seen yet. Returns `true` if previously
    /// tracked slots were discarded because the collection was replaced.
    pub fn observe(&mut self, session: &Session, now: Instant) -> bool {
        let replaced = self.generation != Some(session.result_generation)
            || session.game_result.len() < self.slots.len();
        let mut reset = false;
        if replaced {
            reset = !self.slots.is_empty();
            self.slots.clear();
            self.generation = Some(session.result_generation);
        }
        for ordinal in self.slots.len()..session.game_result.len() {
            self.slots.push(Slot {
                state: RevealState::Hidden,
                deadline: now + reveal_delay(ordinal, self.interval),
            });
        }
        reset
    }

    /// Flip every due slot to visible; returns their ordinals, ascending.
    pub fn poll(&mut self, now: Instant) -> Vec<usize> {
        let mut revealed = Vec::new();
        for (ordinal, slot) in self.slots.iter_mut().enumerate() {
            if slot.state == RevealState::Hidden && slot.deadline <= now {
                slot.state = RevealState::Visible;
                revealed.push(ordinal);
            }
        }
        revealed
    }

    pub fn state(&self, ordinal: usize) -> Option<RevealState> {
        self.slots.get(ordinal).map(|s| s.state)
    }

    /// Earliest deadline among hidden slots.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots
            .iter()
            .filter(|s| s.state == RevealState::Hidden)
            .map(|s| s.deadline)
            .min()
    }

    pub fn visible_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.state == RevealState::Visible)
            .count()
    }

    /// Drive a sequencer from the store's snapshots, emitting reveal events.
    pub fn spawn(
        store: &SessionStore,
        interval: Duration,
        events: mpsc::UnboundedSender<RevealEvent>,
    ) -> JoinHandle<()> {
        let mut snapshots = store.subscribe();
        let latest = store.watch();
        let mut current = store.snapshot();
        tokio::spawn(async move {
            let mut sequencer = RevealSequencer::new(interval);
            sequencer.observe(&current, Instant::now());
            'run: loop {
                let deadline = sequencer.next_deadline();
                tokio::select! {
                    recv = snapshots.recv() => {
                        let session = match recv {
                            Ok(s) => s,
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                debug!(skipped, "Reveal sequencer lagged, using latest snapshot");
                                latest.borrow().clone()
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        };
                        if sequencer.observe(&session, Instant::now())
                            && events.send(RevealEvent::Reset).is_err()
                        {
                            break;
                        }
                        current = session;
                    }
                    _ = sleep_until(deadline) => {}
                }
                for ordinal in sequencer.poll(Instant::now()) {
                    let Some(result) = current.game_result.get(ordinal) else {
                        continue;
                    };
                    debug!(ordinal, player = %result.player_name, "Revealing result");
                    let event = RevealEvent::Revealed {
                        ordinal,
                        result: result.clone(),
                    };
                    if events.send(event).is_err() {
                        break 'run;
                    }
                }
            }
        })
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealEvent {
    Revealed { ordinal: usize, result: GameResult },
    /// The collection was replaced; everything is hidden again.
    Reset,
}

/// What the gallery shows before and around the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GalleryPrompt {
    /// No results yet; the host may start the reveal.
    ShowResultsButton,
    /// No results yet; waiting on the host.
    WaitingForHost,
    Gallery,
}

pub fn gallery_prompt(session: &Session) -> GalleryPrompt {
    if !session.game_result.is_empty() {
        GalleryPrompt::Gallery
    } else if session.is_host() {
        GalleryPrompt::ShowResultsButton
    } else {
        GalleryPrompt::WaitingForHost
    }
}

/// Controls offered under a revealed result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GalleryActions {
    pub download: bool,
    pub request_next: bool,
    pub new_game: bool,
}

/// Controls for the result at `ordinal`. Only the last result carries any.
pub fn gallery_actions(session: &Session, ordinal: usize) -> Option<GalleryActions> {
    if session.game_result.is_empty() || ordinal + 1 != session.game_result.len() {
        return None;
    }
    let left = session.is_image_left();
    Some(GalleryActions {
        download: true,
        request_next: left && session.is_host(),
        new_game: !left,
    })
}
