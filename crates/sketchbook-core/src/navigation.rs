//! Navigation driver: maps session snapshots to page changes.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::session::{GUESS_ROUND, Session};
use crate::store::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Route {
    Loading,
    Results,
    /// Landing page; the session is abandoned.
    Entry,
    InputGuess,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Loading => "loading",
            Route::Results => "results",
            Route::Entry => "/",
            Route::InputGuess => "input-guess",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Where the UI should be for `session`, if anywhere in particular.
///
/// Precedence is loading, then end of game, then error.
pub fn target_route(session: &Session) -> Option<Route> {
    if session.now_loading {
        Some(Route::Loading)
    } else if session.end_game {
        Some(Route::Results)
    } else if session.error {
        Some(Route::Entry)
    } else if session.round == GUESS_ROUND {
        Some(Route::InputGuess)
    } else {
        None
    }
}

/// Edge-triggered wrapper around [`target_route`].
#[derive(Debug, Default)]
pub struct NavigationDriver {
    last: Option<Route>,
}

impl NavigationDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a route only when the target differs from the one last
    /// yielded. A state with no target re-arms the trigger.
    pub fn evaluate(&mut self, session: &Session) -> Option<Route> {
        let target = target_route(session);
        if target == self.last {
            return None;
        }
        self.last = target;
        target
    }

    pub fn last(&self) -> Option<Route> {
        self.last
    }

    /// Run the driver over the store's snapshot stream, forwarding each
    /// navigation to `routes`. Stops when the store is dropped or the
    /// receiver goes away.
    pub fn spawn(store: &SessionStore, routes: mpsc::UnboundedSender<Route>) -> JoinHandle<()> {
        let mut snapshots = store.subscribe();
        let latest = store.watch();
        tokio::spawn(async move {
            let mut driver = NavigationDriver::new();
            loop {
                let session: Arc<Session> = match snapshots.recv().await {
                    Ok(s) => s,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Navigation driver lagged, using latest snapshot");
                        latest.borrow().clone()
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if let Some(route) = driver.evaluate(&session) {
                    info!(route = %route, "Navigating");
                    if routes.send(route).is_err() {
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(loading: bool, end: bool, error: bool, round: u32) -> Session {
        Session {
            now_loading: loading,
            end_game: end,
            error,
            round,
            ..Session::default()
        }
    }

    #[test]
    fn test_precedence() {
        assert_eq!(target_route(&state(true, true, true, 2)), Some(Route::Loading));
        assert_eq!(target_route(&state(false, true, true, 2)), Some(Route::Results));
        assert_eq!(target_route(&state(false, false, true, 2)), Some(Route::Entry));
        assert_eq!(target_route(&state(false, false, false, 2)), Some(Route::InputGuess));
        assert_eq!(target_route(&state(false, false, false, 1)), None);
    }

    #[test]
    fn test_edge_triggered() {
        let mut driver = NavigationDriver::new();
        let loading = state(true, false, false, 1);
        assert_eq!(driver.evaluate(&loading), Some(Route::Loading));
        assert_eq!(driver.evaluate(&loading), None);
        assert_eq!(driver.evaluate(&loading), None);

        let done = state(false, true, false, 1);
        assert_eq!(driver.evaluate(&done), Some(Route::Results));
        assert_eq!(driver.evaluate(&done), None);
    }

    #[test]
    fn test_idle_rearms() {
        let mut driver = NavigationDriver::new();
        let loading = state(true, false, false, 1);
        let idle = state(false, false, false, 1);
        assert_eq!(driver.evaluate(&loading), Some(Route::Loading));
        assert_eq!(driver.evaluate(&idle), None);
        assert_eq!(driver.last(), None);
        assert_eq!(driver.evaluate(&loading), Some(Route::Loading));
    }

    #[test]
    fn test_route_paths() {
        assert_eq!(Route::Entry.to_string(), "/");
        assert_eq!(Route::InputGuess.path(), "input-guess");
    }

    #[tokio::test]
    async fn test_spawned_driver_follows_store() {
        use crate::protocol::ServerEvent;
        use crate::transport::testing::RecordingTransport;

        let store = SessionStore::create(Arc::new(RecordingTransport::default()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = NavigationDriver::spawn(&store, tx);

        store.apply_server_event(ServerEvent::RoundChanged { round: 2 });
        store.apply_server_event(ServerEvent::Pong);
        store.apply_server_event(ServerEvent::Loading);
        store.apply_server_event(ServerEvent::EndGame);

        assert_eq!(rx.recv().await, Some(Route::InputGuess));
        assert_eq!(rx.recv().await, Some(Route::Loading));
        assert_eq!(rx.recv().await, Some(Route::Results));

        drop(store);
        handle.await.unwrap();
        assert_eq!(rx.recv().await, None);
    }
}
