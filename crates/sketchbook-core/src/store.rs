//! Session store: the single owner of session state.
//!
//! All mutation goes through [`SessionStore::apply_server_event`] or one of
//! the command methods. Each change publishes a fresh `Arc<Session>` on a
//! `watch` channel (latest value) and a `broadcast` channel (every snapshot,
//! in order), so observers never see a half-applied event.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::protocol::{ClientRequest, ServerEvent};
use crate::session::Session;
use crate::transport::Transport;
use crate::types::PlayerId;

const SNAPSHOT_CAPACITY: usize = 64;

pub struct SessionStore {
    transport: Arc<dyn Transport>,
    state: watch::Sender<Arc<Session>>,
    snapshots: broadcast::Sender<Arc<Session>>,
    closed: AtomicBool,
}

impl SessionStore {
    /// Create a store bound to `transport`, starting from the initial state.
    pub fn create(transport: Arc<dyn Transport>) -> Self {
        let (state, _) = watch::channel(Arc::new(Session::default()));
        let (snapshots, _) = broadcast::channel(SNAPSHOT_CAPACITY);
        Self {
            transport,
            state,
            snapshots,
            closed: AtomicBool::new(false),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<Session> {
        self.state.borrow().clone()
    }

    /// Receive every snapshot published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Session>> {
        self.snapshots.subscribe()
    }

    /// Observe the latest snapshot only.
    pub fn watch(&self) -> watch::Receiver<Arc<Session>> {
        self.state.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait until the server assigns our player id. Returns `false` if the
    /// session fails or closes first, e.g. on a room-full rejection.
    pub async fn wait_joined(&self) -> bool {
        let mut state = self.watch();
        let settled = state
            .wait_for(|s| s.my_id.is_some() || s.error || self.is_closed())
            .await;
        match settled {
            Ok(session) => session.my_id.is_some() && !self.is_closed(),
            Err(_) => false,
        }
    }

    /// Apply one inbound event. Events after `disconnect()` are dropped.
    pub fn apply_server_event(&self, event: ServerEvent) {
        if self.is_closed() {
            debug!(event = event.name(), "Store closed, dropping event");
            return;
        }
        debug!(event = event.name(), "Applying server event");
        self.publish(|s| s.apply(&event));
    }

    /// Host-only: ask the server for the result of the player at `current_idx`.
    ///
    /// `current_idx` is left alone; it advances when the result arrives.
    /// Returns whether a request was sent.
    pub fn request_next_result(&self) -> bool {
        let session = self.snapshot();
        if !session.is_host() {
            debug!("Not host, ignoring result request");
            return false;
        }
        let Some(player) = session.current_player() else {
            debug!(
                current_idx = session.current_idx,
                players = session.players.len(),
                "No player left to reveal"
            );
            return false;
        };
        self.send(ClientRequest::WantResult {
            player_id: player.player_id,
        })
    }

    /// Submit a guessed or chosen title. State changes only when the server
    /// follows up.
    pub fn submit_title(&self, title: impl Into<String>, player_id: PlayerId) -> bool {
        self.send(ClientRequest::InputTitle {
            title: title.into(),
            player_id,
        })
    }

    pub fn change_name(&self, name: impl Into<String>) -> bool {
        let Some(player_id) = self.snapshot().my_id else {
            debug!("No player id yet, cannot change name");
            return false;
        };
        self.send(ClientRequest::NameChanged {
            player_id,
            name: name.into(),
        })
    }

    pub fn submit_subject(&self, topic: impl Into<String>) -> bool {
        let Some(player_id) = self.snapshot().my_id else {
            debug!("No player id yet, cannot submit subject");
            return false;
        };
        self.send(ClientRequest::SubmitTopic {
            topic: topic.into(),
            player_id,
        })
    }

    /// Host-only: start a new game for the room.
    pub fn start_game(&self) -> bool {
        if !self.snapshot().is_host() {
            debug!("Not host, ignoring start request");
            return false;
        }
        self.send(ClientRequest::StartGame {})
    }

    /// Answer a server heartbeat.
    pub fn pong(&self) -> bool {
        self.send(ClientRequest::pong())
    }

    pub fn reset_round(&self) {
        if self.is_closed() {
            return;
        }
        self.publish(Session::reset_round);
    }

    pub fn set_disable_now_loading(&self) {
        if self.is_closed() {
            return;
        }
        self.publish(|s| Session {
            now_loading: false,
            ..s.clone()
        });
    }

    /// Close the session: state returns to its initial value, the transport
    /// is closed, and later events are ignored. Idempotent.
    pub fn disconnect(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Disconnecting session");
        self.publish(|_| Session::default());
        self.transport.disconnect();
    }

    /// Tear the store down.
    pub fn dispose(self) {
        self.disconnect();
    }

    fn send(&self, request: ClientRequest) -> bool {
        if self.is_closed() {
            debug!(event = request.event_name(), "Store closed, not sending");
            return false;
        }
        let event = request.event_name();
        match self.transport.send(request) {
            Ok(()) => {
                debug!(event, "Sent request");
                true
            }
            Err(e) => {
                warn!(event, %e, "Failed to send request");
                false
            }
        }
    }

    fn publish(&self, f: impl FnOnce(&Session) -> Session) {
        let mut published = None;
        self.state.send_modify(|state| {
            let next = Arc::new(f(&**state));
            published = Some(next.clone());
            *state = next;
        });
        if let Some(next) = published {
            // No subscribers is fine.
            let _ = self.snapshots.send(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::RecordingTransport;
    use crate::types::{GameResult, Player};

    fn store() -> (Arc<RecordingTransport>, SessionStore) {
        let transport = Arc::new(RecordingTransport::default());
        let store = SessionStore::create(transport.clone());
        (transport, store)
    }

    fn join(store: &SessionStore, my_id: PlayerId, host_id: PlayerId) {
        store.apply_server_event(ServerEvent::Connected { player_id: my_id });
        store.apply_server_event(ServerEvent::RosterUpdated {
            players: vec![Player::new(1, "A"), Player::new(2, "B")],
            host_id: Some(host_id),
        });
    }

    fn result_for(name: &str) -> ServerEvent {
        ServerEvent::ResultReady(GameResult::new(name, "t", format!("http://img/{name}.png")))
    }

    #[test]
    fn test_host_reveal_scenario() {
        let (transport, store) = store();
        join(&store, 1, 1);
        assert_eq!(store.snapshot().total, 2);

        assert!(store.request_next_result());
        assert_eq!(
            transport.sent(),
            vec![ClientRequest::WantResult { player_id: 1 }]
        );
        assert_eq!(store.snapshot().current_idx, 0);

        store.apply_server_event(result_for("A"));
        let s = store.snapshot();
        assert_eq!(s.game_result.len(), 1);
        assert_eq!(s.game_result[0].player_name, "A");
        assert_eq!(s.current_idx, 1);

        // Network retry delivers the same result again.
        store.apply_server_event(result_for("A"));
        assert_eq!(store.snapshot().game_result.len(), 1);
        assert_eq!(store.snapshot().current_idx, 1);
    }

    #[test]
    fn test_request_next_result_noop_when_not_host() {
        let (transport, store) = store();
        join(&store, 2, 1);
        assert!(!store.request_next_result());
        assert!(!store.start_game());
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_request_next_result_noop_when_out_of_range() {
        let (transport, store) = store();
        join(&store, 1, 1);
        store.apply_server_event(result_for("A"));
        store.apply_server_event(result_for("B"));
        assert!(!store.request_next_result());
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_request_next_result_noop_without_ids() {
        let (transport, store) = store();
        assert!(!store.request_next_result());
        assert!(!store.change_name("Zed"));
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_submit_title_leaves_state_alone() {
        let (transport, store) = store();
        join(&store, 2, 1);
        let before = store.snapshot();
        assert!(store.submit_title("a cat", 2));
        assert_eq!(store.snapshot(), before);
        assert_eq!(
            transport.sent(),
            vec![ClientRequest::InputTitle {
                title: "a cat".into(),
                player_id: 2
            }]
        );
    }

    #[test]
    fn test_name_and_subject_use_own_id() {
        let (transport, store) = store();
        join(&store, 2, 1);
        assert!(store.change_name("Bee"));
        assert!(store.submit_subject("a castle"));
        assert_eq!(
            transport.sent(),
            vec![
                ClientRequest::NameChanged {
                    player_id: 2,
                    name: "Bee".into()
                },
                ClientRequest::SubmitTopic {
                    topic: "a castle".into(),
                    player_id: 2
                },
            ]
        );
    }

    #[test]
    fn test_teardown_restores_initial_state() {
        let (transport, store) = store();
        join(&store, 1, 1);
        store.apply_server_event(ServerEvent::Loading);
        store.apply_server_event(result_for("A"));

        store.set_disable_now_loading();
        store.reset_round();
        store.disconnect();
        assert_eq!(*store.snapshot(), Session::default());
        assert_eq!(transport.disconnects(), 1);

        store.disconnect();
        assert_eq!(transport.disconnects(), 1);
    }

    #[test]
    fn test_closed_store_ignores_events_and_commands() {
        let (transport, store) = store();
        join(&store, 1, 1);
        store.disconnect();
        store.apply_server_event(ServerEvent::ConnectionLost);
        store.reset_round();
        assert_eq!(*store.snapshot(), Session::default());
        assert!(!store.submit_title("late", 1));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_wait_joined_sees_player_id() {
        let (_transport, store) = store();
        let (joined, ()) = tokio::join!(store.wait_joined(), async {
            tokio::task::yield_now().await;
            store.apply_server_event(ServerEvent::Connected { player_id: 4 });
        });
        assert!(joined);
        assert!(store.wait_joined().await);
    }

    #[tokio::test]
    async fn test_wait_joined_stops_on_room_full() {
        let (_transport, store) = store();
        let (joined, ()) = tokio::join!(store.wait_joined(), async {
            tokio::task::yield_now().await;
            store.apply_server_event(ServerEvent::parse(r#"{"error": "room is full"}"#));
        });
        assert!(!joined);
        assert!(store.snapshot().error);
    }

    #[tokio::test]
    async fn test_wait_joined_stops_on_disconnect() {
        let (_transport, store) = store();
        let (joined, ()) = tokio::join!(store.wait_joined(), async {
            tokio::task::yield_now().await;
            store.disconnect();
        });
        assert!(!joined);
    }

    #[tokio::test]
    async fn test_subscribers_see_every_snapshot_in_order() {
        let (_transport, store) = store();
        let mut rx = store.subscribe();
        join(&store, 1, 1);
        store.apply_server_event(ServerEvent::RoundChanged { round: 2 });

        let first = rx.recv().await.unwrap();
        assert_eq!(first.my_id, Some(1));
        assert!(first.players.is_empty());
        let second = rx.recv().await.unwrap();
        assert_eq!(second.players.len(), 2);
        let third = rx.recv().await.unwrap();
        assert_eq!(third.round, 2);
    }
}
