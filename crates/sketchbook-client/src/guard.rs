//! Scoped ownership of a live session.

use std::ops::Deref;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use sketchbook_core::store::SessionStore;

/// Owns a connected session. Dropping it runs [`SessionGuard::teardown`], so
/// every exit path releases the connection.
pub struct SessionGuard {
    store: Arc<SessionStore>,
    reader: JoinHandle<()>,
    writer: Option<JoinHandle<()>>,
}

impl SessionGuard {
    pub(crate) fn new(
        store: Arc<SessionStore>,
        reader: JoinHandle<()>,
        writer: JoinHandle<()>,
    ) -> Self {
        Self {
            store,
            reader,
            writer: Some(writer),
        }
    }

    pub fn store(&self) -> Arc<SessionStore> {
        self.store.clone()
    }

    /// Leave the session: clear loading, reset the round, disconnect.
    /// Synchronous and safe to repeat.
    pub fn teardown(&self) {
        self.store.set_disable_now_loading();
        self.store.reset_round();
        self.store.disconnect();
    }

    /// Tear down and wait for the close frame to be written.
    pub async fn close(mut self) {
        self.teardown();
        if let Some(writer) = self.writer.take() {
            let _ = writer.await;
        }
    }
}

impl Deref for SessionGuard {
    type Target = SessionStore;

    fn deref(&self) -> &SessionStore {
        &self.store
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.teardown();
        self.reader.abort();
        debug!("Session released");
    }
}
