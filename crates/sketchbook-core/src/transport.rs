//! The seam between the session store and the network.

use crate::protocol::ClientRequest;

/// Outbound side of a game server connection.
///
/// Both methods must return without waiting on the network: the store calls
/// them from teardown paths that cannot await.
pub trait Transport: Send + Sync {
    /// Queue a request for delivery. Fire-and-forget.
    fn send(&self, request: ClientRequest) -> crate::error::Result<()>;

    /// Close the connection. Safe to call more than once.
    fn disconnect(&self);
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::Transport;
    use crate::protocol::ClientRequest;

    /// Records every request instead of sending it.
    #[derive(Default)]
    pub struct RecordingTransport {
        sent: Mutex<Vec<ClientRequest>>,
        disconnects: AtomicUsize,
    }

    impl RecordingTransport {
        pub fn sent(&self) -> Vec<ClientRequest> {
            self.sent.lock().map(|s| s.clone()).unwrap_or_default()
        }

        pub fn disconnects(&self) -> usize {
            self.disconnects.load(Ordering::SeqCst)
        }
    }

    impl Transport for RecordingTransport {
        fn send(&self, request: ClientRequest) -> crate::error::Result<()> {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(request);
            }
            Ok(())
        }

        fn disconnect(&self) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }
}
