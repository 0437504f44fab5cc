//! Connection lifecycle: dial, writer task, reader loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use sketchbook_core::error::{Result, SketchbookError};
use sketchbook_core::protocol::{ClientRequest, ServerEvent};
use sketchbook_core::store::SessionStore;
use sketchbook_core::transport::Transport;

use crate::guard::SessionGuard;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum Outbound {
    Text(String),
    Close,
}

/// Outbound half of a WebSocket connection.
///
/// Frames are queued on an unbounded channel and written by a dedicated
/// task, so `send` and `disconnect` never wait on the network.
pub struct WsTransport {
    outbound: mpsc::UnboundedSender<Outbound>,
    closed: AtomicBool,
}

impl WsTransport {
    fn new(outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            outbound,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Transport for WsTransport {
    fn send(&self, request: ClientRequest) -> Result<()> {
        if self.is_closed() {
            return Err(SketchbookError::Transport("connection closed".into()));
        }
        let text = request.to_text()?;
        self.outbound
            .send(Outbound::Text(text))
            .map_err(|_| SketchbookError::Transport("writer task has stopped".into()))
    }

    fn disconnect(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Closing WebSocket");
        let _ = self.outbound.send(Outbound::Close);
    }
}

pub struct GameClient;

impl GameClient {
    /// Dial `url` and start a session.
    pub async fn connect(url: &str) -> Result<SessionGuard> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| SketchbookError::Transport(format!("connect to {url} failed: {e}")))?;
        info!(%url, "Connected to game server");

        let (mut ws_tx, ws_rx) = ws.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();

        let transport = Arc::new(WsTransport::new(out_tx));
        let store = Arc::new(SessionStore::create(transport));

        let writer = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                match msg {
                    Outbound::Text(text) => {
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Outbound::Close => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        let _ = ws_tx.close().await;
                        break;
                    }
                }
            }
        });

        let reader = tokio::spawn(read_loop(store.clone(), ws_rx));

        Ok(SessionGuard::new(store, reader, writer))
    }
}

/// Apply inbound frames in delivery order until the stream ends.
async fn read_loop(store: Arc<SessionStore>, mut ws_rx: SplitStream<WsStream>) {
    while let Some(msg_result) = ws_rx.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let event = ServerEvent::parse(text.as_str());
                if event == ServerEvent::Ping {
                    store.pong();
                }
                store.apply_server_event(event);
            }
            Ok(Message::Close(_)) => {
                debug!("Server closed the connection");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(%e, "WebSocket error");
                break;
            }
        }
    }
    // Ignored by the store if the close was ours.
    store.apply_server_event(ServerEvent::ConnectionLost);
}
