//! WebSocket transport for the Sketchbook game server.
//!
//! [`GameClient::connect`] dials the server and returns a [`SessionGuard`]
//! that owns the session for as long as it lives and closes it on drop.

pub mod connection;
pub mod guard;

pub use connection::{GameClient, WsTransport};
pub use guard::SessionGuard;
