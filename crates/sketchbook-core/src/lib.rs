//! Core of the Sketchbook party-game client: session state, the wire
//! protocol, and the logic that turns server events into UI decisions.

pub mod config;
pub mod error;
pub mod navigation;
pub mod protocol;
pub mod reveal;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;

pub use navigation::{NavigationDriver, Route};
pub use protocol::{ClientRequest, ServerEvent};
pub use reveal::{RevealEvent, RevealSequencer};
pub use session::Session;
pub use store::SessionStore;
pub use transport::Transport;
pub use types::{GameResult, Player, PlayerId};
