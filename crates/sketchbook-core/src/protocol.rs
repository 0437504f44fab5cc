//! Game server wire protocol.
//!
//! Every frame in either direction is JSON text shaped
//! `{"event": <name>, "data": <payload>}`. Inbound frames are decoded into
//! [`ServerEvent`] by a total function: anything unrecognized or malformed
//! becomes a variant the store logs and ignores.

use serde::{Deserialize, Serialize};

use crate::types::{GameResult, Player, PlayerId};

const PONG: &str = "pong";

/// Raw inbound envelope.
///
/// The room-full rejection arrives as a bare `{"error": "..."}` object with no
/// `event` key, hence the optional fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A decoded server event.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// The server assigned this client its player id.
    Connected { player_id: PlayerId },
    /// Full roster push. `host_id` is the explicit host if the server sent one.
    RosterUpdated {
        players: Vec<Player>,
        host_id: Option<PlayerId>,
    },
    RoundChanged { round: u32 },
    /// The server started generating images.
    Loading,
    /// The image to guess during the guessing phase is ready.
    ImageReady { img_src: String },
    /// One player's result, pushed in answer to `wantResult`.
    ResultReady(GameResult),
    EndGame,
    Error { message: String },
    /// Synthesized by the transport when the connection drops.
    ConnectionLost,
    /// Acknowledgement of a `nameChanged` request.
    NameAck,
    Ping,
    Pong,
    Unknown { event: String },
    Malformed { event: Option<String>, reason: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectedData {
    player_id: PlayerId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RosterData {
    players: Vec<Player>,
    #[serde(default)]
    host_id: Option<PlayerId>,
}

#[derive(Deserialize)]
struct RoundData {
    round: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageData {
    img_src: String,
}

impl ServerEvent {
    /// Decode one text frame. Never fails.
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Frame>(text) {
            Ok(frame) => Self::from_frame(frame),
            Err(e) => Self::Malformed {
                event: None,
                reason: format!("invalid frame: {e}"),
            },
        }
    }

    pub fn from_frame(frame: Frame) -> Self {
        let Some(event) = frame.event else {
            return match frame.error {
                Some(message) => Self::Error { message },
                None => Self::Malformed {
                    event: None,
                    reason: "frame has no event name".into(),
                },
            };
        };

        let data = frame.data;
        let decoded = match event.as_str() {
            "connected" => decode::<ConnectedData>(data)
                .map(|d| Self::Connected { player_id: d.player_id }),
            "renewList" => decode::<RosterData>(data).map(|d| Self::RosterUpdated {
                players: d.players,
                host_id: d.host_id,
            }),
            "gameStart" | "roundChanged" => {
                decode::<RoundData>(data).map(|d| Self::RoundChanged { round: d.round })
            }
            "loading" => Ok(Self::Loading),
            "imageReady" => {
                decode::<ImageData>(data).map(|d| Self::ImageReady { img_src: d.img_src })
            }
            "result" => decode::<GameResult>(data).map(Self::ResultReady),
            "endGame" => Ok(Self::EndGame),
            "error" => Ok(Self::Error {
                message: error_message(&data),
            }),
            "changeName" => Ok(Self::NameAck),
            "ping" => Ok(Self::Ping),
            "pong" => Ok(Self::Pong),
            _ => Ok(Self::Unknown {
                event: event.clone(),
            }),
        };

        decoded.unwrap_or_else(|e| Self::Malformed {
            event: Some(event),
            reason: e.to_string(),
        })
    }

    /// Short name for logging.
    pub fn name(&self) -> &str {
        match self {
            Self::Connected { .. } => "connected",
            Self::RosterUpdated { .. } => "renewList",
            Self::RoundChanged { .. } => "roundChanged",
            Self::Loading => "loading",
            Self::ImageReady { .. } => "imageReady",
            Self::ResultReady(_) => "result",
            Self::EndGame => "endGame",
            Self::Error { .. } => "error",
            Self::ConnectionLost => "connectionLost",
            Self::NameAck => "changeName",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Unknown { event } => event,
            Self::Malformed { event, .. } => event.as_deref().unwrap_or("<none>"),
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(data: serde_json::Value) -> serde_json::Result<T> {
    serde_json::from_value(data)
}

fn error_message(data: &serde_json::Value) -> String {
    match data {
        serde_json::Value::String(s) => s.clone(),
        other => other
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unspecified server error")
            .to_string(),
    }
}

/// Requests this client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientRequest {
    /// Host-only: reveal the result of `player_id`.
    WantResult { player_id: PlayerId },
    InputTitle { title: String, player_id: PlayerId },
    NameChanged { player_id: PlayerId, name: String },
    StartGame {},
    SubmitTopic { topic: String, player_id: PlayerId },
    /// Heartbeat reply; the server expects the literal `"pong"` as data.
    Pong(String),
}

impl ClientRequest {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::WantResult { .. } => "wantResult",
            Self::InputTitle { .. } => "inputTitle",
            Self::NameChanged { .. } => "nameChanged",
            Self::StartGame {} => "startGame",
            Self::SubmitTopic { .. } => "submitTopic",
            Self::Pong(_) => "pong",
        }
    }

    pub fn pong() -> Self {
        Self::Pong(PONG.to_string())
    }

    /// Serialize to a text frame.
    pub fn to_text(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
