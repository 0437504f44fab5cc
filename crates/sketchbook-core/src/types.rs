use serde::{Deserialize, Serialize};

/// Server-assigned player identifier, stable for the lifetime of a connection.
pub type PlayerId = u64;

/// A player in the room roster.
///
/// The server has used both `id` and `player_id` for the identifier and
/// `name` for the display name, so the aliases accept either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    #[serde(alias = "id", alias = "playerId")]
    pub player_id: PlayerId,
    #[serde(alias = "name", alias = "playerName", default)]
    pub player_name: String,
    #[serde(rename = "isHost", default)]
    pub is_host: bool,
}

impl Player {
    pub fn new(player_id: PlayerId, player_name: impl Into<String>) -> Self {
        Self {
            player_id,
            player_name: player_name.into(),
            is_host: false,
        }
    }
}

/// One player's finished artifact, revealed to the group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    #[serde(alias = "playerName", alias = "name")]
    pub player_name: String,
    #[serde(default)]
    pub title: String,
    /// URL of the rendered image.
    #[serde(alias = "imgSrc", alias = "image")]
    pub img: String,
}

impl GameResult {
    pub fn new(
        player_name: impl Into<String>,
        title: impl Into<String>,
        img: impl Into<String>,
    ) -> Self {
        Self {
            player_name: player_name.into(),
            title: title.into(),
            img: img.into(),
        }
    }
}
