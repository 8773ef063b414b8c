//! Domain types reported by the RCON session.

use serde::{Deserialize, Serialize};

/// Default playable world extent in metres, used when the server does not
/// report one.
pub const DEFAULT_WORLD_EXTENT: f64 = 2000.0;

const fn default_world_extent() -> f64 {
    DEFAULT_WORLD_EXTENT
}

/// Snapshot of the current game session.
///
/// Replaced wholesale on every successful session poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Identifier of the currently active map.
    pub map_name: String,

    /// Number of players currently on the server.
    #[serde(default)]
    pub player_count: u32,

    /// Side length of the playable area in metres, centred on the origin.
    #[serde(default = "default_world_extent")]
    pub world_extent: f64,
}

/// A player's position in world coordinates (metres, origin at map centre).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldPosition {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

/// Faction code as reported by the player roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerTeam {
    Us,
    Gb,
    Rus,
    Dak,
    B8a,
    Ger,
    /// A faction code this build does not know about.
    Unknown,
}

impl PlayerTeam {
    /// Parses a faction code, mapping unrecognized codes to [`Self::Unknown`].
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code.to_ascii_lowercase().as_str() {
            "us" => Self::Us,
            "gb" => Self::Gb,
            "rus" => Self::Rus,
            "dak" => Self::Dak,
            "b8a" => Self::B8a,
            "ger" => Self::Ger,
            _ => Self::Unknown,
        }
    }

    /// Returns the wire code for this faction.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Us => "us",
            Self::Gb => "gb",
            Self::Rus => "rus",
            Self::Dak => "dak",
            Self::B8a => "b8a",
            Self::Ger => "ger",
            Self::Unknown => "unknown",
        }
    }

    /// Maps the faction to its team side, or `None` for unknown factions.
    #[must_use]
    pub const fn side(self) -> Option<TeamSide> {
        match self {
            Self::Ger => Some(TeamSide::Axis),
            Self::Us | Self::Gb | Self::Rus | Self::Dak | Self::B8a => Some(TeamSide::Allies),
            Self::Unknown => None,
        }
    }
}

impl Serialize for PlayerTeam {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for PlayerTeam {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(Self::from_code(&code))
    }
}

/// Closed enumeration of team sides used for fence selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamSide {
    Allies,
    Axis,
}

/// Ephemeral per-poll snapshot of a player.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    /// Stable player identifier.
    pub id: String,

    /// Display name, used for messaging.
    pub name: String,

    /// Faction the player is on.
    pub team: PlayerTeam,

    /// World position; absent while the player is dead or spectating.
    #[serde(default)]
    pub position: Option<WorldPosition>,
}

impl PlayerSnapshot {
    /// Whether the player is currently spawned into the world.
    #[must_use]
    pub const fn is_spawned(&self) -> bool {
        self.position.is_some()
    }
}
