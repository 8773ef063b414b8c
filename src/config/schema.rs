//! Configuration schema types.
//!
//! These types are deserialized from YAML configuration files. Durations
//! are plain second counts; message templates support `{player}` and
//! `{grid}` placeholders rendered at send time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fence::{Fence, Grid};

/// Grace period before an outside player is punished, when not configured.
pub const DEFAULT_PUNISH_AFTER_SECONDS: u64 = 10;

/// Idle time after the last map change before an empty server is restarted,
/// when not configured.
pub const DEFAULT_IDLE_RESTART_SECONDS: u64 = 3600;

const DEFAULT_WARNING_MESSAGE: &str = "{player}, you are outside your team's permitted area \
                                       ({grid}). Return now or you will be punished.";

const DEFAULT_PUNISH_MESSAGE: &str = "You stayed outside your team's permitted area ({grid}).";

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// The servers to monitor.
    pub servers: Vec<ServerEntry>,
}

/// Per-server monitoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerEntry {
    /// RCON host name or address.
    pub host: String,

    /// RCON port.
    pub port: u16,

    /// RCON password.
    pub password: String,

    /// Seconds a player may remain outside before being punished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub punish_after_seconds: Option<u64>,

    /// Seconds without a map change (and with an empty server) before a
    /// restart is requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_restart_seconds: Option<u64>,

    /// Warning message template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_message: Option<String>,

    /// Punish message template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub punish_message: Option<String>,

    /// Player ids exempt from enforcement.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub whitelist: Vec<String>,

    /// Permitted regions for the axis team.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub axis_fences: Vec<Fence>,

    /// Permitted regions for the allied team.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allied_fences: Vec<Fence>,
}

impl ServerEntry {
    /// Grace period before an outside player is punished.
    #[must_use]
    pub fn punish_after(&self) -> Duration {
        Duration::from_secs(
            self.punish_after_seconds
                .unwrap_or(DEFAULT_PUNISH_AFTER_SECONDS),
        )
    }

    /// Idle threshold for the inactivity monitor.
    #[must_use]
    pub fn idle_restart(&self) -> Duration {
        Duration::from_secs(
            self.idle_restart_seconds
                .unwrap_or(DEFAULT_IDLE_RESTART_SECONDS),
        )
    }

    /// Whether the player id is exempt from enforcement.
    #[must_use]
    pub fn is_whitelisted(&self, player_id: &str) -> bool {
        self.whitelist.iter().any(|id| id == player_id)
    }

    /// Renders the warning message for a player at a grid cell.
    #[must_use]
    pub fn render_warning(&self, player: &str, grid: Grid) -> String {
        render(
            self.warning_message.as_deref().unwrap_or(DEFAULT_WARNING_MESSAGE),
            player,
            grid,
        )
    }

    /// Renders the punish message for a player at a grid cell.
    #[must_use]
    pub fn render_punish(&self, player: &str, grid: Grid) -> String {
        render(
            self.punish_message.as_deref().unwrap_or(DEFAULT_PUNISH_MESSAGE),
            player,
            grid,
        )
    }
}

/// Resolves `{player}` and `{grid}` placeholders in a message template.
fn render(template: &str, player: &str, grid: Grid) -> String {
    template
        .replace("{player}", player)
        .replace("{grid}", &grid.to_string())
}
