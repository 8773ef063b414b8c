//! RCON client, connection pool, and session types.
//!
//! The monitoring engine only sees the [`RconClient`] trait; the concrete
//! wire client lives in [`protocol`] and the serializing lease layer in
//! [`pool`].

pub mod pool;
pub mod protocol;
pub mod types;

use async_trait::async_trait;

use crate::error::RconError;
use types::{PlayerSnapshot, SessionInfo};

/// Session-level operations available on an established RCON connection.
#[async_trait]
pub trait RconClient: Send {
    /// Fetches the current session snapshot.
    async fn session_info(&mut self) -> Result<SessionInfo, RconError>;

    /// Fetches the full player roster in one call.
    async fn players(&mut self) -> Result<Vec<PlayerSnapshot>, RconError>;

    /// Sends a direct message to a player, addressed by display name.
    async fn message_player(&mut self, player_name: &str, message: &str)
    -> Result<(), RconError>;

    /// Punishes a player, addressed by id, with the given reason text.
    async fn punish_player(&mut self, player_id: &str, reason: &str) -> Result<(), RconError>;
}

/// Factory producing connected [`RconClient`] instances.
///
/// The seam between the connection pool and the wire protocol; tests
/// substitute a scripted implementation.
#[async_trait]
pub trait RconConnect: Send + Sync {
    /// Establishes and authenticates a new connection.
    async fn connect(&self) -> Result<Box<dyn RconClient>, RconError>;
}
