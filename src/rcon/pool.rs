//! Serializing connection pool.
//!
//! Owns at most one live RCON connection. Every operation leases the
//! connection for exactly that one call: lock, ensure connected, execute,
//! unlock. The lease must never be held across a timer wait or a second
//! logical operation. Any error drops the connection so the next lease
//! reconnects from scratch.

use tokio::sync::Mutex;

use crate::error::RconError;
use crate::rcon::types::{PlayerSnapshot, SessionInfo};
use crate::rcon::{RconClient, RconConnect};

/// Pool serializing access to a single underlying RCON connection.
pub struct ConnectionPool {
    connector: Box<dyn RconConnect>,
    client: Mutex<Option<Box<dyn RconClient>>>,
}

impl ConnectionPool {
    /// Creates a pool; the connection itself is established lazily on the
    /// first lease.
    #[must_use]
    pub fn new(connector: Box<dyn RconConnect>) -> Self {
        Self {
            connector,
            client: Mutex::new(None),
        }
    }

    /// Fetches the current session snapshot.
    ///
    /// # Errors
    ///
    /// Returns the connection or command error; the pooled connection is
    /// dropped on failure.
    pub async fn session_info(&self) -> Result<SessionInfo, RconError> {
        let mut guard = self.client.lock().await;
        let client = Self::ensure_connected(&mut guard, self.connector.as_ref()).await?;
        let result = client.session_info().await;
        if result.is_err() {
            *guard = None;
        }
        result
    }

    /// Fetches the full player roster.
    ///
    /// # Errors
    ///
    /// Returns the connection or command error; the pooled connection is
    /// dropped on failure.
    pub async fn players(&self) -> Result<Vec<PlayerSnapshot>, RconError> {
        let mut guard = self.client.lock().await;
        let client = Self::ensure_connected(&mut guard, self.connector.as_ref()).await?;
        let result = client.players().await;
        if result.is_err() {
            *guard = None;
        }
        result
    }

    /// Sends a direct message to a player.
    ///
    /// # Errors
    ///
    /// Returns the connection or command error; the pooled connection is
    /// dropped on failure.
    pub async fn message_player(&self, player_name: &str, message: &str) -> Result<(), RconError> {
        let mut guard = self.client.lock().await;
        let client = Self::ensure_connected(&mut guard, self.connector.as_ref()).await?;
        let result = client.message_player(player_name, message).await;
        if result.is_err() {
            *guard = None;
        }
        result
    }

    /// Punishes a player with the given reason text.
    ///
    /// # Errors
    ///
    /// Returns the connection or command error; the pooled connection is
    /// dropped on failure.
    pub async fn punish_player(&self, player_id: &str, reason: &str) -> Result<(), RconError> {
        let mut guard = self.client.lock().await;
        let client = Self::ensure_connected(&mut guard, self.connector.as_ref()).await?;
        let result = client.punish_player(player_id, reason).await;
        if result.is_err() {
            *guard = None;
        }
        result
    }

    async fn ensure_connected<'a>(
        guard: &'a mut Option<Box<dyn RconClient>>,
        connector: &dyn RconConnect,
    ) -> Result<&'a mut Box<dyn RconClient>, RconError> {
        match guard.take() {
            Some(client) => Ok(guard.insert(client)),
            None => Ok(guard.insert(connector.connect().await?)),
        }
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool").finish_non_exhaustive()
    }
}
