//! Wire client for the RCON v2 JSON protocol.
//!
//! Frames are length-delimited byte blocks carrying a JSON envelope. Each
//! request names a command and carries the auth token obtained from the
//! initial `Login` exchange; each response carries an HTTP-style status
//! code plus a command-specific JSON body.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::error::RconError;
use crate::rcon::types::{PlayerSnapshot, SessionInfo};
use crate::rcon::{RconClient, RconConnect};

/// Status code the server returns for a successful command.
pub const STATUS_OK: u16 = 200;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestEnvelope<'a> {
    name: &'a str,
    auth_token: &'a str,
    content: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseEnvelope {
    status_code: u16,
    #[serde(default)]
    status_message: String,
    #[serde(default)]
    content: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerList {
    #[serde(default)]
    players: Vec<PlayerSnapshot>,
}

// ============================================================================
// WireClient
// ============================================================================

/// An authenticated RCON connection speaking the framed JSON protocol.
pub struct WireClient {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    auth_token: String,
}

impl WireClient {
    /// Connects to the server and authenticates with the given password.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailed` when the TCP connection cannot be
    /// established, `Auth` when the server rejects the password, or a
    /// protocol error for malformed responses.
    pub async fn connect(host: &str, port: u16, password: &str) -> Result<Self, RconError> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| RconError::ConnectionFailed(format!("{host}:{port}: {e}")))?;
        let framed = Framed::new(stream, LengthDelimitedCodec::new());

        let mut client = Self {
            framed,
            auth_token: String::new(),
        };
        let content = client
            .execute("Login", json!({ "password": password }))
            .await
            .map_err(|e| match e {
                RconError::Command { message, .. } => RconError::Auth(message),
                other => other,
            })?;
        let token = content
            .get("authToken")
            .and_then(Value::as_str)
            .ok_or_else(|| RconError::Protocol("login response missing authToken".to_string()))?;
        client.auth_token = token.to_string();
        Ok(client)
    }

    async fn execute(&mut self, name: &str, content: Value) -> Result<Value, RconError> {
        let request = RequestEnvelope {
            name,
            auth_token: &self.auth_token,
            content,
        };
        let frame = serde_json::to_vec(&request)?;
        self.framed.send(Bytes::from(frame)).await?;

        let frame = self
            .framed
            .next()
            .await
            .ok_or_else(|| RconError::ConnectionClosed("server closed the connection".to_string()))??;
        let response: ResponseEnvelope = serde_json::from_slice(&frame)?;

        if response.status_code != STATUS_OK {
            return Err(RconError::Command {
                code: response.status_code,
                message: response.status_message,
            });
        }
        Ok(response.content)
    }
}

#[async_trait]
impl RconClient for WireClient {
    async fn session_info(&mut self) -> Result<SessionInfo, RconError> {
        let content = self.execute("GetSessionInfo", Value::Null).await?;
        Ok(serde_json::from_value(content)?)
    }

    async fn players(&mut self) -> Result<Vec<PlayerSnapshot>, RconError> {
        let content = self.execute("GetPlayers", Value::Null).await?;
        let list: PlayerList = serde_json::from_value(content)?;
        Ok(list.players)
    }

    async fn message_player(&mut self, player_name: &str, message: &str) -> Result<(), RconError> {
        self.execute(
            "MessagePlayer",
            json!({ "playerName": player_name, "message": message }),
        )
        .await
        .map(|_| ())
    }

    async fn punish_player(&mut self, player_id: &str, reason: &str) -> Result<(), RconError> {
        self.execute(
            "PunishPlayer",
            json!({ "playerId": player_id, "reason": reason }),
        )
        .await
        .map(|_| ())
    }
}

impl std::fmt::Debug for WireClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireClient").finish_non_exhaustive()
    }
}

// ============================================================================
// TcpConnector
// ============================================================================

/// [`RconConnect`] implementation producing [`WireClient`] connections.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
    password: String,
}

impl TcpConnector {
    /// Creates a connector; no I/O happens until the first `connect` call.
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            password: password.into(),
        }
    }
}

#[async_trait]
impl RconConnect for TcpConnector {
    async fn connect(&self) -> Result<Box<dyn RconClient>, RconError> {
        Ok(Box::new(
            WireClient::connect(&self.host, self.port, &self.password).await?,
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================
