//! Core types: the established voice session, its server options, and the
//! errors a join can fail with.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use vl_protocol::Snowflake;

/// Where the media layer should connect: the voice server endpoint and the
/// token that authenticates against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceServerOptions {
    pub endpoint: String,
    pub token: String,
}

/// Lifecycle of a registered session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connected,
    Disconnected,
}

/// An established voice session for one guild.
///
/// Every field the media layer needs is required at construction, so a
/// session is never observable half-populated.  Sessions are shared as
/// `Arc<Session>`; two handles refer to the same session iff
/// [`Arc::ptr_eq`](std::sync::Arc::ptr_eq) holds.
#[derive(Debug)]
pub struct Session {
    guild_id: Snowflake,
    channel_id: Snowflake,
    self_id: Snowflake,
    shard_id: u32,
    session_id: String,
    server: VoiceServerOptions,
    created_at: DateTime<Utc>,
    state: RwLock<SessionState>,
}

impl Session {
    pub fn new(
        guild_id: Snowflake,
        channel_id: Snowflake,
        self_id: Snowflake,
        shard_id: u32,
        session_id: impl Into<String>,
        server: VoiceServerOptions,
    ) -> Self {
        Self {
            guild_id,
            channel_id,
            self_id,
            shard_id,
            session_id: session_id.into(),
            server,
            created_at: Utc::now(),
            state: RwLock::new(SessionState::Connected),
        }
    }

    pub fn guild_id(&self) -> Snowflake {
        self.guild_id
    }

    pub fn channel_id(&self) -> Snowflake {
        self.channel_id
    }

    pub fn self_id(&self) -> Snowflake {
        self.self_id
    }

    pub fn shard_id(&self) -> u32 {
        self.shard_id
    }

    /// Session secret taken from the voice state echo.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn server(&self) -> &VoiceServerOptions {
        &self.server
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    pub(crate) fn mark_disconnected(&self) {
        *self.state.write() = SessionState::Disconnected;
    }

    /// Serializable snapshot (the token is left out).
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            guild_id: self.guild_id,
            channel_id: self.channel_id,
            self_id: self.self_id,
            shard_id: self.shard_id,
            endpoint: self.server.endpoint.clone(),
            state: self.state(),
            created_at: self.created_at,
        }
    }
}

/// Summary info for listing and logging.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub guild_id: Snowflake,
    pub channel_id: Snowflake,
    pub self_id: Snowflake,
    pub shard_id: u32,
    pub endpoint: String,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Failure to hand a command to the gateway transport.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("shard {shard_id} is not connected")]
    ShardUnavailable { shard_id: u32 },
    #[error("send failed: {0}")]
    Send(String),
}

/// Errors a voice join can fail with.
///
/// Losing a registration race is not an error: the join resolves to the
/// session that won.
#[derive(thiserror::Error, Debug)]
pub enum JoinError {
    #[error("config: {0}")]
    Config(String),
    /// Both handshake events did not arrive before the deadline.  Cleanup
    /// has already run; the caller may retry.
    #[error("voice handshake timed out after {0:?}")]
    Timeout(Duration),
    /// The client identity could not be resolved.  Not retried.
    #[error("missing self id")]
    MissingSelfId,
    /// The join command could not be sent.  Nothing was registered.
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("{0} event stream closed")]
    EventSourceClosed(&'static str),
}

impl JoinError {
    /// Whether a caller-level retry can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(
            Snowflake::new(1),
            Snowflake::new(2),
            Snowflake::new(3),
            0,
            "secret",
            VoiceServerOptions {
                endpoint: "voice.example:443".into(),
                token: "tok".into(),
            },
        )
    }

    #[test]
    fn new_session_is_connected() {
        let s = session();
        assert!(s.is_connected());
        s.mark_disconnected();
        assert_eq!(s.state(), SessionState::Disconnected);
    }

    #[test]
    fn info_omits_token() {
        let json = serde_json::to_value(session().info()).unwrap();
        assert_eq!(json["endpoint"], "voice.example:443");
        assert_eq!(json["state"], "connected");
        assert!(json.get("token").is_none());
    }

    #[test]
    fn retryable_classification() {
        assert!(JoinError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(JoinError::Transport(TransportError::Send("x".into())).is_retryable());
        assert!(!JoinError::MissingSelfId.is_retryable());
    }
}
