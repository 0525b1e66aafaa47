//! Builder for voice join requests.

use std::time::Duration;

use vl_domain::config::VoiceConfig;
use vl_protocol::{Snowflake, VoiceStateUpdate};

use crate::types::JoinError;

/// Default time to wait for the handshake before giving up.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A request to connect to a voice channel.
///
/// Create via [`JoinRequest::builder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub(crate) guild_id: Snowflake,
    pub(crate) channel_id: Snowflake,
    pub(crate) self_mute: bool,
    pub(crate) self_deaf: bool,
    pub(crate) timeout: Duration,
}

impl JoinRequest {
    pub fn builder(guild_id: Snowflake, channel_id: Snowflake) -> JoinRequestBuilder {
        JoinRequestBuilder::new(guild_id, channel_id)
    }

    pub fn guild_id(&self) -> Snowflake {
        self.guild_id
    }

    pub fn channel_id(&self) -> Snowflake {
        self.channel_id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The voice state update this request sends.
    pub fn command(&self) -> VoiceStateUpdate {
        VoiceStateUpdate::join(self.guild_id, self.channel_id, self.self_mute, self.self_deaf)
    }
}

/// Fluent builder for [`JoinRequest`].
///
/// # Example
///
/// ```rust
/// # use std::time::Duration;
/// # use vl_protocol::Snowflake;
/// # use vl_voice::JoinRequest;
/// let request = JoinRequest::builder(Snowflake::new(81384788765712384), Snowflake::new(1))
///     .self_deaf(true)
///     .timeout(Duration::from_secs(10))
///     .build()
///     .unwrap();
/// assert_eq!(request.timeout(), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct JoinRequestBuilder {
    guild_id: Snowflake,
    channel_id: Snowflake,
    self_mute: bool,
    self_deaf: bool,
    timeout: Duration,
}

impl JoinRequestBuilder {
    pub fn new(guild_id: Snowflake, channel_id: Snowflake) -> Self {
        Self {
            guild_id,
            channel_id,
            self_mute: false,
            self_deaf: false,
            timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }

    /// Take mute, deaf and timeout from configuration.
    pub fn defaults_from(mut self, cfg: &VoiceConfig) -> Self {
        self.self_mute = cfg.self_mute;
        self.self_deaf = cfg.self_deaf;
        self.timeout = cfg.join_timeout();
        self
    }

    /// Join muted.
    pub fn self_mute(mut self, mute: bool) -> Self {
        self.self_mute = mute;
        self
    }

    /// Join deafened.
    pub fn self_deaf(mut self, deaf: bool) -> Self {
        self.self_deaf = deaf;
        self
    }

    /// Maximum time to wait for both handshake events.  A join can stall
    /// when the client cannot view the channel or the channel is full.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<JoinRequest, JoinError> {
        if self.timeout.is_zero() {
            return Err(JoinError::Config("join timeout must be greater than 0".into()));
        }

        Ok(JoinRequest {
            guild_id: self.guild_id,
            channel_id: self.channel_id,
            self_mute: self.self_mute,
            self_deaf: self.self_deaf,
            timeout: self.timeout,
        })
    }
}
