//! `vl-voice`: voice session handshakes and shard reconnect accounting
//! for a sharded, event-driven gateway.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Application                                                 │
//! │                                                              │
//! │   let voice = HandshakeCoordinator::new(bus, shards, me);    │
//! │   let req = JoinRequest::builder(guild, channel).build()?;   │
//! │   let session = voice.join(&req).await?;                     │
//! │   // hand session.server() + session.session_id() to media  │
//! └──────────────┬───────────────────────────────▲───────────────┘
//!                │ VoiceStateUpdate               │ VoiceStateEvent
//!                ▼ (shard = guild >> 22 % n)      │ VoiceServerEvent
//!          CommandSink                      EventSource
//! ```
//!
//! # Join flow
//!
//! 1. Existing session for the guild: re-send the command, wait for our
//!    voice state echo, return the same session.
//! 2. Otherwise subscribe to both event streams, send the command, and
//!    wait for our voice state **and** a voice server assignment with an
//!    endpoint, under one deadline.
//! 3. Register the session (first registration for a guild wins).
//! 4. On failure: drop both subscriptions, send a leave command, evict.
//!
//! # Shard reconnects
//!
//! [`ReconnectAccountant`] counts failed attempts per shard and publishes a
//! [`ReconnectFailureEvent`] for each; [`ShardReconnector`] drives a
//! reconnect loop from those events.

pub mod builder;
pub mod bus;
pub mod gateway;
pub mod handshake;
pub mod reconnect;
pub mod registry;
pub mod types;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use builder::{JoinRequest, JoinRequestBuilder, DEFAULT_JOIN_TIMEOUT};
pub use bus::MemoryEventBus;
pub use gateway::{CommandSink, EventSource, SelfIdentity};
pub use handshake::HandshakeCoordinator;
pub use reconnect::{
    ReconnectAccountant, ReconnectBackoff, ReconnectError, ReconnectFailureEvent, ShardReconnector,
};
pub use registry::SessionRegistry;
pub use types::{
    JoinError, Session, SessionInfo, SessionState, TransportError, VoiceServerOptions,
};

// Protocol types so callers don't need a direct vl-protocol import.
pub use vl_protocol::{
    shard_for, ShardPayload, Snowflake, VoiceServerEvent, VoiceStateEvent, VoiceStateUpdate,
};
