//! Seams to the gateway: where events come from, where commands go, and
//! who "we" are.
//!
//! The transport behind these traits (WebSocket shards, REST, replay from
//! a log) is the embedding application's business.

use tokio::sync::{broadcast, watch};
use vl_protocol::{ShardPayload, Snowflake, VoiceServerEvent, VoiceStateEvent};

use crate::types::TransportError;

/// A live, multi-subscriber source of gateway events.
///
/// Each call returns a fresh subscription that sees every event published
/// after the call.  Dropping the receiver cancels the subscription.
pub trait EventSource: Send + Sync + 'static {
    fn voice_state_updates(&self) -> broadcast::Receiver<VoiceStateEvent>;
    fn voice_server_updates(&self) -> broadcast::Receiver<VoiceServerEvent>;
}

/// Delivers a command to one shard of the gateway.
#[async_trait::async_trait]
pub trait CommandSink: Send + Sync + 'static {
    /// Number of shards commands are routed across.
    fn shard_count(&self) -> u32;

    /// Send `command` to `command.shard_id`.  Resolves once the transport
    /// has accepted it.
    async fn send(&self, command: ShardPayload) -> Result<(), TransportError>;
}

/// Resolves the user id of this client.  Queried once per join attempt.
#[async_trait::async_trait]
pub trait SelfIdentity: Send + Sync + 'static {
    async fn self_id(&self) -> Option<Snowflake>;
}

#[async_trait::async_trait]
impl SelfIdentity for Option<Snowflake> {
    async fn self_id(&self) -> Option<Snowflake> {
        *self
    }
}

/// Identity that becomes known later (e.g. once the gateway's ready event
/// arrives).  Reads the current value without waiting.
#[async_trait::async_trait]
impl SelfIdentity for watch::Receiver<Option<Snowflake>> {
    async fn self_id(&self) -> Option<Snowflake> {
        *self.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_identity() {
        let id: Option<Snowflake> = Some(Snowflake::new(9));
        assert_eq!(id.self_id().await, Some(Snowflake::new(9)));
        assert_eq!(None::<Snowflake>.self_id().await, None);
    }

    #[tokio::test]
    async fn watch_identity_tracks_latest_value() {
        let (tx, rx) = watch::channel(None);
        assert_eq!(rx.self_id().await, None);
        tx.send(Some(Snowflake::new(11))).unwrap();
        assert_eq!(rx.self_id().await, Some(Snowflake::new(11)));
    }
}
