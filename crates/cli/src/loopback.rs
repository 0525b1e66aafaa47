//! Loopback gateway: a [`CommandSink`] that answers its own commands on a
//! [`MemoryEventBus`], the way a real gateway would after a round trip.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use vl_voice::{
    CommandSink, MemoryEventBus, ShardPayload, Snowflake, TransportError, VoiceServerEvent,
    VoiceStateEvent,
};

pub const LOOPBACK_ENDPOINT: &str = "loopback.voxlink.invalid:443";

pub struct LoopbackGateway {
    bus: Arc<MemoryEventBus>,
    self_id: Snowflake,
    shard_count: u32,
    assign_server: bool,
    sessions: AtomicU64,
}

impl LoopbackGateway {
    pub fn new(bus: Arc<MemoryEventBus>, self_id: Snowflake, shard_count: u32) -> Self {
        Self {
            bus,
            self_id,
            shard_count,
            assign_server: true,
            sessions: AtomicU64::new(0),
        }
    }

    /// Stop answering joins with a voice server assignment.
    pub fn without_server(mut self) -> Self {
        self.assign_server = false;
        self
    }
}

#[async_trait::async_trait]
impl CommandSink for LoopbackGateway {
    fn shard_count(&self) -> u32 {
        self.shard_count
    }

    async fn send(&self, command: ShardPayload) -> Result<(), TransportError> {
        if command.shard_id >= self.shard_count.max(1) {
            return Err(TransportError::ShardUnavailable {
                shard_id: command.shard_id,
            });
        }

        let update = command.payload;
        tracing::debug!(
            shard_id = command.shard_id,
            guild_id = %update.guild_id,
            leave = update.is_leave(),
            "loopback received voice state update"
        );

        let n = self.sessions.fetch_add(1, Ordering::Relaxed);
        self.bus.publish_state(VoiceStateEvent {
            guild_id: update.guild_id,
            user_id: self.self_id,
            channel_id: update.channel_id,
            session_id: format!("loopback-{n}"),
        });

        if update.is_leave() || !self.assign_server {
            return Ok(());
        }

        // First assignment has no endpoint yet, like a server still being allocated.
        self.bus.publish_server(VoiceServerEvent {
            guild_id: update.guild_id,
            endpoint: None,
            token: String::new(),
        });
        self.bus.publish_server(VoiceServerEvent {
            guild_id: update.guild_id,
            endpoint: Some(LOOPBACK_ENDPOINT.into()),
            token: format!("token-{n}"),
        });
        Ok(())
    }
}
