use serde::Serialize;

/// Structured trace events emitted across the voxlink crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    VoiceJoinRequested {
        guild_id: u64,
        channel_id: u64,
        shard_id: u32,
        existing_session: bool,
    },
    VoiceHandshakeCompleted {
        guild_id: u64,
        shard_id: u32,
        endpoint: String,
        duration_ms: u64,
    },
    VoiceHandshakeFailed {
        guild_id: u64,
        shard_id: u32,
        reason: String,
    },
    VoiceSessionRaceLost {
        guild_id: u64,
    },
    VoiceSessionEvicted {
        guild_id: u64,
    },
    VoiceCleanupFailed {
        guild_id: u64,
        error: String,
    },
    ShardReconnectFailed {
        shard_id: u32,
        current_attempt: u32,
        max_attempts: u32,
        abandoned: bool,
    },
    ShardReconnected {
        shard_id: u32,
        attempts: u32,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "vl_event");
    }
}
