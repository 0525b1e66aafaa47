use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Gateway
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Number of shards the control connection is split into.  Commands
    /// for a guild go to `(guild_id >> 22) % shard_count`.
    #[serde(default = "d_shard_count")]
    pub shard_count: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            shard_count: d_shard_count(),
        }
    }
}

fn d_shard_count() -> u32 {
    1
}
