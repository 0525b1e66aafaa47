use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Voice
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Defaults applied to voice joins that don't override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Maximum time to wait for both handshake events.  A join can stall
    /// when the client lacks permission to view the channel or the channel
    /// is full.
    #[serde(default = "d_join_timeout_secs")]
    pub join_timeout_secs: u64,
    #[serde(default)]
    pub self_mute: bool,
    #[serde(default)]
    pub self_deaf: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            join_timeout_secs: d_join_timeout_secs(),
            self_mute: false,
            self_deaf: false,
        }
    }
}

impl VoiceConfig {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }
}

fn d_join_timeout_secs() -> u64 {
    5
}
