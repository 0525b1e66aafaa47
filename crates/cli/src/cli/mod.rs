pub mod config;
pub mod reconnect;
pub mod shard;
pub mod simulate;

use clap::{Parser, Subcommand};
use vl_voice::Snowflake;

/// voxlink: voice handshake coordination for sharded gateways.
#[derive(Debug, Parser)]
#[command(name = "voxlink", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show which shard owns a guild.
    Shard {
        /// Guild id.
        guild_id: Snowflake,
        /// Shard count override (defaults to `gateway.shard_count`).
        #[arg(long)]
        shards: Option<u32>,
    },
    /// Run a voice join against an in-process loopback gateway.
    Simulate {
        /// Guild to join.
        #[arg(long, default_value = "81384788765712384")]
        guild: Snowflake,
        /// Voice channel to join.
        #[arg(long, default_value = "1")]
        channel: Snowflake,
        /// Never send a voice server assignment (demonstrates the timeout path).
        #[arg(long)]
        no_server: bool,
        /// Join timeout override in seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Drive a reconnect loop against a shard that fails a fixed number of times.
    Reconnect {
        /// Shard id.
        #[arg(long, default_value_t = 0)]
        shard: u32,
        /// Number of connect attempts that fail before one succeeds.
        #[arg(long, default_value_t = 2)]
        failures: u32,
        /// Max attempts override (defaults to `reconnect.max_attempts`).
        #[arg(long)]
        max_attempts: Option<u32>,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `VL_CONFIG` (or `voxlink.toml`
/// by default).  Returns the parsed config and the path that was used.
pub fn load_config() -> anyhow::Result<(vl_domain::config::Config, String)> {
    let config_path = std::env::var("VL_CONFIG").unwrap_or_else(|_| "voxlink.toml".into());

    let config = vl_domain::config::Config::load_or_default(&config_path)
        .map_err(|e| anyhow::anyhow!("loading {config_path}: {e}"))?;

    Ok((config, config_path))
}
