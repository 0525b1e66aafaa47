use std::sync::Arc;
use std::time::Duration;

use vl_domain::config::Config;
use vl_voice::{HandshakeCoordinator, JoinRequest, MemoryEventBus, SessionInfo, Snowflake};

use crate::loopback::LoopbackGateway;

/// Self id the loopback client claims.
pub const LOOPBACK_SELF_ID: Snowflake = Snowflake::new(1_000_000);

#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub guild: Snowflake,
    pub channel: Snowflake,
    pub no_server: bool,
    pub timeout: Option<Duration>,
}

/// Join once against a loopback gateway, then leave.  Returns the session
/// snapshot taken while it was connected.
pub async fn simulate(config: &Config, opts: &SimulateOptions) -> anyhow::Result<SessionInfo> {
    let bus = Arc::new(MemoryEventBus::default());
    let shard_count = config.gateway.shard_count;
    let mut gateway = LoopbackGateway::new(bus.clone(), LOOPBACK_SELF_ID, shard_count);
    if opts.no_server {
        gateway = gateway.without_server();
    }
    let voice = HandshakeCoordinator::new(bus, Arc::new(gateway), Arc::new(Some(LOOPBACK_SELF_ID)));

    let mut builder = JoinRequest::builder(opts.guild, opts.channel).defaults_from(&config.voice);
    if let Some(timeout) = opts.timeout {
        builder = builder.timeout(timeout);
    }
    let request = builder.build()?;

    let session = voice.join(&request).await?;
    let info = session.info();
    voice.disconnect(opts.guild).await?;
    Ok(info)
}

pub async fn run(config: &Config, opts: SimulateOptions) -> anyhow::Result<()> {
    let info = simulate(config, &opts).await?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
