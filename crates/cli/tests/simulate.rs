use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vl_cli::cli::reconnect::{self, ReconnectReport};
use vl_cli::cli::simulate::{simulate, SimulateOptions, LOOPBACK_SELF_ID};
use vl_cli::loopback::{LoopbackGateway, LOOPBACK_ENDPOINT};
use vl_domain::config::Config;
use vl_voice::{
    CommandSink, EventSource, MemoryEventBus, SessionState, ShardPayload, Snowflake,
    TransportError, VoiceStateUpdate,
};

fn options(no_server: bool) -> SimulateOptions {
    SimulateOptions {
        guild: Snowflake::new(81_384_788_765_712_384),
        channel: Snowflake::new(1),
        no_server,
        timeout: Some(Duration::from_secs(1)),
    }
}

#[tokio::test]
async fn simulate_joins_through_loopback() {
    let info = simulate(&Config::default(), &options(false)).await.unwrap();
    assert_eq!(info.endpoint, LOOPBACK_ENDPOINT);
    assert_eq!(info.self_id, LOOPBACK_SELF_ID);
    assert_eq!(info.channel_id, Snowflake::new(1));
    assert_eq!(info.state, SessionState::Connected);
}

#[tokio::test]
async fn simulate_routes_across_configured_shards() {
    let mut config = Config::default();
    config.gateway.shard_count = 4;
    let opts = options(false);
    let info = simulate(&config, &opts).await.unwrap();
    assert_eq!(info.shard_id, vl_voice::shard_for(opts.guild, 4));
}

#[tokio::test(start_paused = true)]
async fn simulate_without_server_times_out() {
    let err = simulate(&Config::default(), &options(true)).await.unwrap_err();
    let join = err.downcast_ref::<vl_voice::JoinError>().unwrap();
    assert!(matches!(join, vl_voice::JoinError::Timeout(_)));
}

#[tokio::test]
async fn loopback_rejects_unknown_shard() {
    let bus = Arc::new(MemoryEventBus::default());
    let gateway = LoopbackGateway::new(bus, LOOPBACK_SELF_ID, 2);
    let err = gateway
        .send(ShardPayload {
            shard_id: 5,
            payload: VoiceStateUpdate::leave(Snowflake::new(1)),
        })
        .await
        .unwrap_err();
    assert_eq!(err, TransportError::ShardUnavailable { shard_id: 5 });
}

#[tokio::test]
async fn loopback_leave_echoes_state_only() {
    let bus = Arc::new(MemoryEventBus::default());
    let mut states = bus.voice_state_updates();
    let mut servers = bus.voice_server_updates();
    let gateway = LoopbackGateway::new(bus.clone(), LOOPBACK_SELF_ID, 1);

    gateway
        .send(ShardPayload {
            shard_id: 0,
            payload: VoiceStateUpdate::leave(Snowflake::new(3)),
        })
        .await
        .unwrap();

    let echo = states.try_recv().unwrap();
    assert_eq!(echo.channel_id, None);
    assert!(servers.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn reconnect_succeeds_after_failures() {
    let report = reconnect::simulate(&Config::default(), 0, 2, Some(5), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        report,
        ReconnectReport {
            attempts: 3,
            abandoned: false
        }
    );
}

#[tokio::test(start_paused = true)]
async fn reconnect_abandons_past_max_attempts() {
    let report = reconnect::simulate(&Config::default(), 1, 10, Some(3), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        report,
        ReconnectReport {
            attempts: 4,
            abandoned: true
        }
    );
}
