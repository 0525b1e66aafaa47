use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use vl_domain::config::Config;
use vl_voice::{ReconnectAccountant, ReconnectBackoff, ReconnectError, ShardReconnector};

/// Outcome of a simulated reconnect run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectReport {
    /// Connect attempts made, including the successful one.
    pub attempts: u32,
    pub abandoned: bool,
}

/// Reconnect a simulated shard that refuses the first `failures` attempts.
/// Ctrl-C stops the loop between attempts.
pub async fn simulate(
    config: &Config,
    shard_id: u32,
    failures: u32,
    max_attempts: Option<u32>,
    shutdown: &CancellationToken,
) -> anyhow::Result<ReconnectReport> {
    let max = max_attempts.unwrap_or(config.reconnect.max_attempts);
    let accountant = ReconnectAccountant::new(max)
        .with_backoff(ReconnectBackoff::from_config(&config.reconnect));
    let reconnector = ShardReconnector::new(Arc::new(accountant));

    let mut events = reconnector.accountant().subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("{event}");
        }
    });

    let result = reconnector
        .run(
            shard_id,
            |attempt| async move {
                if attempt <= failures {
                    Err(format!("connection refused (attempt {attempt})"))
                } else {
                    Ok(attempt)
                }
            },
            shutdown,
        )
        .await;

    drop(reconnector);
    let _ = printer.await;

    match result {
        Ok(attempts) => Ok(ReconnectReport {
            attempts,
            abandoned: false,
        }),
        Err(ReconnectError::Abandoned(event)) => Ok(ReconnectReport {
            attempts: event.current_attempt,
            abandoned: true,
        }),
        Err(e @ ReconnectError::Shutdown) => Err(e.into()),
    }
}

pub async fn run(
    config: &Config,
    shard_id: u32,
    failures: u32,
    max_attempts: Option<u32>,
) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let report = simulate(config, shard_id, failures, max_attempts, &shutdown).await?;
    if report.abandoned {
        println!("shard {shard_id} abandoned after {} attempt(s)", report.attempts);
    } else {
        println!("shard {shard_id} connected on attempt {}", report.attempts);
    }
    Ok(())
}
