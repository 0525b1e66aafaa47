//! Shard reconnect accounting: jittered exponential back-off, per-shard
//! failed-attempt counters, and the abandonment decision.
//!
//! Every failed attempt produces a [`ReconnectFailureEvent`], whether or not
//! the shard will be retried.  Use
//! [`ReconnectFailureEvent::is_shard_abandoned`] to tell the two apart.

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use vl_domain::config::ReconnectConfig;
use vl_domain::trace::TraceEvent;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Back-off
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Delay schedule between reconnect attempts.
///
/// The wait after failed attempt `n` is `initial_delay * backoff_factor^(n-1)`
/// capped at `max_delay`, stretched by up to 25% jitter.  The jitter is a
/// function of shard and attempt, so every shard of a gateway that dropped
/// at once gets its own retry schedule.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    pub initial_delay: Duration,
    /// Cap applied before jitter.
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::from_config(&ReconnectConfig::default())
    }
}

impl ReconnectBackoff {
    pub fn from_config(cfg: &ReconnectConfig) -> Self {
        Self {
            initial_delay: cfg.initial_delay(),
            max_delay: cfg.max_delay(),
            backoff_factor: cfg.backoff_factor,
        }
    }

    /// How long to wait before retrying the shard that produced `event`.
    pub fn delay_after(&self, event: &ReconnectFailureEvent) -> Duration {
        let base = self.base_delay(event.current_attempt.saturating_sub(1));
        base.mul_f64(1.0 + JITTER * jitter_fraction(event.shard_id, event.current_attempt))
    }

    /// Capped delay before jitter for the 0-indexed retry.
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        // NaN or negative factors from a bad config fall back to the cap.
        Duration::try_from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
            .unwrap_or(self.max_delay)
    }
}

const JITTER: f64 = 0.25;

/// Deterministic fraction in [0, 1) for one shard's attempt (splitmix64
/// finalizer over the pair).
fn jitter_fraction(shard_id: u32, attempt: u32) -> f64 {
    let mut x = (u64::from(shard_id) << 32) | u64::from(attempt);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^= x >> 31;
    (x >> 11) as f64 / (1u64 << 53) as f64
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Failure events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Published for every failed reconnect attempt of a shard.
///
/// This does not by itself mean the shard is gone; check
/// [`is_shard_abandoned`](Self::is_shard_abandoned).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconnectFailureEvent {
    pub shard_id: u32,
    /// The attempt that just failed, starting at 1.
    pub current_attempt: u32,
    pub max_attempts: u32,
}

impl ReconnectFailureEvent {
    /// Whether no further reconnects will be attempted.
    ///
    /// True only once the counter is strictly greater than `max_attempts`:
    /// the attempt numbered exactly `max_attempts` is still retried, so a
    /// loop that stops on abandonment fails `max_attempts + 1` times.
    /// Consumers rely on that extra attempt.
    pub fn is_shard_abandoned(&self) -> bool {
        self.current_attempt > self.max_attempts
    }
}

impl fmt::Display for ReconnectFailureEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shard {} failed reconnect attempt {}/{}",
            self.shard_id, self.current_attempt, self.max_attempts
        )
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Accountant
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-shard failed-attempt counters.
///
/// Counters are atomics; the abandonment decision is derived from the
/// value the increment returned, so concurrent failures on one shard each
/// observe a distinct attempt number.
pub struct ReconnectAccountant {
    max_attempts: u32,
    backoff: ReconnectBackoff,
    counters: RwLock<HashMap<u32, Arc<AtomicU32>>>,
    events: broadcast::Sender<ReconnectFailureEvent>,
}

impl ReconnectAccountant {
    pub fn new(max_attempts: u32) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            max_attempts,
            backoff: ReconnectBackoff::default(),
            counters: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn from_config(cfg: &ReconnectConfig) -> Self {
        Self::new(cfg.max_attempts).with_backoff(ReconnectBackoff::from_config(cfg))
    }

    pub fn with_backoff(mut self, backoff: ReconnectBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Subscribe to failure events for every shard.
    pub fn subscribe(&self) -> broadcast::Receiver<ReconnectFailureEvent> {
        self.events.subscribe()
    }

    /// Count a failed reconnect attempt and publish the resulting event.
    pub fn record_failure(&self, shard_id: u32) -> ReconnectFailureEvent {
        let current_attempt = self.counter(shard_id).fetch_add(1, Ordering::SeqCst) + 1;
        let event = ReconnectFailureEvent {
            shard_id,
            current_attempt,
            max_attempts: self.max_attempts,
        };

        TraceEvent::ShardReconnectFailed {
            shard_id,
            current_attempt,
            max_attempts: self.max_attempts,
            abandoned: event.is_shard_abandoned(),
        }
        .emit();

        // No subscribers is fine.
        let _ = self.events.send(event);
        event
    }

    /// Reset the shard's counter after a successful reconnect.
    pub fn record_success(&self, shard_id: u32) {
        let previous = self.counter(shard_id).swap(0, Ordering::SeqCst);
        if previous > 0 {
            TraceEvent::ShardReconnected {
                shard_id,
                attempts: previous,
            }
            .emit();
        }
    }

    pub fn current_attempt(&self, shard_id: u32) -> u32 {
        self.counters
            .read()
            .get(&shard_id)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Back-off before retrying after `event`.
    pub fn delay_for(&self, event: &ReconnectFailureEvent) -> Duration {
        self.backoff.delay_after(event)
    }

    fn counter(&self, shard_id: u32) -> Arc<AtomicU32> {
        if let Some(counter) = self.counters.read().get(&shard_id) {
            return counter.clone();
        }
        self.counters
            .write()
            .entry(shard_id)
            .or_insert_with(|| Arc::new(AtomicU32::new(0)))
            .clone()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reconnect loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(thiserror::Error, Debug)]
pub enum ReconnectError {
    #[error("shard abandoned: {0}")]
    Abandoned(ReconnectFailureEvent),
    #[error("shutdown")]
    Shutdown,
}

/// Drives a shard's reconnect attempts through a [`ReconnectAccountant`].
#[derive(Clone)]
pub struct ShardReconnector {
    accountant: Arc<ReconnectAccountant>,
}

impl ShardReconnector {
    pub fn new(accountant: Arc<ReconnectAccountant>) -> Self {
        Self { accountant }
    }

    pub fn accountant(&self) -> &Arc<ReconnectAccountant> {
        &self.accountant
    }

    /// Call `connect` until it succeeds, the shard is abandoned, or
    /// `shutdown` is cancelled.  `connect` receives the 1-based attempt
    /// number.
    pub async fn run<F, Fut, T, E>(
        &self,
        shard_id: u32,
        mut connect: F,
        shutdown: &CancellationToken,
    ) -> Result<T, ReconnectError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        loop {
            if shutdown.is_cancelled() {
                return Err(ReconnectError::Shutdown);
            }

            let attempt = self.accountant.current_attempt(shard_id) + 1;
            let result = tokio::select! {
                r = connect(attempt) => r,
                _ = shutdown.cancelled() => return Err(ReconnectError::Shutdown),
            };

            let err = match result {
                Ok(value) => {
                    tracing::info!(shard_id, attempt, "shard reconnected");
                    self.accountant.record_success(shard_id);
                    return Ok(value);
                }
                Err(e) => e,
            };

            let event = self.accountant.record_failure(shard_id);
            if event.is_shard_abandoned() {
                tracing::error!(
                    shard_id,
                    attempts = event.current_attempt,
                    max_attempts = event.max_attempts,
                    error = %err,
                    "shard abandoned"
                );
                return Err(ReconnectError::Abandoned(event));
            }

            let delay = self.accountant.delay_for(&event);
            tracing::warn!(
                shard_id,
                attempt = event.current_attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "shard reconnect failed, retrying"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => return Err(ReconnectError::Shutdown),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_backoff() -> ReconnectBackoff {
        ReconnectBackoff {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
        }
    }

    #[test]
    fn delays_follow_recorded_failures_until_capped() {
        let acct = ReconnectAccountant::new(10).with_backoff(fast_backoff());
        for expected_ms in [100u64, 200, 400, 800, 1000, 1000] {
            let ev = acct.record_failure(3);
            let delay = acct.delay_for(&ev);
            let floor = Duration::from_millis(expected_ms);
            assert!(delay >= floor, "attempt {}: {delay:?} < {floor:?}", ev.current_attempt);
            assert!(delay <= floor.mul_f64(1.25), "attempt {}: {delay:?}", ev.current_attempt);
        }
    }

    #[test]
    fn delay_restarts_after_success() {
        let acct = ReconnectAccountant::new(10).with_backoff(fast_backoff());
        for _ in 0..4 {
            acct.record_failure(0);
        }
        acct.record_success(0);
        let ev = acct.record_failure(0);
        assert!(acct.delay_for(&ev) <= Duration::from_millis(125));
    }

    #[test]
    fn shards_dropped_together_spread_out() {
        let backoff = ReconnectBackoff::default();
        let delays: std::collections::HashSet<Duration> = (0..16)
            .map(|shard_id| {
                backoff.delay_after(&ReconnectFailureEvent {
                    shard_id,
                    current_attempt: 1,
                    max_attempts: 5,
                })
            })
            .collect();
        assert!(delays.len() > 1);
    }

    #[test]
    fn bad_factor_falls_back_to_cap() {
        let backoff = ReconnectBackoff {
            backoff_factor: -3.0,
            ..fast_backoff()
        };
        assert_eq!(backoff.base_delay(1), Duration::from_secs(1));
        assert_eq!(backoff.base_delay(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn abandonment_boundary() {
        let max = 3;
        for a in 0..=max {
            let ev = ReconnectFailureEvent {
                shard_id: 0,
                current_attempt: a,
                max_attempts: max,
            };
            assert!(!ev.is_shard_abandoned(), "attempt {a} must not be abandoned");
        }
        for a in (max + 1)..(max + 5) {
            let ev = ReconnectFailureEvent {
                shard_id: 0,
                current_attempt: a,
                max_attempts: max,
            };
            assert!(ev.is_shard_abandoned(), "attempt {a} must be abandoned");
        }
    }

    #[test]
    fn sequential_failures_abandon_on_the_fourth() {
        let acct = ReconnectAccountant::new(3);
        let seen: Vec<(u32, bool)> = (0..4)
            .map(|_| {
                let ev = acct.record_failure(2);
                (ev.current_attempt, ev.is_shard_abandoned())
            })
            .collect();
        assert_eq!(seen, vec![(1, false), (2, false), (3, false), (4, true)]);
    }

    #[test]
    fn success_resets_counter() {
        let acct = ReconnectAccountant::new(3);
        acct.record_failure(0);
        acct.record_failure(0);
        acct.record_success(0);
        assert_eq!(acct.current_attempt(0), 0);
        assert_eq!(acct.record_failure(0).current_attempt, 1);
    }

    #[test]
    fn shards_are_counted_independently() {
        let acct = ReconnectAccountant::new(1);
        acct.record_failure(0);
        acct.record_failure(0);
        assert_eq!(acct.current_attempt(0), 2);
        assert_eq!(acct.current_attempt(1), 0);
        assert_eq!(acct.record_failure(1).current_attempt, 1);
    }

    #[tokio::test]
    async fn subscribers_see_every_failure() {
        let acct = ReconnectAccountant::new(1);
        let mut rx = acct.subscribe();
        acct.record_failure(5);
        acct.record_failure(5);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(!first.is_shard_abandoned());
        assert!(second.is_shard_abandoned());
        assert_eq!(second.shard_id, 5);
    }

    #[test]
    fn concurrent_failures_get_distinct_attempts() {
        let acct = Arc::new(ReconnectAccountant::new(100));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let acct = acct.clone();
                std::thread::spawn(move || acct.record_failure(0).current_attempt)
            })
            .collect();
        let mut attempts: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        attempts.sort();
        assert_eq!(attempts, (1..=8).collect::<Vec<_>>());
    }
}
