//! Voice handshake coordinator.
//!
//! Joining a voice channel takes one command and two confirmations that
//! arrive independently on the gateway:
//!
//! 1. Send a voice state update to the shard that owns the guild.
//! 2. Wait for our own voice state echo (carries the session id) **and**
//!    the voice server assignment (carries endpoint + token), in any order.
//! 3. Register the resulting [`Session`] in the [`SessionRegistry`].
//!
//! Both subscriptions exist before the command is sent and are awaited
//! concurrently under one deadline.  Any failure after the command went
//! out drops both subscriptions, sends a leave command and evicts the
//! guild, then reports the original error.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::Instrument;
use vl_domain::trace::TraceEvent;
use vl_protocol::{
    shard_for, ShardPayload, Snowflake, VoiceServerEvent, VoiceStateEvent, VoiceStateUpdate,
};

use crate::builder::JoinRequest;
use crate::gateway::{CommandSink, EventSource, SelfIdentity};
use crate::registry::SessionRegistry;
use crate::types::{JoinError, Session, TransportError, VoiceServerOptions};

/// Coordinates voice joins against one gateway.
///
/// Cheap to share behind an `Arc`; concurrent joins for different guilds
/// proceed independently.
pub struct HandshakeCoordinator {
    events: Arc<dyn EventSource>,
    commands: Arc<dyn CommandSink>,
    identity: Arc<dyn SelfIdentity>,
    registry: Arc<SessionRegistry>,
}

/// Partial results of one join attempt.  Each slot fills at most once.
#[derive(Default)]
struct PendingHandshake {
    state: Option<VoiceStateEvent>,
    server: Option<VoiceServerEvent>,
}

impl PendingHandshake {
    fn ready(&mut self) -> Option<(VoiceStateEvent, VoiceServerEvent)> {
        if self.state.is_some() && self.server.is_some() {
            Some((self.state.take()?, self.server.take()?))
        } else {
            None
        }
    }
}

struct CompletedHandshake {
    self_id: Snowflake,
    state: VoiceStateEvent,
    server: VoiceServerEvent,
}

impl HandshakeCoordinator {
    pub fn new(
        events: Arc<dyn EventSource>,
        commands: Arc<dyn CommandSink>,
        identity: Arc<dyn SelfIdentity>,
    ) -> Self {
        Self {
            events,
            commands,
            identity,
            registry: Arc::new(SessionRegistry::new()),
        }
    }

    /// Share an existing registry instead of the private one `new` creates.
    pub fn with_registry(mut self, registry: Arc<SessionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn session(&self, guild_id: Snowflake) -> Option<Arc<Session>> {
        self.registry.get(guild_id)
    }

    /// The shard that owns `guild_id` on this gateway.
    pub fn shard_id(&self, guild_id: Snowflake) -> u32 {
        shard_for(guild_id, self.commands.shard_count())
    }

    /// Join (or move within) a voice channel.
    ///
    /// If the guild already has a registered session the command is still
    /// sent, the call waits for the state echo only and returns the existing
    /// session unchanged.  That path has no deadline of its own; wrap the
    /// call in [`tokio::time::timeout`] to bound it.
    ///
    /// The registry lookup and the command send are not atomic.  Two joins
    /// racing for the same guild both send and both wait; whichever
    /// registers first wins and the other resolves to the winner.
    ///
    /// Cleanup runs only on failures this call observes.  Dropping the
    /// future mid-handshake (an outer timeout, `select!`, task abort)
    /// releases both subscriptions but sends no leave command; callers that
    /// abort a join this way should follow up with [`Self::disconnect`].
    pub async fn join(&self, request: &JoinRequest) -> Result<Arc<Session>, JoinError> {
        let guild_id = request.guild_id;
        let shard_id = self.shard_id(guild_id);
        let span = tracing::info_span!("voice_join", guild_id = %guild_id, shard_id);

        async move {
            let existing = self.registry.get(guild_id);
            TraceEvent::VoiceJoinRequested {
                guild_id: guild_id.get(),
                channel_id: request.channel_id.get(),
                shard_id,
                existing_session: existing.is_some(),
            }
            .emit();

            match existing {
                Some(session) => self.refresh(request, shard_id, session).await,
                None => self.establish(request, shard_id).await,
            }
        }
        .instrument(span)
        .await
    }

    /// Leave the guild's voice channel and evict its session.
    ///
    /// Eviction happens even when the leave command cannot be sent.  Returns
    /// whether a session was evicted.  Safe to call repeatedly and
    /// concurrently.
    pub async fn disconnect(&self, guild_id: Snowflake) -> Result<bool, TransportError> {
        let command = ShardPayload::voice_state_update(
            VoiceStateUpdate::leave(guild_id),
            self.commands.shard_count(),
        );
        let shard_id = command.shard_id;
        let sent = self.send(command).await;
        let evicted = self.registry.evict(guild_id);
        tracing::debug!(guild_id = %guild_id, shard_id, evicted, "voice disconnect");
        sent.map(|()| evicted)
    }

    /// Wait for the next voice server assignment for `guild_id` that carries
    /// an endpoint.  The gateway sends one whenever it moves the session to
    /// another voice server.
    pub async fn next_server_update(
        &self,
        guild_id: Snowflake,
    ) -> Result<VoiceServerOptions, JoinError> {
        let mut servers = self.events.voice_server_updates();
        loop {
            let Some(ev) = accept(servers.recv().await, "voice_server")? else {
                continue;
            };
            if ev.guild_id != guild_id {
                continue;
            }
            if let Some(endpoint) = ev.endpoint {
                return Ok(VoiceServerOptions {
                    endpoint,
                    token: ev.token,
                });
            }
        }
    }

    // ── Join paths ──────────────────────────────────────────────────

    async fn refresh(
        &self,
        request: &JoinRequest,
        shard_id: u32,
        existing: Arc<Session>,
    ) -> Result<Arc<Session>, JoinError> {
        let self_id = self.identity.self_id().await.ok_or(JoinError::MissingSelfId)?;
        let mut states = self.events.voice_state_updates();

        self.send(ShardPayload {
            shard_id,
            payload: request.command(),
        })
        .await?;

        wait_for_state_echo(&mut states, request.guild_id, self_id).await?;
        tracing::debug!("voice state echo received for existing session");
        Ok(existing)
    }

    async fn establish(
        &self,
        request: &JoinRequest,
        shard_id: u32,
    ) -> Result<Arc<Session>, JoinError> {
        let guild_id = request.guild_id;
        let started = Instant::now();

        // Subscribe first: events published between the send and the wait
        // are buffered in the receivers instead of lost.
        let states = self.events.voice_state_updates();
        let servers = self.events.voice_server_updates();

        self.send(ShardPayload {
            shard_id,
            payload: request.command(),
        })
        .await?;

        // Dropping the timed-out future drops both receivers, so no late
        // event can complete this attempt once cleanup starts.
        let outcome = match tokio::time::timeout(
            request.timeout,
            self.rendezvous(guild_id, states, servers),
        )
        .await
        {
            Ok(result) => result,
            Err(_elapsed) => Err(JoinError::Timeout(request.timeout)),
        };

        let done = match outcome {
            Ok(done) => done,
            Err(e) => {
                tracing::warn!(error = %e, "voice handshake failed");
                TraceEvent::VoiceHandshakeFailed {
                    guild_id: guild_id.get(),
                    shard_id,
                    reason: e.to_string(),
                }
                .emit();
                self.cleanup(guild_id).await;
                return Err(e);
            }
        };

        let endpoint = done.server.endpoint.unwrap_or_default();
        TraceEvent::VoiceHandshakeCompleted {
            guild_id: guild_id.get(),
            shard_id,
            endpoint: endpoint.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();

        let session = Session::new(
            guild_id,
            done.state.channel_id.unwrap_or(request.channel_id),
            done.self_id,
            shard_id,
            done.state.session_id,
            VoiceServerOptions {
                endpoint,
                token: done.server.token,
            },
        );
        match self.registry.try_register(session) {
            Ok(registered) => Ok(registered),
            Err(winner) => {
                tracing::debug!("lost registration race, using existing session");
                TraceEvent::VoiceSessionRaceLost {
                    guild_id: guild_id.get(),
                }
                .emit();
                Ok(winner)
            }
        }
    }

    /// Resolve our identity, then wait until both confirmations are in.
    async fn rendezvous(
        &self,
        guild_id: Snowflake,
        mut states: broadcast::Receiver<VoiceStateEvent>,
        mut servers: broadcast::Receiver<VoiceServerEvent>,
    ) -> Result<CompletedHandshake, JoinError> {
        let self_id = self.identity.self_id().await.ok_or(JoinError::MissingSelfId)?;
        let mut pending = PendingHandshake::default();

        loop {
            tokio::select! {
                received = states.recv(), if pending.state.is_none() => {
                    if let Some(ev) = accept(received, "voice_state")? {
                        if is_own_state(&ev, guild_id, self_id) {
                            tracing::debug!(session_id = %ev.session_id, "voice state received");
                            pending.state = Some(ev);
                        }
                    }
                }
                received = servers.recv(), if pending.server.is_none() => {
                    if let Some(ev) = accept(received, "voice_server")? {
                        if ev.guild_id == guild_id {
                            if ev.endpoint.is_some() {
                                tracing::debug!("voice server received");
                                pending.server = Some(ev);
                            } else {
                                tracing::debug!("voice server update without endpoint, waiting");
                            }
                        }
                    }
                }
            }

            if let Some((state, server)) = pending.ready() {
                return Ok(CompletedHandshake {
                    self_id,
                    state,
                    server,
                });
            }
        }
    }

    /// Best-effort teardown after a failed handshake.  Errors are logged,
    /// never returned: the caller reports the failure that triggered it.
    async fn cleanup(&self, guild_id: Snowflake) {
        if let Err(e) = self.disconnect(guild_id).await {
            tracing::warn!(guild_id = %guild_id, error = %e, "voice cleanup failed");
            TraceEvent::VoiceCleanupFailed {
                guild_id: guild_id.get(),
                error: e.to_string(),
            }
            .emit();
        }
    }

    async fn send(&self, command: ShardPayload) -> Result<(), TransportError> {
        let shard_id = command.shard_id;
        self.commands.send(command).await.map_err(|e| {
            tracing::warn!(shard_id, error = %e, "voice state update not sent");
            e
        })
    }
}

fn is_own_state(ev: &VoiceStateEvent, guild_id: Snowflake, self_id: Snowflake) -> bool {
    ev.user_id == self_id && ev.guild_id == guild_id
}

/// Unwrap one broadcast delivery.  A lagged subscriber keeps waiting; a
/// closed stream ends the wait.
fn accept<T>(received: Result<T, RecvError>, stream: &'static str) -> Result<Option<T>, JoinError> {
    match received {
        Ok(ev) => Ok(Some(ev)),
        Err(RecvError::Lagged(skipped)) => {
            tracing::warn!(stream, skipped, "event subscription lagged");
            Ok(None)
        }
        Err(RecvError::Closed) => Err(JoinError::EventSourceClosed(stream)),
    }
}

async fn wait_for_state_echo(
    states: &mut broadcast::Receiver<VoiceStateEvent>,
    guild_id: Snowflake,
    self_id: Snowflake,
) -> Result<VoiceStateEvent, JoinError> {
    loop {
        if let Some(ev) = accept(states.recv().await, "voice_state")? {
            if is_own_state(&ev, guild_id, self_id) {
                return Ok(ev);
            }
        }
    }
}
