//! Registry of established voice sessions, at most one per guild.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use vl_domain::trace::TraceEvent;
use vl_protocol::Snowflake;

use crate::types::{Session, SessionInfo};

/// Thread-safe registry of live voice sessions keyed by guild.
///
/// Exclusion is per map shard, keyed by guild: registering or evicting one
/// guild never waits on another guild's critical section unless both hash
/// to the same shard.  No lock is held across an await.
pub struct SessionRegistry {
    sessions: DashMap<Snowflake, Arc<Session>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Register a session for its guild.  First writer wins: when a session
    /// already exists for the guild it is returned and `session` is dropped.
    pub fn register(&self, session: Session) -> Arc<Session> {
        self.try_register(session).unwrap_or_else(|winner| winner)
    }

    /// Like [`Self::register`], but tells the caller whether it won:
    /// `Ok` holds the newly registered session, `Err` the one that was
    /// already there.
    pub fn try_register(&self, session: Session) -> Result<Arc<Session>, Arc<Session>> {
        let guild_id = session.guild_id();
        let (won, registered) = match self.sessions.entry(guild_id) {
            Entry::Occupied(existing) => (false, existing.get().clone()),
            Entry::Vacant(slot) => (true, slot.insert(Arc::new(session)).value().clone()),
        };

        if won {
            tracing::info!(
                guild_id = %guild_id,
                channel_id = %registered.channel_id(),
                shard_id = registered.shard_id(),
                "voice session registered"
            );
            Ok(registered)
        } else {
            tracing::debug!(guild_id = %guild_id, "session already registered, keeping existing");
            Err(registered)
        }
    }

    pub fn get(&self, guild_id: Snowflake) -> Option<Arc<Session>> {
        self.sessions.get(&guild_id).map(|s| s.value().clone())
    }

    /// Remove the guild's session.  Returns `true` if one was removed.
    /// Evicted sessions are marked disconnected for any remaining holders.
    pub fn evict(&self, guild_id: Snowflake) -> bool {
        match self.sessions.remove(&guild_id) {
            Some((_, session)) => {
                session.mark_disconnected();
                TraceEvent::VoiceSessionEvicted {
                    guild_id: guild_id.get(),
                }
                .emit();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, guild_id: Snowflake) -> bool {
        self.sessions.contains_key(&guild_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Snapshots of every registered session.
    pub fn list(&self) -> Vec<SessionInfo> {
        self.sessions.iter().map(|s| s.value().info()).collect()
    }
}
