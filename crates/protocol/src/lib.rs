//! Voice gateway protocol: snowflake ids, shard routing, the voice state
//! command, and the two server events a voice handshake waits on.
//!
//! This crate only describes *shapes*.  Delivering commands and events is
//! the job of whatever gateway transport the embedding application runs.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of low bits of a snowflake that do not participate in shard
/// routing.  Fixed by the gateway protocol.
pub const SHARD_ID_SHIFT: u32 = 22;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Snowflake
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A 64-bit gateway identifier (guild, channel or user).
///
/// Serialized as a decimal string; deserialization accepts either a
/// string or a JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Snowflake(u64);

impl Snowflake {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// The shard that owns this id when the gateway runs `shard_count`
    /// shards.
    pub fn shard_id(self, shard_count: u32) -> u32 {
        shard_for(self, shard_count)
    }
}

impl From<u64> for Snowflake {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Snowflake {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}

impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SnowflakeVisitor;

        impl Visitor<'_> for SnowflakeVisitor {
            type Value = Snowflake;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a snowflake as a decimal string or unsigned integer")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Snowflake, E> {
                Ok(Snowflake(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Snowflake, E> {
                u64::try_from(v)
                    .map(Snowflake)
                    .map_err(|_| E::custom("snowflake must not be negative"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Snowflake, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(SnowflakeVisitor)
    }
}

/// Deterministic shard routing: `(guild_id >> 22) % shard_count`.
///
/// A `shard_count` of zero is treated as a single shard.
pub fn shard_for(guild_id: Snowflake, shard_count: u32) -> u32 {
    let count = u64::from(shard_count.max(1));
    ((guild_id.get() >> SHARD_ID_SHIFT) % count) as u32
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Commands
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Client → gateway: join, move or leave a voice channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStateUpdate {
    pub guild_id: Snowflake,
    /// `None` means "leave the current voice channel".
    pub channel_id: Option<Snowflake>,
    pub self_mute: bool,
    pub self_deaf: bool,
}

impl VoiceStateUpdate {
    pub fn join(
        guild_id: Snowflake,
        channel_id: Snowflake,
        self_mute: bool,
        self_deaf: bool,
    ) -> Self {
        Self {
            guild_id,
            channel_id: Some(channel_id),
            self_mute,
            self_deaf,
        }
    }

    /// The disconnect form: no channel, mute and deaf cleared.
    pub fn leave(guild_id: Snowflake) -> Self {
        Self {
            guild_id,
            channel_id: None,
            self_mute: false,
            self_deaf: false,
        }
    }

    pub fn is_leave(&self) -> bool {
        self.channel_id.is_none()
    }
}

/// A command addressed to one shard of the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardPayload {
    pub shard_id: u32,
    pub payload: VoiceStateUpdate,
}

impl ShardPayload {
    /// Route a voice state update to the shard owning its guild.
    pub fn voice_state_update(payload: VoiceStateUpdate, shard_count: u32) -> Self {
        Self {
            shard_id: shard_for(payload.guild_id, shard_count),
            payload,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Gateway → client: a user's voice state changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStateEvent {
    pub guild_id: Snowflake,
    pub user_id: Snowflake,
    #[serde(default)]
    pub channel_id: Option<Snowflake>,
    pub session_id: String,
}

/// Gateway → client: the voice server assigned to a guild.
///
/// `endpoint` is occasionally `null`; another event with a real endpoint
/// follows in that case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceServerEvent {
    pub guild_id: Snowflake,
    #[serde(default)]
    pub endpoint: Option<String>,
    pub token: String,
}

/// Dispatch envelope for the events this crate understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t", content = "d")]
pub enum GatewayEvent {
    #[serde(rename = "VOICE_STATE_UPDATE")]
    VoiceStateUpdate(VoiceStateEvent),
    #[serde(rename = "VOICE_SERVER_UPDATE")]
    VoiceServerUpdate(VoiceServerEvent),
}

impl GatewayEvent {
    pub fn guild_id(&self) -> Snowflake {
        match self {
            Self::VoiceStateUpdate(ev) => ev.guild_id,
            Self::VoiceServerUpdate(ev) => ev.guild_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_arithmetic_matches_protocol() {
        let guild = Snowflake::new(123_456_789_012_345_678);
        let expected = ((123_456_789_012_345_678u64 >> 22) % 2) as u32;
        assert_eq!(shard_for(guild, 2), expected);
        assert_eq!(guild.shard_id(2), expected);
    }

    #[test]
    fn single_shard_always_zero() {
        assert_eq!(shard_for(Snowflake::new(u64::MAX), 1), 0);
        assert_eq!(shard_for(Snowflake::new(u64::MAX), 0), 0);
    }

    #[test]
    fn leave_clears_channel_and_flags() {
        let leave = VoiceStateUpdate::leave(Snowflake::new(7));
        assert!(leave.is_leave());
        assert!(!leave.self_mute);
        assert!(!leave.self_deaf);
    }

    #[test]
    fn snowflake_serializes_as_string() {
        let json = serde_json::to_string(&Snowflake::new(42)).unwrap();
        assert_eq!(json, "\"42\"");
    }

    #[test]
    fn snowflake_accepts_number_or_string() {
        let a: Snowflake = serde_json::from_str("\"81384788765712384\"").unwrap();
        let b: Snowflake = serde_json::from_str("81384788765712384").unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_str::<Snowflake>("-1").is_err());
    }

    #[test]
    fn null_endpoint_parses_as_none() {
        let raw = r#"{"t":"VOICE_SERVER_UPDATE","d":{"guild_id":"1","endpoint":null,"token":"abc"}}"#;
        match serde_json::from_str::<GatewayEvent>(raw).unwrap() {
            GatewayEvent::VoiceServerUpdate(ev) => {
                assert_eq!(ev.endpoint, None);
                assert_eq!(ev.token, "abc");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn leave_serializes_null_channel() {
        let value = serde_json::to_value(VoiceStateUpdate::leave(Snowflake::new(5))).unwrap();
        assert!(value["channel_id"].is_null());
        assert_eq!(value["guild_id"], "5");
    }
}
