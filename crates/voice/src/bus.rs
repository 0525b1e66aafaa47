//! In-memory [`EventSource`] backed by tokio broadcast channels.
//!
//! Gateway readers publish decoded dispatch events here; every handshake
//! subscribes for as long as it waits.

use tokio::sync::broadcast;
use vl_protocol::{GatewayEvent, VoiceServerEvent, VoiceStateEvent};

use crate::gateway::EventSource;

/// Default per-subscriber buffer.  A subscriber that falls further behind
/// than this observes a lag and skips the oldest events.
pub const DEFAULT_CAPACITY: usize = 256;

/// Fan-out bus for voice dispatch events.
#[derive(Debug, Clone)]
pub struct MemoryEventBus {
    states: broadcast::Sender<VoiceStateEvent>,
    servers: broadcast::Sender<VoiceServerEvent>,
}

impl MemoryEventBus {
    pub fn new(capacity: usize) -> Self {
        let (states, _) = broadcast::channel(capacity);
        let (servers, _) = broadcast::channel(capacity);
        Self { states, servers }
    }

    /// Publish a dispatch event.  Returns the number of live subscribers
    /// that received it (zero is not an error).
    pub fn publish(&self, event: GatewayEvent) -> usize {
        match event {
            GatewayEvent::VoiceStateUpdate(ev) => self.publish_state(ev),
            GatewayEvent::VoiceServerUpdate(ev) => self.publish_server(ev),
        }
    }

    pub fn publish_state(&self, event: VoiceStateEvent) -> usize {
        self.states.send(event).unwrap_or(0)
    }

    pub fn publish_server(&self, event: VoiceServerEvent) -> usize {
        self.servers.send(event).unwrap_or(0)
    }

    /// Live subscriptions across both streams.
    pub fn subscriber_count(&self) -> usize {
        self.states.receiver_count() + self.servers.receiver_count()
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventSource for MemoryEventBus {
    fn voice_state_updates(&self) -> broadcast::Receiver<VoiceStateEvent> {
        self.states.subscribe()
    }

    fn voice_server_updates(&self) -> broadcast::Receiver<VoiceServerEvent> {
        self.servers.subscribe()
    }
}
