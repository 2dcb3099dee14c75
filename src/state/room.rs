use tokio::sync::{Mutex, MutexGuard, broadcast};
use uuid::Uuid;

use crate::dto::ws::ServerNotification;
use crate::state::presence::PresenceRegistry;

/// Capacity of the per-room broadcast channel; slow consumers lag and skip
/// rather than block the sender.
const EVENT_CAPACITY: usize = 16;

/// Which live connections of the room should receive an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Every connection, including the originating one.
    Room,
    /// Every connection except the originating one.
    Others,
}

/// Notification routed through a room's broadcast channel.
#[derive(Debug, Clone)]
pub struct RoomEvent {
    /// Connection the triggering command arrived on.
    pub origin: Uuid,
    /// Delivery scope relative to `origin`.
    pub audience: Audience,
    /// Payload forwarded to each matching connection.
    pub notification: ServerNotification,
}

/// Per-session hub: the broadcast fan-out, the presence registry, and the
/// write gate that serializes state-mutating commands for this session.
pub struct Room {
    session_id: Uuid,
    gate: Mutex<()>,
    events: broadcast::Sender<RoomEvent>,
    presence: PresenceRegistry,
}

impl Room {
    /// Create the hub for a session.
    pub fn new(session_id: Uuid) -> Self {
        let (events, _receiver) = broadcast::channel(EVENT_CAPACITY);
        Self {
            session_id,
            gate: Mutex::new(()),
            events,
            presence: PresenceRegistry::new(),
        }
    }

    /// Session this room belongs to.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: RoomEvent) {
        let _ = self.events.send(event);
    }

    /// Presence registry for this session.
    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    /// Acquire the session's write gate.
    ///
    /// Every state-mutating command holds this guard across its whole
    /// resolve + mutate + recompute + broadcast sequence, so compound
    /// operations are atomic per session while sessions stay independent.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    /// Whether nothing is connected or subscribed anymore.
    pub fn is_idle(&self) -> bool {
        self.presence.online_count() == 0 && self.events.receiver_count() == 0
    }
}
