use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

/// Typing markers older than this are treated as expired, so a crashed
/// connection cannot leave a permanently "typing" participant.
const TYPING_TTL: Duration = Duration::from_secs(10);

/// Tracks which participant owns which live connection, plus the short-lived
/// typing markers for a single session.
///
/// Host-only actions authorize against this registry: a connection may act
/// for a participant only while it is the participant's current binding.
#[derive(Default)]
pub struct PresenceRegistry {
    bindings: DashMap<Uuid, Uuid>,
    typing: DashMap<Uuid, Instant>,
}

impl PresenceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a participant to a connection, overwriting any stale prior
    /// binding so reconnects are idempotent. Returns the replaced
    /// connection, if any.
    pub fn bind(&self, participant_id: Uuid, connection_id: Uuid) -> Option<Uuid> {
        self.bindings.insert(participant_id, connection_id)
    }

    /// Remove the binding, but only while the participant is still bound to
    /// this connection. A reconnect that already rebound elsewhere keeps its
    /// fresh binding. Returns whether a binding was removed.
    pub fn unbind(&self, participant_id: Uuid, connection_id: Uuid) -> bool {
        self.bindings
            .remove_if(&participant_id, |_, bound| *bound == connection_id)
            .is_some()
    }

    /// Remove the binding regardless of which connection holds it, for
    /// explicit participant removal. Returns the dropped connection, if any.
    pub fn drop_binding(&self, participant_id: Uuid) -> Option<Uuid> {
        self.bindings
            .remove(&participant_id)
            .map(|(_, connection)| connection)
    }

    /// Whether the participant is currently bound to this exact connection.
    pub fn is_bound(&self, participant_id: Uuid, connection_id: Uuid) -> bool {
        self.bindings
            .get(&participant_id)
            .is_some_and(|bound| *bound == connection_id)
    }

    /// Whether the participant has any live connection.
    pub fn is_online(&self, participant_id: Uuid) -> bool {
        self.bindings.contains_key(&participant_id)
    }

    /// Number of live bindings.
    pub fn online_count(&self) -> usize {
        self.bindings.len()
    }

    /// Record a typing marker for the participant.
    pub fn mark_typing(&self, participant_id: Uuid) {
        self.typing.insert(participant_id, Instant::now());
    }

    /// Drop the participant's typing marker. Returns whether one existed.
    pub fn clear_typing(&self, participant_id: Uuid) -> bool {
        self.typing.remove(&participant_id).is_some()
    }

    /// Participants with a live typing marker, pruning expired ones.
    pub fn typing_participants(&self) -> Vec<Uuid> {
        self.typing_participants_at(Instant::now())
    }

    fn typing_participants_at(&self, now: Instant) -> Vec<Uuid> {
        self.typing
            .retain(|_, marked_at| now.duration_since(*marked_at) < TYPING_TTL);
        self.typing.iter().map(|entry| *entry.key()).collect()
    }
}
