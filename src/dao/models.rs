use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::phase::RetroPhase;

/// Fixed category tag attached to every response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Something the team wants to keep doing.
    WentWell,
    /// Something the team wants to change.
    NeedsImprovement,
}

/// Retrospective session persisted by the storage layer.
///
/// Sessions and their first participants are created by the external CRUD
/// collaborator; the real-time engine only updates the phase, timer, and
/// host fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntity {
    /// Primary key of the session.
    pub id: Uuid,
    /// Short code participants use to find the session.
    pub invite_code: String,
    /// Participant currently holding the host role, if any participant
    /// remains.
    pub host_id: Option<Uuid>,
    /// Current lifecycle phase.
    pub phase: RetroPhase,
    /// Advisory countdown length, in seconds, last requested by the host.
    pub timer_duration: Option<u64>,
    /// Advisory countdown end time. Never triggers server-side behavior.
    pub timer_end: Option<SystemTime>,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the session entity was updated.
    pub updated_at: SystemTime,
}

/// Participant of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    /// Primary key of the participant.
    pub id: Uuid,
    /// Session this participant belongs to.
    pub session_id: Uuid,
    /// Display name, unique case-insensitively within the session.
    pub name: String,
    /// Avatar tag chosen at join time.
    pub avatar: String,
    /// Whether this participant currently holds the host role.
    pub is_host: bool,
    /// Last time a connection bound for this participant.
    pub last_active: SystemTime,
}

/// Free-text item posted to the board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseEntity {
    /// Primary key of the response.
    pub id: Uuid,
    /// Session this response belongs to.
    pub session_id: Uuid,
    /// Participant who authored the response.
    pub participant_id: Uuid,
    /// Free-text content.
    pub content: String,
    /// Fixed category tag.
    pub category: Category,
    /// Horizontal board position.
    pub x: f64,
    /// Vertical board position.
    pub y: f64,
    /// Group this response is assigned to, at most one.
    pub group_id: Option<Uuid>,
}

/// Cluster of responses that can be voted on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupEntity {
    /// Primary key of the group.
    pub id: Uuid,
    /// Session this group belongs to.
    pub session_id: Uuid,
    /// Display label.
    pub label: String,
    /// Display color (hex string).
    pub color: String,
    /// Horizontal board position.
    pub x: f64,
    /// Vertical board position.
    pub y: f64,
    /// Derived total of the group's vote rows. Always recomputed from the
    /// rows before persisting, never incremented in place.
    pub vote_count: u32,
}

/// Drawn edge between two responses.
///
/// The pair is unordered: at most one edge exists between two responses
/// regardless of the order the endpoints were declared in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionEntity {
    /// Primary key of the connection.
    pub id: Uuid,
    /// Session this connection belongs to.
    pub session_id: Uuid,
    /// One endpoint of the edge.
    pub from_response: Uuid,
    /// The other endpoint of the edge.
    pub to_response: Uuid,
}

impl ConnectionEntity {
    /// Whether this edge links the given unordered pair.
    pub fn matches_pair(&self, a: Uuid, b: Uuid) -> bool {
        (self.from_response == a && self.to_response == b)
            || (self.from_response == b && self.to_response == a)
    }

    /// Whether this edge touches the given response.
    pub fn touches(&self, response_id: Uuid) -> bool {
        self.from_response == response_id || self.to_response == response_id
    }
}

/// Vote allocation of one participant on one group, keyed by the pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteEntity {
    /// Session this vote belongs to.
    pub session_id: Uuid,
    /// Participant who allocated the votes.
    pub participant_id: Uuid,
    /// Group the votes were allocated to.
    pub group_id: Uuid,
    /// Allocated count, in `0..=4`; a zero allocation is deleted instead of
    /// stored.
    pub count: u8,
}
