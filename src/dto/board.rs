use indexmap::IndexMap;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    dao::models::{
        Category, ConnectionEntity, GroupEntity, ParticipantEntity, ResponseEntity, SessionEntity,
    },
    dto::format_system_time,
    state::phase::RetroPhase,
};

/// Public projection of a session exposed to clients.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub invite_code: String,
    pub phase: RetroPhase,
    /// RFC3339 end time of the advisory countdown, when one is running.
    pub timer_end: Option<String>,
    pub host_id: Option<Uuid>,
}

/// Public projection of a participant, including live presence.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantSummary {
    pub id: Uuid,
    pub name: String,
    pub avatar: String,
    pub is_host: bool,
    pub online: bool,
    pub last_active: String,
}

/// Public projection of a board response.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseSummary {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub content: String,
    pub category: Category,
    pub x: f64,
    pub y: f64,
    pub group_id: Option<Uuid>,
}

/// Public projection of a group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub id: Uuid,
    pub label: String,
    pub color: String,
    pub x: f64,
    pub y: f64,
    pub vote_count: u32,
}

/// Public projection of a connection between two responses.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSummary {
    pub id: Uuid,
    pub from_response_id: Uuid,
    pub to_response_id: Uuid,
}

/// Recomputed voting state broadcast after every ledger change.
#[derive(Debug, Clone, Serialize)]
pub struct VotesUpdate {
    pub group_id: Uuid,
    /// Group total, summed from the vote rows.
    pub vote_count: u32,
    /// Remaining budget per participant, recomputed from the vote rows.
    pub remaining_budgets: IndexMap<Uuid, u8>,
}

/// Full board state handed to a connection right after it joins.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session: SessionSummary,
    pub participants: Vec<ParticipantSummary>,
    pub responses: Vec<ResponseSummary>,
    pub groups: Vec<GroupSummary>,
    pub connections: Vec<ConnectionSummary>,
    pub remaining_budgets: IndexMap<Uuid, u8>,
    /// Participants with a live typing marker at snapshot time.
    pub typing_participants: Vec<Uuid>,
}

impl From<SessionEntity> for SessionSummary {
    fn from(session: SessionEntity) -> Self {
        Self {
            id: session.id,
            invite_code: session.invite_code,
            phase: session.phase,
            timer_end: session.timer_end.map(format_system_time),
            host_id: session.host_id,
        }
    }
}

impl From<(ParticipantEntity, bool)> for ParticipantSummary {
    fn from((participant, online): (ParticipantEntity, bool)) -> Self {
        Self {
            id: participant.id,
            name: participant.name,
            avatar: participant.avatar,
            is_host: participant.is_host,
            online,
            last_active: format_system_time(participant.last_active),
        }
    }
}

impl From<ResponseEntity> for ResponseSummary {
    fn from(response: ResponseEntity) -> Self {
        Self {
            id: response.id,
            participant_id: response.participant_id,
            content: response.content,
            category: response.category,
            x: response.x,
            y: response.y,
            group_id: response.group_id,
        }
    }
}

impl From<GroupEntity> for GroupSummary {
    fn from(group: GroupEntity) -> Self {
        Self {
            id: group.id,
            label: group.label,
            color: group.color,
            x: group.x,
            y: group.y,
            vote_count: group.vote_count,
        }
    }
}

impl From<ConnectionEntity> for ConnectionSummary {
    fn from(connection: ConnectionEntity) -> Self {
        Self {
            id: connection.id,
            from_response_id: connection.from_response,
            to_response_id: connection.to_response,
        }
    }
}
