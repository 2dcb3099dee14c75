use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::Category,
    dto::{
        board::{
            ConnectionSummary, GroupSummary, ParticipantSummary, ResponseSummary, SessionSnapshot,
            VotesUpdate,
        },
        validation::validate_not_blank,
    },
    error::ServiceError,
    state::phase::RetroPhase,
};

/// Commands accepted from board WebSocket clients.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// First frame on every connection; binds it to a participant.
    JoinSession(JoinSessionPayload),
    /// Host-only lifecycle transition with optional timer fields.
    ChangePhase(ChangePhasePayload),
    /// Advisory typing marker, expires server-side after 10 seconds.
    TypingStart,
    /// Clears the advisory typing marker.
    TypingStop,
    /// Post a new response, confirmed to the author only.
    AddResponse(AddResponsePayload),
    /// Edit a response's text, owner only.
    UpdateResponse(UpdateResponsePayload),
    /// Delete a response, owner only.
    DeleteResponse {
        /// Response to delete.
        response_id: Uuid,
    },
    /// Move a response and, optionally, change its group in one step.
    DragResponse(DragResponsePayload),
    /// Create a group explicitly.
    CreateGroup(CreateGroupPayload),
    /// Change a group's label only.
    RenameGroup(RenameGroupPayload),
    /// Delete a group, detaching its members and dropping its votes.
    DeleteGroup {
        /// Group to delete.
        group_id: Uuid,
    },
    /// Draw an edge between two responses; the pair is unordered-unique.
    CreateConnection {
        /// One endpoint.
        from_response_id: Uuid,
        /// The other endpoint.
        to_response_id: Uuid,
    },
    /// Remove a drawn edge.
    RemoveConnection {
        /// Connection to remove.
        connection_id: Uuid,
    },
    /// Allocate votes on a persisted or virtual target.
    CastVote(CastVotePayload),
    /// Remove a participant: self-service, or host-only for others.
    RemoveParticipant {
        /// Participant to remove.
        participant_id: Uuid,
    },
    /// Host-only: begin the results walkthrough.
    StartPresentation,
    /// Host-only: end the results walkthrough.
    EndPresentation,
    /// Host-only: move the walkthrough to an index (not validated).
    NavigatePresentation {
        /// Target position, any non-negative integer.
        index: u64,
    },
}

impl ClientCommand {
    /// Parse a raw text frame and validate its payload in one step.
    pub fn from_json_str(raw: &str) -> Result<Self, ServiceError> {
        let command: Self = serde_json::from_str(raw)
            .map_err(|err| ServiceError::InvalidInput(format!("malformed command: {err}")))?;
        command.validate_payload()?;
        Ok(command)
    }

    fn validate_payload(&self) -> Result<(), ServiceError> {
        match self {
            Self::JoinSession(payload) => payload.validate()?,
            Self::ChangePhase(payload) => payload.validate()?,
            Self::AddResponse(payload) => payload.validate()?,
            Self::UpdateResponse(payload) => payload.validate()?,
            Self::DragResponse(payload) => payload.validate()?,
            Self::CreateGroup(payload) => payload.validate()?,
            Self::RenameGroup(payload) => payload.validate()?,
            Self::CastVote(payload) => payload.validate()?,
            _ => {}
        }
        Ok(())
    }
}

/// Payload of [`ClientCommand::JoinSession`].
///
/// Carries either `participant_id` (reconnect) or `name` (first join);
/// supplying neither is rejected at dispatch.
#[derive(Debug, Deserialize, Validate)]
pub struct JoinSessionPayload {
    /// Session to join.
    pub session_id: Uuid,
    /// Existing participant to rebind, for reconnects.
    pub participant_id: Option<Uuid>,
    /// Display name for a first join, unique case-insensitively.
    #[validate(length(min = 1, max = 32), custom(function = validate_not_blank))]
    pub name: Option<String>,
    /// Avatar tag shown next to the name.
    #[validate(length(max = 32))]
    pub avatar: Option<String>,
}

/// Payload of [`ClientCommand::ChangePhase`].
#[derive(Debug, Deserialize, Validate)]
pub struct ChangePhasePayload {
    /// Phase to enter.
    pub phase: RetroPhase,
    /// Countdown length in seconds, starting a fresh timer.
    #[validate(range(min = 1, max = 86_400))]
    pub timer_duration: Option<u64>,
    /// Clears the countdown; wins over `timer_duration`.
    #[serde(default)]
    pub stop_timer: bool,
}

/// Payload of [`ClientCommand::AddResponse`].
#[derive(Debug, Deserialize, Validate)]
pub struct AddResponsePayload {
    /// Free-text content.
    #[validate(length(min = 1, max = 500), custom(function = validate_not_blank))]
    pub content: String,
    /// Fixed category tag.
    pub category: Category,
}

/// Payload of [`ClientCommand::UpdateResponse`].
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateResponsePayload {
    /// Response to edit.
    pub response_id: Uuid,
    /// Replacement text.
    #[validate(length(min = 1, max = 500), custom(function = validate_not_blank))]
    pub content: String,
}

/// Payload of [`ClientCommand::DragResponse`].
#[derive(Debug, Deserialize, Validate)]
pub struct DragResponsePayload {
    /// Response being dragged.
    pub response_id: Uuid,
    /// New horizontal position.
    pub x: f64,
    /// New vertical position.
    pub y: f64,
    /// Group membership change: absent keeps the current group, `null`
    /// detaches, an id assigns.
    #[serde(default, with = "serde_with::rust::double_option")]
    pub group_id: Option<Option<Uuid>>,
}

/// Payload of [`ClientCommand::CreateGroup`].
#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupPayload {
    /// Display label.
    #[validate(length(min = 1, max = 80), custom(function = validate_not_blank))]
    pub label: String,
    /// Display color; the configured neutral color when omitted.
    #[validate(length(min = 1, max = 32))]
    pub color: Option<String>,
    /// Horizontal position, defaults to the origin.
    #[serde(default)]
    pub x: f64,
    /// Vertical position, defaults to the origin.
    #[serde(default)]
    pub y: f64,
}

/// Payload of [`ClientCommand::RenameGroup`].
#[derive(Debug, Deserialize, Validate)]
pub struct RenameGroupPayload {
    /// Group to rename.
    pub group_id: Uuid,
    /// Replacement label.
    #[validate(length(min = 1, max = 80), custom(function = validate_not_blank))]
    pub label: String,
}

/// Payload of [`ClientCommand::CastVote`].
#[derive(Debug, Deserialize, Validate)]
pub struct CastVotePayload {
    /// Encoded target: `group:<uuid>`, `response:<uuid>`, or
    /// `chain:<uuid>,<uuid>[,...]`.
    #[validate(length(min = 1, max = 2048))]
    pub target: String,
    /// Votes to allocate to the target; zero withdraws the allocation.
    #[validate(range(max = 4))]
    pub count: u8,
}

/// Notifications pushed to board WebSocket clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerNotification {
    /// Full board state, sent to the joining connection only.
    SessionJoined(SessionSnapshot),
    /// A participant joined or came back online.
    ParticipantJoined {
        /// The joined participant.
        participant: ParticipantSummary,
    },
    /// A participant went offline or was removed.
    ParticipantLeft {
        /// The departed participant.
        participant_id: Uuid,
    },
    /// The host role moved to another participant.
    HostChanged {
        /// The new host.
        participant_id: Uuid,
    },
    /// The session entered a new phase.
    PhaseChanged {
        /// The new phase.
        phase: RetroPhase,
        /// Resolved RFC3339 countdown end time, or `null` when stopped.
        timer_end: Option<String>,
    },
    /// A participant started typing (advisory).
    ParticipantTypingStart {
        /// The typing participant.
        participant_id: Uuid,
    },
    /// A participant stopped typing.
    ParticipantTypingStop {
        /// The participant that stopped.
        participant_id: Uuid,
    },
    /// A response was created, confirmed to its author only.
    ResponseAdded {
        /// The created response.
        response: ResponseSummary,
    },
    /// A response was edited or dragged.
    ResponseUpdated {
        /// The updated response.
        response: ResponseSummary,
    },
    /// A response was deleted.
    ResponseDeleted {
        /// The deleted response.
        response_id: Uuid,
    },
    /// A group was created explicitly.
    GroupCreated {
        /// The created group.
        group: GroupSummary,
    },
    /// A group's label or position changed.
    GroupUpdated {
        /// The updated group.
        group: GroupSummary,
    },
    /// A group was removed; its members are ungrouped again.
    GroupRemoved {
        /// The removed group.
        group_id: Uuid,
        /// Responses that were detached.
        response_ids: Vec<Uuid>,
    },
    /// An edge between two responses was drawn.
    ConnectionCreated {
        /// The created connection.
        connection: ConnectionSummary,
    },
    /// An edge was removed.
    ConnectionRemoved {
        /// The removed connection.
        connection_id: Uuid,
    },
    /// A virtual grouping target was materialized into a persisted group.
    ConnectedGroupCreated {
        /// The virtual identifier clients used to address the target.
        virtual_id: String,
        /// The persisted group it now maps to.
        group: GroupSummary,
    },
    /// A group's vote total and the per-participant budgets changed.
    VotesUpdated(VotesUpdate),
    /// The host started the results walkthrough.
    PresentationStarted,
    /// The host ended the results walkthrough.
    PresentationEnded,
    /// The host moved the walkthrough to an index.
    PresentationNavigate {
        /// Target position, forwarded untouched.
        index: u64,
    },
    /// Command rejected or failed; sent to the originating connection only.
    Error {
        /// Human-readable description.
        message: String,
    },
}
