//! Helpers that fan room-scoped notifications out to a session's live
//! connections. Origin-only replies (snapshots, response confirmations,
//! errors) go down the connection's writer instead, in
//! `websocket_service`.

use uuid::Uuid;

use crate::{
    dto::{
        board::{ConnectionSummary, GroupSummary, ParticipantSummary, ResponseSummary, VotesUpdate},
        ws::ServerNotification,
    },
    state::{Audience, Room, RoomEvent},
    state::phase::RetroPhase,
};

fn send(room: &Room, origin: Uuid, audience: Audience, notification: ServerNotification) {
    room.broadcast(RoomEvent {
        origin,
        audience,
        notification,
    });
}

/// Tell the rest of the room a participant joined or came back online.
pub fn notify_participant_joined(room: &Room, origin: Uuid, participant: ParticipantSummary) {
    send(
        room,
        origin,
        Audience::Others,
        ServerNotification::ParticipantJoined { participant },
    );
}

/// Tell the room a participant went offline or was removed.
pub fn notify_participant_left(room: &Room, origin: Uuid, participant_id: Uuid) {
    send(
        room,
        origin,
        Audience::Room,
        ServerNotification::ParticipantLeft { participant_id },
    );
}

/// Tell the room the host role moved.
pub fn notify_host_changed(room: &Room, origin: Uuid, participant_id: Uuid) {
    send(
        room,
        origin,
        Audience::Room,
        ServerNotification::HostChanged { participant_id },
    );
}

/// Tell the room the session entered a new phase.
pub fn notify_phase_changed(
    room: &Room,
    origin: Uuid,
    phase: RetroPhase,
    timer_end: Option<String>,
) {
    send(
        room,
        origin,
        Audience::Room,
        ServerNotification::PhaseChanged { phase, timer_end },
    );
}

/// Advisory typing marker, not echoed back to the typist.
pub fn notify_typing_start(room: &Room, origin: Uuid, participant_id: Uuid) {
    send(
        room,
        origin,
        Audience::Others,
        ServerNotification::ParticipantTypingStart { participant_id },
    );
}

/// Clears the advisory typing marker for the rest of the room.
pub fn notify_typing_stop(room: &Room, origin: Uuid, participant_id: Uuid) {
    send(
        room,
        origin,
        Audience::Others,
        ServerNotification::ParticipantTypingStop { participant_id },
    );
}

/// Tell the room a response was edited or dragged.
pub fn notify_response_updated(room: &Room, origin: Uuid, response: ResponseSummary) {
    send(
        room,
        origin,
        Audience::Room,
        ServerNotification::ResponseUpdated { response },
    );
}

/// Tell the room a response was deleted.
pub fn notify_response_deleted(room: &Room, origin: Uuid, response_id: Uuid) {
    send(
        room,
        origin,
        Audience::Room,
        ServerNotification::ResponseDeleted { response_id },
    );
}

/// Tell the room a group was created explicitly.
pub fn notify_group_created(room: &Room, origin: Uuid, group: GroupSummary) {
    send(
        room,
        origin,
        Audience::Room,
        ServerNotification::GroupCreated { group },
    );
}

/// Tell the room a group's label or position changed.
pub fn notify_group_updated(room: &Room, origin: Uuid, group: GroupSummary) {
    send(
        room,
        origin,
        Audience::Room,
        ServerNotification::GroupUpdated { group },
    );
}

/// Tell the room a group was removed and which responses were detached.
pub fn notify_group_removed(room: &Room, origin: Uuid, group_id: Uuid, response_ids: Vec<Uuid>) {
    send(
        room,
        origin,
        Audience::Room,
        ServerNotification::GroupRemoved {
            group_id,
            response_ids,
        },
    );
}

/// Tell the room an edge between two responses was drawn.
pub fn notify_connection_created(room: &Room, origin: Uuid, connection: ConnectionSummary) {
    send(
        room,
        origin,
        Audience::Room,
        ServerNotification::ConnectionCreated { connection },
    );
}

/// Tell the room an edge was removed.
pub fn notify_connection_removed(room: &Room, origin: Uuid, connection_id: Uuid) {
    send(
        room,
        origin,
        Audience::Room,
        ServerNotification::ConnectionRemoved { connection_id },
    );
}

/// Tell the room a virtual target now maps to a persisted group.
pub fn notify_connected_group_created(
    room: &Room,
    origin: Uuid,
    virtual_id: String,
    group: GroupSummary,
) {
    send(
        room,
        origin,
        Audience::Room,
        ServerNotification::ConnectedGroupCreated { virtual_id, group },
    );
}

/// Tell the room a group's vote total and the participant budgets changed.
pub fn notify_votes_updated(room: &Room, origin: Uuid, update: VotesUpdate) {
    send(
        room,
        origin,
        Audience::Room,
        ServerNotification::VotesUpdated(update),
    );
}

/// Tell the room the results walkthrough started.
pub fn notify_presentation_started(room: &Room, origin: Uuid) {
    send(
        room,
        origin,
        Audience::Room,
        ServerNotification::PresentationStarted,
    );
}

/// Tell the room the results walkthrough ended.
pub fn notify_presentation_ended(room: &Room, origin: Uuid) {
    send(
        room,
        origin,
        Audience::Room,
        ServerNotification::PresentationEnded,
    );
}

/// Tell the room the walkthrough moved to an index.
pub fn notify_presentation_navigate(room: &Room, origin: Uuid, index: u64) {
    send(
        room,
        origin,
        Audience::Room,
        ServerNotification::PresentationNavigate { index },
    );
}
