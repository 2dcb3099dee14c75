use uuid::Uuid;

use crate::{
    dao::models::{ConnectionEntity, GroupEntity, ResponseEntity},
    dto::{
        board::ResponseSummary,
        ws::{
            AddResponsePayload, CreateGroupPayload, DragResponsePayload, RenameGroupPayload,
            UpdateResponsePayload,
        },
    },
    error::ServiceError,
    services::{room_events, session_service::ensure_actor, voting},
    state::{Room, SharedState},
};

/// Post a new response with the default position.
///
/// The caller confirms it to the originating connection only; the rest of
/// the room is not notified of raw creation.
pub async fn add_response(
    state: &SharedState,
    room: &Room,
    participant_id: Uuid,
    connection_id: Uuid,
    payload: AddResponsePayload,
) -> Result<ResponseSummary, ServiceError> {
    ensure_actor(room, participant_id, connection_id)?;

    let response = ResponseEntity {
        id: Uuid::new_v4(),
        session_id: room.session_id(),
        participant_id,
        content: payload.content,
        category: payload.category,
        x: 0.0,
        y: 0.0,
        group_id: None,
    };
    state.store().save_response(response.clone()).await?;
    Ok(response.into())
}

/// Edit a response's text. Only its author may do so.
pub async fn update_response(
    state: &SharedState,
    room: &Room,
    participant_id: Uuid,
    connection_id: Uuid,
    payload: UpdateResponsePayload,
) -> Result<(), ServiceError> {
    ensure_actor(room, participant_id, connection_id)?;
    let mut response = find_scoped_response(state, room, payload.response_id).await?;
    if response.participant_id != participant_id {
        return Err(ServiceError::Unauthorized(
            "only the author can edit a response".into(),
        ));
    }

    response.content = payload.content;
    state.store().save_response(response.clone()).await?;
    room_events::notify_response_updated(room, connection_id, response.into());
    Ok(())
}

/// Delete a response. Only its author may do so.
///
/// Edges touching the response are removed with it, and a group left with
/// no members is removed together with its votes.
pub async fn delete_response(
    state: &SharedState,
    room: &Room,
    participant_id: Uuid,
    connection_id: Uuid,
    response_id: Uuid,
) -> Result<(), ServiceError> {
    ensure_actor(room, participant_id, connection_id)?;
    let response = find_scoped_response(state, room, response_id).await?;
    if response.participant_id != participant_id {
        return Err(ServiceError::Unauthorized(
            "only the author can delete a response".into(),
        ));
    }

    let store = state.store();
    let connections = store.list_connections(room.session_id()).await?;
    for connection in connections
        .iter()
        .filter(|connection| connection.touches(response.id))
    {
        store.delete_connection(connection.id).await?;
        room_events::notify_connection_removed(room, connection_id, connection.id);
    }

    if let Some(group_id) = response.group_id {
        let responses = store.list_responses(room.session_id()).await?;
        let sole_member = !responses
            .iter()
            .any(|other| other.group_id == Some(group_id) && other.id != response.id);
        if sole_member {
            if let Some(group) = store.find_group(group_id).await? {
                cascade_remove_group(state, room, connection_id, group, Vec::new()).await?;
            }
        }
    }

    store.delete_response(response.id).await?;
    room_events::notify_response_deleted(room, connection_id, response.id);
    Ok(())
}

/// Move a response and, optionally, change its group membership in one
/// atomic step, broadcast to the whole room.
pub async fn drag_response(
    state: &SharedState,
    room: &Room,
    participant_id: Uuid,
    connection_id: Uuid,
    payload: DragResponsePayload,
) -> Result<(), ServiceError> {
    ensure_actor(room, participant_id, connection_id)?;
    let mut response = find_scoped_response(state, room, payload.response_id).await?;

    match payload.group_id {
        None => {}
        Some(None) => response.group_id = None,
        Some(Some(group_id)) => {
            find_scoped_group(state, room, group_id).await?;
            response.group_id = Some(group_id);
        }
    }
    response.x = payload.x;
    response.y = payload.y;

    state.store().save_response(response.clone()).await?;
    room_events::notify_response_updated(room, connection_id, response.into());
    Ok(())
}

/// Create a group explicitly.
pub async fn create_group(
    state: &SharedState,
    room: &Room,
    participant_id: Uuid,
    connection_id: Uuid,
    payload: CreateGroupPayload,
) -> Result<(), ServiceError> {
    ensure_actor(room, participant_id, connection_id)?;

    let group = GroupEntity {
        id: Uuid::new_v4(),
        session_id: room.session_id(),
        label: payload.label,
        color: payload
            .color
            .unwrap_or_else(|| state.config().neutral_group_color()),
        x: payload.x,
        y: payload.y,
        vote_count: 0,
    };
    state.store().save_group(group.clone()).await?;
    room_events::notify_group_created(room, connection_id, group.into());
    Ok(())
}

/// Change a group's label; everything else stays untouched.
pub async fn rename_group(
    state: &SharedState,
    room: &Room,
    participant_id: Uuid,
    connection_id: Uuid,
    payload: RenameGroupPayload,
) -> Result<(), ServiceError> {
    ensure_actor(room, participant_id, connection_id)?;
    let mut group = find_scoped_group(state, room, payload.group_id).await?;

    group.label = payload.label;
    state.store().save_group(group.clone()).await?;
    room_events::notify_group_updated(room, connection_id, group.into());
    Ok(())
}

/// Delete a group, detaching its members and dropping its votes.
pub async fn delete_group(
    state: &SharedState,
    room: &Room,
    participant_id: Uuid,
    connection_id: Uuid,
    group_id: Uuid,
) -> Result<(), ServiceError> {
    ensure_actor(room, participant_id, connection_id)?;
    let group = find_scoped_group(state, room, group_id).await?;

    let store = state.store();
    let mut detached = Vec::new();
    for mut response in store.list_responses(room.session_id()).await? {
        if response.group_id == Some(group.id) {
            response.group_id = None;
            detached.push(response.id);
            store.save_response(response).await?;
        }
    }

    cascade_remove_group(state, room, connection_id, group, detached).await
}

/// Draw an edge between two responses of the session.
///
/// The pair is unordered: an existing edge in either direction makes the
/// request a conflict.
pub async fn create_connection(
    state: &SharedState,
    room: &Room,
    participant_id: Uuid,
    connection_id: Uuid,
    from_response_id: Uuid,
    to_response_id: Uuid,
) -> Result<(), ServiceError> {
    ensure_actor(room, participant_id, connection_id)?;
    if from_response_id == to_response_id {
        return Err(ServiceError::InvalidInput(
            "a connection needs two distinct responses".into(),
        ));
    }
    find_scoped_response(state, room, from_response_id).await?;
    find_scoped_response(state, room, to_response_id).await?;

    let store = state.store();
    let existing = store.list_connections(room.session_id()).await?;
    if existing
        .iter()
        .any(|connection| connection.matches_pair(from_response_id, to_response_id))
    {
        return Err(ServiceError::Conflict(
            "a connection between these responses already exists".into(),
        ));
    }

    let connection = ConnectionEntity {
        id: Uuid::new_v4(),
        session_id: room.session_id(),
        from_response: from_response_id,
        to_response: to_response_id,
    };
    store.save_connection(connection.clone()).await?;
    room_events::notify_connection_created(room, connection_id, connection.into());
    Ok(())
}

/// Remove a drawn edge.
pub async fn remove_connection(
    state: &SharedState,
    room: &Room,
    participant_id: Uuid,
    connection_id: Uuid,
    edge_id: Uuid,
) -> Result<(), ServiceError> {
    ensure_actor(room, participant_id, connection_id)?;
    let edge = state
        .store()
        .find_connection(edge_id)
        .await?
        .filter(|connection| connection.session_id == room.session_id())
        .ok_or_else(|| {
            ServiceError::NotFound(format!("connection `{edge_id}` not found in session"))
        })?;

    state.store().delete_connection(edge.id).await?;
    room_events::notify_connection_removed(room, connection_id, edge.id);
    Ok(())
}

/// Drop a group and its votes, broadcasting the refreshed budgets first
/// when any votes existed, then the removal itself.
async fn cascade_remove_group(
    state: &SharedState,
    room: &Room,
    origin: Uuid,
    group: GroupEntity,
    detached: Vec<Uuid>,
) -> Result<(), ServiceError> {
    let store = state.store();
    let votes = store.list_votes(room.session_id()).await?;
    let had_votes = votes.iter().any(|vote| vote.group_id == group.id);

    store.delete_votes_for_group(group.id).await?;
    if had_votes {
        voting::recompute_and_broadcast(state, room, origin, group.id).await?;
    }

    store.delete_group(group.id).await?;
    room_events::notify_group_removed(room, origin, group.id, detached);
    Ok(())
}

async fn find_scoped_response(
    state: &SharedState,
    room: &Room,
    response_id: Uuid,
) -> Result<ResponseEntity, ServiceError> {
    state
        .store()
        .find_response(response_id)
        .await?
        .filter(|response| response.session_id == room.session_id())
        .ok_or_else(|| {
            ServiceError::NotFound(format!("response `{response_id}` not found in session"))
        })
}

async fn find_scoped_group(
    state: &SharedState,
    room: &Room,
    group_id: Uuid,
) -> Result<GroupEntity, ServiceError> {
    state
        .store()
        .find_group(group_id)
        .await?
        .filter(|group| group.session_id == room.session_id())
        .ok_or_else(|| ServiceError::NotFound(format!("group `{group_id}` not found in session")))
}
