use std::time::SystemTime;

use rand::seq::IteratorRandom;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{ParticipantEntity, SessionEntity},
    dto::{board::SessionSnapshot, ws::JoinSessionPayload},
    error::ServiceError,
    services::{room_events, voting},
    state::{Room, SharedState},
};

/// Result of a successful join: the bound participant plus the snapshot the
/// connection needs to render the board.
#[derive(Debug)]
pub struct JoinOutcome {
    /// Participant the connection is now bound to.
    pub participant: ParticipantEntity,
    /// Full board state for the joining connection.
    pub snapshot: SessionSnapshot,
}

/// Load a session or fail with a scope error.
pub(crate) async fn load_session(
    state: &SharedState,
    session_id: Uuid,
) -> Result<SessionEntity, ServiceError> {
    state
        .store()
        .find_session(session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))
}

/// Ensure the connection is still the participant's current binding.
///
/// A stale connection (one replaced by a reconnect) loses the right to act
/// for the participant the moment the fresh binding lands.
pub(crate) fn ensure_actor(
    room: &Room,
    participant_id: Uuid,
    connection_id: Uuid,
) -> Result<(), ServiceError> {
    if room.presence().is_bound(participant_id, connection_id) {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized(
            "connection is no longer bound to this participant".into(),
        ))
    }
}

/// Ensure the connection is currently bound to the session's host, returning
/// the session for further use.
pub(crate) async fn ensure_host(
    state: &SharedState,
    room: &Room,
    connection_id: Uuid,
) -> Result<SessionEntity, ServiceError> {
    let session = load_session(state, room.session_id()).await?;
    let authorized = session
        .host_id
        .is_some_and(|host_id| room.presence().is_bound(host_id, connection_id));
    if authorized {
        Ok(session)
    } else {
        Err(ServiceError::Unauthorized(
            "only the session host can perform this action".into(),
        ))
    }
}

/// Bind a connection into a session, creating the participant on a first
/// join or rebinding an existing one on reconnect.
///
/// The first participant of an empty session receives the host role.
pub async fn join(
    state: &SharedState,
    room: &Room,
    payload: JoinSessionPayload,
    connection_id: Uuid,
) -> Result<JoinOutcome, ServiceError> {
    let store = state.store();
    let session = load_session(state, payload.session_id).await?;
    let now = SystemTime::now();

    let participant = match payload.participant_id {
        Some(id) => {
            let mut participant = store
                .find_participant(id)
                .await?
                .filter(|participant| participant.session_id == session.id)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("participant `{id}` not found in session"))
                })?;
            participant.last_active = now;
            store.save_participant(participant.clone()).await?;
            participant
        }
        None => {
            let name = payload
                .name
                .ok_or_else(|| {
                    ServiceError::InvalidInput(
                        "join requires a participant id or a display name".into(),
                    )
                })?
                .trim()
                .to_string();

            let existing = store.list_participants(session.id).await?;
            let taken = existing
                .iter()
                .any(|participant| participant.name.to_lowercase() == name.to_lowercase());
            if taken {
                return Err(ServiceError::Conflict(format!(
                    "display name `{name}` already taken"
                )));
            }

            let is_host = existing.is_empty();
            let participant = ParticipantEntity {
                id: Uuid::new_v4(),
                session_id: session.id,
                name,
                avatar: payload.avatar.unwrap_or_default(),
                is_host,
                last_active: now,
            };
            store.save_participant(participant.clone()).await?;

            if is_host {
                let mut session = session.clone();
                session.host_id = Some(participant.id);
                session.updated_at = now;
                store.save_session(session).await?;
            }
            participant
        }
    };

    // Overwrites any stale binding, so reconnects are idempotent.
    room.presence().bind(participant.id, connection_id);

    let snapshot = build_snapshot(state, room).await?;
    Ok(JoinOutcome {
        participant,
        snapshot,
    })
}

/// Assemble the full board state a joining connection needs.
pub(crate) async fn build_snapshot(
    state: &SharedState,
    room: &Room,
) -> Result<SessionSnapshot, ServiceError> {
    let store = state.store();
    let session = load_session(state, room.session_id()).await?;
    let participants = store.list_participants(session.id).await?;
    let responses = store.list_responses(session.id).await?;
    let groups = store.list_groups(session.id).await?;
    let connections = store.list_connections(session.id).await?;
    let votes = store.list_votes(session.id).await?;

    let remaining_budgets = voting::remaining_budgets(&votes, &participants);
    let participants = participants
        .into_iter()
        .map(|participant| {
            let online = room.presence().is_online(participant.id);
            (participant, online).into()
        })
        .collect();

    Ok(SessionSnapshot {
        session: session.into(),
        participants,
        responses: responses.into_iter().map(Into::into).collect(),
        groups: groups.into_iter().map(Into::into).collect(),
        connections: connections.into_iter().map(Into::into).collect(),
        remaining_budgets,
        typing_participants: room.presence().typing_participants(),
    })
}

/// Tear down a connection's presence when its socket closes.
///
/// The unbind is guarded by the connection id, so a reconnect that already
/// rebound keeps the participant online.
pub async fn disconnect(
    state: &SharedState,
    room: &Room,
    participant_id: Uuid,
    connection_id: Uuid,
) {
    if !room.presence().unbind(participant_id, connection_id) {
        return;
    }
    room.presence().clear_typing(participant_id);

    let store = state.store();
    match store.find_participant(participant_id).await {
        Ok(Some(mut participant)) => {
            participant.last_active = SystemTime::now();
            if let Err(err) = store.save_participant(participant).await {
                tracing::warn!(error = %err, "failed to persist last-active on disconnect");
            }
        }
        Ok(None) => {}
        Err(err) => tracing::warn!(error = %err, "failed to load participant on disconnect"),
    }

    room_events::notify_participant_left(room, connection_id, participant_id);
}

/// Explicitly remove a participant from the session.
///
/// Self-removal is always allowed; removing someone else requires the host.
/// The removed participant's votes are dropped (affected group totals are
/// recomputed and broadcast) and, when the host leaves, an arbitrary
/// remaining participant is promoted.
pub async fn remove_participant(
    state: &SharedState,
    room: &Room,
    actor_participant: Uuid,
    connection_id: Uuid,
    target_id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.store();
    let session = if target_id == actor_participant {
        ensure_actor(room, actor_participant, connection_id)?;
        load_session(state, room.session_id()).await?
    } else {
        ensure_host(state, room, connection_id).await?
    };

    let target = store
        .find_participant(target_id)
        .await?
        .filter(|participant| participant.session_id == session.id)
        .ok_or_else(|| {
            ServiceError::NotFound(format!("participant `{target_id}` not found in session"))
        })?;

    let votes = store.list_votes(session.id).await?;
    let mut affected_groups: Vec<Uuid> = votes
        .iter()
        .filter(|vote| vote.participant_id == target.id)
        .map(|vote| vote.group_id)
        .collect();
    affected_groups.dedup();

    store.delete_votes_for_participant(target.id).await?;
    store.delete_participant(target.id).await?;

    room.presence().drop_binding(target.id);
    room.presence().clear_typing(target.id);

    if session.host_id == Some(target.id) {
        let remaining = store.list_participants(session.id).await?;
        let new_host = remaining.iter().choose(&mut rand::rng()).cloned();

        let mut session = session;
        session.host_id = new_host.as_ref().map(|participant| participant.id);
        session.updated_at = SystemTime::now();
        store.save_session(session).await?;

        if let Some(mut host) = new_host {
            host.is_host = true;
            let host_id = host.id;
            store.save_participant(host).await?;
            info!(participant_id = %host_id, "promoted new session host");
            room_events::notify_host_changed(room, connection_id, host_id);
        }
    }

    for group_id in affected_groups {
        voting::recompute_and_broadcast(state, room, connection_id, group_id).await?;
    }

    room_events::notify_participant_left(room, connection_id, target.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::{
        config::AppConfig,
        dao::{SessionStore, memory::MemoryStore, models::VoteEntity},
        state::{AppState, phase::RetroPhase},
    };

    struct Fixture {
        state: SharedState,
        room: Arc<Room>,
        session_id: Uuid,
    }

    async fn setup() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let session_id = Uuid::new_v4();
        let now = SystemTime::now();
        store
            .save_session(SessionEntity {
                id: session_id,
                invite_code: "retro-6".into(),
                host_id: None,
                phase: RetroPhase::Brainstorm,
                timer_duration: None,
                timer_end: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let state = AppState::new(store, AppConfig::default());
        let room = state.room(session_id);
        Fixture {
            state,
            room,
            session_id,
        }
    }

    fn join_payload(fixture: &Fixture, name: &str) -> JoinSessionPayload {
        JoinSessionPayload {
            session_id: fixture.session_id,
            participant_id: None,
            name: Some(name.into()),
            avatar: None,
        }
    }

    async fn join_as(fixture: &Fixture, name: &str) -> Result<JoinOutcome, ServiceError> {
        join(
            &fixture.state,
            &fixture.room,
            join_payload(fixture, name),
            Uuid::new_v4(),
        )
        .await
    }

    /// Join and keep the connection id, for tests that act as the joiner.
    async fn join_connected(fixture: &Fixture, name: &str) -> (ParticipantEntity, Uuid) {
        let connection_id = Uuid::new_v4();
        let outcome = join(
            &fixture.state,
            &fixture.room,
            join_payload(fixture, name),
            connection_id,
        )
        .await
        .unwrap();
        (outcome.participant, connection_id)
    }

    #[tokio::test]
    async fn the_first_joiner_becomes_host() {
        let fixture = setup().await;

        let alice = join_as(&fixture, "Alice").await.unwrap();
        assert!(alice.participant.is_host);

        let session = load_session(&fixture.state, fixture.session_id)
            .await
            .unwrap();
        assert_eq!(session.host_id, Some(alice.participant.id));

        let bob = join_as(&fixture, "Bob").await.unwrap();
        assert!(!bob.participant.is_host);
    }

    #[tokio::test]
    async fn display_names_are_unique_ignoring_case() {
        let fixture = setup().await;
        join_as(&fixture, "Alice").await.unwrap();

        let err = join_as(&fixture, "aLiCe").await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert!(err.to_string().contains("already taken"));

        // The rejected joiner was not added.
        let participants = fixture
            .state
            .store()
            .list_participants(fixture.session_id)
            .await
            .unwrap();
        assert_eq!(participants.len(), 1);
    }

    #[tokio::test]
    async fn a_join_needs_an_id_or_a_name() {
        let fixture = setup().await;
        let err = join(
            &fixture.state,
            &fixture.room,
            JoinSessionPayload {
                session_id: fixture.session_id,
                participant_id: None,
                name: None,
                avatar: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn reconnecting_rebinds_the_existing_participant() {
        let fixture = setup().await;
        let alice = join_as(&fixture, "Alice").await.unwrap().participant;

        let fresh_connection = Uuid::new_v4();
        let outcome = join(
            &fixture.state,
            &fixture.room,
            JoinSessionPayload {
                session_id: fixture.session_id,
                participant_id: Some(alice.id),
                name: None,
                avatar: None,
            },
            fresh_connection,
        )
        .await
        .unwrap();

        assert_eq!(outcome.participant.id, alice.id);
        assert!(fixture.room.presence().is_bound(alice.id, fresh_connection));
        // No second participant appeared and the snapshot reflects that.
        assert_eq!(outcome.snapshot.participants.len(), 1);
    }

    #[tokio::test]
    async fn removing_the_host_promotes_exactly_one_survivor() {
        let fixture = setup().await;
        let (host, host_connection) = join_connected(&fixture, "Host").await;

        join_as(&fixture, "Bob").await.unwrap();
        join_as(&fixture, "Carol").await.unwrap();

        remove_participant(&fixture.state, &fixture.room, host.id, host_connection, host.id)
            .await
            .unwrap();

        let participants = fixture
            .state
            .store()
            .list_participants(fixture.session_id)
            .await
            .unwrap();
        assert_eq!(participants.len(), 2);
        assert_eq!(
            participants
                .iter()
                .filter(|participant| participant.is_host)
                .count(),
            1
        );

        let session = load_session(&fixture.state, fixture.session_id)
            .await
            .unwrap();
        let promoted = participants
            .iter()
            .find(|participant| participant.is_host)
            .unwrap();
        assert_eq!(session.host_id, Some(promoted.id));
    }

    #[tokio::test]
    async fn removing_the_last_participant_leaves_the_session_hostless() {
        let fixture = setup().await;
        let (host, connection) = join_connected(&fixture, "Solo").await;

        remove_participant(&fixture.state, &fixture.room, host.id, connection, host.id)
            .await
            .unwrap();

        let session = load_session(&fixture.state, fixture.session_id)
            .await
            .unwrap();
        assert_eq!(session.host_id, None);
        assert!(
            fixture
                .state
                .store()
                .list_participants(fixture.session_id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn only_the_host_can_remove_someone_else() {
        let fixture = setup().await;
        join_as(&fixture, "Host").await.unwrap();
        let (bob, bob_connection) = join_connected(&fixture, "Bob").await;
        let carol = join_as(&fixture, "Carol").await.unwrap().participant;

        let err = remove_participant(
            &fixture.state,
            &fixture.room,
            bob.id,
            bob_connection,
            carol.id,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn a_removed_participants_votes_are_dropped() {
        let fixture = setup().await;
        let (host, host_connection) = join_connected(&fixture, "Host").await;
        let bob = join_as(&fixture, "Bob").await.unwrap().participant;

        let group_id = Uuid::new_v4();
        fixture
            .state
            .store()
            .save_group(crate::dao::models::GroupEntity {
                id: group_id,
                session_id: fixture.session_id,
                label: "target".into(),
                color: "#94a3b8".into(),
                x: 0.0,
                y: 0.0,
                vote_count: 3,
            })
            .await
            .unwrap();
        fixture
            .state
            .store()
            .save_vote(VoteEntity {
                session_id: fixture.session_id,
                participant_id: bob.id,
                group_id,
                count: 3,
            })
            .await
            .unwrap();

        remove_participant(
            &fixture.state,
            &fixture.room,
            host.id,
            host_connection,
            bob.id,
        )
        .await
        .unwrap();

        assert!(
            fixture
                .state
                .store()
                .list_votes(fixture.session_id)
                .await
                .unwrap()
                .is_empty()
        );
        // The group total was recomputed from the remaining rows.
        let group = fixture
            .state
            .store()
            .find_group(group_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(group.vote_count, 0);
    }
}
