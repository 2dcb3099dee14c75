//! Host-driven walkthrough of the results.
//!
//! Nothing here is persisted: start, end, and the current index are
//! broadcast-only, so a reconnecting client cannot recover the walkthrough
//! position from the server.

use uuid::Uuid;

use crate::{
    error::ServiceError,
    services::{room_events, session_service::ensure_host},
    state::{Room, SharedState},
};

/// Begin the walkthrough.
pub async fn start(
    state: &SharedState,
    room: &Room,
    connection_id: Uuid,
) -> Result<(), ServiceError> {
    ensure_host(state, room, connection_id).await?;
    room_events::notify_presentation_started(room, connection_id);
    Ok(())
}

/// End the walkthrough.
pub async fn end(
    state: &SharedState,
    room: &Room,
    connection_id: Uuid,
) -> Result<(), ServiceError> {
    ensure_host(state, room, connection_id).await?;
    room_events::notify_presentation_ended(room, connection_id);
    Ok(())
}

/// Move the walkthrough to an index.
///
/// The index is forwarded untouched: the host is trusted, and the server
/// does not know how many presentable items the clients are rendering.
pub async fn navigate(
    state: &SharedState,
    room: &Room,
    connection_id: Uuid,
    index: u64,
) -> Result<(), ServiceError> {
    ensure_host(state, room, connection_id).await?;
    room_events::notify_presentation_navigate(room, connection_id, index);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::SystemTime;

    use crate::{
        config::AppConfig,
        dao::{
            SessionStore,
            memory::MemoryStore,
            models::{ParticipantEntity, SessionEntity},
        },
        dto::ws::ServerNotification,
        state::{AppState, SharedState, phase::RetroPhase},
    };

    async fn setup() -> (SharedState, Arc<crate::state::Room>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let session_id = Uuid::new_v4();
        let host_id = Uuid::new_v4();
        let now = SystemTime::now();
        store
            .save_session(SessionEntity {
                id: session_id,
                invite_code: "retro-5".into(),
                host_id: Some(host_id),
                phase: RetroPhase::Discuss,
                timer_duration: None,
                timer_end: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        store
            .save_participant(ParticipantEntity {
                id: host_id,
                session_id,
                name: "Host".into(),
                avatar: "crown".into(),
                is_host: true,
                last_active: now,
            })
            .await
            .unwrap();

        let state = AppState::new(store, AppConfig::default());
        let room = state.room(session_id);
        let host_connection = Uuid::new_v4();
        room.presence().bind(host_id, host_connection);
        (state, room, host_connection)
    }

    #[tokio::test]
    async fn navigate_broadcasts_the_raw_index() {
        let (state, room, host_connection) = setup().await;
        let mut events = room.subscribe();

        navigate(&state, &room, host_connection, 9999).await.unwrap();

        let event = events.recv().await.unwrap();
        match event.notification {
            ServerNotification::PresentationNavigate { index } => assert_eq!(index, 9999),
            other => panic!("unexpected notification: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_hosts_cannot_drive_the_walkthrough() {
        let (state, room, _host_connection) = setup().await;
        let stranger = Uuid::new_v4();

        assert!(matches!(
            start(&state, &room, stranger).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            end(&state, &room, stranger).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            navigate(&state, &room, stranger, 0).await,
            Err(ServiceError::Unauthorized(_))
        ));
    }
}
