use std::time::SystemTime;

use uuid::Uuid;

use crate::{
    dto::{format_system_time, ws::ChangePhasePayload},
    error::ServiceError,
    services::{room_events, session_service::ensure_host},
    state::{
        Room, SharedState,
        phase::{TimerRequest, resolve_timer_end},
    },
};

/// Move the session to a new phase, resolving the advisory timer fields,
/// then broadcast the result to the whole room.
///
/// Only the connection currently bound to the host participant may
/// transition; a rejected request leaves phase and timer untouched.
pub async fn change_phase(
    state: &SharedState,
    room: &Room,
    connection_id: Uuid,
    payload: ChangePhasePayload,
) -> Result<(), ServiceError> {
    let mut session = ensure_host(state, room, connection_id).await?;

    let now = SystemTime::now();
    session.timer_end = resolve_timer_end(
        now,
        session.timer_end,
        TimerRequest {
            duration_secs: payload.timer_duration,
            stop: payload.stop_timer,
        },
    );
    if payload.stop_timer {
        session.timer_duration = None;
    } else if payload.timer_duration.is_some() {
        session.timer_duration = payload.timer_duration;
    }
    session.phase = payload.phase;
    session.updated_at = now;

    state.store().save_session(session.clone()).await?;
    room_events::notify_phase_changed(
        room,
        connection_id,
        session.phase,
        session.timer_end.map(format_system_time),
    );
    Ok(())
}
