use indexmap::IndexMap;
use uuid::Uuid;

use crate::{
    dao::models::{ParticipantEntity, VoteEntity},
    dto::{board::VotesUpdate, ws::CastVotePayload},
    error::ServiceError,
    services::{grouping, room_events, session_service},
    state::{Room, SharedState},
};

/// Fixed total vote budget each participant may distribute across groups.
pub const VOTE_BUDGET: u8 = 4;

/// Total votes a participant has allocated, summed from the rows.
pub fn allocation(votes: &[VoteEntity], participant_id: Uuid) -> u8 {
    votes
        .iter()
        .filter(|vote| vote.participant_id == participant_id)
        .map(|vote| vote.count)
        .sum()
}

/// A group's vote total, summed from the rows.
pub fn group_total(votes: &[VoteEntity], group_id: Uuid) -> u32 {
    votes
        .iter()
        .filter(|vote| vote.group_id == group_id)
        .map(|vote| u32::from(vote.count))
        .sum()
}

/// Remaining budget per participant, recomputed fresh from the rows.
pub fn remaining_budgets(
    votes: &[VoteEntity],
    participants: &[ParticipantEntity],
) -> IndexMap<Uuid, u8> {
    participants
        .iter()
        .map(|participant| {
            let spent = allocation(votes, participant.id);
            (participant.id, VOTE_BUDGET.saturating_sub(spent))
        })
        .collect()
}

/// Allocate votes on a persisted or virtual target.
///
/// The participant's new total is checked against the budget before any
/// write: the requested count replaces whatever was already allocated to the
/// target, a zero count withdraws the allocation entirely. The target
/// group's total is then recomputed from the rows and broadcast together
/// with every participant's remaining budget.
pub async fn cast_vote(
    state: &SharedState,
    room: &Room,
    participant_id: Uuid,
    connection_id: Uuid,
    payload: CastVotePayload,
) -> Result<(), ServiceError> {
    session_service::ensure_actor(room, participant_id, connection_id)?;

    let target = grouping::parse_vote_target(&payload.target)?;
    let group =
        grouping::resolve_target(state, room, connection_id, &payload.target, target).await?;

    let store = state.store();
    let session_id = room.session_id();
    let votes = store.list_votes(session_id).await?;

    let current = votes
        .iter()
        .find(|vote| vote.participant_id == participant_id && vote.group_id == group.id)
        .map(|vote| vote.count)
        .unwrap_or(0);
    let elsewhere = allocation(&votes, participant_id) - current;

    if elsewhere + payload.count > VOTE_BUDGET {
        return Err(ServiceError::QuotaExceeded(format!(
            "{elsewhere} votes already allocated elsewhere, {} requested (budget {VOTE_BUDGET})",
            payload.count
        )));
    }

    if payload.count == 0 {
        store.delete_vote(participant_id, group.id).await?;
    } else {
        store
            .save_vote(VoteEntity {
                session_id,
                participant_id,
                group_id: group.id,
                count: payload.count,
            })
            .await?;
    }

    recompute_and_broadcast(state, room, connection_id, group.id).await
}

/// Recompute a group's total from the vote rows, persist it, and broadcast
/// the new total plus every participant's remaining budget.
pub(crate) async fn recompute_and_broadcast(
    state: &SharedState,
    room: &Room,
    origin: Uuid,
    group_id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.store();
    let session_id = room.session_id();

    let votes = store.list_votes(session_id).await?;
    let total = group_total(&votes, group_id);

    if let Some(mut group) = store.find_group(group_id).await? {
        group.vote_count = total;
        store.save_group(group).await?;
    }

    let participants = store.list_participants(session_id).await?;
    room_events::notify_votes_updated(
        room,
        origin,
        VotesUpdate {
            group_id,
            vote_count: total,
            remaining_budgets: remaining_budgets(&votes, &participants),
        },
    );
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
            models::{GroupEntity, SessionEntity},
        },
        state::{AppState, SharedState, phase::RetroPhase},
    };

    struct Fixture {
        state: SharedState,
        room: Arc<crate::state::Room>,
        session_id: Uuid,
        participant_id: Uuid,
        connection_id: Uuid,
    }

    async fn setup() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let session_id = Uuid::new_v4();
        let now = SystemTime::now();
        store
            .save_session(SessionEntity {
                id: session_id,
                invite_code: "retro-2".into(),
                host_id: None,
                phase: RetroPhase::Vote,
                timer_duration: None,
                timer_end: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let participant_id = Uuid::new_v4();
        store
            .save_participant(ParticipantEntity {
                id: participant_id,
                session_id,
                name: "Alice".into(),
                avatar: "fox".into(),
                is_host: true,
                last_active: now,
            })
            .await
            .unwrap();

        let state = AppState::new(store, AppConfig::default());
        let room = state.room(session_id);
        let connection_id = Uuid::new_v4();
        room.presence().bind(participant_id, connection_id);

        Fixture {
            state,
            room,
            session_id,
            participant_id,
            connection_id,
        }
    }

    async fn seed_group(fixture: &Fixture, label: &str) -> Uuid {
        let group = GroupEntity {
            id: Uuid::new_v4(),
            session_id: fixture.session_id,
            label: label.into(),
            color: "#94a3b8".into(),
            x: 0.0,
            y: 0.0,
            vote_count: 0,
        };
        fixture
            .state
            .store()
            .save_group(group.clone())
            .await
            .unwrap();
        group.id
    }

    async fn cast(fixture: &Fixture, group_id: Uuid, count: u8) -> Result<(), ServiceError> {
        cast_vote(
            &fixture.state,
            &fixture.room,
            fixture.participant_id,
            fixture.connection_id,
            CastVotePayload {
                target: format!("group:{group_id}"),
                count,
            },
        )
        .await
    }

    async fn stored_total(fixture: &Fixture, group_id: Uuid) -> u32 {
        fixture
            .state
            .store()
            .find_group(group_id)
            .await
            .unwrap()
            .unwrap()
            .vote_count
    }

    #[tokio::test]
    async fn recasting_replaces_the_allocation() {
        let fixture = setup().await;
        let group = seed_group(&fixture, "standups").await;

        cast(&fixture, group, 3).await.unwrap();
        assert_eq!(stored_total(&fixture, group).await, 3);

        // A second cast replaces the allocation, it does not stack to 5.
        cast(&fixture, group, 2).await.unwrap();
        assert_eq!(stored_total(&fixture, group).await, 2);

        let votes = fixture
            .state
            .store()
            .list_votes(fixture.session_id)
            .await
            .unwrap();
        assert_eq!(allocation(&votes, fixture.participant_id), 2);
    }

    #[tokio::test]
    async fn over_budget_casts_are_rejected_without_writes() {
        let fixture = setup().await;
        let first = seed_group(&fixture, "first").await;
        let second = seed_group(&fixture, "second").await;

        cast(&fixture, first, 3).await.unwrap();
        let err = cast(&fixture, second, 2).await.unwrap_err();
        assert!(matches!(err, ServiceError::QuotaExceeded(_)));

        assert_eq!(stored_total(&fixture, first).await, 3);
        assert_eq!(stored_total(&fixture, second).await, 0);
        let votes = fixture
            .state
            .store()
            .list_votes(fixture.session_id)
            .await
            .unwrap();
        assert_eq!(allocation(&votes, fixture.participant_id), 3);
    }

    #[tokio::test]
    async fn a_zero_count_withdraws_the_allocation() {
        let fixture = setup().await;
        let group = seed_group(&fixture, "ci").await;

        cast(&fixture, group, 4).await.unwrap();
        cast(&fixture, group, 0).await.unwrap();

        assert_eq!(stored_total(&fixture, group).await, 0);
        let votes = fixture
            .state
            .store()
            .list_votes(fixture.session_id)
            .await
            .unwrap();
        assert!(votes.is_empty());
    }

    #[tokio::test]
    async fn totals_sum_across_participants() {
        let fixture = setup().await;
        let group = seed_group(&fixture, "shared").await;

        let other_participant = Uuid::new_v4();
        let other_connection = Uuid::new_v4();
        fixture
            .state
            .store()
            .save_participant(ParticipantEntity {
                id: other_participant,
                session_id: fixture.session_id,
                name: "Bob".into(),
                avatar: "owl".into(),
                is_host: false,
                last_active: SystemTime::now(),
            })
            .await
            .unwrap();
        fixture
            .room
            .presence()
            .bind(other_participant, other_connection);

        cast(&fixture, group, 3).await.unwrap();
        cast_vote(
            &fixture.state,
            &fixture.room,
            other_participant,
            other_connection,
            CastVotePayload {
                target: format!("group:{group}"),
                count: 2,
            },
        )
        .await
        .unwrap();

        assert_eq!(stored_total(&fixture, group).await, 5);

        let votes = fixture
            .state
            .store()
            .list_votes(fixture.session_id)
            .await
            .unwrap();
        let participants = fixture
            .state
            .store()
            .list_participants(fixture.session_id)
            .await
            .unwrap();
        let budgets = remaining_budgets(&votes, &participants);
        assert_eq!(budgets[&fixture.participant_id], 1);
        assert_eq!(budgets[&other_participant], 2);
    }

    #[tokio::test]
    async fn concurrent_casts_never_break_the_budget() {
        let fixture = setup().await;
        let first = seed_group(&fixture, "first").await;
        let second = seed_group(&fixture, "second").await;

        let mut handles = Vec::new();
        for group_id in [first, second] {
            let state = fixture.state.clone();
            let room = fixture.room.clone();
            let participant_id = fixture.participant_id;
            let connection_id = fixture.connection_id;
            handles.push(tokio::spawn(async move {
                // Mirrors the dispatcher: mutations run under the session gate.
                let _gate = room.lock().await;
                cast_vote(
                    &state,
                    &room,
                    participant_id,
                    connection_id,
                    CastVotePayload {
                        target: format!("group:{group_id}"),
                        count: 3,
                    },
                )
                .await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }
        // 3 + 3 exceeds the budget, so exactly one cast can land.
        assert_eq!(accepted, 1);

        let votes = fixture
            .state
            .store()
            .list_votes(fixture.session_id)
            .await
            .unwrap();
        assert!(allocation(&votes, fixture.participant_id) <= VOTE_BUDGET);
    }

    #[tokio::test]
    async fn a_stale_connection_cannot_vote() {
        let fixture = setup().await;
        let group = seed_group(&fixture, "stale").await;

        // The participant reconnected elsewhere; the old binding is gone.
        let fresh_connection = Uuid::new_v4();
        fixture
            .room
            .presence()
            .bind(fixture.participant_id, fresh_connection);

        let err = cast(&fixture, group, 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }
}
