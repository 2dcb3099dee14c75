use std::collections::HashSet;

use uuid::Uuid;

use crate::{
    dao::models::{GroupEntity, ResponseEntity},
    error::ServiceError,
    services::room_events,
    state::{Room, SharedState},
};

/// Label budget for a group materialized from a single response.
const SINGLE_LABEL_MAX: usize = 30;
/// Label budget for a group materialized from a connected chain.
const CHAIN_LABEL_MAX: usize = 80;

/// A voting/grouping target, parsed once at the boundary.
///
/// Clients address not-yet-persisted grouping targets through encoded
/// virtual identifiers; the two virtual forms are materialized into a
/// persisted group on first use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteTarget {
    /// An already persisted group.
    Group(Uuid),
    /// A single ungrouped response.
    Response(Uuid),
    /// An ordered set of responses forming a previously drawn chain.
    Chain(Vec<Uuid>),
}

/// Parse an encoded target: `group:<uuid>`, `response:<uuid>`, or
/// `chain:<uuid>,<uuid>[,...]`.
pub fn parse_vote_target(raw: &str) -> Result<VoteTarget, ServiceError> {
    let malformed = || ServiceError::InvalidInput(format!("malformed vote target `{raw}`"));

    if let Some(rest) = raw.strip_prefix("group:") {
        return Uuid::parse_str(rest)
            .map(VoteTarget::Group)
            .map_err(|_| malformed());
    }
    if let Some(rest) = raw.strip_prefix("response:") {
        return Uuid::parse_str(rest)
            .map(VoteTarget::Response)
            .map_err(|_| malformed());
    }
    if let Some(rest) = raw.strip_prefix("chain:") {
        let ids = rest
            .split(',')
            .map(Uuid::parse_str)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| malformed())?;
        if ids.len() < 2 {
            return Err(ServiceError::InvalidInput(format!(
                "chain target `{raw}` needs at least two responses"
            )));
        }
        let unique: HashSet<_> = ids.iter().collect();
        if unique.len() != ids.len() {
            return Err(ServiceError::InvalidInput(format!(
                "chain target `{raw}` repeats a response"
            )));
        }
        return Ok(VoteTarget::Chain(ids));
    }
    Err(malformed())
}

/// Resolve a parsed target to a persisted group, materializing the virtual
/// forms on first use.
///
/// Callers hold the session's write gate, which is what makes the
/// find-or-create step atomic per session: two concurrent requests for the
/// same virtual identifier cannot both take the create path.
pub(crate) async fn resolve_target(
    state: &SharedState,
    room: &Room,
    origin: Uuid,
    raw: &str,
    target: VoteTarget,
) -> Result<GroupEntity, ServiceError> {
    match target {
        VoteTarget::Group(id) => state
            .store()
            .find_group(id)
            .await?
            .filter(|group| group.session_id == room.session_id())
            .ok_or_else(|| ServiceError::NotFound(format!("group `{id}` not found in session"))),
        VoteTarget::Response(id) => materialize(state, room, origin, raw, &[id]).await,
        VoteTarget::Chain(ids) => materialize(state, room, origin, raw, &ids).await,
    }
}

/// Find or create the persisted group for a set of referenced responses.
async fn materialize(
    state: &SharedState,
    room: &Room,
    origin: Uuid,
    raw: &str,
    response_ids: &[Uuid],
) -> Result<GroupEntity, ServiceError> {
    let store = state.store();
    let session_id = room.session_id();

    let mut responses = Vec::with_capacity(response_ids.len());
    for id in response_ids {
        let response = store
            .find_response(*id)
            .await?
            .filter(|response| response.session_id == session_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("response `{id}` not found in session"))
            })?;
        responses.push(response);
    }

    // Reuse the group a referenced response already landed in rather than
    // creating a duplicate for the same virtual identifier.
    for response in &responses {
        if let Some(group_id) = response.group_id {
            return store
                .find_group(group_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("group `{group_id}` not found")));
        }
    }

    let first = &responses[0];
    let group = GroupEntity {
        id: Uuid::new_v4(),
        session_id,
        label: derive_label(&responses),
        color: state.config().group_color(first.category),
        x: first.x,
        y: first.y,
        vote_count: 0,
    };
    store.save_group(group.clone()).await?;

    for mut response in responses {
        response.group_id = Some(group.id);
        store.save_response(response).await?;
    }

    room_events::notify_connected_group_created(
        room,
        origin,
        raw.to_string(),
        group.clone().into(),
    );
    Ok(group)
}

fn derive_label(responses: &[ResponseEntity]) -> String {
    if let [single] = responses {
        return truncate_chars(single.content.trim(), SINGLE_LABEL_MAX);
    }
    let joined = responses
        .iter()
        .map(|response| response.content.trim())
        .collect::<Vec<_>>()
        .join(" / ");
    if joined.chars().count() > CHAIN_LABEL_MAX {
        let mut label = truncate_chars(&joined, CHAIN_LABEL_MAX - 3);
        label.push_str("...");
        label
    } else {
        joined
    }
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
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
            models::{Category, SessionEntity},
        },
        state::{AppState, SharedState, phase::RetroPhase},
    };

    fn sample_response(session_id: Uuid, content: &str, category: Category) -> ResponseEntity {
        ResponseEntity {
            id: Uuid::new_v4(),
            session_id,
            participant_id: Uuid::new_v4(),
            content: content.into(),
            category,
            x: 12.0,
            y: 34.0,
            group_id: None,
        }
    }

    async fn setup() -> (SharedState, Arc<crate::state::Room>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let session_id = Uuid::new_v4();
        let now = SystemTime::now();
        store
            .save_session(SessionEntity {
                id: session_id,
                invite_code: "retro-1".into(),
                host_id: None,
                phase: RetroPhase::Vote,
                timer_duration: None,
                timer_end: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        let state = AppState::new(store, AppConfig::default());
        let room = state.room(session_id);
        (state, room, session_id)
    }

    #[test]
    fn parses_every_target_form() {
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert_eq!(
            parse_vote_target(&format!("group:{id}")).unwrap(),
            VoteTarget::Group(id)
        );
        assert_eq!(
            parse_vote_target(&format!("response:{id}")).unwrap(),
            VoteTarget::Response(id)
        );
        assert_eq!(
            parse_vote_target(&format!("chain:{id},{other}")).unwrap(),
            VoteTarget::Chain(vec![id, other])
        );
    }

    #[test]
    fn rejects_malformed_targets() {
        let id = Uuid::new_v4();
        assert!(parse_vote_target("").is_err());
        assert!(parse_vote_target("group:not-a-uuid").is_err());
        assert!(parse_vote_target(&format!("cluster:{id}")).is_err());
        assert!(parse_vote_target(&format!("chain:{id}")).is_err());
        assert!(parse_vote_target(&format!("chain:{id},{id}")).is_err());
    }

    #[test]
    fn single_response_labels_are_cut_at_thirty_chars() {
        let session_id = Uuid::new_v4();
        let long = "a".repeat(64);
        let response = sample_response(session_id, &long, Category::WentWell);
        assert_eq!(derive_label(std::slice::from_ref(&response)), "a".repeat(30));
    }

    #[test]
    fn chain_labels_join_and_ellipsize() {
        let session_id = Uuid::new_v4();
        let first = sample_response(session_id, "short one", Category::WentWell);
        let second = sample_response(session_id, "short two", Category::WentWell);
        assert_eq!(
            derive_label(&[first.clone(), second]),
            "short one / short two"
        );

        let long = sample_response(session_id, &"b".repeat(100), Category::WentWell);
        let label = derive_label(&[first, long]);
        assert_eq!(label.chars().count(), CHAIN_LABEL_MAX);
        assert!(label.ends_with("..."));
    }

    #[tokio::test]
    async fn materializes_a_single_response_once() {
        let (state, room, session_id) = setup().await;
        let response = sample_response(session_id, "improve standups", Category::NeedsImprovement);
        state.store().save_response(response.clone()).await.unwrap();

        let raw = format!("response:{}", response.id);
        let target = parse_vote_target(&raw).unwrap();
        let origin = Uuid::new_v4();

        let group = resolve_target(&state, &room, origin, &raw, target.clone())
            .await
            .unwrap();
        assert_eq!(group.label, "improve standups");
        assert_eq!(
            group.color,
            state.config().group_color(Category::NeedsImprovement)
        );
        assert_eq!((group.x, group.y), (response.x, response.y));

        // Resolving the same virtual identifier again reuses the group.
        let again = resolve_target(&state, &room, origin, &raw, target)
            .await
            .unwrap();
        assert_eq!(again.id, group.id);
        assert_eq!(state.store().list_groups(session_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn chain_materialization_assigns_every_member() {
        let (state, room, session_id) = setup().await;
        let first = sample_response(session_id, "ci is slow", Category::NeedsImprovement);
        let second = sample_response(session_id, "flaky tests", Category::NeedsImprovement);
        state.store().save_response(first.clone()).await.unwrap();
        state.store().save_response(second.clone()).await.unwrap();

        let raw = format!("chain:{},{}", first.id, second.id);
        let target = parse_vote_target(&raw).unwrap();
        let group = resolve_target(&state, &room, Uuid::new_v4(), &raw, target)
            .await
            .unwrap();

        for id in [first.id, second.id] {
            let stored = state.store().find_response(id).await.unwrap().unwrap();
            assert_eq!(stored.group_id, Some(group.id));
        }
    }

    #[tokio::test]
    async fn rejects_targets_outside_the_session() {
        let (state, room, _session_id) = setup().await;
        let foreign = sample_response(Uuid::new_v4(), "elsewhere", Category::WentWell);
        state.store().save_response(foreign.clone()).await.unwrap();

        let raw = format!("response:{}", foreign.id);
        let target = parse_vote_target(&raw).unwrap();
        let result = resolve_target(&state, &room, Uuid::new_v4(), &raw, target).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn concurrent_resolution_creates_exactly_one_group() {
        let (state, room, session_id) = setup().await;
        let response = sample_response(session_id, "double vote race", Category::WentWell);
        state.store().save_response(response.clone()).await.unwrap();

        let raw = format!("response:{}", response.id);
        let mut handles = Vec::new();
        for _ in 0..2 {
            let state = state.clone();
            let room = room.clone();
            let raw = raw.clone();
            handles.push(tokio::spawn(async move {
                // Mirrors the dispatcher: mutations run under the session gate.
                let _gate = room.lock().await;
                let target = parse_vote_target(&raw).unwrap();
                resolve_target(&state, &room, Uuid::new_v4(), &raw, target).await
            }));
        }

        let mut group_ids = HashSet::new();
        for handle in handles {
            group_ids.insert(handle.await.unwrap().unwrap().id);
        }
        assert_eq!(group_ids.len(), 1);
        assert_eq!(state.store().list_groups(session_id).await.unwrap().len(), 1);
    }
}
