use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use uuid::Uuid;

use crate::dao::SessionStore;
use crate::dao::models::{
    ConnectionEntity, GroupEntity, ParticipantEntity, ResponseEntity, SessionEntity, VoteEntity,
};
use crate::dao::storage::StorageResult;

/// Insertion-ordered tables shared by every handle to the store.
#[derive(Default)]
struct Tables {
    sessions: IndexMap<Uuid, SessionEntity>,
    participants: IndexMap<Uuid, ParticipantEntity>,
    responses: IndexMap<Uuid, ResponseEntity>,
    groups: IndexMap<Uuid, GroupEntity>,
    connections: IndexMap<Uuid, ConnectionEntity>,
    votes: IndexMap<(Uuid, Uuid), VoteEntity>,
}

/// In-memory [`SessionStore`] used by default at startup and throughout the
/// engine's tests. State does not survive a restart.
#[derive(Default, Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(tables: &Mutex<Tables>) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock cannot leave the tables half-written,
        // so a poisoned guard is still usable.
        tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for MemoryStore {
    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(Self::lock(&tables).sessions.get(&id).cloned()) })
    }

    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            Self::lock(&tables).sessions.insert(session.id, session);
            Ok(())
        })
    }

    fn find_participant(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(Self::lock(&tables).participants.get(&id).cloned()) })
    }

    fn list_participants(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            Ok(Self::lock(&tables)
                .participants
                .values()
                .filter(|participant| participant.session_id == session_id)
                .cloned()
                .collect())
        })
    }

    fn save_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            Self::lock(&tables)
                .participants
                .insert(participant.id, participant);
            Ok(())
        })
    }

    fn delete_participant(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            Self::lock(&tables).participants.shift_remove(&id);
            Ok(())
        })
    }

    fn find_response(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ResponseEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(Self::lock(&tables).responses.get(&id).cloned()) })
    }

    fn list_responses(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ResponseEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            Ok(Self::lock(&tables)
                .responses
                .values()
                .filter(|response| response.session_id == session_id)
                .cloned()
                .collect())
        })
    }

    fn save_response(&self, response: ResponseEntity) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            Self::lock(&tables).responses.insert(response.id, response);
            Ok(())
        })
    }

    fn delete_response(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            Self::lock(&tables).responses.shift_remove(&id);
            Ok(())
        })
    }

    fn find_group(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GroupEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(Self::lock(&tables).groups.get(&id).cloned()) })
    }

    fn list_groups(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GroupEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            Ok(Self::lock(&tables)
                .groups
                .values()
                .filter(|group| group.session_id == session_id)
                .cloned()
                .collect())
        })
    }

    fn save_group(&self, group: GroupEntity) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            Self::lock(&tables).groups.insert(group.id, group);
            Ok(())
        })
    }

    fn delete_group(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            Self::lock(&tables).groups.shift_remove(&id);
            Ok(())
        })
    }

    fn find_connection(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ConnectionEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(Self::lock(&tables).connections.get(&id).cloned()) })
    }

    fn list_connections(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ConnectionEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            Ok(Self::lock(&tables)
                .connections
                .values()
                .filter(|connection| connection.session_id == session_id)
                .cloned()
                .collect())
        })
    }

    fn save_connection(
        &self,
        connection: ConnectionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            Self::lock(&tables)
                .connections
                .insert(connection.id, connection);
            Ok(())
        })
    }

    fn delete_connection(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            Self::lock(&tables).connections.shift_remove(&id);
            Ok(())
        })
    }

    fn list_votes(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            Ok(Self::lock(&tables)
                .votes
                .values()
                .filter(|vote| vote.session_id == session_id)
                .cloned()
                .collect())
        })
    }

    fn save_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            Self::lock(&tables)
                .votes
                .insert((vote.participant_id, vote.group_id), vote);
            Ok(())
        })
    }

    fn delete_vote(
        &self,
        participant_id: Uuid,
        group_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            Self::lock(&tables)
                .votes
                .shift_remove(&(participant_id, group_id));
            Ok(())
        })
    }

    fn delete_votes_for_group(&self, group_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            Self::lock(&tables)
                .votes
                .retain(|_, vote| vote.group_id != group_id);
            Ok(())
        })
    }

    fn delete_votes_for_participant(
        &self,
        participant_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            Self::lock(&tables)
                .votes
                .retain(|_, vote| vote.participant_id != participant_id);
            Ok(())
        })
    }
}
