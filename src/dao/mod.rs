/// In-memory reference store backing the engine by default.
pub mod memory;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    ConnectionEntity, GroupEntity, ParticipantEntity, ResponseEntity, SessionEntity, VoteEntity,
};
use crate::dao::storage::StorageResult;

/// Abstraction over the durable store backing sessions, participants,
/// responses, groups, connections, and votes.
///
/// Every real-time operation reads and writes through this trait
/// synchronously; the relational backend's schema and persistence mechanics
/// live behind it.
pub trait SessionStore: Send + Sync {
    /// Look up a session by id.
    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// Insert or replace a session.
    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Look up a participant by id.
    fn find_participant(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>>;
    /// All participants of a session, in join order.
    fn list_participants(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>>;
    /// Insert or replace a participant.
    fn save_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete a participant row.
    fn delete_participant(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;

    /// Look up a response by id.
    fn find_response(&self, id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<ResponseEntity>>>;
    /// All responses of a session, in creation order.
    fn list_responses(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ResponseEntity>>>;
    /// Insert or replace a response.
    fn save_response(&self, response: ResponseEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete a response row.
    fn delete_response(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;

    /// Look up a group by id.
    fn find_group(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GroupEntity>>>;
    /// All groups of a session, in creation order.
    fn list_groups(&self, session_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<GroupEntity>>>;
    /// Insert or replace a group.
    fn save_group(&self, group: GroupEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete a group row.
    fn delete_group(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;

    /// Look up a connection by id.
    fn find_connection(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ConnectionEntity>>>;
    /// All connections of a session.
    fn list_connections(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ConnectionEntity>>>;
    /// Insert a connection.
    fn save_connection(
        &self,
        connection: ConnectionEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete a connection row.
    fn delete_connection(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;

    /// All vote rows of a session.
    fn list_votes(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>>;
    /// Insert or replace the vote row keyed by `(participant, group)`.
    fn save_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete the vote row keyed by `(participant, group)` if it exists.
    fn delete_vote(
        &self,
        participant_id: Uuid,
        group_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete every vote row referencing a group.
    fn delete_votes_for_group(&self, group_id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete every vote row cast by a participant.
    fn delete_votes_for_participant(
        &self,
        participant_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>>;
}
