/// Phase tags and timer resolution.
pub mod phase;
/// Participant/connection bindings and typing markers.
pub mod presence;
/// Per-session broadcast hub and write gate.
pub mod room;

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::dao::SessionStore;

pub use self::room::{Audience, Room, RoomEvent};

/// Cheaply cloneable handle to the central application state.
pub type SharedState = Arc<AppState>;

/// Central application state: the installed store, the live room registry,
/// and the immutable runtime configuration.
pub struct AppState {
    store: Arc<dyn SessionStore>,
    rooms: DashMap<Uuid, Arc<Room>>,
    config: Arc<AppConfig>,
}

impl AppState {
    /// Construct the shared state around a storage backend.
    pub fn new(store: Arc<dyn SessionStore>, config: AppConfig) -> SharedState {
        Arc::new(Self {
            store,
            rooms: DashMap::new(),
            config: Arc::new(config),
        })
    }

    /// Handle to the installed storage backend.
    pub fn store(&self) -> Arc<dyn SessionStore> {
        self.store.clone()
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Room for a session, created on first use.
    pub fn room(&self, session_id: Uuid) -> Arc<Room> {
        self.rooms
            .entry(session_id)
            .or_insert_with(|| Arc::new(Room::new(session_id)))
            .clone()
    }

    /// Drop the room once its last connection is gone.
    pub fn release_room_if_idle(&self, session_id: Uuid) {
        self.rooms.remove_if(&session_id, |_, room| room.is_idle());
    }
}
