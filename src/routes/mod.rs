use axum::Router;

use crate::state::SharedState;

/// Board WebSocket endpoint.
pub mod websocket;

/// Compose the route tree and wire in the shared state.
///
/// Session/participant creation and the read-only snapshot queries live in
/// the external CRUD service; the engine only exposes the real-time
/// endpoint.
pub fn router(state: SharedState) -> Router<()> {
    websocket::router().with_state(state)
}
