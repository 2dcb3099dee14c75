/// Board store operations: responses, groups, connections.
pub mod board_service;
/// Virtual target parsing and group materialization.
pub mod grouping;
/// Host-gated phase transitions.
pub mod phase_service;
/// Broadcast-only presentation navigator.
pub mod presentation;
/// Room-scoped notification fan-out helpers.
pub mod room_events;
/// Session join/leave and participant removal.
pub mod session_service;
/// Vote ledger with the fixed per-participant budget.
pub mod voting;
/// WebSocket connection lifecycle and command dispatch.
pub mod websocket_service;
