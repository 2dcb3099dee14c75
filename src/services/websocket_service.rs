use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientCommand, ServerNotification},
    error::ServiceError,
    services::{board_service, phase_service, presentation, room_events, session_service, voting},
    state::{Audience, Room, SharedState},
};

/// How long a fresh connection gets to send its `join_session` frame.
const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle the full lifecycle for an individual board WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket join timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let command = match ClientCommand::from_json_str(&initial_message) {
        Ok(command) => command,
        Err(err) => {
            warn!(error = %err, "failed to parse or validate join frame");
            send_notification(&outbound_tx, &error_notification(&err));
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let ClientCommand::JoinSession(payload) = command else {
        warn!("first command was not join_session");
        send_notification(
            &outbound_tx,
            &ServerNotification::Error {
                message: "first command must be join_session".into(),
            },
        );
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    };

    let connection_id = Uuid::new_v4();
    let session_id = payload.session_id;
    let room = state.room(session_id);

    let outcome = {
        let _gate = room.lock().await;
        session_service::join(&state, &room, payload, connection_id).await
    };
    let participant = match outcome {
        Ok(outcome) => {
            send_notification(
                &outbound_tx,
                &ServerNotification::SessionJoined(outcome.snapshot),
            );
            room_events::notify_participant_joined(
                &room,
                connection_id,
                (outcome.participant.clone(), true).into(),
            );
            outcome.participant
        }
        Err(err) => {
            warn!(session_id = %session_id, error = %err, "join rejected");
            send_notification(&outbound_tx, &error_notification(&err));
            let _ = outbound_tx.send(Message::Close(None));
            state.release_room_if_idle(session_id);
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    info!(session_id = %session_id, participant_id = %participant.id, "participant connected");

    let forwarder = spawn_forwarder(&room, connection_id, outbound_tx.clone());

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientCommand::from_json_str(&text) {
                Ok(ClientCommand::JoinSession(_)) => {
                    warn!(participant_id = %participant.id, "ignoring duplicate join_session");
                }
                Ok(command) => {
                    // One command produces at most one reply; any failure
                    // inside the handler becomes an error notification for
                    // this connection only.
                    if let Err(err) = dispatch(
                        &state,
                        &room,
                        participant.id,
                        connection_id,
                        &outbound_tx,
                        command,
                    )
                    .await
                    {
                        warn!(participant_id = %participant.id, error = %err, "command rejected");
                        send_notification(&outbound_tx, &error_notification(&err));
                    }
                }
                Err(err) => {
                    warn!(participant_id = %participant.id, error = %err, "failed to parse or validate command");
                    send_notification(&outbound_tx, &error_notification(&err));
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(participant_id = %participant.id, "client closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(participant_id = %participant.id, error = %err, "websocket error");
                break;
            }
        }
    }

    {
        let _gate = room.lock().await;
        session_service::disconnect(&state, &room, participant.id, connection_id).await;
    }
    info!(session_id = %session_id, participant_id = %participant.id, "participant disconnected");

    forwarder.abort();
    // The room's subscriber count only drops once the forwarder is gone.
    let _ = forwarder.await;
    state.release_room_if_idle(session_id);
    finalize(writer_task, outbound_tx).await;
}

/// Route one parsed command to its handler.
///
/// State-mutating commands take the session's write gate for their whole
/// resolve + mutate + recompute + broadcast sequence; advisory typing
/// markers and the broadcast-only walkthrough do not.
async fn dispatch(
    state: &SharedState,
    room: &Room,
    participant_id: Uuid,
    connection_id: Uuid,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    command: ClientCommand,
) -> Result<(), ServiceError> {
    match command {
        // Handled at the handshake; duplicates are filtered by the caller.
        ClientCommand::JoinSession(_) => Ok(()),
        ClientCommand::TypingStart => {
            session_service::ensure_actor(room, participant_id, connection_id)?;
            room.presence().mark_typing(participant_id);
            room_events::notify_typing_start(room, connection_id, participant_id);
            Ok(())
        }
        ClientCommand::TypingStop => {
            session_service::ensure_actor(room, participant_id, connection_id)?;
            if room.presence().clear_typing(participant_id) {
                room_events::notify_typing_stop(room, connection_id, participant_id);
            }
            Ok(())
        }
        ClientCommand::StartPresentation => presentation::start(state, room, connection_id).await,
        ClientCommand::EndPresentation => presentation::end(state, room, connection_id).await,
        ClientCommand::NavigatePresentation { index } => {
            presentation::navigate(state, room, connection_id, index).await
        }
        ClientCommand::ChangePhase(payload) => {
            let _gate = room.lock().await;
            phase_service::change_phase(state, room, connection_id, payload).await
        }
        ClientCommand::AddResponse(payload) => {
            let _gate = room.lock().await;
            let response =
                board_service::add_response(state, room, participant_id, connection_id, payload)
                    .await?;
            // Raw creations stay private to their author.
            send_notification(outbound_tx, &ServerNotification::ResponseAdded { response });
            Ok(())
        }
        ClientCommand::UpdateResponse(payload) => {
            let _gate = room.lock().await;
            board_service::update_response(state, room, participant_id, connection_id, payload)
                .await
        }
        ClientCommand::DeleteResponse { response_id } => {
            let _gate = room.lock().await;
            board_service::delete_response(state, room, participant_id, connection_id, response_id)
                .await
        }
        ClientCommand::DragResponse(payload) => {
            let _gate = room.lock().await;
            board_service::drag_response(state, room, participant_id, connection_id, payload).await
        }
        ClientCommand::CreateGroup(payload) => {
            let _gate = room.lock().await;
            board_service::create_group(state, room, participant_id, connection_id, payload).await
        }
        ClientCommand::RenameGroup(payload) => {
            let _gate = room.lock().await;
            board_service::rename_group(state, room, participant_id, connection_id, payload).await
        }
        ClientCommand::DeleteGroup { group_id } => {
            let _gate = room.lock().await;
            board_service::delete_group(state, room, participant_id, connection_id, group_id).await
        }
        ClientCommand::CreateConnection {
            from_response_id,
            to_response_id,
        } => {
            let _gate = room.lock().await;
            board_service::create_connection(
                state,
                room,
                participant_id,
                connection_id,
                from_response_id,
                to_response_id,
            )
            .await
        }
        ClientCommand::RemoveConnection {
            connection_id: edge_id,
        } => {
            let _gate = room.lock().await;
            board_service::remove_connection(state, room, participant_id, connection_id, edge_id)
                .await
        }
        ClientCommand::CastVote(payload) => {
            let _gate = room.lock().await;
            voting::cast_vote(state, room, participant_id, connection_id, payload).await
        }
        ClientCommand::RemoveParticipant {
            participant_id: target_id,
        } => {
            let _gate = room.lock().await;
            session_service::remove_participant(
                state,
                room,
                participant_id,
                connection_id,
                target_id,
            )
            .await
        }
    }
}

/// Forward room events into this connection's writer, honoring the event
/// audience and skipping over lagged stretches.
fn spawn_forwarder(
    room: &Room,
    connection_id: Uuid,
    tx: mpsc::UnboundedSender<Message>,
) -> JoinHandle<()> {
    let mut events = room.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                event = events.recv() => match event {
                    Ok(event) => {
                        if event.audience == Audience::Others && event.origin == connection_id {
                            continue;
                        }
                        if !send_notification(&tx, &event.notification) {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        // Skip lagged events but keep the stream alive.
                        warn!(skipped, "room event stream lagged");
                        continue;
                    }
                }
            }
        }
    })
}

/// Serialize a notification and push it onto the connection's writer.
///
/// Returns `false` when the writer channel is closed. A serialization
/// failure is logged and swallowed, it is a bug here rather than something
/// the client can act on.
fn send_notification(tx: &mpsc::UnboundedSender<Message>, notification: &ServerNotification) -> bool {
    let payload = match serde_json::to_string(notification) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize notification");
            return true;
        }
    };
    tx.send(Message::Text(payload.into())).is_ok()
}

fn error_notification(err: &ServiceError) -> ServerNotification {
    ServerNotification::Error {
        message: err.to_string(),
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
