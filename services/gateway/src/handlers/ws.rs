use crate::auth::AuthenticatedPlayer;
use crate::error::AppError;
use crate::models::{ClientMessage, ServerMessage};
use crate::rate_limit::{WS_CONNECTIONS, WS_MESSAGES};
use crate::state::AppState;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use match_engine::{ActionOutcome, MatchAction};
use matchmaking::LeaveReason;
use tracing::{debug, info, warn};
use types::errors::{ActionError, QueueError};
use types::ids::{MatchId, PlayerId};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    player: AuthenticatedPlayer,
) -> Result<Response, AppError> {
    state.rate_limiter.check(player.player_id, &WS_CONNECTIONS)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, player.player_id)))
}

async fn handle_socket(socket: WebSocket, state: AppState, player: PlayerId) {
    let (session_id, mut outbound) = state.sessions.register(player);
    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!(player_id = %player, error = %e, "Unserializable message");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    info!(player_id = %player, session_id, online = state.sessions.online_count(), "Socket opened");
    let _ = state.sessions.push(player, ServerMessage::Welcome { player_id: player });
    rejoin_live_match(&state, player).await;

    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };
        if let Err(e) = state.rate_limiter.check(player, &WS_MESSAGES) {
            reply(&state, player, rejection(None, None, e.code(), e.to_string()));
            continue;
        }
        match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(message) => handle_message(&state, player, message).await,
            Err(e) => reply(&state, player, rejection(None, None, "bad_message", e.to_string())),
        }
    }

    writer.abort();
    // A newer socket for the same player keeps the match and the queue entry
    if state.sessions.unregister(&player, session_id) {
        on_disconnect(&state, player).await;
    }
    info!(player_id = %player, session_id, "Socket closed");
}

async fn rejoin_live_match(state: &AppState, player: PlayerId) {
    let Some(match_id) = state.registry.match_of(&player) else {
        return;
    };
    match state.registry.act(&match_id, player, MatchAction::Reconnect).await {
        Ok(outcome) => reply(
            state,
            player,
            ServerMessage::ActionResult {
                match_id,
                action: MatchAction::Reconnect.name().to_string(),
                outcome,
            },
        ),
        Err(e) => {
            debug!(match_id = %match_id, player_id = %player, reason = e.reason_code(), "Rejoin refused");
            reply(state, player, ServerMessage::rejected_action(match_id, &MatchAction::Reconnect, &e));
        }
    }
}

async fn handle_message(state: &AppState, player: PlayerId, message: ClientMessage) {
    match message {
        ClientMessage::Action { match_id, action } => {
            if let MatchAction::IntegrityAlert { .. } = action {
                let err = ActionError::NotPermitted {
                    action: action.name().to_string(),
                };
                reply(state, player, ServerMessage::rejected_action(match_id, &action, &err));
                return;
            }
            match state.registry.act(&match_id, player, action.clone()).await {
                // Pongs are fire and forget
                Ok(ActionOutcome::Ack) if matches!(action, MatchAction::Pong { .. }) => {}
                Ok(outcome) => reply(
                    state,
                    player,
                    ServerMessage::ActionResult {
                        match_id,
                        action: action.name().to_string(),
                        outcome,
                    },
                ),
                Err(e) => reply(state, player, ServerMessage::rejected_action(match_id, &action, &e)),
            }
        }
        ClientMessage::Snapshot { match_id } => match state.registry.snapshot(&match_id, player).await {
            Ok(snapshot) => reply(
                state,
                player,
                ServerMessage::Snapshot {
                    snapshot: Box::new(snapshot),
                },
            ),
            Err(e) => reply(state, player, rejection(Some(match_id), None, e.reason_code(), e.to_string())),
        },
        ClientMessage::LeaveQueue => {
            if let Err(e) = state.queue.leave_player(player, LeaveReason::Requested).await {
                reply(
                    state,
                    player,
                    rejection(None, Some("leave_queue"), e.reason_code(), e.to_string()),
                );
            }
        }
    }
}

/// Socket gone: drop out of the queue and start the reconnect clock
async fn on_disconnect(state: &AppState, player: PlayerId) {
    match state.queue.leave_player(player, LeaveReason::Disconnected).await {
        Ok(()) | Err(QueueError::NotQueued) => {}
        Err(e) => warn!(player_id = %player, error = %e, "Could not drop queue entry"),
    }
    let Some(match_id) = state.registry.match_of(&player) else {
        return;
    };
    if let Err(e) = state.registry.act(&match_id, player, MatchAction::Disconnect).await {
        debug!(match_id = %match_id, player_id = %player, reason = e.reason_code(), "Disconnect not recorded");
    }
}

fn rejection(match_id: Option<MatchId>, action: Option<&str>, reason: &str, message: String) -> ServerMessage {
    ServerMessage::Rejected {
        match_id,
        action: action.map(str::to_string),
        reason: reason.to_string(),
        message,
    }
}

fn reply(state: &AppState, player: PlayerId, message: ServerMessage) {
    if let Err(e) = state.sessions.push(player, message) {
        debug!(player_id = %player, error = %e, "Reply dropped");
    }
}
