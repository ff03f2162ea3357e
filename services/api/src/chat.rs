//! Per-activity comment relay over WebSockets
//!
//! Each activity with at least one connected client owns a broadcast channel.
//! The channel is created by the first subscriber and dropped with the last.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use common::{
    Outcome,
    jwt::Claims,
    models::{ClientChatEvent, CommentDto, ServerChatEvent},
};
use futures_util::{
    SinkExt, StreamExt,
    stream::SplitSink,
};
use serde::Deserialize;
use std::{collections::HashMap, future::Future, sync::Arc};
use tokio::sync::{
    RwLock,
    broadcast::{self, error::RecvError},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    handlers,
    state::AppState,
};

const CHANNEL_CAPACITY: usize = 64;

/// Broadcast channels keyed by activity
#[derive(Clone, Default)]
pub struct ChatHub {
    channels: Arc<RwLock<HashMap<Uuid, broadcast::Sender<CommentDto>>>>,
}

impl ChatHub {
    /// Subscribe to an activity's channel, creating it when needed
    pub async fn join(&self, activity_id: Uuid) -> broadcast::Receiver<CommentDto> {
        let mut channels = self.channels.write().await;
        channels
            .entry(activity_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Give up a subscription; the channel goes away with its last receiver
    pub async fn leave(&self, activity_id: Uuid, receiver: broadcast::Receiver<CommentDto>) {
        drop(receiver);

        let mut channels = self.channels.write().await;
        if channels
            .get(&activity_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&activity_id);
            debug!("Closed chat channel for activity {}", activity_id);
        }
    }

    /// Subscribe, then load the history with `load`; a failed load gives the
    /// subscription back so no empty channel is left behind
    pub async fn join_with_history<F, Fut>(
        &self,
        activity_id: Uuid,
        load: F,
    ) -> anyhow::Result<(broadcast::Receiver<CommentDto>, Vec<CommentDto>)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<CommentDto>>>,
    {
        let receiver = self.join(activity_id).await;
        match load().await {
            Ok(history) => Ok((receiver, history)),
            Err(e) => {
                self.leave(activity_id, receiver).await;
                Err(e)
            }
        }
    }

    /// Relay a stored comment; returns how many subscribers got it
    pub async fn publish(&self, activity_id: Uuid, comment: CommentDto) -> usize {
        let channels = self.channels.read().await;
        match channels.get(&activity_id) {
            Some(sender) => sender.send(comment).unwrap_or(0),
            None => 0,
        }
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

/// Query string of `GET /chat`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatParams {
    pub activity_id: Uuid,
    #[serde(rename = "access_token")]
    pub access_token: String,
}

/// Validate the `access_token` query parameter of the handshake
pub fn authorize(state: &AppState, params: &ChatParams) -> ApiResult<Claims> {
    state
        .jwt_service
        .validate_token(&params.access_token)
        .map_err(|e| {
            debug!("Rejected chat token: {}", e);
            ApiError::Unauthorized
        })
}

pub async fn chat_handler(
    State(state): State<AppState>,
    Query(params): Query<ChatParams>,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let claims = authorize(&state, &params)?;
    let activity_id = params.activity_id;

    Ok(ws.on_upgrade(move |socket| run_connection(socket, state, activity_id, claims)))
}

async fn run_connection(socket: WebSocket, state: AppState, activity_id: Uuid, claims: Claims) {
    // Subscribe before reading the history so nothing falls in between
    let (mut receiver, history) = match state
        .chat
        .join_with_history(activity_id, || state.comments.list_for_activity(activity_id))
        .await
    {
        Ok(joined) => joined,
        Err(e) => {
            error!("Failed to load chat history of activity {}: {:#}", activity_id, e);
            return;
        }
    };

    info!("User {} joined chat of activity {}", claims.name, activity_id);
    let (mut sender, mut incoming) = socket.split();

    if send_event(&mut sender, &ServerChatEvent::LoadComments(history))
        .await
        .is_ok()
    {
        loop {
            tokio::select! {
                event = receiver.recv() => match event {
                    Ok(comment) => {
                        if send_event(&mut sender, &ServerChatEvent::ReceiveComment(comment)).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Chat client of activity {} skipped {} comments", activity_id, skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
                message = incoming.next() => match message {
                    Some(Ok(Message::Text(text))) => handle_client_message(&state, &claims, &text).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("Chat socket error: {}", e);
                        break;
                    }
                },
            }
        }
    }

    state.chat.leave(activity_id, receiver).await;
    info!("User {} left chat of activity {}", claims.name, activity_id);
}

async fn handle_client_message(state: &AppState, claims: &Claims, text: &str) {
    let event = match serde_json::from_str::<ClientChatEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            debug!("Ignoring malformed chat message: {}", e);
            return;
        }
    };

    match event {
        ClientChatEvent::SendComment(new_comment) => {
            let activity_id = new_comment.activity_id;
            match handlers::create_comment(state, claims, new_comment).await {
                Ok(Some(Outcome::Success(comment))) => {
                    state.chat.publish(activity_id, comment).await;
                }
                Ok(Some(Outcome::Failure(message))) => {
                    warn!("Comment rejected: {}", message);
                }
                Ok(None) => warn!("Comment for unknown activity {}", activity_id),
                Err(e) => error!("Failed to store comment: {:#}", e),
            }
        }
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &ServerChatEvent,
) -> anyhow::Result<()> {
    let payload = serde_json::to_string(event)?;
    sender.send(Message::Text(payload)).await?;
    Ok(())
}
