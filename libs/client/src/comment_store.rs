//! Live comments of one activity
//!
//! The relay sends the full history once on connect and every new comment
//! after that. The list is kept newest first.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use common::models::{ClientChatEvent, CommentDto, NewComment, ServerChatEvent};
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    common_store::CommonStore,
    error::{ClientError, ClientResult},
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Apply one relay event to a newest-first comment list
pub fn apply_event(comments: &mut Vec<CommentDto>, event: ServerChatEvent) {
    match event {
        ServerChatEvent::LoadComments(history) => *comments = history,
        ServerChatEvent::ReceiveComment(comment) => comments.insert(0, comment),
    }
}

struct Connection {
    activity_id: Uuid,
    outgoing: mpsc::UnboundedSender<ClientChatEvent>,
    task: JoinHandle<()>,
}

pub struct CommentStore {
    chat_url: String,
    common: CommonStore,
    comments: Arc<watch::Sender<Vec<CommentDto>>>,
    connection: Mutex<Option<Connection>>,
}

impl CommentStore {
    pub fn new(chat_url: impl Into<String>, common: CommonStore) -> Self {
        let (comments, _) = watch::channel(Vec::new());

        Self {
            chat_url: chat_url.into(),
            common,
            comments: Arc::new(comments),
            connection: Mutex::new(None),
        }
    }

    fn connection(&self) -> MutexGuard<'_, Option<Connection>> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Current comments, newest first
    pub fn comments(&self) -> Vec<CommentDto> {
        self.comments.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<CommentDto>> {
        self.comments.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.connection()
            .as_ref()
            .is_some_and(|connection| !connection.task.is_finished())
    }

    /// Relay URL for an activity; the token goes in the query string
    pub fn hub_url(&self, activity_id: Uuid, token: &str) -> ClientResult<Url> {
        let url = Url::parse_with_params(
            &self.chat_url,
            &[
                ("activityId", activity_id.to_string().as_str()),
                ("access_token", token),
            ],
        )
        .map_err(anyhow::Error::from)?;

        Ok(url)
    }

    /// Join the relay of an activity, leaving any previous one
    pub async fn create_hub_connection(&self, activity_id: Uuid) -> ClientResult<()> {
        let token = self.common.token().ok_or(ClientError::NotSignedIn)?;
        let url = self.hub_url(activity_id, &token)?;

        let (socket, _) = connect_async(url.as_str()).await?;
        let (outgoing, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_connection(socket, receiver, self.comments.clone()));

        let previous = self.connection().replace(Connection {
            activity_id,
            outgoing,
            task,
        });
        if let Some(previous) = previous {
            previous.task.abort();
        }

        info!("Connected to comments of activity {}", activity_id);
        Ok(())
    }

    pub fn stop_hub_connection(&self) {
        if let Some(connection) = self.connection().take() {
            connection.task.abort();
            info!("Left comments of activity {}", connection.activity_id);
        }
    }

    /// Leave the relay and forget its comments
    pub fn clear_comments(&self) {
        self.comments.send_replace(Vec::new());
        self.stop_hub_connection();
    }

    /// Post a comment to the connected activity
    pub fn add_comment(&self, body: impl Into<String>) -> ClientResult<()> {
        let connection = self.connection();
        let connection = connection
            .as_ref()
            .filter(|connection| !connection.task.is_finished())
            .ok_or(ClientError::ChatDisconnected)?;

        connection
            .outgoing
            .send(ClientChatEvent::SendComment(NewComment {
                body: body.into(),
                activity_id: connection.activity_id,
            }))
            .map_err(|_| ClientError::ChatDisconnected)
    }
}

impl Drop for CommentStore {
    fn drop(&mut self) {
        self.stop_hub_connection();
    }
}

async fn run_connection(
    socket: Socket,
    mut outgoing: mpsc::UnboundedReceiver<ClientChatEvent>,
    comments: Arc<watch::Sender<Vec<CommentDto>>>,
) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerChatEvent>(&text) {
                    Ok(event) => comments.send_modify(|comments| apply_event(comments, event)),
                    Err(e) => debug!("Ignoring malformed chat event: {}", e),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Chat connection failed: {}", e);
                    break;
                }
            },
            event = outgoing.recv() => match event {
                Some(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(e) => {
                            error!("Failed to encode chat event: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(payload)).await {
                        warn!("Failed to send comment: {}", e);
                        break;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
        }
    }

    debug!("Chat connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    fn comment(body: &str) -> CommentDto {
        CommentDto {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            body: body.to_string(),
            username: "bob".to_string(),
            display_name: "Bob".to_string(),
            image: None,
        }
    }

    #[test]
    fn history_replaces_and_new_comments_go_first() {
        let mut comments = vec![comment("stale")];

        apply_event(
            &mut comments,
            ServerChatEvent::LoadComments(vec![comment("second"), comment("first")]),
        );
        apply_event(&mut comments, ServerChatEvent::ReceiveComment(comment("third")));

        let bodies: Vec<&str> = comments.iter().map(|c| c.body.as_str()).collect();
        assert_eq!(bodies, vec!["third", "second", "first"]);
    }

    #[test]
    fn hub_url_carries_activity_and_token() {
        let store = CommentStore::new("ws://localhost:5000/chat", CommonStore::new());
        let id = Uuid::nil();

        let url = store.hub_url(id, "a.b.c").unwrap();
        assert_eq!(
            url.as_str(),
            format!("ws://localhost:5000/chat?activityId={id}&access_token=a.b.c")
        );
    }

    #[test]
    fn commenting_needs_a_connection() {
        let store = CommentStore::new("ws://localhost:5000/chat", CommonStore::new());
        assert!(matches!(
            store.add_comment("hello"),
            Err(ClientError::ChatDisconnected)
        ));
    }

    #[tokio::test]
    async fn connecting_needs_a_token() {
        let store = CommentStore::new("ws://localhost:5000/chat", CommonStore::new());
        assert!(matches!(
            store.create_hub_connection(Uuid::new_v4()).await,
            Err(ClientError::NotSignedIn)
        ));
    }

    #[tokio::test]
    async fn comments_flow_through_the_relay() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Minimal relay: history on connect, then echo each posted comment
        let relay = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut socket = accept_async(stream).await.unwrap();
            let history = ServerChatEvent::LoadComments(vec![comment("older")]);
            socket
                .send(Message::Text(serde_json::to_string(&history).unwrap()))
                .await
                .unwrap();

            while let Some(Ok(Message::Text(text))) = socket.next().await {
                let ClientChatEvent::SendComment(new) = serde_json::from_str(&text).unwrap();
                let event = ServerChatEvent::ReceiveComment(comment(&new.body));
                socket
                    .send(Message::Text(serde_json::to_string(&event).unwrap()))
                    .await
                    .unwrap();
            }
        });

        let common = CommonStore::new();
        common.set_token(Some("jwt".to_string()));
        let store = CommentStore::new(format!("ws://{addr}/chat"), common);
        let mut updates = store.subscribe();

        store.create_hub_connection(Uuid::new_v4()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), updates.wait_for(|c| c.len() == 1))
            .await
            .unwrap()
            .unwrap();

        store.add_comment("newest").unwrap();
        tokio::time::timeout(Duration::from_secs(5), updates.wait_for(|c| c.len() == 2))
            .await
            .unwrap()
            .unwrap();

        let bodies: Vec<String> = store.comments().into_iter().map(|c| c.body).collect();
        assert_eq!(bodies, vec!["newest".to_string(), "older".to_string()]);

        store.clear_comments();
        assert!(store.comments().is_empty());
        assert!(!store.is_connected());
        relay.abort();
    }
}
