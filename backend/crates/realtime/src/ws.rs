//! WebSocket Endpoint
//!
//! The access token is checked before the upgrade, so every socket in the
//! registry belongs to an authenticated, active account.

use std::sync::Arc;

use auth::AuthGate;
use auth::domain::repository::UserDirectory;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use kernel::id::UserId;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::error::{RealtimeError, RealtimeResult};
use crate::event::{ClientEvent, ServerEvent};
use crate::presence::{EVENT_BUFFER, PresenceRegistry};

/// Shared state of the realtime routes
pub struct RealtimeState<U>
where
    U: UserDirectory + Send + Sync + 'static,
{
    pub registry: Arc<PresenceRegistry>,
    pub gate: Arc<AuthGate<U>>,
}

impl<U> Clone for RealtimeState<U>
where
    U: UserDirectory + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            gate: self.gate.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// GET /ws?token=<access token>
pub async fn ws_handler<U>(
    State(state): State<RealtimeState<U>>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> RealtimeResult<Response>
where
    U: UserDirectory + Send + Sync + 'static,
{
    let token = query
        .token
        .as_deref()
        .or_else(|| platform::client::bearer_token(&headers));
    let user = state.gate.authenticate(token).await?;

    let upgrade = upgrade.map_err(RealtimeError::Upgrade)?;
    let registry = state.registry.clone();

    Ok(upgrade.on_upgrade(move |socket| handle_socket(socket, registry, user.user_id)))
}

async fn handle_socket(socket: WebSocket, registry: Arc<PresenceRegistry>, user_id: UserId) {
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(EVENT_BUFFER);
    let connection_id = registry.connect(user_id, tx).await;

    let (mut sink, mut stream) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode presence event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Close(_)) => break,
            Ok(Message::Text(text)) => {
                if let Err(e) = dispatch(&registry, user_id, text.as_str()).await {
                    tracing::debug!(user_id = %user_id, error = %e, "Ignoring inbound frame");
                }
            }
            Ok(Message::Binary(_)) => {
                tracing::debug!(user_id = %user_id, error = %RealtimeError::UnsupportedFrame, "Ignoring inbound frame");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(user_id = %user_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    registry.disconnect(user_id, connection_id).await;
    send_task.abort();
}

/// Route one inbound frame to the users it concerns
pub async fn dispatch(
    registry: &PresenceRegistry,
    from: UserId,
    frame: &str,
) -> RealtimeResult<()> {
    match serde_json::from_str::<ClientEvent>(frame)? {
        ClientEvent::Typing { receiver_id } => {
            registry
                .send_to(&receiver_id, ServerEvent::UserTyping { user_id: from })
                .await;
        }
        ClientEvent::StopTyping { receiver_id } => {
            registry
                .send_to(&receiver_id, ServerEvent::UserStoppedTyping { user_id: from })
                .await;
        }
        ClientEvent::MarkAsRead {
            message_ids,
            sender_id,
        } => {
            registry
                .send_to(
                    &sender_id,
                    ServerEvent::MessagesRead {
                        reader_id: from,
                        message_ids,
                    },
                )
                .await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_typing_reaches_receiver_only() {
        let registry = PresenceRegistry::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let (alice_tx, mut alice_rx) = mpsc::channel(EVENT_BUFFER);
        let (bob_tx, mut bob_rx) = mpsc::channel(EVENT_BUFFER);
        registry.connect(alice, alice_tx).await;
        registry.connect(bob, bob_tx).await;
        while alice_rx.try_recv().is_ok() {}
        while bob_rx.try_recv().is_ok() {}

        let frame = format!(r#"{{"type":"typing","receiverId":"{bob}"}}"#);
        dispatch(&registry, alice, &frame).await.unwrap();

        assert_eq!(bob_rx.try_recv().unwrap(), ServerEvent::UserTyping { user_id: alice });
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_mark_as_read_notifies_sender() {
        let registry = PresenceRegistry::new();
        let reader = UserId::new();
        let author = UserId::new();
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        registry.connect(author, tx).await;
        while rx.try_recv().is_ok() {}

        let frame = format!(
            r#"{{"type":"markAsRead","messageIds":["m1","m2"],"senderId":"{author}"}}"#
        );
        dispatch(&registry, reader, &frame).await.unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            ServerEvent::MessagesRead {
                reader_id: reader,
                message_ids: vec!["m1".into(), "m2".into()],
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_frame_is_error() {
        let registry = PresenceRegistry::new();
        let err = dispatch(&registry, UserId::new(), "not json").await.unwrap_err();
        assert!(matches!(err, RealtimeError::MalformedFrame(_)));
    }
}
