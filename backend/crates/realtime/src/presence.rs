//! Presence Registry
//!
//! Who is connected, and a channel to each of their sockets. One registry
//! is created per process and shared through the router state; a user is
//! online while at least one of their connections is open.

use std::collections::HashMap;
use std::fmt;

use kernel::id::UserId;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::event::ServerEvent;

/// Outbound queue of one socket
pub type EventSender = mpsc::Sender<ServerEvent>;

/// Events a socket may have queued before further ones are dropped
pub const EVENT_BUFFER: usize = 64;

/// Identifies one socket of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Default)]
pub struct PresenceRegistry {
    users: RwLock<HashMap<UserId, HashMap<ConnectionId, EventSender>>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a socket
    ///
    /// The new socket receives the current online list; everyone else hears
    /// `userOnline` when this is the user's first socket.
    pub async fn connect(&self, user_id: UserId, sender: EventSender) -> ConnectionId {
        let id = ConnectionId::new();
        let mut users = self.users.write().await;

        let came_online = !users.contains_key(&user_id);
        users.entry(user_id).or_default().insert(id, sender.clone());

        Self::deliver(
            &sender,
            ServerEvent::OnlineUsers {
                users: users.keys().copied().collect(),
            },
        );

        if came_online {
            Self::fan_out(&users, Some(user_id), ServerEvent::UserOnline { user_id });
            tracing::info!(user_id = %user_id, online = users.len(), "User online");
        }
        tracing::debug!(user_id = %user_id, connection_id = %id, "Socket registered");

        id
    }

    /// Drop a socket; returns true when it was the user's last one
    pub async fn disconnect(&self, user_id: UserId, id: ConnectionId) -> bool {
        let mut users = self.users.write().await;

        let Some(connections) = users.get_mut(&user_id) else {
            return false;
        };
        if connections.remove(&id).is_none() {
            return false;
        }
        if !connections.is_empty() {
            return false;
        }

        users.remove(&user_id);
        Self::fan_out(&users, None, ServerEvent::UserOffline { user_id });
        tracing::info!(user_id = %user_id, online = users.len(), "User offline");
        true
    }

    pub async fn is_online(&self, user_id: &UserId) -> bool {
        self.users.read().await.contains_key(user_id)
    }

    pub async fn online_users(&self) -> Vec<UserId> {
        self.users.read().await.keys().copied().collect()
    }

    pub async fn online_count(&self) -> usize {
        self.users.read().await.len()
    }

    /// Deliver to every socket of `user_id`; returns how many were reached
    pub async fn send_to(&self, user_id: &UserId, event: ServerEvent) -> usize {
        let users = self.users.read().await;
        users
            .get(user_id)
            .map(|connections| {
                connections
                    .values()
                    .filter(|sender| Self::deliver(sender, event.clone()))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Deliver to every online user except `user_id`
    pub async fn broadcast_except(&self, user_id: &UserId, event: ServerEvent) {
        let users = self.users.read().await;
        Self::fan_out(&users, Some(*user_id), event);
    }

    /// Never waits on a slow socket. A full queue drops the event; a closed
    /// one is skipped since its socket deregisters on its own.
    fn deliver(sender: &EventSender, event: ServerEvent) -> bool {
        match sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::debug!(event = ?event, "Socket queue full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    fn fan_out(
        users: &HashMap<UserId, HashMap<ConnectionId, EventSender>>,
        except: Option<UserId>,
        event: ServerEvent,
    ) {
        users
            .iter()
            .filter(|(id, _)| Some(**id) != except)
            .flat_map(|(_, connections)| connections.values())
            .for_each(|sender| {
                Self::deliver(sender, event.clone());
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::Receiver;

    fn channel() -> (EventSender, Receiver<ServerEvent>) {
        mpsc::channel(EVENT_BUFFER)
    }

    fn drain(rx: &mut Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_online_until_last_connection_closes() {
        let registry = PresenceRegistry::new();
        let alice = UserId::new();

        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();
        let first = registry.connect(alice, tx1).await;
        let second = registry.connect(alice, tx2).await;
        assert_ne!(first, second);
        assert_eq!(registry.online_count().await, 1);

        assert!(!registry.disconnect(alice, first).await);
        assert!(registry.is_online(&alice).await);

        assert!(registry.disconnect(alice, second).await);
        assert!(!registry.is_online(&alice).await);

        // Unknown connection ids are ignored
        assert!(!registry.disconnect(alice, second).await);
    }

    #[tokio::test]
    async fn test_presence_announcements() {
        let registry = PresenceRegistry::new();
        let alice = UserId::new();
        let bob = UserId::new();

        let (alice_tx, mut alice_rx) = channel();
        registry.connect(alice, alice_tx).await;
        assert_eq!(
            drain(&mut alice_rx),
            vec![ServerEvent::OnlineUsers { users: vec![alice] }]
        );

        let (bob_tx, mut bob_rx) = channel();
        let bob_conn = registry.connect(bob, bob_tx).await;
        assert_eq!(
            drain(&mut alice_rx),
            vec![ServerEvent::UserOnline { user_id: bob }]
        );
        match drain(&mut bob_rx).as_slice() {
            [ServerEvent::OnlineUsers { users }] => {
                assert_eq!(users.len(), 2);
                assert!(users.contains(&alice) && users.contains(&bob));
            }
            other => panic!("unexpected events: {other:?}"),
        }

        // A second socket of bob is not announced
        let (bob_tx2, _bob_rx2) = channel();
        let bob_conn2 = registry.connect(bob, bob_tx2).await;
        assert!(drain(&mut alice_rx).is_empty());

        registry.disconnect(bob, bob_conn).await;
        assert!(drain(&mut alice_rx).is_empty());
        registry.disconnect(bob, bob_conn2).await;
        assert_eq!(
            drain(&mut alice_rx),
            vec![ServerEvent::UserOffline { user_id: bob }]
        );
    }

    #[tokio::test]
    async fn test_send_to_reaches_every_socket_of_user() {
        let registry = PresenceRegistry::new();
        let alice = UserId::new();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        registry.connect(alice, tx1).await;
        registry.connect(alice, tx2).await;
        drain(&mut rx1);
        drain(&mut rx2);

        let event = ServerEvent::UserTyping {
            user_id: UserId::new(),
        };
        assert_eq!(registry.send_to(&alice, event.clone()).await, 2);
        assert_eq!(drain(&mut rx1), vec![event.clone()]);
        assert_eq!(drain(&mut rx2), vec![event.clone()]);

        assert_eq!(registry.send_to(&UserId::new(), event).await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_except_skips_sender() {
        let registry = PresenceRegistry::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let (alice_tx, mut alice_rx) = channel();
        let (bob_tx, mut bob_rx) = channel();
        registry.connect(alice, alice_tx).await;
        registry.connect(bob, bob_tx).await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        let event = ServerEvent::UserOnline { user_id: alice };
        registry.broadcast_except(&alice, event.clone()).await;
        assert!(drain(&mut alice_rx).is_empty());
        assert_eq!(drain(&mut bob_rx), vec![event]);
    }

    #[tokio::test]
    async fn test_full_queue_drops_events_without_blocking() {
        let registry = PresenceRegistry::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let (alice_tx, mut alice_rx) = mpsc::channel(2);
        registry.connect(alice, alice_tx).await;

        let typing = ServerEvent::UserTyping { user_id: bob };
        // The online list already holds one slot
        assert_eq!(registry.send_to(&alice, typing.clone()).await, 1);
        assert_eq!(registry.send_to(&alice, typing.clone()).await, 0);
        registry.broadcast_except(&bob, typing.clone()).await;

        let events = drain(&mut alice_rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], typing);

        // Draining frees the queue again
        assert_eq!(registry.send_to(&alice, typing).await, 1);
        assert!(registry.is_online(&alice).await);
    }
}
