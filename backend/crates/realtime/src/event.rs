//! Presence Events
//!
//! JSON frames exchanged over the socket, tagged by `type`.

use kernel::id::UserId;
use serde::{Deserialize, Serialize};

/// Frames the server pushes to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Sent once to a new connection
    OnlineUsers { users: Vec<UserId> },
    UserOnline { user_id: UserId },
    UserOffline { user_id: UserId },
    UserTyping { user_id: UserId },
    UserStoppedTyping { user_id: UserId },
    MessagesRead {
        reader_id: UserId,
        message_ids: Vec<String>,
    },
}

/// Frames clients may send
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    Typing { receiver_id: UserId },
    StopTyping { receiver_id: UserId },
    MarkAsRead {
        message_ids: Vec<String>,
        sender_id: UserId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_event_wire_format() {
        let user_id = UserId::new();
        let json = serde_json::to_value(ServerEvent::UserOnline { user_id }).unwrap();
        assert_eq!(json["type"], "userOnline");
        assert_eq!(json["userId"], user_id.to_string());

        let json = serde_json::to_value(ServerEvent::MessagesRead {
            reader_id: user_id,
            message_ids: vec!["m1".into()],
        })
        .unwrap();
        assert_eq!(json["type"], "messagesRead");
        assert_eq!(json["messageIds"][0], "m1");
    }

    #[test]
    fn test_client_event_parsing() {
        let receiver = UserId::new();
        let frame = format!(r#"{{"type":"typing","receiverId":"{receiver}"}}"#);
        let event: ClientEvent = serde_json::from_str(&frame).unwrap();
        assert_eq!(event, ClientEvent::Typing { receiver_id: receiver });

        let frame = format!(
            r#"{{"type":"markAsRead","messageIds":["a","b"],"senderId":"{receiver}"}}"#
        );
        let event: ClientEvent = serde_json::from_str(&frame).unwrap();
        assert!(matches!(event, ClientEvent::MarkAsRead { message_ids, .. } if message_ids.len() == 2));

        assert!(serde_json::from_str::<ClientEvent>(r#"{"type":"shout"}"#).is_err());
    }
}
