use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatDirection {
    Sent,
    Received,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Milliseconds since the unix epoch, as stamped by the sender.
    pub timestamp: u64,
    #[serde(rename = "type")]
    pub direction: ChatDirection,
    pub message: String,
}

/// A row of the `Chat` table: a message keyed by the peer it was exchanged with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub key: String,
    #[serde(flatten)]
    pub message: ChatMessage,
}

/// What a user tells others about themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Public key, hex.
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: None,
            status: None,
            picture: None,
            extra: Map::new(),
        }
    }

    pub fn to_record(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(serde_json::Error::custom("profile is not an object")),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type")]
enum Known {
    ChatMessage {
        message: ChatMessage,
    },
    FriendRequest {
        #[serde(rename = "senderInfo")]
        sender_info: UserProfile,
    },
    UserInformation {
        #[serde(rename = "senderInfo")]
        sender_info: UserProfile,
    },
}

const KNOWN_TYPES: [&str; 3] = ["ChatMessage", "FriendRequest", "UserInformation"];

/// Everything that travels inside an envelope, tagged by `"type"`.
#[derive(Debug, Clone, PartialEq)]
pub enum AppMessage {
    ChatMessage(ChatMessage),
    FriendRequest(UserProfile),
    UserInformation(UserProfile),
    /// A well-formed message of a type we don't handle. Kept whole.
    Unrecognized { kind: String, body: Value },
}

impl AppMessage {
    pub fn kind(&self) -> &str {
        match self {
            AppMessage::ChatMessage(_) => "ChatMessage",
            AppMessage::FriendRequest(_) => "FriendRequest",
            AppMessage::UserInformation(_) => "UserInformation",
            AppMessage::Unrecognized { kind, .. } => kind,
        }
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl Serialize for AppMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let known = match self {
            AppMessage::ChatMessage(message) => Known::ChatMessage {
                message: message.clone(),
            },
            AppMessage::FriendRequest(profile) => Known::FriendRequest {
                sender_info: profile.clone(),
            },
            AppMessage::UserInformation(profile) => Known::UserInformation {
                sender_info: profile.clone(),
            },
            AppMessage::Unrecognized { body, .. } => return body.serialize(serializer),
        };
        known.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AppMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let body = Value::deserialize(deserializer)?;
        let kind = body
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| D::Error::missing_field("type"))?
            .to_string();

        if !KNOWN_TYPES.contains(&kind.as_str()) {
            return Ok(AppMessage::Unrecognized { kind, body });
        }

        Ok(match Known::deserialize(body).map_err(D::Error::custom)? {
            Known::ChatMessage { message } => AppMessage::ChatMessage(message),
            Known::FriendRequest { sender_info } => AppMessage::FriendRequest(sender_info),
            Known::UserInformation { sender_info } => AppMessage::UserInformation(sender_info),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_chat_message_wire_shape() {
        let message = AppMessage::ChatMessage(ChatMessage {
            timestamp: 1700000000000,
            direction: ChatDirection::Sent,
            message: "hi".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "type": "ChatMessage",
                "message": {"timestamp": 1700000000000u64, "type": "sent", "message": "hi"}
            })
        );
    }

    #[test]
    fn test_profile_keeps_unknown_fields() {
        let bytes = br#"{"type":"UserInformation","senderInfo":{"key":"ab","name":"bob","mood":"ok"}}"#;
        let AppMessage::UserInformation(profile) = AppMessage::from_slice(bytes).unwrap() else {
            panic!("expected UserInformation");
        };
        assert_eq!(profile.name.as_deref(), Some("bob"));
        assert_eq!(profile.extra.get("mood"), Some(&json!("ok")));
        assert_eq!(profile.to_record().unwrap()["mood"], json!("ok"));
    }

    #[test]
    fn test_unknown_type_is_unrecognized() {
        let message = AppMessage::from_slice(br#"{"type":"Typing","peer":"ab"}"#).unwrap();
        assert_eq!(message.kind(), "Typing");
        assert!(matches!(message, AppMessage::Unrecognized { .. }));
    }

    #[test]
    fn test_malformed_messages() {
        assert!(AppMessage::from_slice(b"not json").is_err());
        assert!(AppMessage::from_slice(br#"{"message":"no type"}"#).is_err());
        assert!(AppMessage::from_slice(br#"{"type":"ChatMessage"}"#).is_err());
    }
}
