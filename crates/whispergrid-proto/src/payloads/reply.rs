//! Reply payloads (the decrypted inner JSON of thread messages).

use serde::{Deserialize, Serialize};

use crate::message_id::MessageId;

/// Decrypted content of a `grid-reply` (and the common core of a
/// `reply-to-invite`).
///
/// The whole structure travels AES-GCM encrypted under the thread secret;
/// nothing here is readable on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyPayload {
    /// Monotonically assigned id of this message within the sender's
    /// sequence.
    pub message_id: MessageId,

    /// The message text.
    pub message: String,

    /// The sender's contiguous-received lower bound: everything up to and
    /// including this peer id has reached them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_ack: Option<MessageId>,

    /// Optional relay URL announcement ("push my messages here").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_field_names_are_camel_case() {
        let payload = ReplyPayload {
            message_id: MessageId::new(0x2a).unwrap(),
            message: "hello".to_string(),
            min_ack: Some(MessageId::new(0x29).unwrap()),
            relay: Some("https://relay.example/inbox".to_string()),
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["messageId"], "2a");
        assert_eq!(json["minAck"], "29");
        assert_eq!(json["message"], "hello");
        assert_eq!(json["relay"], "https://relay.example/inbox");
    }

    #[test]
    fn optional_fields_roundtrip_when_absent() {
        let payload = ReplyPayload {
            message_id: MessageId::new(1).unwrap(),
            message: "hi".to_string(),
            min_ack: None,
            relay: None,
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(!json.contains("minAck"));
        assert!(!json.contains("relay"));
        assert_eq!(serde_json::from_str::<ReplyPayload>(&json).unwrap(), payload);
    }
}
