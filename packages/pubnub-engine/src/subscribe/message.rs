//! Subscribe response envelope.
//!
//! Payloads are kept as raw JSON; decoding them is up to the application.

use serde::Deserialize;
use serde_json::Value;

use super::cursor::SubscriptionCursor;
use crate::error::PubNubError;

/// Suffix of the companion channel carrying presence events.
pub const PRESENCE_SUFFIX: &str = "-pnpres";

/// Kind of a received message, from the `e` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "u8")]
pub enum MessageKind {
    #[default]
    Message,
    Signal,
    Object,
    MessageAction,
    File,
    Unknown(u8),
}

impl From<u8> for MessageKind {
    fn from(value: u8) -> Self {
        match value {
            0 => MessageKind::Message,
            1 => MessageKind::Signal,
            2 => MessageKind::Object,
            3 => MessageKind::MessageAction,
            4 => MessageKind::File,
            other => MessageKind::Unknown(other),
        }
    }
}

/// One entry of a subscribe response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscribeMessage {
    /// Channel the message was published to.
    #[serde(rename = "c")]
    pub channel: String,

    /// Subscription (wildcard or group) that matched the channel.
    #[serde(rename = "b", default)]
    pub subscription: Option<String>,

    #[serde(rename = "d", default)]
    pub payload: Value,

    /// Publish timetoken.
    #[serde(rename = "p")]
    pub published: SubscriptionCursor,

    /// User id of the publisher.
    #[serde(rename = "i", default)]
    pub publisher: Option<String>,

    #[serde(rename = "e", default)]
    pub kind: MessageKind,
}

impl SubscribeMessage {
    /// Whether the message is a presence event.
    pub fn is_presence(&self) -> bool {
        self.channel.ends_with(PRESENCE_SUFFIX)
    }
}

/// Body of a successful subscribe call.
#[derive(Debug, Deserialize)]
pub(crate) struct SubscribeResponse {
    #[serde(rename = "t")]
    pub cursor: SubscriptionCursor,
    #[serde(rename = "m", default)]
    pub messages: Vec<SubscribeMessage>,
}

impl SubscribeResponse {
    pub(crate) fn parse(body: &[u8]) -> Result<Self, PubNubError> {
        serde_json::from_slice(body).map_err(|err| PubNubError::Deserialization {
            details: err.to_string(),
        })
    }
}
