use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kinds of messages exchanged between the page context and the privileged host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    ProxyRequest,
    GetSelectedText,
    TranslateWithVendor,
    TranslateFullPage,
    SaveToHistory,
}

/// Correlation id of a message, either textual or numeric on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Number(u64),
    Text(String),
}

impl MessageId {
    pub fn random() -> Self {
        MessageId::Text(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Number(id) => write!(f, "{id}"),
            MessageId::Text(id) => f.write_str(id),
        }
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        MessageId::Number(id)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        MessageId::Text(id.to_string())
    }
}

/// Message envelope. The payload is any json-serializable value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message<P = Value> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<P>,
}

impl<P> Message<P> {
    pub fn new(id: MessageId, kind: MessageType, payload: P) -> Self {
        Self {
            id: Some(id),
            kind,
            payload: Some(payload),
        }
    }
}

/// How the privileged side should decode a proxied response body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseType {
    #[default]
    Json,
    Text,
    DataUri,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyRequestInit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl ProxyRequestInit {
    pub fn post(body: impl Into<String>) -> Self {
        Self {
            method: Some("POST".to_string()),
            headers: BTreeMap::new(),
            body: Some(body.into()),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequestPayload {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_init: Option<ProxyRequestInit>,
}

impl ProxyRequestPayload {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            response_type: None,
            request_init: None,
        }
    }

    pub fn with_init(mut self, init: ProxyRequestInit) -> Self {
        self.request_init = Some(init);
        self
    }

    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }
}

/// Error as it travels over the wire: upstream status (0 when there is none) and a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub status_code: u16,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequestResponse {
    pub message_id: MessageId,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateWithVendorPayload {
    pub vendor: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveToHistoryPayload<T> {
    pub translation: T,
}

/// Reply the host writes back for every message that carried an id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl MessageReply {
    pub fn data(message_id: Option<MessageId>, data: Value) -> Self {
        Self {
            message_id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message_id: Option<MessageId>, error: ErrorPayload) -> Self {
        Self {
            message_id,
            data: None,
            error: Some(error),
        }
    }
}
