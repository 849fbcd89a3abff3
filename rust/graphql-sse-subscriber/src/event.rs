use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event delivered by a push transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Generic message event carrying a JSON document.
    Message(String),
    /// Stream error. `Some` when the server sent an `error` event with data,
    /// `None` for transport-level failures.
    Error(Option<String>),
}

impl StreamEvent {
    pub fn is_error(&self) -> bool {
        matches!(self, StreamEvent::Error(_))
    }

    pub fn payload(&self) -> Option<&str> {
        match self {
            StreamEvent::Message(data) => Some(data),
            StreamEvent::Error(data) => data.as_deref(),
        }
    }
}

/// A single entry of a GraphQL `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Error document sent on the error channel: `{"errors": [{"message": ...}]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLErrors {
    pub errors: Vec<GraphQLError>,
}

impl GraphQLErrors {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            errors: vec![GraphQLError {
                message: message.into(),
                extra: Map::new(),
            }],
        }
    }

    /// Interpret an error-channel payload. Returns `None` when the value does
    /// not have the expected shape.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|e| e.message.as_str())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize error document: {}", e);
            serde_json::json!({ "errors": [] })
        })
    }
}
