use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubscriberError {
    #[error("Missing endpoint URL")]
    MissingUrl,

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Subscription variables must serialize to a JSON object, got {0}")]
    InvalidVariables(String),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Subscription is already active")]
    AlreadySubscribed,

    #[error("Subscription was closed and cannot be reopened")]
    Closed,

    #[error("No Tokio runtime available to drive the subscription")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, SubscriberError>;
