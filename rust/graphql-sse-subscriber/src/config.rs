use std::time::Duration;

/// What to do with stream error events that carry no payload.
///
/// Payload-less errors come from the transport itself (refused connection,
/// non-2xx status, dropped body) rather than from the GraphQL backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Drop them without invoking any callback.
    #[default]
    Drop,
    /// Invoke the error callback with a synthesized `{"errors": [...]}` payload.
    Report,
}

/// Client configuration, shared read-only by every subscription built from
/// the same [`SubscriberClient`](crate::SubscriberClient).
#[derive(Debug, Clone, Default)]
pub struct SubscriberConfig {
    pub url: Option<String>,
    pub verbose: bool,
    pub error_policy: ErrorPolicy,
    /// Only honoured by [`HttpTransport`](crate::HttpTransport).
    pub connect_timeout: Option<Duration>,
}

impl SubscriberConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Endpoint URL, treating an empty string the same as an absent one.
    pub fn endpoint(&self) -> Option<&str> {
        self.url.as_deref().filter(|url| !url.is_empty())
    }
}
