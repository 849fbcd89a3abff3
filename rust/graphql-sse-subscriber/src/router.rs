use crate::config::ErrorPolicy;
use crate::event::{GraphQLErrors, StreamEvent};
use serde_json::Value;
use std::fmt;

pub type NextCallback = Box<dyn FnMut(Value) + Send>;
pub type ErrorCallback = Box<dyn FnMut(Value) + Send>;

/// Handlers for the two channels of a subscription.
///
/// ```rust,ignore
/// let callbacks = Callbacks::new()
///     .on_next(|data| println!("update: {}", data))
///     .on_error(|errors| eprintln!("failed: {}", errors));
/// ```
///
/// A missing `next` handler ignores messages; a missing `error` handler logs
/// the payload with `tracing::error!`.
#[derive(Default)]
pub struct Callbacks {
    next: Option<NextCallback>,
    error: Option<ErrorCallback>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_next<F>(mut self, f: F) -> Self
    where
        F: FnMut(Value) + Send + 'static,
    {
        self.next = Some(Box::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnMut(Value) + Send + 'static,
    {
        self.error = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("next", &self.next.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

/// Routes stream events of one subscription to its callbacks.
pub struct EventRouter {
    next: NextCallback,
    error: ErrorCallback,
    policy: ErrorPolicy,
    verbose: bool,
}

impl EventRouter {
    pub fn new(callbacks: Callbacks, policy: ErrorPolicy, verbose: bool) -> Self {
        Self {
            next: callbacks.next.unwrap_or_else(|| Box::new(|_: Value| {})),
            error: callbacks.error.unwrap_or_else(|| Box::new(log_error)),
            policy,
            verbose,
        }
    }

    pub fn route(&mut self, event: StreamEvent) {
        if self.verbose {
            tracing::info!("Subscription event: {:?}", event);
        } else {
            tracing::debug!("Subscription event: {:?}", event);
        }

        match event {
            StreamEvent::Message(data) => match serde_json::from_str::<Value>(&data) {
                Ok(value) => (self.next)(value),
                Err(e) => self.invalid_payload(e),
            },
            StreamEvent::Error(Some(data)) => match serde_json::from_str::<Value>(&data) {
                Ok(value) => (self.error)(value),
                Err(e) => self.invalid_payload(e),
            },
            StreamEvent::Error(None) => match self.policy {
                ErrorPolicy::Drop => {}
                ErrorPolicy::Report => {
                    (self.error)(GraphQLErrors::message("event stream error").to_value())
                }
            },
        }
    }

    fn invalid_payload(&mut self, e: serde_json::Error) {
        tracing::warn!("Dropping malformed subscription payload: {}", e);
        (self.error)(GraphQLErrors::message(format!("invalid JSON payload: {}", e)).to_value());
    }
}

fn log_error(payload: Value) {
    match GraphQLErrors::from_value(&payload) {
        Some(errors) => {
            for message in errors.messages() {
                tracing::error!("Subscription error: {}", message);
            }
        }
        None => tracing::error!("Subscription error: {}", payload),
    }
}
