use crate::client::SubscriberClient;
use crate::error::{Result, SubscriberError};
use crate::router::{Callbacks, EventRouter};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Query and variables of a GraphQL subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    pub query: String,
    #[serde(default)]
    pub variables: Map<String, Value>,
}

impl SubscriptionRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: Map::new(),
        }
    }

    /// Replace the variables with any value that serializes to a JSON object.
    /// `null` (e.g. `None`) is treated as no variables.
    pub fn with_variables<T: Serialize + ?Sized>(mut self, variables: &T) -> Result<Self> {
        match serde_json::to_value(variables)? {
            Value::Object(map) => self.variables = map,
            Value::Null => self.variables = Map::new(),
            other => return Err(SubscriberError::InvalidVariables(json_type(&other).to_string())),
        }
        Ok(self)
    }

    /// Variables as compact JSON text with sorted keys.
    pub fn variables_json(&self) -> String {
        Value::Object(self.variables.clone()).to_string()
    }

    /// `query=...&variables=...`, form-urlencoded.
    pub fn encode(&self) -> String {
        encode_params(&self.query, &self.variables_json())
    }
}

fn encode_params(query: &str, variables: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("query", query)
        .append_pair("variables", variables)
        .finish()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Append encoded parameters to the endpoint, respecting any query string it
/// already carries.
pub(crate) fn compose_url(endpoint: &str, params: &str) -> Result<Url> {
    let separator = if endpoint.ends_with('?') || endpoint.ends_with('&') {
        ""
    } else if endpoint.contains('?') {
        "&"
    } else {
        "?"
    };
    Ok(Url::parse(&format!("{}{}{}", endpoint, separator, params))?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// Built, never subscribed. No connection exists.
    Inert,
    /// Stream opened and events are being routed.
    Subscribed,
    /// Closed for good.
    Unsubscribed,
}

enum State {
    Inert,
    Subscribed {
        cancel: CancellationToken,
        task: JoinHandle<()>,
    },
    Unsubscribed {
        task: Option<JoinHandle<()>>,
    },
}

/// Cloneable handle that closes a subscription from another task or from
/// inside one of its callbacks.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    token: CancellationToken,
}

impl CloseHandle {
    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// One GraphQL subscription: inert when built, live after
/// [`subscribe`](Subscription::subscribe), closed after
/// [`unsubscribe`](Subscription::unsubscribe).
///
/// The encoded request parameters are computed once when the subscription is
/// built. Dropping a live subscription closes its stream.
pub struct Subscription {
    client: SubscriberClient,
    query: String,
    variables: String,
    params: String,
    state: State,
}

impl Subscription {
    pub(crate) fn new(client: SubscriberClient, request: SubscriptionRequest) -> Self {
        let variables = request.variables_json();
        let params = encode_params(&request.query, &variables);
        Self {
            client,
            query: request.query,
            variables,
            params,
            state: State::Inert,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Variables as the JSON text sent to the server.
    pub fn variables(&self) -> &str {
        &self.variables
    }

    pub fn params(&self) -> &str {
        &self.params
    }

    /// Endpoint URL with the encoded parameters appended.
    pub fn url(&self) -> Result<Url> {
        let endpoint = self
            .client
            .config()
            .endpoint()
            .ok_or(SubscriberError::MissingUrl)?;
        compose_url(endpoint, &self.params)
    }

    pub fn status(&self) -> SubscriptionStatus {
        match &self.state {
            State::Inert => SubscriptionStatus::Inert,
            State::Subscribed { cancel, .. } if !cancel.is_cancelled() => {
                SubscriptionStatus::Subscribed
            }
            State::Subscribed { .. } | State::Unsubscribed { .. } => {
                SubscriptionStatus::Unsubscribed
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.status() == SubscriptionStatus::Subscribed
    }

    /// Open the event stream and start routing events to `callbacks`.
    ///
    /// Returns immediately; callbacks run on a Tokio task, one event at a
    /// time. Must be called from within a Tokio runtime. A subscription can
    /// be subscribed once: a second call fails with
    /// [`AlreadySubscribed`](SubscriberError::AlreadySubscribed) while live
    /// and [`Closed`](SubscriberError::Closed) after unsubscribing.
    pub fn subscribe(&mut self, callbacks: Callbacks) -> Result<&mut Self> {
        match self.status() {
            SubscriptionStatus::Inert => {}
            SubscriptionStatus::Subscribed => return Err(SubscriberError::AlreadySubscribed),
            SubscriptionStatus::Unsubscribed => return Err(SubscriberError::Closed),
        }

        let runtime = Handle::try_current().map_err(|_| SubscriberError::NoRuntime)?;
        let url = self.url()?;
        let config = self.client.config();

        if config.verbose {
            tracing::info!("Subscribing to {}", url);
        } else {
            tracing::debug!("Subscribing to {}", url);
        }

        let mut stream = self.client.transport().open(&url)?;
        let mut router = EventRouter::new(callbacks, config.error_policy, config.verbose);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = runtime.spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    event = stream.next() => match event {
                        Some(event) => router.route(event),
                        None => break,
                    },
                }
            }
            stream.close();
            tracing::debug!("Subscription stream closed");
        });

        self.state = State::Subscribed { cancel, task };
        Ok(self)
    }

    /// Close the event stream. No-op when never subscribed or already closed.
    pub fn unsubscribe(&mut self) {
        self.state = match std::mem::replace(&mut self.state, State::Inert) {
            State::Subscribed { cancel, task } => {
                cancel.cancel();
                State::Unsubscribed { task: Some(task) }
            }
            other => other,
        };
    }

    /// Unsubscribe and wait until the stream is closed and no callback can
    /// run anymore.
    pub async fn shutdown(&mut self) {
        self.unsubscribe();
        if let State::Unsubscribed { task } = &mut self.state {
            if let Some(task) = task.take() {
                if let Err(e) = task.await {
                    if e.is_panic() {
                        tracing::error!("Subscription callback panicked: {}", e);
                    }
                }
            }
        }
    }

    /// Handle for closing this subscription elsewhere. `None` unless subscribed.
    pub fn close_handle(&self) -> Option<CloseHandle> {
        match &self.state {
            State::Subscribed { cancel, .. } => Some(CloseHandle {
                token: cancel.clone(),
            }),
            _ => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let State::Subscribed { cancel, .. } = &self.state {
            cancel.cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("query", &self.query)
            .field("variables", &self.variables)
            .field("params", &self.params)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SubscriberConfig;
    use crate::event::StreamEvent;
    use crate::transport::{EventStream, PushTransport};
    use futures_util::Stream;
    use serde_json::json;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::task::{Context, Poll};

    #[derive(Default)]
    struct CountingTransport {
        opened: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
    }

    struct PendingStream {
        closed: Arc<AtomicUsize>,
    }

    impl Stream for PendingStream {
        type Item = StreamEvent;

        fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<StreamEvent>> {
            Poll::Pending
        }
    }

    impl EventStream for PendingStream {
        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl PushTransport for CountingTransport {
        fn open(&self, _url: &Url) -> Result<Box<dyn EventStream>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(PendingStream {
                closed: self.closed.clone(),
            }))
        }
    }

    fn client(url: &str) -> (SubscriberClient, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let transport = CountingTransport::default();
        let opened = transport.opened.clone();
        let closed = transport.closed.clone();
        (
            SubscriberClient::with_transport(SubscriberConfig::new(url), transport),
            opened,
            closed,
        )
    }

    const QUERY: &str = "subscription { someSubscription { id, value } }";

    #[test]
    fn test_request_parse() {
        let json = json!({
            "query": QUERY,
            "variables": {"id": 1}
        });

        let request: SubscriptionRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.query, QUERY);
        assert_eq!(request.variables["id"], 1);
    }

    #[test]
    fn test_request_no_variables() {
        let request: SubscriptionRequest =
            serde_json::from_value(json!({"query": QUERY})).unwrap();
        assert!(request.variables.is_empty());
        assert_eq!(request.variables_json(), "{}");
    }

    #[test]
    fn test_with_variables_object() {
        let request = SubscriptionRequest::new(QUERY)
            .with_variables(&json!({"b": 2, "a": "x"}))
            .unwrap();
        assert_eq!(request.variables_json(), r#"{"a":"x","b":2}"#);
    }

    #[test]
    fn test_with_variables_none_is_empty() {
        let request = SubscriptionRequest::new(QUERY)
            .with_variables(&Option::<Value>::None)
            .unwrap();
        assert_eq!(request.variables_json(), "{}");
    }

    #[test]
    fn test_with_variables_rejects_non_object() {
        let err = SubscriptionRequest::new(QUERY)
            .with_variables(&json!([1, 2]))
            .unwrap_err();
        assert!(matches!(err, SubscriberError::InvalidVariables(ref t) if t == "array"));
    }

    #[test]
    fn test_encode() {
        let request = SubscriptionRequest::new("subscription { s { id } }")
            .with_variables(&json!({"id": 1}))
            .unwrap();
        assert_eq!(
            request.encode(),
            "query=subscription+%7B+s+%7B+id+%7D+%7D&variables=%7B%22id%22%3A1%7D"
        );
    }

    #[test]
    fn test_compose_url() {
        let params = "query=q&variables=%7B%7D";
        assert_eq!(
            compose_url("https://example.com/graphql", params).unwrap().as_str(),
            "https://example.com/graphql?query=q&variables=%7B%7D"
        );
        assert_eq!(
            compose_url("https://example.com/graphql?", params).unwrap().as_str(),
            "https://example.com/graphql?query=q&variables=%7B%7D"
        );
        assert_eq!(
            compose_url("https://example.com/graphql?key=abc", params).unwrap().as_str(),
            "https://example.com/graphql?key=abc&query=q&variables=%7B%7D"
        );
        assert!(compose_url("not a url", params).is_err());
    }

    #[test]
    fn test_build_is_inert() {
        let (client, opened, _) = client("https://example.com/graphql");
        let request = SubscriptionRequest::new(QUERY)
            .with_variables(&json!({"id": 1}))
            .unwrap();
        let sub = client.graphql(request);

        assert_eq!(sub.query(), QUERY);
        assert_eq!(sub.variables(), json!({"id": 1}).to_string());
        assert_eq!(sub.status(), SubscriptionStatus::Inert);
        assert!(sub.close_handle().is_none());
        assert_eq!(opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscribe_without_runtime() {
        let (client, opened, _) = client("https://example.com/graphql");
        let mut sub = client.graphql(SubscriptionRequest::new(QUERY));

        assert!(matches!(sub.subscribe(Callbacks::new()), Err(SubscriberError::NoRuntime)));
        assert_eq!(sub.status(), SubscriptionStatus::Inert);
        assert_eq!(opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_subscribe_without_url() {
        let client = SubscriberClient::with_transport(
            SubscriberConfig::default(),
            CountingTransport::default(),
        );
        let mut sub = client.graphql(SubscriptionRequest::new(QUERY));

        assert!(matches!(sub.subscribe(Callbacks::new()), Err(SubscriberError::MissingUrl)));
        assert_eq!(sub.status(), SubscriptionStatus::Inert);
    }

    #[tokio::test]
    async fn test_unsubscribe_closes_once() {
        let (client, opened, closed) = client("https://example.com/graphql");
        let mut sub = client.graphql(SubscriptionRequest::new(QUERY));

        sub.unsubscribe();
        assert_eq!(sub.status(), SubscriptionStatus::Inert);

        sub.subscribe(Callbacks::new()).unwrap();
        assert_eq!(sub.status(), SubscriptionStatus::Subscribed);
        assert_eq!(opened.load(Ordering::SeqCst), 1);

        sub.unsubscribe();
        sub.unsubscribe();
        sub.shutdown().await;

        assert_eq!(sub.status(), SubscriptionStatus::Unsubscribed);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_double_subscribe_rejected() {
        let (client, opened, _) = client("https://example.com/graphql");
        let mut sub = client.graphql(SubscriptionRequest::new(QUERY));

        sub.subscribe(Callbacks::new()).unwrap();
        assert!(matches!(
            sub.subscribe(Callbacks::new()),
            Err(SubscriberError::AlreadySubscribed)
        ));

        sub.shutdown().await;
        assert!(matches!(sub.subscribe(Callbacks::new()), Err(SubscriberError::Closed)));
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_handle() {
        let (client, _, closed) = client("https://example.com/graphql");
        let mut sub = client.graphql(SubscriptionRequest::new(QUERY));
        sub.subscribe(Callbacks::new()).unwrap();

        let handle = sub.close_handle().unwrap();
        handle.close();

        assert!(handle.is_closed());
        assert_eq!(sub.status(), SubscriptionStatus::Unsubscribed);
        sub.shutdown().await;
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
