use crate::config::SubscriberConfig;
use crate::error::Result;
use crate::event::StreamEvent;
use crate::sse::{SseEvent, SseParser};
use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use url::Url;

/// An open server-push connection.
///
/// Yields events in the order the server sent them and ends when the
/// connection is gone. After [`close`](EventStream::close) the stream must
/// yield `None`.
pub trait EventStream: Stream<Item = StreamEvent> + Send + Unpin {
    fn close(&mut self);
}

/// Opens server-push connections.
///
/// `open` must not block: any network I/O happens when the returned stream
/// is first polled.
pub trait PushTransport: Send + Sync {
    fn open(&self, url: &Url) -> Result<Box<dyn EventStream>>;
}

/// Maps a decoded SSE event onto the two channels a subscription listens to.
/// Named events other than `message` and `error` are not routed.
pub fn classify(event: SseEvent) -> Option<StreamEvent> {
    match event.event_type() {
        "message" => Some(StreamEvent::Message(event.data)),
        "error" if event.data.is_empty() => Some(StreamEvent::Error(None)),
        "error" => Some(StreamEvent::Error(Some(event.data))),
        other => {
            tracing::debug!("Ignoring event of type {:?}", other);
            None
        }
    }
}

/// Whether a `Content-Type` value denotes an event stream, ignoring parameters
/// such as `charset`.
pub fn is_event_stream(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("text/event-stream"))
        .unwrap_or(false)
}

/// [`PushTransport`] that issues a plain HTTP GET and decodes the response
/// body as `text/event-stream`. Failures end the stream after a single
/// payload-less error event; there is no reconnection.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &SubscriberConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl PushTransport for HttpTransport {
    fn open(&self, url: &Url) -> Result<Box<dyn EventStream>> {
        let state = HttpState::Connect {
            client: self.client.clone(),
            url: url.clone(),
        };
        Ok(Box::new(HttpEventStream {
            inner: Some(stream::unfold(state, step).boxed()),
        }))
    }
}

struct HttpEventStream {
    inner: Option<BoxStream<'static, StreamEvent>>,
}

impl Stream for HttpEventStream {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.get_mut().inner.as_mut() {
            Some(inner) => inner.poll_next_unpin(cx),
            None => Poll::Ready(None),
        }
    }
}

impl EventStream for HttpEventStream {
    fn close(&mut self) {
        // Dropping the body stream releases the connection.
        self.inner = None;
    }
}

enum HttpState {
    Connect {
        client: reqwest::Client,
        url: Url,
    },
    Streaming {
        body: BoxStream<'static, reqwest::Result<Bytes>>,
        parser: SseParser,
        pending: VecDeque<StreamEvent>,
    },
    Done,
}

async fn step(mut state: HttpState) -> Option<(StreamEvent, HttpState)> {
    loop {
        state = match state {
            HttpState::Connect { client, url } => {
                let response = client
                    .get(url.clone())
                    .header(ACCEPT, "text/event-stream")
                    .header(CACHE_CONTROL, "no-cache")
                    .send()
                    .await;

                match response {
                    Ok(response)
                        if response.status().is_success()
                            && is_event_stream(
                                response
                                    .headers()
                                    .get(CONTENT_TYPE)
                                    .and_then(|v| v.to_str().ok()),
                            ) =>
                    {
                        tracing::debug!("Event stream opened: {}", url);
                        HttpState::Streaming {
                            body: response.bytes_stream().boxed(),
                            parser: SseParser::new(),
                            pending: VecDeque::new(),
                        }
                    }
                    Ok(response) if response.status().is_success() => {
                        tracing::warn!(
                            "Event stream rejected: unexpected content type {:?}",
                            response.headers().get(CONTENT_TYPE)
                        );
                        return Some((StreamEvent::Error(None), HttpState::Done));
                    }
                    Ok(response) => {
                        tracing::warn!("Event stream rejected with status {}", response.status());
                        return Some((StreamEvent::Error(None), HttpState::Done));
                    }
                    Err(e) => {
                        tracing::warn!("Event stream connection failed: {}", e);
                        return Some((StreamEvent::Error(None), HttpState::Done));
                    }
                }
            }
            HttpState::Streaming {
                mut body,
                mut parser,
                mut pending,
            } => {
                if let Some(event) = pending.pop_front() {
                    return Some((
                        event,
                        HttpState::Streaming {
                            body,
                            parser,
                            pending,
                        },
                    ));
                }

                match body.next().await {
                    Some(Ok(chunk)) => {
                        pending.extend(parser.push(&chunk).into_iter().filter_map(classify));
                        HttpState::Streaming {
                            body,
                            parser,
                            pending,
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!("Event stream interrupted: {}", e);
                        return Some((StreamEvent::Error(None), HttpState::Done));
                    }
                    None => {
                        tracing::debug!("Event stream ended by server");
                        return None;
                    }
                }
            }
            HttpState::Done => return None,
        };
    }
}
