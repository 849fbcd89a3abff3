//! # graphql-sse-subscriber
//!
//! Rust client for GraphQL subscriptions delivered over Server-Sent Events,
//! such as AWS AppSync style `GET ?query=...&variables=...` endpoints.
//!
//! ## Example
//!
//! ```rust,ignore
//! use graphql_sse_subscriber::prelude::*;
//! use serde_json::json;
//!
//! let client = SubscriberClient::new(SubscriberConfig::new("https://example.com/graphql"))?;
//!
//! let request = SubscriptionRequest::new("subscription { onTrade { id price } }")
//!     .with_variables(&json!({ "market": "SOL" }))?;
//!
//! let mut sub = client.graphql(request);
//! sub.subscribe(
//!     Callbacks::new()
//!         .on_next(|data| println!("trade: {}", data))
//!         .on_error(|errors| eprintln!("error: {}", errors)),
//! )?;
//!
//! // ...
//! sub.unsubscribe();
//! ```
//!
//! ## Lifecycle
//!
//! - **Inert** - built by [`SubscriberClient::graphql`], no connection
//! - **Subscribed** - stream open, events routed to the callbacks
//! - **Unsubscribed** - stream closed, terminal

mod client;
mod config;
mod error;
mod event;
pub mod prelude;
mod router;
pub mod sse;
mod subscription;
mod transport;

pub use client::SubscriberClient;
pub use config::{ErrorPolicy, SubscriberConfig};
pub use error::{Result, SubscriberError};
pub use event::{GraphQLError, GraphQLErrors, StreamEvent};
pub use router::{Callbacks, ErrorCallback, EventRouter, NextCallback};
pub use subscription::{CloseHandle, Subscription, SubscriptionRequest, SubscriptionStatus};
pub use transport::{classify, is_event_stream, EventStream, HttpTransport, PushTransport};

pub use serde_json::Value;
