//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use graphql_sse_subscriber::prelude::*;
//!
//! let client = SubscriberClient::new(SubscriberConfig::new("https://example.com/graphql"))?;
//! let mut sub = client.graphql(SubscriptionRequest::new("subscription { onEvent { id } }"));
//! sub.subscribe(Callbacks::new().on_next(|data| println!("{}", data)))?;
//! ```

pub use crate::{
    Callbacks, CloseHandle, ErrorPolicy, GraphQLErrors, SubscriberClient, SubscriberConfig,
    SubscriberError, Subscription, SubscriptionRequest, SubscriptionStatus, Value,
};
