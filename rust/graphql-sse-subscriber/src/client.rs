use crate::config::SubscriberConfig;
use crate::error::Result;
use crate::subscription::{Subscription, SubscriptionRequest};
use crate::transport::{HttpTransport, PushTransport};
use std::fmt;
use std::sync::Arc;

struct SubscriberClientInner {
    config: SubscriberConfig,
    transport: Box<dyn PushTransport>,
}

/// Entry point: holds the configuration and the transport shared by every
/// subscription it builds. Cheap to clone.
#[derive(Clone)]
pub struct SubscriberClient {
    inner: Arc<SubscriberClientInner>,
}

impl SubscriberClient {
    /// Client backed by [`HttpTransport`].
    pub fn new(config: SubscriberConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport<T>(config: SubscriberConfig, transport: T) -> Self
    where
        T: PushTransport + 'static,
    {
        Self {
            inner: Arc::new(SubscriberClientInner {
                config,
                transport: Box::new(transport),
            }),
        }
    }

    pub fn config(&self) -> &SubscriberConfig {
        &self.inner.config
    }

    pub(crate) fn transport(&self) -> &dyn PushTransport {
        self.inner.transport.as_ref()
    }

    /// Build an inert subscription. No connection is opened until
    /// [`Subscription::subscribe`] is called.
    pub fn graphql(&self, request: SubscriptionRequest) -> Subscription {
        Subscription::new(self.clone(), request)
    }
}

impl fmt::Debug for SubscriberClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberClient")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
