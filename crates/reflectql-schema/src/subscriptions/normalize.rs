//! Shape dispatch and adapters.
//!
//! Dispatch is over a closed tagged variant, by capability: pull-based
//! sources are wrapped with a thin serializing map, push-based sources
//! are adapted through a forwarding channel whose lifetime is tied to
//! the consumer's iteration. Nothing here reorders, coalesces, or adds
//! a buffering policy of its own, and the adapted source never
//! outlives its consumer.

use std::sync::Arc;

use async_graphql::Value;
use async_stream::stream;
use futures_util::Stream;
use futures_util::stream::{BoxStream, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use super::channel::EventChannel;
use crate::error::FieldError;

/// Serializes one emitted item for the schema engine.
pub type ItemSerializer = Arc<dyn Fn(serde_json::Value) -> Result<Value, FieldError> + Send + Sync>;

/// The closed set of asynchronous production shapes a subscription
/// handler can settle to.
pub enum SubscriptionSource {
    /// A pull-based item sequence: an async generator or any async
    /// iterable.
    Sequence(BoxStream<'static, Result<serde_json::Value, FieldError>>),
    /// A push observable with a subscribe/next protocol.
    Observable(Arc<dyn Observable>),
    /// An event channel.
    Channel(Arc<EventChannel>),
}

impl SubscriptionSource {
    /// Wraps a pull-based stream.
    pub fn sequence<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<serde_json::Value, FieldError>> + Send + 'static,
    {
        Self::Sequence(stream.boxed())
    }

    /// Lower-case label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sequence(_) => "sequence",
            Self::Observable(_) => "observable",
            Self::Channel(_) => "channel",
        }
    }
}

/// A push-based value producer.
///
/// Implementations forward produced values into the observer as they
/// appear and release the production when the returned handle drops.
pub trait Observable: Send + Sync {
    /// Opens a subscription. The returned handle is dropped when the
    /// consumer stops iterating; its cancel hook must release the
    /// production.
    fn subscribe(&self, observer: SubscriptionObserver) -> SubscriptionHandle;
}

enum ObserverEvent {
    Next(serde_json::Value),
    Error(FieldError),
    Complete,
}

/// The observer half of an [`Observable`] subscription.
pub struct SubscriptionObserver {
    tx: mpsc::UnboundedSender<ObserverEvent>,
}

impl SubscriptionObserver {
    /// Emits one value. Values are forwarded in emission order.
    pub fn next(&self, value: serde_json::Value) {
        let _ = self.tx.send(ObserverEvent::Next(value));
    }

    /// Terminates the subscription with an error.
    pub fn error(&self, error: FieldError) {
        let _ = self.tx.send(ObserverEvent::Error(error));
    }

    /// Terminates the subscription normally.
    pub fn complete(&self) {
        let _ = self.tx.send(ObserverEvent::Complete);
    }
}

/// Releases an observable subscription when dropped.
pub struct SubscriptionHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    /// A handle running the given hook on release.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to release.
    pub fn noop() -> Self {
        Self { cancel: None }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// Normalizes a subscription source into one uniform stream of
/// serialized items.
///
/// Emission order is the source's order. Dropping the returned stream
/// releases the underlying producer: the pull wrapper drops the source
/// stream, the observable adapter runs its cancel hook, and the
/// channel adapter drops its broadcast receiver.
pub fn normalize(
    source: SubscriptionSource,
    serialize: ItemSerializer,
) -> BoxStream<'static, Result<Value, async_graphql::Error>> {
    match source {
        SubscriptionSource::Sequence(sequence) => sequence
            .map(move |item| {
                item.and_then(|value| (*serialize)(value))
                    .map_err(async_graphql::Error::from)
            })
            .boxed(),

        SubscriptionSource::Observable(observable) => {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let handle = observable.subscribe(SubscriptionObserver { tx });
            stream! {
                let _guard = handle;
                while let Some(event) = rx.recv().await {
                    match event {
                        ObserverEvent::Next(value) => {
                            yield (*serialize)(value).map_err(async_graphql::Error::from);
                        }
                        ObserverEvent::Error(error) => {
                            yield Err(error.into());
                            break;
                        }
                        ObserverEvent::Complete => break,
                    }
                }
            }
            .boxed()
        }

        SubscriptionSource::Channel(channel) => {
            let mut receiver = channel.subscribe();
            let channel_name = channel.name().to_string();
            stream! {
                loop {
                    match receiver.recv().await {
                        Ok(event) => {
                            yield (*serialize)(event).map_err(async_graphql::Error::from);
                        }
                        Err(broadcast::error::RecvError::Lagged(count)) => {
                            warn!(channel = %channel_name, count, "subscription lagged, events were dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!(channel = %channel_name, "event channel closed");
                            break;
                        }
                    }
                }
            }
            .boxed()
        }
    }
}
