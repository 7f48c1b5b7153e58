//! Subscription sources and normalization.
//!
//! Subscription handlers may produce their items in four shapes: a
//! pull-based sequence (async generator or async iterable), a push
//! observable, or an event channel, any of them possibly behind a
//! promise. This module normalizes all of them into one uniform,
//! ordered, cancelable stream of serialized items.
//!
//! ## Components
//!
//! - [`SubscriptionSource`] - the closed set of adaptable shapes
//! - [`normalize`] - the shape dispatch and adapters
//! - [`EventChannel`] - broadcast-backed publish/subscribe bus
//! - [`Observable`] - the push subscribe/next protocol

mod channel;
mod normalize;

pub use channel::EventChannel;
pub use normalize::{
    ItemSerializer, Observable, SubscriptionHandle, SubscriptionObserver, SubscriptionSource,
    normalize,
};
