//! Bound handlers and their registration metadata.
//!
//! A handler is the executable side of one exposed field: an async
//! closure bound to a resolver class, invoked with the call arguments
//! spliced back into their declared parameter positions. The
//! surrounding [`HandlerEntry`] carries everything the schema compiler
//! needs to expose the handler: its reflected signature, exposed name,
//! description, deprecation reason, and per-entry middleware.

use std::any::Any;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use reflectql_reflect::MethodSignature;
use serde::de::DeserializeOwned;

use crate::context::ExecutionContext;
use crate::error::FieldError;
use crate::middleware::DynMiddleware;
use crate::subscriptions::SubscriptionSource;

/// Which kind of field a handler is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A top-level query field.
    Query,
    /// A top-level mutation field.
    Mutation,
    /// A top-level subscription field.
    Subscription,
    /// A resolver for a single field of a named output type.
    FieldResolver,
}

impl FieldKind {
    /// Lower-case label for logging.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
            Self::FieldResolver => "field resolver",
        }
    }
}

/// One positional slot of a handler invocation.
#[derive(Debug, Clone)]
pub enum CallSlot {
    /// A deserialized, validated field argument.
    Argument(serde_json::Value),
    /// The parent value, spliced into its declared position.
    Parent(serde_json::Value),
    /// The execution context, spliced into its declared position.
    Context(ExecutionContext),
}

/// The re-assembled positional arguments of one handler invocation.
#[derive(Debug, Clone, Default)]
pub struct HandlerCall {
    slots: Vec<CallSlot>,
}

impl HandlerCall {
    pub(crate) fn new(slots: Vec<CallSlot>) -> Self {
        Self { slots }
    }

    /// All slots, in declared parameter order.
    pub fn slots(&self) -> &[CallSlot] {
        &self.slots
    }

    /// The argument at the given declared parameter position.
    pub fn argument(&self, index: usize) -> Option<&serde_json::Value> {
        match self.slots.get(index) {
            Some(CallSlot::Argument(value)) => Some(value),
            _ => None,
        }
    }

    /// Deserializes the argument at the given position.
    pub fn argument_as<T: DeserializeOwned>(&self, index: usize) -> Result<T, FieldError> {
        let value = self
            .argument(index)
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        serde_json::from_value(value)
            .map_err(|e| FieldError::Handler(format!("argument {index}: {e}")))
    }

    /// The parent value, wherever it was declared.
    pub fn parent(&self) -> Option<&serde_json::Value> {
        self.slots.iter().find_map(|slot| match slot {
            CallSlot::Parent(value) => Some(value),
            _ => None,
        })
    }

    /// Deserializes the parent value.
    pub fn parent_as<T: DeserializeOwned>(&self) -> Result<T, FieldError> {
        let value = self.parent().cloned().unwrap_or(serde_json::Value::Null);
        serde_json::from_value(value).map_err(|e| FieldError::Handler(format!("parent: {e}")))
    }

    /// The execution context, wherever it was declared.
    pub fn context(&self) -> Option<&ExecutionContext> {
        self.slots.iter().find_map(|slot| match slot {
            CallSlot::Context(context) => Some(context),
            _ => None,
        })
    }
}

/// What a handler produced.
pub enum HandlerReturn {
    /// A settled value, serialized after the call.
    Value(serde_json::Value),
    /// An asynchronous production source. Only valid for subscription
    /// fields.
    Source(SubscriptionSource),
}

impl HandlerReturn {
    /// A settled JSON value.
    pub fn json(value: serde_json::Value) -> Self {
        Self::Value(value)
    }

    /// Serializes any `Serialize` value into a settled result.
    pub fn value<T: serde::Serialize>(value: T) -> Result<Self, FieldError> {
        serde_json::to_value(value)
            .map(Self::Value)
            .map_err(|e| FieldError::Handler(e.to_string()))
    }

    /// A void result.
    pub fn void() -> Self {
        Self::Value(serde_json::Value::Null)
    }

    /// A pull-based item sequence (async generator or iterable).
    pub fn stream<S>(stream: S) -> Self
    where
        S: futures_util::Stream<Item = Result<serde_json::Value, FieldError>> + Send + 'static,
    {
        Self::Source(SubscriptionSource::sequence(stream))
    }

    /// A push observable.
    pub fn observable(observable: Arc<dyn crate::subscriptions::Observable>) -> Self {
        Self::Source(SubscriptionSource::Observable(observable))
    }

    /// An event channel.
    pub fn channel(channel: Arc<crate::subscriptions::EventChannel>) -> Self {
        Self::Source(SubscriptionSource::Channel(channel))
    }
}

/// The bound handler closure.
///
/// The first parameter is the resolver-class instance produced by the
/// injection collaborator; the closure downcasts it to its concrete
/// type.
pub type HandlerFn = Arc<
    dyn Fn(Arc<dyn Any + Send + Sync>, HandlerCall) -> BoxFuture<'static, Result<HandlerReturn, FieldError>>
        + Send
        + Sync,
>;

/// Wraps a typed async closure into a [`HandlerFn`], downcasting the
/// instance to the resolver class the closure expects.
pub fn handler_fn<T, F, Fut>(f: F) -> HandlerFn
where
    T: Send + Sync + 'static,
    F: Fn(Arc<T>, HandlerCall) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<HandlerReturn, FieldError>> + Send + 'static,
{
    Arc::new(
        move |instance, call| -> BoxFuture<'static, Result<HandlerReturn, FieldError>> {
            match instance.downcast::<T>() {
                Ok(typed) => Box::pin(f(typed, call)),
                Err(_) => Box::pin(std::future::ready(Err(FieldError::Handler(
                    "resolver instance has an unexpected type".to_string(),
                )))),
            }
        },
    )
}

/// Metadata and executable binding for one exposed handler method.
pub struct HandlerEntry {
    /// The method name on the resolver class.
    pub method_name: String,
    /// The externally visible field name. Defaults to the method name.
    pub exposed_name: String,
    /// Field description.
    pub description: Option<String>,
    /// Deprecation reason, if deprecated.
    pub deprecation_reason: Option<String>,
    /// Middleware applied to this entry, after class-level middleware.
    pub middleware: Vec<DynMiddleware>,
    /// The reflected method signature.
    pub signature: MethodSignature,
    /// The bound handler.
    pub handler: HandlerFn,
}

impl HandlerEntry {
    /// Creates an entry exposed under its method name.
    pub fn new(
        method_name: impl Into<String>,
        signature: MethodSignature,
        handler: HandlerFn,
    ) -> Self {
        let method_name = method_name.into();
        Self {
            exposed_name: method_name.clone(),
            method_name,
            description: None,
            deprecation_reason: None,
            middleware: Vec::new(),
            signature,
            handler,
        }
    }

    /// Overrides the exposed field name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.exposed_name = name.into();
        self
    }

    /// Attaches a description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the entry deprecated with a reason.
    pub fn deprecated(mut self, reason: impl Into<String>) -> Self {
        self.deprecation_reason = Some(reason.into());
        self
    }

    /// Appends entry-level middleware.
    pub fn with_middleware(mut self, middleware: DynMiddleware) -> Self {
        self.middleware.push(middleware);
        self
    }
}

/// The handler sets of one resolver class, populated once by the
/// module-composition layer and immutable afterwards.
#[derive(Default)]
pub struct HandlerSet {
    /// Query handlers, in registration order.
    pub queries: Vec<HandlerEntry>,
    /// Mutation handlers, in registration order.
    pub mutations: Vec<HandlerEntry>,
    /// Subscription handlers, in registration order.
    pub subscriptions: Vec<HandlerEntry>,
    /// Field resolvers, in registration order.
    pub field_resolvers: Vec<HandlerEntry>,
    /// Class-level middleware, applied before any entry middleware.
    pub middleware: Vec<DynMiddleware>,
}

impl HandlerSet {
    /// Creates an empty handler set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a query handler.
    pub fn query(mut self, entry: HandlerEntry) -> Self {
        self.queries.push(entry);
        self
    }

    /// Adds a mutation handler.
    pub fn mutation(mut self, entry: HandlerEntry) -> Self {
        self.mutations.push(entry);
        self
    }

    /// Adds a subscription handler.
    pub fn subscription(mut self, entry: HandlerEntry) -> Self {
        self.subscriptions.push(entry);
        self
    }

    /// Adds a field resolver. The entry's exposed name selects the
    /// property it resolves.
    pub fn field_resolver(mut self, entry: HandlerEntry) -> Self {
        self.field_resolvers.push(entry);
        self
    }

    /// Appends class-level middleware.
    pub fn with_middleware(mut self, middleware: DynMiddleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Looks up a field resolver by the property it resolves.
    pub fn field_resolver_for(&self, property: &str) -> Option<&HandlerEntry> {
        self.field_resolvers
            .iter()
            .find(|entry| entry.exposed_name == property)
    }
}
