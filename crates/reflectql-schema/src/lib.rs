//! # reflectql-schema
//!
//! Compiles reflected structural type descriptions and registered
//! handler methods into an executable GraphQL schema.
//!
//! The compiler walks [`reflectql_reflect::TypeDescriptor`] trees and
//! produces named, memoized schema types with correct nullability,
//! resolving inter-type dependencies, including circular references,
//! without infinite recursion. Each exposed handler method is wrapped
//! in a resolve function with a fixed execution contract: deserialize
//! arguments, validate them, run the middleware chain, invoke the
//! bound handler, and serialize the result. Subscription handlers may
//! produce their items as pull sequences, push observables, or event
//! channels; all shapes are normalized into one uniform, cancelable
//! stream.
//!
//! ## Overview
//!
//! ```ignore
//! let mut handlers = HandlerRegistry::new();
//! handlers.register_handler_set::<UserResolver>(
//!     HandlerSet::new().query(
//!         HandlerEntry::new("user", signature, handler_fn(UserResolver::user)),
//!     ),
//! );
//!
//! let schema = SchemaAssembler::new(Arc::new(handlers))
//!     .add_resolver(ResolverBinding::of::<UserResolver>())
//!     .assemble()?;
//!
//! let response = schema
//!     .execute(Request::new("{ user(id: 1) { name } }").data(context))
//!     .await;
//! ```
//!
//! ## Modules
//!
//! - [`scalars`] - primitive/branded descriptor to scalar mapping
//! - [`schema`] - type graph building and schema assembly
//! - [`resolver`] - resolver function factory
//! - [`subscriptions`] - async source normalization
//! - [`middleware`] - sequential field middleware
//! - [`codec`] - value serialization/validation collaborator
//! - [`context`] - per-request execution context and injection
//! - [`registry`] - handler-set and type-resolver registries
//! - [`handler`] - bound handlers and registration metadata
//! - [`driver`] - transport driver interface
//! - [`error`] - build-time and per-call error types

pub mod codec;
pub mod context;
pub mod driver;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod registry;
pub mod resolver;
pub mod scalars;
pub mod schema;
pub mod subscriptions;

// Re-export main types
pub use codec::{JsonCodec, ValidationIssue, ValueCodec};
pub use context::{ExecutionContext, ExecutionContextBuilder, InstanceResolver, SimpleInjector};
pub use error::{FieldError, SchemaError};
pub use handler::{
    FieldKind, HandlerCall, HandlerEntry, HandlerReturn, HandlerSet, handler_fn,
};
pub use middleware::{Middleware, MiddlewareNext, middleware_fn};
pub use registry::{HandlerRegistry, ResolverBinding, TypeResolvers};
pub use schema::{SchemaAssembler, SchemaConfig, SchemaDirective, SchemaFragment, TypeBuilder};
pub use subscriptions::{EventChannel, Observable, SubscriptionSource};

/// Result type for schema-construction operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
