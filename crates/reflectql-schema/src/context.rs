//! Per-request execution context.
//!
//! The context travels through the engine's request data and is read
//! back by every generated resolve function. It carries the instance
//! resolver used to materialize resolver classes, plus request
//! metadata for tracing.
//!
//! # Example
//!
//! ```ignore
//! let context = ExecutionContext::builder()
//!     .with_injector(injector.clone())
//!     .with_request_id("req-123")
//!     .build()?;
//!
//! let response = schema.execute(Request::new(query).data(context)).await;
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::FieldError;
use crate::registry::ResolverBinding;

/// Resolves resolver-class instances on behalf of the dependency
/// injection collaborator.
pub trait InstanceResolver: Send + Sync {
    /// Produces the instance bound to the given resolver class, taking
    /// the binding's scope into account.
    fn resolve(&self, binding: &ResolverBinding) -> Result<Arc<dyn Any + Send + Sync>, FieldError>;
}

/// Shared handle to an instance resolver.
pub type DynInstanceResolver = Arc<dyn InstanceResolver>;

/// A minimal instance resolver backed by a provider map.
///
/// Instances are registered once during bootstrap; lookups try the
/// binding's scope first and fall back to the unscoped provider.
#[derive(Default)]
pub struct SimpleInjector {
    providers: HashMap<(TypeId, Option<String>), Arc<dyn Any + Send + Sync>>,
}

impl SimpleInjector {
    /// Creates an empty injector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an unscoped instance for its concrete type.
    pub fn provide<T: Send + Sync + 'static>(&mut self, instance: T) {
        self.providers
            .insert((TypeId::of::<T>(), None), Arc::new(instance));
    }

    /// Registers an instance under a named scope.
    pub fn provide_scoped<T: Send + Sync + 'static>(&mut self, scope: impl Into<String>, instance: T) {
        self.providers
            .insert((TypeId::of::<T>(), Some(scope.into())), Arc::new(instance));
    }
}

impl InstanceResolver for SimpleInjector {
    fn resolve(&self, binding: &ResolverBinding) -> Result<Arc<dyn Any + Send + Sync>, FieldError> {
        if let Some(scope) = binding.scope() {
            if let Some(instance) = self
                .providers
                .get(&(binding.class(), Some(scope.to_string())))
            {
                return Ok(Arc::clone(instance));
            }
        }
        self.providers
            .get(&(binding.class(), None))
            .map(Arc::clone)
            .ok_or_else(|| FieldError::UnresolvedInstance(binding.class_name().to_string()))
    }
}

/// Execution context handed to resolvers and middleware.
///
/// Cloned per resolver invocation; all shared state is behind `Arc`.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Instance resolver for resolver classes.
    pub injector: DynInstanceResolver,

    /// Request ID for tracing and correlation.
    pub request_id: String,
}

impl ExecutionContext {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> ExecutionContextBuilder {
        ExecutionContextBuilder::default()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ExecutionContext`].
///
/// Validates that all required fields are provided before creating the
/// context.
#[derive(Default)]
pub struct ExecutionContextBuilder {
    injector: Option<DynInstanceResolver>,
    request_id: Option<String>,
}

impl ExecutionContextBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the instance resolver.
    #[must_use]
    pub fn with_injector(mut self, injector: DynInstanceResolver) -> Self {
        self.injector = Some(injector);
        self
    }

    /// Sets the request ID.
    #[must_use]
    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Builds the context.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing.
    pub fn build(self) -> Result<ExecutionContext, ContextBuilderError> {
        let injector = self
            .injector
            .ok_or(ContextBuilderError::MissingField("injector"))?;
        let request_id = self
            .request_id
            .ok_or(ContextBuilderError::MissingField("request_id"))?;

        Ok(ExecutionContext {
            injector,
            request_id,
        })
    }
}

/// Errors that can occur when building an [`ExecutionContext`].
#[derive(Debug, thiserror::Error)]
pub enum ContextBuilderError {
    /// A required field was not provided.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UserResolver;

    #[test]
    fn builder_requires_injector() {
        let result = ExecutionContextBuilder::new().with_request_id("req-1").build();
        assert!(matches!(
            result,
            Err(ContextBuilderError::MissingField("injector"))
        ));
    }

    #[test]
    fn injector_resolves_registered_instances() {
        let mut injector = SimpleInjector::new();
        injector.provide(UserResolver);

        let binding = ResolverBinding::of::<UserResolver>();
        let instance = injector.resolve(&binding).unwrap();
        assert!(instance.downcast::<UserResolver>().is_ok());
    }

    #[test]
    fn injector_falls_back_to_unscoped_provider() {
        let mut injector = SimpleInjector::new();
        injector.provide(UserResolver);

        let binding = ResolverBinding::scoped::<UserResolver>("admin");
        assert!(injector.resolve(&binding).is_ok());
    }

    #[test]
    fn unregistered_class_is_an_error() {
        let injector = SimpleInjector::new();
        let binding = ResolverBinding::of::<UserResolver>();
        let err = injector.resolve(&binding).unwrap_err();
        assert!(err.to_string().contains("UserResolver"));
    }
}
