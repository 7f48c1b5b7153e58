//! Handler-set and type-resolver registries.
//!
//! Registration happens once during application bootstrap, driven by
//! the module-composition layer; the schema compiler only ever reads
//! these registries. Neither is consulted after assembly completes.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::HandlerSet;

/// Pairs a resolver class with its instantiation recipe.
///
/// Created when a handler-bearing class is discovered during module
/// composition; looked up by the type graph when a named object type
/// needs one of the class's field resolvers, and at call time to
/// resolve the instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolverBinding {
    class: TypeId,
    class_name: &'static str,
    scope: Option<String>,
}

impl ResolverBinding {
    /// Binds a resolver class with no injection scope.
    pub fn of<T: 'static>() -> Self {
        Self {
            class: TypeId::of::<T>(),
            class_name: short_type_name::<T>(),
            scope: None,
        }
    }

    /// Binds a resolver class within a named injection scope.
    pub fn scoped<T: 'static>(scope: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
            ..Self::of::<T>()
        }
    }

    /// The resolver class identity.
    pub fn class(&self) -> TypeId {
        self.class
    }

    /// The resolver class name, for diagnostics.
    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    /// The injection scope, if any.
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Registry of handler sets keyed by resolver class.
///
/// Populated by explicit `register_handler_set` calls during
/// bootstrap, in any order; read-only during schema assembly.
#[derive(Default)]
pub struct HandlerRegistry {
    sets: HashMap<TypeId, HandlerSet>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler set of a resolver class. A second
    /// registration for the same class replaces the first.
    pub fn register_handler_set<T: 'static>(&mut self, set: HandlerSet) {
        self.sets.insert(TypeId::of::<T>(), set);
    }

    /// Looks up the handler set for a binding.
    pub fn lookup(&self, binding: &ResolverBinding) -> Option<&HandlerSet> {
        self.sets.get(&binding.class())
    }

    /// Number of registered resolver classes.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether no resolver class is registered.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Shared handle to a populated handler registry.
pub type DynHandlerRegistry = Arc<HandlerRegistry>;

/// Explicit map from exposed type name to the resolver class serving
/// its field resolvers.
///
/// Passed into the type builder at construction and treated as
/// read-only thereafter.
#[derive(Default)]
pub struct TypeResolvers {
    map: HashMap<String, ResolverBinding>,
}

impl TypeResolvers {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds an exposed type name to a resolver class.
    pub fn bind<T: 'static>(&mut self, type_name: impl Into<String>) {
        self.map.insert(type_name.into(), ResolverBinding::of::<T>());
    }

    /// Binds an exposed type name to an existing binding.
    pub fn bind_to(&mut self, type_name: impl Into<String>, binding: ResolverBinding) {
        self.map.insert(type_name.into(), binding);
    }

    /// The binding serving the given exposed type, if any.
    pub fn get(&self, type_name: &str) -> Option<&ResolverBinding> {
        self.map.get(type_name)
    }
}
