//! Schema-level directives.
//!
//! Directives are rewrite passes over assembled field specifications.
//! They run strictly after all type and field construction, in
//! registration order, each pass seeing the output of the previous
//! one. A pass may change anything on a field spec, including
//! replacing or wrapping its resolve function.

use std::sync::Arc;

use async_graphql::Value;
use async_graphql::dynamic::TypeRef;

use crate::resolver::{ResolveFn, SubscribeFn};

/// Where a field lives in the schema graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLocation {
    /// A field on the Query root.
    Query,
    /// A field on the Mutation root.
    Mutation,
}

/// One declared argument of a field, before materialization.
pub struct ArgumentSpec {
    /// The argument name.
    pub name: String,
    /// The argument's schema type.
    pub ty: TypeRef,
    /// Declared default value, if any.
    pub default: Option<Value>,
}

/// One field of a root type, before materialization.
pub struct FieldSpec {
    /// The exposed field name.
    pub name: String,
    /// The field's schema type.
    pub ty: TypeRef,
    /// Field description.
    pub description: Option<String>,
    /// Deprecation reason, if deprecated.
    pub deprecation_reason: Option<String>,
    /// Declared arguments, in order.
    pub arguments: Vec<ArgumentSpec>,
    /// The resolve function.
    pub resolve: ResolveFn,
}

/// One subscription field, before materialization.
pub struct SubscriptionFieldSpec {
    /// The exposed field name.
    pub name: String,
    /// The per-item schema type.
    pub ty: TypeRef,
    /// Field description.
    pub description: Option<String>,
    /// Deprecation reason, if deprecated.
    pub deprecation_reason: Option<String>,
    /// Declared arguments, in order.
    pub arguments: Vec<ArgumentSpec>,
    /// The subscribe function.
    pub subscribe: SubscribeFn,
}

/// A schema-level directive: a named rewrite pass over matching
/// fields.
pub trait SchemaDirective: Send + Sync {
    /// The directive's name.
    fn name(&self) -> &str;

    /// Rewrites one root field. The default pass leaves it untouched.
    fn transform_field(&self, _location: FieldLocation, field: FieldSpec) -> FieldSpec {
        field
    }

    /// Rewrites one subscription field. The default pass leaves it
    /// untouched.
    fn transform_subscription(&self, field: SubscriptionFieldSpec) -> SubscriptionFieldSpec {
        field
    }
}

/// Shared handle to a schema directive.
pub type DynSchemaDirective = Arc<dyn SchemaDirective>;

/// Materializes an argument spec into an engine input value.
pub(crate) fn to_input_value(spec: &ArgumentSpec) -> async_graphql::dynamic::InputValue {
    let mut value = async_graphql::dynamic::InputValue::new(&spec.name, spec.ty.clone());
    if let Some(default) = &spec.default {
        value = value.default_value(default.clone());
    }
    value
}

#[cfg(test)]
mod tests {
    use async_graphql::dynamic::{FieldFuture, FieldValue, ResolverContext};

    use super::*;

    struct UppercaseNames;

    impl SchemaDirective for UppercaseNames {
        fn name(&self) -> &str {
            "uppercaseNames"
        }

        fn transform_field(&self, _location: FieldLocation, mut field: FieldSpec) -> FieldSpec {
            field.name = field.name.to_uppercase();
            field
        }
    }

    fn dummy_field(name: &str) -> FieldSpec {
        FieldSpec {
            name: name.to_string(),
            ty: TypeRef::named(TypeRef::STRING),
            description: None,
            deprecation_reason: None,
            arguments: Vec::new(),
            resolve: Arc::new(|_: ResolverContext<'_>| {
                FieldFuture::new(async { Ok(None::<FieldValue>) })
            }),
        }
    }

    #[test]
    fn passes_rewrite_field_specs() {
        let directive = UppercaseNames;
        let rewritten = directive.transform_field(FieldLocation::Query, dummy_field("user"));
        assert_eq!(rewritten.name, "USER");
        // Subscriptions are untouched by this directive's default pass.
        assert_eq!(directive.name(), "uppercaseNames");
    }
}
