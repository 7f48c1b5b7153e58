//! Error types for schema compilation and field resolution.
//!
//! Two distinct failure planes exist. [`SchemaError`] covers schema
//! construction: every variant is a programmer error, fatal to the
//! whole assembly, and surfaces before any request is served.
//! [`FieldError`] covers a single field resolution at request time and
//! is scoped to that field's result path; sibling fields are
//! unaffected.

/// Fatal schema-construction errors. Assembly aborts on the first one
/// rather than producing a partially valid graph.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A type that must become a named schema type has no name.
    #[error("type requires a name")]
    TypeNameRequired,

    /// A type name is an unresolved generic placeholder.
    #[error("unknown type name '{0}'")]
    UnknownTypeName(String),

    /// Two different shapes resolved to the same schema type name.
    #[error("type name '{0}' is already registered with a different shape")]
    DuplicateTypeName(String),

    /// A named type was required but the descriptor resolves to an
    /// anonymous wrapper such as an array.
    #[error("a {0} cannot be used where a named type is required")]
    NamedTypeRequired(&'static str),

    /// A `number` descriptor carried no brand.
    #[error("type \"number\" requires a numeric brand (float, integer, or a fixed-width variant)")]
    MissingNumberBrand,

    /// A host class was passed where a scalar was expected and is not
    /// one of the recognized value classes.
    #[error("class {0} is not a supported scalar type")]
    UnsupportedHostClass(String),

    /// A descriptor kind that can never map to a scalar was passed to
    /// the scalar registry.
    #[error("kind {0} is not a supported scalar type")]
    UnsupportedScalarKind(&'static str),

    /// A union member is not an object or class shape.
    #[error("only object and class shapes are supported as union members")]
    InvalidUnionMember,

    /// A subscription handler declared a return type that is not one
    /// of the adaptable asynchronous shapes.
    #[error(
        "the return type of '{method}' on '{class}' must be an async generator, async iterable, \
         observable, or event channel"
    )]
    InvalidSubscriptionType {
        /// The resolver class name.
        class: String,
        /// The offending method name.
        method: String,
    },

    /// A resolver class was referenced without a registered handler
    /// set.
    #[error("no handler set registered for resolver class '{0}'")]
    MissingHandlerSet(String),

    /// A field resolver entry references a property the exposed type
    /// does not declare.
    #[error("no property '{field}' on type '{type_name}' for field resolver on '{class}'")]
    UnknownResolverField {
        /// The exposed type name.
        type_name: String,
        /// The missing property.
        field: String,
        /// The resolver class name.
        class: String,
    },

    /// Two resolver classes exposed the same field name on one root
    /// type.
    #[error("duplicate {root} field '{name}' exposed by more than one resolver")]
    DuplicateRootField {
        /// Which root type collided.
        root: &'static str,
        /// The colliding field name.
        name: String,
    },

    /// An externally supplied schema fragment redefines a named type.
    #[error("schema fragment redefines type '{0}'")]
    DuplicateFragmentType(String),

    /// The underlying schema engine rejected the finished graph.
    #[error("failed to finalize schema: {0}")]
    Finish(String),
}

/// Per-call field resolution errors, scoped to one field.
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    /// Argument validation failed. The handler was never invoked.
    #[error("{0}")]
    InvalidArguments(String),

    /// A middleware aborted the chain.
    #[error("{0}")]
    Middleware(String),

    /// The handler itself failed.
    #[error("{0}")]
    Handler(String),

    /// The injector could not produce an instance for the resolver
    /// class.
    #[error("no instance registered for resolver class '{0}'")]
    UnresolvedInstance(String),

    /// A subscription handler settled to a value that matches none of
    /// the adaptable asynchronous shapes.
    #[error("'{method}' on '{class}' returned an invalid subscription result")]
    InvalidSubscriptionResult {
        /// The resolver class name.
        class: String,
        /// The offending method name.
        method: String,
    },

    /// Value serialization or coercion failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The execution context was not attached to the request.
    #[error("execution context not available")]
    MissingContext,
}

impl From<FieldError> for async_graphql::Error {
    fn from(err: FieldError) -> Self {
        async_graphql::Error::new(err.to_string())
    }
}

/// A value codec failure.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CodecError(pub String);
