//! Schema assembly.
//!
//! [`SchemaAssembler`] collects the handler sets of all registered
//! resolver bindings, materializes the types their signatures
//! reference, attaches a resolve function to every field, and
//! finishes the executable schema. Root types are conditional:
//! Mutation and Subscription only exist when at least one resolver
//! exposes such a handler, while Query is always present, populated
//! with a placeholder field when nothing else is exposed, since a
//! schema requires a non-empty query type.

use std::collections::HashSet;
use std::sync::Arc;

use async_graphql::dynamic::{
    Enum, Field, InputObject, Object, Scalar, Schema, Subscription, SubscriptionField, Union,
};
use async_graphql::indexmap::IndexMap;
use reflectql_reflect::TypeDescriptor;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::codec::{DynCodec, JsonCodec};
use crate::error::SchemaError;
use crate::handler::{FieldKind, HandlerEntry, HandlerSet};
use crate::registry::{DynHandlerRegistry, ResolverBinding, TypeResolvers};
use crate::resolver::{self, into_resolve_fn, into_subscribe_fn};
use crate::scalars;
use crate::schema::directives::{
    DynSchemaDirective, FieldLocation, FieldSpec, SubscriptionFieldSpec, to_input_value,
};
use crate::schema::types::{TypeBuilder, placeholder_field};

/// Assembly configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Maximum query depth allowed, if limited.
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Maximum query complexity allowed, if limited.
    #[serde(default)]
    pub max_complexity: Option<usize>,

    /// Whether introspection queries are enabled.
    /// Default: true
    #[serde(default = "default_introspection")]
    pub introspection: bool,
}

fn default_introspection() -> bool {
    true
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            max_complexity: None,
            introspection: true,
        }
    }
}

/// A partial schema produced by another subsystem, merged into the
/// assembled graph as a final step.
#[derive(Default)]
pub struct SchemaFragment {
    /// Object types to merge.
    pub objects: Vec<Object>,
    /// Input object types to merge.
    pub input_objects: Vec<InputObject>,
    /// Enum types to merge.
    pub enums: Vec<Enum>,
    /// Union types to merge.
    pub unions: Vec<Union>,
    /// Scalar types to merge.
    pub scalars: Vec<Scalar>,
}

impl SchemaFragment {
    /// Creates an empty fragment.
    pub fn new() -> Self {
        Self::default()
    }

    fn type_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        names.extend(self.objects.iter().map(|t| t.type_name().to_string()));
        names.extend(self.input_objects.iter().map(|t| t.type_name().to_string()));
        names.extend(self.enums.iter().map(|t| t.type_name().to_string()));
        names.extend(self.unions.iter().map(|t| t.type_name().to_string()));
        names.extend(self.scalars.iter().map(|t| t.type_name().to_string()));
        names
    }
}

/// Assembles the executable schema graph.
pub struct SchemaAssembler {
    handlers: DynHandlerRegistry,
    bindings: Vec<ResolverBinding>,
    type_resolvers: Arc<TypeResolvers>,
    codec: DynCodec,
    output_types: Vec<TypeDescriptor>,
    input_types: Vec<TypeDescriptor>,
    directives: Vec<DynSchemaDirective>,
    fragments: Vec<SchemaFragment>,
    config: SchemaConfig,
}

impl SchemaAssembler {
    /// Creates an assembler over a populated handler registry.
    #[must_use]
    pub fn new(handlers: DynHandlerRegistry) -> Self {
        Self {
            handlers,
            bindings: Vec::new(),
            type_resolvers: Arc::new(TypeResolvers::new()),
            codec: Arc::new(JsonCodec::new()),
            output_types: Vec::new(),
            input_types: Vec::new(),
            directives: Vec::new(),
            fragments: Vec::new(),
            config: SchemaConfig::default(),
        }
    }

    /// Replaces the value codec.
    #[must_use]
    pub fn with_codec(mut self, codec: DynCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Sets the exposed-type-name → resolver map used for
    /// field-resolver splicing.
    #[must_use]
    pub fn with_type_resolvers(mut self, resolvers: TypeResolvers) -> Self {
        self.type_resolvers = Arc::new(resolvers);
        self
    }

    /// Sets the assembly configuration.
    #[must_use]
    pub fn with_config(mut self, config: SchemaConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a resolver class to the schema.
    #[must_use]
    pub fn add_resolver(mut self, binding: ResolverBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Adds an extra named output type not reachable from any handler
    /// signature.
    #[must_use]
    pub fn add_output_type(mut self, ty: TypeDescriptor) -> Self {
        self.output_types.push(ty);
        self
    }

    /// Adds an extra named input type not reachable from any handler
    /// signature.
    #[must_use]
    pub fn add_input_type(mut self, ty: TypeDescriptor) -> Self {
        self.input_types.push(ty);
        self
    }

    /// Registers a schema-level directive. Passes run in registration
    /// order.
    #[must_use]
    pub fn add_directive(mut self, directive: DynSchemaDirective) -> Self {
        self.directives.push(directive);
        self
    }

    /// Merges an externally supplied partial schema as a final step.
    #[must_use]
    pub fn merge_fragment(mut self, fragment: SchemaFragment) -> Self {
        self.fragments.push(fragment);
        self
    }

    /// Assembles the schema.
    ///
    /// # Errors
    ///
    /// Any [`SchemaError`] aborts the whole assembly; no partially
    /// valid graph is ever produced.
    pub fn assemble(self) -> Result<Schema, SchemaError> {
        debug!(resolver_count = self.bindings.len(), "starting schema assembly");

        let mut types = TypeBuilder::new(
            self.handlers.clone(),
            self.type_resolvers.clone(),
            self.codec.clone(),
        );

        for ty in &self.output_types {
            types.create_named_output_type(ty)?;
        }
        for ty in &self.input_types {
            types.create_named_input_type(ty)?;
        }

        let mut query_fields: IndexMap<String, FieldSpec> = IndexMap::new();
        let mut mutation_fields: IndexMap<String, FieldSpec> = IndexMap::new();
        let mut subscription_fields: IndexMap<String, SubscriptionFieldSpec> = IndexMap::new();

        for binding in &self.bindings {
            let set = self.handlers.lookup(binding).ok_or_else(|| {
                SchemaError::MissingHandlerSet(binding.class_name().to_string())
            })?;

            for entry in &set.queries {
                let spec = self.field_spec(&mut types, binding, set, entry, FieldKind::Query)?;
                insert_root_field(&mut query_fields, "Query", spec)?;
            }
            for entry in &set.mutations {
                let spec =
                    self.field_spec(&mut types, binding, set, entry, FieldKind::Mutation)?;
                insert_root_field(&mut mutation_fields, "Mutation", spec)?;
            }
            for entry in &set.subscriptions {
                let spec = self.subscription_spec(&mut types, binding, set, entry)?;
                if subscription_fields.contains_key(&spec.name) {
                    return Err(SchemaError::DuplicateRootField {
                        root: "Subscription",
                        name: spec.name,
                    });
                }
                subscription_fields.insert(spec.name.clone(), spec);
            }
        }

        // Directive passes run after all type and field construction,
        // each seeing the previous pass's output.
        for directive in &self.directives {
            debug!(directive = directive.name(), "applying directive pass");
            query_fields = query_fields
                .into_values()
                .map(|field| directive.transform_field(FieldLocation::Query, field))
                .map(|field| (field.name.clone(), field))
                .collect();
            mutation_fields = mutation_fields
                .into_values()
                .map(|field| directive.transform_field(FieldLocation::Mutation, field))
                .map(|field| (field.name.clone(), field))
                .collect();
            subscription_fields = subscription_fields
                .into_values()
                .map(|field| directive.transform_subscription(field))
                .map(|field| (field.name.clone(), field))
                .collect();
        }

        let has_mutations = !mutation_fields.is_empty();
        let has_subscriptions = !subscription_fields.is_empty();

        let mut builder = Schema::build(
            "Query",
            has_mutations.then_some("Mutation"),
            has_subscriptions.then_some("Subscription"),
        );

        builder = scalars::register_scalars(builder);

        let mut registry = types.into_registry();

        let mut fragment_names = HashSet::new();
        for fragment in &self.fragments {
            for name in fragment.type_names() {
                if registry.contains(&name) || !fragment_names.insert(name.clone()) {
                    return Err(SchemaError::DuplicateFragmentType(name));
                }
            }
        }

        let (objects, input_objects, enums, unions) = registry.take_types();
        for object in objects {
            builder = builder.register(object);
        }
        for input_object in input_objects {
            builder = builder.register(input_object);
        }
        for schema_enum in enums {
            builder = builder.register(schema_enum);
        }
        for union in unions {
            builder = builder.register(union);
        }

        let mut query = Object::new("Query").description("Root query type");
        if query_fields.is_empty() {
            trace!("no queries exposed, adding placeholder field");
            query = query.field(placeholder_field());
        } else {
            for spec in query_fields.into_values() {
                query = query.field(materialize_field(spec));
            }
        }
        builder = builder.register(query);

        if has_mutations {
            let mut mutation = Object::new("Mutation").description("Root mutation type");
            for spec in mutation_fields.into_values() {
                mutation = mutation.field(materialize_field(spec));
            }
            builder = builder.register(mutation);
        }

        if has_subscriptions {
            let mut subscription = Subscription::new("Subscription");
            for spec in subscription_fields.into_values() {
                subscription = subscription.field(materialize_subscription_field(spec));
            }
            builder = builder.register(subscription);
        }

        for fragment in self.fragments {
            for object in fragment.objects {
                builder = builder.register(object);
            }
            for input_object in fragment.input_objects {
                builder = builder.register(input_object);
            }
            for schema_enum in fragment.enums {
                builder = builder.register(schema_enum);
            }
            for union in fragment.unions {
                builder = builder.register(union);
            }
            for scalar in fragment.scalars {
                builder = builder.register(scalar);
            }
        }

        if let Some(depth) = self.config.max_depth {
            builder = builder.limit_depth(depth);
        }
        if let Some(complexity) = self.config.max_complexity {
            builder = builder.limit_complexity(complexity);
        }
        if !self.config.introspection {
            builder = builder.disable_introspection();
        }

        let schema = builder
            .finish()
            .map_err(|e| SchemaError::Finish(e.to_string()))?;

        debug!("schema assembly complete");
        Ok(schema)
    }

    fn field_spec(
        &self,
        types: &mut TypeBuilder,
        binding: &ResolverBinding,
        set: &HandlerSet,
        entry: &HandlerEntry,
        kind: FieldKind,
    ) -> Result<FieldSpec, SchemaError> {
        trace!(
            field = %entry.exposed_name,
            class = binding.class_name(),
            kind = kind.as_str(),
            "binding root field"
        );
        let prepared = resolver::prepare(binding, entry, &set.middleware, kind, self.codec.clone())?;
        let arguments = types.create_argument_specs(&prepared.argument_parameters())?;
        let ty = types.create_return_type_ref(&prepared)?;
        Ok(FieldSpec {
            name: entry.exposed_name.clone(),
            ty,
            description: entry.description.clone(),
            deprecation_reason: entry.deprecation_reason.clone(),
            arguments,
            resolve: into_resolve_fn(prepared),
        })
    }

    fn subscription_spec(
        &self,
        types: &mut TypeBuilder,
        binding: &ResolverBinding,
        set: &HandlerSet,
        entry: &HandlerEntry,
    ) -> Result<SubscriptionFieldSpec, SchemaError> {
        trace!(
            field = %entry.exposed_name,
            class = binding.class_name(),
            "binding subscription field"
        );
        let prepared = resolver::prepare(
            binding,
            entry,
            &set.middleware,
            FieldKind::Subscription,
            self.codec.clone(),
        )?;
        let arguments = types.create_argument_specs(&prepared.argument_parameters())?;
        let ty = types.create_return_type_ref(&prepared)?;
        Ok(SubscriptionFieldSpec {
            name: entry.exposed_name.clone(),
            ty,
            description: entry.description.clone(),
            deprecation_reason: entry.deprecation_reason.clone(),
            arguments,
            subscribe: into_subscribe_fn(prepared),
        })
    }
}

fn insert_root_field(
    fields: &mut IndexMap<String, FieldSpec>,
    root: &'static str,
    spec: FieldSpec,
) -> Result<(), SchemaError> {
    if fields.contains_key(&spec.name) {
        return Err(SchemaError::DuplicateRootField {
            root,
            name: spec.name,
        });
    }
    fields.insert(spec.name.clone(), spec);
    Ok(())
}

fn materialize_field(spec: FieldSpec) -> Field {
    let resolve = spec.resolve;
    let mut field = Field::new(spec.name, spec.ty, move |ctx| (*resolve)(ctx));
    for argument in &spec.arguments {
        field = field.argument(to_input_value(argument));
    }
    if let Some(description) = spec.description {
        field = field.description(description);
    }
    if let Some(reason) = &spec.deprecation_reason {
        field = field.deprecation(Some(reason.as_str()));
    }
    field
}

fn materialize_subscription_field(spec: SubscriptionFieldSpec) -> SubscriptionField {
    let subscribe = spec.subscribe;
    let mut field = SubscriptionField::new(spec.name, spec.ty, move |ctx| (*subscribe)(ctx));
    for argument in &spec.arguments {
        field = field.argument(to_input_value(argument));
    }
    if let Some(description) = spec.description {
        field = field.description(description);
    }
    field
}
