//! Type graph construction.
//!
//! [`TypeBuilder`] converts reflected type descriptors into dynamic
//! schema types. Named kinds (objects, input objects, enums, unions)
//! are registered exactly once in the [`TypeRegistry`], keyed by name;
//! list and non-null wrappers are structural and built fresh at each
//! wrap site. A type's name is registered strictly before its fields
//! are computed, so self-referential and mutually referential shapes
//! terminate: a recursive lookup during field construction observes
//! the registration and returns the name without re-entering field
//! construction.

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::Value;
use async_graphql::dynamic::{
    Enum, EnumItem, Field, FieldFuture, InputObject, InputValue, Object, TypeRef, Union,
};
use async_graphql::indexmap::IndexMap;
use reflectql_reflect::{
    EnumDescriptor, ParameterDescriptor, PropertyDescriptor, TypeDescriptor,
    UNRESOLVED_NAME_PREFIX, sanitize_type_name,
};
use tracing::trace;

use crate::codec::DynCodec;
use crate::error::SchemaError;
use crate::handler::FieldKind;
use crate::registry::{DynHandlerRegistry, TypeResolvers};
use crate::resolver::{
    self, PreparedResolver, into_resolve_fn, property_resolve_fn, union_member_shapes,
};
use crate::scalars;
use crate::schema::directives::ArgumentSpec;

/// Registry of materialized named types.
///
/// Write-once-per-name during a build; read-only afterwards. A name's
/// fingerprint is recorded before its fields are computed, which is
/// what breaks cycles: a recursive build of the same name observes the
/// claim and stops.
#[derive(Default)]
pub struct TypeRegistry {
    objects: IndexMap<String, Object>,
    input_objects: IndexMap<String, InputObject>,
    enums: IndexMap<String, Enum>,
    unions: IndexMap<String, Union>,
    fingerprints: HashMap<String, Vec<String>>,
    enum_identities: HashMap<usize, String>,
}

impl TypeRegistry {
    /// Whether any kind registered the given schema name.
    pub fn contains(&self, name: &str) -> bool {
        ["object", "input", "enum", "union"]
            .iter()
            .any(|kind| self.fingerprints.contains_key(&format!("{kind}:{name}")))
    }

    /// Number of registered object types.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Drains all registered types for schema registration.
    pub(crate) fn take_types(
        &mut self,
    ) -> (
        Vec<Object>,
        Vec<InputObject>,
        Vec<Enum>,
        Vec<Union>,
    ) {
        (
            std::mem::take(&mut self.objects).into_values().collect(),
            std::mem::take(&mut self.input_objects).into_values().collect(),
            std::mem::take(&mut self.enums).into_values().collect(),
            std::mem::take(&mut self.unions).into_values().collect(),
        )
    }

    fn claim(
        &mut self,
        key: String,
        fingerprint: Vec<String>,
        name: &str,
    ) -> Result<bool, SchemaError> {
        if let Some(existing) = self.fingerprints.get(&key) {
            if *existing != fingerprint {
                return Err(SchemaError::DuplicateTypeName(name.to_string()));
            }
            // Already built, or currently building (a cycle); the
            // registered name stands in either way.
            return Ok(false);
        }
        self.fingerprints.insert(key, fingerprint);
        Ok(true)
    }
}

/// Builds schema types from reflected descriptors.
pub struct TypeBuilder {
    registry: TypeRegistry,
    handlers: DynHandlerRegistry,
    resolvers: Arc<TypeResolvers>,
    codec: DynCodec,
}

impl TypeBuilder {
    /// Creates a builder over the given registries.
    ///
    /// `resolvers` is the explicit exposed-type-name → resolver map;
    /// it is only read, never written.
    pub fn new(
        handlers: DynHandlerRegistry,
        resolvers: Arc<TypeResolvers>,
        codec: DynCodec,
    ) -> Self {
        Self {
            registry: TypeRegistry::default(),
            handlers,
            resolvers,
            codec,
        }
    }

    /// The accumulated registry.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Consumes the builder, returning the accumulated registry.
    pub(crate) fn into_registry(self) -> TypeRegistry {
        self.registry
    }

    /// Builds the output type of a descriptor, registering any named
    /// types it references.
    pub fn create_output_type(&mut self, ty: &TypeDescriptor) -> Result<TypeRef, SchemaError> {
        match ty {
            TypeDescriptor::Union(members) => {
                let remaining = TypeDescriptor::non_null_members(members);
                if remaining.len() == 1 {
                    return self.create_output_type(remaining[0]);
                }
                Ok(TypeRef::named(self.create_union(&remaining)?))
            }
            TypeDescriptor::Property(property) => self.create_output_type(&property.ty),
            TypeDescriptor::Lazy(lazy) => {
                let resolved = lazy.resolve();
                self.create_output_type(&resolved)
            }
            TypeDescriptor::Object(object) => Ok(TypeRef::named(
                self.create_output_object(object.type_name.as_deref(), &object.properties)?,
            )),
            TypeDescriptor::Class(class) => match scalars::scalar_for_class(class) {
                Ok(def) => Ok(TypeRef::named(def.name)),
                Err(SchemaError::UnsupportedHostClass(_)) => Ok(TypeRef::named(
                    self.create_output_object(
                        class.type_name.as_deref().or(Some(class.class_name.as_str())),
                        &class.properties,
                    )?,
                )),
                Err(other) => Err(other),
            },
            TypeDescriptor::Array(element) => Ok(TypeRef::List(Box::new(
                self.create_output_type(element)?,
            ))),
            TypeDescriptor::Enum(descriptor) => {
                Ok(TypeRef::named(self.create_enum(descriptor)?))
            }
            other => Ok(TypeRef::named(scalars::scalar_for(other)?.name)),
        }
    }

    /// Builds the input type of a descriptor.
    ///
    /// Inputs are pure data: no field-resolver overrides, and unions
    /// only in their degraded nullable form.
    pub fn create_input_type(&mut self, ty: &TypeDescriptor) -> Result<TypeRef, SchemaError> {
        match ty {
            TypeDescriptor::Property(property) => self.create_input_type(&property.ty),
            TypeDescriptor::Lazy(lazy) => {
                let resolved = lazy.resolve();
                self.create_input_type(&resolved)
            }
            TypeDescriptor::Object(object) => Ok(TypeRef::named(
                self.create_input_object(object.type_name.as_deref(), &object.properties)?,
            )),
            TypeDescriptor::Class(class) => match scalars::scalar_for_class(class) {
                Ok(def) => Ok(TypeRef::named(def.name)),
                Err(SchemaError::UnsupportedHostClass(_)) => Ok(TypeRef::named(
                    self.create_input_object(
                        class.type_name.as_deref().or(Some(class.class_name.as_str())),
                        &class.properties,
                    )?,
                )),
                Err(other) => Err(other),
            },
            TypeDescriptor::Array(element) => Ok(TypeRef::List(Box::new(
                self.create_input_type(element)?,
            ))),
            TypeDescriptor::Enum(descriptor) => {
                Ok(TypeRef::named(self.create_enum(descriptor)?))
            }
            TypeDescriptor::Union(members) => {
                let remaining = TypeDescriptor::non_null_members(members);
                if remaining.len() == 1 {
                    return self.create_input_type(remaining[0]);
                }
                Err(SchemaError::UnsupportedScalarKind("union"))
            }
            other => Ok(TypeRef::named(scalars::scalar_for(other)?.name)),
        }
    }

    /// Builds a descriptor that must resolve to a named output type
    /// and returns its name.
    pub fn create_named_output_type(&mut self, ty: &TypeDescriptor) -> Result<String, SchemaError> {
        match ty {
            TypeDescriptor::Array(_) => Err(SchemaError::NamedTypeRequired("array")),
            TypeDescriptor::Union(members) => {
                let remaining = TypeDescriptor::non_null_members(members);
                if remaining.len() == 1 {
                    return self.create_named_output_type(remaining[0]);
                }
                self.create_union(&remaining)
            }
            TypeDescriptor::Property(property) => self.create_named_output_type(&property.ty),
            TypeDescriptor::Lazy(lazy) => {
                let resolved = lazy.resolve();
                self.create_named_output_type(&resolved)
            }
            TypeDescriptor::Object(object) => {
                self.create_output_object(object.type_name.as_deref(), &object.properties)
            }
            TypeDescriptor::Class(class) => match scalars::scalar_for_class(class) {
                Ok(def) => Ok(def.name.to_string()),
                Err(SchemaError::UnsupportedHostClass(_)) => self.create_output_object(
                    class.type_name.as_deref().or(Some(class.class_name.as_str())),
                    &class.properties,
                ),
                Err(other) => Err(other),
            },
            TypeDescriptor::Enum(descriptor) => self.create_enum(descriptor),
            other => Ok(scalars::scalar_for(other)?.name.to_string()),
        }
    }

    /// Builds a descriptor that must resolve to a named input type and
    /// returns its name.
    pub fn create_named_input_type(&mut self, ty: &TypeDescriptor) -> Result<String, SchemaError> {
        match ty {
            TypeDescriptor::Array(_) => Err(SchemaError::NamedTypeRequired("array")),
            TypeDescriptor::Property(property) => self.create_named_input_type(&property.ty),
            TypeDescriptor::Lazy(lazy) => {
                let resolved = lazy.resolve();
                self.create_named_input_type(&resolved)
            }
            TypeDescriptor::Object(object) => {
                self.create_input_object(object.type_name.as_deref(), &object.properties)
            }
            TypeDescriptor::Class(class) => match scalars::scalar_for_class(class) {
                Ok(def) => Ok(def.name.to_string()),
                Err(SchemaError::UnsupportedHostClass(_)) => self.create_input_object(
                    class.type_name.as_deref().or(Some(class.class_name.as_str())),
                    &class.properties,
                ),
                Err(other) => Err(other),
            },
            TypeDescriptor::Enum(descriptor) => self.create_enum(descriptor),
            other => Ok(scalars::scalar_for(other)?.name.to_string()),
        }
    }

    /// Builds argument specs for the visible parameters of a handler.
    pub(crate) fn create_argument_specs(
        &mut self,
        parameters: &[&ParameterDescriptor],
    ) -> Result<Vec<ArgumentSpec>, SchemaError> {
        parameters
            .iter()
            .map(|parameter| {
                let ty = self.create_input_type(&parameter.ty)?;
                let ty = if parameter.optional || parameter.ty.is_nullable() {
                    ty
                } else {
                    TypeRef::NonNull(Box::new(ty))
                };
                Ok(ArgumentSpec {
                    name: parameter.name.clone(),
                    ty,
                    default: parameter
                        .default_value
                        .clone()
                        .map(resolver::json_to_graphql_value),
                })
            })
            .collect()
    }

    /// Builds the schema type of a prepared resolver's result,
    /// wrapping in non-null unless the declared return is nullable.
    pub(crate) fn create_return_type_ref(
        &mut self,
        prepared: &PreparedResolver,
    ) -> Result<TypeRef, SchemaError> {
        let inner = self.create_output_type(prepared.result_type())?;
        Ok(if prepared.result_nullable() {
            inner
        } else {
            TypeRef::NonNull(Box::new(inner))
        })
    }

    fn create_output_object(
        &mut self,
        raw_name: Option<&str>,
        properties: &[PropertyDescriptor],
    ) -> Result<String, SchemaError> {
        let name = require_type_name(raw_name)?;
        let key = format!("object:{name}");
        let fingerprint = property_fingerprint(properties);
        if !self.registry.claim(key, fingerprint, &name)? {
            return Ok(name);
        }

        trace!(type_name = %name, "building output object type");

        let binding = self.resolvers.get(&name).cloned();
        if let Some(binding) = &binding {
            let set = self
                .handlers
                .lookup(binding)
                .ok_or_else(|| SchemaError::MissingHandlerSet(binding.class_name().to_string()))?;
            // Every field resolver must target a declared property.
            for entry in &set.field_resolvers {
                let matched = properties
                    .iter()
                    .any(|p| !p.excluded && p.name == entry.exposed_name);
                if !matched {
                    return Err(SchemaError::UnknownResolverField {
                        type_name: name.clone(),
                        field: entry.exposed_name.clone(),
                        class: binding.class_name().to_string(),
                    });
                }
            }
        }

        let mut object = Object::new(&name);
        let mut has_fields = false;
        for property in properties.iter().filter(|p| !p.excluded) {
            let field = self.create_output_field(binding.as_ref(), property)?;
            object = object.field(field);
            has_fields = true;
        }
        if !has_fields {
            object = object.field(placeholder_field());
        }

        self.registry.objects.insert(name.clone(), object);
        Ok(name)
    }

    fn create_output_field(
        &mut self,
        binding: Option<&crate::registry::ResolverBinding>,
        property: &PropertyDescriptor,
    ) -> Result<Field, SchemaError> {
        let type_ref = self.create_output_type(&property.ty)?;
        let type_ref = if property.optional || property.ty.is_nullable() {
            type_ref
        } else {
            TypeRef::NonNull(Box::new(type_ref))
        };

        let mut field = if let Some((prepared, arguments)) =
            self.field_resolver_override(binding, &property.name)?
        {
            let resolve = into_resolve_fn(prepared);
            let mut field = Field::new(&property.name, type_ref, move |ctx| (*resolve)(ctx));
            for argument in &arguments {
                field = field.argument(super::directives::to_input_value(argument));
            }
            field
        } else {
            let shapes = union_member_shapes(property.ty.unwrap_property());
            let resolve = property_resolve_fn(property.name.clone(), shapes);
            Field::new(&property.name, type_ref, move |ctx| (*resolve)(ctx))
        };

        if let Some(description) = &property.description {
            field = field.description(description);
        }
        if let Some(reason) = &property.deprecation_reason {
            field = field.deprecation(Some(reason.as_str()));
        }
        Ok(field)
    }

    /// Resolves a field-resolver override for a property, if the
    /// owning type's resolver declares one.
    fn field_resolver_override(
        &mut self,
        binding: Option<&crate::registry::ResolverBinding>,
        property: &str,
    ) -> Result<Option<(Arc<PreparedResolver>, Vec<ArgumentSpec>)>, SchemaError> {
        let Some(binding) = binding else {
            return Ok(None);
        };
        let handlers = self.handlers.clone();
        let set = handlers
            .lookup(binding)
            .ok_or_else(|| SchemaError::MissingHandlerSet(binding.class_name().to_string()))?;
        let Some(entry) = set.field_resolver_for(property) else {
            return Ok(None);
        };

        trace!(property = %property, class = binding.class_name(), "splicing field resolver");
        let prepared = resolver::prepare(
            binding,
            entry,
            &set.middleware,
            FieldKind::FieldResolver,
            self.codec.clone(),
        )?;
        let arguments = self.create_argument_specs(&prepared.argument_parameters())?;
        Ok(Some((prepared, arguments)))
    }

    fn create_input_object(
        &mut self,
        raw_name: Option<&str>,
        properties: &[PropertyDescriptor],
    ) -> Result<String, SchemaError> {
        let name = require_type_name(raw_name)?;
        let key = format!("input:{name}");
        let fingerprint = property_fingerprint(properties);
        if !self.registry.claim(key, fingerprint, &name)? {
            return Ok(name);
        }

        trace!(type_name = %name, "building input object type");

        let mut input_object = InputObject::new(&name);
        for property in properties.iter().filter(|p| !p.excluded) {
            let ty = self.create_input_type(&property.ty)?;
            let ty = if property.optional || property.ty.is_nullable() {
                ty
            } else {
                TypeRef::NonNull(Box::new(ty))
            };
            let mut value = InputValue::new(&property.name, ty);
            if let Some(description) = &property.description {
                value = value.description(description);
            }
            input_object = input_object.field(value);
        }

        self.registry.input_objects.insert(name.clone(), input_object);
        Ok(name)
    }

    fn create_enum(&mut self, descriptor: &Arc<EnumDescriptor>) -> Result<String, SchemaError> {
        let identity = Arc::as_ptr(descriptor) as usize;
        if let Some(name) = self.registry.enum_identities.get(&identity) {
            return Ok(name.clone());
        }

        let name = require_type_name(descriptor.type_name.as_deref())?;
        let key = format!("enum:{name}");
        let fingerprint: Vec<String> =
            descriptor.members.iter().map(|m| m.name.clone()).collect();
        if !self.registry.claim(key, fingerprint, &name)? {
            self.registry.enum_identities.insert(identity, name.clone());
            return Ok(name);
        }

        trace!(type_name = %name, "building enum type");

        let mut schema_enum = Enum::new(&name);
        for member in &descriptor.members {
            schema_enum = schema_enum.item(EnumItem::new(&member.name));
        }

        self.registry.enums.insert(name.clone(), schema_enum);
        self.registry.enum_identities.insert(identity, name.clone());
        Ok(name)
    }

    fn create_union(&mut self, members: &[&TypeDescriptor]) -> Result<String, SchemaError> {
        let mut member_names = Vec::with_capacity(members.len());
        for member in members {
            let resolved;
            let member = match member {
                TypeDescriptor::Lazy(lazy) => {
                    resolved = lazy.resolve();
                    &resolved
                }
                other => *other,
            };
            let member_name = match member {
                TypeDescriptor::Object(object) => {
                    self.create_output_object(object.type_name.as_deref(), &object.properties)?
                }
                TypeDescriptor::Class(class) => {
                    if scalars::scalar_for_class(class).is_ok() {
                        return Err(SchemaError::InvalidUnionMember);
                    }
                    self.create_output_object(
                        class.type_name.as_deref().or(Some(class.class_name.as_str())),
                        &class.properties,
                    )?
                }
                _ => return Err(SchemaError::InvalidUnionMember),
            };
            member_names.push(member_name);
        }
        if member_names.is_empty() {
            return Err(SchemaError::InvalidUnionMember);
        }

        let name = member_names.concat();
        let key = format!("union:{name}");
        if !self.registry.claim(key, member_names.clone(), &name)? {
            return Ok(name);
        }

        trace!(type_name = %name, "building union type");

        let mut union = Union::new(&name);
        for member_name in &member_names {
            union = union.possible_type(member_name);
        }

        self.registry.unions.insert(name.clone(), union);
        Ok(name)
    }
}

/// Resolves and sanitizes a required type name.
fn require_type_name(raw: Option<&str>) -> Result<String, SchemaError> {
    let raw = raw.ok_or(SchemaError::TypeNameRequired)?;
    if raw.starts_with(UNRESOLVED_NAME_PREFIX) {
        return Err(SchemaError::UnknownTypeName(raw.to_string()));
    }
    let name = sanitize_type_name(raw);
    if name.is_empty() {
        return Err(SchemaError::TypeNameRequired);
    }
    Ok(name)
}

fn property_fingerprint(properties: &[PropertyDescriptor]) -> Vec<String> {
    properties
        .iter()
        .filter(|p| !p.excluded)
        .map(|p| p.name.clone())
        .collect()
}

/// The field every otherwise-empty object type receives so the schema
/// stays structurally valid.
pub(crate) fn placeholder_field() -> Field {
    Field::new("_placeholder", TypeRef::named(TypeRef::STRING), |_| {
        FieldFuture::new(async { Ok(None::<Value>) })
    })
    .description("Placeholder field - type has no exposed properties")
}
