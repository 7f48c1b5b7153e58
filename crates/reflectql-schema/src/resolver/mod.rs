//! Resolver function factory.
//!
//! [`prepare`] does the construction-time work for one exposed field:
//! it partitions the method's parameters into parent/context/argument
//! positions, builds the synthetic argument type the codec consumes,
//! and checks subscription return declarations. The resulting
//! [`PreparedResolver`] executes the per-call contract in strict
//! order: coerce arguments, validate, run the middleware chain,
//! resolve the instance, splice the call, invoke the handler, and
//! serialize (or normalize) the result.

use std::sync::Arc;

use async_graphql::dynamic::{
    FieldFuture, FieldValue, ResolverContext, SubscriptionFieldFuture, ValueAccessor,
};
use async_graphql::Value;
use futures_util::stream::BoxStream;
use reflectql_reflect::{
    ObjectDescriptor, ParameterDescriptor, ParameterRole, PropertyDescriptor, TypeDescriptor,
};
use tracing::trace;

use crate::codec::DynCodec;
use crate::context::ExecutionContext;
use crate::error::{FieldError, SchemaError};
use crate::handler::{CallSlot, FieldKind, HandlerCall, HandlerEntry, HandlerFn, HandlerReturn};
use crate::middleware::{DynMiddleware, run_chain};
use crate::registry::ResolverBinding;
use crate::subscriptions::{ItemSerializer, normalize};

/// A shareable resolve closure for object and root fields.
pub type ResolveFn =
    Arc<dyn for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync>;

/// A shareable subscribe closure for subscription fields.
pub type SubscribeFn =
    Arc<dyn for<'a> Fn(ResolverContext<'a>) -> SubscriptionFieldFuture<'a> + Send + Sync>;

/// Index of the parameter receiving the parent value, if declared.
pub(crate) fn parent_parameter_index(parameters: &[ParameterDescriptor]) -> Option<usize> {
    parameters
        .iter()
        .position(|p| p.role == ParameterRole::Parent)
}

/// Index of the parameter receiving the execution context, if
/// declared.
pub(crate) fn context_parameter_index(parameters: &[ParameterDescriptor]) -> Option<usize> {
    parameters
        .iter()
        .position(|p| p.role == ParameterRole::Context)
}

/// The parameters that become externally visible arguments: everything
/// except the parent and context positions.
pub(crate) fn argument_parameters(
    parameters: &[ParameterDescriptor],
) -> Vec<&ParameterDescriptor> {
    let parent = parent_parameter_index(parameters);
    let context = context_parameter_index(parameters);
    parameters
        .iter()
        .enumerate()
        .filter(|(index, _)| Some(*index) != parent && Some(*index) != context)
        .map(|(_, parameter)| parameter)
        .collect()
}

/// Shape summary of one union member, used to resolve the concrete
/// member of a value at runtime.
#[derive(Debug, Clone)]
pub(crate) struct UnionMemberShape {
    pub name: String,
    pub required: Vec<String>,
}

fn object_shape(name: Option<&str>, properties: &[PropertyDescriptor]) -> Option<UnionMemberShape> {
    let name = name?;
    Some(UnionMemberShape {
        name: reflectql_reflect::sanitize_type_name(name),
        required: properties
            .iter()
            .filter(|p| !p.excluded && !p.optional && !p.ty.is_nullable())
            .map(|p| p.name.clone())
            .collect(),
    })
}

/// Member shapes of a multi-member output union, when every member is
/// a named object shape.
pub(crate) fn union_member_shapes(ty: &TypeDescriptor) -> Option<Arc<Vec<UnionMemberShape>>> {
    let TypeDescriptor::Union(members) = ty else {
        return None;
    };
    let remaining = TypeDescriptor::non_null_members(members);
    if remaining.len() < 2 {
        return None;
    }
    let shapes: Option<Vec<UnionMemberShape>> = remaining
        .iter()
        .map(|member| {
            let resolved;
            let member = match member {
                TypeDescriptor::Lazy(lazy) => {
                    resolved = lazy.resolve();
                    &resolved
                }
                other => *other,
            };
            match member {
                TypeDescriptor::Object(object) => {
                    object_shape(object.type_name.as_deref(), &object.properties)
                }
                TypeDescriptor::Class(class) => object_shape(
                    class.type_name.as_deref().or(Some(class.class_name.as_str())),
                    &class.properties,
                ),
                _ => None,
            }
        })
        .collect();
    shapes.map(Arc::new)
}

fn keys_of_json(value: &serde_json::Value) -> Option<Vec<&str>> {
    value
        .as_object()
        .map(|map| map.keys().map(String::as_str).collect())
}

fn keys_of_graphql(value: &Value) -> Option<Vec<&str>> {
    match value {
        Value::Object(map) => Some(map.keys().map(|k| k.as_str()).collect()),
        _ => None,
    }
}

fn pick_member<'a>(keys: &[&str], shapes: &'a [UnionMemberShape]) -> Option<&'a str> {
    shapes
        .iter()
        .find(|shape| shape.required.iter().all(|p| keys.contains(&p.as_str())))
        .map(|shape| shape.name.as_str())
}

/// Resolves the concrete union member of a handler-produced value.
pub(crate) fn pick_member_json(
    value: &serde_json::Value,
    shapes: &[UnionMemberShape],
) -> Option<String> {
    pick_member(&keys_of_json(value)?, shapes).map(str::to_string)
}

/// Resolves the concrete union member of an engine value.
pub(crate) fn pick_member_graphql(value: &Value, shapes: &[UnionMemberShape]) -> Option<String> {
    pick_member(&keys_of_graphql(value)?, shapes).map(str::to_string)
}

/// Converts a `serde_json::Value` to an engine value.
pub(crate) fn json_to_graphql_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else if let Some(f) = n.as_f64() {
                Value::Number(
                    async_graphql::Number::from_f64(f)
                        .unwrap_or_else(|| async_graphql::Number::from(0)),
                )
            } else {
                Value::Null
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => {
            Value::List(arr.into_iter().map(json_to_graphql_value).collect())
        }
        serde_json::Value::Object(obj) => {
            let map: async_graphql::indexmap::IndexMap<async_graphql::Name, Value> = obj
                .into_iter()
                .map(|(k, v)| (async_graphql::Name::new(k), json_to_graphql_value(v)))
                .collect();
            Value::Object(map)
        }
    }
}

/// Converts an engine value to a `serde_json::Value`.
pub(crate) fn graphql_value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                serde_json::Value::Number(i.into())
            } else if let Some(f) = n.as_f64() {
                serde_json::json!(f)
            } else {
                serde_json::Value::Null
            }
        }
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Enum(e) => serde_json::Value::String(e.to_string()),
        Value::List(items) => {
            serde_json::Value::Array(items.iter().map(graphql_value_to_json).collect())
        }
        Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.to_string(), graphql_value_to_json(v)))
                .collect(),
        ),
        Value::Binary(bytes) => {
            use base64::Engine as _;
            serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
    }
}

/// Converts a raw argument accessor to JSON.
pub(crate) fn value_accessor_to_json(
    value: &ValueAccessor<'_>,
) -> Result<serde_json::Value, async_graphql::Error> {
    if value.is_null() {
        return Ok(serde_json::Value::Null);
    }
    if let Ok(b) = value.boolean() {
        return Ok(serde_json::Value::Bool(b));
    }
    if let Ok(i) = value.i64() {
        return Ok(serde_json::Value::Number(i.into()));
    }
    if let Ok(f) = value.f64() {
        return Ok(serde_json::json!(f));
    }
    if let Ok(e) = value.enum_name() {
        return Ok(serde_json::Value::String(e.to_string()));
    }
    if let Ok(s) = value.string() {
        return Ok(serde_json::Value::String(s.to_string()));
    }
    if let Ok(list) = value.list() {
        let items: Result<Vec<serde_json::Value>, async_graphql::Error> =
            list.iter().map(|v| value_accessor_to_json(&v)).collect();
        return Ok(serde_json::Value::Array(items?));
    }
    if let Ok(obj) = value.object() {
        let mut map = serde_json::Map::new();
        for (k, v) in obj.iter() {
            map.insert(k.to_string(), value_accessor_to_json(&v)?);
        }
        return Ok(serde_json::Value::Object(map));
    }
    Ok(serde_json::Value::Null)
}

/// Collects all provided arguments of the current call as one JSON
/// object.
fn arguments_to_json(ctx: &ResolverContext<'_>) -> Result<serde_json::Value, async_graphql::Error> {
    let mut map = serde_json::Map::new();
    for (name, value) in ctx.args.iter() {
        map.insert(name.to_string(), value_accessor_to_json(&value)?);
    }
    Ok(serde_json::Value::Object(map))
}

/// The item type of a declared subscription return: the sequence's
/// item, directly or behind a null-elided union of sequences.
fn subscription_item_type(ty: &TypeDescriptor) -> Option<&TypeDescriptor> {
    match ty {
        TypeDescriptor::Sequence { item, .. } => Some(item),
        TypeDescriptor::Union(members) => {
            let mut first = None;
            for member in members {
                match member {
                    TypeDescriptor::Null | TypeDescriptor::Undefined => {}
                    TypeDescriptor::Sequence { item, .. } => {
                        if first.is_none() {
                            first = Some(item.as_ref());
                        }
                    }
                    _ => return None,
                }
            }
            first
        }
        _ => None,
    }
}

/// Everything a resolve function needs per call, computed once per
/// field at schema build time.
pub struct PreparedResolver {
    binding: ResolverBinding,
    field_name: String,
    method_name: String,
    kind: FieldKind,
    handler: HandlerFn,
    middleware: Vec<DynMiddleware>,
    parameters: Vec<ParameterDescriptor>,
    parent_index: Option<usize>,
    context_index: Option<usize>,
    args_type: TypeDescriptor,
    result_type: TypeDescriptor,
    result_nullable: bool,
    union_shapes: Option<Arc<Vec<UnionMemberShape>>>,
    codec: DynCodec,
}

/// Builds a [`PreparedResolver`] for one handler entry.
///
/// # Errors
///
/// [`SchemaError::InvalidSubscriptionType`] when a subscription entry
/// declares a return type that is not an adaptable asynchronous
/// sequence.
pub fn prepare(
    binding: &ResolverBinding,
    entry: &HandlerEntry,
    class_middleware: &[DynMiddleware],
    kind: FieldKind,
    codec: DynCodec,
) -> Result<Arc<PreparedResolver>, SchemaError> {
    let parameters = entry.signature.parameters.clone();
    let parent_index = parent_parameter_index(&parameters);
    let context_index = context_parameter_index(&parameters);

    let args_type = TypeDescriptor::Object(Arc::new(ObjectDescriptor {
        type_name: None,
        properties: argument_parameters(&parameters)
            .into_iter()
            .map(|parameter| PropertyDescriptor {
                name: parameter.name.clone(),
                ty: parameter.ty.clone(),
                optional: parameter.optional,
                excluded: false,
                description: None,
                deprecation_reason: None,
            })
            .collect(),
    }));

    let resolved_return;
    let unwrapped = match entry.signature.return_type.unwrap_promise() {
        TypeDescriptor::Lazy(lazy) => {
            resolved_return = lazy.resolve();
            &resolved_return
        }
        other => other,
    };
    let (result_type, result_nullable) = if kind == FieldKind::Subscription {
        let item = subscription_item_type(unwrapped).ok_or_else(|| {
            SchemaError::InvalidSubscriptionType {
                class: binding.class_name().to_string(),
                method: entry.method_name.clone(),
            }
        })?;
        (item.clone(), item.is_nullable())
    } else {
        (unwrapped.clone(), unwrapped.is_nullable())
    };

    let mut middleware = class_middleware.to_vec();
    middleware.extend(entry.middleware.iter().cloned());

    let union_shapes = union_member_shapes(&result_type);

    Ok(Arc::new(PreparedResolver {
        binding: binding.clone(),
        field_name: entry.exposed_name.clone(),
        method_name: entry.method_name.clone(),
        kind,
        handler: entry.handler.clone(),
        middleware,
        parameters,
        parent_index,
        context_index,
        args_type,
        result_type,
        result_nullable,
        union_shapes,
        codec,
    }))
}

impl PreparedResolver {
    /// The item/result type the serializer is bound to.
    pub(crate) fn result_type(&self) -> &TypeDescriptor {
        &self.result_type
    }

    /// Whether the field's result may be null.
    pub(crate) fn result_nullable(&self) -> bool {
        self.result_nullable
    }

    /// The argument parameters, in declared order.
    pub(crate) fn argument_parameters(&self) -> Vec<&ParameterDescriptor> {
        argument_parameters(&self.parameters)
    }

    /// Coerces and validates the raw arguments, runs the middleware
    /// chain, and invokes the handler.
    async fn invoke(
        &self,
        parent: Option<serde_json::Value>,
        raw_args: serde_json::Value,
        context: ExecutionContext,
    ) -> Result<HandlerReturn, FieldError> {
        let args = self.codec.deserialize(raw_args, &self.args_type)?;

        let issues = self.codec.validate(&args, &self.args_type);
        if !issues.is_empty() {
            let message = issues
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n");
            return Err(FieldError::InvalidArguments(message));
        }

        run_chain(&self.middleware, &context).await?;

        let instance = context.injector.resolve(&self.binding)?;
        let call = self.splice(args, parent, context);

        trace!(
            field = %self.field_name,
            method = %self.method_name,
            kind = self.kind.as_str(),
            "invoking handler"
        );
        (*self.handler)(instance, call).await
    }

    /// Splices the deserialized arguments, the parent value, and the
    /// execution context back into their declared parameter positions.
    fn splice(
        &self,
        args: serde_json::Value,
        parent: Option<serde_json::Value>,
        context: ExecutionContext,
    ) -> HandlerCall {
        let mut map = match args {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        let slots = self
            .parameters
            .iter()
            .enumerate()
            .map(|(index, parameter)| {
                if Some(index) == self.parent_index {
                    CallSlot::Parent(parent.clone().unwrap_or(serde_json::Value::Null))
                } else if Some(index) == self.context_index {
                    CallSlot::Context(context.clone())
                } else {
                    let value = map
                        .remove(&parameter.name)
                        .or_else(|| parameter.default_value.clone())
                        .unwrap_or(serde_json::Value::Null);
                    CallSlot::Argument(value)
                }
            })
            .collect();
        HandlerCall::new(slots)
    }

    /// Resolves a query, mutation, or field-resolver call to a
    /// serialized value.
    async fn resolve_value(
        &self,
        parent: Option<serde_json::Value>,
        raw_args: serde_json::Value,
        context: ExecutionContext,
    ) -> Result<Option<serde_json::Value>, FieldError> {
        match self.invoke(parent, raw_args, context).await? {
            HandlerReturn::Value(value) => {
                let shaped = self.codec.serialize(value, &self.result_type)?;
                if shaped.is_null() {
                    Ok(None)
                } else {
                    Ok(Some(shaped))
                }
            }
            HandlerReturn::Source(_) => Err(FieldError::Handler(format!(
                "'{}' on '{}' returned a subscription source for a non-subscription field",
                self.method_name,
                self.binding.class_name()
            ))),
        }
    }

    /// Resolves a subscription call to a normalized item stream.
    async fn resolve_subscription(
        &self,
        raw_args: serde_json::Value,
        context: ExecutionContext,
    ) -> Result<BoxStream<'static, Result<Value, async_graphql::Error>>, FieldError> {
        match self.invoke(None, raw_args, context).await? {
            HandlerReturn::Source(source) => {
                trace!(
                    field = %self.field_name,
                    shape = source.kind(),
                    "starting subscription"
                );
                Ok(normalize(source, self.item_serializer()))
            }
            HandlerReturn::Value(_) => Err(FieldError::InvalidSubscriptionResult {
                class: self.binding.class_name().to_string(),
                method: self.method_name.clone(),
            }),
        }
    }

    /// The per-item serializer bound to this field's item type.
    fn item_serializer(&self) -> ItemSerializer {
        let codec = self.codec.clone();
        let item_type = self.result_type.clone();
        Arc::new(move |item| {
            codec
                .serialize(item, &item_type)
                .map(json_to_graphql_value)
                .map_err(FieldError::from)
        })
    }
}

/// Wraps a prepared resolver into a field resolve closure.
pub fn into_resolve_fn(prepared: Arc<PreparedResolver>) -> ResolveFn {
    Arc::new(move |ctx: ResolverContext<'_>| {
        let prepared = prepared.clone();
        FieldFuture::new(async move {
            let context = ctx
                .data::<ExecutionContext>()
                .map_err(|_| async_graphql::Error::from(FieldError::MissingContext))?
                .clone();
            let parent = ctx.parent_value.as_value().map(graphql_value_to_json);
            let raw_args = arguments_to_json(&ctx)?;

            let resolved = prepared
                .resolve_value(parent, raw_args, context)
                .await
                .map_err(async_graphql::Error::from)?;

            Ok(resolved.map(|value| {
                let member = prepared
                    .union_shapes
                    .as_ref()
                    .and_then(|shapes| pick_member_json(&value, shapes));
                let field_value = FieldValue::value(json_to_graphql_value(value));
                match member {
                    Some(type_name) => field_value.with_type(type_name),
                    None => field_value,
                }
            }))
        })
    })
}

/// Wraps a prepared resolver into a subscription subscribe closure.
pub fn into_subscribe_fn(prepared: Arc<PreparedResolver>) -> SubscribeFn {
    Arc::new(move |ctx: ResolverContext<'_>| {
        let prepared = prepared.clone();
        SubscriptionFieldFuture::new(async move {
            let context = ctx
                .data::<ExecutionContext>()
                .map_err(|_| async_graphql::Error::from(FieldError::MissingContext))?
                .clone();
            let raw_args = arguments_to_json(&ctx)?;

            prepared
                .resolve_subscription(raw_args, context)
                .await
                .map_err(async_graphql::Error::from)
        })
    })
}

/// The default resolve behavior of an object field: read the property
/// from the parent value object.
pub(crate) fn property_resolve_fn(
    property: String,
    union_shapes: Option<Arc<Vec<UnionMemberShape>>>,
) -> ResolveFn {
    Arc::new(move |ctx: ResolverContext<'_>| {
        let property = property.clone();
        let union_shapes = union_shapes.clone();
        FieldFuture::new(async move {
            if let Some(Value::Object(parent)) = ctx.parent_value.as_value() {
                if let Some(value) = parent.get(property.as_str()) {
                    if value == &Value::Null {
                        return Ok(None);
                    }
                    let member = union_shapes
                        .as_ref()
                        .and_then(|shapes| pick_member_graphql(value, shapes));
                    let field_value = FieldValue::value(value.clone());
                    return Ok(Some(match member {
                        Some(type_name) => field_value.with_type(type_name),
                        None => field_value,
                    }));
                }
            }
            Ok(None)
        })
    })
}
