//! Value codecs.
//!
//! Deserialization, validation, and serialization of individual values
//! against a [`TypeDescriptor`] are the concern of an external codec
//! collaborator, consumed through the [`ValueCodec`] trait. The
//! resolver pipeline calls it in a fixed order: coerce raw arguments,
//! validate them, and serialize handler results.
//!
//! [`JsonCodec`] is the reference implementation over
//! `serde_json::Value`. It is deliberately lenient during coercion
//! (malformed shapes are reported by validation, not by panics) and
//! strict during validation.

use std::sync::Arc;

use base64::Engine as _;
use reflectql_reflect::{ClassDescriptor, TypeDescriptor};

use crate::error::CodecError;

/// A single validation finding, addressed by a dotted value path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted path into the validated value. Empty at the root.
    pub path: String,
    /// Human-readable message.
    pub message: String,
}

impl ValidationIssue {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Serialization/validation codec for individual values.
pub trait ValueCodec: Send + Sync {
    /// Coerces a raw external value into the shape the handler
    /// expects. Type mismatches are left in place for `validate` to
    /// report.
    fn deserialize(
        &self,
        raw: serde_json::Value,
        ty: &TypeDescriptor,
    ) -> Result<serde_json::Value, CodecError>;

    /// Serializes a handler-produced value for the schema engine.
    fn serialize(
        &self,
        value: serde_json::Value,
        ty: &TypeDescriptor,
    ) -> Result<serde_json::Value, CodecError>;

    /// Validates a deserialized value. An empty result means the value
    /// is acceptable.
    fn validate(&self, value: &serde_json::Value, ty: &TypeDescriptor) -> Vec<ValidationIssue>;
}

/// Shared handle to a codec.
pub type DynCodec = Arc<dyn ValueCodec>;

/// Whether a host class is one of the recognized date/time classes.
pub(crate) fn is_datetime_class(class: &ClassDescriptor) -> bool {
    matches!(
        class.class_name.as_str(),
        "DateTime" | "OffsetDateTime" | "PrimitiveDateTime" | "SystemTime"
    )
}

/// Whether a host class is one of the recognized byte-buffer classes.
pub(crate) fn is_byte_buffer_class(class: &ClassDescriptor) -> bool {
    matches!(
        class.class_name.as_str(),
        "Bytes" | "ByteBuffer" | "Uint8Buffer" | "Uint16Buffer" | "Uint32Buffer"
    )
}

/// Reference codec over JSON values.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    /// Creates a codec.
    pub fn new() -> Self {
        Self
    }

    fn coerce(&self, raw: serde_json::Value, ty: &TypeDescriptor) -> serde_json::Value {
        use serde_json::Value;

        match ty.unwrap_property() {
            TypeDescriptor::Number {
                brand: Some(brand), ..
            } if !brand.is_float() => match raw {
                // Integer-family values arrive as JSON doubles from
                // some transports.
                Value::Number(n) => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && n.as_i64().is_none() => {
                        serde_json::json!(f as i64)
                    }
                    _ => Value::Number(n),
                },
                other => other,
            },
            TypeDescriptor::Enum(descriptor) => match raw {
                Value::String(name) => match descriptor.member(&name) {
                    Some(member) => member.value.to_json(),
                    None => Value::String(name),
                },
                other => other,
            },
            TypeDescriptor::Array(element) => match raw {
                Value::Array(items) => Value::Array(
                    items
                        .into_iter()
                        .map(|item| self.coerce(item, element))
                        .collect(),
                ),
                other => other,
            },
            TypeDescriptor::Object(object) => self.coerce_object(raw, &object.properties),
            TypeDescriptor::Class(class)
                if !is_datetime_class(class) && !is_byte_buffer_class(class) =>
            {
                self.coerce_object(raw, &class.properties)
            }
            TypeDescriptor::Union(members) => {
                if raw.is_null() {
                    return raw;
                }
                let remaining = TypeDescriptor::non_null_members(members);
                if remaining.len() == 1 {
                    self.coerce(raw, remaining[0])
                } else {
                    raw
                }
            }
            TypeDescriptor::Lazy(lazy) => {
                let resolved = lazy.resolve();
                self.coerce(raw, &resolved)
            }
            _ => raw,
        }
    }

    fn coerce_object(
        &self,
        raw: serde_json::Value,
        properties: &[reflectql_reflect::PropertyDescriptor],
    ) -> serde_json::Value {
        let mut map = match raw {
            serde_json::Value::Object(map) => map,
            other => return other,
        };
        for property in properties.iter().filter(|p| !p.excluded) {
            if let Some(value) = map.remove(&property.name) {
                map.insert(property.name.clone(), self.coerce(value, &property.ty));
            }
        }
        serde_json::Value::Object(map)
    }

    fn check(
        &self,
        value: &serde_json::Value,
        ty: &TypeDescriptor,
        path: &str,
        out: &mut Vec<ValidationIssue>,
    ) {
        use serde_json::Value;

        match ty.unwrap_property() {
            TypeDescriptor::Boolean => {
                if !value.is_boolean() {
                    out.push(ValidationIssue::new(path, "expected a boolean"));
                }
            }
            TypeDescriptor::Number { brand, constraint } => {
                let Some(n) = value.as_f64() else {
                    out.push(ValidationIssue::new(path, "expected a number"));
                    return;
                };
                if let Some(brand) = brand {
                    if !brand.is_float() && n.fract() != 0.0 {
                        out.push(ValidationIssue::new(path, "expected an integer"));
                    }
                    if brand.is_unsigned() && n < 0.0 {
                        out.push(ValidationIssue::new(path, "must not be negative"));
                    }
                }
                if let Some(constraint) = constraint {
                    use reflectql_reflect::SignConstraint::*;
                    let ok = match constraint {
                        Positive => n > 0.0,
                        NonNegative => n >= 0.0,
                        Negative => n < 0.0,
                        NonPositive => n <= 0.0,
                    };
                    if !ok {
                        let expectation = match constraint {
                            Positive => "must be greater than zero",
                            NonNegative => "must not be negative",
                            Negative => "must be less than zero",
                            NonPositive => "must not be positive",
                        };
                        out.push(ValidationIssue::new(path, expectation));
                    }
                }
            }
            TypeDescriptor::BigInt { .. } => {
                if !value.is_number() && !value.is_string() {
                    out.push(ValidationIssue::new(path, "expected a big integer"));
                }
            }
            TypeDescriptor::String(descriptor) => {
                let Some(s) = value.as_str() else {
                    out.push(ValidationIssue::new(path, "expected a string"));
                    return;
                };
                if let Some(min) = descriptor.min_length {
                    if s.chars().count() < min {
                        out.push(ValidationIssue::new(
                            path,
                            format!("must be at least {min} characters long"),
                        ));
                    }
                }
                if let Some(max) = descriptor.max_length {
                    if s.chars().count() > max {
                        out.push(ValidationIssue::new(
                            path,
                            format!("must be at most {max} characters long"),
                        ));
                    }
                }
                if let Some(pattern) = &descriptor.pattern {
                    match regex::Regex::new(pattern) {
                        Ok(re) => {
                            if !re.is_match(s) {
                                out.push(ValidationIssue::new(
                                    path,
                                    format!("must match pattern {pattern}"),
                                ));
                            }
                        }
                        Err(_) => {
                            out.push(ValidationIssue::new(
                                path,
                                format!("invalid pattern {pattern}"),
                            ));
                        }
                    }
                }
                if descriptor.type_name.as_deref() == Some("UUID")
                    && uuid::Uuid::parse_str(s).is_err()
                {
                    out.push(ValidationIssue::new(path, "expected a UUID"));
                }
            }
            TypeDescriptor::Literal(_) => {
                if !value.is_string() {
                    out.push(ValidationIssue::new(path, "expected a string"));
                }
            }
            TypeDescriptor::Id => {
                if !value.is_string() && !value.is_number() {
                    out.push(ValidationIssue::new(path, "expected an identifier"));
                }
            }
            TypeDescriptor::Array(element) => {
                let Some(items) = value.as_array() else {
                    out.push(ValidationIssue::new(path, "expected a list"));
                    return;
                };
                for (index, item) in items.iter().enumerate() {
                    let item_path = join_path(path, &index.to_string());
                    if item.is_null() {
                        if !element.is_nullable() {
                            out.push(ValidationIssue::new(&item_path, "must not be null"));
                        }
                    } else {
                        self.check(item, element, &item_path, out);
                    }
                }
            }
            TypeDescriptor::Object(object) => {
                self.check_object(value, &object.properties, path, out);
            }
            TypeDescriptor::Class(class) => {
                if is_datetime_class(class) {
                    let parses = value.as_str().is_some_and(|s| {
                        time::OffsetDateTime::parse(
                            s,
                            &time::format_description::well_known::Rfc3339,
                        )
                        .is_ok()
                    });
                    if !parses {
                        out.push(ValidationIssue::new(path, "expected an RFC 3339 date-time"));
                    }
                } else if is_byte_buffer_class(class) {
                    let ok = value.is_string()
                        || value
                            .as_array()
                            .is_some_and(|items| items.iter().all(|i| i.is_u64()));
                    if !ok {
                        out.push(ValidationIssue::new(path, "expected binary data"));
                    }
                } else {
                    self.check_object(value, &class.properties, path, out);
                }
            }
            TypeDescriptor::Enum(descriptor) => {
                let matches_member = descriptor.member_for_value(value).is_some()
                    || value
                        .as_str()
                        .is_some_and(|name| descriptor.member(name).is_some());
                if !matches_member {
                    out.push(ValidationIssue::new(path, "is not a member of the enum"));
                }
            }
            TypeDescriptor::Union(members) => {
                if value.is_null() {
                    if !ty.is_nullable() {
                        out.push(ValidationIssue::new(path, "must not be null"));
                    }
                    return;
                }
                let remaining = TypeDescriptor::non_null_members(members);
                match remaining.as_slice() {
                    [] => {}
                    [single] => self.check(value, single, path, out),
                    many => {
                        let matches_any = many.iter().any(|member| {
                            let mut probe = Vec::new();
                            self.check(value, member, path, &mut probe);
                            probe.is_empty()
                        });
                        if !matches_any {
                            out.push(ValidationIssue::new(
                                path,
                                "does not match any member of the union",
                            ));
                        }
                    }
                }
            }
            TypeDescriptor::Promise(inner) => self.check(value, inner, path, out),
            TypeDescriptor::Lazy(lazy) => {
                let resolved = lazy.resolve();
                self.check(value, &resolved, path, out);
            }
            TypeDescriptor::Sequence { .. }
            | TypeDescriptor::Void
            | TypeDescriptor::Undefined
            | TypeDescriptor::Null => {}
            TypeDescriptor::Property(property) => self.check(value, &property.ty, path, out),
        }
    }

    fn check_object(
        &self,
        value: &serde_json::Value,
        properties: &[reflectql_reflect::PropertyDescriptor],
        path: &str,
        out: &mut Vec<ValidationIssue>,
    ) {
        let Some(map) = value.as_object() else {
            out.push(ValidationIssue::new(path, "expected an object"));
            return;
        };
        for property in properties.iter().filter(|p| !p.excluded) {
            let property_path = join_path(path, &property.name);
            match map.get(&property.name) {
                None | Some(serde_json::Value::Null) => {
                    if !property.optional && !property.ty.is_nullable() {
                        out.push(ValidationIssue::new(&property_path, "is required"));
                    }
                }
                Some(present) => self.check(present, &property.ty, &property_path, out),
            }
        }
    }

    fn shape(
        &self,
        value: serde_json::Value,
        ty: &TypeDescriptor,
    ) -> Result<serde_json::Value, CodecError> {
        use serde_json::Value;

        match ty.unwrap_property() {
            TypeDescriptor::Void | TypeDescriptor::Undefined => Ok(Value::Null),
            TypeDescriptor::Promise(inner) => self.shape(value, inner),
            TypeDescriptor::Sequence { item, .. } => self.shape(value, item),
            TypeDescriptor::Enum(descriptor) => {
                if let Some(member) = descriptor.member_for_value(&value) {
                    return Ok(Value::String(member.name.clone()));
                }
                if let Some(name) = value.as_str() {
                    if descriptor.member(name).is_some() {
                        return Ok(Value::String(name.to_string()));
                    }
                }
                Err(CodecError(format!(
                    "value {value} is not a member of enum {}",
                    descriptor.type_name.as_deref().unwrap_or("<anonymous>")
                )))
            }
            TypeDescriptor::Array(element) => match value {
                Value::Array(items) => Ok(Value::Array(
                    items
                        .into_iter()
                        .map(|item| self.shape(item, element))
                        .collect::<Result<_, _>>()?,
                )),
                Value::Null => Ok(Value::Null),
                other => Err(CodecError(format!("expected a list, got {other}"))),
            },
            TypeDescriptor::Object(object) => self.shape_object(value, &object.properties),
            TypeDescriptor::Class(class) => {
                if is_byte_buffer_class(class) {
                    return match value {
                        Value::Array(items) => {
                            let bytes: Result<Vec<u8>, CodecError> = items
                                .iter()
                                .map(|i| {
                                    i.as_u64().map(|b| b as u8).ok_or_else(|| {
                                        CodecError("expected binary data".to_string())
                                    })
                                })
                                .collect();
                            Ok(Value::String(
                                base64::engine::general_purpose::STANDARD.encode(bytes?),
                            ))
                        }
                        other => Ok(other),
                    };
                }
                if is_datetime_class(class) {
                    return Ok(value);
                }
                self.shape_object(value, &class.properties)
            }
            TypeDescriptor::Union(members) => {
                if value.is_null() {
                    return Ok(value);
                }
                let remaining = TypeDescriptor::non_null_members(members);
                match remaining.as_slice() {
                    [single] => self.shape(value, single),
                    _ => Ok(value),
                }
            }
            TypeDescriptor::Lazy(lazy) => {
                let resolved = lazy.resolve();
                self.shape(value, &resolved)
            }
            _ => Ok(value),
        }
    }

    fn shape_object(
        &self,
        value: serde_json::Value,
        properties: &[reflectql_reflect::PropertyDescriptor],
    ) -> Result<serde_json::Value, CodecError> {
        let mut map = match value {
            serde_json::Value::Object(map) => map,
            other => return Ok(other),
        };
        for property in properties {
            if property.excluded {
                map.remove(&property.name);
                continue;
            }
            if let Some(present) = map.remove(&property.name) {
                if !present.is_null() {
                    map.insert(property.name.clone(), self.shape(present, &property.ty)?);
                } else {
                    map.insert(property.name.clone(), present);
                }
            }
        }
        Ok(serde_json::Value::Object(map))
    }
}

impl ValueCodec for JsonCodec {
    fn deserialize(
        &self,
        raw: serde_json::Value,
        ty: &TypeDescriptor,
    ) -> Result<serde_json::Value, CodecError> {
        Ok(self.coerce(raw, ty))
    }

    fn serialize(
        &self,
        value: serde_json::Value,
        ty: &TypeDescriptor,
    ) -> Result<serde_json::Value, CodecError> {
        self.shape(value, ty)
    }

    fn validate(&self, value: &serde_json::Value, ty: &TypeDescriptor) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        self.check(value, ty, "", &mut issues);
        issues
    }
}

fn join_path(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else {
        format!("{parent}.{segment}")
    }
}
