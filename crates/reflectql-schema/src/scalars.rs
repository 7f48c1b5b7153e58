//! Scalar mapping.
//!
//! A fixed table maps primitive and branded descriptor kinds to named
//! leaf schema types. [`scalar_for`] is a pure, total function over all
//! descriptor kinds that can be scalars; kinds that can never be
//! scalars and numbers without a brand are hard errors, surfaced at
//! schema build time. Repeated calls with equal descriptors return the
//! identical `&'static` definition.

use async_graphql::Value;
use async_graphql::dynamic::{Scalar, SchemaBuilder};
use base64::Engine as _;
use reflectql_reflect::{BigIntFormat, ClassDescriptor, SignConstraint, TypeDescriptor};

use crate::codec::{is_byte_buffer_class, is_datetime_class};
use crate::error::SchemaError;

/// One named leaf schema type.
pub struct ScalarDef {
    /// The scalar's schema name.
    pub name: &'static str,
    /// Human-readable description, emitted into the schema.
    pub description: &'static str,
    /// Whether the scalar is one of the five built-in GraphQL scalars
    /// and therefore must not be registered again.
    pub builtin: bool,
    /// Input validator, if the scalar constrains its values.
    pub validator: Option<fn(&Value) -> bool>,
}

macro_rules! scalar_def {
    ($ident:ident, $name:literal, $description:literal, builtin) => {
        pub static $ident: ScalarDef = ScalarDef {
            name: $name,
            description: $description,
            builtin: true,
            validator: None,
        };
    };
    ($ident:ident, $name:literal, $description:literal) => {
        pub static $ident: ScalarDef = ScalarDef {
            name: $name,
            description: $description,
            builtin: false,
            validator: None,
        };
    };
    ($ident:ident, $name:literal, $description:literal, $validator:expr) => {
        pub static $ident: ScalarDef = ScalarDef {
            name: $name,
            description: $description,
            builtin: false,
            validator: Some($validator),
        };
    };
}

scalar_def!(BOOLEAN, "Boolean", "The built-in Boolean scalar.", builtin);
scalar_def!(STRING, "String", "The built-in String scalar.", builtin);
scalar_def!(FLOAT, "Float", "The built-in Float scalar.", builtin);
scalar_def!(INT, "Int", "The built-in Int scalar.", builtin);
scalar_def!(ID, "ID", "The built-in ID scalar.", builtin);

scalar_def!(
    VOID,
    "Void",
    "Represents the absence of a value. Always serializes to null.",
    |v| v == &Value::Null
);
scalar_def!(
    BIG_INT,
    "BigInt",
    "An arbitrary-precision integer.",
    is_big_int
);
scalar_def!(
    BINARY_BIG_INT,
    "BinaryBigInt",
    "An arbitrary-precision integer in unsigned binary representation.",
    is_big_int
);
scalar_def!(
    SIGNED_BINARY_BIG_INT,
    "SignedBinaryBigInt",
    "An arbitrary-precision integer in signed binary representation.",
    is_big_int
);
scalar_def!(
    POSITIVE_FLOAT,
    "PositiveFloat",
    "A float strictly greater than zero.",
    |v| float_value(v).is_some_and(|f| f > 0.0)
);
scalar_def!(
    NEGATIVE_FLOAT,
    "NegativeFloat",
    "A float strictly less than zero.",
    |v| float_value(v).is_some_and(|f| f < 0.0)
);
scalar_def!(
    NON_POSITIVE_FLOAT,
    "NonPositiveFloat",
    "A float less than or equal to zero.",
    |v| float_value(v).is_some_and(|f| f <= 0.0)
);
scalar_def!(
    NON_NEGATIVE_FLOAT,
    "NonNegativeFloat",
    "A float greater than or equal to zero.",
    |v| float_value(v).is_some_and(|f| f >= 0.0)
);
scalar_def!(
    POSITIVE_INT,
    "PositiveInt",
    "An integer strictly greater than zero.",
    |v| int_value(v).is_some_and(|i| i > 0)
);
scalar_def!(
    NEGATIVE_INT,
    "NegativeInt",
    "An integer strictly less than zero.",
    |v| int_value(v).is_some_and(|i| i < 0)
);
scalar_def!(
    NON_POSITIVE_INT,
    "NonPositiveInt",
    "An integer less than or equal to zero.",
    |v| int_value(v).is_some_and(|i| i <= 0)
);
scalar_def!(
    NON_NEGATIVE_INT,
    "NonNegativeInt",
    "An integer greater than or equal to zero.",
    |v| int_value(v).is_some_and(|i| i >= 0)
);
scalar_def!(
    UUID,
    "UUID",
    "A universally unique identifier.",
    |v| match v {
        Value::String(s) => uuid::Uuid::parse_str(s).is_ok(),
        _ => false,
    }
);
scalar_def!(
    DATE_TIME,
    "DateTime",
    "An RFC 3339 date-time string.",
    |v| match v {
        Value::String(s) => time::OffsetDateTime::parse(
            s,
            &time::format_description::well_known::Rfc3339
        )
        .is_ok(),
        _ => false,
    }
);
scalar_def!(
    BYTE,
    "Byte",
    "Base64-encoded binary data.",
    |v| match v {
        Value::String(s) => base64::engine::general_purpose::STANDARD.decode(s).is_ok(),
        Value::Binary(_) => true,
        _ => false,
    }
);

fn float_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn int_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

fn is_big_int(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_f64().is_some_and(|f| f.fract() == 0.0),
        Value::String(s) => {
            let digits = s.strip_prefix('-').unwrap_or(s);
            !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
        }
        _ => false,
    }
}

/// Every scalar the compiler can emit.
static ALL_SCALARS: [&ScalarDef; 20] = [
    &BOOLEAN,
    &STRING,
    &FLOAT,
    &INT,
    &ID,
    &VOID,
    &BIG_INT,
    &BINARY_BIG_INT,
    &SIGNED_BINARY_BIG_INT,
    &POSITIVE_FLOAT,
    &NEGATIVE_FLOAT,
    &NON_POSITIVE_FLOAT,
    &NON_NEGATIVE_FLOAT,
    &POSITIVE_INT,
    &NEGATIVE_INT,
    &NON_POSITIVE_INT,
    &NON_NEGATIVE_INT,
    &UUID,
    &DATE_TIME,
    &BYTE,
];

/// Maps a descriptor to its scalar definition.
///
/// # Errors
///
/// - [`SchemaError::MissingNumberBrand`] for an unbranded number.
/// - [`SchemaError::UnsupportedHostClass`] for a class that is not a
///   recognized host value type.
/// - [`SchemaError::UnsupportedScalarKind`] for kinds that can never
///   be scalars (objects, arrays, unions, enums, ...).
pub fn scalar_for(ty: &TypeDescriptor) -> Result<&'static ScalarDef, SchemaError> {
    match ty {
        TypeDescriptor::Id => Ok(&ID),
        TypeDescriptor::Boolean => Ok(&BOOLEAN),
        TypeDescriptor::Class(class) => scalar_for_class(class),
        TypeDescriptor::Void | TypeDescriptor::Undefined => Ok(&VOID),
        TypeDescriptor::BigInt { format } => Ok(match format {
            Some(BigIntFormat::Binary) => &BINARY_BIG_INT,
            Some(BigIntFormat::SignedBinary) => &SIGNED_BINARY_BIG_INT,
            None => &BIG_INT,
        }),
        TypeDescriptor::Number { brand, constraint } => {
            let Some(brand) = brand else {
                return Err(SchemaError::MissingNumberBrand);
            };
            if brand.is_float() {
                return Ok(match constraint {
                    Some(SignConstraint::Positive) => &POSITIVE_FLOAT,
                    Some(SignConstraint::Negative) => &NEGATIVE_FLOAT,
                    Some(SignConstraint::NonPositive) => &NON_POSITIVE_FLOAT,
                    Some(SignConstraint::NonNegative) => &NON_NEGATIVE_FLOAT,
                    None => &FLOAT,
                });
            }
            if brand.is_unsigned() {
                // Unsigned widths are positive by construction,
                // whatever constraint was attached.
                return Ok(&POSITIVE_INT);
            }
            Ok(match constraint {
                Some(SignConstraint::Positive) => &POSITIVE_INT,
                Some(SignConstraint::Negative) => &NEGATIVE_INT,
                Some(SignConstraint::NonPositive) => &NON_POSITIVE_INT,
                Some(SignConstraint::NonNegative) => &NON_NEGATIVE_INT,
                None => &INT,
            })
        }
        TypeDescriptor::Literal(_) => Ok(&STRING),
        TypeDescriptor::String(descriptor) => {
            if descriptor.type_name.as_deref() == Some("UUID") {
                Ok(&UUID)
            } else {
                Ok(&STRING)
            }
        }
        other => Err(SchemaError::UnsupportedScalarKind(other.kind())),
    }
}

/// Maps a host class to its scalar definition.
///
/// # Errors
///
/// [`SchemaError::UnsupportedHostClass`] when the class is not a
/// recognized date/time or byte-buffer value class. The type graph
/// builder treats that error as "build an object type instead".
pub fn scalar_for_class(class: &ClassDescriptor) -> Result<&'static ScalarDef, SchemaError> {
    if is_datetime_class(class) {
        Ok(&DATE_TIME)
    } else if is_byte_buffer_class(class) {
        Ok(&BYTE)
    } else {
        Err(SchemaError::UnsupportedHostClass(class.class_name.clone()))
    }
}

/// Registers every non-built-in scalar into the schema builder.
pub(crate) fn register_scalars(mut builder: SchemaBuilder) -> SchemaBuilder {
    for def in ALL_SCALARS.iter().filter(|def| !def.builtin) {
        let mut scalar = Scalar::new(def.name).description(def.description);
        if let Some(validator) = def.validator {
            scalar = scalar.validator(validator);
        }
        builder = builder.register(scalar);
    }
    builder
}
