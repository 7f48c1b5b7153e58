//! The reflected type tree.
//!
//! A [`TypeDescriptor`] is a tagged tree node describing one type as
//! seen by the reflection collaborator: primitives with their brands
//! and constraints, arrays, object shapes, enums, unions, and the
//! asynchronous production shapes subscription handlers may declare.

use std::sync::Arc;

/// Names beginning with this prefix mark unresolved generic
/// placeholders emitted by the reflection layer. They can never become
/// schema type names.
pub const UNRESOLVED_NAME_PREFIX: &str = "?";

/// Numeric brand attached to a `number` descriptor.
///
/// The brand decides which scalar family the number maps to. A number
/// without a brand cannot be mapped and is rejected at schema build
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum NumberBrand {
    /// Architecture-default float.
    Float,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// Architecture-default signed integer.
    Integer,
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 8-bit unsigned integer.
    Uint8,
    /// 16-bit unsigned integer.
    Uint16,
    /// 32-bit unsigned integer.
    Uint32,
}

impl NumberBrand {
    /// Whether this brand belongs to the float family.
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Float32 | Self::Float64)
    }

    /// Whether this brand is an unsigned fixed-width integer.
    pub fn is_unsigned(self) -> bool {
        matches!(self, Self::Uint8 | Self::Uint16 | Self::Uint32)
    }
}

/// Explicit sign constraint carried by a numeric descriptor.
///
/// Replaces decorator-style branding: the reflection layer attaches one
/// resolved constraint instead of a set of annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SignConstraint {
    /// Strictly greater than zero.
    Positive,
    /// Greater than or equal to zero.
    NonNegative,
    /// Strictly less than zero.
    Negative,
    /// Less than or equal to zero.
    NonPositive,
}

/// Format attached to a `bigint` descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BigIntFormat {
    /// Unsigned binary representation.
    Binary,
    /// Signed binary representation.
    SignedBinary,
}

/// String descriptor details: an optional literal type name (used for
/// branded strings such as `UUID` and `ID`) and validation constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StringDescriptor {
    /// Literal type name the string was declared with, if any.
    pub type_name: Option<String>,
    /// Minimum length constraint.
    pub min_length: Option<usize>,
    /// Maximum length constraint.
    pub max_length: Option<usize>,
    /// Regular-expression pattern constraint.
    pub pattern: Option<String>,
}

/// The asynchronous production shape a subscription handler declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SequenceShape {
    /// An async generator.
    Generator,
    /// A plain async iterable.
    Iterable,
    /// A push observable with a subscribe/next protocol.
    Observable,
    /// A named event-channel (publish/subscribe bus) type.
    Channel,
}

/// One property of an object or class shape.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    /// Property name as declared.
    pub name: String,
    /// The property's type.
    pub ty: TypeDescriptor,
    /// Whether the property was declared optional.
    pub optional: bool,
    /// Whether the property is excluded from the exposed shape.
    pub excluded: bool,
    /// Documentation attached to the property.
    pub description: Option<String>,
    /// Deprecation reason, if the property is deprecated.
    pub deprecation_reason: Option<String>,
}

impl PropertyDescriptor {
    /// Creates a required, included property.
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
            excluded: false,
            description: None,
            deprecation_reason: None,
        }
    }

    /// Marks the property optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Excludes the property from the exposed shape.
    pub fn excluded(mut self) -> Self {
        self.excluded = true;
        self
    }

    /// Attaches a description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the property deprecated with a reason.
    pub fn deprecated(mut self, reason: impl Into<String>) -> Self {
        self.deprecation_reason = Some(reason.into());
        self
    }
}

/// A named object-literal (interface) shape.
#[derive(Debug, Clone)]
pub struct ObjectDescriptor {
    /// The stable exposed type name. `None` for anonymous shapes,
    /// which cannot become named schema types.
    pub type_name: Option<String>,
    /// Declared properties, in declaration order.
    pub properties: Vec<PropertyDescriptor>,
}

impl ObjectDescriptor {
    /// Creates a named object shape with no properties.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            properties: Vec::new(),
        }
    }

    /// Creates an anonymous object shape.
    pub fn anonymous() -> Self {
        Self {
            type_name: None,
            properties: Vec::new(),
        }
    }

    /// Adds a property.
    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }
}

/// A host class shape: a runtime class the reflection layer saw.
///
/// Recognized host value classes (date/time, byte buffers) map to
/// scalars; everything else is treated as a named object shape built
/// from its properties.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    /// The runtime class name, used for host value recognition.
    pub class_name: String,
    /// The stable exposed type name, when the class becomes an object
    /// type. Defaults to the class name when the reflection layer does
    /// not override it.
    pub type_name: Option<String>,
    /// Declared properties, in declaration order.
    pub properties: Vec<PropertyDescriptor>,
}

impl ClassDescriptor {
    /// Creates a class descriptor named after its runtime class.
    pub fn new(class_name: impl Into<String>) -> Self {
        let class_name = class_name.into();
        Self {
            type_name: Some(class_name.clone()),
            class_name,
            properties: Vec::new(),
        }
    }

    /// Adds a property.
    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }
}

/// One member of an enum.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EnumMember {
    /// Member name as declared.
    pub name: String,
    /// Declared value, copied verbatim. Values need not be sequential.
    pub value: EnumValue,
}

/// The declared value of an enum member.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum EnumValue {
    /// String-valued member.
    Str(String),
    /// Integer-valued member.
    Int(i64),
}

impl EnumValue {
    /// The member value as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Str(s) => serde_json::Value::String(s.clone()),
            Self::Int(i) => serde_json::Value::Number((*i).into()),
        }
    }
}

/// An enum shape. Enums are memoized by descriptor identity, so the
/// reflection layer must hand out the same `Arc` for the same enum.
#[derive(Debug, Clone)]
pub struct EnumDescriptor {
    /// The exposed enum name. Required at materialization time.
    pub type_name: Option<String>,
    /// Declared members, in declaration order.
    pub members: Vec<EnumMember>,
}

impl EnumDescriptor {
    /// Creates a named enum with the given `(name, value)` members.
    pub fn new(
        type_name: impl Into<String>,
        members: impl IntoIterator<Item = (&'static str, EnumValue)>,
    ) -> Self {
        Self {
            type_name: Some(type_name.into()),
            members: members
                .into_iter()
                .map(|(name, value)| EnumMember {
                    name: name.to_string(),
                    value,
                })
                .collect(),
        }
    }

    /// Looks up a member by declared value.
    pub fn member_for_value(&self, value: &serde_json::Value) -> Option<&EnumMember> {
        self.members.iter().find(|m| &m.value.to_json() == value)
    }

    /// Looks up a member by name.
    pub fn member(&self, name: &str) -> Option<&EnumMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// A deferred type reference.
///
/// Reflection layers hand out thunks for back-references so that
/// mutually referential types stay representable: the thunk is only
/// resolved while the referencing type's fields are being built, at
/// which point the referenced name is already registered.
#[derive(Clone)]
pub struct LazyTypeRef(Arc<dyn Fn() -> TypeDescriptor + Send + Sync>);

impl LazyTypeRef {
    /// Wraps a thunk producing the referenced type.
    pub fn new(thunk: impl Fn() -> TypeDescriptor + Send + Sync + 'static) -> Self {
        Self(Arc::new(thunk))
    }

    /// Resolves the referenced type.
    pub fn resolve(&self) -> TypeDescriptor {
        (self.0)()
    }
}

impl std::fmt::Debug for LazyTypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LazyTypeRef(..)")
    }
}

/// A reflected type.
#[derive(Debug, Clone)]
pub enum TypeDescriptor {
    /// `boolean`.
    Boolean,
    /// A branded number with an optional sign constraint.
    Number {
        /// The numeric brand. `None` means an unbranded `number`,
        /// which cannot be mapped to a scalar.
        brand: Option<NumberBrand>,
        /// Explicit sign constraint, if any.
        constraint: Option<SignConstraint>,
    },
    /// A big integer with an optional representation format.
    BigInt {
        /// Representation format, if declared.
        format: Option<BigIntFormat>,
    },
    /// A string, possibly branded with a literal type name and
    /// carrying validation constraints.
    String(StringDescriptor),
    /// A literal value type. Exposed as a plain string.
    Literal(String),
    /// The external identity type (`ID`).
    Id,
    /// An array of the element type.
    Array(Box<TypeDescriptor>),
    /// A named or anonymous object-literal shape.
    Object(Arc<ObjectDescriptor>),
    /// A host class shape.
    Class(Arc<ClassDescriptor>),
    /// An enum shape, identity-carrying.
    Enum(Arc<EnumDescriptor>),
    /// A union of member types.
    Union(Vec<TypeDescriptor>),
    /// A property-signature wrapper around the underlying type.
    Property(Arc<PropertyDescriptor>),
    /// A deferred reference to another type, resolved on demand.
    Lazy(LazyTypeRef),
    /// A promise of the inner type.
    Promise(Box<TypeDescriptor>),
    /// An asynchronous production shape yielding items of the inner
    /// type. Only valid as a subscription handler return declaration.
    Sequence {
        /// Which production shape was declared.
        shape: SequenceShape,
        /// The item type.
        item: Box<TypeDescriptor>,
    },
    /// `void`.
    Void,
    /// `undefined`.
    Undefined,
    /// `null`. Only meaningful as a union member.
    Null,
}

impl TypeDescriptor {
    /// A plain (unconstrained) float.
    pub fn float() -> Self {
        Self::Number {
            brand: Some(NumberBrand::Float),
            constraint: None,
        }
    }

    /// A plain (unconstrained) integer.
    pub fn integer() -> Self {
        Self::Number {
            brand: Some(NumberBrand::Integer),
            constraint: None,
        }
    }

    /// A number with the given brand and no constraint.
    pub fn number(brand: NumberBrand) -> Self {
        Self::Number {
            brand: Some(brand),
            constraint: None,
        }
    }

    /// Attaches a sign constraint to a numeric descriptor. No-op for
    /// non-numeric descriptors.
    pub fn constrained(self, constraint: SignConstraint) -> Self {
        match self {
            Self::Number { brand, .. } => Self::Number {
                brand,
                constraint: Some(constraint),
            },
            other => other,
        }
    }

    /// A plain string.
    pub fn string() -> Self {
        Self::String(StringDescriptor::default())
    }

    /// A UUID-branded string.
    pub fn uuid() -> Self {
        Self::String(StringDescriptor {
            type_name: Some("UUID".to_string()),
            ..StringDescriptor::default()
        })
    }

    /// A nullable version of this type (`T | null`).
    pub fn nullable(self) -> Self {
        Self::Union(vec![self, Self::Null])
    }

    /// An array of this type.
    pub fn list(self) -> Self {
        Self::Array(Box::new(self))
    }

    /// A promise of this type.
    pub fn promised(self) -> Self {
        Self::Promise(Box::new(self))
    }

    /// Wraps this type as the item of an asynchronous sequence.
    pub fn sequence(self, shape: SequenceShape) -> Self {
        Self::Sequence {
            shape,
            item: Box::new(self),
        }
    }

    /// A deferred reference produced by the given thunk.
    pub fn lazy(thunk: impl Fn() -> TypeDescriptor + Send + Sync + 'static) -> Self {
        Self::Lazy(LazyTypeRef::new(thunk))
    }

    /// A short kind label used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Number { .. } => "number",
            Self::BigInt { .. } => "bigint",
            Self::String(_) => "string",
            Self::Literal(_) => "literal",
            Self::Id => "id",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Class(_) => "class",
            Self::Enum(_) => "enum",
            Self::Union(_) => "union",
            Self::Property(_) => "property",
            Self::Lazy(_) => "lazy",
            Self::Promise(_) => "promise",
            Self::Sequence { .. } => "sequence",
            Self::Void => "void",
            Self::Undefined => "undefined",
            Self::Null => "null",
        }
    }

    /// Unwraps a promise wrapper, if present.
    pub fn unwrap_promise(&self) -> &TypeDescriptor {
        match self {
            Self::Promise(inner) => inner,
            other => other,
        }
    }

    /// Unwraps a property-signature wrapper, if present.
    pub fn unwrap_property(&self) -> &TypeDescriptor {
        match self {
            Self::Property(property) => &property.ty,
            other => other,
        }
    }

    /// Whether a value of this type may be absent: `void`,
    /// `undefined`, or a union containing `null`/`undefined`.
    pub fn is_nullable(&self) -> bool {
        match self {
            Self::Void | Self::Undefined | Self::Null => true,
            Self::Union(members) => members
                .iter()
                .any(|m| matches!(m, Self::Null | Self::Undefined)),
            Self::Property(property) => property.optional || property.ty.is_nullable(),
            Self::Lazy(lazy) => lazy.resolve().is_nullable(),
            _ => false,
        }
    }

    /// The union members that are not `null`/`undefined`.
    pub fn non_null_members(members: &[TypeDescriptor]) -> Vec<&TypeDescriptor> {
        members
            .iter()
            .filter(|m| !matches!(m, Self::Null | Self::Undefined))
            .collect()
    }

    /// The declared name of this type, sanitized, when it has one.
    ///
    /// Union names are the order-preserving concatenation of their
    /// non-null member names.
    pub fn declared_name(&self) -> Option<String> {
        match self {
            Self::Object(object) => object.type_name.as_deref().map(sanitize_type_name),
            Self::Class(class) => class
                .type_name
                .as_deref()
                .or(Some(class.class_name.as_str()))
                .map(sanitize_type_name),
            Self::Enum(e) => e.type_name.as_deref().map(sanitize_type_name),
            Self::String(s) => s.type_name.as_deref().map(sanitize_type_name),
            Self::Union(members) => {
                let parts: Option<Vec<String>> = Self::non_null_members(members)
                    .iter()
                    .map(|m| m.declared_name())
                    .collect();
                parts.map(|p| p.concat())
            }
            Self::Lazy(lazy) => lazy.resolve().declared_name(),
            _ => None,
        }
    }
}

/// Strips every non-word character from a candidate type name.
pub fn sanitize_type_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}
