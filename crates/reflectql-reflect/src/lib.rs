//! # reflectql-reflect
//!
//! Read-only structural type descriptions for the ReflectQL schema
//! compiler.
//!
//! The reflection mechanism itself lives outside this workspace: a
//! build-time generator, a derive macro, or a hand-written registration
//! layer produces [`TypeDescriptor`] trees and [`MethodSignature`]s for
//! the types and handler methods it wants exposed. This crate only
//! defines the shape of that data, so the schema compiler can consume
//! it without caring where it came from.
//!
//! Descriptors are plain values. They are cheap to clone (large nodes
//! are behind `Arc`), carry no behavior beyond a handful of inspection
//! helpers, and are never mutated after construction.

mod descriptor;
mod signature;

pub use descriptor::{
    BigIntFormat, ClassDescriptor, EnumDescriptor, EnumMember, EnumValue, LazyTypeRef,
    NumberBrand, ObjectDescriptor, PropertyDescriptor, SequenceShape, SignConstraint,
    StringDescriptor, TypeDescriptor, UNRESOLVED_NAME_PREFIX, sanitize_type_name,
};
pub use signature::{MethodSignature, ParameterDescriptor, ParameterRole};
