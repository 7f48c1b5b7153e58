//! Schema graph construction.
//!
//! ## Components
//!
//! - [`TypeBuilder`] - descriptor-to-type compilation with name-keyed
//!   memoization and cycle breaking
//! - [`SchemaAssembler`] - root-type construction, directive passes,
//!   fragment merging, and final schema materialization
//! - [`SchemaDirective`] - schema-level rewrite passes over field
//!   specifications

pub mod directives;
mod assembler;
mod types;

pub use assembler::{SchemaAssembler, SchemaConfig, SchemaFragment};
pub use directives::{
    ArgumentSpec, DynSchemaDirective, FieldLocation, FieldSpec, SchemaDirective,
    SubscriptionFieldSpec,
};
pub use types::{TypeBuilder, TypeRegistry};
