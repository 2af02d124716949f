//! # strata-schema
//!
//! Table metadata and the include-spec engine for Strata.
//!
//! This crate provides:
//! - The resolved metadata model: [`Registry`], [`TableMeta`], [`ColumnMeta`], [`Reference`]
//! - The include-spec language: parser, canonical printer, binder
//! - Closure specs covering every relation of a table, transitively
//! - The generator configuration types
//!
//! ## Example
//!
//! ```rust
//! use strata_schema::IncludeSpec;
//!
//! let spec = IncludeSpec::parse("posts.{Comments, Author.Profile->bio}").unwrap();
//! // Groups print sorted by alias.
//! assert_eq!(spec.to_string(), "posts.{Author.Profile->bio, Comments}");
//! ```

pub mod config;
pub mod error;
pub mod include;
pub mod model;

pub use config::{BelongsTo, GeneratorConfig, TableConfig};
pub use error::{IncludeSpecErrorKind, SchemaError, SchemaResult};
pub use include::{BoundSpec, IncludeMap, IncludeRelation, IncludeSpec, SpecEdge, SpecGraph, SpecNode};
pub use model::{
    Cardinality, ColumnMeta, Direction, QualifiedName, Reference, ReferenceId, ReferenceOrigin, Registry,
    RegistryBuilder, Relation, ScalarKind, ScalarType, SpecId, TableId, TableMeta,
};
