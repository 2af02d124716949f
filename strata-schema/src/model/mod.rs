//! Resolved table metadata.
//!
//! Everything here is built once at generation time and read-only afterwards.
//! Tables and references live in a single [`Registry`] arena and refer to each
//! other by index, so a cyclic reference graph never needs shared ownership.

mod column;
mod reference;
mod registry;
mod table;

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

pub use column::{ColumnMeta, ScalarKind, ScalarType};
pub use reference::{Cardinality, Direction, Reference, ReferenceOrigin, Relation};
pub use registry::{Registry, RegistryBuilder};
pub use table::TableMeta;

/// Index of a table in its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(pub(crate) u32);

impl TableId {
    /// Position in the registry's table arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a reference in its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferenceId(pub(crate) u32);

impl ReferenceId {
    /// Position in the registry's reference arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a node in a [`SpecGraph`](crate::include::SpecGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpecId(pub(crate) u32);

impl SpecId {
    /// Position in the graph's node arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    /// Database schema (namespace).
    pub schema: SmolStr,
    /// Table name within the schema.
    pub name: SmolStr,
}

impl QualifiedName {
    /// Create a qualified name.
    pub fn new(schema: impl Into<SmolStr>, name: impl Into<SmolStr>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parse `schema.table`, falling back to `default_schema` for a bare name.
    pub fn parse(text: &str, default_schema: &str) -> Self {
        match text.split_once('.') {
            Some((schema, name)) => Self::new(schema, name),
            None => Self::new(default_schema, text),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}
