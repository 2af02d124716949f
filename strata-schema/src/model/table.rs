//! Table metadata.

use convert_case::{Case, Casing};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{ColumnMeta, QualifiedName, ReferenceId, SpecId, TableId};
use crate::error::{SchemaError, SchemaResult};

/// A resolved table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    /// Arena index, assigned by the registry builder.
    pub id: TableId,
    /// Qualified name.
    pub name: QualifiedName,
    /// Columns in generation-time order.
    pub columns: Vec<ColumnMeta>,
    /// Index of the single primary-key column.
    pub primary_key: usize,
    /// References this table holds the FK for.
    pub outgoing: Vec<ReferenceId>,
    /// References pointing at this table.
    pub incoming: Vec<ReferenceId>,
    /// Soft-delete marker column.
    pub soft_delete: Option<usize>,
    /// Creation timestamp column.
    pub created_at: Option<usize>,
    /// Modification timestamp column.
    pub updated_at: Option<usize>,
    /// Root of this table's closure in the registry's spec graph.
    pub all_include: SpecId,
    /// Named custom include specs, bound into the registry's spec graph.
    pub includes: IndexMap<SmolStr, SpecId>,
}

impl TableMeta {
    /// Create table metadata, assigning column indices.
    ///
    /// Fails unless exactly one column is marked primary.
    pub fn new(name: QualifiedName, mut columns: Vec<ColumnMeta>) -> SchemaResult<Self> {
        for (index, column) in columns.iter_mut().enumerate() {
            column.index = index;
        }

        let mut primary = columns.iter().filter(|c| c.is_primary).map(|c| c.index);
        let primary_key = match (primary.next(), primary.next()) {
            (Some(pk), None) => pk,
            (None, _) => {
                return Err(SchemaError::invalid_table(
                    name.to_string(),
                    "a primary key column is required",
                ));
            }
            (Some(_), Some(_)) => {
                return Err(SchemaError::invalid_table(
                    name.to_string(),
                    "multi-column primary keys are not supported",
                ));
            }
        };

        Ok(Self {
            id: TableId(0),
            name,
            columns,
            primary_key,
            outgoing: Vec::new(),
            incoming: Vec::new(),
            soft_delete: None,
            created_at: None,
            updated_at: None,
            all_include: SpecId(0),
            includes: IndexMap::new(),
        })
    }

    /// Mark the soft-delete column by name.
    pub fn with_soft_delete(mut self, column: &str) -> SchemaResult<Self> {
        self.soft_delete = Some(self.require_column(column)?);
        Ok(self)
    }

    /// Mark the created-at column by name.
    pub fn with_created_at(mut self, column: &str) -> SchemaResult<Self> {
        self.created_at = Some(self.require_column(column)?);
        Ok(self)
    }

    /// Mark the updated-at column by name.
    pub fn with_updated_at(mut self, column: &str) -> SchemaResult<Self> {
        self.updated_at = Some(self.require_column(column)?);
        Ok(self)
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column(name).map(|c| c.index)
    }

    /// Index of a column by name, or an unknown-column error.
    pub fn require_column(&self, name: &str) -> SchemaResult<usize> {
        self.column_index(name)
            .ok_or_else(|| SchemaError::unknown_column(self.name.to_string(), name))
    }

    /// The primary-key column.
    pub fn primary_key_column(&self) -> &ColumnMeta {
        &self.columns[self.primary_key]
    }

    /// Column names in generation-time order.
    pub fn column_names(&self) -> impl Iterator<Item = &SmolStr> {
        self.columns.iter().map(|c| &c.name)
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Type name for generated code: `blog_posts` becomes `BlogPosts`.
    pub fn type_name(&self) -> String {
        self.name.name.to_case(Case::Pascal)
    }
}
