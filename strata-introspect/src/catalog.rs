//! The catalog source seam and its raw rows.

use std::collections::HashMap;

use strata_schema::QualifiedName;

use crate::error::IntrospectResult;

/// Raw column information from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRow {
    /// Catalog ordinal. May be sparse after dropped columns.
    pub ordinal: i32,
    /// Column name.
    pub name: String,
    /// Type as the database formats it, e.g. `character varying(40)` or `text[]`.
    pub formatted_type: String,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Default expression, if any.
    pub default: Option<String>,
    /// Whether the column is part of the primary key.
    pub is_primary: bool,
    /// Whether a single-column unique index covers the column.
    pub is_unique: bool,
    /// Labels when the column (or its element) is an enum.
    pub enum_variants: Vec<String>,
}

impl ColumnRow {
    /// Create a non-null column row.
    pub fn new(ordinal: i32, name: impl Into<String>, formatted_type: impl Into<String>) -> Self {
        Self {
            ordinal,
            name: name.into(),
            formatted_type: formatted_type.into(),
            nullable: false,
            default: None,
            is_primary: false,
            is_unique: false,
            enum_variants: Vec::new(),
        }
    }

    /// Mark as primary key.
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    /// Mark as unique.
    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    /// Mark as nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Set the default expression.
    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    /// Set the enum labels.
    pub fn enum_variants(mut self, variants: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.enum_variants = variants.into_iter().map(Into::into).collect();
        self
    }
}

/// A foreign-key constraint, by column ordinals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyRow {
    /// Constraint name.
    pub constraint: String,
    /// Referencing table.
    pub from: QualifiedName,
    /// Referencing column ordinals.
    pub from_ordinals: Vec<i32>,
    /// Referenced table.
    pub to: QualifiedName,
    /// Referenced column ordinals, parallel to `from_ordinals`.
    pub to_ordinals: Vec<i32>,
}

/// Trait for reading table and constraint metadata from a database catalog.
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// Columns of a table in ordinal order. Empty when the table does not exist.
    async fn columns(&self, table: &QualifiedName) -> IntrospectResult<Vec<ColumnRow>>;

    /// Foreign-key constraints whose referenced table is one of `tables`.
    async fn foreign_keys(&self, tables: &[QualifiedName]) -> IntrospectResult<Vec<ForeignKeyRow>>;
}

/// A catalog held in memory, for offline generation and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    tables: HashMap<QualifiedName, Vec<ColumnRow>>,
    foreign_keys: Vec<ForeignKeyRow>,
}

impl MemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table.
    pub fn table(mut self, name: QualifiedName, columns: Vec<ColumnRow>) -> Self {
        self.tables.insert(name, columns);
        self
    }

    /// Add a foreign key between two tables, by column name.
    ///
    /// Unknown names produce ordinal `-1`, which introspection rejects.
    pub fn foreign_key(
        mut self,
        constraint: impl Into<String>,
        from: QualifiedName,
        from_columns: &[&str],
        to: QualifiedName,
        to_columns: &[&str],
    ) -> Self {
        let from_ordinals = self.ordinals(&from, from_columns);
        let to_ordinals = self.ordinals(&to, to_columns);
        self.foreign_keys.push(ForeignKeyRow {
            constraint: constraint.into(),
            from,
            from_ordinals,
            to,
            to_ordinals,
        });
        self
    }

    fn ordinals(&self, table: &QualifiedName, columns: &[&str]) -> Vec<i32> {
        let rows = self.tables.get(table);
        columns
            .iter()
            .map(|name| {
                rows.and_then(|rows| rows.iter().find(|r| r.name == *name))
                    .map_or(-1, |r| r.ordinal)
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl CatalogSource for MemoryCatalog {
    async fn columns(&self, table: &QualifiedName) -> IntrospectResult<Vec<ColumnRow>> {
        let mut rows = self.tables.get(table).cloned().unwrap_or_default();
        rows.sort_by_key(|r| r.ordinal);
        Ok(rows)
    }

    async fn foreign_keys(&self, tables: &[QualifiedName]) -> IntrospectResult<Vec<ForeignKeyRow>> {
        Ok(self
            .foreign_keys
            .iter()
            .filter(|fk| tables.contains(&fk.to))
            .cloned()
            .collect())
    }
}
