//! Generator configuration: which tables to expose and how to relate them.
//!
//! ```toml
//! schema = "public"
//!
//! [[tables]]
//! name = "posts"
//! includes = { with_author = "posts.Author" }
//!
//! [[tables.belongs_to]]
//! table = "users"
//! column = "editor_id"
//! name = "Editor"
//! inverse_name = "EditedPosts"
//! ```

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};
use crate::model::QualifiedName;

/// Top-level generator configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Schema used for unqualified table names.
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Column name marking soft-deleted rows.
    #[serde(default = "default_soft_delete_column")]
    pub soft_delete_column: String,

    /// Column name holding the creation timestamp.
    #[serde(default = "default_created_at_column")]
    pub created_at_column: String,

    /// Column name holding the modification timestamp.
    #[serde(default = "default_updated_at_column")]
    pub updated_at_column: String,

    /// Tables to expose.
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            soft_delete_column: default_soft_delete_column(),
            created_at_column: default_created_at_column(),
            updated_at_column: default_updated_at_column(),
            tables: Vec::new(),
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_soft_delete_column() -> String {
    "deleted_at".to_string()
}

fn default_created_at_column() -> String {
    "created_at".to_string()
}

fn default_updated_at_column() -> String {
    "updated_at".to_string()
}

impl GeneratorConfig {
    /// Create an empty configuration for `schema`.
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SchemaError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> SchemaResult<Self> {
        let expanded = expand_env_vars(content)?;
        let config: Self =
            toml::from_str(&expanded).map_err(|e| SchemaError::TomlError { source: e })?;
        config.validate()?;
        Ok(config)
    }

    /// Add a table.
    pub fn table(mut self, table: TableConfig) -> Self {
        self.tables.push(table);
        self
    }

    /// Set the soft-delete column name.
    pub fn soft_delete_column(mut self, column: impl Into<String>) -> Self {
        self.soft_delete_column = column.into();
        self
    }

    /// Look up a table entry by qualified name.
    pub fn find_table(&self, name: &QualifiedName) -> Option<&TableConfig> {
        self.tables.iter().find(|t| &t.qualified_name(&self.schema) == name)
    }

    /// Check that no table is listed twice.
    pub fn validate(&self) -> SchemaResult<()> {
        for (i, table) in self.tables.iter().enumerate() {
            let name = table.qualified_name(&self.schema);
            if self.tables[..i]
                .iter()
                .any(|other| other.qualified_name(&self.schema) == name)
            {
                return Err(SchemaError::config(format!("table `{}` is listed twice", name)));
            }
        }
        Ok(())
    }
}

/// Per-table configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    /// Table name, optionally `schema.table`.
    pub name: String,

    /// Infer references from this table's foreign-key constraints.
    #[serde(default = "default_true")]
    pub infer_foreign_keys: bool,

    /// Explicit references from this table.
    #[serde(default)]
    pub belongs_to: Vec<BelongsTo>,

    /// Named custom include specs rooted at this table.
    #[serde(default)]
    pub includes: IndexMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl TableConfig {
    /// Create a table entry with FK inference enabled.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            infer_foreign_keys: true,
            belongs_to: Vec::new(),
            includes: IndexMap::new(),
        }
    }

    /// Suppress FK inference for this table.
    pub fn without_fk_inference(mut self) -> Self {
        self.infer_foreign_keys = false;
        self
    }

    /// Add an explicit reference.
    pub fn belongs_to(mut self, relation: BelongsTo) -> Self {
        self.belongs_to.push(relation);
        self
    }

    /// Add a named include spec.
    pub fn include(mut self, name: impl Into<String>, spec: impl Into<String>) -> Self {
        self.includes.insert(name.into(), spec.into());
        self
    }

    /// Resolve the qualified name.
    pub fn qualified_name(&self, default_schema: &str) -> QualifiedName {
        QualifiedName::parse(&self.name, default_schema)
    }
}

/// An explicit reference: this table's `column` points at `table`'s primary key.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BelongsTo {
    /// Referenced table, optionally `schema.table`.
    pub table: String,

    /// Local FK column.
    pub column: String,

    /// Treat the reference as one-to-one.
    #[serde(default)]
    pub one_to_one: bool,

    /// Accessor name on this table.
    #[serde(default)]
    pub name: Option<String>,

    /// Accessor name on the referenced table.
    #[serde(default)]
    pub inverse_name: Option<String>,
}

impl BelongsTo {
    /// Create a reference override.
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            one_to_one: false,
            name: None,
            inverse_name: None,
        }
    }

    /// Mark as one-to-one.
    pub fn one_to_one(mut self) -> Self {
        self.one_to_one = true;
        self
    }

    /// Set the accessor name on this table.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the accessor name on the referenced table.
    pub fn inverse_named(mut self, name: impl Into<String>) -> Self {
        self.inverse_name = Some(name.into());
        self
    }
}

/// Expand `${VAR}` references from the environment. Unset variables are an error.
fn expand_env_vars(content: &str) -> SchemaResult<String> {
    let re = regex_lite::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| SchemaError::config(e.to_string()))?;

    let mut result = String::with_capacity(content.len());
    let mut last = 0;
    for cap in re.captures_iter(content) {
        let (Some(full), Some(var)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let value = std::env::var(var.as_str()).map_err(|_| {
            SchemaError::config(format!("environment variable `{}` is not set", var.as_str()))
        })?;
        result.push_str(&content[last..full.start()]);
        result.push_str(&value);
        last = full.end();
    }
    result.push_str(&content[last..]);
    Ok(result)
}
