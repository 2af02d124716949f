//! Error types for catalog introspection.

#![allow(unused_assignments)]

use miette::Diagnostic;
use strata_schema::SchemaError;
use thiserror::Error;

/// Result type for introspection.
pub type IntrospectResult<T> = Result<T, IntrospectError>;

/// Errors that stop introspection. The first one encountered is returned.
#[derive(Debug, Error, Diagnostic)]
pub enum IntrospectError {
    /// Error from the metadata model or include-spec engine.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    /// Error talking to the catalog source.
    #[error("catalog query failed: {0}")]
    #[diagnostic(code(strata::introspect::database))]
    Database(String),

    /// A configured table has no columns in the catalog.
    #[error("table `{table}` was not found in the catalog")]
    #[diagnostic(
        code(strata::introspect::table_not_found),
        help("check the table name and the configured schema")
    )]
    TableNotFound { table: String },

    /// A table whose primary key spans several columns.
    #[error("table `{table}` has a multi-column primary key ({})", columns.join(", "))]
    #[diagnostic(code(strata::introspect::composite_primary_key))]
    CompositePrimaryKey { table: String, columns: Vec<String> },

    /// A table without a primary key.
    #[error("table `{table}` has no primary key")]
    #[diagnostic(code(strata::introspect::missing_primary_key))]
    MissingPrimaryKey { table: String },

    /// A `belongs_to` entry naming a column the table does not have.
    #[error("table `{table}` has no column `{column}`")]
    #[diagnostic(code(strata::introspect::unknown_column))]
    UnknownColumn { table: String, column: String },

    /// A constraint referring to a column ordinal that was not introspected.
    #[error("constraint `{constraint}` refers to unknown column ordinal {ordinal} of `{table}`")]
    #[diagnostic(code(strata::introspect::unknown_ordinal))]
    UnknownOrdinal {
        constraint: String,
        table: String,
        ordinal: i32,
    },

    /// Two relations of a table resolve to one accessor name.
    #[error("table `{table}` has more than one relation named `{name}`")]
    #[diagnostic(
        code(strata::introspect::duplicate_relation),
        help("set `name` or `inverse_name` on a `belongs_to` entry to disambiguate")
    )]
    DuplicateRelation { table: String, name: String },
}

impl IntrospectError {
    /// Create a catalog transport error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }
}
