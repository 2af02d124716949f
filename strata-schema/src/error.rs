//! Error types for metadata resolution and include specs.

// miette's derive reads the span and source fields.
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Why an include spec failed to parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IncludeSpecErrorKind {
    /// Nothing but whitespace.
    #[error("include spec is empty")]
    Empty,
    /// The first token cannot start an identifier.
    #[error("include spec must start with a table identifier")]
    InvalidStart,
    /// Tokens left over after a complete spec.
    #[error("unexpected trailing input")]
    TrailingInput,
    /// A `.` with nothing usable after it.
    #[error("`.` must be followed by a relation or a `{{...}}` group")]
    DanglingDot,
    /// `{}` with no relations inside.
    #[error("empty relation group")]
    EmptyGroup,
    /// A `{` that is never closed.
    #[error("unterminated relation group, expected `,` or `}}`")]
    UnterminatedGroup,
    /// A `"` that is never closed.
    #[error("unterminated quoted identifier")]
    UnterminatedQuote,
    /// `->` where only a plain identifier is legal.
    #[error("a rename is not allowed here")]
    MisplacedRename,
    /// A token that is not an identifier where one is required.
    #[error("expected an identifier")]
    ExpectedIdentifier,
    /// The same key twice in one group.
    #[error("relation `{0}` appears more than once in the same group")]
    DuplicateRelation(String),
}

/// Errors that can occur while resolving metadata or include specs.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    /// Error reading a file.
    #[error("failed to read file: {path}")]
    #[diagnostic(code(strata::schema::io_error))]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Syntax error in an include spec.
    #[error("invalid include spec: {kind}")]
    #[diagnostic(code(strata::schema::include_syntax))]
    IncludeSyntax {
        #[source_code]
        src: String,
        #[label("here")]
        span: miette::SourceSpan,
        kind: IncludeSpecErrorKind,
    },

    /// A table that is not part of the registry.
    #[error("unknown table `{name}`")]
    #[diagnostic(
        code(strata::schema::unknown_table),
        help("add the table to the generator configuration")
    )]
    UnknownTable { name: String },

    /// A relation name that the table does not expose.
    #[error("table `{table}` has no relation named `{relation}`")]
    #[diagnostic(code(strata::schema::unknown_relation))]
    UnknownRelation { table: String, relation: String },

    /// A column that the table does not have.
    #[error("table `{table}` has no column named `{column}`")]
    #[diagnostic(code(strata::schema::unknown_column))]
    UnknownColumn { table: String, column: String },

    /// Two relations of a table share one accessor name.
    #[error("table `{table}` has more than one relation named `{name}`")]
    #[diagnostic(
        code(strata::schema::duplicate_relation),
        help("set `name` or `inverse_name` on a `belongs_to` entry to disambiguate")
    )]
    DuplicateRelation { table: String, name: String },

    /// A table registered twice.
    #[error("table `{name}` is registered more than once")]
    #[diagnostic(code(strata::schema::duplicate_table))]
    DuplicateTable { name: String },

    /// Structurally invalid table metadata.
    #[error("invalid table `{table}`: {message}")]
    #[diagnostic(code(strata::schema::invalid_table))]
    InvalidTable { table: String, message: String },

    /// Structurally invalid reference metadata.
    #[error("invalid reference `{name}`: {message}")]
    #[diagnostic(code(strata::schema::invalid_reference))]
    InvalidReference { name: String, message: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    #[diagnostic(code(strata::schema::config_error))]
    ConfigError { message: String },

    /// TOML parsing error.
    #[error("failed to parse TOML")]
    #[diagnostic(code(strata::schema::toml_error))]
    TomlError {
        #[source]
        source: toml::de::Error,
    },
}

impl SchemaError {
    /// Create an include spec syntax error covering `start..end` of `src`.
    pub fn include_syntax(
        src: impl Into<String>,
        start: usize,
        end: usize,
        kind: IncludeSpecErrorKind,
    ) -> Self {
        Self::IncludeSyntax {
            src: src.into(),
            span: (start, end.saturating_sub(start)).into(),
            kind,
        }
    }

    /// Create an unknown table error.
    pub fn unknown_table(name: impl Into<String>) -> Self {
        Self::UnknownTable { name: name.into() }
    }

    /// Create an unknown relation error.
    pub fn unknown_relation(table: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::UnknownRelation {
            table: table.into(),
            relation: relation.into(),
        }
    }

    /// Create an unknown column error.
    pub fn unknown_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::UnknownColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Create an invalid table error.
    pub fn invalid_table(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTable {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// The parse failure kind, if this is an include spec syntax error.
    pub fn include_error_kind(&self) -> Option<&IncludeSpecErrorKind> {
        match self {
            Self::IncludeSyntax { kind, .. } => Some(kind),
            _ => None,
        }
    }
}
