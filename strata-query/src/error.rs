//! Error types for runtime operations.
//!
//! Error codes follow a pattern: S{category}{number}
//! - 1xxx: Usage errors (not found, include mismatch, invalid field set)
//! - 3xxx: Connection errors (pool, timeout)
//! - 5xxx: Execution errors
//! - 6xxx: Data errors (type, decoding)
//! - 7xxx: Configuration
//! - 9xxx: Internal errors
//!
//! ```rust
//! use strata_query::{ErrorCode, ErrorKind, QueryError};
//!
//! let err = QueryError::not_found("users");
//! assert_eq!(err.code, ErrorCode::RecordNotFound);
//! assert_eq!(err.kind(), ErrorKind::NotFound);
//! assert!(err.to_string().starts_with("[S1001]"));
//! ```

use std::fmt;

use strata_schema::SchemaError;
use thiserror::Error;

/// Result type for runtime operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Stable identifier of a failure, printed as `S{number}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Usage (1xxx)
    /// Record not found (S1001).
    RecordNotFound = 1001,
    /// Include spec could not be parsed or bound (S1003).
    InvalidInclude = 1003,
    /// Include spec rooted at a different table (S1004).
    IncludeMismatch = 1004,
    /// Entity type does not match the table it is bound to (S1005).
    EntityMismatch = 1005,
    /// Field set unusable for the requested write (S1006).
    InvalidFieldSet = 1006,

    // Connection (3xxx)
    /// Database connection failed (S3001).
    ConnectionFailed = 3001,
    /// Connection timeout (S3003).
    ConnectionTimeout = 3003,

    // Execution (5xxx)
    /// Query timeout (S5001).
    QueryTimeout = 5001,
    /// General database error (S5005).
    DatabaseError = 5005,

    // Data (6xxx)
    /// Invalid data type or shape (S6001).
    InvalidDataType = 6001,
    /// Row decoding failed (S6003).
    DeserializationError = 6003,

    // Configuration (7xxx)
    /// Invalid configuration (S7001).
    InvalidConfiguration = 7001,

    // Internal (9xxx)
    /// Internal error (S9001).
    Internal = 9001,
}

impl ErrorCode {
    /// The printed form, e.g. "S1001".
    pub fn code(&self) -> String {
        format!("S{}", self.number())
    }

    /// The numeric part of the code.
    pub fn number(self) -> u16 {
        self as u16
    }

    /// The broad category of the code.
    pub fn kind(&self) -> ErrorKind {
        match self.number() {
            1001 => ErrorKind::NotFound,
            1000..=1999 | 7000..=7999 => ErrorKind::Usage,
            3000..=5999 => ErrorKind::Transport,
            6000..=6999 => ErrorKind::Data,
            _ => ErrorKind::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.number())
    }
}

/// Broad error categories callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A requested record does not exist.
    NotFound,
    /// The caller passed something the operation cannot accept.
    Usage,
    /// The database or its connection failed.
    Transport,
    /// Data did not have the expected shape.
    Data,
    /// A bug.
    Internal,
}

/// Where an error happened and what might fix it. Shown by `{:#}`.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub operation: Option<String>,
    pub table: Option<String>,
    /// Column, relation or Rust field.
    pub field: Option<String>,
    pub sql: Option<String>,
    pub suggestions: Vec<String>,
    pub help: Option<String>,
}

/// A failed runtime operation.
#[derive(Error, Debug)]
pub struct QueryError {
    pub code: ErrorCode,
    pub message: String,
    pub context: ErrorContext,
    /// Driver or schema error this one wraps.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// `{}` prints the code and message; `{:#}` adds the context lines.
impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if !f.alternate() {
            return Ok(());
        }

        let ctx = &self.context;
        let lines = [
            ("while", ctx.operation.as_deref()),
            ("table", ctx.table.as_deref()),
            ("field", ctx.field.as_deref()),
            ("sql", ctx.sql.as_deref()),
            ("help", ctx.help.as_deref()),
        ];
        for (label, value) in lines {
            if let Some(value) = value {
                write!(f, "\n  {}: {}", label, value)?;
            }
        }
        for suggestion in &ctx.suggestions {
            write!(f, "\n  try: {}", suggestion)?;
        }
        Ok(())
    }
}

impl QueryError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Name the operation that failed, e.g. "get" or "load".
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(suggestion.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.context.table = Some(table.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.context.field = Some(field.into());
        self
    }

    /// Attach the statement that failed.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.context.sql = Some(sql.into());
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// No row exists for a requested key.
    pub fn not_found(table: impl Into<String>) -> Self {
        let table = table.into();
        Self::new(
            ErrorCode::RecordNotFound,
            format!("No {} record found for the given key", table),
        )
        .with_table(&table)
        .with_suggestion("Use FetchMode::Lenient to skip missing keys instead of failing")
    }

    /// An include spec applied to records of another table.
    pub fn include_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        let expected = expected.into();
        Self::new(
            ErrorCode::IncludeMismatch,
            format!(
                "Include spec is rooted at {} but the records belong to {}",
                actual.into(),
                expected
            ),
        )
        .with_table(&expected)
    }

    /// An include spec or named include that does not bind.
    pub fn invalid_include(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInclude, message)
    }

    /// A field set that cannot drive the requested write.
    pub fn invalid_field_set(table: impl Into<String>, message: impl Into<String>) -> Self {
        let table = table.into();
        Self::new(
            ErrorCode::InvalidFieldSet,
            format!("Invalid field set for {}: {}", table, message.into()),
        )
        .with_table(&table)
    }

    /// An entity type that disagrees with its table metadata.
    pub fn entity_mismatch(table: impl Into<String>, message: impl Into<String>) -> Self {
        let table = table.into();
        Self::new(
            ErrorCode::EntityMismatch,
            format!("Entity does not match {}: {}", table, message.into()),
        )
        .with_table(&table)
        .with_help("Regenerate the entity definitions after changing the configuration")
    }

    /// The database could not be reached.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConnectionFailed, format!("Cannot reach the database: {}", message.into()))
            .with_suggestion("Check the connection URL and that the server accepts connections")
    }

    /// The database rejected a statement.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// A row whose shape or values do not fit the table metadata.
    pub fn invalid_data_type(table: impl Into<String>, message: impl Into<String>) -> Self {
        let table = table.into();
        Self::new(ErrorCode::InvalidDataType, message).with_table(&table)
    }

    /// A value that cannot be converted to the requested Rust type.
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DeserializationError, format!("Cannot decode value: {}", message.into()))
            .with_suggestion("Regenerate the entity definitions from the current schema")
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message)
    }

    /// A broken internal invariant.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, format!("internal: {}", message.into()))
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::RecordNotFound
    }

    pub fn is_usage(&self) -> bool {
        self.kind() == ErrorKind::Usage
    }

    /// The connection failed or could not be obtained in time.
    pub fn is_connection_error(&self) -> bool {
        matches!(self.code, ErrorCode::ConnectionFailed | ErrorCode::ConnectionTimeout)
    }

    /// Timeouts, which may succeed on a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self.code, ErrorCode::ConnectionTimeout | ErrorCode::QueryTimeout)
    }
}

impl From<SchemaError> for QueryError {
    fn from(err: SchemaError) -> Self {
        QueryError::invalid_include(err.to_string()).with_source(err)
    }
}
