//! PostgreSQL errors and their mapping onto the runtime and introspection
//! error types.

use strata_introspect::IntrospectError;
use strata_query::{ErrorCode, QueryError};
use thiserror::Error;

pub type PgResult<T> = Result<T, PgError>;

#[derive(Error, Debug)]
pub enum PgError {
    #[error("pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Bad URL or pool settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// A column value the driver could not decode.
    #[error("cannot decode {0}")]
    Decode(String),
}

/// SQLSTATE `57014`, raised when `statement_timeout` cancels a query.
const QUERY_CANCELED: &str = "57014";

impl PgError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// The pool gave up waiting, or the server cancelled the statement.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Pool(deadpool_postgres::PoolError::Timeout(_)) => true,
            Self::Postgres(e) => e.code().is_some_and(|state| state.code() == QUERY_CANCELED),
            _ => false,
        }
    }
}

impl From<PgError> for QueryError {
    fn from(err: PgError) -> Self {
        let timeout = err.is_timeout();
        match err {
            PgError::Pool(e) if timeout => QueryError::new(
                ErrorCode::ConnectionTimeout,
                format!("no pooled connection became available: {}", e),
            ),
            PgError::Pool(e) => QueryError::connection(e.to_string()),
            PgError::Postgres(e) if e.is_closed() => QueryError::connection(e.to_string()).with_source(e),
            PgError::Postgres(e) if timeout => QueryError::new(ErrorCode::QueryTimeout, e.to_string()).with_source(e),
            PgError::Postgres(e) => QueryError::database(e.to_string()).with_source(e),
            PgError::Config(msg) => QueryError::configuration(msg),
            PgError::Decode(msg) => QueryError::deserialization(msg),
        }
    }
}

impl From<PgError> for IntrospectError {
    fn from(err: PgError) -> Self {
        IntrospectError::database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_query::ErrorKind;

    #[test]
    fn test_config_error_is_not_timeout() {
        let err = PgError::config("invalid URL");
        assert!(matches!(err, PgError::Config(_)));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_into_query_error() {
        let err: QueryError = PgError::config("missing host").into();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(err.code, ErrorCode::InvalidConfiguration);

        let err: QueryError = PgError::decode("column 'id': bad bytes").into();
        assert_eq!(err.kind(), ErrorKind::Data);
        assert!(err.message.contains("bad bytes"));
    }

    #[test]
    fn test_into_introspect_error() {
        let err: IntrospectError = PgError::decode("int2vector").into();
        assert!(err.to_string().contains("int2vector"));
    }
}
