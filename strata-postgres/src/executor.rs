//! [`Executor`] over a PostgreSQL pool.

use async_trait::async_trait;
use postgres_types::ToSql;
use strata_query::{BatchQuery, Executor, QueryError, QueryResult, RowSet};
use strata_schema::QualifiedName;
use tracing::debug;

use crate::catalog::queries;
use crate::error::PgResult;
use crate::pool::PgPool;
use crate::value::{decode_row, params};

/// Runs batch lookups with cached prepared statements.
#[derive(Debug, Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    /// Create an executor over a pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn run(&self, query: &BatchQuery, sql: &str) -> PgResult<RowSet> {
        let values = query.params();
        let bound = params(&values);
        let refs: Vec<&(dyn ToSql + Sync)> = bound.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let conn = self.pool.get().await?;
        let stmt = conn.prepare_cached(sql).await?;
        let rows = conn.query(&stmt, &refs).await?;

        let width = stmt.columns().len();
        let rows = rows.iter().map(decode_row).collect::<PgResult<Vec<_>>>()?;
        Ok(RowSet::new(width, rows))
    }

    async fn columns_of(&self, table: &QualifiedName) -> PgResult<Vec<String>> {
        let conn = self.pool.get().await?;
        let stmt = conn.prepare_cached(queries::LIVE_COLUMNS).await?;
        let rows = conn.query(&stmt, &[&table.schema.as_str(), &table.name.as_str()]).await?;
        rows.iter().map(|row| Ok(row.try_get(0)?)).collect()
    }
}

#[async_trait]
impl Executor for PgExecutor {
    async fn fetch(&self, query: &BatchQuery) -> QueryResult<RowSet> {
        let sql = query.to_sql();
        debug!(sql = %sql, params = query.keys.len(), "Executing batch query");
        self.run(query, &sql)
            .await
            .map_err(|e| QueryError::from(e).with_sql(&sql).with_table(query.table.to_string()))
    }

    async fn live_columns(&self, table: &QualifiedName) -> QueryResult<Vec<String>> {
        debug!(table = %table, "Reading live column order");
        Ok(self.columns_of(table).await?)
    }
}
