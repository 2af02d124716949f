//! [`CatalogSource`] over the PostgreSQL system catalogs.

use async_trait::async_trait;
use smol_str::SmolStr;
use strata_introspect::{CatalogSource, ColumnRow, ForeignKeyRow, IntrospectResult};
use strata_schema::QualifiedName;
use tokio_postgres::Row;
use tracing::debug;

use crate::error::PgResult;
use crate::pool::PgPool;

/// Catalog queries.
pub mod queries {
    /// Columns of one table in attribute order, with key and index flags.
    ///
    /// `$1` is the schema, `$2` the table. A column is unique when a
    /// single-key-column unique index covers it.
    pub const COLUMNS: &str = "\
        SELECT a.attnum::int4 AS ordinal, \
               a.attname::text AS name, \
               format_type(a.atttypid, a.atttypmod) AS formatted_type, \
               NOT a.attnotnull AS nullable, \
               pg_get_expr(d.adbin, d.adrelid) AS default_expr, \
               COALESCE(bool_or(i.indisprimary), false) AS is_primary, \
               COALESCE(bool_or(i.indisunique AND i.indnkeyatts = 1), false) AS is_unique, \
               COALESCE(( \
                   SELECT array_agg(e.enumlabel::text ORDER BY e.enumsortorder) \
                   FROM pg_enum e \
                   WHERE e.enumtypid = a.atttypid \
                      OR e.enumtypid = (SELECT t.typelem FROM pg_type t WHERE t.oid = a.atttypid) \
               ), '{}'::text[]) AS enum_variants \
        FROM pg_attribute a \
        JOIN pg_class c ON c.oid = a.attrelid \
        JOIN pg_namespace n ON n.oid = c.relnamespace \
        LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
        LEFT JOIN pg_index i ON i.indrelid = a.attrelid AND a.attnum = ANY(i.indkey) \
        WHERE n.nspname = $1 AND c.relname = $2 AND a.attnum > 0 AND NOT a.attisdropped \
        GROUP BY a.attnum, a.attname, a.atttypid, a.atttypmod, a.attnotnull, d.adbin, d.adrelid \
        ORDER BY a.attnum";

    /// Foreign-key constraints whose referenced table is in `$1`, a `text[]`
    /// of `schema.table` names.
    pub const FOREIGN_KEYS: &str = "\
        SELECT con.conname::text AS constraint_name, \
               fn.nspname::text AS from_schema, \
               fc.relname::text AS from_table, \
               con.conkey::int4[] AS from_ordinals, \
               tn.nspname::text AS to_schema, \
               tc.relname::text AS to_table, \
               con.confkey::int4[] AS to_ordinals \
        FROM pg_constraint con \
        JOIN pg_class fc ON fc.oid = con.conrelid \
        JOIN pg_namespace fn ON fn.oid = fc.relnamespace \
        JOIN pg_class tc ON tc.oid = con.confrelid \
        JOIN pg_namespace tn ON tn.oid = tc.relnamespace \
        WHERE con.contype = 'f' AND (tn.nspname || '.' || tc.relname) = ANY($1) \
        ORDER BY fn.nspname, fc.relname, con.conname";

    /// Current column names of a table in `SELECT *` order.
    pub const LIVE_COLUMNS: &str = "\
        SELECT column_name::text \
        FROM information_schema.columns \
        WHERE table_schema = $1 AND table_name = $2 \
        ORDER BY ordinal_position";
}

/// Reads table and constraint metadata from a live database.
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    /// Create a catalog source over a pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_columns(&self, table: &QualifiedName) -> PgResult<Vec<ColumnRow>> {
        let conn = self.pool.get().await?;
        let stmt = conn.prepare_cached(queries::COLUMNS).await?;
        let rows = conn.query(&stmt, &[&table.schema.as_str(), &table.name.as_str()]).await?;
        debug!(table = %table, columns = rows.len(), "Read catalog columns");
        rows.iter().map(column_row).collect()
    }

    async fn load_foreign_keys(&self, tables: &[QualifiedName]) -> PgResult<Vec<ForeignKeyRow>> {
        let names: Vec<String> = tables.iter().map(|t| t.to_string()).collect();
        let conn = self.pool.get().await?;
        let stmt = conn.prepare_cached(queries::FOREIGN_KEYS).await?;
        let rows = conn.query(&stmt, &[&names]).await?;
        debug!(constraints = rows.len(), "Read foreign keys");
        rows.iter().map(foreign_key_row).collect()
    }
}

fn column_row(row: &Row) -> PgResult<ColumnRow> {
    Ok(ColumnRow {
        ordinal: row.try_get("ordinal")?,
        name: row.try_get("name")?,
        formatted_type: row.try_get("formatted_type")?,
        nullable: row.try_get("nullable")?,
        default: row.try_get("default_expr")?,
        is_primary: row.try_get("is_primary")?,
        is_unique: row.try_get("is_unique")?,
        enum_variants: row.try_get("enum_variants")?,
    })
}

fn foreign_key_row(row: &Row) -> PgResult<ForeignKeyRow> {
    let name = |schema: &str, table: &str| -> PgResult<QualifiedName> {
        let schema: String = row.try_get(schema)?;
        let table: String = row.try_get(table)?;
        Ok(QualifiedName::new(SmolStr::new(schema), SmolStr::new(table)))
    };
    Ok(ForeignKeyRow {
        constraint: row.try_get("constraint_name")?,
        from: name("from_schema", "from_table")?,
        from_ordinals: row.try_get("from_ordinals")?,
        to: name("to_schema", "to_table")?,
        to_ordinals: row.try_get("to_ordinals")?,
    })
}

#[async_trait]
impl CatalogSource for PgCatalog {
    async fn columns(&self, table: &QualifiedName) -> IntrospectResult<Vec<ColumnRow>> {
        Ok(self.load_columns(table).await?)
    }

    async fn foreign_keys(&self, tables: &[QualifiedName]) -> IntrospectResult<Vec<ForeignKeyRow>> {
        Ok(self.load_foreign_keys(tables).await?)
    }
}
