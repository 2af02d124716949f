//! The executor seam: batched key lookups and live column order.

use smol_str::SmolStr;
use strata_schema::{QualifiedName, TableMeta};

use crate::error::QueryResult;
use crate::value::{RowKey, Value};

/// Rows of one batch query, each in the table's live column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    /// Number of columns per row as reported by the database.
    pub width: usize,
    /// Row values.
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    /// Create a row set.
    pub fn new(width: usize, rows: Vec<Vec<Value>>) -> Self {
        Self { width, rows }
    }

    /// Check if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// `SELECT * FROM table WHERE key_columns IN keys`.
///
/// Keys are bound as one array parameter per key column, so the statement
/// text depends only on the table and key columns, never on how many keys
/// a batch carries.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchQuery {
    /// Table queried.
    pub table: QualifiedName,
    /// Columns matched against `keys`.
    pub key_columns: Vec<SmolStr>,
    /// Database types of `key_columns`, as the catalog formats them. Needed
    /// to type the arrays of composite keys; empty when unknown.
    pub key_types: Vec<SmolStr>,
    /// Distinct key tuples, each as wide as `key_columns`.
    pub keys: Vec<RowKey>,
    /// Exclude rows where this column is not NULL.
    pub soft_delete: Option<SmolStr>,
}

impl BatchQuery {
    /// Create a query with no soft-delete filter and untyped key columns.
    pub fn new(table: QualifiedName, key_columns: Vec<SmolStr>, keys: Vec<RowKey>) -> Self {
        Self {
            table,
            key_columns,
            key_types: Vec::new(),
            keys,
            soft_delete: None,
        }
    }

    /// Create a query matching `columns` of `table`, typed from its metadata.
    pub fn on(table: &TableMeta, columns: &[usize], keys: Vec<RowKey>) -> Self {
        let mut query = Self::new(
            table.name.clone(),
            columns.iter().map(|c| table.columns[*c].name.clone()).collect(),
            keys,
        );
        query.key_types = columns.iter().map(|c| table.columns[*c].ty.formatted.clone()).collect();
        query
    }

    /// Filter out soft-deleted rows.
    pub fn with_soft_delete(mut self, column: impl Into<SmolStr>) -> Self {
        self.soft_delete = Some(column.into());
        self
    }

    /// PostgreSQL text with one `$n` array placeholder per key column,
    /// numbered like [`params`](Self::params).
    pub fn to_sql(&self) -> String {
        let mut sql = format!("SELECT * FROM {} WHERE ", quote_table(&self.table));

        if self.keys.is_empty() {
            sql.push_str("FALSE");
        } else if let [column] = self.key_columns.as_slice() {
            sql.push_str(&format!("{} = ANY($1)", quote_ident(column)));
        } else {
            let columns: Vec<String> = self.key_columns.iter().map(|c| quote_ident(c)).collect();
            let arrays: Vec<String> = (1..=self.key_columns.len())
                .map(|i| match self.key_types.get(i - 1) {
                    Some(ty) => format!("${}::{}[]", i, ty),
                    None => format!("${}", i),
                })
                .collect();
            sql.push_str(&format!(
                "({}) IN (SELECT * FROM unnest({}))",
                columns.join(", "),
                arrays.join(", ")
            ));
        }

        if let Some(column) = &self.soft_delete {
            sql.push_str(&format!(" AND {} IS NULL", quote_ident(column)));
        }
        sql
    }

    /// One array of key parts per key column. Empty when there are no keys.
    pub fn params(&self) -> Vec<Value> {
        if self.keys.is_empty() {
            return Vec::new();
        }
        (0..self.key_columns.len())
            .map(|column| {
                Value::Array(
                    self.keys
                        .iter()
                        .map(|key| key.get(column).cloned().map_or(Value::Null, Value::from))
                        .collect(),
                )
            })
            .collect()
    }
}

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a qualified table name.
pub fn quote_table(name: &QualifiedName) -> String {
    format!("{}.{}", quote_ident(&name.schema), quote_ident(&name.name))
}

/// Runs the two queries the runtime needs.
#[async_trait::async_trait]
pub trait Executor: Send + Sync {
    /// Run a batch key lookup.
    async fn fetch(&self, query: &BatchQuery) -> QueryResult<RowSet>;

    /// Current column names of a table, in the order `SELECT *` returns them.
    async fn live_columns(&self, table: &QualifiedName) -> QueryResult<Vec<String>>;
}

#[async_trait::async_trait]
impl<X: Executor + ?Sized> Executor for std::sync::Arc<X> {
    async fn fetch(&self, query: &BatchQuery) -> QueryResult<RowSet> {
        (**self).fetch(query).await
    }

    async fn live_columns(&self, table: &QualifiedName) -> QueryResult<Vec<String>> {
        (**self).live_columns(table).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::KeyValue;
    use pretty_assertions::assert_eq;
    use smallvec::smallvec;
    use strata_schema::{ColumnMeta, ScalarType};

    fn posts() -> QualifiedName {
        QualifiedName::new("public", "posts")
    }

    #[test]
    fn test_single_column_sql() {
        let query = BatchQuery::new(
            posts(),
            vec!["author_id".into()],
            vec![smallvec![KeyValue::Int(1)], smallvec![KeyValue::Int(2)]],
        )
        .with_soft_delete("deleted_at");

        assert_eq!(
            query.to_sql(),
            r#"SELECT * FROM "public"."posts" WHERE "author_id" = ANY($1) AND "deleted_at" IS NULL"#
        );
        assert_eq!(query.params(), vec![Value::Array(vec![Value::Int(1), Value::Int(2)])]);
    }

    #[test]
    fn test_composite_sql_is_typed() {
        let table = TableMeta::new(
            posts(),
            vec![
                ColumnMeta::new("id", ScalarType::from_formatted("bigint", vec![])).primary(),
                ColumnMeta::new("org_id", ScalarType::from_formatted("integer", vec![])),
                ColumnMeta::new("slug", ScalarType::from_formatted("character varying(40)", vec![])),
            ],
        )
        .unwrap();
        let query = BatchQuery::on(
            &table,
            &[1, 2],
            vec![
                smallvec![KeyValue::Int(1), KeyValue::Text("a".into())],
                smallvec![KeyValue::Int(1), KeyValue::Text("b".into())],
            ],
        );
        assert_eq!(
            query.to_sql(),
            r#"SELECT * FROM "public"."posts" WHERE ("org_id", "slug") IN (SELECT * FROM unnest($1::integer[], $2::character varying(40)[]))"#
        );
        assert_eq!(
            query.params(),
            vec![
                Value::Array(vec![Value::Int(1), Value::Int(1)]),
                Value::Array(vec![Value::from("a"), Value::from("b")]),
            ]
        );
    }

    #[test]
    fn test_large_batches_bind_one_parameter_per_column() {
        let keys: Vec<RowKey> = (0..70_000).map(|i| smallvec![KeyValue::Int(i)]).collect();
        let large = BatchQuery::new(posts(), vec!["author_id".into()], keys);
        let small = BatchQuery::new(posts(), vec!["author_id".into()], vec![smallvec![KeyValue::Int(1)]]);

        let params = large.params();
        assert_eq!(params.len(), 1);
        assert!(matches!(&params[0], Value::Array(items) if items.len() == 70_000));
        assert_eq!(large.to_sql(), small.to_sql());
        assert!(!large.to_sql().contains("$2"));
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_ident(r#"odd"name"#), r#""odd""name""#);
        let query = BatchQuery::new(posts(), vec!["id".into()], vec![]);
        assert!(query.to_sql().ends_with("WHERE FALSE"));
        assert!(query.params().is_empty());
    }
}
