//! Column plans for partial updates and upserts.
//!
//! Plans only choose columns; statement text is up to the backend.

use strata_schema::{TableId, TableMeta};

use crate::error::{QueryError, QueryResult};
use crate::field_set::FieldSet;

fn check_width(table: &TableMeta, fields: &FieldSet) -> QueryResult<()> {
    if fields.len() != table.width() {
        return Err(QueryError::invalid_field_set(
            table.name.to_string(),
            format!("field set spans {} columns, table has {}", fields.len(), table.width()),
        ));
    }
    Ok(())
}

fn names<'t>(table: &'t TableMeta, columns: &[usize]) -> Vec<&'t str> {
    columns.iter().map(|c| table.columns[*c].name.as_str()).collect()
}

/// Columns written by a partial update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    /// Table updated.
    pub table: TableId,
    /// Column identifying the row.
    pub key_column: usize,
    /// Columns assigned, ascending, with the updated-at column last when present.
    pub set_columns: Vec<usize>,
}

impl UpdatePlan {
    /// Plan an update of the columns in `fields`.
    ///
    /// The primary key must be in the set; it identifies the row and is not
    /// assigned.
    pub fn new(table: &TableMeta, fields: &FieldSet) -> QueryResult<Self> {
        check_width(table, fields)?;
        if !fields.contains(table.primary_key) {
            return Err(QueryError::invalid_field_set(
                table.name.to_string(),
                "the primary key must be set to identify the row",
            )
            .with_field(table.primary_key_column().name.as_str()));
        }

        let mut set_columns: Vec<usize> = fields
            .iter()
            .filter(|c| *c != table.primary_key && Some(*c) != table.updated_at)
            .collect();
        if let Some(updated_at) = table.updated_at {
            set_columns.push(updated_at);
        }
        if set_columns.is_empty() {
            return Err(QueryError::invalid_field_set(table.name.to_string(), "no columns to update"));
        }

        Ok(Self {
            table: table.id,
            key_column: table.primary_key,
            set_columns,
        })
    }

    /// Names of the assigned columns.
    pub fn set_names<'t>(&self, table: &'t TableMeta) -> Vec<&'t str> {
        names(table, &self.set_columns)
    }
}

/// Options for [`UpsertPlan`].
#[derive(Debug, Clone, Default)]
pub struct UpsertOptions {
    /// Conflict target. Defaults to the primary key.
    pub conflict_target: Option<FieldSet>,
    /// Keep the primary key in the update list even when it is part of the
    /// conflict target.
    ///
    /// The update list is the set columns minus the conflict target. A
    /// primary key outside the conflict target is therefore assigned
    /// whenever its bit is set, with or without this flag.
    pub overwrite_primary_key: bool,
}

impl UpsertOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `columns` as the conflict target.
    pub fn conflict_on(mut self, columns: FieldSet) -> Self {
        self.conflict_target = Some(columns);
        self
    }

    /// Assign the primary key on conflict even when it is a conflict column.
    pub fn overwrite_primary_key(mut self) -> Self {
        self.overwrite_primary_key = true;
        self
    }
}

/// Columns of an insert-or-update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertPlan {
    /// Table written.
    pub table: TableId,
    /// Columns inserted, ascending.
    pub insert_columns: Vec<usize>,
    /// Conflict target, ascending.
    pub conflict_columns: Vec<usize>,
    /// Columns assigned when the row exists, ascending.
    pub update_columns: Vec<usize>,
}

impl UpsertPlan {
    /// Plan an upsert of the columns in `fields`.
    pub fn new(table: &TableMeta, fields: &FieldSet, options: &UpsertOptions) -> QueryResult<Self> {
        check_width(table, fields)?;

        let conflict = match &options.conflict_target {
            Some(target) => {
                check_width(table, target)?;
                target.clone()
            }
            None => FieldSet::from_indices(table.width(), [table.primary_key]),
        };
        if conflict.is_empty() {
            return Err(QueryError::invalid_field_set(table.name.to_string(), "empty conflict target"));
        }
        if let Some(missing) = conflict.iter().find(|c| !fields.contains(*c)) {
            return Err(QueryError::invalid_field_set(
                table.name.to_string(),
                "every conflict column must be set",
            )
            .with_field(table.columns[missing].name.as_str()));
        }

        let mut update = fields.difference(&conflict);
        if options.overwrite_primary_key && fields.contains(table.primary_key) {
            update.insert(table.primary_key);
        }

        Ok(Self {
            table: table.id,
            insert_columns: fields.iter().collect(),
            conflict_columns: conflict.iter().collect(),
            update_columns: update.iter().collect(),
        })
    }

    /// Names of the inserted columns.
    pub fn insert_names<'t>(&self, table: &'t TableMeta) -> Vec<&'t str> {
        names(table, &self.insert_columns)
    }

    /// Names of the conflict columns.
    pub fn conflict_names<'t>(&self, table: &'t TableMeta) -> Vec<&'t str> {
        names(table, &self.conflict_columns)
    }

    /// Names of the columns assigned on conflict.
    pub fn update_names<'t>(&self, table: &'t TableMeta) -> Vec<&'t str> {
        names(table, &self.update_columns)
    }
}
