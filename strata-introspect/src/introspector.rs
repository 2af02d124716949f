//! Catalog introspection and reference resolution.

use std::collections::{HashMap, HashSet};

use smol_str::SmolStr;
use strata_schema::{
    Cardinality, ColumnMeta, GeneratorConfig, QualifiedName, Reference, ReferenceOrigin, Registry,
    RegistryBuilder, ScalarType, SchemaError, TableConfig, TableId, TableMeta,
};
use tracing::{debug, info, warn};

use crate::catalog::{CatalogSource, ColumnRow, ForeignKeyRow};
use crate::error::{IntrospectError, IntrospectResult};
use crate::naming;

/// Resolves configured tables against a catalog into a [`Registry`].
pub struct Introspector<S> {
    source: S,
    config: GeneratorConfig,
}

/// A reference before accessor names are assigned.
#[derive(Debug, Clone)]
struct PendingReference {
    from: TableId,
    fk_columns: Vec<usize>,
    to: TableId,
    key_columns: Vec<usize>,
    one_to_one: bool,
    nullable: bool,
    origin: ReferenceOrigin,
    name: Option<SmolStr>,
    inverse_name: Option<SmolStr>,
}

#[derive(Debug, Clone)]
struct Accessor {
    name: SmolStr,
    /// Set explicitly by configuration; never renamed on a clash.
    fixed: bool,
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Forward,
    Inverse,
}

/// Per-table state gathered while reading columns.
struct Resolved<'c> {
    id: TableId,
    config: &'c TableConfig,
    ordinals: HashMap<i32, usize>,
}

impl<S: CatalogSource> Introspector<S> {
    /// Create an introspector over a catalog source.
    pub fn new(source: S, config: GeneratorConfig) -> Self {
        Self { source, config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Read every configured table, resolve references and build the registry.
    pub async fn introspect(&self) -> IntrospectResult<Registry> {
        let mut builder = Registry::builder();
        let mut resolved: Vec<Resolved<'_>> = Vec::with_capacity(self.config.tables.len());

        for table_config in &self.config.tables {
            let name = table_config.qualified_name(&self.config.schema);
            let rows = self.source.columns(&name).await?;
            let (meta, ordinals) = self.resolve_table(name, rows)?;
            info!(table = %meta.name, columns = meta.width(), "Introspected table");

            let id = builder.add_table(meta)?;
            resolved.push(Resolved {
                id,
                config: table_config,
                ordinals,
            });
        }

        let names: Vec<QualifiedName> = resolved
            .iter()
            .map(|r| builder.table(r.id).name.clone())
            .collect();
        let foreign_keys = self.source.foreign_keys(&names).await?;

        let mut pending = Vec::new();
        for fk in &foreign_keys {
            if let Some(reference) = self.infer_reference(&builder, &resolved, fk)? {
                pending.push(reference);
            }
        }
        for entry in &resolved {
            self.merge_overrides(&builder, entry, &mut pending)?;
        }

        let ids: Vec<TableId> = resolved.iter().map(|r| r.id).collect();
        let accessors = assign_names(&builder, &ids, &pending)?;

        for (reference, (name, inverse_name)) in pending.into_iter().zip(accessors) {
            let cardinality = if reference.one_to_one {
                Cardinality::OneToOne
            } else {
                Cardinality::OneToMany
            };
            builder.add_reference(
                Reference::new(reference.from, reference.fk_columns, reference.to, reference.key_columns)
                    .with_cardinality(cardinality)
                    .with_nullable(reference.nullable)
                    .with_names(name, inverse_name)
                    .with_origin(reference.origin),
            )?;
        }

        for entry in &resolved {
            for (name, text) in &entry.config.includes {
                builder.add_include(entry.id, name.as_str(), text.as_str());
            }
        }

        let registry = builder.build()?;
        info!(
            tables = registry.tables().len(),
            references = registry.references().len(),
            "Introspection complete"
        );
        Ok(registry)
    }

    fn resolve_table(
        &self,
        name: QualifiedName,
        rows: Vec<ColumnRow>,
    ) -> IntrospectResult<(TableMeta, HashMap<i32, usize>)> {
        if rows.is_empty() {
            return Err(IntrospectError::TableNotFound {
                table: name.to_string(),
            });
        }

        let primary: Vec<&ColumnRow> = rows.iter().filter(|r| r.is_primary).collect();
        match primary.len() {
            0 => {
                return Err(IntrospectError::MissingPrimaryKey {
                    table: name.to_string(),
                });
            }
            1 => {}
            _ => {
                return Err(IntrospectError::CompositePrimaryKey {
                    table: name.to_string(),
                    columns: primary.iter().map(|r| r.name.clone()).collect(),
                });
            }
        }

        let mut ordinals = HashMap::with_capacity(rows.len());
        let mut columns = Vec::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            ordinals.insert(row.ordinal, index);
            columns.push(column_meta(row));
        }

        let mut meta = TableMeta::new(name, columns)?;
        if meta.column(&self.config.soft_delete_column).is_some() {
            meta = meta.with_soft_delete(&self.config.soft_delete_column)?;
        }
        if meta.column(&self.config.created_at_column).is_some() {
            meta = meta.with_created_at(&self.config.created_at_column)?;
        }
        if meta.column(&self.config.updated_at_column).is_some() {
            meta = meta.with_updated_at(&self.config.updated_at_column)?;
        }
        Ok((meta, ordinals))
    }

    fn infer_reference(
        &self,
        builder: &RegistryBuilder,
        resolved: &[Resolved<'_>],
        fk: &ForeignKeyRow,
    ) -> IntrospectResult<Option<PendingReference>> {
        let find = |name: &QualifiedName| {
            builder
                .table_id(name)
                .and_then(|id| resolved.iter().find(|r| r.id == id))
        };
        let (Some(from), Some(to)) = (find(&fk.from), find(&fk.to)) else {
            warn!(
                constraint = %fk.constraint,
                from = %fk.from,
                to = %fk.to,
                "Skipping foreign key to or from an unconfigured table"
            );
            return Ok(None);
        };
        if !from.config.infer_foreign_keys {
            debug!(constraint = %fk.constraint, table = %fk.from, "Foreign key inference disabled");
            return Ok(None);
        }

        let map = |entry: &Resolved<'_>, ordinals: &[i32]| -> IntrospectResult<Vec<usize>> {
            ordinals
                .iter()
                .map(|ordinal| {
                    entry
                        .ordinals
                        .get(ordinal)
                        .copied()
                        .ok_or_else(|| IntrospectError::UnknownOrdinal {
                            constraint: fk.constraint.clone(),
                            table: builder.table(entry.id).name.to_string(),
                            ordinal: *ordinal,
                        })
                })
                .collect()
        };
        let fk_columns = map(from, &fk.from_ordinals)?;
        let key_columns = map(to, &fk.to_ordinals)?;

        let table = builder.table(from.id);
        let nullable = fk_columns.iter().any(|c| table.columns[*c].nullable);
        let one_to_one = matches!(fk_columns.as_slice(), [c] if table.columns[*c].is_unique_key());

        debug!(constraint = %fk.constraint, from = %fk.from, to = %fk.to, one_to_one, "Inferred reference");
        Ok(Some(PendingReference {
            from: from.id,
            fk_columns,
            to: to.id,
            key_columns,
            one_to_one,
            nullable,
            origin: ReferenceOrigin::ForeignKey(fk.constraint.as_str().into()),
            name: None,
            inverse_name: None,
        }))
    }

    /// Apply a table's `belongs_to` entries. An entry matching an inferred
    /// reference (same column and target) updates it in place.
    fn merge_overrides(
        &self,
        builder: &RegistryBuilder,
        entry: &Resolved<'_>,
        pending: &mut Vec<PendingReference>,
    ) -> IntrospectResult<()> {
        let table = builder.table(entry.id);
        for belongs_to in &entry.config.belongs_to {
            let target = QualifiedName::parse(&belongs_to.table, &self.config.schema);
            let to = builder
                .table_id(&target)
                .ok_or_else(|| SchemaError::unknown_table(target.to_string()))?;
            let column = table
                .column_index(&belongs_to.column)
                .ok_or_else(|| IntrospectError::UnknownColumn {
                    table: table.name.to_string(),
                    column: belongs_to.column.clone(),
                })?;
            let meta = &table.columns[column];
            let name = belongs_to.name.as_deref().map(SmolStr::from);
            let inverse_name = belongs_to.inverse_name.as_deref().map(SmolStr::from);

            if let Some(existing) = pending
                .iter_mut()
                .find(|p| p.from == entry.id && p.to == to && p.fk_columns == [column])
            {
                existing.one_to_one |= belongs_to.one_to_one;
                existing.name = name.or(existing.name.take());
                existing.inverse_name = inverse_name.or(existing.inverse_name.take());
                continue;
            }

            pending.push(PendingReference {
                from: entry.id,
                fk_columns: vec![column],
                to,
                key_columns: vec![builder.table(to).primary_key],
                one_to_one: belongs_to.one_to_one || meta.is_unique_key(),
                nullable: meta.nullable,
                origin: ReferenceOrigin::Declared,
                name,
                inverse_name,
            });
        }
        Ok(())
    }
}

fn column_meta(row: ColumnRow) -> ColumnMeta {
    let variants = row.enum_variants.into_iter().map(SmolStr::from).collect();
    let mut column =
        ColumnMeta::new(row.name, ScalarType::from_formatted(&row.formatted_type, variants)).with_attnum(row.ordinal);
    if row.is_primary {
        column = column.primary();
    }
    if row.is_unique {
        column = column.unique();
    }
    if row.nullable {
        column = column.nullable();
    }
    if row.default.is_some() {
        column = column.with_default();
    }
    column
}

/// Pick accessor names for every pending reference.
///
/// Defaults are type names. Where two non-fixed accessors of one table
/// collide, both switch to the FK-column form. A collision that survives
/// that is an error.
fn assign_names(
    builder: &RegistryBuilder,
    tables: &[TableId],
    pending: &[PendingReference],
) -> IntrospectResult<Vec<(SmolStr, SmolStr)>> {
    let mut accessors: Vec<[Accessor; 2]> = pending
        .iter()
        .map(|p| {
            let forward = match &p.name {
                Some(name) => Accessor { name: name.clone(), fixed: true },
                None => Accessor { name: naming::forward(builder.table(p.to)), fixed: false },
            };
            let inverse = match &p.inverse_name {
                Some(name) => Accessor { name: name.clone(), fixed: true },
                None => Accessor { name: naming::inverse(builder.table(p.from)), fixed: false },
            };
            [forward, inverse]
        })
        .collect();

    for table in tables {
        let slots = slots_of(*table, pending);
        let mut counts: HashMap<SmolStr, usize> = HashMap::new();
        for (index, side) in &slots {
            *counts.entry(accessors[*index][*side as usize].name.clone()).or_default() += 1;
        }

        for (index, side) in slots {
            let accessor = &accessors[index][side as usize];
            if accessor.fixed || counts.get(&accessor.name).copied().unwrap_or(0) < 2 {
                continue;
            }
            let reference = &pending[index];
            let source = builder.table(reference.from);
            let renamed = match side {
                Side::Forward => naming::forward_by_column(source, &reference.fk_columns),
                Side::Inverse => naming::inverse_by_column(source, &reference.fk_columns),
            };
            debug!(table = %builder.table(*table).name, from = %accessor.name, to = %renamed, "Disambiguated accessor");
            accessors[index][side as usize].name = renamed;
        }
    }

    for table in tables {
        let mut seen = HashSet::new();
        for (index, side) in slots_of(*table, pending) {
            let name = &accessors[index][side as usize].name;
            if !seen.insert(name.clone()) {
                return Err(IntrospectError::DuplicateRelation {
                    table: builder.table(*table).name.to_string(),
                    name: name.to_string(),
                });
            }
        }
    }

    Ok(accessors
        .into_iter()
        .map(|[forward, inverse]| (forward.name, inverse.name))
        .collect())
}

/// Accessors visible on `table`: forward names of references it holds, then
/// inverse names of references pointing at it.
fn slots_of(table: TableId, pending: &[PendingReference]) -> Vec<(usize, Side)> {
    let outgoing = pending
        .iter()
        .enumerate()
        .filter(|(_, p)| p.from == table)
        .map(|(i, _)| (i, Side::Forward));
    let incoming = pending
        .iter()
        .enumerate()
        .filter(|(_, p)| p.to == table)
        .map(|(i, _)| (i, Side::Inverse));
    outgoing.chain(incoming).collect()
}
