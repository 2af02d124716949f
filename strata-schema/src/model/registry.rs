//! The table registry.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::debug;

use super::{Direction, QualifiedName, Reference, ReferenceId, Relation, SpecId, TableId, TableMeta};
use crate::error::{SchemaError, SchemaResult};
use crate::include::{BoundSpec, IncludeSpec, SpecGraph, build_closure};

/// Arena owning every resolved table and reference.
///
/// References are stored once and shared by both endpoint tables through
/// their `outgoing`/`incoming` id lists.
#[derive(Debug, Clone)]
pub struct Registry {
    tables: Vec<TableMeta>,
    references: Vec<Reference>,
    by_name: IndexMap<QualifiedName, TableId>,
    specs: Arc<SpecGraph>,
}

impl Registry {
    /// Start building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// All tables in registration order.
    pub fn tables(&self) -> &[TableMeta] {
        &self.tables
    }

    /// A table by id.
    pub fn table(&self, id: TableId) -> &TableMeta {
        &self.tables[id.index()]
    }

    /// All references.
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// A reference by id.
    pub fn reference(&self, id: ReferenceId) -> &Reference {
        &self.references[id.index()]
    }

    /// Look up a table by qualified name.
    pub fn table_id(&self, name: &QualifiedName) -> Option<TableId> {
        self.by_name.get(name).copied()
    }

    /// Resolve an identifier written in an include spec or an entity binding.
    ///
    /// Accepts `schema.table` or a bare table name that is unique across schemas.
    pub fn resolve_table(&self, ident: &str) -> SchemaResult<TableId> {
        if let Some((schema, name)) = ident.split_once('.') {
            return self
                .table_id(&QualifiedName::new(schema, name))
                .ok_or_else(|| SchemaError::unknown_table(ident));
        }

        let mut matches = self.by_name.iter().filter(|(name, _)| name.name == ident);
        match (matches.next(), matches.next()) {
            (Some((_, id)), None) => Ok(*id),
            _ => Err(SchemaError::unknown_table(ident)),
        }
    }

    /// Every relation of a table: outgoing first, then incoming.
    pub fn relations(&self, table: TableId) -> impl Iterator<Item = Relation<'_>> {
        let meta = self.table(table);
        let outgoing = meta.outgoing.iter().map(move |id| {
            let reference = self.reference(*id);
            Relation {
                name: &reference.name,
                reference,
                direction: Direction::Outgoing,
            }
        });
        let incoming = meta.incoming.iter().map(move |id| {
            let reference = self.reference(*id);
            Relation {
                name: &reference.inverse_name,
                reference,
                direction: Direction::Incoming,
            }
        });
        outgoing.chain(incoming)
    }

    /// A relation of a table by accessor name.
    pub fn relation(&self, table: TableId, name: &str) -> Option<Relation<'_>> {
        self.relations(table).find(|r| r.name == name)
    }

    /// The graph holding every closure and custom include spec.
    pub fn specs(&self) -> &Arc<SpecGraph> {
        &self.specs
    }

    /// The closure spec of a table: every relation, transitively.
    pub fn closure(&self, table: TableId) -> BoundSpec {
        BoundSpec::new(self.specs.clone(), self.table(table).all_include)
    }

    /// A named custom include spec of a table.
    pub fn include(&self, table: TableId, name: &str) -> Option<BoundSpec> {
        self.table(table)
            .includes
            .get(name)
            .map(|root| BoundSpec::new(self.specs.clone(), *root))
    }

    /// Bind a parsed include spec against this registry.
    pub fn bind(&self, spec: &IncludeSpec) -> SchemaResult<BoundSpec> {
        let mut graph = SpecGraph::default();
        let root = graph.bind(self, spec)?;
        Ok(BoundSpec::new(Arc::new(graph), root))
    }

    /// Parse and bind include spec text.
    pub fn bind_str(&self, text: &str) -> SchemaResult<BoundSpec> {
        self.bind(&IncludeSpec::parse(text)?)
    }
}

/// Collects tables and references, then validates and computes closures.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    tables: Vec<TableMeta>,
    references: Vec<Reference>,
    by_name: IndexMap<QualifiedName, TableId>,
    includes: Vec<(TableId, SmolStr, String)>,
}

impl RegistryBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table.
    pub fn add_table(&mut self, mut table: TableMeta) -> SchemaResult<TableId> {
        if self.by_name.contains_key(&table.name) {
            return Err(SchemaError::DuplicateTable {
                name: table.name.to_string(),
            });
        }

        let id = TableId(self.tables.len() as u32);
        table.id = id;
        table.outgoing.clear();
        table.incoming.clear();
        self.by_name.insert(table.name.clone(), id);
        self.tables.push(table);
        Ok(id)
    }

    /// Register a reference and attach it to both endpoint tables.
    pub fn add_reference(&mut self, mut reference: Reference) -> SchemaResult<ReferenceId> {
        let label = if reference.name.is_empty() {
            "<unnamed>".to_string()
        } else {
            reference.name.to_string()
        };
        let invalid = |message: &str| SchemaError::InvalidReference {
            name: label.clone(),
            message: message.to_string(),
        };

        let (Some(from), Some(to)) = (
            self.tables.get(reference.points_from.index()),
            self.tables.get(reference.points_to.index()),
        ) else {
            return Err(invalid("endpoint table is not registered"));
        };
        if reference.fk_columns.is_empty() || reference.fk_columns.len() != reference.key_columns.len() {
            return Err(invalid("FK and key column lists must be non-empty and equally long"));
        }
        if reference.fk_columns.iter().any(|c| *c >= from.width())
            || reference.key_columns.iter().any(|c| *c >= to.width())
        {
            return Err(invalid("column index out of range"));
        }
        if reference.name.is_empty() || reference.inverse_name.is_empty() {
            return Err(invalid("both accessor names are required"));
        }

        let id = ReferenceId(self.references.len() as u32);
        reference.id = id;
        self.tables[reference.points_from.index()].outgoing.push(id);
        self.tables[reference.points_to.index()].incoming.push(id);
        self.references.push(reference);
        Ok(id)
    }

    /// Attach a named custom include spec, parsed and bound on [`build`](Self::build).
    pub fn add_include(&mut self, table: TableId, name: impl Into<SmolStr>, text: impl Into<String>) {
        self.includes.push((table, name.into(), text.into()));
    }

    /// A registered table.
    pub fn table(&self, id: TableId) -> &TableMeta {
        &self.tables[id.index()]
    }

    /// Look up a registered table by name.
    pub fn table_id(&self, name: &QualifiedName) -> Option<TableId> {
        self.by_name.get(name).copied()
    }

    /// Validate accessor names, build closures and bind custom specs.
    pub fn build(self) -> SchemaResult<Registry> {
        let mut registry = Registry {
            tables: self.tables,
            references: self.references,
            by_name: self.by_name,
            specs: Arc::new(SpecGraph::default()),
        };

        for table in &registry.tables {
            let mut seen = HashSet::new();
            for relation in registry.relations(table.id) {
                if !seen.insert(relation.name) {
                    return Err(SchemaError::DuplicateRelation {
                        table: table.name.to_string(),
                        name: relation.name.to_string(),
                    });
                }
            }
        }

        let mut graph = SpecGraph::default();
        let roots = build_closure(&registry, &mut graph);

        let mut custom: Vec<(TableId, SmolStr, SpecId)> = Vec::with_capacity(self.includes.len());
        for (table, name, text) in &self.includes {
            let spec = IncludeSpec::parse(text)?;
            let root_table = registry.resolve_table(&spec.table)?;
            if root_table != *table {
                return Err(SchemaError::invalid_table(
                    registry.table(*table).name.to_string(),
                    format!("include `{}` is rooted at `{}`", name, spec.table),
                ));
            }
            if custom.iter().any(|(t, n, _)| t == table && n == name) {
                return Err(SchemaError::invalid_table(
                    registry.table(*table).name.to_string(),
                    format!("include `{}` is declared more than once", name),
                ));
            }
            let root = graph.bind(&registry, &spec)?;
            custom.push((*table, name.clone(), root));
        }

        for (table, root) in registry.tables.iter_mut().zip(roots) {
            table.all_include = root;
        }
        for (table, name, root) in custom {
            registry.tables[table.index()].includes.insert(name, root);
        }

        debug!(
            tables = registry.tables.len(),
            references = registry.references.len(),
            spec_nodes = graph.len(),
            "Registry built"
        );

        registry.specs = Arc::new(graph);
        Ok(registry)
    }
}
