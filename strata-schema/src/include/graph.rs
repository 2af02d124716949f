//! Include specs bound to registry tables and references.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use smol_str::SmolStr;

use super::spec::{IncludeMap, IncludeSpec};
use crate::error::{SchemaError, SchemaResult};
use crate::model::{Direction, ReferenceId, Registry, SpecId, TableId};

/// One traversal step out of a spec node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecEdge {
    /// The reference followed.
    pub reference: ReferenceId,
    /// Which way it is followed.
    pub direction: Direction,
    /// Node describing what to load from the related records.
    pub target: SpecId,
}

/// What to load from records of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecNode {
    /// Table the node applies to.
    pub table: TableId,
    /// Relations to load, keyed by alias.
    pub edges: BTreeMap<SmolStr, SpecEdge>,
}

/// Arena of spec nodes.
///
/// A spec bound from text is a tree inside the arena. Closure specs share one
/// node per table and may contain cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecGraph {
    nodes: Vec<SpecNode>,
}

impl SpecGraph {
    /// A node by id.
    pub fn node(&self, id: SpecId) -> &SpecNode {
        &self.nodes[id.index()]
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn push(&mut self, table: TableId) -> SpecId {
        let id = SpecId(self.nodes.len() as u32);
        self.nodes.push(SpecNode {
            table,
            edges: BTreeMap::new(),
        });
        id
    }

    pub(crate) fn insert_edge(&mut self, from: SpecId, alias: SmolStr, edge: SpecEdge) {
        self.nodes[from.index()].edges.insert(alias, edge);
    }

    /// Nodes reachable from `root`, each once, in breadth-first order.
    pub fn reachable(&self, root: SpecId) -> Vec<SpecId> {
        let mut seen = HashSet::from([root]);
        let mut order = vec![root];
        let mut cursor = 0;
        while let Some(id) = order.get(cursor).copied() {
            cursor += 1;
            for edge in self.node(id).edges.values() {
                if seen.insert(edge.target) {
                    order.push(edge.target);
                }
            }
        }
        order
    }

    /// Bind a syntactic spec, appending its nodes. Returns the root node.
    pub(crate) fn bind(&mut self, registry: &Registry, spec: &IncludeSpec) -> SchemaResult<SpecId> {
        let table = registry.resolve_table(&spec.table)?;
        self.bind_map(registry, table, &spec.relations)
    }

    fn bind_map(&mut self, registry: &Registry, table: TableId, map: &IncludeMap) -> SchemaResult<SpecId> {
        let id = self.push(table);
        for (alias, entry) in map.iter() {
            let relation = registry.relation(table, &entry.relation).ok_or_else(|| {
                SchemaError::unknown_relation(registry.table(table).name.to_string(), entry.relation.as_str())
            })?;
            let (reference, direction, next) = (relation.reference.id, relation.direction, relation.target());
            let target = self.bind_map(registry, next, &entry.children)?;
            self.insert_edge(
                id,
                alias.clone(),
                SpecEdge {
                    reference,
                    direction,
                    target,
                },
            );
        }
        Ok(id)
    }

    /// Rebuild the syntactic form of an acyclic spec. Returns `None` when
    /// a cycle is reachable from `root`.
    pub fn unfold(&self, registry: &Registry, root: SpecId) -> Option<IncludeSpec> {
        let table = &registry.table(self.node(root).table).name;
        let mut path = vec![root];
        let relations = self.unfold_map(registry, root, &mut path)?;
        Some(IncludeSpec {
            table: table.name.clone(),
            relations,
        })
    }

    fn unfold_map(&self, registry: &Registry, id: SpecId, path: &mut Vec<SpecId>) -> Option<IncludeMap> {
        let mut map = IncludeMap::new();
        for (alias, edge) in &self.node(id).edges {
            if path.contains(&edge.target) {
                return None;
            }
            path.push(edge.target);
            let children = self.unfold_map(registry, edge.target, path)?;
            path.pop();
            let relation = registry.reference(edge.reference).name_for(edge.direction).clone();
            map = map.with_alias(relation, alias.clone(), children);
        }
        Some(map)
    }
}

/// A bound spec: a root node in a shared graph.
#[derive(Debug, Clone)]
pub struct BoundSpec {
    graph: Arc<SpecGraph>,
    root: SpecId,
}

impl BoundSpec {
    /// Wrap a root node of `graph`.
    pub fn new(graph: Arc<SpecGraph>, root: SpecId) -> Self {
        Self { graph, root }
    }

    /// The graph the spec lives in.
    pub fn graph(&self) -> &SpecGraph {
        &self.graph
    }

    /// The root node id.
    pub fn root(&self) -> SpecId {
        self.root
    }

    /// The root node.
    pub fn root_node(&self) -> &SpecNode {
        self.graph.node(self.root)
    }

    /// The table the spec is rooted at.
    pub fn table(&self) -> TableId {
        self.root_node().table
    }
}
