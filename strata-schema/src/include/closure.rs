//! Closure specs: every relation of a table, transitively.

use std::collections::HashMap;

use tracing::trace;

use super::graph::{SpecEdge, SpecGraph};
use crate::model::{Registry, SpecId, TableId};

#[derive(Debug, Clone, Copy)]
enum State {
    /// Node allocated, edges still being filled in.
    Building(SpecId),
    Built(SpecId),
}

impl State {
    fn id(self) -> SpecId {
        match self {
            Self::Building(id) | Self::Built(id) => id,
        }
    }
}

/// Build one closure node per table into `graph`.
///
/// Returns the node of each table, indexed like `registry.tables()`. A table
/// reached again while it is still being built gets the placeholder node
/// back, so cyclic reference graphs produce cyclic spec graphs instead of
/// unbounded recursion.
pub(crate) fn build_closure(registry: &Registry, graph: &mut SpecGraph) -> Vec<SpecId> {
    let mut states: HashMap<TableId, State> = HashMap::with_capacity(registry.tables().len());
    registry
        .tables()
        .iter()
        .map(|table| visit(registry, graph, &mut states, table.id))
        .collect()
}

fn visit(
    registry: &Registry,
    graph: &mut SpecGraph,
    states: &mut HashMap<TableId, State>,
    table: TableId,
) -> SpecId {
    if let Some(state) = states.get(&table) {
        trace!(table = %registry.table(table).name, ?state, "Reusing closure node");
        return state.id();
    }

    let id = graph.push(table);
    states.insert(table, State::Building(id));

    let relations: Vec<_> = registry
        .relations(table)
        .map(|r| (r.name.clone(), r.reference.id, r.direction, r.target()))
        .collect();
    for (name, reference, direction, next) in relations {
        let target = visit(registry, graph, states, next);
        graph.insert_edge(
            id,
            name,
            SpecEdge {
                reference,
                direction,
                target,
            },
        );
    }

    states.insert(table, State::Built(id));
    id
}
