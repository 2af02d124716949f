//! Column-position cache.
//!
//! Rows come back in the table's *live* column order, which drifts from the
//! generation-time order when columns are added or dropped. Each table keeps
//! a lazily built map from live ordinal to field index, rebuilt when a row's
//! width disagrees with it.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use smol_str::SmolStr;
use strata_schema::{QualifiedName, Registry, TableId, TableMeta};
use tracing::{debug, warn};

use crate::entity::Record;
use crate::error::{QueryError, QueryResult};
use crate::executor::Executor;
use crate::value::{KeyValue, Value};

/// Rebuilds attempted by one `resolve` call before giving up.
const MAX_REBUILDS: usize = 3;

/// Where a live column goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Into the field with this generation-time index.
    Field(usize),
    /// Nowhere: the column did not exist at generation time.
    Discard,
}

/// Live ordinal to field index, for one table at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionMap {
    slots: Box<[Slot]>,
    primary: Option<usize>,
}

impl PositionMap {
    /// Map live column names against the generation-time column names.
    pub fn build(table: &TableMeta, live: &[String]) -> Self {
        let by_name: HashMap<&str, usize> = table.columns.iter().map(|c| (c.name.as_str(), c.index)).collect();
        Self::from_lookup(&by_name, table.primary_key, live)
    }

    fn from_lookup<K>(by_name: &HashMap<K, usize>, primary_key: usize, live: &[String]) -> Self
    where
        K: Borrow<str> + Hash + Eq,
    {
        let slots: Box<[Slot]> = live
            .iter()
            .map(|name| match by_name.get(name.as_str()) {
                Some(index) => Slot::Field(*index),
                None => Slot::Discard,
            })
            .collect();
        let primary = slots.iter().position(|s| *s == Slot::Field(primary_key));
        Self { slots, primary }
    }

    /// The slots, one per live column.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Number of live columns.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the map has no columns.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Live ordinal of the primary key, if it is still present.
    pub fn primary(&self) -> Option<usize> {
        self.primary
    }

    /// The primary-key value of a row.
    pub fn primary_key(&self, row: &[Value]) -> Option<KeyValue> {
        self.primary.and_then(|i| row.get(i)).and_then(Value::to_key)
    }

    /// Move a row's values into a record's fields.
    pub fn scan(&self, row: Vec<Value>, record: &mut dyn Record) -> QueryResult<()> {
        if row.len() != self.slots.len() {
            return Err(QueryError::invalid_data_type(
                "",
                format!("row has {} columns, position map has {}", row.len(), self.slots.len()),
            ));
        }
        for (slot, value) in self.slots.iter().zip(row) {
            if let Slot::Field(index) = slot {
                record.set_field(*index, value)?;
            }
        }
        Ok(())
    }
}

/// The position cache of one table.
#[derive(Debug)]
pub struct ColumnPositions {
    table: QualifiedName,
    by_name: HashMap<SmolStr, usize>,
    primary_key: usize,
    current: RwLock<Option<Arc<PositionMap>>>,
    rebuilds: AtomicU64,
}

impl ColumnPositions {
    /// Create an empty cache for a table.
    pub fn new(table: &TableMeta) -> Self {
        Self {
            table: table.name.clone(),
            by_name: table.columns.iter().map(|c| (c.name.clone(), c.index)).collect(),
            primary_key: table.primary_key,
            current: RwLock::new(None),
            rebuilds: AtomicU64::new(0),
        }
    }

    /// The cached map, if any.
    pub fn current(&self) -> Option<Arc<PositionMap>> {
        self.current.read().clone()
    }

    /// Times the map has been built from the live catalog.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds.load(Ordering::Relaxed)
    }

    /// Drop the cached map.
    pub fn invalidate(&self) {
        *self.current.write() = None;
    }

    /// A map for rows `width` columns wide.
    ///
    /// Cache hits only take the read lock. On a miss the live column order is
    /// queried without holding any lock, installed, and checked again.
    pub async fn resolve<X: Executor + ?Sized>(&self, width: usize, executor: &X) -> QueryResult<Arc<PositionMap>> {
        for attempt in 0..=MAX_REBUILDS {
            let cached = {
                let guard = self.current.read();
                guard.as_ref().filter(|map| map.len() == width).cloned()
            };
            if let Some(map) = cached {
                return Ok(map);
            }
            if attempt == MAX_REBUILDS {
                break;
            }

            let live = executor.live_columns(&self.table).await?;
            let map = Arc::new(PositionMap::from_lookup(&self.by_name, self.primary_key, &live));
            let previous = self.current.write().replace(map.clone());
            let count = self.rebuilds.fetch_add(1, Ordering::Relaxed) + 1;

            match previous {
                Some(old) => warn!(
                    table = %self.table,
                    old_width = old.len(),
                    new_width = map.len(),
                    row_width = width,
                    rebuilds = count,
                    "Column layout changed, rebuilt position map"
                ),
                None => debug!(table = %self.table, width = map.len(), "Built position map"),
            }

            if map.len() == width {
                return Ok(map);
            }
        }

        Err(QueryError::invalid_data_type(
            self.table.to_string(),
            format!(
                "rows of {} have {} columns but the live layout never matched after {} rebuilds",
                self.table, width, MAX_REBUILDS
            ),
        ))
    }
}

/// One position cache per registry table, all empty until first use.
#[derive(Debug)]
pub struct ColumnCaches {
    tables: Vec<ColumnPositions>,
}

impl ColumnCaches {
    /// Create empty caches for every table of a registry.
    pub fn new(registry: &Registry) -> Self {
        Self {
            tables: registry.tables().iter().map(ColumnPositions::new).collect(),
        }
    }

    /// The cache of a table.
    pub fn get(&self, table: TableId) -> &ColumnPositions {
        &self.tables[table.index()]
    }

    /// Total rebuilds across all tables.
    pub fn total_rebuilds(&self) -> u64 {
        self.tables.iter().map(ColumnPositions::rebuilds).sum()
    }
}
