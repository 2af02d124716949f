//! Client handle tying a registry, entity bindings and an executor together.

use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::smallvec;
use strata_schema::{BoundSpec, Registry, TableId};
use tracing::debug;

use crate::entity::{Entity, EntitySet};
use crate::error::{QueryError, QueryResult};
use crate::executor::{BatchQuery, Executor};
use crate::loader::{BulkLoader, LoadOptions, LoadedGraph};
use crate::positions::{ColumnCaches, ColumnPositions};
use crate::value::{KeyValue, Value};

/// How [`Client::get_many`] treats keys without a row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchMode {
    /// Any missing key fails the call with a not-found error.
    #[default]
    Strict,
    /// Missing keys are skipped.
    Lenient,
}

type Registration = fn(&mut EntitySet, &Registry) -> QueryResult<TableId>;

fn register<E: Entity>(set: &mut EntitySet, registry: &Registry) -> QueryResult<TableId> {
    set.register::<E>(registry)
}

/// Builder for [`Client`].
pub struct ClientBuilder<X> {
    executor: X,
    registry: Arc<Registry>,
    registrations: Vec<Registration>,
    options: LoadOptions,
}

impl<X: Executor> ClientBuilder<X> {
    /// Bind an entity type to its table.
    pub fn entity<E: Entity>(mut self) -> Self {
        self.registrations.push(register::<E>);
        self
    }

    /// Default options for every load and get.
    pub fn load_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Validate the entity bindings and build the client.
    pub fn build(self) -> QueryResult<Client<X>> {
        let mut entities = EntitySet::new();
        for registration in &self.registrations {
            registration(&mut entities, &self.registry)?;
        }
        let caches = ColumnCaches::new(&self.registry);
        crate::strata_debug!(
            tables = self.registry.tables().len(),
            entities = entities.len(),
            "Built client"
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                executor: self.executor,
                registry: self.registry,
                entities,
                caches,
                options: self.options,
            }),
        })
    }
}

struct ClientInner<X> {
    executor: X,
    registry: Arc<Registry>,
    entities: EntitySet,
    caches: ColumnCaches,
    options: LoadOptions,
}

/// Runtime entry point. Cheap to clone; clones share column caches.
pub struct Client<X> {
    inner: Arc<ClientInner<X>>,
}

impl<X> Clone for Client<X> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<X> std::fmt::Debug for Client<X> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tables", &self.inner.registry.tables().len())
            .field("entities", &self.inner.entities.len())
            .field("options", &self.inner.options)
            .finish()
    }
}

impl<X: Executor> Client<X> {
    /// Start building a client.
    pub fn builder(executor: X, registry: impl Into<Arc<Registry>>) -> ClientBuilder<X> {
        ClientBuilder {
            executor,
            registry: registry.into(),
            registrations: Vec::new(),
            options: LoadOptions::default(),
        }
    }

    /// The registry.
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// The executor.
    pub fn executor(&self) -> &X {
        &self.inner.executor
    }

    /// The entity bindings.
    pub fn entities(&self) -> &EntitySet {
        &self.inner.entities
    }

    /// Column-position caches of every table.
    pub fn caches(&self) -> &ColumnCaches {
        &self.inner.caches
    }

    /// Column-position cache of `E`'s table.
    pub fn positions<E: Entity>(&self) -> QueryResult<&ColumnPositions> {
        Ok(self.inner.caches.get(self.inner.entities.table_of::<E>()?))
    }

    /// Parse and bind include spec text.
    pub fn bind(&self, text: &str) -> QueryResult<BoundSpec> {
        Ok(self.inner.registry.bind_str(text)?)
    }

    /// The closure spec of `E`'s table.
    pub fn closure<E: Entity>(&self) -> QueryResult<BoundSpec> {
        Ok(self.inner.registry.closure(self.inner.entities.table_of::<E>()?))
    }

    /// A named custom include spec of `E`'s table.
    pub fn include<E: Entity>(&self, name: &str) -> QueryResult<BoundSpec> {
        let table = self.inner.entities.table_of::<E>()?;
        self.inner.registry.include(table, name).ok_or_else(|| {
            QueryError::invalid_include(format!(
                "{} has no include spec named '{}'",
                self.inner.registry.table(table).name,
                name
            ))
            .with_table(self.inner.registry.table(table).name.to_string())
        })
    }

    /// Load `spec` from `roots`.
    pub async fn load<E: Entity>(&self, roots: Vec<E>, spec: &BoundSpec) -> QueryResult<LoadedGraph> {
        self.load_with(roots, spec, self.inner.options).await
    }

    /// Load `spec` from `roots` with explicit options.
    pub async fn load_with<E: Entity>(
        &self,
        roots: Vec<E>,
        spec: &BoundSpec,
        options: LoadOptions,
    ) -> QueryResult<LoadedGraph> {
        BulkLoader::new(
            &self.inner.executor,
            &self.inner.registry,
            &self.inner.entities,
            &self.inner.caches,
        )
        .with_options(options)
        .load(roots, spec)
        .await
    }

    /// Fetch one record by primary key.
    pub async fn get<E: Entity>(&self, key: impl Into<Value>) -> QueryResult<E> {
        let table = self.inner.entities.table_of::<E>()?;
        let mut found = self.fetch_by_key::<E>(table, vec![key_of(self.table_name(table), key.into())?]).await?;
        match found.pop() {
            Some((_, record)) => Ok(record),
            None => Err(QueryError::not_found(self.table_name(table))),
        }
    }

    /// Fetch records by primary key, one per distinct key, in input order.
    pub async fn get_many<E: Entity, K: Into<Value>>(
        &self,
        keys: impl IntoIterator<Item = K>,
        mode: FetchMode,
    ) -> QueryResult<Vec<E>> {
        let table = self.inner.entities.table_of::<E>()?;
        let mut wanted: Vec<KeyValue> = Vec::new();
        for key in keys {
            let key = key_of(self.table_name(table), key.into())?;
            if !wanted.contains(&key) {
                wanted.push(key);
            }
        }

        let mut found: IndexMap<KeyValue, E> = self.fetch_by_key::<E>(table, wanted.clone()).await?.into_iter().collect();
        let mut out = Vec::with_capacity(wanted.len());
        let mut missing = 0usize;
        for key in &wanted {
            match found.swap_remove(key) {
                Some(record) => out.push(record),
                None => missing += 1,
            }
        }

        if missing > 0 && mode == FetchMode::Strict {
            return Err(QueryError::not_found(self.table_name(table))
                .with_context(format!("{} of {} keys have no row", missing, wanted.len())));
        }
        Ok(out)
    }

    async fn fetch_by_key<E: Entity>(&self, table: TableId, keys: Vec<KeyValue>) -> QueryResult<Vec<(KeyValue, E)>> {
        let meta = self.inner.registry.table(table);
        let mut query = BatchQuery::on(
            meta,
            &[meta.primary_key],
            keys.into_iter().map(|k| smallvec![k]).collect(),
        );
        if let (Some(column), false) = (meta.soft_delete, self.inner.options.with_deleted) {
            query = query.with_soft_delete(meta.columns[column].name.clone());
        }

        let rows = self.inner.executor.fetch(&query).await?;
        debug!(table = %meta.name, keys = query.keys.len(), rows = rows.len(), "Key fetch");
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let positions = self.inner.caches.get(table).resolve(rows.width, &self.inner.executor).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows.rows {
            let key = positions.primary_key(&row).ok_or_else(|| {
                QueryError::invalid_data_type(meta.name.to_string(), "row has no usable primary key")
            })?;
            let mut record = E::default();
            positions
                .scan(row, &mut record)
                .map_err(|e| e.with_table(meta.name.to_string()))?;
            out.push((key, record));
        }
        Ok(out)
    }

    fn table_name(&self, table: TableId) -> String {
        self.inner.registry.table(table).name.to_string()
    }
}

fn key_of(table: String, value: Value) -> QueryResult<KeyValue> {
    let type_name = value.type_name();
    value.to_key().ok_or_else(|| {
        QueryError::invalid_data_type(table, format!("a {} value cannot identify a row", type_name))
    })
}
