//! Bulk loading of related records along a bound include spec.
//!
//! One batch query is issued per spec edge and level, never one per record.
//! Records are deduplicated by `(table, primary key)` for the whole call, so
//! a row reached along two paths is one record with two incoming links.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use futures::future::try_join_all;
use indexmap::{IndexMap, IndexSet};
use smallvec::smallvec;
use smol_str::SmolStr;
use strata_schema::{BoundSpec, Cardinality, Direction, Registry, SpecId, TableId};
use tracing::{debug, trace};

use crate::entity::{Entity, EntitySet, Record};
use crate::error::{QueryError, QueryResult};
use crate::executor::{BatchQuery, Executor, RowSet};
use crate::positions::{ColumnCaches, PositionMap};
use crate::value::{KeyValue, RowKey};

/// Options for a load call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Also load soft-deleted rows.
    pub with_deleted: bool,
}

impl LoadOptions {
    /// Default options: soft-deleted rows are skipped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Include soft-deleted rows.
    pub fn with_deleted(mut self) -> Self {
        self.with_deleted = true;
        self
    }
}

/// Handle to a record inside a [`LoadedGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u32);

impl RecordId {
    /// Arena index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A loaded relation of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// A single related record, `None` when the key was NULL or unmatched.
    One(Option<RecordId>),
    /// Related records in row order.
    Many(Vec<RecordId>),
}

#[derive(Debug)]
struct Entry {
    table: TableId,
    record: Box<dyn Record>,
    links: IndexMap<SmolStr, Link>,
    parents: IndexMap<SmolStr, RecordId>,
}

/// Records produced by a load call, with their links.
#[derive(Debug, Default)]
pub struct LoadedGraph {
    entries: Vec<Entry>,
    roots: Vec<RecordId>,
    identity: HashMap<(TableId, KeyValue), RecordId>,
}

impl LoadedGraph {
    fn push(&mut self, table: TableId, record: Box<dyn Record>) -> RecordId {
        let id = RecordId(self.entries.len() as u32);
        self.entries.push(Entry {
            table,
            record,
            links: IndexMap::new(),
            parents: IndexMap::new(),
        });
        id
    }

    /// The root records, in the order they were passed in.
    pub fn roots(&self) -> &[RecordId] {
        &self.roots
    }

    /// Number of records, roots included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the graph holds no records.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Table of a record.
    pub fn table(&self, id: RecordId) -> TableId {
        self.entries[id.index()].table
    }

    /// A record as a trait object.
    pub fn record(&self, id: RecordId) -> &dyn Record {
        self.entries[id.index()].record.as_ref()
    }

    /// A record as its entity type. `None` if it is of another type.
    pub fn get<E: Entity>(&self, id: RecordId) -> Option<&E> {
        self.entries.get(id.index())?.record.as_any().downcast_ref()
    }

    /// Mutable access to a record.
    pub fn get_mut<E: Entity>(&mut self, id: RecordId) -> Option<&mut E> {
        self.entries.get_mut(id.index())?.record.as_any_mut().downcast_mut()
    }

    /// The link loaded under `alias`, if that relation was loaded.
    pub fn link(&self, id: RecordId, alias: &str) -> Option<&Link> {
        self.entries[id.index()].links.get(alias)
    }

    /// The single record linked under `alias`.
    pub fn one(&self, id: RecordId, alias: &str) -> Option<RecordId> {
        match self.link(id, alias)? {
            Link::One(target) => *target,
            Link::Many(targets) => targets.first().copied(),
        }
    }

    /// Records linked under `alias`, empty if nothing was loaded.
    pub fn many(&self, id: RecordId, alias: &str) -> &[RecordId] {
        match self.link(id, alias) {
            Some(Link::Many(targets)) => targets,
            Some(Link::One(Some(target))) => std::slice::from_ref(target),
            _ => &[],
        }
    }

    /// The record that loaded this one as a child, by the reference's
    /// forward name.
    pub fn parent(&self, id: RecordId, name: &str) -> Option<RecordId> {
        self.entries[id.index()].parents.get(name).copied()
    }

    /// The record of `table` with primary key `key`, if loaded.
    pub fn find(&self, table: TableId, key: &KeyValue) -> Option<RecordId> {
        self.identity.get(&(table, key.clone())).copied()
    }

    /// Consume the graph, returning the roots as entities.
    pub fn into_roots<E: Entity>(mut self) -> Vec<E> {
        let roots = std::mem::take(&mut self.roots);
        let mut entries: Vec<Option<Box<dyn Record>>> = self.entries.into_iter().map(|e| Some(e.record)).collect();
        roots
            .into_iter()
            .filter_map(|id| entries[id.index()].take())
            .filter_map(|record| record.into_any().downcast::<E>().ok())
            .map(|boxed| *boxed)
            .collect()
    }
}

/// One edge of one level: which records asked, and the query answering them.
struct EdgePlan {
    alias: SmolStr,
    name: SmolStr,
    direction: Direction,
    cardinality: Cardinality,
    target_node: SpecId,
    target_table: TableId,
    source_columns: Vec<usize>,
    target_columns: Vec<usize>,
    query: BatchQuery,
}

/// Loads include specs over an executor.
pub struct BulkLoader<'a, X: ?Sized> {
    executor: &'a X,
    registry: &'a Registry,
    entities: &'a EntitySet,
    caches: &'a ColumnCaches,
    options: LoadOptions,
}

impl<'a, X: Executor + ?Sized> BulkLoader<'a, X> {
    /// Create a loader.
    pub fn new(executor: &'a X, registry: &'a Registry, entities: &'a EntitySet, caches: &'a ColumnCaches) -> Self {
        Self {
            executor,
            registry,
            entities,
            caches,
            options: LoadOptions::default(),
        }
    }

    /// Set load options.
    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Load `spec` starting from typed roots.
    pub async fn load<E: Entity>(&self, roots: Vec<E>, spec: &BoundSpec) -> QueryResult<LoadedGraph> {
        let table = self.entities.table_of::<E>()?;
        let roots = roots.into_iter().map(|r| Box::new(r) as Box<dyn Record>).collect();
        self.load_records(table, roots, spec).await
    }

    /// Load `spec` starting from roots of `table`.
    pub async fn load_records(
        &self,
        table: TableId,
        roots: Vec<Box<dyn Record>>,
        spec: &BoundSpec,
    ) -> QueryResult<LoadedGraph> {
        if spec.table() != table {
            return Err(QueryError::include_mismatch(
                self.registry.table(table).name.to_string(),
                self.registry.table(spec.table()).name.to_string(),
            ));
        }

        let primary_key = self.registry.table(table).primary_key;
        let mut graph = LoadedGraph::default();
        for record in roots {
            let key = record.field(primary_key).to_key();
            let id = graph.push(table, record);
            if let Some(key) = key {
                graph.identity.entry((table, key)).or_insert(id);
            }
            graph.roots.push(id);
        }

        let mut expanded: HashSet<(SpecId, RecordId)> = HashSet::new();
        let mut pending: VecDeque<(SpecId, Vec<RecordId>)> = VecDeque::new();
        pending.push_back((spec.root(), graph.roots.clone()));

        while let Some((node, records)) = pending.pop_front() {
            let records: Vec<RecordId> = records
                .into_iter()
                .filter(|id| expanded.insert((node, *id)))
                .collect();
            if records.is_empty() {
                continue;
            }

            let plans = self.plan(&graph, spec, node, &records);
            if plans.is_empty() {
                continue;
            }

            let results = try_join_all(plans.iter().map(|plan| self.fetch(plan))).await?;

            for (plan, (rows, positions)) in plans.iter().zip(results) {
                let children = self.link(&mut graph, plan, &records, rows, positions)?;
                if !children.is_empty() {
                    pending.push_back((plan.target_node, children));
                }
            }
        }

        debug!(roots = graph.roots.len(), records = graph.len(), "Loaded include spec");
        Ok(graph)
    }

    fn plan(&self, graph: &LoadedGraph, spec: &BoundSpec, node: SpecId, records: &[RecordId]) -> Vec<EdgePlan> {
        let node = spec.graph().node(node);
        node.edges
            .iter()
            .map(|(alias, edge)| {
                let reference = self.registry.reference(edge.reference);
                let (source_columns, target_columns) = match edge.direction {
                    Direction::Outgoing => (reference.fk_columns.clone(), reference.key_columns.clone()),
                    Direction::Incoming => (reference.key_columns.clone(), reference.fk_columns.clone()),
                };
                let target_table = reference.target(edge.direction);
                let target = self.registry.table(target_table);

                let keys: IndexSet<RowKey> = records
                    .iter()
                    .filter_map(|id| row_key(graph.record(*id), &source_columns))
                    .collect();

                let mut query = BatchQuery::on(target, &target_columns, keys.into_iter().collect());
                if let (Some(column), false) = (target.soft_delete, self.options.with_deleted) {
                    query = query.with_soft_delete(target.columns[column].name.clone());
                }

                EdgePlan {
                    alias: alias.clone(),
                    name: reference.name.clone(),
                    direction: edge.direction,
                    cardinality: reference.cardinality,
                    target_node: edge.target,
                    target_table,
                    source_columns,
                    target_columns,
                    query,
                }
            })
            .collect()
    }

    async fn fetch(&self, plan: &EdgePlan) -> QueryResult<(RowSet, Option<Arc<PositionMap>>)> {
        if plan.query.keys.is_empty() {
            return Ok((RowSet::default(), None));
        }
        let rows = self.executor.fetch(&plan.query).await?;
        debug!(
            table = %plan.query.table,
            relation = %plan.alias,
            keys = plan.query.keys.len(),
            rows = rows.len(),
            "Batch query"
        );
        if rows.is_empty() {
            return Ok((rows, None));
        }
        let positions = self.caches.get(plan.target_table).resolve(rows.width, self.executor).await?;
        Ok((rows, Some(positions)))
    }

    /// Scan the rows of one edge and link them to the records that asked.
    /// Returns the matched records for the next level.
    fn link(
        &self,
        graph: &mut LoadedGraph,
        plan: &EdgePlan,
        records: &[RecordId],
        rows: RowSet,
        positions: Option<Arc<PositionMap>>,
    ) -> QueryResult<Vec<RecordId>> {
        let mut by_key: HashMap<RowKey, Vec<RecordId>> = HashMap::new();
        let mut children: IndexSet<RecordId> = IndexSet::new();

        if let Some(positions) = positions {
            let table = self.registry.table(plan.target_table);
            for row in rows.rows {
                let Some(key) = positions.primary_key(&row) else {
                    return Err(QueryError::invalid_data_type(
                        table.name.to_string(),
                        format!("row of {} has no usable primary key", table.name),
                    ));
                };

                let id = match graph.identity.get(&(plan.target_table, key.clone())) {
                    Some(id) => {
                        trace!(table = %table.name, "Identity hit");
                        *id
                    }
                    None => {
                        let mut record = self.entities.create(self.registry, plan.target_table)?;
                        positions
                            .scan(row, record.as_mut())
                            .map_err(|e| e.with_table(table.name.to_string()))?;
                        let id = graph.push(plan.target_table, record);
                        graph.identity.insert((plan.target_table, key), id);
                        id
                    }
                };

                if children.insert(id) {
                    if let Some(target_key) = row_key(graph.record(id), &plan.target_columns) {
                        by_key.entry(target_key).or_default().push(id);
                    }
                }
            }
        }

        for source in records {
            let matched = row_key(graph.record(*source), &plan.source_columns)
                .and_then(|key| by_key.get(&key))
                .map(Vec::as_slice)
                .unwrap_or_default();

            let link = match (plan.direction, plan.cardinality) {
                (Direction::Outgoing, _) | (Direction::Incoming, Cardinality::OneToOne) => {
                    Link::One(matched.first().copied())
                }
                (Direction::Incoming, Cardinality::OneToMany) => Link::Many(matched.to_vec()),
            };

            if plan.direction == Direction::Incoming {
                for child in matched {
                    graph.entries[child.index()].parents.insert(plan.name.clone(), *source);
                }
            }
            graph.entries[source.index()].links.insert(plan.alias.clone(), link);
        }

        Ok(children.into_iter().collect())
    }
}

/// Key tuple of a record over `columns`. `None` if any part is NULL or not
/// usable as a key.
fn row_key(record: &dyn Record, columns: &[usize]) -> Option<RowKey> {
    let mut key: RowKey = smallvec![];
    for column in columns {
        key.push(record.field(*column).to_key()?);
    }
    Some(key)
}

/// Check whether a record is of entity type `E`.
pub fn is_entity<E: Entity>(record: &dyn Record) -> bool {
    record.as_any().is::<E>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use strata_schema::{ColumnMeta, QualifiedName, Reference, ScalarType, TableMeta};

    crate::entity! {
        struct User in "users" {
            id: i64,
            name: String,
            deleted_at: Option<String>,
        }
    }

    crate::entity! {
        struct Post in "posts" {
            id: i64,
            author_id: i64,
            editor_id: Option<i64>,
            title: String,
        }
    }

    fn int() -> ScalarType {
        ScalarType::from_formatted("bigint", vec![])
    }

    fn text() -> ScalarType {
        ScalarType::from_formatted("text", vec![])
    }

    fn registry() -> Registry {
        let mut builder = Registry::builder();
        let users = builder
            .add_table(
                TableMeta::new(
                    QualifiedName::new("public", "users"),
                    vec![
                        ColumnMeta::new("id", int()).primary(),
                        ColumnMeta::new("name", text()),
                        ColumnMeta::new("deleted_at", text()).nullable(),
                    ],
                )
                .unwrap()
                .with_soft_delete("deleted_at")
                .unwrap(),
            )
            .unwrap();
        let posts = builder
            .add_table(
                TableMeta::new(
                    QualifiedName::new("public", "posts"),
                    vec![
                        ColumnMeta::new("id", int()).primary(),
                        ColumnMeta::new("author_id", int()),
                        ColumnMeta::new("editor_id", int()).nullable(),
                        ColumnMeta::new("title", text()),
                    ],
                )
                .unwrap(),
            )
            .unwrap();
        builder
            .add_reference(Reference::new(posts, vec![1], users, vec![0]).with_names("Author", "Posts"))
            .unwrap();
        builder
            .add_reference(
                Reference::new(posts, vec![2], users, vec![0])
                    .with_nullable(true)
                    .with_names("Editor", "EditedPosts"),
            )
            .unwrap();
        builder.build().unwrap()
    }

    /// Serves rows from fixed tables and records every query.
    #[derive(Default)]
    struct Tables {
        rows: HashMap<String, Vec<Vec<Value>>>,
        columns: HashMap<String, Vec<String>>,
        queries: Mutex<Vec<BatchQuery>>,
    }

    impl Tables {
        fn table(mut self, name: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
            self.columns.insert(name.into(), columns.iter().map(|c| c.to_string()).collect());
            self.rows.insert(name.into(), rows);
            self
        }
    }

    #[async_trait::async_trait]
    impl Executor for Tables {
        async fn fetch(&self, query: &BatchQuery) -> QueryResult<RowSet> {
            self.queries.lock().push(query.clone());
            let columns = &self.columns[query.table.name.as_str()];
            let positions: Vec<usize> = query
                .key_columns
                .iter()
                .map(|k| columns.iter().position(|c| c == k.as_str()).unwrap())
                .collect();
            let soft = query
                .soft_delete
                .as_ref()
                .map(|s| columns.iter().position(|c| c == s.as_str()).unwrap());
            let rows = self.rows[query.table.name.as_str()]
                .iter()
                .filter(|row| {
                    let key: Option<RowKey> = positions.iter().map(|p| row[*p].to_key()).collect();
                    key.is_some_and(|k| query.keys.contains(&k))
                })
                .filter(|row| soft.is_none_or(|s| row[s].is_null()))
                .cloned()
                .collect();
            Ok(RowSet::new(columns.len(), rows))
        }

        async fn live_columns(&self, table: &QualifiedName) -> QueryResult<Vec<String>> {
            Ok(self.columns[table.name.as_str()].clone())
        }
    }

    fn user(id: i64, name: &str, deleted: bool) -> Vec<Value> {
        vec![
            Value::Int(id),
            Value::from(name),
            if deleted { Value::from("yesterday") } else { Value::Null },
        ]
    }

    fn post(id: i64, author: i64, editor: Option<i64>, title: &str) -> Vec<Value> {
        vec![Value::Int(id), Value::Int(author), Value::from(editor), Value::from(title)]
    }

    fn fixture() -> Tables {
        Tables::default()
            .table(
                "users",
                &["id", "name", "deleted_at"],
                vec![user(1, "ada", false), user(2, "bob", false), user(3, "eve", true)],
            )
            .table(
                "posts",
                &["id", "author_id", "editor_id", "title"],
                vec![
                    post(10, 1, Some(1), "first"),
                    post(11, 1, Some(2), "second"),
                    post(12, 2, None, "third"),
                    post(13, 3, None, "fourth"),
                ],
            )
    }

    fn entities(registry: &Registry) -> EntitySet {
        let mut set = EntitySet::new();
        set.register::<User>(registry).unwrap();
        set.register::<Post>(registry).unwrap();
        set
    }

    fn typed_post(id: i64, author_id: i64, editor_id: Option<i64>) -> Post {
        Post {
            id,
            author_id,
            editor_id,
            title: String::new(),
        }
    }

    #[tokio::test]
    async fn test_one_query_per_edge() {
        let registry = registry();
        let entities = entities(&registry);
        let caches = ColumnCaches::new(&registry);
        let executor = fixture();
        let spec = registry.bind_str("users.Posts.Author").unwrap();

        let roots = vec![
            User { id: 1, ..Default::default() },
            User { id: 2, ..Default::default() },
        ];
        let graph = BulkLoader::new(&executor, &registry, &entities, &caches)
            .load(roots, &spec)
            .await
            .unwrap();

        let queries = executor.queries.lock();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].table.name, "posts");
        assert_eq!(queries[0].keys.len(), 2);

        let ada = graph.roots()[0];
        let titles: Vec<&str> = graph
            .many(ada, "Posts")
            .iter()
            .map(|id| graph.get::<Post>(*id).unwrap().title.as_str())
            .collect();
        assert_eq!(titles, vec!["first", "second"]);

        // Authors resolve to the roots themselves.
        let first = graph.many(ada, "Posts")[0];
        assert_eq!(graph.one(first, "Author"), Some(ada));
        assert_eq!(graph.parent(first, "Author"), Some(ada));
    }

    #[tokio::test]
    async fn test_diamond_shares_one_record() {
        let registry = registry();
        let entities = entities(&registry);
        let caches = ColumnCaches::new(&registry);
        let executor = fixture();
        let spec = registry.bind_str("posts.{Author, Editor}").unwrap();

        let roots = vec![typed_post(10, 1, Some(1)), typed_post(11, 1, Some(2))];
        let graph = BulkLoader::new(&executor, &registry, &entities, &caches)
            .load(roots, &spec)
            .await
            .unwrap();

        let first = graph.roots()[0];
        let second = graph.roots()[1];
        let ada = graph.one(first, "Author").unwrap();
        assert_eq!(graph.one(first, "Editor"), Some(ada));
        assert_eq!(graph.one(second, "Author"), Some(ada));
        assert_eq!(graph.get::<User>(graph.one(second, "Editor").unwrap()).unwrap().name, "bob");
        // Two roots plus ada and bob.
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.find(graph.table(ada), &KeyValue::Int(1)), Some(ada));
    }

    #[tokio::test]
    async fn test_null_keys_are_skipped() {
        let registry = registry();
        let entities = entities(&registry);
        let caches = ColumnCaches::new(&registry);
        let executor = fixture();
        let spec = registry.bind_str("posts.Editor").unwrap();

        let graph = BulkLoader::new(&executor, &registry, &entities, &caches)
            .load(vec![typed_post(12, 2, None)], &spec)
            .await
            .unwrap();

        assert!(executor.queries.lock().is_empty());
        assert_eq!(graph.link(graph.roots()[0], "Editor"), Some(&Link::One(None)));
    }

    #[tokio::test]
    async fn test_soft_deleted_rows_filtered() {
        let registry = registry();
        let entities = entities(&registry);
        let caches = ColumnCaches::new(&registry);
        let executor = fixture();
        let spec = registry.bind_str("posts.Author").unwrap();
        let roots = || vec![typed_post(13, 3, None)];

        let graph = BulkLoader::new(&executor, &registry, &entities, &caches)
            .load(roots(), &spec)
            .await
            .unwrap();
        assert_eq!(graph.one(graph.roots()[0], "Author"), None);
        assert!(executor.queries.lock()[0].to_sql().ends_with(r#"AND "deleted_at" IS NULL"#));

        let graph = BulkLoader::new(&executor, &registry, &entities, &caches)
            .with_options(LoadOptions::new().with_deleted())
            .load(roots(), &spec)
            .await
            .unwrap();
        let eve = graph.one(graph.roots()[0], "Author").unwrap();
        assert_eq!(graph.get::<User>(eve).unwrap().name, "eve");
    }

    #[tokio::test]
    async fn test_mismatch_fails_before_any_query() {
        let registry = registry();
        let entities = entities(&registry);
        let caches = ColumnCaches::new(&registry);
        let executor = fixture();
        let spec = registry.bind_str("posts.Author").unwrap();

        let err = BulkLoader::new(&executor, &registry, &entities, &caches)
            .load(vec![User::default()], &spec)
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::IncludeMismatch);
        assert!(executor.queries.lock().is_empty());
    }

    #[tokio::test]
    async fn test_closure_terminates_on_cycles() {
        let registry = registry();
        let entities = entities(&registry);
        let caches = ColumnCaches::new(&registry);
        let executor = fixture();
        let users = registry.resolve_table("users").unwrap();
        let spec = registry.closure(users);

        let graph = BulkLoader::new(&executor, &registry, &entities, &caches)
            .load(vec![User { id: 1, ..Default::default() }], &spec)
            .await
            .unwrap();

        // ada, her posts 10 and 11 (authored) plus 10 (edited), bob as editor
        // of 11, then bob's post 12.
        let ada = graph.roots()[0];
        assert_eq!(graph.many(ada, "Posts").len(), 2);
        assert_eq!(graph.many(ada, "EditedPosts").len(), 1);
        let bob = graph.find(graph.table(ada), &KeyValue::Int(2)).unwrap();
        assert_eq!(graph.many(bob, "Posts").len(), 1);
        assert_eq!(graph.len(), 5);
    }

    #[tokio::test]
    async fn test_into_roots_returns_typed_roots() {
        let registry = registry();
        let entities = entities(&registry);
        let caches = ColumnCaches::new(&registry);
        let executor = fixture();
        let spec = registry.bind_str("posts.Author").unwrap();

        let graph = BulkLoader::new(&executor, &registry, &entities, &caches)
            .load(vec![typed_post(10, 1, Some(1))], &spec)
            .await
            .unwrap();
        assert!(is_entity::<Post>(graph.record(graph.roots()[0])));
        let posts: Vec<Post> = graph.into_roots();
        assert_eq!(posts[0].id, 10);
    }
}
