//! Integration tests for the runtime: introspect an in-memory catalog, bind
//! entities, and load include specs through a client over a fake database.

use std::collections::HashMap;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use strata::introspect::{ColumnRow, Introspector, MemoryCatalog};
use strata::query::{
    BatchQuery, Client, ErrorCode, Executor, FetchMode, Link, LoadOptions, QueryResult, RowKey, RowSet, Value,
};
use strata::schema::{GeneratorConfig, QualifiedName, Registry};

strata::entity! {
    pub struct User in "users" {
        pub id: i64,
        pub name: String,
        pub deleted_at: Option<String>,
    }
}

strata::entity! {
    pub struct Post in "posts" {
        pub id: i64,
        pub author_id: i64,
        pub editor_id: Option<i64>,
        pub title: String,
    }
}

strata::entity! {
    pub struct Profile in "profiles" {
        pub id: i64,
        pub user_id: i64,
        pub bio: Option<String>,
    }
}

strata::entity! {
    pub struct Employee in "employees" {
        pub id: i64,
        pub manager_id: Option<i64>,
        pub name: String,
    }
}

fn name(table: &str) -> QualifiedName {
    QualifiedName::new("public", table)
}

async fn registry() -> Registry {
    let catalog = MemoryCatalog::new()
        .table(
            name("users"),
            vec![
                ColumnRow::new(1, "id", "bigint").primary(),
                ColumnRow::new(2, "name", "text"),
                ColumnRow::new(3, "deleted_at", "text").nullable(),
            ],
        )
        .table(
            name("posts"),
            vec![
                ColumnRow::new(1, "id", "bigint").primary(),
                ColumnRow::new(2, "author_id", "bigint"),
                ColumnRow::new(3, "editor_id", "bigint").nullable(),
                ColumnRow::new(4, "title", "text"),
            ],
        )
        .table(
            name("profiles"),
            vec![
                ColumnRow::new(1, "id", "bigint").primary(),
                ColumnRow::new(2, "user_id", "bigint").unique(),
                ColumnRow::new(3, "bio", "text").nullable(),
            ],
        )
        .table(
            name("employees"),
            vec![
                ColumnRow::new(1, "id", "bigint").primary(),
                ColumnRow::new(2, "manager_id", "bigint").nullable(),
                ColumnRow::new(3, "name", "text"),
            ],
        )
        .foreign_key("posts_author_fk", name("posts"), &["author_id"], name("users"), &["id"])
        .foreign_key("posts_editor_fk", name("posts"), &["editor_id"], name("users"), &["id"])
        .foreign_key("profiles_user_fk", name("profiles"), &["user_id"], name("users"), &["id"])
        .foreign_key("employees_manager_fk", name("employees"), &["manager_id"], name("employees"), &["id"]);

    let config = GeneratorConfig::from_str(
        r#"
        [[tables]]
        name = "users"

        [[tables]]
        name = "posts"
        includes = { people = "posts.{Author.Profiles, Editor}" }

        [[tables]]
        name = "profiles"

        [[tables]]
        name = "employees"
        "#,
    )
    .unwrap();
    Introspector::new(catalog, config).introspect().await.unwrap()
}

/// A tiny in-memory database: tables of rows in live column order.
#[derive(Default)]
struct FakeDb {
    tables: Mutex<HashMap<String, (Vec<String>, Vec<Vec<Value>>)>>,
    queries: Mutex<Vec<BatchQuery>>,
}

impl FakeDb {
    fn table(self, table: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        self.tables
            .lock()
            .insert(table.into(), (columns.iter().map(|c| c.to_string()).collect(), rows));
        self
    }

    /// `ALTER TABLE .. ADD COLUMN` with a default.
    fn add_column(&self, table: &str, column: &str, default: Value) {
        let mut tables = self.tables.lock();
        let (columns, rows) = tables.get_mut(table).unwrap();
        columns.push(column.into());
        for row in rows {
            row.push(default.clone());
        }
    }

    /// `ALTER TABLE .. DROP COLUMN`.
    fn drop_column(&self, table: &str, column: &str) {
        let mut tables = self.tables.lock();
        let (columns, rows) = tables.get_mut(table).unwrap();
        let index = columns.iter().position(|c| c == column).unwrap();
        columns.remove(index);
        for row in rows {
            row.remove(index);
        }
    }

    fn query_count(&self) -> usize {
        self.queries.lock().len()
    }
}

#[async_trait::async_trait]
impl Executor for FakeDb {
    async fn fetch(&self, query: &BatchQuery) -> QueryResult<RowSet> {
        self.queries.lock().push(query.clone());
        let tables = self.tables.lock();
        let (columns, rows) = &tables[query.table.name.as_str()];
        let position = |name: &str| columns.iter().position(|c| c == name).unwrap();
        let keys: Vec<usize> = query.key_columns.iter().map(|k| position(k.as_str())).collect();
        let soft = query.soft_delete.as_ref().map(|c| position(c.as_str()));

        let rows = rows
            .iter()
            .filter(|row| {
                let key: Option<RowKey> = keys.iter().map(|k| row[*k].to_key()).collect();
                key.is_some_and(|k| query.keys.contains(&k))
            })
            .filter(|row| soft.is_none_or(|s| row[s].is_null()))
            .cloned()
            .collect();
        Ok(RowSet::new(columns.len(), rows))
    }

    async fn live_columns(&self, table: &QualifiedName) -> QueryResult<Vec<String>> {
        Ok(self.tables.lock()[table.name.as_str()].0.clone())
    }
}

fn blog() -> FakeDb {
    let user = |id: i64, name: &str, deleted: bool| {
        vec![
            Value::Int(id),
            Value::from(name),
            if deleted { Value::from("2024-01-01") } else { Value::Null },
        ]
    };
    let post = |id: i64, author: i64, editor: Option<i64>, title: &str| {
        vec![Value::Int(id), Value::Int(author), Value::from(editor), Value::from(title)]
    };
    let employee = |id: i64, manager: Option<i64>, name: &str| vec![Value::Int(id), Value::from(manager), Value::from(name)];

    FakeDb::default()
        .table(
            "users",
            &["id", "name", "deleted_at"],
            vec![user(1, "ada", false), user(2, "bob", false), user(3, "eve", true)],
        )
        .table(
            "posts",
            &["id", "author_id", "editor_id", "title"],
            vec![
                post(10, 1, Some(2), "intro"),
                post(11, 2, Some(1), "reply"),
                post(12, 1, None, "draft"),
                post(13, 3, Some(1), "gone"),
            ],
        )
        .table(
            "profiles",
            &["id", "user_id", "bio"],
            vec![vec![Value::Int(100), Value::Int(1), Value::from("mathematician")]],
        )
        .table(
            "employees",
            &["id", "manager_id", "name"],
            vec![
                employee(1, None, "ceo"),
                employee(2, Some(1), "cto"),
                employee(3, Some(2), "engineer"),
                employee(4, Some(2), "intern"),
            ],
        )
}

async fn client(db: FakeDb) -> Client<FakeDb> {
    Client::builder(db, registry().await)
        .entity::<User>()
        .entity::<Post>()
        .entity::<Profile>()
        .entity::<Employee>()
        .build()
        .expect("Failed to build client")
}

#[tokio::test]
async fn test_named_include_loads_level_by_level() {
    let client = client(blog()).await;
    let posts: Vec<Post> = client.get_many([10, 11, 12], FetchMode::Strict).await.unwrap();
    assert_eq!(client.executor().query_count(), 1);

    let spec = client.include::<Post>("people").unwrap();
    let graph = client.load(posts, &spec).await.unwrap();

    // Author and Editor both hit users at depth one; Profiles at depth two.
    let queries = client.executor().queries.lock();
    let tables: Vec<&str> = queries[1..].iter().map(|q| q.table.name.as_str()).collect();
    assert_eq!(tables, vec!["users", "users", "profiles"]);
    drop(queries);

    let intro = graph.roots()[0];
    let ada = graph.one(intro, "Author").unwrap();
    assert_eq!(graph.get::<User>(ada).unwrap().name, "ada");
    let profile = graph.one(ada, "Profiles").unwrap();
    assert_eq!(graph.get::<Profile>(profile).unwrap().bio.as_deref(), Some("mathematician"));
    assert_eq!(graph.parent(profile, "Users"), Some(ada));

    let draft = graph.roots()[2];
    assert_eq!(graph.link(draft, "Editor"), Some(&Link::One(None)));
}

#[tokio::test]
async fn test_diamond_records_are_shared() {
    let client = client(blog()).await;
    let posts: Vec<Post> = client.get_many([10, 11], FetchMode::Strict).await.unwrap();
    let spec = client.bind("posts.{Author, Editor}").unwrap();
    let mut graph = client.load(posts, &spec).await.unwrap();

    let (intro, reply) = (graph.roots()[0], graph.roots()[1]);
    let ada = graph.one(intro, "Author").unwrap();
    assert_eq!(graph.one(reply, "Editor"), Some(ada));
    assert_eq!(graph.len(), 4);

    // A change made through one path is visible through the other.
    graph.get_mut::<User>(ada).unwrap().name = "Ada Lovelace".into();
    let via_editor = graph.one(reply, "Editor").unwrap();
    assert_eq!(graph.get::<User>(via_editor).unwrap().name, "Ada Lovelace");
}

#[tokio::test]
async fn test_two_hop_diamond_shares_the_far_record() {
    let client = client(blog()).await;
    let ada: Vec<User> = client.get_many([1], FetchMode::Strict).await.unwrap();
    // ada wrote intro (edited by bob) and edited reply (written by bob).
    let spec = client.bind("users.{PostsByAuthor.Editor, PostsByEditor.Author}").unwrap();
    let mut graph = client.load(ada, &spec).await.unwrap();

    let ada = graph.roots()[0];
    let intro = graph.many(ada, "PostsByAuthor")[0];
    let reply = graph.many(ada, "PostsByEditor")[0];
    assert_ne!(intro, reply);
    let via_intro = graph.one(intro, "Editor").unwrap();
    let via_reply = graph.one(reply, "Author").unwrap();
    assert_eq!(via_intro, via_reply);
    // ada, four posts and a single bob; eve stays hidden.
    assert_eq!(graph.len(), 6);

    graph.get_mut::<User>(via_intro).unwrap().name = "Robert".into();
    let bob = graph.one(reply, "Author").unwrap();
    assert_eq!(graph.get::<User>(bob).unwrap().name, "Robert");
}

#[tokio::test]
async fn test_incoming_links_and_soft_delete() {
    let client = client(blog()).await;
    let users: Vec<User> = client.get_many([1, 2, 3], FetchMode::Lenient).await.unwrap();
    // eve is soft-deleted.
    assert_eq!(users.len(), 2);

    let spec = client.bind("users.{PostsByAuthor, PostsByEditor}").unwrap();
    let graph = client.load(users, &spec).await.unwrap();
    let ada = graph.roots()[0];
    let titles = |alias: &str| -> Vec<String> {
        graph
            .many(ada, alias)
            .iter()
            .map(|id| graph.get::<Post>(*id).unwrap().title.clone())
            .collect()
    };
    assert_eq!(titles("PostsByAuthor"), vec!["intro", "draft"]);
    assert_eq!(titles("PostsByEditor"), vec!["reply", "gone"]);

    // Soft-deleted parents stay hidden unless asked for.
    let gone: Vec<Post> = client.get_many([13], FetchMode::Strict).await.unwrap();
    let spec = client.bind("posts.Author").unwrap();
    let graph = client.load(gone, &spec).await.unwrap();
    assert_eq!(graph.one(graph.roots()[0], "Author"), None);

    let gone: Vec<Post> = client.get_many([13], FetchMode::Strict).await.unwrap();
    let graph = client
        .load_with(gone, &spec, LoadOptions::new().with_deleted())
        .await
        .unwrap();
    let eve = graph.one(graph.roots()[0], "Author").unwrap();
    assert_eq!(graph.get::<User>(eve).unwrap().name, "eve");
}

#[tokio::test]
async fn test_closure_over_self_reference_terminates() {
    let client = client(blog()).await;
    let intern: Employee = client.get(4).await.unwrap();
    let spec = client.closure::<Employee>().unwrap();

    let graph = client.load(vec![intern], &spec).await.unwrap();
    // Walking up and down the hierarchy reaches everyone exactly once.
    assert_eq!(graph.len(), 4);

    let intern = graph.roots()[0];
    let cto = graph.one(intern, "Manager").unwrap();
    let ceo = graph.one(cto, "Manager").unwrap();
    assert_eq!(graph.get::<Employee>(ceo).unwrap().name, "ceo");
    assert_eq!(graph.one(ceo, "Manager"), None);

    let reports: Vec<&str> = graph
        .many(cto, "EmployeesByManager")
        .iter()
        .map(|id| graph.get::<Employee>(*id).unwrap().name.as_str())
        .collect();
    assert_eq!(reports, vec!["engineer", "intern"]);
    assert!(graph.many(cto, "EmployeesByManager").contains(&intern));
}

#[tokio::test]
async fn test_column_drift_is_absorbed() {
    let client = client(blog()).await;
    let before: User = client.get(1).await.unwrap();
    assert_eq!(client.positions::<User>().unwrap().rebuilds(), 1);

    // A column added after generation is discarded on scan.
    client.executor().add_column("users", "nickname", Value::from("al"));
    let after: User = client.get(1).await.unwrap();
    assert_eq!(after.name, before.name);
    assert_eq!(client.positions::<User>().unwrap().rebuilds(), 2);

    // Dropped and re-added, `name` moves to the end but keeps its field.
    client.executor().drop_column("users", "nickname");
    client.executor().drop_column("users", "name");
    client.executor().add_column("users", "name", Value::from("renamed"));
    let moved: User = client.get(1).await.unwrap();
    assert_eq!(moved.name, "renamed");
    assert_eq!(moved.id, 1);

    // Stable layout: no further rebuilds.
    client.get::<User>(2).await.unwrap();
    assert_eq!(client.caches().total_rebuilds(), 3);
}

#[tokio::test]
async fn test_fetch_errors() {
    let client = client(blog()).await;

    let err = client.get::<User>(99).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::RecordNotFound);
    assert!(err.is_not_found());

    let err = client.get_many::<User, _>([1, 98, 99], FetchMode::Strict).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::RecordNotFound);
    assert!(err.context.operation.as_deref().unwrap_or_default().contains("2 of 3"));

    let posts: Vec<Post> = client.get_many([10], FetchMode::Strict).await.unwrap();
    let queries = client.executor().query_count();
    let err = client.load(posts, &client.bind("users.Profiles").unwrap()).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::IncludeMismatch);
    assert_eq!(client.executor().query_count(), queries);

    assert_eq!(client.include::<Post>("nope").unwrap_err().code, ErrorCode::InvalidInclude);
}
