//! Integration tests for catalog introspection and reference resolution.
//!
//! These tests run the introspector over an in-memory catalog configured
//! from TOML, the way a generator run would against a live database.

use pretty_assertions::assert_eq;
use strata::introspect::{ColumnRow, IntrospectError, Introspector, MemoryCatalog};
use strata::schema::{Cardinality, Direction, GeneratorConfig, QualifiedName, ReferenceOrigin, Registry, ScalarKind};

fn name(table: &str) -> QualifiedName {
    QualifiedName::new("public", table)
}

fn blog_catalog() -> MemoryCatalog {
    MemoryCatalog::new()
        .table(
            name("users"),
            vec![
                ColumnRow::new(1, "id", "bigint").primary().default_expr("nextval('users_id_seq')"),
                ColumnRow::new(2, "email", "character varying(255)").unique(),
                ColumnRow::new(4, "role", "user_role").enum_variants(["admin", "member"]),
                ColumnRow::new(5, "deleted_at", "timestamp with time zone").nullable(),
            ],
        )
        .table(
            name("posts"),
            vec![
                ColumnRow::new(1, "id", "bigint").primary(),
                ColumnRow::new(2, "author_id", "bigint"),
                ColumnRow::new(3, "editor_id", "bigint").nullable(),
                ColumnRow::new(4, "title", "text"),
                ColumnRow::new(5, "tags", "text[]"),
                ColumnRow::new(6, "updated_at", "timestamp with time zone"),
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
                ColumnRow::new(1, "id", "integer").primary(),
                ColumnRow::new(2, "manager_id", "integer").nullable(),
            ],
        )
        .foreign_key("posts_author_fk", name("posts"), &["author_id"], name("users"), &["id"])
        .foreign_key("posts_editor_fk", name("posts"), &["editor_id"], name("users"), &["id"])
        .foreign_key("profiles_user_fk", name("profiles"), &["user_id"], name("users"), &["id"])
        .foreign_key("employees_manager_fk", name("employees"), &["manager_id"], name("employees"), &["id"])
}

const BLOG_CONFIG: &str = r#"
schema = "public"

[[tables]]
name = "users"

[[tables]]
name = "posts"
includes = { with_author = "posts.Author", full = "posts.{Author.Profiles->profile, Editor}" }

[[tables]]
name = "profiles"

[[tables]]
name = "employees"
"#;

async fn blog() -> Registry {
    let config = GeneratorConfig::from_str(BLOG_CONFIG).expect("Failed to parse config");
    Introspector::new(blog_catalog(), config)
        .introspect()
        .await
        .expect("Failed to introspect")
}

#[tokio::test]
async fn test_columns_keep_catalog_order_and_flags() {
    let registry = blog().await;
    let users = registry.table(registry.resolve_table("users").unwrap());

    let names: Vec<&str> = users.column_names().map(|c| c.as_str()).collect();
    assert_eq!(names, vec!["id", "email", "role", "deleted_at"]);

    // Ordinals with gaps are kept as attribute numbers, indices stay dense.
    assert_eq!(users.columns[2].attnum, 4);
    assert_eq!(users.columns[2].index, 2);
    assert!(users.columns[0].has_default);
    assert!(users.columns[1].is_unique_key());
    assert_eq!(users.columns[2].ty.enum_variants, vec!["admin", "member"]);
    assert_eq!(users.soft_delete, Some(3));

    let posts = registry.table(registry.resolve_table("posts").unwrap());
    assert!(posts.columns[4].ty.is_array());
    assert_eq!(posts.columns[4].ty.element, Some(ScalarKind::Text));
    assert_eq!(posts.updated_at, Some(5));
    assert_eq!(posts.soft_delete, None);
}

#[tokio::test]
async fn test_clashing_defaults_use_fk_columns() {
    let registry = blog().await;
    let posts = registry.resolve_table("posts").unwrap();
    let users = registry.resolve_table("users").unwrap();

    let author = registry.relation(posts, "Author").expect("Author relation");
    assert_eq!(author.direction, Direction::Outgoing);
    assert_eq!(author.target(), users);
    assert!(!author.reference.nullable);
    assert_eq!(
        author.reference.origin,
        ReferenceOrigin::ForeignKey("posts_author_fk".into())
    );

    let editor = registry.relation(posts, "Editor").expect("Editor relation");
    assert!(editor.reference.nullable);

    let mut names: Vec<&str> = registry.relations(users).map(|r| r.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["PostsByAuthor", "PostsByEditor", "Profiles"]);
}

#[tokio::test]
async fn test_unique_fk_is_one_to_one() {
    let registry = blog().await;
    let users = registry.resolve_table("users").unwrap();

    let profiles = registry.relation(users, "Profiles").unwrap();
    assert_eq!(profiles.direction, Direction::Incoming);
    assert_eq!(profiles.reference.cardinality, Cardinality::OneToOne);

    let posts = registry.relation(users, "PostsByAuthor").unwrap();
    assert_eq!(posts.reference.cardinality, Cardinality::OneToMany);
}

#[tokio::test]
async fn test_self_reference_names_both_directions() {
    let registry = blog().await;
    let employees = registry.resolve_table("employees").unwrap();

    let manager = registry.relation(employees, "Manager").unwrap();
    assert!(manager.reference.is_self_reference());
    assert_eq!(manager.direction, Direction::Outgoing);

    let reports = registry.relation(employees, "EmployeesByManager").unwrap();
    assert_eq!(reports.direction, Direction::Incoming);
    assert_eq!(reports.reference.id, manager.reference.id);
}

#[tokio::test]
async fn test_custom_includes_are_bound() {
    let registry = blog().await;
    let posts = registry.resolve_table("posts").unwrap();

    let full = registry.include(posts, "full").expect("full spec");
    let root = full.root_node();
    assert_eq!(root.edges.keys().map(|k| k.as_str()).collect::<Vec<_>>(), vec!["Author", "Editor"]);
    let author = full.graph().node(root.edges["Author"].target);
    assert!(author.edges.contains_key("profile"));

    assert!(registry.include(posts, "missing").is_none());
}

#[tokio::test]
async fn test_belongs_to_declares_and_overrides() {
    let config = GeneratorConfig::from_str(
        r#"
        [[tables]]
        name = "users"

        [[tables]]
        name = "posts"

        [[tables.belongs_to]]
        table = "users"
        column = "author_id"
        name = "Writer"
        inverse_name = "Writings"

        [[tables.belongs_to]]
        table = "users"
        column = "editor_id"
        one_to_one = true
        "#,
    )
    .unwrap();
    // Only the author FK exists in the catalog; the editor link is declared.
    let catalog = MemoryCatalog::new()
        .table(name("users"), vec![ColumnRow::new(1, "id", "bigint").primary()])
        .table(
            name("posts"),
            vec![
                ColumnRow::new(1, "id", "bigint").primary(),
                ColumnRow::new(2, "author_id", "bigint"),
                ColumnRow::new(3, "editor_id", "bigint").nullable(),
            ],
        )
        .foreign_key("posts_author_fk", name("posts"), &["author_id"], name("users"), &["id"]);

    let registry = Introspector::new(catalog, config).introspect().await.unwrap();
    let posts = registry.resolve_table("posts").unwrap();
    let users = registry.resolve_table("users").unwrap();
    assert_eq!(registry.references().len(), 2);

    let writer = registry.relation(posts, "Writer").unwrap();
    assert!(matches!(writer.reference.origin, ReferenceOrigin::ForeignKey(_)));
    assert!(registry.relation(users, "Writings").is_some());

    // Unnamed and unclashed, the declared link takes the type-name defaults.
    let editor = registry.relation(posts, "Users").unwrap();
    assert!(registry.relation(users, "Posts").is_some());
    assert_eq!(editor.reference.origin, ReferenceOrigin::Declared);
    assert_eq!(editor.reference.cardinality, Cardinality::OneToOne);
    assert!(editor.reference.nullable);
}

#[tokio::test]
async fn test_fk_inference_can_be_disabled() {
    let config = GeneratorConfig::from_str(
        r#"
        [[tables]]
        name = "users"

        [[tables]]
        name = "profiles"
        infer_foreign_keys = false
        "#,
    )
    .unwrap();
    let registry = Introspector::new(blog_catalog(), config).introspect().await.unwrap();
    assert!(registry.references().is_empty());
}

#[tokio::test]
async fn test_introspection_errors() {
    let introspect = |catalog: MemoryCatalog, toml: &str| {
        let config = GeneratorConfig::from_str(toml).unwrap();
        async move { Introspector::new(catalog, config).introspect().await }
    };

    let err = introspect(MemoryCatalog::new(), "[[tables]]\nname = \"ghosts\"").await.unwrap_err();
    assert!(matches!(err, IntrospectError::TableNotFound { ref table } if table == "public.ghosts"));

    let keyless = MemoryCatalog::new().table(name("logs"), vec![ColumnRow::new(1, "line", "text")]);
    let err = introspect(keyless, "[[tables]]\nname = \"logs\"").await.unwrap_err();
    assert!(matches!(err, IntrospectError::MissingPrimaryKey { .. }));

    let composite = MemoryCatalog::new().table(
        name("pairs"),
        vec![ColumnRow::new(1, "a", "int").primary(), ColumnRow::new(2, "b", "int").primary()],
    );
    let err = introspect(composite, "[[tables]]\nname = \"pairs\"").await.unwrap_err();
    assert!(matches!(err, IntrospectError::CompositePrimaryKey { ref columns, .. } if columns.len() == 2));

    let err = introspect(
        blog_catalog(),
        "[[tables]]\nname = \"users\"\n[[tables]]\nname = \"posts\"\n[[tables.belongs_to]]\ntable = \"users\"\ncolumn = \"nope\"",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, IntrospectError::UnknownColumn { ref column, .. } if column == "nope"));
}
