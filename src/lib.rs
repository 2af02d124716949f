//! # Strata
//!
//! Schema-driven data access for PostgreSQL.
//!
//! Strata provides:
//! - Introspection of tables, columns and foreign keys into a typed [`Registry`]
//! - A bidirectional reference graph with generated relation names
//! - Include specs describing which relations to eager-load, and closure
//!   specs covering every reachable relation
//! - A runtime bulk loader issuing one batch query per relation and level,
//!   with identity deduplication and a self-healing column-position cache
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use strata::prelude::*;
//!
//! strata::entity! {
//!     pub struct User in "public.users" {
//!         pub id: i64,
//!         pub email: String,
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = PgPool::connect("postgresql://localhost/mydb")?;
//!     let config = GeneratorConfig::from_file("strata.toml")?;
//!     let registry = Introspector::new(PgCatalog::new(pool.clone()), config)
//!         .introspect()
//!         .await?;
//!
//!     let client = Client::builder(PgExecutor::new(pool), registry)
//!         .entity::<User>()
//!         .build()?;
//!
//!     let users = client.get_many::<User, _>([1, 2, 3], FetchMode::Lenient).await?;
//!     let graph = client.load(users, &client.include::<User>("with_posts")?).await?;
//!
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Metadata model and include-spec engine.
pub mod schema {
    pub use strata_schema::*;
}

/// Catalog introspection.
pub mod introspect {
    pub use strata_introspect::*;
}

/// Runtime loader, caches and entity binding.
pub mod query {
    pub use strata_query::*;
}

/// PostgreSQL backend.
#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres {
    pub use strata_postgres::*;
}

pub use strata_query::entity;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::introspect::{CatalogSource, Introspector, MemoryCatalog};
    pub use crate::query::{
        Client, Entity, Executor, FetchMode, FieldSet, LoadOptions, LoadedGraph, QueryError, QueryResult, Value,
    };
    pub use crate::schema::{BoundSpec, GeneratorConfig, IncludeSpec, QualifiedName, Registry, TableConfig};

    #[cfg(feature = "postgres")]
    pub use crate::postgres::{PgCatalog, PgConfig, PgExecutor, PgPool};
}

// Re-export key types at the crate root
pub use schema::{IncludeSpec, Registry, SchemaError};
pub use introspect::{IntrospectError, Introspector};
pub use query::{Client, QueryError};
