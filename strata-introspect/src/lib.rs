//! # strata-introspect
//!
//! Reads table and foreign-key metadata from a database catalog and resolves
//! it into a [`Registry`](strata_schema::Registry).
//!
//! The catalog is reached through the [`CatalogSource`] trait. The PostgreSQL
//! implementation lives in `strata-postgres`; [`MemoryCatalog`] serves offline
//! generation and tests.
//!
//! ```rust
//! use strata_introspect::{ColumnRow, Introspector, MemoryCatalog};
//! use strata_schema::{GeneratorConfig, QualifiedName, TableConfig};
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! let users = QualifiedName::new("public", "users");
//! let catalog = MemoryCatalog::new().table(users, vec![ColumnRow::new(1, "id", "bigint").primary()]);
//! let config = GeneratorConfig::default().table(TableConfig::new("users"));
//!
//! let registry = Introspector::new(catalog, config).introspect().await.unwrap();
//! assert_eq!(registry.tables().len(), 1);
//! # });
//! # }
//! ```

pub mod catalog;
pub mod error;
pub mod introspector;
mod naming;

pub use catalog::{CatalogSource, ColumnRow, ForeignKeyRow, MemoryCatalog};
pub use error::{IntrospectError, IntrospectResult};
pub use introspector::Introspector;
