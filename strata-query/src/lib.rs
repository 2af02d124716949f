//! # strata-query
//!
//! Runtime half of Strata: the pieces generated data-access code calls into.
//!
//! - [`Entity`] and the [`entity!`] macro bind structs to tables by column order
//! - [`BulkLoader`] follows a bound include spec with one batch query per edge
//!   and level, deduplicating records by primary key
//! - [`ColumnPositions`] maps live result columns onto entity fields and
//!   rebuilds itself when the table's columns drift
//! - [`FieldSet`], [`UpdatePlan`] and [`UpsertPlan`] choose columns for writes
//! - [`Client`] ties a registry, entity bindings and an [`Executor`] together
//!
//! ## Entities
//!
//! ```rust
//! use strata_query::{Entity, Value};
//!
//! strata_query::entity! {
//!     pub struct Post in "public.posts" {
//!         pub id: i64,
//!         pub author_id: i64,
//!         pub title: String,
//!     }
//! }
//!
//! let mut post = Post::default();
//! post.set(2, Value::from("Hello")).unwrap();
//! assert_eq!(post.title, "Hello");
//! ```
//!
//! ## Field sets
//!
//! ```rust
//! use strata_query::FieldSet;
//!
//! let mut fields = FieldSet::new(3);
//! fields.insert(0);
//! fields.insert(2);
//! let copy = fields.clone();
//! fields.remove(2);
//! assert_eq!(copy.iter().collect::<Vec<_>>(), vec![0, 2]);
//! assert_eq!(fields.count(), 1);
//! ```
//!
//! ## Errors
//!
//! ```rust
//! use strata_query::{ErrorKind, QueryError};
//!
//! let err = QueryError::include_mismatch("public.users", "public.posts");
//! assert_eq!(err.kind(), ErrorKind::Usage);
//! ```

pub mod client;
pub mod entity;
pub mod error;
pub mod executor;
pub mod field_set;
pub mod loader;
pub mod logging;
pub mod positions;
pub mod value;
pub mod write;

pub use client::{Client, ClientBuilder, FetchMode};
pub use entity::{Entity, EntitySet, Record};
pub use error::{ErrorCode, ErrorContext, ErrorKind, QueryError, QueryResult};
pub use executor::{BatchQuery, Executor, RowSet, quote_ident, quote_table};
pub use field_set::FieldSet;
pub use loader::{BulkLoader, Link, LoadOptions, LoadedGraph, RecordId};
pub use positions::{ColumnCaches, ColumnPositions, PositionMap, Slot};
pub use value::{FromValue, KeyValue, RowKey, Value};
pub use write::{UpdatePlan, UpsertOptions, UpsertPlan};
