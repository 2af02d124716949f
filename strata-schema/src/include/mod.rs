//! Include specs: the eager-loading traversal language.
//!
//! Text such as `posts.{Author.Profile, Comments.User->commenter}` parses into an
//! [`IncludeSpec`], binds against a [`Registry`](crate::Registry) into a
//! [`BoundSpec`], and drives the runtime loader.

mod closure;
mod graph;
pub mod lexer;
mod parser;
mod spec;

pub(crate) use closure::build_closure;
pub use graph::{BoundSpec, SpecEdge, SpecGraph, SpecNode};
pub use parser::parse;
pub use spec::{IncludeMap, IncludeRelation, IncludeSpec};
