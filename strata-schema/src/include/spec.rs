//! The syntactic include spec tree and its canonical printer.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use smol_str::SmolStr;

use super::lexer::is_bare;
use super::parser;
use crate::error::{SchemaError, SchemaResult};

/// A tree of relations to eager-load, rooted at a table.
///
/// Two specs compare equal when they request the same relations under the
/// same aliases, regardless of how the text was written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncludeSpec {
    /// Root table identifier.
    pub table: SmolStr,
    /// Relations loaded from the root.
    pub relations: IncludeMap,
}

impl IncludeSpec {
    /// A spec loading nothing but the root table.
    pub fn new(table: impl Into<SmolStr>) -> Self {
        Self {
            table: table.into(),
            relations: IncludeMap::default(),
        }
    }

    /// Parse include spec text.
    pub fn parse(text: &str) -> SchemaResult<Self> {
        parser::parse(text)
    }

    /// Add a relation under its own name.
    pub fn with(mut self, relation: impl Into<SmolStr>, children: IncludeMap) -> Self {
        let relation = relation.into();
        self.relations.insert(relation.clone(), IncludeRelation::new(relation, children));
        self
    }
}

impl FromStr for IncludeSpec {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Prints the canonical text. A renamed entry in a group of two or more
/// relations can only be built programmatically; it prints as
/// `relation->alias` but does not parse back, since group elements start
/// with a plain identifier.
impl fmt::Display for IncludeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_ident(f, &self.table)?;
        if !self.relations.is_empty() {
            f.write_str(".")?;
            write_map(f, &self.relations)?;
        }
        Ok(())
    }
}

/// One requested relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncludeRelation {
    /// Accessor name of the underlying relation.
    pub relation: SmolStr,
    /// Relations loaded from the related records.
    pub children: IncludeMap,
}

impl IncludeRelation {
    /// Create a relation entry.
    pub fn new(relation: impl Into<SmolStr>, children: IncludeMap) -> Self {
        Self {
            relation: relation.into(),
            children,
        }
    }
}

/// Alias to relation entry. Keys are unique and ordered, so equality and
/// printing ignore the order relations were written in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct IncludeMap(BTreeMap<SmolStr, IncludeRelation>);

impl IncludeMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry; returns the displaced entry for a repeated alias.
    pub fn insert(&mut self, alias: SmolStr, relation: IncludeRelation) -> Option<IncludeRelation> {
        self.0.insert(alias, relation)
    }

    /// Builder-style insert of a relation under its own name.
    pub fn with(mut self, relation: impl Into<SmolStr>, children: IncludeMap) -> Self {
        let relation = relation.into();
        self.0.insert(relation.clone(), IncludeRelation::new(relation, children));
        self
    }

    /// Builder-style insert of a renamed relation.
    pub fn with_alias(
        mut self,
        relation: impl Into<SmolStr>,
        alias: impl Into<SmolStr>,
        children: IncludeMap,
    ) -> Self {
        self.0.insert(alias.into(), IncludeRelation::new(relation, children));
        self
    }

    /// Look up an entry by alias.
    pub fn get(&self, alias: &str) -> Option<&IncludeRelation> {
        self.0.get(alias)
    }

    /// Check if an alias is present.
    pub fn contains(&self, alias: &str) -> bool {
        self.0.contains_key(alias)
    }

    /// Entries in alias order.
    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &IncludeRelation)> {
        self.0.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn write_ident(f: &mut fmt::Formatter<'_>, ident: &str) -> fmt::Result {
    if is_bare(ident) {
        f.write_str(ident)
    } else {
        write!(f, "\"{}\"", ident.replace('"', "\"\""))
    }
}

fn write_map(f: &mut fmt::Formatter<'_>, map: &IncludeMap) -> fmt::Result {
    if map.len() == 1 {
        if let Some((alias, relation)) = map.iter().next() {
            return write_entry(f, alias, relation);
        }
    }

    f.write_str("{")?;
    for (i, (alias, relation)) in map.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_entry(f, alias, relation)?;
    }
    f.write_str("}")
}

fn write_entry(f: &mut fmt::Formatter<'_>, alias: &str, relation: &IncludeRelation) -> fmt::Result {
    write_ident(f, &relation.relation)?;
    if alias != relation.relation.as_str() {
        f.write_str("->")?;
        write_ident(f, alias)?;
    }
    if !relation.children.is_empty() {
        f.write_str(".")?;
        write_map(f, &relation.children)?;
    }
    Ok(())
}
