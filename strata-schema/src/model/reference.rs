//! References between tables.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{ReferenceId, TableId};

/// How many rows on the referencing side can point at one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// The FK columns are unique: at most one referencing row per key.
    OneToOne,
    /// Any number of referencing rows per key.
    OneToMany,
}

impl Cardinality {
    /// Check if this is one-to-one.
    pub fn is_one_to_one(&self) -> bool {
        matches!(self, Self::OneToOne)
    }
}

/// Which way a relation is traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// From the table holding the FK to the table it points to.
    Outgoing,
    /// From the pointed-to table back to the rows referencing it.
    Incoming,
}

/// Where a reference came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceOrigin {
    /// Inferred from a foreign-key constraint.
    ForeignKey(SmolStr),
    /// Declared by a `belongs_to` configuration entry.
    Declared,
}

/// A foreign-key relationship between two resolved tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Arena index, assigned by the registry builder.
    pub id: ReferenceId,
    /// The table whose key is referenced.
    pub points_to: TableId,
    /// Key columns on `points_to`, parallel to `fk_columns`.
    pub key_columns: Vec<usize>,
    /// The table holding the FK.
    pub points_from: TableId,
    /// FK columns on `points_from`.
    pub fk_columns: Vec<usize>,
    /// Cardinality seen from `points_to`.
    pub cardinality: Cardinality,
    /// Whether any FK column is nullable.
    pub nullable: bool,
    /// Accessor name on `points_from` (the parent accessor).
    pub name: SmolStr,
    /// Accessor name on `points_to` (the children accessor).
    pub inverse_name: SmolStr,
    /// Where the reference came from.
    pub origin: ReferenceOrigin,
}

impl Reference {
    /// Create a reference. The id is replaced when it is registered.
    pub fn new(
        points_from: TableId,
        fk_columns: Vec<usize>,
        points_to: TableId,
        key_columns: Vec<usize>,
    ) -> Self {
        Self {
            id: ReferenceId(0),
            points_to,
            key_columns,
            points_from,
            fk_columns,
            cardinality: Cardinality::OneToMany,
            nullable: false,
            name: SmolStr::default(),
            inverse_name: SmolStr::default(),
            origin: ReferenceOrigin::Declared,
        }
    }

    /// Set the cardinality.
    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// Set nullability.
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set both accessor names.
    pub fn with_names(mut self, name: impl Into<SmolStr>, inverse_name: impl Into<SmolStr>) -> Self {
        self.name = name.into();
        self.inverse_name = inverse_name.into();
        self
    }

    /// Set the origin.
    pub fn with_origin(mut self, origin: ReferenceOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Whether the reference points from a table to itself.
    pub fn is_self_reference(&self) -> bool {
        self.points_from == self.points_to
    }

    /// The table reached when traversing in `direction`.
    pub fn target(&self, direction: Direction) -> TableId {
        match direction {
            Direction::Outgoing => self.points_to,
            Direction::Incoming => self.points_from,
        }
    }

    /// Accessor name when traversing in `direction`.
    pub fn name_for(&self, direction: Direction) -> &SmolStr {
        match direction {
            Direction::Outgoing => &self.name,
            Direction::Incoming => &self.inverse_name,
        }
    }
}

/// One relation seen from a particular table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation<'r> {
    /// Accessor name on the source table.
    pub name: &'r SmolStr,
    /// The underlying reference.
    pub reference: &'r Reference,
    /// Traversal direction.
    pub direction: Direction,
}

impl Relation<'_> {
    /// The table this relation leads to.
    pub fn target(&self) -> TableId {
        self.reference.target(self.direction)
    }

    /// Whether traversal yields at most one record.
    pub fn is_single(&self) -> bool {
        match self.direction {
            Direction::Outgoing => true,
            Direction::Incoming => self.reference.cardinality.is_one_to_one(),
        }
    }
}
