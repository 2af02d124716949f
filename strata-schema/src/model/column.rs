//! Column metadata and scalar type descriptors.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Primitive kind of a column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    /// `boolean`.
    Bool,
    /// `smallint`.
    Int16,
    /// `integer`.
    Int32,
    /// `bigint`.
    Int64,
    /// `real`.
    Float32,
    /// `double precision`.
    Float64,
    /// `numeric` / `decimal`.
    Numeric,
    /// Any character type.
    Text,
    /// `bytea`.
    Bytes,
    /// `uuid`.
    Uuid,
    /// `date`.
    Date,
    /// `time` with or without zone.
    Time,
    /// `timestamp without time zone`.
    Timestamp,
    /// `timestamp with time zone`.
    TimestampTz,
    /// `json` / `jsonb`.
    Json,
    /// A user-defined enum.
    Enum,
    /// An array; see [`ScalarType::element`].
    Array,
    /// Anything else.
    Other,
}

impl ScalarKind {
    /// Map a formatted database type (without array suffix) to a kind.
    pub fn from_formatted(formatted: &str) -> Self {
        // `timestamp(3) with time zone` carries its modifier mid-name.
        let stripped = match (formatted.find('('), formatted.find(')')) {
            (Some(open), Some(close)) if open < close => {
                format!("{}{}", &formatted[..open], &formatted[close + 1..])
            }
            _ => formatted.to_string(),
        };
        let base = stripped.trim();
        match base {
            "boolean" | "bool" => Self::Bool,
            "smallint" | "int2" | "smallserial" => Self::Int16,
            "integer" | "int" | "int4" | "serial" => Self::Int32,
            "bigint" | "int8" | "bigserial" => Self::Int64,
            "real" | "float4" => Self::Float32,
            "double precision" | "float8" => Self::Float64,
            "numeric" | "decimal" => Self::Numeric,
            "text" | "character varying" | "varchar" | "character" | "char" | "name"
            | "citext" => Self::Text,
            "bytea" => Self::Bytes,
            "uuid" => Self::Uuid,
            "date" => Self::Date,
            "timestamp without time zone" | "timestamp" => Self::Timestamp,
            "timestamp with time zone" | "timestamptz" => Self::TimestampTz,
            "json" | "jsonb" => Self::Json,
            _ if base.starts_with("time") => Self::Time,
            _ => Self::Other,
        }
    }
}

/// Describes the type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarType {
    /// The type exactly as the database formats it.
    pub formatted: SmolStr,
    /// Primitive kind.
    pub kind: ScalarKind,
    /// Element kind when `kind` is [`ScalarKind::Array`].
    pub element: Option<ScalarKind>,
    /// Variants when the column (or its element) is an enum.
    pub enum_variants: Vec<SmolStr>,
}

impl ScalarType {
    /// Build a descriptor from the formatted type and any enum labels.
    pub fn from_formatted(formatted: &str, enum_variants: Vec<SmolStr>) -> Self {
        let (base, is_array) = match formatted.strip_suffix("[]") {
            Some(base) => (base, true),
            None => (formatted, false),
        };
        let base_kind = if enum_variants.is_empty() {
            ScalarKind::from_formatted(base)
        } else {
            ScalarKind::Enum
        };

        let (kind, element) = if is_array {
            (ScalarKind::Array, Some(base_kind))
        } else {
            (base_kind, None)
        };

        Self {
            formatted: formatted.into(),
            kind,
            element,
            enum_variants,
        }
    }

    /// Check if the column holds an array.
    pub fn is_array(&self) -> bool {
        self.kind == ScalarKind::Array
    }

    /// Check if the column (or its element) is an enum.
    pub fn is_enum(&self) -> bool {
        self.kind == ScalarKind::Enum || self.element == Some(ScalarKind::Enum)
    }
}

/// A resolved column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Generation-time position in the table's column list.
    pub index: usize,
    /// The database's own column number. Not necessarily contiguous.
    pub attnum: i32,
    /// Column name.
    pub name: SmolStr,
    /// Type descriptor.
    pub ty: ScalarType,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Whether the column has a default expression.
    pub has_default: bool,
    /// Whether the column is the primary key.
    pub is_primary: bool,
    /// Whether a single-column unique index covers the column.
    pub is_unique: bool,
}

impl ColumnMeta {
    /// Create a non-null, non-key column. `index` is assigned when the
    /// column is added to a table.
    pub fn new(name: impl Into<SmolStr>, ty: ScalarType) -> Self {
        Self {
            index: 0,
            attnum: 0,
            name: name.into(),
            ty,
            nullable: false,
            has_default: false,
            is_primary: false,
            is_unique: false,
        }
    }

    /// Mark as the primary key.
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self.is_unique = true;
        self
    }

    /// Mark as unique.
    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    /// Mark as nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark as having a default.
    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    /// Set the database column number.
    pub fn with_attnum(mut self, attnum: i32) -> Self {
        self.attnum = attnum;
        self
    }

    /// Whether the column alone identifies at most one row.
    pub fn is_unique_key(&self) -> bool {
        self.is_primary || self.is_unique
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_from_formatted() {
        let ty = ScalarType::from_formatted("character varying(255)", vec![]);
        assert_eq!(ty.kind, ScalarKind::Text);
        assert!(!ty.is_array());

        let ty = ScalarType::from_formatted("timestamp with time zone", vec![]);
        assert_eq!(ty.kind, ScalarKind::TimestampTz);

        let ty = ScalarType::from_formatted("timestamp(3) with time zone", vec![]);
        assert_eq!(ty.kind, ScalarKind::TimestampTz);

        let ty = ScalarType::from_formatted("time without time zone", vec![]);
        assert_eq!(ty.kind, ScalarKind::Time);
    }

    #[test]
    fn test_array_element() {
        let ty = ScalarType::from_formatted("integer[]", vec![]);
        assert_eq!(ty.kind, ScalarKind::Array);
        assert_eq!(ty.element, Some(ScalarKind::Int32));
    }

    #[test]
    fn test_enum_variants() {
        let ty = ScalarType::from_formatted("mood[]", vec!["happy".into(), "sad".into()]);
        assert!(ty.is_array());
        assert!(ty.is_enum());
        assert_eq!(ty.enum_variants.len(), 2);
    }

    #[test]
    fn test_primary_implies_unique() {
        let col = ColumnMeta::new("id", ScalarType::from_formatted("bigint", vec![])).primary();
        assert!(col.is_unique_key());
        assert!(!col.nullable);
    }
}
