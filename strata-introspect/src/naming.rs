//! Default accessor names for references.

use convert_case::{Case, Casing};
use smol_str::SmolStr;
use strata_schema::TableMeta;

/// Parent accessor on the referencing table: the referenced table's type name.
pub(crate) fn forward(target: &TableMeta) -> SmolStr {
    target.type_name().into()
}

/// Children accessor on the referenced table: the referencing table's type name.
pub(crate) fn inverse(source: &TableMeta) -> SmolStr {
    source.type_name().into()
}

/// Parent accessor named after the FK columns: `editor_id` becomes `Editor`.
pub(crate) fn forward_by_column(source: &TableMeta, fk_columns: &[usize]) -> SmolStr {
    column_stem(source, fk_columns).into()
}

/// Children accessor qualified by the FK columns: `PostsByEditor`.
pub(crate) fn inverse_by_column(source: &TableMeta, fk_columns: &[usize]) -> SmolStr {
    format!("{}By{}", source.type_name(), column_stem(source, fk_columns)).into()
}

fn column_stem(table: &TableMeta, columns: &[usize]) -> String {
    columns
        .iter()
        .map(|index| {
            let name = table.columns[*index].name.as_str();
            let stem = name.strip_suffix("_id").filter(|s| !s.is_empty()).unwrap_or(name);
            stem.to_case(Case::Pascal)
        })
        .collect()
}
