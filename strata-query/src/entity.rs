//! Entity binding: typed structs whose fields follow a table's column order.
//!
//! Field accessors are generated by [`entity!`](crate::entity) and indexed by
//! generation-time column ordinal, so scanning a row never looks fields up
//! by name.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use strata_schema::{Registry, TableId};

use crate::error::{QueryError, QueryResult};
use crate::value::Value;

/// A struct bound to one table.
pub trait Entity: Default + fmt::Debug + Send + Sync + 'static {
    /// Table name, `schema.table` or a name unique across schemas.
    const TABLE: &'static str;

    /// Field names in column order.
    const FIELDS: &'static [&'static str];

    /// Read a field by column ordinal.
    fn get(&self, index: usize) -> Value;

    /// Write a field by column ordinal.
    fn set(&mut self, index: usize, value: Value) -> QueryResult<()>;
}

/// Object-safe view of an entity, used where the table is only known at runtime.
pub trait Record: fmt::Debug + Send + Sync + 'static {
    /// Read a field by column ordinal.
    fn field(&self, index: usize) -> Value;

    /// Write a field by column ordinal.
    fn set_field(&mut self, index: usize, value: Value) -> QueryResult<()>;

    /// Upcast for downcasting to the concrete entity.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Consume into `Box<dyn Any>`.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<E: Entity> Record for E {
    fn field(&self, index: usize) -> Value {
        self.get(index)
    }

    fn set_field(&mut self, index: usize, value: Value) -> QueryResult<()> {
        self.set(index, value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Binding {
    type_name: &'static str,
    create: fn() -> Box<dyn Record>,
}

fn create<E: Entity>() -> Box<dyn Record> {
    Box::new(E::default())
}

/// Entity types bound to registry tables.
#[derive(Debug, Clone, Default)]
pub struct EntitySet {
    by_table: HashMap<TableId, Binding>,
    by_type: HashMap<TypeId, TableId>,
}

impl EntitySet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `E` to its table, checking that its fields match the columns.
    pub fn register<E: Entity>(&mut self, registry: &Registry) -> QueryResult<TableId> {
        let table_id = registry.resolve_table(E::TABLE).map_err(|e| {
            QueryError::entity_mismatch(E::TABLE, e.to_string()).with_field(std::any::type_name::<E>())
        })?;
        let table = registry.table(table_id);

        let columns: Vec<&str> = table.column_names().map(|c| c.as_str()).collect();
        if columns != E::FIELDS {
            return Err(QueryError::entity_mismatch(
                table.name.to_string(),
                format!(
                    "{} has fields [{}] but the table has columns [{}]",
                    std::any::type_name::<E>(),
                    E::FIELDS.join(", "),
                    columns.join(", ")
                ),
            ));
        }

        if let Some(existing) = self.by_table.get(&table_id) {
            if self.by_type.get(&TypeId::of::<E>()) != Some(&table_id) {
                return Err(QueryError::entity_mismatch(
                    table.name.to_string(),
                    format!("already bound to {}", existing.type_name),
                ));
            }
        }

        self.by_table.insert(
            table_id,
            Binding {
                type_name: std::any::type_name::<E>(),
                create: create::<E>,
            },
        );
        self.by_type.insert(TypeId::of::<E>(), table_id);
        Ok(table_id)
    }

    /// The table `E` is bound to.
    pub fn table_of<E: Entity>(&self) -> QueryResult<TableId> {
        self.by_type.get(&TypeId::of::<E>()).copied().ok_or_else(|| {
            QueryError::entity_mismatch(E::TABLE, format!("{} is not registered", std::any::type_name::<E>()))
                .with_suggestion("Register the entity on the client builder")
        })
    }

    /// Check if a table has an entity bound.
    pub fn contains(&self, table: TableId) -> bool {
        self.by_table.contains_key(&table)
    }

    /// Create an empty record for a table.
    pub fn create(&self, registry: &Registry, table: TableId) -> QueryResult<Box<dyn Record>> {
        self.by_table
            .get(&table)
            .map(|binding| (binding.create)())
            .ok_or_else(|| {
                QueryError::entity_mismatch(registry.table(table).name.to_string(), "no entity is registered")
                    .with_suggestion("Register an entity for every table an include spec reaches")
            })
    }

    /// Number of bound tables.
    pub fn len(&self) -> usize {
        self.by_table.len()
    }

    /// Check if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.by_table.is_empty()
    }
}

/// Define an entity struct bound to a table.
///
/// Fields must be listed in the table's column order; registration on the
/// client checks this. The struct derives `Debug`, `Clone`, `Default` and
/// `PartialEq`.
///
/// ```rust
/// strata_query::entity! {
///     /// A row of `public.users`.
///     pub struct User in "public.users" {
///         pub id: i64,
///         pub email: String,
///         pub nickname: Option<String>,
///     }
/// }
///
/// use strata_query::{Entity, Value};
///
/// let mut user = User::default();
/// user.set(1, Value::from("ada@example.com")).unwrap();
/// assert_eq!(user.get(1), Value::Text("ada@example.com".into()));
/// assert_eq!(User::FIELDS, &["id", "email", "nickname"]);
/// ```
#[macro_export]
macro_rules! entity {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident in $table:literal {
            $( $(#[$fmeta:meta])* $fvis:vis $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        $vis struct $name {
            $( $(#[$fmeta])* $fvis $field: $ty, )*
        }

        impl $crate::Entity for $name {
            const TABLE: &'static str = $table;
            const FIELDS: &'static [&'static str] = &[$(stringify!($field)),*];

            #[allow(unused_assignments)]
            fn get(&self, index: usize) -> $crate::Value {
                let mut _i = 0usize;
                $(
                    if index == _i {
                        return $crate::Value::from(::std::clone::Clone::clone(&self.$field));
                    }
                    _i += 1;
                )*
                $crate::Value::Null
            }

            #[allow(unused_assignments)]
            fn set(&mut self, index: usize, value: $crate::Value) -> $crate::QueryResult<()> {
                let mut _i = 0usize;
                $(
                    if index == _i {
                        self.$field = <$ty as $crate::FromValue>::from_value(value)
                            .map_err(|e| e.with_table($table).with_field(stringify!($field)))?;
                        return Ok(());
                    }
                    _i += 1;
                )*
                Err($crate::QueryError::internal(format!("{} has no field #{}", $table, index)))
            }
        }
    };
}
