//! Compile-time table schemas.

use crate::field::Field;

/// Static schema of one table, implemented by the derive macro on a marker
/// type per entity.
pub trait Table {
    /// Table name.
    const NAME: &'static str;
    /// Column names, in declaration order.
    const COLUMNS: &'static [&'static str];
    /// Primary key column, when one is declared.
    const PRIMARY_KEY: Option<&'static str>;
    /// Full column metadata, in declaration order.
    const FIELDS: &'static [Field];
}

/// Runtime view of a [`Table`], for code that cannot be generic over it.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub primary_key: Option<&'static str>,
    pub fields: &'static [Field],
}

/// Captures the schema of `T` as a value.
#[must_use]
pub fn of<T: Table>() -> TableSchema {
    TableSchema {
        name: T::NAME,
        columns: T::COLUMNS,
        primary_key: T::PRIMARY_KEY,
        fields: T::FIELDS,
    }
}

impl TableSchema {
    /// Looks up a field by column name.
    #[must_use]
    pub fn field(&self, column: &str) -> Option<&'static Field> {
        self.fields.iter().find(|f| f.name == column)
    }

    /// The primary key field, when one is declared.
    #[must_use]
    pub fn primary_key_field(&self) -> Option<&'static Field> {
        self.primary_key.and_then(|pk| self.field(pk))
    }
}
