//! SQL values and parameter handling.
//!
//! Every bind parameter travels through [`SqlValue`] so that queries stay
//! parameterized end to end; inline rendering exists only for diagnostics.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

/// A SQL value that can be used as a bind parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Fixed-point decimal value.
    Decimal(Decimal),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
    /// Calendar date.
    Date(NaiveDate),
    /// Date and time without timezone.
    DateTime(NaiveDateTime),
    /// JSON document.
    Json(serde_json::Value),
}

impl SqlValue {
    /// Renders the value for inline display (echo logging, error messages).
    ///
    /// Never interpolate this into executed SQL; bind the value instead.
    #[must_use]
    pub fn to_sql_inline(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Bool(b) => {
                if *b {
                    String::from("TRUE")
                } else {
                    String::from("FALSE")
                }
            }
            Self::Int(n) => format!("{n}"),
            Self::Float(f) => format!("{f}"),
            Self::Decimal(d) => format!("{d}"),
            Self::Text(s) => {
                let escaped = s.replace('\'', "''");
                format!("'{escaped}'")
            }
            Self::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
                format!("X'{hex}'")
            }
            Self::Date(d) => format!("'{d}'"),
            Self::DateTime(dt) => format!("'{dt}'"),
            Self::Json(v) => {
                let escaped = v.to_string().replace('\'', "''");
                format!("'{escaped}'")
            }
        }
    }

    /// Returns the backend-neutral parameter placeholder.
    #[must_use]
    pub const fn placeholder() -> &'static str {
        "?"
    }

    /// Returns whether this value is NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Trait for types that can be converted into a [`SqlValue`].
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

macro_rules! impl_to_sql_value_int {
    ($($ty:ty),+) => {
        $(impl ToSqlValue for $ty {
            fn to_sql_value(self) -> SqlValue {
                SqlValue::Int(i64::from(self))
            }
        })+
    };
}

impl_to_sql_value_int!(i8, i16, i32, i64, u8, u16, u32);

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(f64::from(self))
    }
}

impl ToSqlValue for Decimal {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Decimal(self)
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self)
    }
}

impl ToSqlValue for &[u8] {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self.to_vec())
    }
}

impl ToSqlValue for NaiveDate {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Date(self)
    }
}

impl ToSqlValue for NaiveDateTime {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::DateTime(self)
    }
}

impl ToSqlValue for serde_json::Value {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Json(self)
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Some(v) => v.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

/// Trait for Rust types that can be recovered from a stored [`SqlValue`].
///
/// Conversions are strict except for the numeric widenings a driver is
/// allowed to perform (int → float, int → decimal).
pub trait FromSqlValue: Sized {
    /// The type name reported in decode errors.
    const TYPE_NAME: &'static str;

    /// Attempts the conversion, returning `None` on a mismatch.
    fn from_sql_value(value: &SqlValue) -> Option<Self>;
}

impl FromSqlValue for i64 {
    const TYPE_NAME: &'static str = "i64";

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl FromSqlValue for i32 {
    const TYPE_NAME: &'static str = "i32";

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Int(n) => Self::try_from(*n).ok(),
            _ => None,
        }
    }
}

impl FromSqlValue for u64 {
    const TYPE_NAME: &'static str = "u64";

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Int(n) => Self::try_from(*n).ok(),
            _ => None,
        }
    }
}

macro_rules! impl_from_sql_value_int {
    ($($ty:ty),* $(,)?) => {
        $(impl FromSqlValue for $ty {
            const TYPE_NAME: &'static str = stringify!($ty);

            fn from_sql_value(value: &SqlValue) -> Option<Self> {
                match value {
                    SqlValue::Int(n) => Self::try_from(*n).ok(),
                    _ => None,
                }
            }
        })*
    };
}

impl_from_sql_value_int!(i8, i16, u8, u16, u32);

impl FromSqlValue for f32 {
    const TYPE_NAME: &'static str = "f32";

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        f64::from_sql_value(value).map(|v| v as f32)
    }
}

impl FromSqlValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Bool(b) => Some(*b),
            // MySQL reports BOOLEAN columns as TINYINT(1).
            SqlValue::Int(n) => Some(*n != 0),
            _ => None,
        }
    }
}

impl FromSqlValue for f64 {
    const TYPE_NAME: &'static str = "f64";

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Float(f) => Some(*f),
            #[allow(clippy::cast_precision_loss)]
            SqlValue::Int(n) => Some(*n as Self),
            _ => None,
        }
    }
}

impl FromSqlValue for Decimal {
    const TYPE_NAME: &'static str = "Decimal";

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Decimal(d) => Some(*d),
            SqlValue::Int(n) => Some(Self::from(*n)),
            _ => None,
        }
    }
}

impl FromSqlValue for String {
    const TYPE_NAME: &'static str = "String";

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromSqlValue for Vec<u8> {
    const TYPE_NAME: &'static str = "Vec<u8>";

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Blob(b) => Some(b.clone()),
            _ => None,
        }
    }
}

impl FromSqlValue for NaiveDate {
    const TYPE_NAME: &'static str = "NaiveDate";

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Date(d) => Some(*d),
            SqlValue::DateTime(dt) => Some(dt.date()),
            _ => None,
        }
    }
}

impl FromSqlValue for NaiveDateTime {
    const TYPE_NAME: &'static str = "NaiveDateTime";

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

impl FromSqlValue for serde_json::Value {
    const TYPE_NAME: &'static str = "serde_json::Value";

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Json(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    const TYPE_NAME: &'static str = T::TYPE_NAME;

    fn from_sql_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Null => Some(None),
            other => T::from_sql_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_null_and_bool() {
        assert_eq!(SqlValue::Null.to_sql_inline(), "NULL");
        assert_eq!(SqlValue::Bool(true).to_sql_inline(), "TRUE");
        assert_eq!(SqlValue::Bool(false).to_sql_inline(), "FALSE");
    }

    #[test]
    fn inline_text_escapes_quotes() {
        assert_eq!(
            SqlValue::Text(String::from("O'Brien")).to_sql_inline(),
            "'O''Brien'"
        );
    }

    #[test]
    fn inline_blob_is_hex() {
        assert_eq!(
            SqlValue::Blob(vec![0x48, 0x49]).to_sql_inline(),
            "X'4849'"
        );
    }

    #[test]
    fn to_sql_value_conversions() {
        assert_eq!(42_i32.to_sql_value(), SqlValue::Int(42));
        assert_eq!(2.5_f64.to_sql_value(), SqlValue::Float(2.5));
        assert_eq!("hi".to_sql_value(), SqlValue::Text(String::from("hi")));
        assert_eq!(None::<i32>.to_sql_value(), SqlValue::Null);
        assert_eq!(Some(7_i64).to_sql_value(), SqlValue::Int(7));
    }

    #[test]
    fn from_sql_value_round_trip() {
        assert_eq!(i64::from_sql_value(&SqlValue::Int(9)), Some(9));
        assert_eq!(bool::from_sql_value(&SqlValue::Int(1)), Some(true));
        assert_eq!(
            String::from_sql_value(&SqlValue::Text(String::from("x"))),
            Some(String::from("x"))
        );
        assert_eq!(Option::<i64>::from_sql_value(&SqlValue::Null), Some(None));
        assert_eq!(i64::from_sql_value(&SqlValue::Text(String::new())), None);
    }

    #[test]
    fn numeric_widening() {
        assert_eq!(f64::from_sql_value(&SqlValue::Int(3)), Some(3.0));
        assert_eq!(
            Decimal::from_sql_value(&SqlValue::Int(3)),
            Some(Decimal::from(3))
        );
    }
}
