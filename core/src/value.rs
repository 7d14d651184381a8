//! Dynamic values stored in attribute slots and carried by signals.
//!
//! Attribute slots are dynamically typed so that any entity can expose any
//! key. Domain code decodes values strictly through the `as_*` accessors and
//! [`Value::field`]; a mismatch is a [`ConvergenceError::MalformedValue`] and
//! aborts the current stimulus.
//!
//! `List` and `Object` use persistent collections from `im`, so cloning a
//! value (which every write and every snapshot does) shares structure instead
//! of copying it.

use crate::error::ConvergenceError;
use im::{OrdMap, Vector};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A value held by an attribute slot or carried as a signal payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// UTF-8 text
    Text(String),
    /// Ordered sequence of values
    List(Vector<Value>),
    /// String-keyed record
    Object(OrdMap<String, Value>),
}

/// The shape of a [`Value`], used in error reports
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// [`Value::Bool`]
    Bool,
    /// [`Value::Int`]
    Int,
    /// [`Value::Text`]
    Text,
    /// [`Value::List`]
    List,
    /// [`Value::Object`]
    Object,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Text => "text",
            Self::List => "list",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

impl Value {
    /// Builds an object from `(field, value)` pairs
    #[must_use]
    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Builds a list of text values
    #[must_use]
    pub fn texts<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|s| Self::Text(s.into())).collect())
    }

    /// Returns the shape of this value
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Text(_) => ValueKind::Text,
            Self::List(_) => ValueKind::List,
            Self::Object(_) => ValueKind::Object,
        }
    }

    const fn mismatch(&self, expected: ValueKind) -> ConvergenceError {
        ConvergenceError::MalformedValue {
            expected,
            found: self.kind(),
        }
    }

    /// Reads a boolean
    ///
    /// # Errors
    ///
    /// Returns [`ConvergenceError::MalformedValue`] for any other shape.
    pub const fn as_bool(&self) -> Result<bool, ConvergenceError> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(other.mismatch(ValueKind::Bool)),
        }
    }

    /// Reads an integer
    ///
    /// # Errors
    ///
    /// Returns [`ConvergenceError::MalformedValue`] for any other shape.
    pub const fn as_int(&self) -> Result<i64, ConvergenceError> {
        match self {
            Self::Int(n) => Ok(*n),
            other => Err(other.mismatch(ValueKind::Int)),
        }
    }

    /// Reads text
    ///
    /// # Errors
    ///
    /// Returns [`ConvergenceError::MalformedValue`] for any other shape.
    pub fn as_text(&self) -> Result<&str, ConvergenceError> {
        match self {
            Self::Text(s) => Ok(s),
            other => Err(other.mismatch(ValueKind::Text)),
        }
    }

    /// Reads a list
    ///
    /// # Errors
    ///
    /// Returns [`ConvergenceError::MalformedValue`] for any other shape.
    pub const fn as_list(&self) -> Result<&Vector<Value>, ConvergenceError> {
        match self {
            Self::List(items) => Ok(items),
            other => Err(other.mismatch(ValueKind::List)),
        }
    }

    /// Reads an object
    ///
    /// # Errors
    ///
    /// Returns [`ConvergenceError::MalformedValue`] for any other shape.
    pub const fn as_object(&self) -> Result<&OrdMap<String, Value>, ConvergenceError> {
        match self {
            Self::Object(fields) => Ok(fields),
            other => Err(other.mismatch(ValueKind::Object)),
        }
    }

    /// Reads a required field of an object
    ///
    /// # Errors
    ///
    /// Returns [`ConvergenceError::MalformedValue`] if `self` is not an object
    /// and [`ConvergenceError::MissingField`] if the field is absent.
    pub fn field(&self, name: &'static str) -> Result<&Value, ConvergenceError> {
        self.as_object()?
            .get(name)
            .ok_or(ConvergenceError::MissingField { field: name })
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vector<Value>> for Value {
    fn from(items: Vector<Value>) -> Self {
        Self::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_reject_other_shapes() {
        let value = Value::from("yes");
        assert_eq!(value.as_text().unwrap(), "yes");
        assert_eq!(
            value.as_bool(),
            Err(ConvergenceError::MalformedValue {
                expected: ValueKind::Bool,
                found: ValueKind::Text,
            })
        );
    }

    #[test]
    fn field_reports_missing_name() {
        let record = Value::object([("title", Value::from("Buy milk"))]);
        assert!(record.field("title").is_ok());
        assert_eq!(
            record.field("completed"),
            Err(ConvergenceError::MissingField { field: "completed" })
        );
    }

    #[test]
    fn equality_is_structural() {
        let a = Value::object([("names", Value::texts(["all", "active"]))]);
        let b = Value::object([("names", Value::texts(["all", "active"]))]);
        assert_eq!(a, b);
    }

    #[test]
    fn json_shape_is_untagged() {
        let record = Value::object([
            ("id", Value::from("abc")),
            ("completed", Value::from(false)),
        ]);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"completed":false,"id":"abc"}"#);

        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
