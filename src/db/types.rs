//! Statement and result types for the gateway.
//!
//! Defines the parameter map callers bind into prepared statements, the raw
//! rows drivers hand back, and the first-row mapping callers receive.

use super::text;
use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Column data type.
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Represents a single value decoded from a database row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text value, or any type whose canonical rendering is text.
    String(String),

    /// Binary data.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Renders the value the way PostgreSQL prints it in text format.
    ///
    /// NULL has no text representation and yields `None`.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(true) => Some("t".to_string()),
            Value::Bool(false) => Some("f".to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(text::float8(*f)),
            Value::String(s) => Some(s.clone()),
            Value::Bytes(b) => Some(bytea_hex(b)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("NULL"),
        }
    }
}

fn bytea_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// A single row as decoded by a driver, before materialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    /// Column metadata, in select-list order.
    pub columns: Vec<ColumnInfo>,

    /// Values, parallel to `columns`.
    pub values: Vec<Value>,
}

impl RawRow {
    /// Creates a raw row from `(name, type, value)` triples.
    pub fn from_cells<I, N, T>(cells: I) -> Self
    where
        I: IntoIterator<Item = (N, T, Value)>,
        N: Into<String>,
        T: Into<String>,
    {
        let (columns, values) = cells
            .into_iter()
            .map(|(name, data_type, value)| (ColumnInfo::new(name, data_type), value))
            .unzip();
        Self { columns, values }
    }
}

/// First row of a result set, keyed by column name.
///
/// A column holding SQL NULL is present with no value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    values: HashMap<String, Option<String>>,
}

impl ResultRow {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column's value. A repeated column name replaces the earlier value.
    pub fn insert(&mut self, column: impl Into<String>, value: Option<String>) {
        self.values.insert(column.into(), value);
    }

    /// Returns the text of a column, or `None` when the column is absent or NULL.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).and_then(|v| v.as_deref())
    }

    /// Returns true if the row carries the column, NULL or not.
    pub fn contains_column(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    /// Returns true if the column is present and NULL.
    pub fn is_null(&self, column: &str) -> bool {
        matches!(self.values.get(column), Some(None))
    }

    /// Number of columns in the row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the row has no columns (the query returned no rows).
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over `(column, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Consumes the row, returning the underlying map.
    pub fn into_map(self) -> HashMap<String, Option<String>> {
        self.values
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResultRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), Some(v.into())))
                .collect(),
        }
    }
}

/// Positional parameters for a prepared statement, keyed by 1-based index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterMap {
    params: BTreeMap<u32, String>,
}

impl ParameterMap {
    /// Creates an empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value bound at `index`, replacing any earlier value.
    pub fn insert(&mut self, index: u32, value: impl Into<String>) -> &mut Self {
        self.params.insert(index, value.into());
        self
    }

    /// Builder form of [`ParameterMap::insert`].
    pub fn with(mut self, index: u32, value: impl Into<String>) -> Self {
        self.insert(index, value);
        self
    }

    /// Returns the value bound at `index`.
    pub fn get(&self, index: u32) -> Option<&str> {
        self.params.get(&index).map(String::as_str)
    }

    /// Number of bound parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns true if no parameters are bound.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Returns the values in placeholder order (`$1`, `$2`, ...).
    ///
    /// Fails if the indices are not exactly `1..=len`.
    pub fn positional_values(&self) -> Result<Vec<&str>> {
        let mut values = Vec::with_capacity(self.params.len());
        for (expected, (index, value)) in (1u32..).zip(self.params.iter()) {
            if *index != expected {
                return Err(GatewayError::precondition(format!(
                    "parameter map must bind indices 1..={} without gaps; found index {index} where {expected} was expected",
                    self.params.len()
                )));
            }
            values.push(value.as_str());
        }
        Ok(values)
    }
}

impl<V: Into<String>> FromIterator<(u32, V)> for ParameterMap {
    fn from_iter<I: IntoIterator<Item = (u32, V)>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().map(|(k, v)| (k, v.into())).collect(),
        }
    }
}

/// Whether a statement mutates or reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Mutating statement; no rows are materialized.
    Update,
    /// Read statement; the first row is materialized.
    Select,
}

/// A single SQL command, literal or with positional placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement<'a> {
    /// Query text, passed to the server verbatim.
    pub sql: &'a str,

    /// Update or select.
    pub kind: StatementKind,

    /// Values for `$1..$n`; `None` runs the text as a plain statement.
    pub binds: Option<Vec<&'a str>>,
}

impl<'a> Statement<'a> {
    /// A plain mutating statement.
    pub fn update(sql: &'a str) -> Self {
        Self {
            sql,
            kind: StatementKind::Update,
            binds: None,
        }
    }

    /// A plain read statement.
    pub fn select(sql: &'a str) -> Self {
        Self {
            sql,
            kind: StatementKind::Select,
            binds: None,
        }
    }

    /// Turns this into a prepared statement bound with `params`.
    pub fn bind(mut self, params: &'a ParameterMap) -> Result<Self> {
        self.binds = Some(params.positional_values()?);
        Ok(self)
    }

    /// Returns true if the statement carries bind values.
    pub fn is_prepared(&self) -> bool {
        self.binds.is_some()
    }
}
