//! Abstract column types and their physical SQL Server spellings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default SQL Server mapping. `*` suffixed primary keys are not identity columns.
const MSSQL_COLUMN_TYPES: &[(&str, &str)] = &[
    ("pk", "int IDENTITY PRIMARY KEY"),
    ("string", "nvarchar(255)"),
    ("text", "ntext"),
    ("integer", "int"),
    ("float", "float"),
    ("decimal", "decimal"),
    ("datetime", "datetime"),
    ("timestamp", "timestamp"),
    ("time", "time"),
    ("date", "date"),
    ("binary", "binary"),
    ("boolean", "bit"),
    ("uuid", "uniqueidentifier NOT NULL DEFAULT (newid())"),
    ("uuidfk", "uniqueidentifier"),
    ("datestamp", "datetime NOT NULL DEFAULT (getutcdate())"),
    ("mediumstring", "nvarchar(1022)"),
    ("stringpk", "nvarchar(255) PRIMARY KEY"),
    ("tinypk", "tinyint IDENTITY PRIMARY KEY"),
    ("tinypk*", "tinyint PRIMARY KEY"),
    ("smallpk", "smallint IDENTITY PRIMARY KEY"),
    ("smallpk*", "smallint PRIMARY KEY"),
    ("bigpk", "bigint IDENTITY PRIMARY KEY"),
    ("bigpk*", "bigint PRIMARY KEY"),
    ("uuidpk", "uniqueidentifier PRIMARY KEY NOT NULL DEFAULT (newid())"),
    ("uuidpk*", "uniqueidentifier PRIMARY KEY NOT NULL"),
];

/// Mapping from abstract column types to physical column types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnTypeMap {
    types: BTreeMap<String, String>,
}

impl ColumnTypeMap {
    /// An empty mapping; every type passes through unchanged.
    pub fn empty() -> Self {
        Self {
            types: BTreeMap::new(),
        }
    }

    /// The SQL Server mapping.
    pub fn mssql() -> Self {
        Self {
            types: MSSQL_COLUMN_TYPES
                .iter()
                .map(|(abstract_type, physical)| (abstract_type.to_string(), physical.to_string()))
                .collect(),
        }
    }

    /// Physical type for an abstract type name.
    pub fn get(&self, abstract_type: &str) -> Option<&str> {
        self.types.get(abstract_type).map(String::as_str)
    }

    /// Add or replace a mapping, returning the previous physical type.
    pub fn insert(
        &mut self,
        abstract_type: impl Into<String>,
        physical: impl Into<String>,
    ) -> Option<String> {
        self.types.insert(abstract_type.into(), physical.into())
    }

    /// Layer `overrides` on top of this mapping.
    pub fn merge(mut self, overrides: ColumnTypeMap) -> Self {
        self.types.extend(overrides.types);
        self
    }

    /// Translate a column type specification.
    ///
    /// An exact abstract name maps directly. Otherwise, if the first word is
    /// an abstract name it is replaced and the rest is kept, so
    /// `"string NOT NULL"` becomes `"nvarchar(255) NOT NULL"`. Anything else
    /// is assumed to be physical already.
    pub fn resolve(&self, declared: &str) -> String {
        let declared = declared.trim();
        if let Some(physical) = self.get(declared) {
            return physical.to_string();
        }
        if let Some((head, rest)) = declared.split_once(char::is_whitespace) {
            if let Some(physical) = self.get(head) {
                return format!("{} {}", physical, rest.trim_start());
            }
        }
        declared.to_string()
    }

    /// Number of abstract types known.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if no types are mapped.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterate over `(abstract, physical)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.types.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for ColumnTypeMap {
    fn default() -> Self {
        Self::mssql()
    }
}

/// SQL Server snippet converting `expr` to `to_type`.
pub fn convert_expression(expr: &str, to_type: &str) -> String {
    format!("CONVERT({}, {})", to_type, expr)
}
