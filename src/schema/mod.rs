//! Column type mapping for schema definitions.
//!
//! Migrations describe columns with abstract type names (`pk`, `string`,
//! `uuidpk*`, ...). [`ColumnTypeMap`] turns them into the physical types of
//! the target dialect.

mod types;

pub use types::{convert_expression, ColumnTypeMap};
