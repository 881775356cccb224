//! Record access helpers.
//!
//! These sit on top of a connection and never touch transaction state:
//! batched iteration over large result sets, and projection of JSON rows
//! into lists and keyed maps.

mod batch;
mod project;

pub use batch::{BatchError, BatchIterator, BatchSource};
pub use project::{format_utc_stamp, index_by, pluck, try_format_utc_stamp, value_at};
