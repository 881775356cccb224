//! Command-line front end.
//!
//! An interactive (or scripted) interface over a shared coordinator wrapping
//! the in-memory driver.

mod error;
mod repl;

pub use error::{ReplError, ReplResult};
pub use repl::{Flow, Repl, ReplConfig};
