//! Tally query kernel.
//!
//! Turns declarative filter and sort parameters into deterministic,
//! seek-paginated queries over large disclosure datasets. The `tally`
//! binary wraps this library in a command-line interface.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod query;
pub mod storage;

pub use error::{ConfigurationError, ErrorKind, QueryError};
