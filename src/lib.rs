//! Read-only query engine for SQLite-format database files.
//!
//! The engine memory-maps a single database file and answers a small command
//! set: `.dbinfo`, `.tables`, `SELECT COUNT(*)`, and column-projecting
//! selects with an optional equality filter. Filters use an index when one
//! exists on the filtered column; everything else is a full table scan in
//! ascending row-id order.

mod btree;
pub mod catalog;
mod compare;
pub mod db;
mod decoder;
pub mod error;
pub mod index;
pub mod pager;
pub mod query;
pub mod record;
mod schema;
pub mod sql;
pub mod table;

pub use db::{Db, DbInfo};
pub use error::{Error, Result};
pub use pager::PageId;
pub use record::{RowView, ValueRef};
pub use sql::{Command, parse_command};
