//! SQLite database module for the BulkBuy coordination engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
