//! Infrastructure implementations for Agentry.
//!
//! SQLite repositories (sqlx, WAL mode, split reader/writer pools), the
//! HTTP client for the remote agent provider, and configuration loading.

pub mod config;
pub mod remote;
pub mod sqlite;
