//! Repository trait definitions.
//!
//! Implementations live in agentry-infra (SQLite via sqlx). All traits use
//! native async fn in traits (Rust 2024 edition, no async_trait macro).

pub mod agent;
pub mod conversation;
pub mod domain;
pub mod knowledge_base;
