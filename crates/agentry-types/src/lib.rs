//! Shared domain types for Agentry.
//!
//! This crate holds the data shapes every other crate agrees on: domains and
//! their derived keys, agent records with their deployment state machine,
//! sessions and conversation turns, the error taxonomy, and configuration.
//! It depends on nothing heavier than serde/uuid/chrono/sha2.

pub mod agent;
pub mod config;
pub mod domain;
pub mod error;
pub mod remote;
pub mod session;
