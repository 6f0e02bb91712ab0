//! HTTP request handlers.

pub mod chat;
pub mod domain;
pub mod session;
