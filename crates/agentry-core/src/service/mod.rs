//! Application services orchestrating the repositories.

pub mod conversation;
pub mod domain;
