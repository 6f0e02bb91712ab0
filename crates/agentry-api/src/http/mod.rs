//! REST API layer: router, error mapping, and handlers.

pub mod error;
pub mod handlers;
pub mod router;
