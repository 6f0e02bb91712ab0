//! Observability setup for Agentry.

pub mod tracing_setup;
