//! Registry logic and repository trait definitions for Agentry.
//!
//! This crate defines the "ports" (repository and provider traits) that the
//! infrastructure layer implements, plus the agent registry itself: the
//! cache -> store -> remote resolution chain, credential lifecycle, and the
//! background deployment poller. It depends only on `agentry-types` -- never
//! on `agentry-infra` or any database/HTTP crate.

pub mod registry;
pub mod remote;
pub mod repository;
pub mod service;
