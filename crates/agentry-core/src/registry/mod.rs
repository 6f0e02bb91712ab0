//! The agent registry: cache -> store -> remote resolution, credential
//! lifecycle, and background deployment polling.

pub mod backoff;
pub mod cache;
pub mod poller;
pub mod service;

#[cfg(test)]
pub(crate) mod support;
