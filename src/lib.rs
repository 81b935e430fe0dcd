//! Bounded, TTL-aware response cache gateway for the news terminal.
//!
//! The [`gateway`] module holds the request pipeline and lifecycle, [`cache`] the
//! namespaced storage model, and [`infra`] the adapters that run it as an HTTP proxy.

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod infra;
