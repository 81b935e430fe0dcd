//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod fs_store;
pub mod http;
pub mod telemetry;
pub mod upstream;
