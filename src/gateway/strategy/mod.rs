//! Per-class request handling strategies.

pub mod cache_first;
pub mod navigation;
pub mod network_first;
