//! Newsgate cache layer
//!
//! Storage-facing half of the gateway:
//!
//! - **Namespaces**: versioned partitions (`<prefix>-<partition>-v<version>`)
//! - **Store**: the [`CacheStorage`] abstraction and an in-memory implementation
//! - **Metadata**: stored-at stamps behind [`EntryMetadata`]
//! - **Eviction**: insertion-ordered trimming and age purges

pub mod eviction;
mod keys;
pub mod metadata;
mod namespace;
mod store;

pub use eviction::SweepReport;
pub use keys::{RequestKey, has_refresh_param};
pub use metadata::{EntryMetadata, HeaderStamp, STORED_AT_HEADER};
pub use namespace::{
    CacheNamespace, DataPolicy, NamespaceLimits, NamespaceState, Partition, namespace_name,
    parse_namespace_name,
};
pub use store::{CacheStorage, MemoryStorage, StorageError, StoredResponse};
