//! # Schema Cache
//!
//! Caches the sensor -> property and feature -> type mappings fetched from the
//! metadata store.
//!
//! - Readers take an `Arc` snapshot and never see a half-updated pair of maps
//! - Refreshes are single-flight: callers that trigger while a refresh is
//!   outstanding share its outcome instead of fetching again
//! - A failed refresh keeps the previous snapshot

pub mod cache;
pub mod error;
pub mod store;

pub use cache::{MetadataCache, MetadataSnapshot};
pub use error::MetadataError;
pub use store::{FileMetadataStore, InMemoryMetadataStore, MetadataDocument};
