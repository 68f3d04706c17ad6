//! Metadata store implementations

mod file;
mod memory;

pub use file::{FileMetadataStore, MetadataDocument};
pub use memory::InMemoryMetadataStore;
