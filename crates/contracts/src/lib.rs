//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the mapper:
//! the observation data model, the metadata-derived maps, the records handed
//! to collaborators and the collaborator traits themselves.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Normalization
//! Sensor ids, node ids and `data` keys are case-insensitive. Everything that
//! crosses this boundary is lowercased once, on ingestion, via
//! [`Observation::normalize`], and the maps built from metadata rows are
//! lowercased on construction.

mod blueprint;
mod error;
mod metadata;
mod metadata_store;
mod observation;
mod records;
mod sensor_id;
mod sink;
mod statement;

pub use blueprint::*;
pub use error::*;
pub use metadata::*;
pub use metadata_store::{LocalMetadataStore, MetadataStore};
pub use observation::*;
pub use records::*;
pub use sensor_id::SensorId;
pub use sink::*;
pub use statement::Statement;
