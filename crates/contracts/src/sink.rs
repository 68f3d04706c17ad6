//! Output traits - what the router hands its results to
//!
//! One trait per collaborator. Implementations own their transport; the
//! dispatcher runs each behind an isolated queue and logs failures.

use crate::{Alert, ContractError, FeatureInsert, MisfitRecord, Publication};

/// Feature table writer (`network__feature`)
#[trait_variant::make(FeatureSink: Send)]
pub trait LocalFeatureSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Insert one feature row
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn insert_feature_row(&mut self, row: &FeatureInsert) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}

/// Misfit table writer (`network__unknown_feature`)
#[trait_variant::make(MisfitSink: Send)]
pub trait LocalMisfitSink {
    fn name(&self) -> &str;

    /// Insert one misfit row
    async fn insert_misfit_row(&mut self, record: &MisfitRecord) -> Result<(), ContractError>;

    async fn flush(&mut self) -> Result<(), ContractError>;

    async fn close(&mut self) -> Result<(), ContractError>;
}

/// Outward pub/sub emitter
#[trait_variant::make(Publisher: Send)]
pub trait LocalPublisher {
    fn name(&self) -> &str;

    /// Emit one normalized result on its topic
    async fn emit(&mut self, publication: &Publication) -> Result<(), ContractError>;

    async fn flush(&mut self) -> Result<(), ContractError>;

    async fn close(&mut self) -> Result<(), ContractError>;
}

/// Alert feed poster
#[trait_variant::make(AlertTransport: Send)]
pub trait LocalAlertTransport {
    fn name(&self) -> &str;

    /// Post one alert
    async fn post(&mut self, alert: &Alert) -> Result<(), ContractError>;

    async fn flush(&mut self) -> Result<(), ContractError>;

    async fn close(&mut self) -> Result<(), ContractError>;
}
