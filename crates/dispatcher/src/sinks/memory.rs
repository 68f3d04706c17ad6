//! MemorySink - records everything it receives, for tests and dry runs

use contracts::{
    Alert, AlertTransport, ContractError, FeatureInsert, FeatureSink, MisfitRecord, MisfitSink,
    Publication, Publisher,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Recorded {
    features: Vec<FeatureInsert>,
    misfits: Vec<MisfitRecord>,
    publications: Vec<Publication>,
    alerts: Vec<Alert>,
}

/// In-process output usable in every role; clones share one recording
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    name: String,
    recorded: Arc<Mutex<Recorded>>,
    failing: Arc<AtomicBool>,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Make every write fail until reset
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(&self) -> Result<(), ContractError> {
        if self.failing.load(Ordering::Relaxed) {
            Err(ContractError::sink_write(&self.name, "injected failure"))
        } else {
            Ok(())
        }
    }

    pub fn feature_rows(&self) -> Vec<FeatureInsert> {
        self.lock().features.clone()
    }

    pub fn misfit_rows(&self) -> Vec<MisfitRecord> {
        self.lock().misfits.clone()
    }

    pub fn publications(&self) -> Vec<Publication> {
        self.lock().publications.clone()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.lock().alerts.clone()
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        *self.lock() = Recorded::default();
    }
}

impl FeatureSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_feature_row(&mut self, row: &FeatureInsert) -> Result<(), ContractError> {
        self.check()?;
        self.lock().features.push(row.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}

impl MisfitSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_misfit_row(&mut self, record: &MisfitRecord) -> Result<(), ContractError> {
        self.check()?;
        self.lock().misfits.push(record.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}

impl Publisher for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn emit(&mut self, publication: &Publication) -> Result<(), ContractError> {
        self.check()?;
        self.lock().publications.push(publication.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}

impl AlertTransport for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn post(&mut self, alert: &Alert) -> Result<(), ContractError> {
        self.check()?;
        self.lock().alerts.push(alert.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}
