//! LogSink - logs rows, publications and alerts via tracing
//!
//! Rows are logged as the parameterized statement a database sink would run.

use contracts::{
    Alert, AlertTransport, ContractError, FeatureInsert, FeatureSink, MisfitRecord, MisfitSink,
    Publication, Publisher, Statement,
};
use tracing::{debug, info, instrument};

/// Output that only logs, usable in every role
#[derive(Debug, Clone)]
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn log_statement(&self, table: &str, statement: &Statement) {
        info!(
            sink = %self.name,
            table,
            params = statement.params.len(),
            statement = %statement.text,
            "Insert"
        );
        debug!(sink = %self.name, params = ?statement.params, "Insert parameters");
    }

    fn closed(&self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}

impl FeatureSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_insert_feature",
        skip(self, row),
        fields(sink = %self.name, sensor = %row.sensor)
    )]
    async fn insert_feature_row(&mut self, row: &FeatureInsert) -> Result<(), ContractError> {
        self.log_statement(&row.table(), &Statement::feature_insert(row));
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.closed()
    }
}

impl MisfitSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_insert_misfit",
        skip(self, record),
        fields(sink = %self.name, sensor = %record.sensor)
    )]
    async fn insert_misfit_row(&mut self, record: &MisfitRecord) -> Result<(), ContractError> {
        self.log_statement(&record.table(), &Statement::misfit_insert(record));
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.closed()
    }
}

impl Publisher for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn emit(&mut self, publication: &Publication) -> Result<(), ContractError> {
        let payload = &publication.payload;
        info!(
            sink = %self.name,
            topic = %publication.topic,
            feature = %payload.feature,
            node = %payload.node,
            sensor = %payload.sensor,
            results = payload.results.len(),
            "Publish"
        );
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.closed()
    }
}

impl AlertTransport for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn post(&mut self, alert: &Alert) -> Result<(), ContractError> {
        info!(
            sink = %self.name,
            sensor = %alert.sensor,
            message = ?alert.message,
            "Alert"
        );
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.closed()
    }
}
