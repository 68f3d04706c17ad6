//! OutputHandle - runs one output behind an isolated queue and worker task

use std::sync::Arc;

use contracts::{
    Alert, AlertTransport, FeatureInsert, FeatureSink, MisfitRecord, MisfitSink, OverflowPolicy,
    Publication, Publisher,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::delivery::{AlertDelivery, Delivery, FeatureDelivery, MisfitDelivery, PublishDelivery};
use crate::metrics::SinkMetrics;

/// Handle to a running output worker
pub struct OutputHandle<T> {
    /// Output name
    name: String,
    /// Channel to the worker
    tx: mpsc::Sender<T>,
    overflow: OverflowPolicy,
    /// Shared counters
    metrics: Arc<SinkMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl<T: Send + Sync + 'static> OutputHandle<T> {
    /// Spawn the worker task for `output`
    pub fn spawn<D>(output: D, queue_capacity: usize, overflow: OverflowPolicy) -> Self
    where
        D: Delivery<Item = T>,
    {
        let name = output.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();
        let worker_handle = tokio::spawn(async move {
            output_worker(output, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            overflow,
            metrics,
            worker_handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue an item according to the overflow policy.
    ///
    /// Returns false if the item was dropped.
    pub async fn send(&self, item: T) -> bool {
        match self.overflow {
            OverflowPolicy::Block => {
                if self.tx.send(item).await.is_err() {
                    error!(sink = %self.name, "Output worker closed unexpectedly");
                    return false;
                }
                self.metrics.set_queue_len(self.queued());
                true
            }
            OverflowPolicy::DropNewest => self.try_send(item),
        }
    }

    /// Queue an item without waiting; drops it if the queue is full
    pub fn try_send(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => {
                self.metrics.set_queue_len(self.queued());
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.inc_dropped_count();
                observability::record_queue_dropped(&self.name);
                warn!(sink = %self.name, "Queue full, item dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Output worker closed unexpectedly");
                false
            }
        }
    }

    fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Stop accepting items, drain the queue, then flush and close the output
    #[instrument(name = "output_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "OutputHandle shutdown complete");
    }
}

impl OutputHandle<FeatureInsert> {
    pub fn features<S: FeatureSink + 'static>(
        sink: S,
        queue_capacity: usize,
        overflow: OverflowPolicy,
    ) -> Self {
        Self::spawn(FeatureDelivery(sink), queue_capacity, overflow)
    }
}

impl OutputHandle<MisfitRecord> {
    pub fn misfits<S: MisfitSink + 'static>(
        sink: S,
        queue_capacity: usize,
        overflow: OverflowPolicy,
    ) -> Self {
        Self::spawn(MisfitDelivery(sink), queue_capacity, overflow)
    }
}

impl OutputHandle<Publication> {
    pub fn publisher<S: Publisher + 'static>(
        publisher: S,
        queue_capacity: usize,
        overflow: OverflowPolicy,
    ) -> Self {
        Self::spawn(PublishDelivery(publisher), queue_capacity, overflow)
    }
}

impl OutputHandle<Alert> {
    pub fn alerts<S: AlertTransport + 'static>(
        transport: S,
        queue_capacity: usize,
        overflow: OverflowPolicy,
    ) -> Self {
        Self::spawn(AlertDelivery(transport), queue_capacity, overflow)
    }
}

/// Worker task that consumes queued items and hands them to the output
#[instrument(
    name = "output_worker_loop",
    skip(output, rx, metrics),
    fields(sink = %name)
)]
async fn output_worker<D: Delivery>(
    mut output: D,
    mut rx: mpsc::Receiver<D::Item>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "Output worker started");

    while let Some(item) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match output.deliver(&item).await {
            Ok(()) => {
                metrics.inc_delivered_count();
                observability::record_dispatch(&name, true);
            }
            Err(e) => {
                // A failed item never stops the worker
                metrics.inc_failure_count();
                observability::record_dispatch(&name, false);
                error!(sink = %name, error = %e, "Delivery failed");
            }
        }
    }

    if let Err(e) = output.flush().await {
        error!(sink = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = output.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Output worker stopped");
}
