//! Pipeline statistics and metrics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::RoutingMetricsAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Non-blank records read from the input
    pub records_read: u64,

    /// Records skipped because they did not decode
    pub records_malformed: u64,

    /// Records whose routing finished
    pub records_completed: u64,

    /// Every record up to and including this sequence is done
    pub watermark: u64,

    /// Stopped by a signal before the input was exhausted
    pub interrupted: bool,

    /// Input failure that ended the run early
    pub input_error: Option<String>,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Per-observation routing aggregates
    pub routing: RoutingMetricsAggregator,

    /// Final counters of every output, keyed `role:name`
    pub outputs: Vec<(String, MetricsSnapshot)>,
}

impl PipelineStats {
    /// Routed records per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.records_completed as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Records read: {}", self.records_read);
        println!("   ├─ Records malformed: {}", self.records_malformed);
        println!("   ├─ Records routed: {}", self.records_completed);
        println!("   ├─ Throughput: {:.2}/s", self.throughput());
        println!("   └─ Checkpoint watermark: {}", self.watermark);

        if let Some(ref error) = self.input_error {
            println!("\n⚠️  Input error: {}", error);
        }

        println!("\n📈 Routing");
        for line in self.routing.summary().to_string().lines().skip(1) {
            println!("   {}", line);
        }

        if !self.outputs.is_empty() {
            println!("\n📤 Outputs");
            for (i, (name, counters)) in self.outputs.iter().enumerate() {
                let prefix = if i == self.outputs.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {}: delivered {}, failed {}, dropped {}",
                    prefix,
                    name,
                    counters.delivered_count,
                    counters.failure_count,
                    counters.dropped_count
                );
            }
        }

        println!();
    }
}
