//! Run statistics.

use std::time::Duration;

use forwarder::{BatchReport, StopOutcome};
use gateway::ServiceStats;
use observability::{ForwardingAggregator, ForwardingSummary};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::warn;

/// Statistics from one gateway run
#[derive(Debug, Clone)]
pub struct RunStats {
    pub duration: Duration,
    pub adapters_loaded: usize,
    pub adapters_failed: usize,
    pub adapters_started: usize,
    pub service: ServiceStats,
    pub ingestion: ingestion::MetricsSnapshot,
    pub forwarder: forwarder::MetricsSnapshot,
    pub forwarding: ForwardingSummary,
    pub stop_outcome: StopOutcome,
}

impl RunStats {
    /// Readings forwarded per second
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.forwarder.readings_forwarded as f64 / secs
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Gateway Run Statistics ===\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!(
            "   ├─ Adapters: {} loaded, {} failed, {} started",
            self.adapters_loaded, self.adapters_failed, self.adapters_started
        );
        println!("   ├─ Throughput: {:.2} readings/s", self.throughput());
        println!("   └─ Forwarder stop: {:?}", self.stop_outcome);

        println!("\nIngestion");
        println!("   ├─ Records received: {}", self.ingestion.records_received);
        println!("   ├─ Records malformed: {}", self.ingestion.records_malformed);
        println!("   ├─ Records rejected: {}", self.ingestion.records_rejected);
        println!("   └─ Adapter restarts: {}", self.ingestion.adapter_restarts);

        println!("\nQueue");
        println!("   ├─ Enqueued: {}", self.service.enqueued);
        println!("   ├─ Rejected (full): {}", self.service.rejected);
        println!("   ├─ Ignored (empty): {}", self.service.ignored);
        println!("   ├─ Notifications dropped: {}", self.service.notifications_dropped);
        println!("   └─ Left in queue: {}", self.service.depth);

        println!("\n{}", self.forwarding);
    }
}

/// Aggregates `BatchReport`s in the background for the run summary
pub struct ReportCollector {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<ForwardingAggregator>,
}

impl ReportCollector {
    pub fn spawn(mut reports: broadcast::Receiver<BatchReport>) -> Self {
        let (stop, mut stopped) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let mut aggregator = ForwardingAggregator::new();
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    report = reports.recv() => match report {
                        Ok(report) => record(&mut aggregator, &report),
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "Run statistics missed batch reports");
                        }
                        Err(broadcast::error::RecvError::Closed) => return aggregator,
                    },
                }
            }
            // reports already buffered when the stop arrived
            while let Ok(report) = reports.try_recv() {
                record(&mut aggregator, &report);
            }
            aggregator
        });
        Self { stop, handle }
    }

    /// Stop collecting and summarise
    pub async fn finish(self) -> ForwardingSummary {
        let _ = self.stop.send(());
        match self.handle.await {
            Ok(aggregator) => aggregator.summary(),
            Err(e) => {
                warn!(error = %e, "Statistics collector failed");
                ForwardingSummary::default()
            }
        }
    }
}

fn record(aggregator: &mut ForwardingAggregator, report: &BatchReport) {
    aggregator.update(report.published, report.rejected, report.outcome.is_success());
}
