//! Gateway host - wires queue, service, forwarder and adapters together.
//!
//! Start order: forwarder, then adapters.
//! Stop order: adapters, then forwarder, then publisher.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{GatewayConfig, MessagePublisher};
use forwarder::{create_publisher, AnyPublisher, BatchForwarder, ForwarderConfig, StopOutcome};
use gateway::{BoundedQueue, GatewayService, QueueNotifier, QueueObserver, DEFAULT_NOTIFY_CAPACITY};
use ingestion::{AdapterRegistry, LoadReport};
use tracing::{error, info, instrument, warn};

use super::stats::{ReportCollector, RunStats};
use crate::error::{CliError, Result};

/// Running gateway components
pub struct GatewayHost {
    config: GatewayConfig,
    service: Arc<GatewayService>,
    forwarder: BatchForwarder<AnyPublisher>,
    registry: AdapterRegistry,
    load_report: LoadReport,
}

impl GatewayHost {
    /// Build every component from configuration without starting anything
    #[instrument(name = "gateway_host_build", skip(config), fields(gateway = %config.gateway.name))]
    pub async fn build(config: GatewayConfig) -> Result<Self> {
        let queue = Arc::new(BoundedQueue::from_settings(&config.queue));
        let publisher = Arc::new(create_publisher(&config.publisher).await?);

        let forwarder = BatchForwarder::new(
            Arc::clone(&queue),
            publisher,
            ForwarderConfig::from_settings(&config.forwarder, config.gateway.location.clone()),
        );

        // OnDataInQueue wakes the drain loop
        let wake = forwarder.clone();
        let observer: QueueObserver = Arc::new(move |_item| wake.process());
        let notifier = QueueNotifier::spawn(vec![observer], DEFAULT_NOTIFY_CAPACITY);

        let service = Arc::new(
            GatewayService::new(queue)
                .with_throughput_threshold(config.forwarder.throughput_log_threshold)
                .with_notifier(notifier),
        );

        let mut registry = AdapterRegistry::with_builtin();
        let load_report = registry.load(&config.adapters);
        if !config.adapters.is_empty() && registry.is_empty() {
            return Err(CliError::NoAdapters {
                configured: config.adapters.len(),
            });
        }
        if config.adapters.is_empty() {
            warn!("No adapters configured, gateway will only forward what is enqueued directly");
        }

        info!(
            adapters = registry.len(),
            failed = load_report.failures.len(),
            publisher = %config.publisher.name,
            "Gateway host built"
        );

        Ok(Self {
            config,
            service,
            forwarder,
            registry,
            load_report,
        })
    }

    /// Start, wait for `timeout` or `shutdown`, then stop in order
    pub async fn run<F>(self, timeout: Option<Duration>, shutdown: F) -> Result<RunStats>
    where
        F: Future<Output = ()>,
    {
        let started_at = Instant::now();
        let collector = ReportCollector::spawn(self.forwarder.subscribe());

        self.forwarder.start()?;
        let adapters_started = self
            .registry
            .start_all(self.service.enqueue_callback(), None);
        info!(adapters_started, "Gateway running");

        match timeout {
            Some(limit) => {
                tokio::select! {
                    _ = tokio::time::sleep(limit) => info!(timeout_secs = limit.as_secs(), "Run timeout reached"),
                    _ = shutdown => warn!("Received shutdown signal"),
                }
            }
            None => {
                shutdown.await;
                warn!("Received shutdown signal");
            }
        }

        let stop_outcome = self.shutdown().await;
        let forwarding = collector.finish().await;

        Ok(RunStats {
            duration: started_at.elapsed(),
            adapters_loaded: self.load_report.loaded.len(),
            adapters_failed: self.load_report.failures.len(),
            adapters_started,
            service: self.service.stats(),
            ingestion: self.registry.metrics().snapshot(),
            forwarder: self.forwarder.metrics().snapshot(),
            forwarding,
            stop_outcome,
        })
    }

    /// Adapters first so nothing is enqueued into a stopping forwarder;
    /// the publisher is closed last.
    #[instrument(name = "gateway_host_shutdown", skip(self))]
    async fn shutdown(&self) -> StopOutcome {
        let failures = self.registry.stop_all();
        for failure in &failures {
            error!(adapter = %failure.adapter, "Adapter failed to stop cleanly");
        }

        let outcome = self
            .forwarder
            .stop(self.config.forwarder.stop_timeout())
            .await;
        if matches!(outcome, StopOutcome::Abandoned | StopOutcome::Crashed) {
            warn!(
                ?outcome,
                depth = self.service.depth(),
                "Forwarder did not stop cleanly, queued readings are lost"
            );
        }

        if let Err(e) = self.forwarder.publisher().close().await {
            error!(error = %e, "Failed to close publisher");
        }
        self.service.shutdown();
        outcome
    }
}
