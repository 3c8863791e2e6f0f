//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::GatewayHost;

/// Execute the `run` command
pub async fn run_gateway(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .map_err(CliError::from)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        gateway = %config.gateway.name,
        adapters = config.adapters.len(),
        publisher = %config.publisher.name,
        max_batch_size = config.forwarder.max_batch_size,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)
            .context("Failed to start Prometheus exporter")?;
        info!(port = args.metrics_port, "Prometheus exporter listening");
    }

    let timeout = (args.timeout != 0).then(|| Duration::from_secs(args.timeout));

    let host = GatewayHost::build(config)
        .await
        .context("Failed to build gateway")?;

    info!("Starting gateway...");
    let stats = host
        .run(timeout, shutdown_signal())
        .await
        .context("Gateway execution failed")?;

    info!(
        forwarded = stats.forwarder.readings_forwarded,
        dropped = stats.forwarder.readings_dropped,
        duration_secs = stats.duration.as_secs_f64(),
        throughput = format!("{:.2}", stats.throughput()),
        "Gateway stopped"
    );
    stats.print_summary();

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &contracts::GatewayConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Gateway: {}", config.gateway.name);
    if let Some(ref location) = config.gateway.location {
        println!("  Location: {}", location);
    }

    println!(
        "\nQueue: soft {} / hard {}",
        config.queue.soft_capacity,
        config
            .queue
            .hard_capacity
            .map_or_else(|| "unbounded".to_string(), |c| c.to_string())
    );

    println!("\nAdapters ({}):", config.adapters.len());
    for adapter in &config.adapters {
        println!(
            "  - {} ({}) - {} endpoints",
            adapter.name,
            adapter.kind,
            adapter.endpoints.len()
        );
    }

    println!(
        "\nPublisher: {} ({:?})",
        config.publisher.name, config.publisher.publisher_type
    );
    println!(
        "Forwarder: batch <= {}, flush every {} ms",
        config.forwarder.max_batch_size, config.forwarder.flush_interval_ms
    );
    println!();
}
