//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::GatewayConfig;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    gateway: GatewayInfo,
    queue: QueueInfo,
    adapters: Vec<AdapterInfo>,
    publisher: PublisherInfo,
    forwarder: ForwarderInfo,
}

#[derive(Serialize)]
struct GatewayInfo {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

#[derive(Serialize)]
struct QueueInfo {
    soft_capacity: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    hard_capacity: Option<usize>,
}

#[derive(Serialize)]
struct AdapterInfo {
    name: String,
    kind: String,
    endpoints: Vec<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    params: HashMap<String, String>,
}

#[derive(Serialize)]
struct PublisherInfo {
    name: String,
    publisher_type: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    params: HashMap<String, String>,
}

#[derive(Serialize)]
struct ForwarderInfo {
    max_batch_size: usize,
    flush_interval_ms: u64,
    stop_timeout_ms: u64,
    throughput_log_threshold: u64,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let json = serde_json::to_string_pretty(&build_config_info(&config))
            .context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config);
    }

    Ok(())
}

fn build_config_info(config: &GatewayConfig) -> ConfigInfo {
    ConfigInfo {
        version: format!("{:?}", config.version),
        gateway: GatewayInfo {
            name: config.gateway.name.clone(),
            location: config.gateway.location.clone(),
        },
        queue: QueueInfo {
            soft_capacity: config.queue.soft_capacity,
            hard_capacity: config.queue.hard_capacity,
        },
        adapters: config
            .adapters
            .iter()
            .map(|a| AdapterInfo {
                name: a.name.clone(),
                kind: a.kind.clone(),
                endpoints: a.endpoints.iter().map(ToString::to_string).collect(),
                params: a.params.clone(),
            })
            .collect(),
        publisher: PublisherInfo {
            name: config.publisher.name.clone(),
            publisher_type: format!("{:?}", config.publisher.publisher_type),
            params: config.publisher.params.clone(),
        },
        forwarder: ForwarderInfo {
            max_batch_size: config.forwarder.max_batch_size,
            flush_interval_ms: config.forwarder.flush_interval_ms,
            stop_timeout_ms: config.forwarder.stop_timeout_ms,
            throughput_log_threshold: config.forwarder.throughput_log_threshold,
        },
    }
}

fn branch(is_last: bool) -> &'static str {
    if is_last {
        "└─"
    } else {
        "├─"
    }
}

fn print_config_info(config: &GatewayConfig) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Telemetry Gateway Configuration                ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📍 Gateway");
    println!("   ├─ Version: {:?}", config.version);
    println!("   ├─ Name: {}", config.gateway.name);
    println!(
        "   └─ Location: {}",
        config.gateway.location.as_deref().unwrap_or("(none)")
    );

    println!("\n📦 Queue");
    println!("   ├─ Soft capacity: {}", config.queue.soft_capacity);
    match config.queue.hard_capacity {
        Some(hard) => println!("   └─ Hard capacity: {}", hard),
        None => println!("   └─ Hard capacity: unbounded"),
    }

    println!("\n🔌 Adapters ({})", config.adapters.len());
    for (i, adapter) in config.adapters.iter().enumerate() {
        let is_last = i == config.adapters.len() - 1;
        let child_prefix = if is_last { "   " } else { "│  " };
        println!("   {} {} ({})", branch(is_last), adapter.name, adapter.kind);

        if adapter.endpoints.is_empty() {
            println!("   {}  └─ (no endpoints)", child_prefix);
        }
        for (j, endpoint) in adapter.endpoints.iter().enumerate() {
            let endpoint_last = j == adapter.endpoints.len() - 1;
            println!("   {}  {} {}", child_prefix, branch(endpoint_last), endpoint);
        }
    }

    println!("\n📤 Publisher");
    println!("   ├─ Name: {}", config.publisher.name);
    println!("   └─ Type: {:?}", config.publisher.publisher_type);

    let fwd = &config.forwarder;
    println!("\n⚙️  Forwarder");
    println!("   ├─ Max batch size: {}", fwd.max_batch_size);
    println!("   ├─ Flush interval: {} ms", fwd.flush_interval_ms);
    println!("   ├─ Stop timeout: {} ms", fwd.stop_timeout_ms);
    println!("   └─ Throughput log every: {} items", fwd.throughput_log_threshold);

    println!();
}
