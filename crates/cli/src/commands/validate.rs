//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{GatewayConfig, PublisherType};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    gateway: String,
    adapter_count: usize,
    endpoint_count: usize,
    publisher: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            error: Some(format!("File not found: {}", config_path)),
            config_path,
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    gateway: config.gateway.name.clone(),
                    adapter_count: config.adapters.len(),
                    endpoint_count: config.adapters.iter().map(|a| a.endpoints.len()).sum(),
                    publisher: format!(
                        "{} ({:?})",
                        config.publisher.name, config.publisher.publisher_type
                    ),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Non-fatal configuration issues
fn collect_warnings(config: &GatewayConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.adapters.is_empty() {
        warnings.push("No adapters configured - nothing will be ingested".to_string());
    }

    if config.publisher.publisher_type == PublisherType::Log {
        warnings.push("Log publisher in use - readings are only written to the log".to_string());
    }

    if config.queue.hard_capacity.is_none() {
        warnings.push("queue.hard_capacity is not set - queue growth is unbounded".to_string());
    }

    for adapter in &config.adapters {
        if adapter.kind == "socket" && adapter.endpoints.is_empty() {
            warnings.push(format!(
                "Adapter '{}' is a socket adapter without endpoints and will not load",
                adapter.name
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Gateway: {}", summary.gateway);
            println!("  Adapters: {}", summary.adapter_count);
            println!("  Endpoints: {}", summary.endpoint_count);
            println!("  Publisher: {}", summary.publisher);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
