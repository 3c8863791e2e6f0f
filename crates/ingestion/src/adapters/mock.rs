//! Synthetic reading generator
//!
//! Emits JSON-encoded `SensorReading`s for a fixed set of fake devices on a
//! timer. Useful for demos and for exercising the pipeline without hardware.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use contracts::{AdapterConfig, AdapterState, EnqueueCallback, Endpoint, SensorReading};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::adapter::Adapter;
use crate::adapters::common::{deliver_record, timer_period};
use crate::error::{IngestionError, Result};
use crate::lifecycle::{Lifecycle, ShutdownToken};
use crate::metrics::IngestionMetrics;

const MEASURES: [(&str, &str); 2] = [("length", "m"), ("time", "s")];
const LOG_EVERY: u64 = 100;

/// Mock adapter settings
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub interval: Duration,
    pub devices: usize,
    /// Fixed seed for reproducible output
    pub seed: Option<u64>,
    pub organization: String,
    pub location: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            devices: 4,
            seed: None,
            organization: "contoso".into(),
            location: "here".into(),
        }
    }
}

impl MockConfig {
    pub fn from_adapter_config(cfg: &AdapterConfig) -> Result<Self> {
        let defaults = Self::default();
        let invalid =
            |e: contracts::ContractError| IngestionError::invalid_config(&cfg.name, e.to_string());
        let devices = cfg
            .param("devices")
            .map_err(invalid)?
            .unwrap_or(defaults.devices);
        if devices == 0 {
            return Err(IngestionError::invalid_config(
                &cfg.name,
                "devices must be at least 1",
            ));
        }
        Ok(Self {
            interval: timer_period(cfg, "interval_ms", 1000)?,
            devices,
            seed: cfg.param("seed").map_err(invalid)?,
            organization: cfg
                .params
                .get("organization")
                .cloned()
                .unwrap_or(defaults.organization),
            location: cfg
                .params
                .get("location")
                .cloned()
                .unwrap_or(defaults.location),
        })
    }
}

/// Produces readings for a stable set of fake devices
pub struct ReadingGenerator {
    rng: StdRng,
    devices: Vec<String>,
    organization: String,
    location: String,
}

impl ReadingGenerator {
    pub fn new(config: &MockConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let devices = (0..config.devices).map(|_| random_guid(&mut rng)).collect();
        Self {
            rng,
            devices,
            organization: config.organization.clone(),
            location: config.location.clone(),
        }
    }

    pub fn device_ids(&self) -> &[String] {
        &self.devices
    }

    /// One reading per device
    pub fn next_round(&mut self) -> Vec<SensorReading> {
        let now = Utc::now();
        let mut out = Vec::with_capacity(self.devices.len());
        for (i, guid) in self.devices.iter().enumerate() {
            let (measure, unit) = MEASURES[i % MEASURES.len()];
            out.push(SensorReading {
                value: self.rng.random_range(-500.0..500.0),
                unit_of_measure: unit.to_string(),
                measure_name: measure.to_string(),
                display_name: format!("Sensor{i}{unit}"),
                organization: self.organization.clone(),
                location: self.location.clone(),
                guid: guid.clone(),
                time_created: Some(now),
            });
        }
        out
    }
}

fn random_guid(rng: &mut StdRng) -> String {
    let raw: u128 = rng.random();
    let hex = format!("{raw:032x}");
    format!(
        "{}-{}-{}-{}-{}",
        &hex[..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..]
    )
}

/// Self-contained adapter driving a `ReadingGenerator`
pub struct MockAdapter {
    name: String,
    config: MockConfig,
    lifecycle: Lifecycle,
}

impl MockAdapter {
    pub fn new(name: impl Into<String>, config: MockConfig) -> Self {
        let name = name.into();
        Self {
            lifecycle: Lifecycle::new(name.as_str()),
            name,
            config,
        }
    }

    /// Registry constructor
    pub fn from_config(name: &str, cfg: &AdapterConfig) -> Result<Box<dyn Adapter>> {
        Ok(Box::new(Self::new(name, MockConfig::from_adapter_config(cfg)?)))
    }
}

impl Adapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "mock"
    }

    fn state(&self) -> AdapterState {
        self.lifecycle.state()
    }

    fn set_endpoint(&mut self, endpoint: Option<Endpoint>) -> Result<()> {
        match endpoint {
            None => Ok(()),
            Some(ep) => Err(IngestionError::EndpointNotSupported {
                adapter: self.name.clone(),
                endpoint: ep.to_string(),
            }),
        }
    }

    fn start(&self, enqueue: EnqueueCallback, metrics: Arc<IngestionMetrics>) -> Result<()> {
        let token = self.lifecycle.begin()?;
        let generator = ReadingGenerator::new(&self.config);
        self.lifecycle.handle().set(AdapterState::Running);
        info!(
            adapter = %self.name,
            devices = self.config.devices,
            interval_ms = self.config.interval.as_millis() as u64,
            "mock adapter started"
        );
        self.lifecycle.handle().spawn_supervised(run(
            self.name.clone(),
            self.config.interval,
            generator,
            enqueue,
            metrics,
            token,
        ));
        Ok(())
    }

    fn stop(&self) {
        if self.lifecycle.end() {
            info!(adapter = %self.name, "mock adapter stopped");
        }
    }
}

async fn run(
    name: String,
    interval: Duration,
    mut generator: ReadingGenerator,
    enqueue: EnqueueCallback,
    metrics: Arc<IngestionMetrics>,
    mut token: ShutdownToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sent: u64 = 0;

    loop {
        tokio::select! {
            _ = token.wait() => break,
            _ = ticker.tick() => {}
        }
        for reading in generator.next_round() {
            if token.is_shutdown() {
                break;
            }
            match serde_json::to_vec(&reading) {
                Ok(raw) => {
                    deliver_record(&name, Ok(Bytes::from(raw)), &enqueue, &metrics);
                    sent += 1;
                    if sent % LOG_EVERY == 0 {
                        info!(adapter = %name, sent, "mock adapter progress");
                    }
                }
                Err(e) => error!(adapter = %name, error = %e, "failed to encode mock reading"),
            }
        }
    }
    debug!(adapter = %name, sent, "mock generator exited");
}
