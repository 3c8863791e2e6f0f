//! Adapter registry
//!
//! Maps adapter kinds to constructors, instantiates configured adapters
//! and drives their lifecycle as a group.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use contracts::{AdapterConfig, AdapterState, DataArrivalObserver, EnqueueCallback, Endpoint};
use tracing::{debug, error, info, instrument, warn};

use crate::adapter::Adapter;
use crate::adapters::{MockAdapter, SerialAdapter, SocketAdapter};
use crate::error::{IngestionError, Result};
use crate::metrics::IngestionMetrics;

/// Adapter constructor: `(instance name, config) -> adapter`
pub type AdapterFactory =
    Arc<dyn Fn(&str, &AdapterConfig) -> Result<Box<dyn Adapter>> + Send + Sync>;

/// One adapter entry or instance that could not be loaded
#[derive(Debug)]
pub struct LoadFailure {
    /// Instance name (`name` or `name@endpoint`)
    pub adapter: String,
    pub kind: String,
    pub error: IngestionError,
}

/// Result of `AdapterRegistry::load`
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// An adapter whose `stop` panicked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopFailure {
    pub adapter: String,
}

/// Adapter Registry
///
/// Owns the factory table and every instantiated adapter.
pub struct AdapterRegistry {
    factories: HashMap<String, AdapterFactory>,
    adapters: Vec<Box<dyn Adapter>>,
    metrics: Arc<IngestionMetrics>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterRegistry {
    /// Empty factory table
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            adapters: Vec::new(),
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    /// Factory table with `serial`, `socket` and `mock`
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("serial", SerialAdapter::from_config);
        registry.register("socket", SocketAdapter::from_config);
        registry.register("mock", MockAdapter::from_config);
        registry
    }

    /// Register (or replace) the constructor for `kind`
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&str, &AdapterConfig) -> Result<Box<dyn Adapter>> + Send + Sync + 'static,
    {
        let kind = kind.into();
        if self
            .factories
            .insert(kind.clone(), Arc::new(factory))
            .is_some()
        {
            debug!(kind = %kind, "adapter factory replaced");
        }
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<_> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Instantiate every configured adapter.
    ///
    /// Entries without endpoints yield one instance configured with `None`.
    /// Otherwise each endpoint yields an instance named `name@endpoint`.
    /// Failures are isolated: they are logged, reported and skipped.
    #[instrument(name = "registry_load", skip(self, configs), fields(entries = configs.len()))]
    pub fn load(&mut self, configs: &[AdapterConfig]) -> LoadReport {
        let mut report = LoadReport::default();

        for cfg in configs {
            let Some(factory) = self.factories.get(&cfg.kind).cloned() else {
                warn!(adapter = %cfg.name, kind = %cfg.kind, "unknown adapter kind, skipping");
                report.failures.push(LoadFailure {
                    adapter: cfg.name.clone(),
                    kind: cfg.kind.clone(),
                    error: IngestionError::UnknownKind {
                        kind: cfg.kind.clone(),
                    },
                });
                continue;
            };

            let instances: Vec<(String, Option<Endpoint>)> = if cfg.endpoints.is_empty() {
                vec![(cfg.name.clone(), None)]
            } else {
                cfg.endpoints
                    .iter()
                    .map(|ep| (format!("{}@{}", cfg.name, ep), Some(ep.clone())))
                    .collect()
            };

            for (instance, endpoint) in instances {
                match construct(&factory, &instance, cfg, endpoint) {
                    Ok(adapter) => {
                        info!(adapter = %instance, kind = %cfg.kind, "adapter loaded");
                        report.loaded.push(instance);
                        self.adapters.push(adapter);
                    }
                    Err(e) => {
                        error!(adapter = %instance, kind = %cfg.kind, error = %e, "failed to load adapter");
                        report.failures.push(LoadFailure {
                            adapter: instance,
                            kind: cfg.kind.clone(),
                            error: e,
                        });
                    }
                }
            }
        }

        report
    }

    /// Add an already-constructed adapter
    pub fn add(&mut self, adapter: Box<dyn Adapter>) {
        debug!(adapter = %adapter.name(), kind = adapter.kind(), "adapter added");
        self.adapters.push(adapter);
    }

    /// Start every adapter. Returns how many started.
    ///
    /// `observer` sees each raw record before it is enqueued; a panicking
    /// observer is logged and the record is still enqueued.
    #[instrument(name = "registry_start_all", skip_all, fields(count = self.adapters.len()))]
    pub fn start_all(
        &self,
        enqueue: EnqueueCallback,
        observer: Option<DataArrivalObserver>,
    ) -> usize {
        let enqueue = match observer {
            Some(observer) => observed(enqueue, observer),
            None => enqueue,
        };

        let mut started = 0;
        for adapter in &self.adapters {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                adapter.start(Arc::clone(&enqueue), Arc::clone(&self.metrics))
            }));
            match outcome {
                Ok(Ok(())) => started += 1,
                Ok(Err(IngestionError::AlreadyRunning { .. })) => {
                    debug!(adapter = %adapter.name(), "adapter already running");
                }
                Ok(Err(e)) => {
                    error!(adapter = %adapter.name(), error = %e, "failed to start adapter");
                }
                Err(_) => {
                    error!(adapter = %adapter.name(), "adapter panicked while starting");
                }
            }
        }
        info!(started, total = self.adapters.len(), "adapters started");
        started
    }

    /// Stop every adapter; one panicking adapter does not prevent the rest
    #[instrument(name = "registry_stop_all", skip_all, fields(count = self.adapters.len()))]
    pub fn stop_all(&self) -> Vec<StopFailure> {
        let mut failures = Vec::new();
        for adapter in &self.adapters {
            if catch_unwind(AssertUnwindSafe(|| adapter.stop())).is_err() {
                error!(adapter = %adapter.name(), "adapter panicked while stopping");
                failures.push(StopFailure {
                    adapter: adapter.name().to_string(),
                });
            }
        }
        info!(failures = failures.len(), "adapters stopped");
        failures
    }

    /// `(name, state)` for every adapter, in load order
    pub fn states(&self) -> Vec<(String, AdapterState)> {
        self.adapters
            .iter()
            .map(|a| (a.name().to_string(), a.state()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        Arc::clone(&self.metrics)
    }
}

fn construct(
    factory: &AdapterFactory,
    instance: &str,
    cfg: &AdapterConfig,
    endpoint: Option<Endpoint>,
) -> Result<Box<dyn Adapter>> {
    let mut adapter = catch_unwind(AssertUnwindSafe(|| factory(instance, cfg))).map_err(|_| {
        IngestionError::ConstructionPanicked {
            adapter: instance.to_string(),
        }
    })??;
    adapter.set_endpoint(endpoint)?;
    Ok(adapter)
}

fn observed(enqueue: EnqueueCallback, observer: DataArrivalObserver) -> EnqueueCallback {
    Arc::new(move |raw: Bytes| {
        if catch_unwind(AssertUnwindSafe(|| observer(&raw))).is_err() {
            warn!("data arrival observer panicked");
        }
        enqueue(raw)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Adapter that records lifecycle calls and emits one record on start
    struct Probe {
        name: String,
        needs_endpoint: bool,
        panic_on_stop: bool,
        stops: Arc<AtomicUsize>,
    }

    impl Adapter for Probe {
        fn name(&self) -> &str {
            &self.name
        }

        fn kind(&self) -> &'static str {
            "probe"
        }

        fn state(&self) -> AdapterState {
            AdapterState::Stopped
        }

        fn set_endpoint(&mut self, endpoint: Option<Endpoint>) -> Result<()> {
            match (self.needs_endpoint, endpoint) {
                (true, None) => Err(IngestionError::EndpointRequired {
                    adapter: self.name.clone(),
                }),
                _ => Ok(()),
            }
        }

        fn start(&self, enqueue: EnqueueCallback, _metrics: Arc<IngestionMetrics>) -> Result<()> {
            enqueue(Bytes::from(self.name.clone()))
                .map(|_| ())
                .map_err(|e| IngestionError::invalid_config(&self.name, e.to_string()))
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if self.panic_on_stop {
                panic!("stop failed");
            }
        }
    }

    fn probe_registry(stops: Arc<AtomicUsize>) -> AdapterRegistry {
        let mut registry = AdapterRegistry::new();
        registry.register("probe", move |name: &str, cfg: &AdapterConfig| {
            Ok(Box::new(Probe {
                name: name.to_string(),
                needs_endpoint: cfg.params.contains_key("needs_endpoint"),
                panic_on_stop: cfg.params.contains_key("panic_on_stop"),
                stops: Arc::clone(&stops),
            }) as Box<dyn Adapter>)
        });
        registry.register("boom", |_: &str, _: &AdapterConfig| -> Result<Box<dyn Adapter>> {
            panic!("constructor exploded")
        });
        registry
    }

    fn collecting_enqueue() -> (EnqueueCallback, Arc<Mutex<Vec<Bytes>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let enqueue: EnqueueCallback = Arc::new(move |raw: Bytes| {
            let mut seen = sink.lock().unwrap();
            seen.push(raw);
            Ok(seen.len())
        });
        (enqueue, seen)
    }

    #[test]
    fn test_builtin_kinds() {
        let registry = AdapterRegistry::with_builtin();
        assert_eq!(registry.kinds(), vec!["mock", "serial", "socket"]);
    }

    #[test]
    fn test_load_isolates_failures() {
        let mut registry = probe_registry(Arc::new(AtomicUsize::new(0)));

        let mut multi = AdapterConfig::new("multi", "probe");
        multi.endpoints = vec![Endpoint::tcp("a", 1), Endpoint::tcp("b", 2)];
        let mut needy = AdapterConfig::new("needy", "probe");
        needy.params.insert("needs_endpoint".into(), "1".into());

        let report = registry.load(&[
            AdapterConfig::new("plain", "probe"),
            AdapterConfig::new("ghost", "nope"),
            AdapterConfig::new("bad", "boom"),
            needy,
            multi,
        ]);

        assert_eq!(report.loaded, vec!["plain", "multi@a:1", "multi@b:2"]);
        assert_eq!(report.failures.len(), 3);
        assert!(matches!(report.failures[0].error, IngestionError::UnknownKind { .. }));
        assert!(matches!(
            report.failures[1].error,
            IngestionError::ConstructionPanicked { .. }
        ));
        assert!(matches!(
            report.failures[2].error,
            IngestionError::EndpointRequired { .. }
        ));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_socket_without_endpoint_is_not_loaded() {
        let mut registry = AdapterRegistry::with_builtin();
        let report = registry.load(&[AdapterConfig::new("feed", "socket")]);
        assert!(report.loaded.is_empty());
        assert!(matches!(
            report.failures[0].error,
            IngestionError::EndpointRequired { .. }
        ));
    }

    #[test]
    fn test_observer_panic_does_not_block_enqueue() {
        let mut registry = probe_registry(Arc::new(AtomicUsize::new(0)));
        registry.load(&[AdapterConfig::new("a", "probe"), AdapterConfig::new("b", "probe")]);

        let (enqueue, seen) = collecting_enqueue();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let observer: DataArrivalObserver = Arc::new(move |_raw: &Bytes| {
            counter.fetch_add(1, Ordering::SeqCst);
            panic!("observer failed");
        });

        assert_eq!(registry.start_all(enqueue, Some(observer)), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_stop_all_continues_past_panics() {
        let stops = Arc::new(AtomicUsize::new(0));
        let mut registry = probe_registry(Arc::clone(&stops));
        let mut loud = AdapterConfig::new("loud", "probe");
        loud.params.insert("panic_on_stop".into(), "1".into());
        registry.load(&[loud, AdapterConfig::new("quiet", "probe")]);

        let failures = registry.stop_all();
        assert_eq!(
            failures,
            vec![StopFailure {
                adapter: "loud".into()
            }]
        );
        assert_eq!(stops.load(Ordering::SeqCst), 2);
    }
}
