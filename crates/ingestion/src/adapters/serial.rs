//! Serial port adapter
//!
//! Periodically enumerates serial device nodes and keeps exactly one
//! listener task per present port. Ports that vanish between scans have
//! their listener aborted; ports that (re)appear get a fresh one.
//!
//! Line settings (baud rate, parity) are expected to be configured on the
//! device node beforehand; the listener only reads.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use contracts::{AdapterConfig, AdapterState, EnqueueCallback, Endpoint};
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::adapter::Adapter;
use crate::adapters::common::{deliver_record, timer_period};
use crate::error::{IngestionError, Result};
use crate::framing::{FramingMode, RecordFramer, DEFAULT_MAX_RECORD_LEN};
use crate::lifecycle::{Lifecycle, ShutdownToken, StateHandle};
use crate::metrics::IngestionMetrics;

/// Enumerates candidate serial ports
pub trait PortScanner: Send + Sync {
    fn scan(&self) -> std::io::Result<Vec<String>>;
}

/// Lists `/dev/ttyS*`, `/dev/ttyUSB*` and `/dev/ttyACM*`
#[derive(Debug, Clone)]
pub struct DevPortScanner {
    dev_dir: PathBuf,
    prefixes: Vec<String>,
}

impl DevPortScanner {
    pub fn new(dev_dir: impl Into<PathBuf>, prefixes: Vec<String>) -> Self {
        Self {
            dev_dir: dev_dir.into(),
            prefixes,
        }
    }
}

impl Default for DevPortScanner {
    fn default() -> Self {
        Self::new(
            "/dev",
            vec!["ttyS".into(), "ttyUSB".into(), "ttyACM".into()],
        )
    }
}

impl PortScanner for DevPortScanner {
    fn scan(&self) -> std::io::Result<Vec<String>> {
        let mut ports = Vec::new();
        for entry in std::fs::read_dir(&self.dev_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if self.prefixes.iter().any(|p| name.starts_with(p.as_str())) {
                ports.push(entry.path().to_string_lossy().into_owned());
            }
        }
        ports.sort();
        Ok(ports)
    }
}

/// Serial adapter settings
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port enumeration period
    pub scan_interval: Duration,
    /// Pause before reopening a port after an open or read error
    pub reopen_delay: Duration,
    pub max_record_len: usize,
    pub read_buffer: usize,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_millis(5000),
            reopen_delay: Duration::from_millis(800),
            max_record_len: DEFAULT_MAX_RECORD_LEN,
            read_buffer: 1024,
        }
    }
}

impl SerialConfig {
    pub fn from_adapter_config(cfg: &AdapterConfig) -> Result<Self> {
        let defaults = Self::default();
        let invalid = |e: contracts::ContractError| IngestionError::invalid_config(&cfg.name, e.to_string());
        Ok(Self {
            scan_interval: timer_period(cfg, "scan_interval_ms", 5000)?,
            reopen_delay: cfg.duration_ms("reopen_delay_ms", 800).map_err(invalid)?,
            max_record_len: cfg
                .param("max_record_len")
                .map_err(invalid)?
                .unwrap_or(defaults.max_record_len),
            read_buffer: defaults.read_buffer,
        })
    }
}

type ListenerMap = Arc<Mutex<HashMap<String, JoinHandle<()>>>>;

/// Reads newline-delimited records from every connected serial port
pub struct SerialAdapter {
    name: String,
    config: SerialConfig,
    scanner: Arc<dyn PortScanner>,
    /// Restrict to one device path
    device: Option<String>,
    lifecycle: Lifecycle,
    listeners: ListenerMap,
}

impl SerialAdapter {
    pub fn new(name: impl Into<String>, config: SerialConfig) -> Self {
        Self::with_scanner(name, config, Arc::new(DevPortScanner::default()))
    }

    pub fn with_scanner(
        name: impl Into<String>,
        config: SerialConfig,
        scanner: Arc<dyn PortScanner>,
    ) -> Self {
        let name = name.into();
        Self {
            lifecycle: Lifecycle::new(name.as_str()),
            name,
            config,
            scanner,
            device: None,
            listeners: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registry constructor
    pub fn from_config(name: &str, cfg: &AdapterConfig) -> Result<Box<dyn Adapter>> {
        Ok(Box::new(Self::new(
            name,
            SerialConfig::from_adapter_config(cfg)?,
        )))
    }

    /// Ports tracked since the last scan, including ones whose device closed the stream. Sorted.
    pub fn active_ports(&self) -> Vec<String> {
        let mut ports: Vec<_> = lock(&self.listeners).keys().cloned().collect();
        ports.sort();
        ports
    }
}

impl Adapter for SerialAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "serial"
    }

    fn state(&self) -> AdapterState {
        self.lifecycle.state()
    }

    fn set_endpoint(&mut self, endpoint: Option<Endpoint>) -> Result<()> {
        match endpoint {
            None => {
                self.device = None;
                Ok(())
            }
            Some(Endpoint::Device { path }) => {
                self.device = Some(path);
                Ok(())
            }
            Some(other) => Err(IngestionError::EndpointNotSupported {
                adapter: self.name.clone(),
                endpoint: other.to_string(),
            }),
        }
    }

    fn start(&self, enqueue: EnqueueCallback, metrics: Arc<IngestionMetrics>) -> Result<()> {
        let token = self.lifecycle.begin()?;
        let scan = ScanLoop {
            name: self.name.clone(),
            config: self.config.clone(),
            scanner: Arc::clone(&self.scanner),
            device: self.device.clone(),
            listeners: Arc::clone(&self.listeners),
            state: self.lifecycle.handle(),
            enqueue,
            metrics,
        };
        self.lifecycle.handle().spawn_supervised(scan.run(token));
        info!(adapter = %self.name, device = ?self.device, "serial adapter started");
        Ok(())
    }

    fn stop(&self) {
        if !self.lifecycle.end() {
            return;
        }
        for (port, handle) in lock(&self.listeners).drain() {
            handle.abort();
            debug!(adapter = %self.name, port = %port, "serial listener aborted");
        }
        info!(adapter = %self.name, "serial adapter stopped");
    }
}

struct ScanLoop {
    name: String,
    config: SerialConfig,
    scanner: Arc<dyn PortScanner>,
    device: Option<String>,
    listeners: ListenerMap,
    state: StateHandle,
    enqueue: EnqueueCallback,
    metrics: Arc<IngestionMetrics>,
}

impl ScanLoop {
    async fn run(self, mut token: ShutdownToken) {
        let mut ticker = tokio::time::interval(self.config.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.wait() => break,
                _ = ticker.tick() => {}
            }
            if token.is_shutdown() {
                break;
            }
            let ports = self.scan();
            self.reconcile(&ports, &token);
        }

        for (_, handle) in lock(&self.listeners).drain() {
            handle.abort();
        }
        debug!(adapter = %self.name, "serial scan loop exited");
    }

    fn scan(&self) -> Vec<String> {
        match self.scanner.scan() {
            Ok(ports) => match &self.device {
                Some(device) => ports.into_iter().filter(|p| p == device).collect(),
                None => ports,
            },
            Err(e) => {
                warn!(adapter = %self.name, error = %e, "serial port enumeration failed");
                Vec::new()
            }
        }
    }

    fn reconcile(&self, ports: &[String], token: &ShutdownToken) {
        let mut listeners = lock(&self.listeners);

        // a listener that hit end of stream stays tracked until its port
        // disappears from the scan, so the same node is not read twice
        listeners.retain(|port, handle| {
            if ports.contains(port) {
                return true;
            }
            handle.abort();
            info!(adapter = %self.name, port = %port, "serial port removed");
            false
        });

        for port in ports {
            if listeners.contains_key(port) {
                continue;
            }
            info!(adapter = %self.name, port = %port, "serial port detected, starting listener");
            let listener = PortListener {
                adapter: self.name.clone(),
                port: port.clone(),
                reopen_delay: self.config.reopen_delay,
                max_record_len: self.config.max_record_len,
                read_buffer: self.config.read_buffer,
                enqueue: Arc::clone(&self.enqueue),
                metrics: Arc::clone(&self.metrics),
            };
            listeners.insert(port.clone(), tokio::spawn(listener.run(token.clone())));
        }

        let next = if listeners.values().all(JoinHandle::is_finished) {
            AdapterState::Failed
        } else {
            AdapterState::Running
        };
        if next == AdapterState::Failed && self.state.get() != AdapterState::Failed {
            if listeners.is_empty() {
                warn!(adapter = %self.name, "no connected serial ports");
            } else {
                warn!(adapter = %self.name, ports = listeners.len(), "all serial ports closed by their devices");
            }
        }
        self.state.set(next);
    }
}

struct PortListener {
    adapter: String,
    port: String,
    reopen_delay: Duration,
    max_record_len: usize,
    read_buffer: usize,
    enqueue: EnqueueCallback,
    metrics: Arc<IngestionMetrics>,
}

impl PortListener {
    async fn run(self, mut token: ShutdownToken) {
        let mut buf = vec![0u8; self.read_buffer.max(1)];

        while !token.is_shutdown() {
            match tokio::fs::File::open(&self.port).await {
                Ok(mut file) => {
                    debug!(adapter = %self.adapter, port = %self.port, "serial port opened");
                    let mut framer =
                        RecordFramer::with_max_len(FramingMode::Lines, self.max_record_len);
                    loop {
                        let read = tokio::select! {
                            _ = token.wait() => return,
                            read = file.read(&mut buf) => read,
                        };
                        match read {
                            Ok(0) => {
                                if let Some(record) = framer.finish() {
                                    self.deliver(record);
                                }
                                info!(adapter = %self.adapter, port = %self.port, "serial port closed by device");
                                return;
                            }
                            Ok(n) => {
                                for record in framer.push(&buf[..n]) {
                                    self.deliver(record);
                                }
                            }
                            Err(e) => {
                                warn!(adapter = %self.adapter, port = %self.port, error = %e, "serial read failed, closing port");
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(adapter = %self.adapter, port = %self.port, error = %e, "failed to open serial port");
                }
            }

            self.metrics.record_restart(&self.adapter);
            tokio::select! {
                _ = token.wait() => return,
                _ = tokio::time::sleep(self.reopen_delay) => {}
            }
        }
    }

    fn deliver(&self, record: std::result::Result<bytes::Bytes, crate::error::FramingError>) {
        deliver_record(&self.adapter, record, &self.enqueue, &self.metrics);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::io::Write;

    /// Scanner whose port list the test controls
    #[derive(Default)]
    struct FakeScanner(Mutex<Vec<String>>);

    impl FakeScanner {
        fn set(&self, ports: &[&str]) {
            *self.0.lock().unwrap() = ports.iter().map(|p| p.to_string()).collect();
        }
    }

    impl PortScanner for FakeScanner {
        fn scan(&self) -> std::io::Result<Vec<String>> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    fn fast_config() -> SerialConfig {
        SerialConfig {
            scan_interval: Duration::from_millis(20),
            reopen_delay: Duration::from_secs(30),
            ..Default::default()
        }
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

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(3), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[test]
    fn test_endpoint_rules() {
        let mut adapter = SerialAdapter::new("serial", SerialConfig::default());
        assert!(adapter.set_endpoint(None).is_ok());
        assert!(adapter
            .set_endpoint(Some(Endpoint::device("/dev/ttyUSB0")))
            .is_ok());
        assert!(matches!(
            adapter.set_endpoint(Some(Endpoint::tcp("localhost", 1))),
            Err(IngestionError::EndpointNotSupported { .. })
        ));
    }

    #[test]
    fn test_dev_scanner_filters_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["ttyUSB0", "ttyACM1", "tty0", "null"] {
            std::fs::File::create(dir.path().join(name)).unwrap();
        }
        let scanner = DevPortScanner::new(
            dir.path(),
            vec!["ttyUSB".into(), "ttyACM".into()],
        );
        let ports = scanner.scan().unwrap();
        assert_eq!(ports.len(), 2);
        assert!(ports[0].ends_with("ttyACM1"));
        assert!(ports[1].ends_with("ttyUSB0"));
    }

    #[tokio::test]
    async fn test_rescan_tracks_port_presence() {
        let scanner = Arc::new(FakeScanner::default());
        scanner.set(&["/nonexistent/ttyUSB0", "/nonexistent/ttyUSB1"]);
        let adapter = SerialAdapter::with_scanner("serial", fast_config(), scanner.clone());
        let (enqueue, _) = collecting_enqueue();

        adapter
            .start(enqueue, Arc::new(IngestionMetrics::new()))
            .unwrap();
        wait_until(|| adapter.active_ports().len() == 2).await;
        assert_eq!(adapter.state(), AdapterState::Running);

        // unplugged between two scans
        scanner.set(&["/nonexistent/ttyUSB1"]);
        wait_until(|| adapter.active_ports() == vec!["/nonexistent/ttyUSB1".to_string()]).await;

        scanner.set(&[]);
        wait_until(|| adapter.state() == AdapterState::Failed).await;
        assert!(adapter.active_ports().is_empty());

        // plugged back in
        scanner.set(&["/nonexistent/ttyUSB0"]);
        wait_until(|| adapter.active_ports() == vec!["/nonexistent/ttyUSB0".to_string()]).await;
        assert_eq!(adapter.state(), AdapterState::Running);

        adapter.stop();
        assert!(adapter.active_ports().is_empty());
        assert_eq!(adapter.state(), AdapterState::Stopped);
    }

    #[tokio::test]
    async fn test_reads_lines_from_device() {
        let dir = tempfile::tempdir().unwrap();
        let port = dir.path().join("ttyUSB0");
        let mut file = std::fs::File::create(&port).unwrap();
        writeln!(file, "{{\"Value\":1}}").unwrap();
        writeln!(file, "{{\"Value\":2}}").unwrap();
        file.write_all(b"{\"Value\":3}").unwrap();
        drop(file);

        let port = port.to_string_lossy().into_owned();
        let scanner = Arc::new(FakeScanner::default());
        scanner.set(&[port.as_str()]);
        let mut adapter = SerialAdapter::with_scanner("serial", fast_config(), scanner);
        adapter
            .set_endpoint(Some(Endpoint::device(port.clone())))
            .unwrap();

        let (enqueue, seen) = collecting_enqueue();
        let metrics = Arc::new(IngestionMetrics::new());
        adapter.start(enqueue, Arc::clone(&metrics)).unwrap();

        wait_until(|| seen.lock().unwrap().len() == 3).await;
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen[0], Bytes::from_static(b"{\"Value\":1}"));
        assert_eq!(seen[2], Bytes::from_static(b"{\"Value\":3}"));
        assert_eq!(metrics.snapshot().records_received, 3);

        adapter.stop();
        adapter.stop();
    }

    #[tokio::test]
    async fn test_closed_port_is_not_reread_until_replugged() {
        let dir = tempfile::tempdir().unwrap();
        let port = dir.path().join("ttyACM0");
        std::fs::write(&port, "{\"Value\":1}\n{\"Value\":2}\n").unwrap();
        let port = port.to_string_lossy().into_owned();

        let scanner = Arc::new(FakeScanner::default());
        scanner.set(&[port.as_str()]);
        let config = SerialConfig {
            scan_interval: Duration::from_millis(10),
            reopen_delay: Duration::from_millis(10),
            ..Default::default()
        };
        let adapter = SerialAdapter::with_scanner("serial", config, scanner.clone());
        let (enqueue, seen) = collecting_enqueue();
        adapter
            .start(enqueue, Arc::new(IngestionMetrics::new()))
            .unwrap();

        wait_until(|| seen.lock().unwrap().len() == 2).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(seen.lock().unwrap().len(), 2, "records must be read once");
        assert_eq!(adapter.active_ports(), vec![port.clone()]);
        assert_eq!(adapter.state(), AdapterState::Failed);

        scanner.set(&[]);
        wait_until(|| adapter.active_ports().is_empty()).await;
        scanner.set(&[port.as_str()]);
        wait_until(|| seen.lock().unwrap().len() == 4).await;

        adapter.stop();
    }

    #[test]
    fn test_zero_scan_interval_rejected() {
        let mut cfg = AdapterConfig::new("serial", "serial");
        cfg.params.insert("scan_interval_ms".into(), "0".into());
        assert!(matches!(
            SerialConfig::from_adapter_config(&cfg),
            Err(IngestionError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_stop_without_start() {
        let adapter = SerialAdapter::new("serial", SerialConfig::default());
        adapter.stop();
        assert_eq!(adapter.state(), AdapterState::Stopped);
    }
}
