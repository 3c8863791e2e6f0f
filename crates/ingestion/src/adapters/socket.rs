//! TCP socket adapter
//!
//! Records arrive framed as `<payload>`; bytes outside the delimiters are
//! discarded. In client mode the adapter dials the endpoint and keeps
//! reconnecting with a fixed back-off until the retry budget runs out. In
//! server mode it listens on the endpoint and serves every accepted peer.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use contracts::{AdapterConfig, AdapterState, EnqueueCallback, Endpoint};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::adapter::Adapter;
use crate::adapters::common::{deliver_record, timer_period};
use crate::error::{IngestionError, Result};
use crate::framing::{FramingMode, RecordFramer, DEFAULT_MAX_RECORD_LEN};
use crate::lifecycle::{Lifecycle, ShutdownToken, StateHandle};
use crate::metrics::IngestionMetrics;

/// Connection direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SocketMode {
    /// Dial out to the endpoint
    #[default]
    Client,
    /// Accept connections on the endpoint
    Server,
}

impl FromStr for SocketMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "client" => Ok(Self::Client),
            "server" => Ok(Self::Server),
            other => Err(format!("unknown socket mode '{other}'")),
        }
    }
}

/// Socket adapter settings
#[derive(Debug, Clone)]
pub struct SocketConfig {
    pub mode: SocketMode,
    pub retry_delay: Duration,
    /// Consecutive failed attempts tolerated before giving up
    pub max_retries: u32,
    pub max_record_len: usize,
    pub read_buffer: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            mode: SocketMode::Client,
            retry_delay: Duration::from_millis(1000),
            max_retries: 20000,
            max_record_len: DEFAULT_MAX_RECORD_LEN,
            read_buffer: 4096,
        }
    }
}

impl SocketConfig {
    pub fn from_adapter_config(cfg: &AdapterConfig) -> Result<Self> {
        let defaults = Self::default();
        let invalid =
            |e: contracts::ContractError| IngestionError::invalid_config(&cfg.name, e.to_string());
        let mode = match cfg.params.get("mode") {
            Some(raw) => raw
                .parse::<SocketMode>()
                .map_err(|e| IngestionError::invalid_config(&cfg.name, e))?,
            None => defaults.mode,
        };
        Ok(Self {
            mode,
            retry_delay: timer_period(cfg, "retry_delay_ms", 1000)?,
            max_retries: cfg
                .param("max_retries")
                .map_err(invalid)?
                .unwrap_or(defaults.max_retries),
            max_record_len: cfg
                .param("max_record_len")
                .map_err(invalid)?
                .unwrap_or(defaults.max_record_len),
            read_buffer: defaults.read_buffer,
        })
    }
}

/// Reads `<...>` framed records over TCP
pub struct SocketAdapter {
    name: String,
    config: SocketConfig,
    endpoint: Option<(String, u16)>,
    lifecycle: Lifecycle,
}

impl SocketAdapter {
    pub fn new(name: impl Into<String>, config: SocketConfig) -> Self {
        let name = name.into();
        Self {
            lifecycle: Lifecycle::new(name.as_str()),
            name,
            config,
            endpoint: None,
        }
    }

    /// Registry constructor
    pub fn from_config(name: &str, cfg: &AdapterConfig) -> Result<Box<dyn Adapter>> {
        Ok(Box::new(Self::new(
            name,
            SocketConfig::from_adapter_config(cfg)?,
        )))
    }

    pub fn mode(&self) -> SocketMode {
        self.config.mode
    }
}

impl Adapter for SocketAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "socket"
    }

    fn state(&self) -> AdapterState {
        self.lifecycle.state()
    }

    fn set_endpoint(&mut self, endpoint: Option<Endpoint>) -> Result<()> {
        match endpoint {
            Some(Endpoint::Tcp { host, port }) => {
                self.endpoint = Some((host, port));
                Ok(())
            }
            Some(other) => Err(IngestionError::EndpointNotSupported {
                adapter: self.name.clone(),
                endpoint: other.to_string(),
            }),
            None => Err(IngestionError::EndpointRequired {
                adapter: self.name.clone(),
            }),
        }
    }

    fn start(&self, enqueue: EnqueueCallback, metrics: Arc<IngestionMetrics>) -> Result<()> {
        let Some((host, port)) = self.endpoint.clone() else {
            return Err(IngestionError::EndpointRequired {
                adapter: self.name.clone(),
            });
        };
        let token = self.lifecycle.begin()?;
        let session = Session {
            adapter: self.name.clone(),
            addr: format!("{host}:{port}"),
            config: self.config.clone(),
            state: self.lifecycle.handle(),
            enqueue,
            metrics,
        };
        info!(adapter = %self.name, addr = %session.addr, mode = ?self.config.mode, "socket adapter started");
        let state = self.lifecycle.handle();
        match self.config.mode {
            SocketMode::Client => state.spawn_supervised(session.run_client(token)),
            SocketMode::Server => state.spawn_supervised(session.run_server(token)),
        }
        Ok(())
    }

    fn stop(&self) {
        if self.lifecycle.end() {
            info!(adapter = %self.name, "socket adapter stopped");
        }
    }
}

#[derive(Clone)]
struct Session {
    adapter: String,
    addr: String,
    config: SocketConfig,
    state: StateHandle,
    enqueue: EnqueueCallback,
    metrics: Arc<IngestionMetrics>,
}

impl Session {
    async fn run_client(self, mut token: ShutdownToken) {
        let mut failures: u32 = 0;

        while !token.is_shutdown() {
            let connected = tokio::select! {
                _ = token.wait() => break,
                connected = TcpStream::connect(&self.addr) => connected,
            };

            match connected {
                Ok(stream) => {
                    info!(adapter = %self.adapter, addr = %self.addr, "socket connected");
                    self.state.set(AdapterState::Running);
                    let received = self.serve_stream(stream, token.clone()).await;
                    if token.is_shutdown() {
                        break;
                    }
                    warn!(adapter = %self.adapter, addr = %self.addr, received, "socket disconnected");
                    if received > 0 {
                        failures = 0;
                    } else {
                        failures += 1;
                    }
                }
                Err(e) => {
                    failures += 1;
                    debug!(adapter = %self.adapter, addr = %self.addr, error = %e, attempt = failures, "socket connect failed");
                }
            }

            self.state.set(AdapterState::Failed);
            if failures > self.config.max_retries {
                error!(
                    adapter = %self.adapter,
                    addr = %self.addr,
                    retries = self.config.max_retries,
                    "socket retry budget exhausted, giving up"
                );
                return;
            }
            self.metrics.record_restart(&self.adapter);

            tokio::select! {
                _ = token.wait() => break,
                _ = tokio::time::sleep(self.config.retry_delay) => {}
            }
        }
        debug!(adapter = %self.adapter, "socket client loop exited");
    }

    async fn run_server(self, mut token: ShutdownToken) {
        let mut failures: u32 = 0;
        let listener = loop {
            match TcpListener::bind(&self.addr).await {
                Ok(listener) => break listener,
                Err(e) => {
                    failures += 1;
                    warn!(adapter = %self.adapter, addr = %self.addr, error = %e, "socket bind failed");
                    self.state.set(AdapterState::Failed);
                    if failures > self.config.max_retries {
                        error!(adapter = %self.adapter, addr = %self.addr, "socket retry budget exhausted, giving up");
                        return;
                    }
                    tokio::select! {
                        _ = token.wait() => return,
                        _ = tokio::time::sleep(self.config.retry_delay) => {}
                    }
                }
            }
        };

        info!(adapter = %self.adapter, addr = %self.addr, "socket listening");
        self.state.set(AdapterState::Running);

        loop {
            let accepted = tokio::select! {
                _ = token.wait() => break,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    debug!(adapter = %self.adapter, peer = %peer, "socket client accepted");
                    let session = self.clone();
                    let token = token.clone();
                    tokio::spawn(async move {
                        let received = session.serve_stream(stream, token).await;
                        debug!(adapter = %session.adapter, peer = %peer, received, "socket client closed");
                    });
                }
                Err(e) => {
                    warn!(adapter = %self.adapter, error = %e, "socket accept failed");
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }
        debug!(adapter = %self.adapter, "socket server loop exited");
    }

    /// Pump one connection until EOF, error or shutdown. Returns records framed.
    async fn serve_stream<S>(&self, mut stream: S, mut token: ShutdownToken) -> u64
    where
        S: AsyncRead + Unpin,
    {
        let mut framer = RecordFramer::with_max_len(FramingMode::AngleBrackets, self.config.max_record_len);
        let mut buf = vec![0u8; self.config.read_buffer.max(1)];
        let mut received = 0u64;

        loop {
            let read = tokio::select! {
                _ = token.wait() => return received,
                read = stream.read(&mut buf) => read,
            };
            match read {
                Ok(0) => return received,
                Ok(n) => {
                    for record in framer.push(&buf[..n]) {
                        received += 1;
                        deliver_record(&self.adapter, record, &self.enqueue, &self.metrics);
                    }
                }
                Err(e) => {
                    warn!(adapter = %self.adapter, error = %e, "socket read failed");
                    return received;
                }
            }
        }
    }
}
