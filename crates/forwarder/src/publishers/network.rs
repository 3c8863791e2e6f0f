//! NetworkPublisher - one UDP datagram per batch

use std::collections::HashMap;
use std::net::SocketAddr;

use contracts::{Batch, ContractError, MessagePublisher};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Serialization format for network transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

/// Configuration for NetworkPublisher
#[derive(Debug, Clone)]
pub struct NetworkPublisherConfig {
    /// Broker address
    pub addr: SocketAddr,
    pub format: NetworkFormat,
    /// Largest datagram sent; bigger batches fail instead of being split
    pub max_packet_size: usize,
}

impl NetworkPublisherConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => return Err(format!("unknown format '{}'", other)),
        };

        let max_packet_size = match params.get("max_packet_size") {
            Some(raw) => raw
                .parse()
                .map_err(|_| format!("invalid max_packet_size '{}'", raw))?,
            None => 65000,
        };

        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

/// Publisher that sends each batch as a datagram
pub struct NetworkPublisher {
    name: String,
    config: NetworkPublisherConfig,
    socket: Mutex<Option<UdpSocket>>,
}

impl NetworkPublisher {
    /// Bind an ephemeral local port and connect to the broker address
    #[instrument(name = "network_publisher_new", skip(name, config), fields(addr = %config.addr))]
    pub async fn new(
        name: impl Into<String>,
        config: NetworkPublisherConfig,
    ) -> std::io::Result<Self> {
        let name = name.into();
        let local = if config.addr.is_ipv6() {
            "[::]:0"
        } else {
            "0.0.0.0:0"
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(config.addr).await?;

        debug!(publisher = %name, target = %config.addr, "NetworkPublisher connected");

        Ok(Self {
            name,
            config,
            socket: Mutex::new(Some(socket)),
        })
    }

    /// Create from params (for factory)
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NetworkPublisherConfig::from_params(params)
            .map_err(|e| ContractError::publisher_connection(&name, e))?;

        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::publisher_connection(&name, e.to_string()))
    }

    pub fn config(&self) -> &NetworkPublisherConfig {
        &self.config
    }

    fn encode(&self, batch: &Batch) -> Result<Vec<u8>, ContractError> {
        let data = match self.config.format {
            NetworkFormat::Json => serde_json::to_vec(batch).map_err(|e| e.to_string()),
            NetworkFormat::Bincode => bincode::serialize(batch).map_err(|e| e.to_string()),
        }
        .map_err(|e| ContractError::publish(&self.name, e))?;

        if data.len() > self.config.max_packet_size {
            return Err(ContractError::publish(
                &self.name,
                format!(
                    "encoded batch is {} bytes, limit is {}",
                    data.len(),
                    self.config.max_packet_size
                ),
            ));
        }
        Ok(data)
    }
}

impl MessagePublisher for NetworkPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_publisher_send",
        skip(self, batch),
        fields(publisher = %self.name, batch_id = batch.id)
    )]
    async fn send(&self, batch: &Batch) -> Result<(), ContractError> {
        let data = self.encode(batch)?;
        let guard = self.socket.lock().await;
        let socket = guard
            .as_ref()
            .ok_or_else(|| ContractError::publish(&self.name, "publisher closed"))?;
        let sent = socket
            .send(&data)
            .await
            .map_err(|e| ContractError::publish(&self.name, e.to_string()))?;
        debug!(publisher = %self.name, batch_id = batch.id, bytes = sent, "Sent");
        Ok(())
    }

    #[instrument(name = "network_publisher_close", skip(self))]
    async fn close(&self) -> Result<(), ContractError> {
        self.socket.lock().await.take();
        debug!(publisher = %self.name, "NetworkPublisher closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SensorReading;

    fn batch(n: usize) -> Batch {
        let readings = (0..n)
            .map(|i| {
                serde_json::from_str::<SensorReading>(&format!(
                    r#"{{"Value":{i},"GUID":"dev{i}","TimeCreated":"2024-01-01T00:00:00Z"}}"#
                ))
                .unwrap()
            })
            .collect();
        Batch::new(7, readings)
    }

    #[test]
    fn test_network_publisher_config_parsing() {
        let mut params = HashMap::new();
        params.insert("addr".to_string(), "127.0.0.1:9999".to_string());
        params.insert("format".to_string(), "bincode".to_string());

        let config = NetworkPublisherConfig::from_params(&params).unwrap();
        assert_eq!(config.addr.port(), 9999);
        assert_eq!(config.format, NetworkFormat::Bincode);
        assert_eq!(config.max_packet_size, 65000);

        params.insert("format".to_string(), "xml".to_string());
        assert!(NetworkPublisherConfig::from_params(&params).is_err());
        assert!(NetworkPublisherConfig::from_params(&HashMap::new()).is_err());
    }

    #[tokio::test]
    async fn test_datagram_reaches_receiver() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = NetworkPublisherConfig {
            addr: receiver.local_addr().unwrap(),
            format: NetworkFormat::Json,
            max_packet_size: 65000,
        };
        let publisher = NetworkPublisher::new("test_net", config).await.unwrap();
        publisher.send(&batch(3)).await.unwrap();

        let mut buf = vec![0u8; 65536];
        let n = receiver.recv(&mut buf).await.unwrap();
        let decoded: Batch = serde_json::from_slice(&buf[..n]).unwrap();
        assert_eq!(decoded.id, 7);
        assert_eq!(decoded.len(), 3);
    }

    #[tokio::test]
    async fn test_bincode_datagram_is_compact() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = NetworkPublisherConfig {
            addr: receiver.local_addr().unwrap(),
            format: NetworkFormat::Bincode,
            max_packet_size: 65000,
        };
        let publisher = NetworkPublisher::new("test_net", config).await.unwrap();
        let sent = batch(2);
        publisher.send(&sent).await.unwrap();

        let mut buf = vec![0u8; 65536];
        let n = receiver.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], bincode::serialize(&sent).unwrap().as_slice());
        assert!(n < serde_json::to_vec(&sent).unwrap().len());
    }

    /// Field-for-field mirror of `SensorReading` without the untagged GUID parser
    #[derive(serde::Deserialize)]
    struct WireReading {
        value: f64,
        _unit_of_measure: String,
        _measure_name: String,
        _display_name: String,
        _organization: String,
        _location: String,
        guid: String,
        time_created: Option<chrono::DateTime<chrono::Utc>>,
    }

    #[derive(serde::Deserialize)]
    struct WireBatch {
        id: u64,
        _created_at: chrono::DateTime<chrono::Utc>,
        readings: Vec<WireReading>,
    }

    #[test]
    fn test_bincode_decodes_readings_without_timestamp() {
        let mut sent = batch(2);
        sent.readings[0].time_created = None;

        let bytes = bincode::serialize(&sent).unwrap();
        let decoded: WireBatch = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded.id, 7);
        assert_eq!(decoded.readings.len(), 2);
        assert!(decoded.readings[0].time_created.is_none());
        assert_eq!(decoded.readings[1].guid, "dev1");
        assert_eq!(decoded.readings[1].value, 1.0);
        assert_eq!(decoded.readings[1].time_created, sent.readings[1].time_created);
    }

    #[tokio::test]
    async fn test_oversize_batch_fails() {
        let config = NetworkPublisherConfig {
            addr: "127.0.0.1:19998".parse().unwrap(),
            format: NetworkFormat::Json,
            max_packet_size: 64,
        };
        let publisher = NetworkPublisher::new("test_net", config).await.unwrap();
        assert!(publisher.send(&batch(5)).await.is_err());
        publisher.close().await.unwrap();
        assert!(publisher.send(&batch(0)).await.is_err());
    }
}
