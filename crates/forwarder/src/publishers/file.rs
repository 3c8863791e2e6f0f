//! FilePublisher - appends readings to a JSON lines file

use std::collections::HashMap;
use std::path::PathBuf;

use contracts::{Batch, ContractError, MessagePublisher};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Configuration for FilePublisher
#[derive(Debug, Clone)]
pub struct FilePublisherConfig {
    /// Output file, created if missing
    pub path: PathBuf,
}

impl FilePublisherConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let path = params
            .get("path")
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| "missing 'path' parameter".to_string())?;
        Ok(Self {
            path: PathBuf::from(path),
        })
    }
}

/// Publisher that appends one JSON object per reading
pub struct FilePublisher {
    name: String,
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FilePublisher {
    /// Open (or create) the output file in append mode
    #[instrument(name = "file_publisher_new", skip(name, config), fields(path = %config.path.display()))]
    pub async fn new(name: impl Into<String>, config: FilePublisherConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)
            .await?;

        Ok(Self {
            name: name.into(),
            path: config.path,
            file: Mutex::new(Some(file)),
        })
    }

    /// Create from params (for factory)
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = FilePublisherConfig::from_params(params)
            .map_err(|e| ContractError::publisher_connection(&name, e))?;
        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::publisher_connection(&name, e.to_string()))
    }

    fn encode(&self, batch: &Batch) -> Result<Vec<u8>, ContractError> {
        let mut out = Vec::with_capacity(batch.len() * 160);
        for reading in &batch.readings {
            serde_json::to_writer(&mut out, reading)
                .map_err(|e| ContractError::publish(&self.name, e.to_string()))?;
            out.push(b'\n');
        }
        Ok(out)
    }
}

impl MessagePublisher for FilePublisher {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_publisher_send",
        skip(self, batch),
        fields(publisher = %self.name, batch_id = batch.id)
    )]
    async fn send(&self, batch: &Batch) -> Result<(), ContractError> {
        let data = self.encode(batch)?;
        let mut guard = self.file.lock().await;
        let file = guard
            .as_mut()
            .ok_or_else(|| ContractError::publish(&self.name, "publisher closed"))?;
        file.write_all(&data)
            .await
            .map_err(|e| ContractError::publish(&self.name, e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| ContractError::publish(&self.name, e.to_string()))?;
        Ok(())
    }

    #[instrument(name = "file_publisher_close", skip(self))]
    async fn close(&self) -> Result<(), ContractError> {
        if let Some(file) = self.file.lock().await.take() {
            file.sync_all().await?;
        }
        debug!(publisher = %self.name, path = %self.path.display(), "FilePublisher closed");
        Ok(())
    }
}
