//! GatewayConfig - Config Loader 输出
//!
//! 描述完整的网关配置：队列、转发器、适配器列表、发布目标。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

use crate::{ContractError, Endpoint};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的网关配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GatewayConfig {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 网关身份
    #[validate(nested)]
    pub gateway: GatewaySettings,

    /// 队列容量
    #[serde(default)]
    #[validate(nested)]
    pub queue: QueueSettings,

    /// 批量转发设置
    #[serde(default)]
    #[validate(nested)]
    pub forwarder: ForwarderSettings,

    /// 适配器列表（按顺序加载）
    #[serde(default)]
    #[validate(nested)]
    pub adapters: Vec<AdapterConfig>,

    /// 发布目标
    #[validate(nested)]
    pub publisher: PublisherConfig,
}

/// 网关身份
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GatewaySettings {
    #[validate(length(min = 1, message = "gateway name cannot be empty"))]
    pub name: String,

    /// Appended to every reading's location when set
    #[serde(default)]
    pub location: Option<String>,
}

/// 队列容量设置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QueueSettings {
    /// Depth at which a warning is logged
    #[serde(default = "default_soft_capacity")]
    #[validate(range(min = 1))]
    pub soft_capacity: usize,

    /// Depth above which enqueue is rejected (None = unbounded)
    #[serde(default)]
    pub hard_capacity: Option<usize>,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            soft_capacity: default_soft_capacity(),
            hard_capacity: None,
        }
    }
}

fn default_soft_capacity() -> usize {
    10_000
}

/// 批量转发设置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ForwarderSettings {
    #[serde(default = "default_max_batch_size")]
    #[validate(range(min = 1))]
    pub max_batch_size: usize,

    #[serde(default = "default_flush_interval_ms")]
    #[validate(range(min = 1))]
    pub flush_interval_ms: u64,

    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    #[serde(default = "default_throughput_log_threshold")]
    #[validate(range(min = 1))]
    pub throughput_log_threshold: u64,
}

impl ForwarderSettings {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl Default for ForwarderSettings {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
            throughput_log_threshold: default_throughput_log_threshold(),
        }
    }
}

fn default_max_batch_size() -> usize {
    500
}

fn default_flush_interval_ms() -> u64 {
    50
}

fn default_stop_timeout_ms() -> u64 {
    5000
}

fn default_throughput_log_threshold() -> u64 {
    1000
}

/// 适配器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AdapterConfig {
    /// 唯一名称
    #[validate(length(min = 1, message = "adapter name cannot be empty"))]
    pub name: String,

    /// Factory table key (e.g. "serial", "socket", "mock")
    #[validate(length(min = 1, message = "adapter kind cannot be empty"))]
    pub kind: String,

    /// 每个 endpoint 实例化一个适配器；为空时以无 endpoint 方式实例化
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,

    /// 适配器特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl AdapterConfig {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            endpoints: Vec::new(),
            params: HashMap::new(),
        }
    }

    /// Parse an optional typed parameter
    ///
    /// # Errors
    /// Returns a validation error if the value is present but unparsable.
    pub fn param<T: FromStr>(&self, key: &str) -> Result<Option<T>, ContractError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
                ContractError::config_validation(
                    format!("adapters[{}].params.{}", self.name, key),
                    format!("cannot parse '{raw}'"),
                )
            }),
        }
    }

    /// Millisecond duration parameter with a default
    pub fn duration_ms(&self, key: &str, default_ms: u64) -> Result<Duration, ContractError> {
        Ok(Duration::from_millis(
            self.param::<u64>(key)?.unwrap_or(default_ms),
        ))
    }
}

/// 发布目标配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PublisherConfig {
    #[validate(length(min = 1, message = "publisher name cannot be empty"))]
    pub name: String,

    pub publisher_type: PublisherType,

    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// 发布目标类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublisherType {
    Log,
    File,
    Network,
}
