//! # Forwarder
//!
//! 批处理转发模块。
//!
//! 负责：
//! - 从 gateway 队列取出数据并组成批次
//! - 将原始 JSON 转换为 `SensorReading`
//! - 每个批次只调用一次 publisher（失败即丢弃，不重试）
//! - 通过 broadcast 通知每个批次的处理结果

pub mod error;
pub mod forwarder;
pub mod metrics;
pub mod publishers;
pub mod report;
pub mod transform;

pub use contracts::{Batch, MessagePublisher};
pub use error::{ForwarderError, Result, TransformError};
pub use forwarder::{BatchForwarder, ForwarderConfig, StopOutcome};
pub use crate::metrics::{ForwarderMetrics, MetricsSnapshot};
pub use publishers::{
    create_publisher, AnyPublisher, FilePublisher, FilePublisherConfig, LogPublisher,
    NetworkFormat, NetworkPublisher, NetworkPublisherConfig,
};
pub use report::{BatchOutcome, BatchReport};
pub use transform::Transform;
