//! Ingestion 错误类型

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 适配器需要 endpoint
    #[error("adapter {adapter} requires an endpoint")]
    EndpointRequired {
        /// 适配器名称
        adapter: String,
    },

    /// 适配器不接受该 endpoint
    #[error("adapter {adapter} does not accept endpoint {endpoint}")]
    EndpointNotSupported {
        /// 适配器名称
        adapter: String,
        /// 被拒绝的 endpoint
        endpoint: String,
    },

    /// 工厂表中没有该类型
    #[error("no adapter factory registered for kind '{kind}'")]
    UnknownKind {
        /// 适配器类型
        kind: String,
    },

    /// 适配器参数无效
    #[error("invalid configuration for adapter {adapter}: {message}")]
    InvalidConfig {
        /// 适配器名称
        adapter: String,
        /// 错误消息
        message: String,
    },

    /// 构造函数 panic
    #[error("constructor for adapter {adapter} panicked")]
    ConstructionPanicked {
        /// 适配器名称
        adapter: String,
    },

    /// 适配器已在运行
    #[error("adapter {adapter} is already running")]
    AlreadyRunning {
        /// 适配器名称
        adapter: String,
    },

    /// 当前线程没有 Tokio runtime
    #[error("adapter {adapter} must be started inside a Tokio runtime")]
    NoRuntime {
        /// 适配器名称
        adapter: String,
    },
}

impl IngestionError {
    pub fn invalid_config(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            adapter: adapter.into(),
            message: message.into(),
        }
    }
}

/// 单条记录的分帧错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    /// 记录为空
    #[error("empty record")]
    Empty,

    /// 非 UTF-8 内容
    #[error("record is not valid UTF-8")]
    InvalidUtf8,

    /// 超过最大长度
    #[error("record exceeds {max} bytes (buffered {len})")]
    Oversize { len: usize, max: usize },

    /// 记录在结束符之前被新的起始符截断
    #[error("record truncated by a new start delimiter")]
    Truncated,
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
