//! 适配器 trait

use std::sync::Arc;

use contracts::{AdapterState, EnqueueCallback, Endpoint};

use crate::error::Result;
use crate::metrics::IngestionMetrics;

/// 数据源适配器 trait
///
/// 每种外部数据源（串口、TCP、合成数据）实现此 trait，负责：
/// 1. 在独立任务中读取数据源
/// 2. 按记录边界分帧
/// 3. 将每条记录交给共享的 enqueue 回调
/// 4. 在资源丢失时自行恢复（重新扫描 / 重连）
pub trait Adapter: Send + Sync {
    /// 实例名称
    fn name(&self) -> &str;

    /// 工厂表中的类型标识
    fn kind(&self) -> &'static str;

    /// 当前生命周期状态
    fn state(&self) -> AdapterState;

    /// 在 `start` 之前配置 endpoint
    ///
    /// # Errors
    /// 需要 endpoint 的适配器收到 `None`，或不使用 endpoint 的适配器收到 `Some`。
    fn set_endpoint(&mut self, endpoint: Option<Endpoint>) -> Result<()>;

    /// 启动数据采集，立即返回；I/O 循环在后台任务中运行
    ///
    /// # Arguments
    /// * `enqueue` - 共享的入队回调
    /// * `metrics` - 共享的 ingestion 指标
    fn start(&self, enqueue: EnqueueCallback, metrics: Arc<IngestionMetrics>) -> Result<()>;

    /// 停止数据采集（幂等，未启动时也可调用）
    fn stop(&self);
}
