//! 网关指标收集模块
//!
//! Prometheus 指标记录函数，以及用于运行摘要的内存聚合器。

use contracts::AdapterState;
use metrics::{counter, gauge, histogram};

/// 记录一次成功入队
pub fn record_enqueued(depth: usize) {
    counter!("gateway_items_enqueued_total").increment(1);
    gauge!("gateway_queue_depth").set(depth as f64);
}

/// 记录准入控制拒绝
pub fn record_enqueue_rejected() {
    counter!("gateway_items_rejected_total", "stage" => "admission").increment(1);
}

/// 记录转换阶段丢弃的条目
pub fn record_items_rejected(count: usize) {
    if count > 0 {
        counter!("gateway_items_rejected_total", "stage" => "transform").increment(count as u64);
    }
}

/// 记录批次发布结果
pub fn record_batch_published(publisher: &str, size: usize, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "gateway_batches_published_total",
        "publisher" => publisher.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_batch_size").record(size as f64);

    if !success {
        counter!("gateway_readings_dropped_total").increment(size as u64);
    }
}

/// 记录发布延迟
pub fn record_publish_latency_ms(publisher: &str, latency_ms: f64) {
    histogram!(
        "gateway_publish_latency_ms",
        "publisher" => publisher.to_string()
    )
    .record(latency_ms);
}

/// 记录适配器状态变化
pub fn record_adapter_state(adapter: &str, state: AdapterState) {
    gauge!(
        "gateway_adapter_state",
        "adapter" => adapter.to_string()
    )
    .set(state.as_u8() as f64);
}

/// 记录适配器收到的记录
pub fn record_record_received(adapter: &str) {
    counter!(
        "gateway_records_received_total",
        "adapter" => adapter.to_string()
    )
    .increment(1);
}

/// 记录格式错误的记录
pub fn record_record_malformed(adapter: &str) {
    counter!(
        "gateway_records_malformed_total",
        "adapter" => adapter.to_string()
    )
    .increment(1);
}

/// 转发指标聚合器
///
/// 在内存中聚合每个批次的结果，便于输出运行摘要。
#[derive(Debug, Clone, Default)]
pub struct ForwardingAggregator {
    pub batches_sent: u64,
    pub batches_partial: u64,
    pub batches_failed: u64,
    pub readings_forwarded: u64,
    pub readings_dropped: u64,
    pub items_rejected: u64,
    pub batch_size: RunningStats,
}

impl ForwardingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    ///
    /// `published` 为本批次实际交给发布者的读数数量。
    pub fn update(&mut self, published: usize, rejected: usize, success: bool) {
        self.items_rejected += rejected as u64;
        if published == 0 {
            return;
        }

        self.batch_size.push(published as f64);
        if success {
            self.readings_forwarded += published as u64;
            if rejected > 0 {
                self.batches_partial += 1;
            } else {
                self.batches_sent += 1;
            }
        } else {
            self.batches_failed += 1;
            self.readings_dropped += published as u64;
        }
    }

    pub fn summary(&self) -> ForwardingSummary {
        let batches = self.batches_sent + self.batches_partial + self.batches_failed;
        ForwardingSummary {
            batches,
            batches_failed: self.batches_failed,
            readings_forwarded: self.readings_forwarded,
            readings_dropped: self.readings_dropped,
            items_rejected: self.items_rejected,
            failure_rate: if batches > 0 {
                self.batches_failed as f64 / batches as f64 * 100.0
            } else {
                0.0
            },
            batch_size: StatsSummary::from(&self.batch_size),
        }
    }
}

/// 转发摘要
#[derive(Debug, Clone, Default)]
pub struct ForwardingSummary {
    pub batches: u64,
    pub batches_failed: u64,
    pub readings_forwarded: u64,
    pub readings_dropped: u64,
    pub items_rejected: u64,
    pub failure_rate: f64,
    pub batch_size: StatsSummary,
}

impl std::fmt::Display for ForwardingSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Forwarding Summary ===")?;
        writeln!(
            f,
            "Batches: {} ({} failed, {:.2}%)",
            self.batches, self.batches_failed, self.failure_rate
        )?;
        writeln!(f, "Readings forwarded: {}", self.readings_forwarded)?;
        writeln!(f, "Readings dropped: {}", self.readings_dropped)?;
        writeln!(f, "Items rejected: {}", self.items_rejected)?;
        writeln!(f, "Batch size: {}", self.batch_size)
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.2}, std={:.2} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_classifies_batches() {
        let mut aggregator = ForwardingAggregator::new();
        aggregator.update(10, 0, true);
        aggregator.update(4, 1, true);
        aggregator.update(5, 0, false);
        aggregator.update(0, 3, false);

        assert_eq!(aggregator.batches_sent, 1);
        assert_eq!(aggregator.batches_partial, 1);
        assert_eq!(aggregator.batches_failed, 1);
        assert_eq!(aggregator.readings_forwarded, 14);
        assert_eq!(aggregator.readings_dropped, 5);
        assert_eq!(aggregator.items_rejected, 4);

        let summary = aggregator.summary();
        assert_eq!(summary.batches, 3);
        assert_eq!(summary.batch_size.count, 3);
    }

    #[test]
    fn test_summary_display() {
        let summary = ForwardingAggregator::new().summary();
        let text = summary.to_string();
        assert!(text.contains("Forwarding Summary"));
        assert!(text.contains("Batch size: N/A"));
    }
}
