//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟 e2e 测试（适配器 → 队列 → 转发器 → 发布者）
//! - 转发语义回归（批次上限、并发互斥、至多一次）

#[cfg(test)]
mod support {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use contracts::{Batch, ContractError, MessagePublisher, QueuedItem};
    use forwarder::{BatchForwarder, ForwarderConfig};
    use gateway::{BoundedQueue, GatewayService, QueueNotifier, QueueObserver};

    /// Publisher that keeps every batch it was handed
    #[derive(Default)]
    pub struct RecordingPublisher {
        pub batches: Mutex<Vec<Batch>>,
        pub calls: AtomicUsize,
        pub closed: AtomicUsize,
        pub fail: bool,
    }

    impl RecordingPublisher {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn readings(&self) -> usize {
            self.batches.lock().unwrap().iter().map(Batch::len).sum()
        }

        pub fn batch_sizes(&self) -> Vec<usize> {
            self.batches.lock().unwrap().iter().map(Batch::len).collect()
        }
    }

    impl MessagePublisher for RecordingPublisher {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, batch: &Batch) -> Result<(), ContractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ContractError::publish("recording", "broker unavailable"));
            }
            self.batches.lock().unwrap().push(batch.clone());
            Ok(())
        }

        async fn close(&self) -> Result<(), ContractError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    pub struct Harness {
        pub queue: Arc<BoundedQueue<QueuedItem>>,
        pub service: Arc<GatewayService>,
        pub forwarder: BatchForwarder<RecordingPublisher>,
        pub publisher: Arc<RecordingPublisher>,
    }

    /// Service and forwarder wired the way the CLI host wires them
    pub fn harness(
        publisher: RecordingPublisher,
        hard_capacity: Option<usize>,
        max_batch_size: usize,
    ) -> Harness {
        let queue = Arc::new(BoundedQueue::with_limits(1_000, hard_capacity));
        let publisher = Arc::new(publisher);
        let forwarder = BatchForwarder::new(
            Arc::clone(&queue),
            Arc::clone(&publisher),
            ForwarderConfig {
                max_batch_size,
                flush_interval: Duration::from_millis(20),
                gateway_location: Some("edge".to_string()),
            },
        );

        let wake = forwarder.clone();
        let observer: QueueObserver = Arc::new(move |_| wake.process());
        let service = Arc::new(
            GatewayService::new(Arc::clone(&queue))
                .with_notifier(QueueNotifier::spawn(vec![observer], 64)),
        );

        Harness {
            queue,
            service,
            forwarder,
            publisher,
        }
    }

    pub fn reading(guid: usize, value: f64) -> String {
        format!(
            r#"{{"Value":{value},"UnitOfMeasure":"m","DisplayName":"probe","Location":"bay","GUID":"{guid}"}}"#
        )
    }

    pub async fn wait_until(mut cond: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }
}

#[cfg(test)]
mod contract_tests {
    use contracts::{ConfigVersion, Endpoint, QueuedItem, SensorReading};

    #[test]
    fn test_config_version_default() {
        assert_eq!(ConfigVersion::default(), ConfigVersion::V1);
    }

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::tcp("10.1.1.1", 5000).to_string(), "10.1.1.1:5000");
        assert_eq!(Endpoint::device("/dev/ttyUSB0").to_string(), "/dev/ttyUSB0");
    }

    #[test]
    fn test_reading_accepts_numeric_guid() {
        let item = QueuedItem::new(r#"{"Value":2.5,"GUID":42}"#);
        let reading: SensorReading = forwarder::Transform::new(None).apply(&item).unwrap();
        assert_eq!(reading.guid, "42");
        assert_eq!(reading.location, "");
        assert!(reading.time_created.is_some());
    }
}

#[cfg(test)]
mod forwarding_tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use forwarder::{BatchOutcome, StopOutcome};

    use crate::support::{harness, reading, wait_until, RecordingPublisher};

    /// 单个周期永远不超过 max_batch_size
    #[tokio::test]
    async fn test_cycle_respects_batch_ceiling() {
        let h = harness(RecordingPublisher::default(), None, 500);
        for i in 0..1_200 {
            h.queue
                .push(contracts::QueuedItem::new(reading(i, 1.0)))
                .unwrap();
        }

        let report = h.forwarder.process_once().await;
        assert_eq!(report.drained, 500);
        assert_eq!(report.outcome, BatchOutcome::Sent);
        assert_eq!(h.queue.len(), 700);
    }

    /// 并发周期领取互不相交的子集
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_cycles_claim_disjoint_items() {
        let h = harness(RecordingPublisher::default(), None, 13);
        for i in 0..2_000 {
            h.queue
                .push(contracts::QueuedItem::new(reading(i, i as f64)))
                .unwrap();
        }

        let mut tasks = Vec::new();
        for _ in 0..6 {
            let forwarder = h.forwarder.clone();
            tasks.push(tokio::spawn(async move {
                while forwarder.process_once().await.drained > 0 {}
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let mut guids: Vec<String> = h
            .publisher
            .batches
            .lock()
            .unwrap()
            .iter()
            .flat_map(|b| b.readings.iter().map(|r| r.guid.clone()))
            .collect();
        assert_eq!(guids.len(), 2_000);
        guids.sort();
        guids.dedup();
        assert_eq!(guids.len(), 2_000);
        assert!(h.publisher.batch_sizes().iter().all(|&n| n <= 13));
    }

    /// 发布失败的批次不会重新入队
    #[tokio::test]
    async fn test_failed_batch_is_dropped_not_requeued() {
        let h = harness(RecordingPublisher::failing(), None, 100);
        for i in 0..10 {
            h.service.enqueue(reading(i, 1.0)).unwrap();
        }

        let report = h.forwarder.process_once().await;
        assert!(matches!(report.outcome, BatchOutcome::Failed { .. }));
        assert!(h.queue.is_empty());

        let again = h.forwarder.process_once().await;
        assert_eq!(again.drained, 0);
        assert_eq!(h.publisher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.forwarder.metrics().snapshot().readings_dropped, 10);
    }

    /// 无效记录被逐条拒绝，其余照常发布
    #[tokio::test]
    async fn test_invalid_records_rejected_individually() {
        let h = harness(RecordingPublisher::default(), None, 100);
        h.service.enqueue(reading(1, 1.0)).unwrap();
        h.service.enqueue("not json").unwrap();
        h.service.enqueue(reading(2, 2.0)).unwrap();

        let report = h.forwarder.process_once().await;
        assert_eq!(report.published, 2);
        assert_eq!(report.outcome, BatchOutcome::PartiallySent { rejected: 1 });

        let batches = h.publisher.batches.lock().unwrap();
        assert_eq!(batches[0].readings[0].location, "bay\nedge");
        assert!(batches[0].readings[0].time_created.is_some());
    }

    /// 报告广播 → 转发摘要
    #[tokio::test]
    async fn test_reports_feed_forwarding_summary() {
        let h = harness(RecordingPublisher::default(), None, 4);
        let mut reports = h.forwarder.subscribe();
        for i in 0..6 {
            h.service.enqueue(reading(i, 1.0)).unwrap();
        }
        h.service.enqueue("{}").unwrap();

        h.forwarder.process_once().await;
        h.forwarder.process_once().await;
        assert_eq!(h.forwarder.process_once().await.drained, 0);

        let mut aggregator = observability::ForwardingAggregator::new();
        while let Ok(report) = reports.try_recv() {
            aggregator.update(report.published, report.rejected, report.outcome.is_success());
        }
        let summary = aggregator.summary();
        assert_eq!(summary.batches, 2);
        assert_eq!(summary.readings_forwarded, 6);
        assert_eq!(summary.items_rejected, 1);
        assert_eq!(summary.batches_failed, 0);
    }

    #[tokio::test]
    async fn test_hard_capacity_rejects_through_callback() {
        let h = harness(RecordingPublisher::default(), Some(2), 100);
        let enqueue = h.service.enqueue_callback();

        assert_eq!(enqueue(reading(1, 1.0).into()).unwrap(), 1);
        assert_eq!(enqueue(reading(2, 1.0).into()).unwrap(), 2);
        let err = enqueue(reading(3, 1.0).into()).unwrap_err();
        assert!(err.is_queue_full());
        assert_eq!(h.service.stats().rejected, 1);
    }

    /// 入队通知唤醒转发循环，停止时冲刷剩余数据
    #[tokio::test]
    async fn test_notifier_drives_forwarder_and_stop_flushes() {
        let h = harness(RecordingPublisher::default(), None, 8);
        h.forwarder.start().unwrap();

        for i in 0..50 {
            h.service.enqueue(reading(i, 1.0)).unwrap();
        }
        let publisher = Arc::clone(&h.publisher);
        wait_until(|| publisher.readings() == 50).await;
        assert!(h.publisher.batch_sizes().iter().all(|&n| n <= 8));

        for i in 50..60 {
            h.service.enqueue(reading(i, 1.0)).unwrap();
        }
        let outcome = h.forwarder.stop(Duration::from_secs(2)).await;
        assert_eq!(outcome, StopOutcome::Graceful);
        assert_eq!(h.publisher.readings(), 60);
        assert!(!h.forwarder.is_running());
        h.service.shutdown();
    }
}

#[cfg(test)]
mod gateway_tests {
    use gateway::ThroughputCounter;

    /// 跨越阈值时恰好产生一次吞吐报告
    #[test]
    fn test_throughput_single_report_per_window() {
        let counter = ThroughputCounter::new(1_000);
        let reports = (0..1_000).filter_map(|_| counter.record()).count();
        assert_eq!(reports, 1);
        assert_eq!(counter.total(), 1_000);
    }

    #[test]
    fn test_throughput_concurrent_single_report() {
        let counter = std::sync::Arc::new(ThroughputCounter::new(4_000));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = std::sync::Arc::clone(&counter);
                std::thread::spawn(move || (0..1_000).filter_map(|_| counter.record()).count())
            })
            .collect();
        let reports: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(reports, 1);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{AdapterConfig, AdapterState, Endpoint};
    use forwarder::StopOutcome;
    use ingestion::{
        AdapterRegistry, DevPortScanner, IngestionMetrics, SerialAdapter, SerialConfig,
    };
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    use crate::support::{harness, reading, wait_until, RecordingPublisher};

    /// End-to-end: MockAdapter -> AdapterRegistry -> GatewayService -> BatchForwarder
    ///
    /// 验证完整的数据流与关闭顺序：
    /// 1. 适配器先停止
    /// 2. 转发器冲刷并停止
    /// 3. 发布者最后关闭
    #[tokio::test]
    async fn test_e2e_mock_pipeline() {
        let h = harness(RecordingPublisher::default(), None, 16);

        let mut cfg = AdapterConfig::new("sim", "mock");
        cfg.params.insert("interval_ms".into(), "10".into());
        cfg.params.insert("devices".into(), "3".into());
        cfg.params.insert("seed".into(), "11".into());

        let mut registry = AdapterRegistry::with_builtin();
        let report = registry.load(&[cfg]);
        assert!(report.is_clean());

        h.forwarder.start().unwrap();
        assert_eq!(registry.start_all(h.service.enqueue_callback(), None), 1);

        let publisher = Arc::clone(&h.publisher);
        wait_until(|| publisher.readings() >= 30).await;

        assert!(registry.stop_all().is_empty());
        assert!(registry
            .states()
            .iter()
            .all(|(_, state)| *state == AdapterState::Stopped));

        let outcome = h.forwarder.stop(Duration::from_secs(2)).await;
        assert_eq!(outcome, StopOutcome::Graceful);
        contracts::MessagePublisher::close(&*h.publisher)
            .await
            .unwrap();
        h.service.shutdown();

        let stats = h.service.stats();
        assert_eq!(h.publisher.readings() as u64 + stats.depth as u64, stats.enqueued);
        assert_eq!(h.publisher.closed.load(std::sync::atomic::Ordering::SeqCst), 1);

        let batches = h.publisher.batches.lock().unwrap();
        let first = &batches[0].readings[0];
        assert!(first.location.ends_with("\nedge"));
        assert!(first.display_name.starts_with("Sensor"));
    }

    /// 串口：扫描目录中的设备节点，逐行读取并转发
    #[tokio::test]
    async fn test_e2e_serial_ports_from_scanned_directory() {
        let dir = tempfile::tempdir().unwrap();
        for (port, base) in [("ttyUSB0", 0), ("ttyACM0", 100)] {
            let mut file = std::fs::File::create(dir.path().join(port)).unwrap();
            for i in 0..5 {
                writeln!(file, "{}", reading(base + i, i as f64)).unwrap();
            }
        }
        // not a serial prefix
        std::fs::write(dir.path().join("null"), reading(999, 0.0)).unwrap();

        let scanner = Arc::new(DevPortScanner::new(
            dir.path(),
            vec!["ttyUSB".into(), "ttyACM".into()],
        ));
        let config = SerialConfig {
            scan_interval: Duration::from_millis(20),
            reopen_delay: Duration::from_millis(20),
            ..Default::default()
        };
        let adapter = SerialAdapter::with_scanner("serial", config, scanner);

        let h = harness(RecordingPublisher::default(), None, 4);
        h.forwarder.start().unwrap();

        let metrics = Arc::new(IngestionMetrics::new());
        ingestion::Adapter::start(&adapter, h.service.enqueue_callback(), Arc::clone(&metrics))
            .unwrap();

        let publisher = Arc::clone(&h.publisher);
        wait_until(|| publisher.readings() == 10).await;
        assert_eq!(adapter.active_ports().len(), 2);
        assert_eq!(metrics.snapshot().records_received, 10);

        // devices closed their streams: nothing is re-read while the nodes stay put
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(metrics.snapshot().records_received, 10);
        assert_eq!(ingestion::Adapter::state(&adapter), AdapterState::Failed);

        ingestion::Adapter::stop(&adapter);
        h.forwarder.stop(Duration::from_secs(2)).await;
        assert_eq!(h.publisher.readings(), 10);
    }

    /// 套接字客户端：跨写入拆分的 <...> 帧
    #[tokio::test]
    async fn test_e2e_socket_client_framed_records() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let first = format!("<{}><{}", reading(1, 1.0), reading(2, 2.0));
            stream.write_all(first.as_bytes()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            stream.write_all(b">").await.unwrap();
            stream.flush().await.unwrap();
            // hold the connection open until the adapter is stopped
            tokio::time::sleep(Duration::from_secs(2)).await;
        });

        let mut cfg = AdapterConfig::new("feed", "socket");
        cfg.endpoints.push(Endpoint::tcp("127.0.0.1", port));
        let mut registry = AdapterRegistry::with_builtin();
        assert!(registry.load(&[cfg]).is_clean());

        let h = harness(RecordingPublisher::default(), None, 10);
        h.forwarder.start().unwrap();
        registry.start_all(h.service.enqueue_callback(), None);

        let publisher = Arc::clone(&h.publisher);
        wait_until(|| publisher.readings() == 2).await;

        registry.stop_all();
        h.forwarder.stop(Duration::from_secs(2)).await;
        server.abort();

        let mut guids: Vec<String> = h
            .publisher
            .batches
            .lock()
            .unwrap()
            .iter()
            .flat_map(|b| b.readings.iter().map(|r| r.guid.clone()))
            .collect();
        guids.sort();
        assert_eq!(guids, vec!["1", "2"]);
    }

    #[test]
    fn test_socket_without_endpoint_is_not_loaded() {
        let mut registry = AdapterRegistry::with_builtin();
        let report = registry.load(&[
            AdapterConfig::new("feed", "socket"),
            AdapterConfig::new("sim", "mock"),
        ]);
        assert_eq!(report.loaded, vec!["sim".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].adapter, "feed");
        assert_eq!(registry.len(), 1);
    }

    /// 配置文件 → 注册表
    #[test]
    fn test_config_file_loads_into_registry() {
        let config = config_loader::ConfigLoader::load_from_str(
            r#"
[gateway]
name = "edge"

[[adapters]]
name = "listener"
kind = "socket"
endpoints = [{ host = "127.0.0.1", port = 5001 }, { host = "127.0.0.1", port = 5002 }]
[adapters.params]
mode = "server"

[[adapters]]
name = "sim"
kind = "mock"

[publisher]
name = "log"
publisher_type = "log"
"#,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let mut registry = AdapterRegistry::with_builtin();
        let report = registry.load(&config.adapters);
        assert!(report.is_clean());
        assert_eq!(
            report.loaded,
            vec![
                "listener@127.0.0.1:5001".to_string(),
                "listener@127.0.0.1:5002".to_string(),
                "sim".to_string(),
            ]
        );
    }
}
