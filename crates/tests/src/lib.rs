//! # Integration Tests
//!
//! End-to-end scenarios across crates.
//!
//! Covers:
//! - Contract snapshots
//! - Sources driving listeners through the event bus
//! - Configuration-driven wiring

#[cfg(test)]
mod contract_tests {
    use contracts::{Sample, SampleKind};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_wire_tags_are_stable() {
        assert_eq!(SampleKind::Connection.tag(), 0);
        assert_eq!(Sample::error("x").kind(), SampleKind::Error);

        let json = serde_json::to_value(Sample::Vario {
            timestamp: 1.5,
            vario_mps: -0.5,
        })
        .unwrap();
        assert_eq!(json["kind"], "vario");
        assert_eq!(json["timestamp"], 1.5);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;

    use contracts::{
        BackpressurePolicy, BusConfig, ConnectionState, ContractError, ListenerResult,
        LocationFix, Sample, SampleEnvelope, SensorListener, SensorSource, SourceState,
    };
    use event_bus::{Diagnostic, EventBus, SubscriptionOptions};
    use ingestion::{MockDevice, MockDeviceConfig, PolledSource, ScriptEnd, ScriptedDevice};
    use tokio::time::sleep;

    const FIX_TIME_MS: i64 = 1_700_000_000_000;

    /// Records everything it is handed
    struct Recorder {
        name: String,
        seen: Vec<(String, u64, Sample)>,
    }

    impl Recorder {
        fn shared(name: &str) -> Arc<Mutex<Self>> {
            Arc::new(Mutex::new(Self {
                name: name.to_string(),
                seen: Vec::new(),
            }))
        }
    }

    impl SensorListener for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn on_envelope(&mut self, envelope: &SampleEnvelope) -> ListenerResult {
            self.seen.push((
                envelope.source_id().to_string(),
                envelope.sequence(),
                envelope.sample().clone(),
            ));
            Ok(())
        }
    }

    /// Fails every call, alternating between an error and a panic
    struct Faulty {
        calls: u64,
    }

    impl SensorListener for Faulty {
        fn name(&self) -> &str {
            "faulty"
        }

        fn on_envelope(&mut self, _envelope: &SampleEnvelope) -> ListenerResult {
            self.calls += 1;
            if self.calls % 2 == 0 {
                panic!("faulty listener call {}", self.calls);
            }
            Err(ContractError::listener_fault("faulty", "always fails"))
        }
    }

    fn location(timestamp: f64) -> Sample {
        Sample::Location {
            timestamp,
            fix: LocationFix::new(FIX_TIME_MS, 7, 11.0, 47.0),
        }
    }

    fn scripted(samples: Vec<Sample>, end: ScriptEnd) -> ScriptedDevice {
        ScriptedDevice::new(samples)
            .ending_with(end)
            .with_interval(Duration::from_millis(1))
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    /// Two listeners subscribed before start observe the same lifecycle:
    /// Connected, three fixes, then the terminal error.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_source_failure_reaches_every_listener() {
        let bus = EventBus::builder(BusConfig::default()).build().unwrap();
        let first = Recorder::shared("l1");
        let second = Recorder::shared("l2");
        bus.subscribe(&first);
        bus.subscribe(&second);

        let source = Arc::new(PolledSource::new(
            "S",
            scripted(
                vec![location(1.0), location(2.0), location(3.0)],
                ScriptEnd::Lost("device lost".into()),
            ),
        ));
        assert_eq!(source.state(), SourceState::Disconnected);

        bus.attach(source.clone()).unwrap();
        wait_for(|| source.state() == SourceState::Failed).await;
        wait_for(|| second.lock().unwrap().seen.len() == 5).await;
        wait_for(|| first.lock().unwrap().seen.len() == 5).await;

        let expected = vec![
            (
                "S".to_string(),
                1,
                Sample::Connection {
                    state: ConnectionState::Connected,
                },
            ),
            ("S".to_string(), 2, location(1.0)),
            ("S".to_string(), 3, location(2.0)),
            ("S".to_string(), 4, location(3.0)),
            ("S".to_string(), 5, Sample::error("device lost")),
        ];
        assert_eq!(first.lock().unwrap().seen, expected);
        assert_eq!(second.lock().unwrap().seen, expected);

        // Nothing follows the terminal envelope
        sleep(Duration::from_millis(30)).await;
        assert_eq!(first.lock().unwrap().seen.len(), 5);
        assert_eq!(source.metrics().snapshot().emitted, 5);

        bus.shutdown().await;
        assert_eq!(source.state(), SourceState::Failed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_faulty_listener_is_isolated() {
        let bus = EventBus::builder(BusConfig::default()).build().unwrap();
        let mut diagnostics = bus.diagnostics();

        let faulty = Arc::new(Mutex::new(Faulty { calls: 0 }));
        let healthy = Recorder::shared("healthy");
        bus.subscribe(&faulty);
        bus.subscribe(&healthy);

        let samples = (1..=10).map(|t| location(t as f64)).collect();
        let source = Arc::new(PolledSource::new(
            "gps",
            scripted(samples, ScriptEnd::Lost("device lost".into())),
        ));
        bus.attach(source.clone()).unwrap();

        wait_for(|| healthy.lock().unwrap().seen.len() == 12).await;
        // Faults are counted after the call returns
        wait_for(|| {
            bus.metrics()
                .iter()
                .any(|r| r.listener == "faulty" && r.metrics.faults == 12)
        })
        .await;
        // The panicking calls poison the mutex
        assert_eq!(faulty.lock().unwrap_or_else(PoisonError::into_inner).calls, 12);

        let sequences: Vec<u64> = healthy
            .lock()
            .unwrap()
            .seen
            .iter()
            .map(|(_, sequence, _)| *sequence)
            .collect();
        assert_eq!(sequences, (1..=12).collect::<Vec<_>>());

        let mut faults = 0;
        let mut panics = 0;
        while let Ok(diagnostic) = diagnostics.try_recv() {
            if let Diagnostic::ListenerFault {
                listener, panicked, ..
            } = diagnostic
            {
                assert_eq!(listener, "faulty");
                faults += 1;
                if panicked {
                    panics += 1;
                }
            }
        }
        assert_eq!(faults, 12);
        assert_eq!(panics, 6);

        let reports = bus.metrics();
        let faulty_report = reports.iter().find(|r| r.listener == "faulty").unwrap();
        assert_eq!(faulty_report.metrics.faults, 12);
        assert_eq!(faulty_report.metrics.delivered, 0);

        bus.shutdown().await;
    }

    /// Counts calls and flags any that start after unsubscribe returned
    struct Sentinel {
        calls: Arc<AtomicU64>,
        unsubscribed: Arc<AtomicBool>,
        late_calls: Arc<AtomicU64>,
    }

    impl SensorListener for Sentinel {
        fn name(&self) -> &str {
            "sentinel"
        }

        fn on_envelope(&mut self, _envelope: &SampleEnvelope) -> ListenerResult {
            if self.unsubscribed.load(Ordering::SeqCst) {
                self.late_calls.fetch_add(1, Ordering::SeqCst);
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(2));
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_no_calls_after_unsubscribe() {
        let bus = EventBus::builder(BusConfig::default()).build().unwrap();
        let calls = Arc::new(AtomicU64::new(0));
        let unsubscribed = Arc::new(AtomicBool::new(false));
        let late_calls = Arc::new(AtomicU64::new(0));
        let sentinel = Arc::new(Mutex::new(Sentinel {
            calls: Arc::clone(&calls),
            unsubscribed: Arc::clone(&unsubscribed),
            late_calls: Arc::clone(&late_calls),
        }));
        let subscription = bus.subscribe(&sentinel);

        let device = MockDevice::new(
            contracts::MockKind::Vario,
            MockDeviceConfig {
                frequency_hz: 1000.0,
                seed: Some(3),
                ..Default::default()
            },
        );
        let source = Arc::new(PolledSource::new("vario", device));
        bus.attach(source.clone()).unwrap();

        wait_for(|| calls.load(Ordering::SeqCst) >= 5).await;

        // Blocks until any in-flight call has returned
        let removed = tokio::task::block_in_place(|| bus.unsubscribe(&subscription));
        assert!(removed);
        unsubscribed.store(true, Ordering::SeqCst);
        let at_unsubscribe = calls.load(Ordering::SeqCst);

        sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), at_unsubscribe);
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
        assert!(!bus.unsubscribe(&subscription));

        bus.shutdown().await;
        assert_eq!(source.state(), SourceState::Disconnected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_per_source_order_is_preserved() {
        let bus = EventBus::builder(BusConfig {
            queue_depth: 4,
            backpressure: BackpressurePolicy::Block,
            ..Default::default()
        })
        .build()
        .unwrap();
        let recorder = Recorder::shared("ordered");
        bus.subscribe(&recorder);

        let mut sources = Vec::new();
        for id in ["left", "right", "centre"] {
            let samples = (1..=50)
                .map(|t| Sample::Vario {
                    timestamp: t as f64,
                    vario_mps: 0.5,
                })
                .collect();
            let source = Arc::new(PolledSource::new(
                id,
                scripted(samples, ScriptEnd::Lost("end of script".into())),
            ));
            bus.attach(source.clone()).unwrap();
            sources.push(source);
        }

        // 3 sources x (Connected + 50 + Error)
        wait_for(|| recorder.lock().unwrap().seen.len() == 156).await;

        let mut per_source: HashMap<String, Vec<u64>> = HashMap::new();
        for (source_id, sequence, _) in &recorder.lock().unwrap().seen {
            per_source.entry(source_id.clone()).or_default().push(*sequence);
        }
        assert_eq!(per_source.len(), 3);
        for sequences in per_source.values() {
            assert_eq!(sequences, &(1..=52).collect::<Vec<_>>());
        }

        bus.shutdown().await;
        for source in &sources {
            assert_eq!(source.state(), SourceState::Failed);
        }
    }

    /// Slow listener under Block back-pressure: the producer waits, nothing is
    /// lost, and the fast listener still sees the full stream.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_block_policy_loses_nothing() {
        struct Slow {
            seen: Vec<u64>,
        }
        impl SensorListener for Slow {
            fn name(&self) -> &str {
                "slow"
            }
            fn on_envelope(&mut self, envelope: &SampleEnvelope) -> ListenerResult {
                std::thread::sleep(Duration::from_millis(2));
                self.seen.push(envelope.sequence());
                Ok(())
            }
        }

        let bus = EventBus::builder(BusConfig::default()).build().unwrap();
        let slow = Arc::new(Mutex::new(Slow { seen: Vec::new() }));
        let fast = Recorder::shared("fast");
        bus.subscribe_with(
            &slow,
            SubscriptionOptions {
                queue_depth: Some(1),
                backpressure: Some(BackpressurePolicy::Block),
            },
        );
        bus.subscribe(&fast);

        let samples = (1..=20)
            .map(|bpm| Sample::HeartRate {
                timestamp: bpm as f64,
                bpm: 60 + bpm,
            })
            .collect();
        let source = Arc::new(PolledSource::new(
            "hrm",
            scripted(samples, ScriptEnd::Lost("strap removed".into())),
        ));
        bus.attach(source.clone()).unwrap();

        wait_for(|| slow.lock().unwrap().seen.len() == 22).await;
        assert_eq!(slow.lock().unwrap().seen, (1..=22).collect::<Vec<_>>());
        assert_eq!(fast.lock().unwrap().seen.len(), 22);

        let reports = bus.metrics();
        assert!(reports.iter().all(|r| r.metrics.dropped == 0));
        bus.shutdown().await;
    }

    /// A listener stuck inside a call, on a runtime with a single worker,
    /// does not hold back delivery to the listener next to it.
    #[test]
    fn test_e2e_hung_listener_does_not_stall_others() {
        struct Hung {
            release: Arc<AtomicBool>,
            calls: Arc<AtomicU64>,
        }
        impl SensorListener for Hung {
            fn name(&self) -> &str {
                "hung"
            }
            fn on_envelope(&mut self, _envelope: &SampleEnvelope) -> ListenerResult {
                self.calls.fetch_add(1, Ordering::SeqCst);
                while !self.release.load(Ordering::SeqCst) {
                    std::hint::spin_loop();
                }
                Ok(())
            }
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let bus = EventBus::builder(BusConfig::default())
            .runtime(runtime.handle().clone())
            .build()
            .unwrap();

        let release = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicU64::new(0));
        let hung = Arc::new(Mutex::new(Hung {
            release: Arc::clone(&release),
            calls: Arc::clone(&calls),
        }));
        let healthy = Recorder::shared("healthy");
        bus.subscribe(&hung);
        bus.subscribe(&healthy);

        let samples = (1..=5)
            .map(|step| Sample::Vario {
                timestamp: step as f64,
                vario_mps: 0.5 * step as f64,
            })
            .collect();
        let source = Arc::new(PolledSource::new(
            "vario",
            scripted(samples, ScriptEnd::Lost("landed".into())),
        ));
        bus.attach(source.clone()).unwrap();

        runtime.block_on(async {
            wait_for(|| healthy.lock().unwrap().seen.len() == 7).await;
            wait_for(|| calls.load(Ordering::SeqCst) == 1).await;
        });
        let sequences: Vec<u64> = healthy
            .lock()
            .unwrap()
            .seen
            .iter()
            .map(|(_, sequence, _)| *sequence)
            .collect();
        assert_eq!(sequences, (1..=7).collect::<Vec<_>>());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        release.store(true, Ordering::SeqCst);
        runtime.block_on(bus.shutdown());
        assert_eq!(calls.load(Ordering::SeqCst), 7);
        assert_eq!(source.state(), SourceState::Failed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_location_without_altitude() {
        struct Fixes {
            altitudes: Vec<Option<f64>>,
        }
        impl SensorListener for Fixes {
            fn name(&self) -> &str {
                "fixes"
            }
            fn on_location(
                &mut self,
                _source: &contracts::SourceId,
                _timestamp: f64,
                fix: &LocationFix,
            ) -> ListenerResult {
                self.altitudes.push(fix.altitude);
                Ok(())
            }
        }

        let bus = EventBus::builder(BusConfig::default()).build().unwrap();
        let fixes = Arc::new(Mutex::new(Fixes {
            altitudes: Vec::new(),
        }));
        bus.subscribe(&fixes);

        let with_altitude = Sample::Location {
            timestamp: 2.0,
            fix: LocationFix::new(FIX_TIME_MS, 9, 11.0, 47.0).with_altitude(812.0),
        };
        let source = Arc::new(PolledSource::new(
            "gps",
            scripted(vec![location(1.0), with_altitude], ScriptEnd::Idle),
        ));
        bus.attach(source.clone()).unwrap();

        wait_for(|| fixes.lock().unwrap().altitudes.len() == 2).await;
        assert_eq!(fixes.lock().unwrap().altitudes, vec![None, Some(812.0)]);

        bus.shutdown().await;
        assert_eq!(source.state(), SourceState::Disconnected);
    }
}

#[cfg(test)]
mod config_e2e_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{SensorSource, SourceState};
    use event_bus::{build_listener, EventBus, SubscriptionOptions};
    use observability::BusStatsAggregator;
    use tokio::time::sleep;

    /// Blueprint -> sources and listeners -> JSON-lines recording
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_blueprint_to_recording() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("baro.jsonl");
        std::fs::write(
            &script,
            concat!(
                "# recorded on the ground\n",
                r#"{"kind":"pressure_altitude","timestamp":0.5,"altitude_m":412.0}"#,
                "\n",
                r#"{"kind":"vario","timestamp":0.6,"vario_mps":0.2}"#,
                "\n",
            ),
        )
        .unwrap();
        let recording = dir.path().join("out").join("bus.jsonl");

        let config = format!(
            r#"
[bus]
queue_depth = 8

[[sources]]
id = "baro"
source_type = "scripted"
frequency_hz = 500.0
[sources.params]
path = "{script}"
on_end = "lost"
lost_message = "replay finished"

[[listeners]]
name = "recorder"
listener_type = "file"
[listeners.params]
path = "{recording}"
"#,
            script = script.display().to_string().replace('\\', "/"),
            recording = recording.display().to_string().replace('\\', "/"),
        );
        let blueprint = ConfigLoader::load_from_str(&config, ConfigFormat::Toml).unwrap();

        let bus = EventBus::builder(blueprint.bus.clone()).build().unwrap();
        let listener = build_listener(&blueprint.listeners[0]).unwrap();
        bus.subscribe_with(&listener, SubscriptionOptions::from(&blueprint.listeners[0]));

        let source: Arc<dyn SensorSource> = ingestion::build_source(&blueprint.sources[0]).unwrap();
        bus.attach(Arc::clone(&source)).unwrap();

        for _ in 0..400 {
            if source.state() == SourceState::Failed {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(source.state(), SourceState::Failed);
        bus.shutdown().await;
        drop(listener);

        let content = std::fs::read_to_string(&recording).unwrap();
        let records: Vec<serde_json::Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 4);

        let kinds: Vec<&str> = records
            .iter()
            .map(|record| record["sample"]["kind"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, ["connection", "pressure_altitude", "vario", "error"]);
        assert_eq!(records[3]["sample"]["message"], "replay finished");
        assert!(records.iter().all(|record| record["source_id"] == "baro"));

        let mut stats = BusStatsAggregator::new();
        for record in &records {
            stats.record(
                record["source_id"].as_str().unwrap(),
                record["sample"]["kind"].as_str().unwrap(),
                record["sample"]["timestamp"].as_f64(),
            );
        }
        let summary = stats.summary();
        assert_eq!(summary.total_errors, 1);
        assert_eq!(summary.sources[0].interval_ms.count, 1);
    }

    #[test]
    fn test_demo_files_are_valid() {
        let demos = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos");
        let blueprint = ConfigLoader::load_from_path(&demos.join("sensor-bus.toml")).unwrap();
        assert_eq!(blueprint.sources.len(), 4);
        assert_eq!(blueprint.listeners.len(), 2);

        let script = std::fs::read_to_string(demos.join("replay.jsonl")).unwrap();
        let samples = ingestion::parse_script(&script).unwrap();
        assert_eq!(samples.len(), 3);

        let log = std::fs::read_to_string(demos.join("vario.nmea")).unwrap();
        let parsed: Vec<_> = log
            .lines()
            .filter_map(|line| ingestion::parse_sentence(line, 0.0))
            .collect();
        // The SOARIM status line carries no reading
        assert_eq!(parsed.len(), 6);
    }

    #[test]
    fn test_listener_shared_across_subscriptions() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let bus = EventBus::builder(Default::default())
            .runtime(runtime.handle().clone())
            .build()
            .unwrap();

        let listener = Arc::new(Mutex::new(event_bus::LogListener::new("console")));
        let a = bus.subscribe(&listener);
        let b = bus.subscribe(&listener);
        assert_ne!(a, b);
        assert_eq!(bus.subscription_count(), 2);
        assert!(bus.unsubscribe(&a));
        assert_eq!(bus.subscription_count(), 1);

        runtime.block_on(bus.shutdown());
    }
}
