//! Write-then-read tests for logical files.
//!
//! All tests run against `SimulatedLog`, using its deterministic fault
//! injection for the failure paths.
//!
//! # Test Categories
//!
//! 1. **Round Trip**: lines written under a name read back exactly
//! 2. **Shared Partitions**: interleaved files never leak into each other
//! 3. **Close Semantics**: ack timeouts, fail-slow delivery errors, backpressure
//! 4. **Retention**: expired files are reported as not found
//! 5. **Multi-Seed Stress**: random delivery failures never yield a bad locator

use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::TryStreamExt;
use kfile::{
    FileError, Locator, Partition, ReadFile, ReadState, TopicSpec, WriteFile, WriteState,
    WriterConfig,
};
use kfile_transport::{LogFaultConfig, LogTransport, SimulatedLog, SimulatedLogConfig};

const TOPIC: &str = "kfile.default";

// ============================================================================
// Helper Functions
// ============================================================================

fn config(partitions: i32) -> WriterConfig {
    WriterConfig::new()
        .with_topic(TopicSpec::new().with_num_partitions(partitions))
        .with_ack_poll_interval(Duration::from_millis(5))
}

fn lines_for(name: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("Line {i} of file {name}\n")).collect()
}

async fn write_file(log: &SimulatedLog, name: &str, lines: &[String]) -> Locator {
    let mut file = WriteFile::open(log, TOPIC, name, config(6)).await.expect("open");
    file.append(lines.iter().cloned()).await.expect("append");
    file.close(Some(Duration::from_secs(10))).await.expect("close")
}

// ============================================================================
// Round Trip
// ============================================================================

#[tokio::test]
async fn test_hundred_lines_round_trip() {
    let log = SimulatedLog::new(42);
    let lines = lines_for("f0", 100);
    let locator = write_file(&log, "f0", &lines).await;

    let parsed = Locator::parse(&locator.format()).expect("parse");
    assert_eq!(parsed, locator);
    assert_eq!(parsed.end().get() - parsed.start().get(), 99);

    let mut reader = ReadFile::open(&log, &locator.format()).await.expect("open reader");
    let bytes = reader.read_all().await.expect("read");
    assert_eq!(bytes, Bytes::from(lines.concat()));
    assert_eq!(reader.state(), ReadState::Exhausted);
}

#[tokio::test]
async fn test_multiple_appends_keep_order() {
    let log = SimulatedLog::new(1);
    let mut file = WriteFile::open(&log, TOPIC, "chunks", config(3)).await.expect("open");
    for chunk in 0..5 {
        let batch: Vec<String> = (0..4).map(|i| format!("{chunk}-{i}\n")).collect();
        file.append(batch).await.expect("append");
    }
    let locator = file.close(None).await.expect("close");

    let reader = ReadFile::open_locator(&log, locator).await.expect("open reader");
    let lines: Vec<Bytes> = reader.into_stream().try_collect().await.expect("stream");
    assert_eq!(lines.len(), 20);
    assert_eq!(lines[0], "0-0\n");
    assert_eq!(lines[19], "4-3\n");
}

#[tokio::test]
async fn test_snapshot_offsets_stay_ordered() {
    let log = SimulatedLog::new(3);
    let mut file = WriteFile::open(&log, TOPIC, "growing", config(2)).await.expect("open");
    assert!(file.locator_snapshot().is_empty());

    for i in 0..10 {
        file.append_line(format!("{i}\n")).await.expect("append");
        tokio::task::yield_now().await;
        let snapshot = file.locator_snapshot();
        if !snapshot.is_empty() {
            assert!(snapshot.start() <= snapshot.end());
        }
    }
    let locator = file.close(None).await.expect("close");
    assert_eq!(locator.end().get() - locator.start().get(), 9);
    assert_eq!(file.locator_snapshot(), locator);
}

// ============================================================================
// Shared Partitions
// ============================================================================

#[tokio::test]
async fn test_interleaved_files_are_filtered_by_key() {
    let log = SimulatedLog::new(7);
    let mut a = WriteFile::open(&log, TOPIC, "a", config(1)).await.expect("open a");
    let mut b = WriteFile::open(&log, TOPIC, "b", config(1)).await.expect("open b");

    for i in 0..20 {
        a.append_line(format!("a{i}\n")).await.expect("append a");
        b.append_line(format!("b{i}\n")).await.expect("append b");
    }
    let (locator_a, locator_b) = tokio::join!(a.close(None), b.close(None));
    let (locator_a, locator_b) = (locator_a.expect("close a"), locator_b.expect("close b"));
    assert_eq!(locator_a.partition(), Partition::new(0));
    assert_eq!(locator_b.partition(), Partition::new(0));

    let mut reader = ReadFile::open_locator(&log, locator_a).await.expect("open a");
    let lines = reader.read_lines().await.expect("read a");
    let expected: Vec<String> = (0..20).map(|i| format!("a{i}\n")).collect();
    assert_eq!(lines, expected.iter().map(String::as_str).collect::<Vec<_>>());

    let mut reader = ReadFile::open_locator(&log, locator_b).await.expect("open b");
    let bytes = reader.read_all().await.expect("read b");
    let expected: String = (0..20).map(|i| format!("b{i}\n")).collect();
    assert_eq!(bytes, Bytes::from(expected));
    assert_eq!(reader.read_all().await.expect("exhausted"), Bytes::new());
}

#[tokio::test]
async fn test_concurrent_writers_and_readers() {
    let log = SimulatedLog::new(11);
    let names: Vec<String> = (0..3).map(|i| format!("f{i}")).collect();

    let writers = names.iter().map(|name| {
        let log = log.clone();
        let name = name.clone();
        tokio::spawn(async move {
            let lines = lines_for(&name, 50);
            let locator = write_file(&log, &name, &lines).await;
            (locator, lines.concat())
        })
    });
    let written = futures::future::join_all(writers).await;

    for result in written {
        let (locator, expected) = result.expect("writer task");
        let mut reader = ReadFile::open(&log, &locator.to_string()).await.expect("open");
        assert_eq!(reader.read_all().await.expect("read"), Bytes::from(expected));
    }
}

// ============================================================================
// Close Semantics
// ============================================================================

#[tokio::test]
async fn test_close_times_out_without_acks() {
    let log = SimulatedLog::with_faults(5, LogFaultConfig::none().with_withheld_acks());
    let mut file = WriteFile::open(&log, TOPIC, "stuck", config(6)).await.expect("open");
    file.append(lines_for("stuck", 3)).await.expect("append");

    let started = Instant::now();
    let err = file
        .close(Some(Duration::from_millis(50)))
        .await
        .expect_err("timeout");
    assert!(err.is_ack_timeout());
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(file.state(), WriteState::Errored);
}

#[tokio::test]
async fn test_slow_acks_within_budget_close_cleanly() {
    let faults = LogFaultConfig::none().with_ack_delay(Duration::from_millis(2));
    let log = SimulatedLog::with_faults(5, faults);
    let lines = lines_for("slow", 10);
    let locator = write_file(&log, "slow", &lines).await;

    let mut reader = ReadFile::open_locator(&log, locator).await.expect("open");
    assert_eq!(reader.read_all().await.expect("read"), Bytes::from(lines.concat()));
}

/// A full outbound queue makes `append` wait; acknowledgments never do.
#[tokio::test]
async fn test_append_blocks_only_on_full_queue() {
    const LINES: usize = 5;
    let delay = Duration::from_millis(40);
    let log = SimulatedLog::with_config(
        13,
        SimulatedLogConfig::default().with_queue_capacity(1),
        LogFaultConfig::none().with_ack_delay(delay),
    );
    let mut file = WriteFile::open(&log, TOPIC, "bp", config(1)).await.expect("open");

    // One record sits in the queue and one with the broker, so every line
    // past the second waits out one ack delay.
    let started = Instant::now();
    file.append(lines_for("bp", LINES)).await.expect("append");
    let blocked = started.elapsed();
    assert!(blocked >= delay * u32::try_from(LINES - 2).expect("small"), "{blocked:?}");
    assert!(file.pending() > 0);

    let locator = file.close(Some(Duration::from_secs(5))).await.expect("close");
    assert_eq!(locator.partition(), Partition::new(0));
    assert_eq!(locator.start().get(), 0);
    assert_eq!(locator.end().get(), 4);
}

#[tokio::test]
async fn test_delivery_failures_are_all_reported() {
    let log = SimulatedLog::with_faults(5, LogFaultConfig::none().with_delivery_fail_rate(1.0));
    let mut file = WriteFile::open(&log, TOPIC, "doomed", config(6)).await.expect("open");
    file.append(lines_for("doomed", 4)).await.expect("enqueue succeeds");

    match file.close(Some(Duration::from_secs(5))).await {
        Err(FileError::Delivery { failures }) => assert_eq!(failures.len(), 4),
        other => panic!("expected every failure, got {other:?}"),
    }
    assert_eq!(file.state(), WriteState::Errored);
}

#[tokio::test]
async fn test_close_fails_fast_on_known_failure() {
    let log = SimulatedLog::with_faults(5, LogFaultConfig::none().with_force_delivery_fail());
    let mut file = WriteFile::open(&log, TOPIC, "early", config(6)).await.expect("open");
    file.append_line("first\n").await.expect("append");

    // Let the failed ack land before closing.
    while file.pending() > 0 {
        tokio::task::yield_now().await;
    }
    log.fault_config().withhold_acks = true;
    file.append_line("second\n").await.expect("append");

    // The known failure is reported without waiting for the withheld ack.
    let started = Instant::now();
    let err = file.close(None).await.expect_err("known failure");
    assert!(matches!(err, FileError::Delivery { .. }));
    assert!(started.elapsed() < Duration::from_secs(2));
}

// ============================================================================
// Retention
// ============================================================================

#[tokio::test]
async fn test_expired_file_is_not_found() {
    let log = SimulatedLog::new(8);
    let locator = write_file(&log, "old", &lines_for("old", 5)).await;

    log.truncate_before(TOPIC, locator.partition(), locator.end())
        .expect("truncate");
    let err = ReadFile::open(&log, &locator.format()).await.expect_err("expired");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_provisioning_is_shared_by_files() {
    let log = SimulatedLog::new(8);
    write_file(&log, "one", &lines_for("one", 1)).await;

    let other = WriterConfig::new().with_topic(TopicSpec::new().with_num_partitions(2));
    let mut file = WriteFile::open(&log, TOPIC, "two", other).await.expect("open");
    file.close(None).await.expect("close");

    let meta = log.describe_topic(TOPIC).await.expect("describe").expect("exists");
    assert_eq!(meta.num_partitions, 6);
}

// ============================================================================
// Multi-Seed Stress
// ============================================================================

/// With random delivery failures, close either returns a locator that reads
/// back every line, or reports exactly the failed records.
#[tokio::test]
async fn test_random_failures_never_yield_partial_locator() {
    for seed in 0..20 {
        let faults = LogFaultConfig::none().with_delivery_fail_rate(0.05);
        let log = SimulatedLog::with_faults(seed, faults);
        let lines = lines_for("stress", 30);

        let mut file = WriteFile::open(&log, TOPIC, "stress", config(4)).await.expect("open");
        file.append(lines.iter().cloned()).await.expect("append");

        match file.close(Some(Duration::from_secs(5))).await {
            Ok(locator) => {
                let mut reader = ReadFile::open_locator(&log, locator).await.expect("open");
                assert_eq!(
                    reader.read_all().await.expect("read"),
                    Bytes::from(lines.concat()),
                    "seed {seed}"
                );
            }
            Err(FileError::Delivery { failures }) => {
                let partition_records: usize = (0..4)
                    .map(|p| log.records(TOPIC, Partition::new(p)).expect("records").len())
                    .sum();
                assert_eq!(failures.len() + partition_records, 30, "seed {seed}");
            }
            Err(other) => panic!("seed {seed}: unexpected error {other}"),
        }
    }
}
