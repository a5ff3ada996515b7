//! In-memory simulated log for deterministic testing.
//!
//! Topics, partitions, and offsets behave like a single-broker Kafka
//! cluster: records are routed to a partition by hashing their key, offsets
//! are dense per partition, and consumers replay a partition in offset order,
//! waiting for new appends once they have caught up.
//!
//! Fault injection mirrors the simulated object storage used for tiering
//! tests: probabilistic rates driven by a seeded counter hash, one-shot
//! forced failures, and switches for withheld or delayed acknowledgments.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use kfile_core::{Offset, Partition, TopicSpec};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{TransportError, TransportResult};
use crate::transport::{
    Ack, ConsumedRecord, LogTransport, PartitionConsumer, ProducerHandle, RecordSender,
    TopicMetadata,
};

// -----------------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------------

/// Configuration for a simulated log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedLogConfig {
    /// Capacity of each producer's outbound queue. A full queue makes
    /// `send` wait.
    ///
    /// Default: 1024.
    pub queue_capacity: usize,
}

impl Default for SimulatedLogConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
        }
    }
}

impl SimulatedLogConfig {
    /// Sets the outbound queue capacity.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        self.queue_capacity = capacity;
        self
    }
}

/// Fault injection configuration for a simulated log.
#[derive(Debug, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct LogFaultConfig {
    /// Probability of an enqueued record failing delivery. Range: 0.0 - 1.0.
    pub delivery_fail_rate: f64,
    /// If true, records are written but never acknowledged.
    pub withhold_acks: bool,
    /// Delay before each acknowledgment is reported.
    pub ack_delay: Option<Duration>,
    /// If true, the next delivery will fail (one-shot).
    pub force_delivery_fail: bool,
    /// If true, the next `send` will be rejected before enqueueing (one-shot).
    pub force_send_fail: bool,
    /// If true, the next describe will fail (one-shot).
    pub force_describe_fail: bool,
    /// If true, the next create will fail (one-shot).
    pub force_create_fail: bool,
    /// If true, the next create will lose a race: the topic gets created by
    /// "someone else" and the call reports that it already exists (one-shot).
    pub force_create_race: bool,
    /// If true, the next consumed record will be replaced by an error
    /// (one-shot).
    pub force_read_fail: bool,
}

impl LogFaultConfig {
    /// Creates a fault config with no faults (for basic testing).
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Sets the delivery failure rate.
    ///
    /// # Panics
    ///
    /// Panics if rate is not in range 0.0..=1.0.
    #[must_use]
    pub fn with_delivery_fail_rate(mut self, rate: f64) -> Self {
        assert!((0.0..=1.0).contains(&rate), "rate must be in 0.0..=1.0");
        self.delivery_fail_rate = rate;
        self
    }

    /// Writes records but never acknowledges them.
    #[must_use]
    pub const fn with_withheld_acks(mut self) -> Self {
        self.withhold_acks = true;
        self
    }

    /// Delays every acknowledgment.
    #[must_use]
    pub const fn with_ack_delay(mut self, delay: Duration) -> Self {
        self.ack_delay = Some(delay);
        self
    }

    /// Forces the next delivery to fail (one-shot).
    #[must_use]
    pub const fn with_force_delivery_fail(mut self) -> Self {
        self.force_delivery_fail = true;
        self
    }

    /// Forces the next send to be rejected (one-shot).
    #[must_use]
    pub const fn with_force_send_fail(mut self) -> Self {
        self.force_send_fail = true;
        self
    }

    /// Forces the next describe to fail (one-shot).
    #[must_use]
    pub const fn with_force_describe_fail(mut self) -> Self {
        self.force_describe_fail = true;
        self
    }

    /// Forces the next create to fail (one-shot).
    #[must_use]
    pub const fn with_force_create_fail(mut self) -> Self {
        self.force_create_fail = true;
        self
    }

    /// Forces the next create to lose a creation race (one-shot).
    #[must_use]
    pub const fn with_force_create_race(mut self) -> Self {
        self.force_create_race = true;
        self
    }

    /// Forces the next consumed record to fail (one-shot).
    #[must_use]
    pub const fn with_force_read_fail(mut self) -> Self {
        self.force_read_fail = true;
        self
    }
}

// -----------------------------------------------------------------------------
// Partition State
// -----------------------------------------------------------------------------

#[derive(Debug)]
struct StoredRecord {
    key: Bytes,
    value: Bytes,
}

/// Records of one partition. Offsets are dense: the record at index `i`
/// has offset `log_start + i`.
#[derive(Debug, Default)]
struct PartitionState {
    log_start: i64,
    records: Vec<StoredRecord>,
}

impl PartitionState {
    #[allow(clippy::cast_possible_wrap)] // Record count bounded by memory.
    fn log_end(&self) -> i64 {
        self.log_start + self.records.len() as i64
    }

    fn append(&mut self, key: Bytes, value: Bytes) -> Offset {
        let offset = Offset::new(self.log_end());
        self.records.push(StoredRecord { key, value });
        offset
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn get(&self, offset: i64) -> Option<ConsumedRecord> {
        if offset < self.log_start {
            return None;
        }
        let idx = (offset - self.log_start) as usize;
        self.records.get(idx).map(|record| ConsumedRecord {
            key: record.key.clone(),
            value: record.value.clone(),
            offset: Offset::new(offset),
        })
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn truncate_before(&mut self, offset: i64) {
        let offset = offset.min(self.log_end());
        if offset <= self.log_start {
            return;
        }
        let count = (offset - self.log_start) as usize;
        self.records.drain(..count);
        self.log_start = offset;
    }
}

#[derive(Debug, Default)]
struct PartitionLog {
    state: Mutex<PartitionState>,
    appended: Notify,
}

#[derive(Debug)]
struct SimulatedTopic {
    metadata: TopicMetadata,
    config_entries: Vec<(String, String)>,
    partitions: Vec<Arc<PartitionLog>>,
}

impl SimulatedTopic {
    fn new(topic: &str, spec: &TopicSpec) -> Self {
        let partitions = (0..spec.num_partitions.max(1))
            .map(|_| Arc::new(PartitionLog::default()))
            .collect();
        Self {
            metadata: TopicMetadata {
                topic: topic.to_string(),
                num_partitions: spec.num_partitions.max(1),
                replication_factor: spec.replication_factor,
            },
            config_entries: spec.config_entries(),
            partitions,
        }
    }

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn partition(&self, partition: Partition) -> Option<&Arc<PartitionLog>> {
        if partition.get() < 0 {
            return None;
        }
        self.partitions.get(partition.get() as usize)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn route(&self, key: &[u8]) -> Partition {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let count = self.partitions.len() as u64;
        Partition::new((hasher.finish() % count) as i32)
    }
}

// -----------------------------------------------------------------------------
// SimulatedLog
// -----------------------------------------------------------------------------

/// In-memory simulated log for deterministic testing.
///
/// # Cloning
///
/// Clones share the same underlying topics (via `Arc`), allowing multiple
/// handles to observe and modify the same state.
#[derive(Debug, Clone)]
pub struct SimulatedLog {
    topics: Arc<Mutex<HashMap<String, SimulatedTopic>>>,
    fault_config: Arc<Mutex<LogFaultConfig>>,
    config: SimulatedLogConfig,
    /// RNG seed for deterministic fault injection.
    seed: u64,
    /// Operation counter for deterministic RNG.
    counter: Arc<AtomicU64>,
}

impl Default for SimulatedLog {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SimulatedLog {
    /// Creates a new simulated log with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, SimulatedLogConfig::default(), LogFaultConfig::none())
    }

    /// Creates a new simulated log with fault injection enabled.
    #[must_use]
    pub fn with_faults(seed: u64, faults: LogFaultConfig) -> Self {
        Self::with_config(seed, SimulatedLogConfig::default(), faults)
    }

    /// Creates a new simulated log with explicit configuration.
    #[must_use]
    pub fn with_config(seed: u64, config: SimulatedLogConfig, faults: LogFaultConfig) -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            fault_config: Arc::new(Mutex::new(faults)),
            config,
            seed,
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns a reference to the fault configuration for modification.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn fault_config(&self) -> std::sync::MutexGuard<'_, LogFaultConfig> {
        self.fault_config.lock().expect("fault config lock poisoned")
    }

    /// Returns the configuration entries a topic was created with.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn topic_config(&self, topic: &str) -> Option<Vec<(String, String)>> {
        let topics = self.topics.lock().expect("topics lock poisoned");
        topics.get(topic).map(|t| t.config_entries.clone())
    }

    /// Appends a record directly, bypassing producers and faults.
    ///
    /// Useful for simulating other writers sharing a partition.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic or partition does not exist.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn append_direct(
        &self,
        topic: &str,
        partition: Partition,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> TransportResult<Offset> {
        let log = self.partition_log(topic, partition)?;
        let offset = log
            .state
            .lock()
            .expect("partition lock poisoned")
            .append(key.into(), value.into());
        log.appended.notify_waiters();
        Ok(offset)
    }

    /// Returns every retained record of a partition.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic or partition does not exist.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn records(&self, topic: &str, partition: Partition) -> TransportResult<Vec<ConsumedRecord>> {
        let log = self.partition_log(topic, partition)?;
        let state = log.state.lock().expect("partition lock poisoned");
        Ok((state.log_start..state.log_end())
            .filter_map(|offset| state.get(offset))
            .collect())
    }

    /// Drops every record before `offset`, as retention expiry would.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic or partition does not exist.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn truncate_before(
        &self,
        topic: &str,
        partition: Partition,
        offset: Offset,
    ) -> TransportResult<()> {
        let log = self.partition_log(topic, partition)?;
        log.state
            .lock()
            .expect("partition lock poisoned")
            .truncate_before(offset.get());
        debug!(topic, partition = partition.get(), offset = offset.get(), "Truncated partition");
        Ok(())
    }

    fn partition_log(&self, topic: &str, partition: Partition) -> TransportResult<Arc<PartitionLog>> {
        let topics = self.topics.lock().expect("topics lock poisoned");
        let entry = topics.get(topic).ok_or_else(|| TransportError::UnknownTopic {
            topic: topic.to_string(),
        })?;
        entry
            .partition(partition)
            .cloned()
            .ok_or_else(|| TransportError::UnknownPartition {
                topic: topic.to_string(),
                partition,
            })
    }

    /// Takes a one-shot fault flag, clearing it.
    fn take_fault(&self, select: impl FnOnce(&mut LogFaultConfig) -> &mut bool) -> bool {
        let mut config = self.fault_config.lock().expect("fault config lock poisoned");
        std::mem::take(select(&mut *config))
    }

    /// Deterministic RNG based on seed and counter.
    fn should_inject_fault(&self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        if rate >= 1.0 {
            return true;
        }
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        // Hash seed+counter together for proper pseudo-random distribution.
        let hash = self.seed.wrapping_add(counter).wrapping_mul(0x5851_f42d_4c95_7f2d);
        #[allow(clippy::cast_precision_loss)]
        let normalized = (hash as f64) / (u64::MAX as f64);
        normalized < rate
    }

    /// Writes one record on behalf of a producer and decides its ack.
    ///
    /// Returns `None` when the ack is withheld.
    fn deliver(&self, topic: &str, key: Bytes, value: Bytes) -> Option<Ack> {
        let (forced, rate, withhold) = {
            let mut config = self.fault_config.lock().expect("fault config lock poisoned");
            let forced = std::mem::take(&mut config.force_delivery_fail);
            (forced, config.delivery_fail_rate, config.withhold_acks)
        };

        if forced || self.should_inject_fault(rate) {
            warn!(topic, "Simulated delivery failure");
            return Some(Ack::Failed(TransportError::Delivery {
                message: "simulated delivery failure".to_string(),
            }));
        }

        let log = {
            let topics = self.topics.lock().expect("topics lock poisoned");
            let Some(entry) = topics.get(topic) else {
                return Some(Ack::Failed(TransportError::UnknownTopic {
                    topic: topic.to_string(),
                }));
            };
            let partition = entry.route(&key);
            entry.partition(partition).cloned().map(|log| (partition, log))
        };
        let Some((partition, log)) = log else {
            return Some(Ack::Failed(TransportError::Delivery {
                message: "no partition for key".to_string(),
            }));
        };

        let offset = log
            .state
            .lock()
            .expect("partition lock poisoned")
            .append(key, value);
        log.appended.notify_waiters();

        if withhold {
            return None;
        }
        Some(Ack::Delivered { partition, offset })
    }
}

#[async_trait]
impl LogTransport for SimulatedLog {
    async fn describe_topic(&self, topic: &str) -> TransportResult<Option<TopicMetadata>> {
        if self.take_fault(|c| &mut c.force_describe_fail) {
            return Err(TransportError::Admin {
                operation: "describe_topic",
                message: "simulated describe failure (forced)".to_string(),
            });
        }
        let topics = self.topics.lock().expect("topics lock poisoned");
        Ok(topics.get(topic).map(|t| t.metadata.clone()))
    }

    async fn create_topic(&self, topic: &str, spec: &TopicSpec) -> TransportResult<()> {
        if self.take_fault(|c| &mut c.force_create_fail) {
            return Err(TransportError::Admin {
                operation: "create_topic",
                message: "simulated create failure (forced)".to_string(),
            });
        }
        if let Err((field, reason)) = spec.validate() {
            return Err(TransportError::Admin {
                operation: "create_topic",
                message: format!("invalid {field}: {reason}"),
            });
        }

        let raced = self.take_fault(|c| &mut c.force_create_race);
        let mut topics = self.topics.lock().expect("topics lock poisoned");
        if topics.contains_key(topic) {
            return Err(TransportError::TopicAlreadyExists {
                topic: topic.to_string(),
            });
        }
        topics.insert(topic.to_string(), SimulatedTopic::new(topic, spec));
        drop(topics);

        if raced {
            // Another creator got there first.
            return Err(TransportError::TopicAlreadyExists {
                topic: topic.to_string(),
            });
        }
        debug!(topic, partitions = spec.num_partitions, "Created simulated topic");
        Ok(())
    }

    async fn open_producer(&self, topic: &str) -> TransportResult<ProducerHandle> {
        if !self
            .topics
            .lock()
            .expect("topics lock poisoned")
            .contains_key(topic)
        {
            return Err(TransportError::UnknownTopic {
                topic: topic.to_string(),
            });
        }

        let (queue_tx, mut queue_rx) = mpsc::channel::<(Bytes, Bytes)>(self.config.queue_capacity);
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();

        let log = self.clone();
        let broker_topic = topic.to_string();
        let broker = tokio::spawn(async move {
            while let Some((key, value)) = queue_rx.recv().await {
                let Some(ack) = log.deliver(&broker_topic, key, value) else {
                    continue;
                };
                let delay = log.fault_config().ack_delay;
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                // The file may already be gone; its acks no longer matter.
                let _ = ack_tx.send(ack);
            }
        });

        Ok(ProducerHandle {
            sender: Box::new(SimulatedSender {
                log: self.clone(),
                queue: Some(queue_tx),
                broker: Some(broker),
            }),
            acks: ack_rx,
        })
    }

    async fn consume_partition(
        &self,
        topic: &str,
        partition: Partition,
        start: Offset,
    ) -> TransportResult<Box<dyn PartitionConsumer>> {
        let log = self.partition_log(topic, partition)?;
        {
            let state = log.state.lock().expect("partition lock poisoned");
            if start.get() < state.log_start || start.get() > state.log_end() {
                return Err(TransportError::OffsetOutOfRange {
                    topic: topic.to_string(),
                    partition,
                    offset: start,
                });
            }
        }

        Ok(Box::new(SimulatedConsumer {
            log: self.clone(),
            partition_log: log,
            topic: topic.to_string(),
            partition,
            next: start.get(),
            closed: false,
        }))
    }
}

// -----------------------------------------------------------------------------
// Producer and Consumer Handles
// -----------------------------------------------------------------------------

struct SimulatedSender {
    log: SimulatedLog,
    queue: Option<mpsc::Sender<(Bytes, Bytes)>>,
    broker: Option<JoinHandle<()>>,
}

#[async_trait]
impl RecordSender for SimulatedSender {
    async fn send(&mut self, key: Bytes, value: Bytes) -> TransportResult<()> {
        let queue = self.queue.as_ref().ok_or(TransportError::Closed { handle: "producer" })?;
        if self.log.take_fault(|c| &mut c.force_send_fail) {
            return Err(TransportError::Delivery {
                message: "simulated enqueue failure (forced)".to_string(),
            });
        }
        queue
            .send((key, value))
            .await
            .map_err(|_| TransportError::Closed { handle: "producer" })
    }

    async fn close(&mut self) -> TransportResult<()> {
        // Dropping the queue lets the broker drain what is left and exit.
        self.queue = None;
        if let Some(broker) = self.broker.take() {
            broker.await.map_err(|err| TransportError::Delivery {
                message: format!("simulated broker task failed: {err}"),
            })?;
        }
        Ok(())
    }
}

struct SimulatedConsumer {
    log: SimulatedLog,
    partition_log: Arc<PartitionLog>,
    topic: String,
    partition: Partition,
    next: i64,
    closed: bool,
}

#[async_trait]
impl PartitionConsumer for SimulatedConsumer {
    async fn next_record(&mut self) -> Option<TransportResult<ConsumedRecord>> {
        loop {
            if self.closed {
                return None;
            }

            // Register interest before looking, so an append between the
            // check and the wait is not missed.
            let appended = self.partition_log.appended.notified();
            let found = {
                let state = self.partition_log.state.lock().expect("partition lock poisoned");
                if self.next < state.log_start {
                    Some(Err(TransportError::OffsetOutOfRange {
                        topic: self.topic.clone(),
                        partition: self.partition,
                        offset: Offset::new(self.next),
                    }))
                } else {
                    state.get(self.next).map(Ok)
                }
            };

            if let Some(result) = found {
                if self.log.take_fault(|c| &mut c.force_read_fail) {
                    return Some(Err(TransportError::Delivery {
                        message: "simulated read failure (forced)".to_string(),
                    }));
                }
                if result.is_ok() {
                    self.next += 1;
                }
                return Some(result);
            }
            appended.await;
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn log_with_topic(partitions: i32) -> SimulatedLog {
        let log = SimulatedLog::new(42);
        log.create_topic("t", &TopicSpec::new().with_num_partitions(partitions))
            .await
            .expect("create");
        log
    }

    #[tokio::test]
    async fn test_create_and_describe() {
        let log = SimulatedLog::new(1);
        assert_eq!(log.describe_topic("t").await.expect("describe"), None);

        let spec = TopicSpec::new()
            .with_num_partitions(3)
            .with_retention(Duration::from_secs(60));
        log.create_topic("t", &spec).await.expect("create");

        let meta = log.describe_topic("t").await.expect("describe").expect("exists");
        assert_eq!(meta.num_partitions, 3);
        assert_eq!(meta.replication_factor, 1);
        assert_eq!(
            log.topic_config("t"),
            Some(vec![("retention.ms".to_string(), "60000".to_string())])
        );

        let err = log.create_topic("t", &spec).await.expect_err("duplicate");
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_same_key_same_partition() {
        let log = log_with_topic(6).await;
        let mut handle = log.open_producer("t").await.expect("producer");

        for i in 0..10 {
            handle
                .sender
                .send(Bytes::from_static(b"k"), Bytes::from(format!("v{i}")))
                .await
                .expect("send");
        }

        let mut partitions = Vec::new();
        let mut offsets = Vec::new();
        for _ in 0..10 {
            match handle.acks.recv().await.expect("ack") {
                Ack::Delivered { partition, offset } => {
                    partitions.push(partition);
                    offsets.push(offset.get());
                }
                Ack::Failed(err) => panic!("unexpected failure: {err}"),
            }
        }
        partitions.dedup();
        assert_eq!(partitions.len(), 1);
        assert_eq!(offsets, (0..10).collect::<Vec<_>>());
        handle.sender.close().await.expect("close");
    }

    #[tokio::test]
    async fn test_consumer_waits_for_appends() {
        let log = log_with_topic(1).await;
        let partition = Partition::new(0);
        let mut consumer = log
            .consume_partition("t", partition, Offset::new(0))
            .await
            .expect("consumer");

        let writer = log.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            writer.append_direct("t", partition, "k", "late").expect("append");
        });

        let record = consumer.next_record().await.expect("record").expect("ok");
        assert_eq!(record.value, Bytes::from_static(b"late"));
        assert_eq!(record.offset, Offset::new(0));

        consumer.close();
        consumer.close();
        assert!(consumer.next_record().await.is_none());
    }

    #[tokio::test]
    async fn test_truncated_start_is_out_of_range() {
        let log = log_with_topic(1).await;
        let partition = Partition::new(0);
        for i in 0..5 {
            log.append_direct("t", partition, "k", format!("{i}")).expect("append");
        }
        log.truncate_before("t", partition, Offset::new(3)).expect("truncate");

        let err = log
            .consume_partition("t", partition, Offset::new(1))
            .await
            .err()
            .expect("out of range");
        assert!(err.is_offset_out_of_range());

        let records = log.records("t", partition).expect("records");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].offset, Offset::new(3));
    }

    #[tokio::test]
    async fn test_forced_faults_are_one_shot() {
        let log = log_with_topic(1).await;
        log.fault_config().force_delivery_fail = true;

        let mut handle = log.open_producer("t").await.expect("producer");
        handle.sender.send(Bytes::from_static(b"k"), Bytes::from_static(b"a")).await.expect("send");
        handle.sender.send(Bytes::from_static(b"k"), Bytes::from_static(b"b")).await.expect("send");

        assert!(matches!(handle.acks.recv().await, Some(Ack::Failed(_))));
        assert!(matches!(handle.acks.recv().await, Some(Ack::Delivered { .. })));
    }

    #[tokio::test]
    async fn test_withheld_acks_still_write() {
        let log = SimulatedLog::with_faults(7, LogFaultConfig::none().with_withheld_acks());
        log.create_topic("t", &TopicSpec::new().with_num_partitions(1))
            .await
            .expect("create");
        let mut handle = log.open_producer("t").await.expect("producer");
        handle.sender.send(Bytes::from_static(b"k"), Bytes::from_static(b"a")).await.expect("send");
        handle.sender.close().await.expect("close");

        assert_eq!(log.records("t", Partition::new(0)).expect("records").len(), 1);
        assert!(handle.acks.recv().await.is_none());
    }

    #[test]
    fn test_fault_rate_bounds() {
        let log = SimulatedLog::new(3);
        assert!(!log.should_inject_fault(0.0));
        assert!(log.should_inject_fault(1.0));
    }
}
