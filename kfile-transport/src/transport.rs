//! The log transport capability.
//!
//! kfile never talks to a log directly. Everything it needs is expressed by
//! three object-safe traits, handed to files as `Arc<dyn LogTransport>`:
//!
//! - [`LogTransport`]: topic administration plus factories for handles
//! - [`RecordSender`]: keyed append with asynchronous per-record [`Ack`]s
//! - [`PartitionConsumer`]: ordered replay of one partition from an offset
//!
//! # Implementors
//!
//! - [`SimulatedLog`](crate::SimulatedLog) keeps everything in memory
//! - `KafkaTransport` talks to Kafka (behind the `kafka` feature)

use async_trait::async_trait;
use bytes::Bytes;
use kfile_core::{Offset, Partition, TopicSpec};
use tokio::sync::mpsc;

use crate::error::{TransportError, TransportResult};

// -----------------------------------------------------------------------------
// Records and Acknowledgments
// -----------------------------------------------------------------------------

/// Shape of an existing topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMetadata {
    /// Topic name.
    pub topic: String,
    /// Number of partitions.
    pub num_partitions: i32,
    /// Replication factor.
    pub replication_factor: i16,
}

/// Per-record outcome reported by a [`RecordSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    /// The record was durably written.
    Delivered {
        /// Partition the record landed in.
        partition: Partition,
        /// Offset assigned to the record.
        offset: Offset,
    },
    /// The record was not written.
    Failed(TransportError),
}

/// Stream of acknowledgments for one producer, in the order the transport
/// reports them.
pub type AckReceiver = mpsc::UnboundedReceiver<Ack>;

/// A record read back from a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedRecord {
    /// Record key (empty if the record had none).
    pub key: Bytes,
    /// Record payload.
    pub value: Bytes,
    /// Offset of the record in its partition.
    pub offset: Offset,
}

/// An exclusively owned append channel and its acknowledgment stream.
pub struct ProducerHandle {
    /// Append side.
    pub sender: Box<dyn RecordSender>,
    /// Acknowledgment side; one [`Ack`] per record accepted by `sender`.
    pub acks: AckReceiver,
}

impl std::fmt::Debug for ProducerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerHandle").finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// Traits
// -----------------------------------------------------------------------------

/// Append side of a producer.
#[async_trait]
pub trait RecordSender: Send {
    /// Enqueues one keyed record.
    ///
    /// Waits only while the outbound queue is saturated, never for the
    /// acknowledgment, which arrives later on the [`AckReceiver`].
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be enqueued at all. No ack
    /// is emitted for such a record.
    async fn send(&mut self, key: Bytes, value: Bytes) -> TransportResult<()>;

    /// Flushes in-flight records and releases the producer.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    async fn close(&mut self) -> TransportResult<()>;
}

/// Ordered replay of a single partition.
#[async_trait]
pub trait PartitionConsumer: Send {
    /// Waits for the next record.
    ///
    /// Records arrive in non-decreasing offset order. Returns `None` once the
    /// consumer has been closed.
    async fn next_record(&mut self) -> Option<TransportResult<ConsumedRecord>>;

    /// Releases the consumption resource. Idempotent.
    fn close(&mut self);
}

/// Log transport capability shared by every file.
///
/// Implementations must be `Send + Sync` for use across async tasks.
#[async_trait]
pub trait LogTransport: Send + Sync {
    /// Describes a topic, returning `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the describe request itself fails.
    async fn describe_topic(&self, topic: &str) -> TransportResult<Option<TopicMetadata>>;

    /// Creates a topic.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::TopicAlreadyExists`] if the topic exists,
    /// or another error if creation fails.
    async fn create_topic(&self, topic: &str, spec: &TopicSpec) -> TransportResult<()>;

    /// Opens a fresh producer for `topic`.
    ///
    /// Records are routed by key, so every record sent with the same key
    /// lands in the same partition.
    ///
    /// # Errors
    ///
    /// Returns an error if the producer cannot be created.
    async fn open_producer(&self, topic: &str) -> TransportResult<ProducerHandle>;

    /// Opens a consumer bound to `partition`, starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::OffsetOutOfRange`] if `start` is no longer
    /// retained, or another error if the consumer cannot be created.
    async fn consume_partition(
        &self,
        topic: &str,
        partition: Partition,
        start: Offset,
    ) -> TransportResult<Box<dyn PartitionConsumer>>;
}
