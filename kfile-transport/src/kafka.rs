//! Kafka-backed log transport for production use.
//!
//! Built on `rdkafka`. Producers are `ThreadedProducer`s whose delivery
//! callback forwards each report into the file's ack stream; consumers are
//! `StreamConsumer`s manually assigned to one partition at an explicit
//! offset; administration goes through an `AdminClient`.
//!
//! Metadata, watermark, and flush calls block inside librdkafka, so they run
//! on tokio's blocking pool.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use kfile_transport::{KafkaConfig, KafkaTransport};
//!
//! let config = KafkaConfig::new(["localhost:9092"]);
//! let transport = Arc::new(KafkaTransport::new(config)?);
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use kfile_core::{Offset, Partition, TopicSpec};
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message;
use rdkafka::metadata::Metadata;
use rdkafka::producer::{BaseRecord, DeliveryResult, Producer, ProducerContext, ThreadedProducer};
use rdkafka::topic_partition_list::{Offset as KafkaOffset, TopicPartitionList};
use rdkafka::ClientContext;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{TransportError, TransportResult};
use crate::transport::{
    Ack, ConsumedRecord, LogTransport, PartitionConsumer, ProducerHandle, RecordSender,
    TopicMetadata,
};

/// Back-off while the local producer queue is full.
const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(10);

// -----------------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------------

/// Configuration for the Kafka transport.
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Bootstrap broker addresses (required).
    pub bootstrap_servers: Vec<String>,

    /// Timeout for metadata and admin requests.
    ///
    /// Default: 10 seconds.
    pub request_timeout: Duration,

    /// How long the producer retries a record before reporting failure.
    ///
    /// Default: 30 seconds.
    pub message_timeout: Duration,

    /// Consumer group id used by partition consumers. Offsets are never
    /// committed; the id only satisfies the client.
    ///
    /// Default: `"kfile-reader"`.
    pub consumer_group: String,
}

impl KafkaConfig {
    /// Creates a config for the given brokers with default timeouts.
    #[must_use]
    pub fn new<I, S>(bootstrap_servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bootstrap_servers: bootstrap_servers.into_iter().map(Into::into).collect(),
            request_timeout: Duration::from_secs(10),
            message_timeout: Duration::from_secs(30),
            consumer_group: "kfile-reader".to_string(),
        }
    }

    /// Sets the admin/metadata request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the producer message timeout.
    #[must_use]
    pub const fn with_message_timeout(mut self, timeout: Duration) -> Self {
        self.message_timeout = timeout;
        self
    }

    /// Sets the consumer group id.
    #[must_use]
    pub fn with_consumer_group(mut self, group: impl Into<String>) -> Self {
        self.consumer_group = group.into();
        self
    }

    fn client_config(&self) -> TransportResult<ClientConfig> {
        if self.bootstrap_servers.is_empty() {
            return Err(TransportError::InvalidConfig {
                message: "at least one bootstrap server is required".to_string(),
            });
        }
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", self.bootstrap_servers.join(","));
        // A metadata lookup must never create the topic with broker defaults.
        config.set("allow.auto.create.topics", "false");
        Ok(config)
    }
}

// -----------------------------------------------------------------------------
// KafkaTransport
// -----------------------------------------------------------------------------

/// Log transport backed by a Kafka cluster.
pub struct KafkaTransport {
    config: KafkaConfig,
    admin: Arc<AdminClient<DefaultClientContext>>,
}

impl std::fmt::Debug for KafkaTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl KafkaTransport {
    /// Creates a transport for the configured cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the admin client cannot
    /// be created.
    pub fn new(config: KafkaConfig) -> TransportResult<Self> {
        let admin = config.client_config()?.create()?;
        Ok(Self {
            config,
            admin: Arc::new(admin),
        })
    }

    fn message_timeout_ms(&self) -> String {
        self.config.message_timeout.as_millis().to_string()
    }
}

#[async_trait]
impl LogTransport for KafkaTransport {
    async fn describe_topic(&self, topic: &str) -> TransportResult<Option<TopicMetadata>> {
        let admin = Arc::clone(&self.admin);
        let topic = topic.to_string();
        let timeout = self.config.request_timeout;
        run_blocking(move || {
            let metadata = admin
                .inner()
                .fetch_metadata(Some(&topic), timeout)
                .map_err(|err| TransportError::Admin {
                    operation: "describe_topic",
                    message: err.to_string(),
                })?;
            topic_metadata(&metadata, &topic)
        })
        .await
    }

    async fn create_topic(&self, topic: &str, spec: &TopicSpec) -> TransportResult<()> {
        let entries = spec.config_entries();
        let mut new_topic = NewTopic::new(
            topic,
            spec.num_partitions,
            TopicReplication::Fixed(i32::from(spec.replication_factor)),
        );
        for (key, value) in &entries {
            new_topic = new_topic.set(key, value);
        }

        let options = AdminOptions::new().operation_timeout(Some(self.config.request_timeout));
        let results = self
            .admin
            .create_topics([&new_topic], &options)
            .await
            .map_err(|err| TransportError::Admin {
                operation: "create_topic",
                message: err.to_string(),
            })?;

        for result in results {
            match result {
                Ok(_) => {}
                Err((_, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    return Err(TransportError::TopicAlreadyExists {
                        topic: topic.to_string(),
                    });
                }
                Err((_, code)) => {
                    return Err(TransportError::Admin {
                        operation: "create_topic",
                        message: code.to_string(),
                    });
                }
            }
        }
        debug!(topic, partitions = spec.num_partitions, "Created Kafka topic");
        Ok(())
    }

    async fn open_producer(&self, topic: &str) -> TransportResult<ProducerHandle> {
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        let producer: ThreadedProducer<AckContext> = self
            .config
            .client_config()?
            .set("message.timeout.ms", self.message_timeout_ms())
            .set("acks", "all")
            .create_with_context(AckContext { acks: ack_tx })?;

        Ok(ProducerHandle {
            sender: Box::new(KafkaSender {
                topic: topic.to_string(),
                producer: Some(producer),
                flush_timeout: self.config.message_timeout,
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
        let consumer: StreamConsumer = self
            .config
            .client_config()?
            .set("group.id", &self.config.consumer_group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "error")
            .create()?;

        let (consumer, (low, high)) = {
            let topic = topic.to_string();
            let timeout = self.config.request_timeout;
            run_blocking(move || {
                let watermarks = consumer.fetch_watermarks(&topic, partition.get(), timeout)?;
                Ok((consumer, watermarks))
            })
            .await?
        };
        if start.get() < low || start.get() > high {
            return Err(TransportError::OffsetOutOfRange {
                topic: topic.to_string(),
                partition,
                offset: start,
            });
        }

        let mut assignment = TopicPartitionList::new();
        assignment.add_partition_offset(topic, partition.get(), KafkaOffset::Offset(start.get()))?;
        consumer.assign(&assignment)?;

        Ok(Box::new(KafkaConsumer {
            topic: topic.to_string(),
            partition,
            start,
            consumer: Some(consumer),
        }))
    }
}

/// Runs a blocking librdkafka call on the blocking pool.
async fn run_blocking<T, F>(call: F) -> TransportResult<T>
where
    F: FnOnce() -> TransportResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|err| TransportError::Kafka {
            message: err.to_string(),
        })?
}

/// Extracts `topic` from a metadata response. An unknown topic is `None`.
fn topic_metadata(metadata: &Metadata, topic: &str) -> TransportResult<Option<TopicMetadata>> {
    let Some(entry) = metadata.topics().iter().find(|t| t.name() == topic) else {
        return Ok(None);
    };
    if let Some(err) = entry.error() {
        let code = RDKafkaErrorCode::from(err);
        if code == RDKafkaErrorCode::UnknownTopicOrPartition {
            return Ok(None);
        }
        return Err(TransportError::Admin {
            operation: "describe_topic",
            message: code.to_string(),
        });
    }

    let replication_factor = entry
        .partitions()
        .first()
        .map_or(0, |p| i16::try_from(p.replicas().len()).unwrap_or(i16::MAX));
    Ok(Some(TopicMetadata {
        topic: topic.to_string(),
        num_partitions: i32::try_from(entry.partitions().len()).unwrap_or(i32::MAX),
        replication_factor,
    }))
}

// -----------------------------------------------------------------------------
// Producer
// -----------------------------------------------------------------------------

/// Forwards delivery reports from the client's polling thread.
struct AckContext {
    acks: mpsc::UnboundedSender<Ack>,
}

impl ClientContext for AckContext {}

impl ProducerContext for AckContext {
    type DeliveryOpaque = ();

    fn delivery(&self, delivery_result: &DeliveryResult<'_>, _opaque: Self::DeliveryOpaque) {
        let ack = match delivery_result {
            Ok(message) => Ack::Delivered {
                partition: Partition::new(message.partition()),
                offset: Offset::new(message.offset()),
            },
            Err((err, _message)) => Ack::Failed(TransportError::Delivery {
                message: err.to_string(),
            }),
        };
        // The file may already be gone; its acks no longer matter.
        let _ = self.acks.send(ack);
    }
}

struct KafkaSender {
    topic: String,
    producer: Option<ThreadedProducer<AckContext>>,
    flush_timeout: Duration,
}

#[async_trait]
impl RecordSender for KafkaSender {
    async fn send(&mut self, key: Bytes, value: Bytes) -> TransportResult<()> {
        let producer = self
            .producer
            .as_ref()
            .ok_or(TransportError::Closed { handle: "producer" })?;

        let mut record: BaseRecord<'_, [u8], [u8]> =
            BaseRecord::to(&self.topic).key(&key[..]).payload(&value[..]);
        loop {
            match producer.send(record) {
                Ok(()) => return Ok(()),
                Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), returned)) => {
                    record = returned;
                    tokio::time::sleep(QUEUE_FULL_BACKOFF).await;
                }
                Err((err, _)) => {
                    return Err(TransportError::Delivery {
                        message: err.to_string(),
                    })
                }
            }
        }
    }

    async fn close(&mut self) -> TransportResult<()> {
        if let Some(producer) = self.producer.take() {
            let timeout = self.flush_timeout;
            run_blocking(move || Ok(producer.flush(timeout)?)).await?;
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Consumer
// -----------------------------------------------------------------------------

struct KafkaConsumer {
    topic: String,
    partition: Partition,
    start: Offset,
    consumer: Option<StreamConsumer>,
}

#[async_trait]
impl PartitionConsumer for KafkaConsumer {
    async fn next_record(&mut self) -> Option<TransportResult<ConsumedRecord>> {
        let consumer = self.consumer.as_ref()?;
        let result = match consumer.recv().await {
            Ok(message) => Ok(ConsumedRecord {
                key: message.key().map(Bytes::copy_from_slice).unwrap_or_default(),
                value: message.payload().map(Bytes::copy_from_slice).unwrap_or_default(),
                offset: Offset::new(message.offset()),
            }),
            Err(KafkaError::MessageConsumption(RDKafkaErrorCode::OffsetOutOfRange)) => {
                Err(TransportError::OffsetOutOfRange {
                    topic: self.topic.clone(),
                    partition: self.partition,
                    offset: self.start,
                })
            }
            Err(err) => {
                warn!(
                    topic = %self.topic,
                    partition = self.partition.get(),
                    error = %err,
                    "Consume failed"
                );
                Err(err.into())
            }
        };
        Some(result)
    }

    fn close(&mut self) {
        if let Some(consumer) = self.consumer.take() {
            consumer.unassign().ok();
        }
    }
}
