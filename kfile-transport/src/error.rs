//! Transport error types.

use kfile_core::{Offset, Partition};
use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors reported by a log transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Topic creation raced with another creator. Provisioning treats this
    /// as success.
    #[error("topic '{topic}' already exists")]
    TopicAlreadyExists {
        /// The topic.
        topic: String,
    },

    /// The topic does not exist.
    #[error("unknown topic '{topic}'")]
    UnknownTopic {
        /// The topic.
        topic: String,
    },

    /// The partition does not exist in the topic.
    #[error("unknown partition {partition} of topic '{topic}'")]
    UnknownPartition {
        /// The topic.
        topic: String,
        /// The partition.
        partition: Partition,
    },

    /// The requested offset is no longer (or not yet) retained.
    #[error("offset {offset} out of range for {topic}/{partition}")]
    OffsetOutOfRange {
        /// The topic.
        topic: String,
        /// The partition.
        partition: Partition,
        /// The requested offset.
        offset: Offset,
    },

    /// A record was rejected or lost by the transport.
    #[error("delivery failed: {message}")]
    Delivery {
        /// Transport-provided cause.
        message: String,
    },

    /// An administrative request failed.
    #[error("admin request '{operation}' failed: {message}")]
    Admin {
        /// Which request failed.
        operation: &'static str,
        /// Transport-provided cause.
        message: String,
    },

    /// The producer or consumer handle was already closed.
    #[error("{handle} is closed")]
    Closed {
        /// Which handle.
        handle: &'static str,
    },

    /// Invalid transport configuration.
    #[error("invalid transport config: {message}")]
    InvalidConfig {
        /// Configuration error description.
        message: String,
    },

    /// Error raised by the Kafka client library.
    #[cfg(feature = "kafka")]
    #[error("kafka error: {message}")]
    Kafka {
        /// Client-provided cause.
        message: String,
    },
}

impl TransportError {
    /// Returns true for the benign outcome of a racing topic creation.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::TopicAlreadyExists { .. })
    }

    /// Returns true if a requested offset is no longer retained.
    #[must_use]
    pub const fn is_offset_out_of_range(&self) -> bool {
        matches!(self, Self::OffsetOutOfRange { .. })
    }
}

#[cfg(feature = "kafka")]
impl From<rdkafka::error::KafkaError> for TransportError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        Self::Kafka {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let exists = TransportError::TopicAlreadyExists {
            topic: "t".to_string(),
        };
        assert!(exists.is_already_exists());
        assert!(!exists.is_offset_out_of_range());

        let out_of_range = TransportError::OffsetOutOfRange {
            topic: "t".to_string(),
            partition: Partition::new(2),
            offset: Offset::new(5),
        };
        assert!(out_of_range.is_offset_out_of_range());
        assert_eq!(format!("{out_of_range}"), "offset 5 out of range for t/2");
    }
}
