//! File error types.

use std::time::Duration;

use kfile_core::{LocatorError, Offset, Partition};
use kfile_transport::TransportError;
use thiserror::Error;

/// Result type for file operations.
pub type FileResult<T> = Result<T, FileError>;

/// One record that did not make it into the file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteFailure {
    /// The transport reported the record as failed.
    #[error("{0}")]
    Delivery(TransportError),

    /// The record was acknowledged in a different partition than the rest
    /// of the file.
    #[error("offset {offset} acknowledged in partition {actual}, file is bound to partition {expected}")]
    PartitionMismatch {
        /// Partition of the file's first acknowledgment.
        expected: Partition,
        /// Partition of this acknowledgment.
        actual: Partition,
        /// Offset of this acknowledgment.
        offset: Offset,
    },
}

/// Errors from opening, writing, closing, or reading a logical file.
#[derive(Debug, Error)]
pub enum FileError {
    /// The locator string was malformed or incomplete.
    #[error(transparent)]
    Locator(#[from] LocatorError),

    /// The backing topic could not be provisioned.
    #[error("failed to provision topic '{topic}': {source}")]
    Provision {
        /// The topic.
        topic: String,
        /// Administrative failure.
        source: TransportError,
    },

    /// A record could not be enqueued.
    #[error("failed to enqueue record: {0}")]
    Send(TransportError),

    /// Records failed delivery. Every failure is reported, not just the
    /// first.
    #[error("{} record(s) failed delivery: {}", .failures.len(), join_failures(.failures))]
    Delivery {
        /// All accumulated failures, in the order they were observed.
        failures: Vec<WriteFailure>,
    },

    /// Acknowledgments were still outstanding when the wait budget ran out.
    #[error("{pending} acknowledgment(s) still pending after {waited:?}")]
    AckTimeout {
        /// Records enqueued but not yet acknowledged.
        pending: u64,
        /// How long close waited.
        waited: Duration,
    },

    /// The file's first record is no longer retained.
    #[error("file not found: offset {offset} of {topic}/{partition} is no longer retained")]
    NotFound {
        /// The topic.
        topic: String,
        /// The partition.
        partition: Partition,
        /// The file's start offset.
        offset: Offset,
    },

    /// The transport failed while streaming records.
    #[error("read failed: {0}")]
    Read(TransportError),

    /// The operation is not allowed in the file's current state.
    #[error("file is {current}, operation requires {required}")]
    InvalidState {
        /// Current state.
        current: &'static str,
        /// Required state.
        required: &'static str,
    },

    /// Invalid configuration.
    #[error("invalid config: {message}")]
    InvalidConfig {
        /// Configuration error description.
        message: String,
    },
}

impl FileError {
    /// Returns true if the file's records have expired from the log.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if close gave up waiting for acknowledgments.
    #[must_use]
    pub const fn is_ack_timeout(&self) -> bool {
        matches!(self, Self::AckTimeout { .. })
    }
}

fn join_failures(failures: &[WriteFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
