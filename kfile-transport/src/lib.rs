//! Kfile Transport - The log capability logical files are built on.
//!
//! A logical file needs three things from a partitioned log: keyed append
//! with per-record acknowledgments, ordered replay of one partition from an
//! offset, and topic administration. This crate expresses those as traits
//! and ships two backends.
//!
//! # Design Principles (`TigerStyle`)
//!
//! - **Deterministic testing**: `SimulatedLog` enables fault injection
//! - **Explicit ownership**: every file owns its own producer or consumer
//! - **Injected capability**: transports are passed in, never global
//! - **No unsafe code**: Safety > Performance
//!
//! # Backends
//!
//! - [`SimulatedLog`]: In-memory log with fault injection for tests
//! - `KafkaTransport`: Production Kafka backend (behind `kafka` feature flag)

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
#[cfg(feature = "kafka")]
mod kafka;
mod simulated;
mod transport;

pub use error::{TransportError, TransportResult};
#[cfg(feature = "kafka")]
pub use kafka::{KafkaConfig, KafkaTransport};
pub use simulated::{LogFaultConfig, SimulatedLog, SimulatedLogConfig};
pub use transport::{
    Ack, AckReceiver, ConsumedRecord, LogTransport, PartitionConsumer, ProducerHandle,
    RecordSender, TopicMetadata,
};
