//! Kfile - Logical files over a partitioned, append-only log.
//!
//! A logical file is a named run of records inside one partition of a shared
//! topic. Writers append lines under a name and, once every record is
//! acknowledged, get back a [`Locator`]; readers re-open that locator, even
//! from another process, and replay exactly the lines that were written.
//!
//! # Design Principles (`TigerStyle`)
//!
//! - **Single-writer state**: the ack drain alone mutates acknowledgment
//!   progress and publishes it over a watch channel
//! - **All-or-nothing close**: any failed record means no locator
//! - **One termination rule**: every read mode stops at the same offset
//! - **No unsafe code**: Safety > Performance
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use kfile::{ReadFile, WriteFile, WriterConfig};
//! use kfile_transport::SimulatedLog;
//!
//! let log = SimulatedLog::new(42);
//!
//! let mut file = WriteFile::open(&log, "kfile.default", "f0", WriterConfig::default()).await?;
//! file.append(["Line 0 of file f0\n", "Line 1 of file f0\n"]).await?;
//! let locator = file.close(Some(Duration::from_secs(10))).await?;
//!
//! let mut reader = ReadFile::open(&log, &locator.format()).await?;
//! let bytes = reader.read_all().await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod provision;
mod reader;
mod writer;

pub use error::{FileError, FileResult, WriteFailure};
pub use provision::ensure_topic;
pub use reader::{Lines, ReadFile, ReadState};
pub use writer::{WriteFile, WriteState};

pub use kfile_core::{Locator, LocatorError, Offset, OffsetRange, Partition, TopicSpec, WriterConfig};
