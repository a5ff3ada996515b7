//! Kfile Core - Typed identifiers, configuration, and locators for kfile.
//!
//! A *logical file* is a named, contiguous run of key-filtered records inside
//! one partition of a shared append-only log. This crate holds the pieces of
//! that abstraction that need no I/O:
//!
//! - [`Partition`] and [`Offset`]: strongly-typed log coordinates
//! - [`TopicSpec`] and [`WriterConfig`]: explicit configuration with defaults
//! - [`Locator`]: the stable string address of a finished file
//!
//! # Design Principles (`TigerStyle`)
//!
//! - **Strongly-typed coordinates**: a partition can't be passed as an offset
//! - **Explicit defaults**: every knob has a documented default
//! - **No unsafe code**: Safety > Performance

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod error;
mod locator;
mod types;

pub use config::{validate_topic_name, TopicSpec, WriterConfig, TOPIC_NAME_LEN_MAX};
pub use error::{LocatorError, LocatorResult};
pub use locator::{Locator, SCHEME};
pub use types::{Offset, OffsetRange, Partition};
