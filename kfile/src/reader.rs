//! Read-mode files.
//!
//! A [`ReadFile`] binds one partition consumer at the locator's start offset
//! and filters the shared partition stream down to records keyed by the
//! file's name.
//!
//! # Termination
//!
//! There is one rule for every way of reading: a record is yielded if its key
//! matches and its offset is `<= end`; the sequence ends right after the
//! first record of any key whose offset is `>= end`. The matching record at
//! exactly `end` is therefore the last one yielded. [`ReadFile::read_all`]
//! and [`ReadFile::into_stream`] are both built on [`ReadFile::next_line`].

use std::fmt;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt};
use kfile_core::Locator;
use kfile_transport::{LogTransport, PartitionConsumer};
use tracing::{debug, info, warn};

use crate::error::{FileError, FileResult};

/// The lines of a file as an asynchronous stream.
pub type Lines = BoxStream<'static, FileResult<Bytes>>;

/// State of a read-mode file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    /// Records may remain.
    Open,
    /// The end of the file was reached.
    Exhausted,
    /// The consumer was released before the end, by `close` or a read error.
    Closed,
}

impl ReadState {
    /// Returns the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Exhausted => "exhausted",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ReadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical file open for reading.
///
/// The sequence of lines is finite and not restartable; re-reading requires
/// opening the locator again.
pub struct ReadFile {
    locator: Locator,
    key: Bytes,
    consumer: Option<Box<dyn PartitionConsumer>>,
    state: ReadState,
}

impl fmt::Debug for ReadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadFile")
            .field("locator", &self.locator)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ReadFile {
    /// Parses `locator` and binds a consumer at its start offset.
    ///
    /// # Errors
    ///
    /// Returns `Locator` if the string does not parse, `NotFound` if the
    /// start offset is no longer retained, and `Read` for other transport
    /// failures.
    pub async fn open(transport: &dyn LogTransport, locator: &str) -> FileResult<Self> {
        let locator = Locator::parse(locator)?;
        Self::open_locator(transport, locator).await
    }

    /// Binds a consumer for an already parsed locator.
    ///
    /// The empty locator binds nothing and is exhausted from the start.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open), minus parsing.
    pub async fn open_locator(transport: &dyn LogTransport, locator: Locator) -> FileResult<Self> {
        let key = Bytes::copy_from_slice(locator.name().as_bytes());
        if locator.is_empty() {
            debug!(locator = %locator, "Opened empty file");
            return Ok(Self {
                locator,
                key,
                consumer: None,
                state: ReadState::Exhausted,
            });
        }

        let consumer = transport
            .consume_partition(locator.topic(), locator.partition(), locator.start())
            .await
            .map_err(|err| {
                if err.is_offset_out_of_range() {
                    FileError::NotFound {
                        topic: locator.topic().to_string(),
                        partition: locator.partition(),
                        offset: locator.start(),
                    }
                } else {
                    FileError::Read(err)
                }
            })?;

        info!(
            topic = locator.topic(),
            name = locator.name(),
            partition = locator.partition().get(),
            start = locator.start().get(),
            end = locator.end().get(),
            "Opened file for reading"
        );
        Ok(Self {
            locator,
            key,
            consumer: Some(consumer),
            state: ReadState::Open,
        })
    }

    /// The locator this file was opened from.
    #[must_use]
    pub const fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ReadState {
        self.state
    }

    /// Returns the next line of the file, or `None` at the end.
    ///
    /// Blocks until the transport delivers the next record; there is no
    /// read timeout.
    ///
    /// # Errors
    ///
    /// Returns `Read` if the transport fails. The file is closed and every
    /// later call returns `None`.
    pub async fn next_line(&mut self) -> FileResult<Option<Bytes>> {
        let end = self.locator.end();
        loop {
            if self.state != ReadState::Open {
                return Ok(None);
            }
            let Some(consumer) = self.consumer.as_mut() else {
                self.finish(ReadState::Exhausted);
                return Ok(None);
            };

            let record = match consumer.next_record().await {
                Some(Ok(record)) => record,
                Some(Err(err)) => {
                    warn!(locator = %self.locator, error = %err, "Read failed");
                    self.finish(ReadState::Closed);
                    return Err(FileError::Read(err));
                }
                None => {
                    self.finish(ReadState::Closed);
                    return Ok(None);
                }
            };

            let last = record.offset >= end;
            if last {
                debug!(locator = %self.locator, offset = record.offset.get(), "File exhausted");
                self.finish(ReadState::Exhausted);
            }
            if record.offset <= end && record.key == self.key {
                return Ok(Some(record.value));
            }
            if last {
                return Ok(None);
            }
        }
    }

    /// Reads every remaining line.
    ///
    /// # Errors
    ///
    /// Returns the first read error; lines read so far are discarded.
    pub async fn read_lines(&mut self) -> FileResult<Vec<Bytes>> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line().await? {
            lines.push(line);
        }
        Ok(lines)
    }

    /// Reads every remaining line and concatenates them in order.
    ///
    /// # Errors
    ///
    /// Returns the first read error; the partial buffer is discarded.
    pub async fn read_all(&mut self) -> FileResult<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(line) = self.next_line().await? {
            buf.extend_from_slice(&line);
        }
        Ok(buf.freeze())
    }

    /// Turns the file into a stream of its remaining lines.
    ///
    /// A read error is yielded once and ends the stream.
    #[must_use]
    pub fn into_stream(self) -> Lines {
        stream::unfold(self, |mut file| async move {
            match file.next_line().await {
                Ok(Some(line)) => Some((Ok(line), file)),
                Ok(None) => None,
                Err(err) => Some((Err(err), file)),
            }
        })
        .boxed()
    }

    /// Releases the consumer. Idempotent.
    pub fn close(&mut self) {
        if self.state == ReadState::Open {
            self.finish(ReadState::Closed);
        }
        debug!(locator = %self.locator, state = %self.state, "Closed reader");
    }

    fn finish(&mut self, state: ReadState) {
        if let Some(mut consumer) = self.consumer.take() {
            consumer.close();
        }
        self.state = state;
    }
}

impl Drop for ReadFile {
    fn drop(&mut self) {
        if let Some(mut consumer) = self.consumer.take() {
            consumer.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;
    use kfile_core::{Offset, Partition, TopicSpec};
    use kfile_transport::{LogFaultConfig, SimulatedLog};

    use super::*;

    const TOPIC: &str = "files";

    /// One-partition log with `(key, value)` records appended in order.
    async fn log_with(records: &[(&str, &str)]) -> SimulatedLog {
        let log = SimulatedLog::new(9);
        log.create_topic(TOPIC, &TopicSpec::new().with_num_partitions(1))
            .await
            .expect("create");
        for (key, value) in records {
            log.append_direct(TOPIC, Partition::new(0), key.to_string(), value.to_string())
                .expect("append");
        }
        log
    }

    fn locator(name: &str, start: i64, end: i64) -> Locator {
        Locator::new(TOPIC, name, Partition::new(0), Offset::new(start), Offset::new(end))
    }

    #[tokio::test]
    async fn test_filters_by_key() {
        let log = log_with(&[("a", "a0"), ("b", "b0"), ("a", "a1"), ("b", "b1"), ("a", "a2")]).await;

        let mut file = ReadFile::open_locator(&log, locator("a", 0, 4)).await.expect("open");
        let lines = file.read_lines().await.expect("read");
        assert_eq!(lines, vec!["a0", "a1", "a2"]);
        assert_eq!(file.state(), ReadState::Exhausted);

        let mut file = ReadFile::open_locator(&log, locator("b", 1, 3)).await.expect("open");
        assert_eq!(file.read_all().await.expect("read"), Bytes::from_static(b"b0b1"));
    }

    #[tokio::test]
    async fn test_end_is_inclusive() {
        let log = log_with(&[("a", "0"), ("a", "1"), ("a", "2"), ("a", "3")]).await;
        let mut file = ReadFile::open_locator(&log, locator("a", 1, 2)).await.expect("open");
        assert_eq!(file.next_line().await.expect("line"), Some(Bytes::from_static(b"1")));
        assert_eq!(file.next_line().await.expect("line"), Some(Bytes::from_static(b"2")));
        assert_eq!(file.next_line().await.expect("end"), None);
        assert_eq!(file.next_line().await.expect("still end"), None);
    }

    #[tokio::test]
    async fn test_foreign_record_at_end_terminates() {
        // The file's last record was at offset 1, another writer owns offset 2,
        // but the locator claims up to 2.
        let log = log_with(&[("a", "0"), ("a", "1"), ("b", "x"), ("a", "later")]).await;
        let mut file = ReadFile::open_locator(&log, locator("a", 0, 2)).await.expect("open");
        assert_eq!(file.read_lines().await.expect("read"), vec!["0", "1"]);
    }

    #[tokio::test]
    async fn test_non_utf8_key_never_matches() {
        let log = log_with(&[("a", "0")]).await;
        log.append_direct(TOPIC, Partition::new(0), Bytes::from_static(b"a\xff"), "x")
            .expect("append");
        log.append_direct(TOPIC, Partition::new(0), "a", "2").expect("append");

        let mut file = ReadFile::open_locator(&log, locator("a", 0, 2)).await.expect("open");
        assert_eq!(file.read_lines().await.expect("read"), vec!["0", "2"]);
    }

    #[tokio::test]
    async fn test_empty_locator_is_exhausted() {
        let log = SimulatedLog::new(9);
        let empty = Locator::empty("never-created", "nothing");
        let mut file = ReadFile::open(&log, &empty.format()).await.expect("open");
        assert_eq!(file.state(), ReadState::Exhausted);
        assert_eq!(file.read_all().await.expect("read"), Bytes::new());
    }

    #[tokio::test]
    async fn test_expired_start_is_not_found() {
        let log = log_with(&[("a", "0"), ("a", "1"), ("a", "2")]).await;
        log.truncate_before(TOPIC, Partition::new(0), Offset::new(2)).expect("truncate");

        let err = ReadFile::open_locator(&log, locator("a", 0, 2))
            .await
            .expect_err("expired");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_bad_locator_fails_to_open() {
        let log = SimulatedLog::new(9);
        let err = ReadFile::open(&log, "kfile://files?name=a&partition=0&start=0")
            .await
            .expect_err("missing end");
        assert!(matches!(err, FileError::Locator(ref e) if e.field() == Some("end")));
    }

    #[tokio::test]
    async fn test_read_error_terminates() {
        let log = log_with(&[("a", "0"), ("a", "1")]).await;
        let mut file = ReadFile::open_locator(&log, locator("a", 0, 1)).await.expect("open");
        log.fault_config().force_read_fail = true;

        assert!(matches!(file.read_all().await, Err(FileError::Read(_))));
        assert_eq!(file.state(), ReadState::Closed);
        assert_eq!(file.next_line().await.expect("closed"), None);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let log = log_with(&[("a", "0"), ("a", "1")]).await;
        let mut file = ReadFile::open_locator(&log, locator("a", 0, 1)).await.expect("open");
        file.close();
        file.close();
        assert_eq!(file.state(), ReadState::Closed);
        assert_eq!(file.next_line().await.expect("closed"), None);
    }

    #[tokio::test]
    async fn test_stream_matches_read_all() {
        let log = log_with(&[("a", "x"), ("b", "y"), ("a", "z")]).await;
        let file = ReadFile::open_locator(&log, locator("a", 0, 2)).await.expect("open");
        let lines: Vec<Bytes> = file.into_stream().try_collect().await.expect("stream");
        assert_eq!(lines, vec!["x", "z"]);

        let log = log_with(&[("a", "0")]).await;
        let file = ReadFile::open_locator(&log, locator("a", 0, 0)).await.expect("open");
        log.fault_config().force_read_fail = true;
        let results: Vec<_> = file.into_stream().collect().await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[tokio::test]
    async fn test_unknown_partition_is_read_error() {
        let log = SimulatedLog::with_faults(1, LogFaultConfig::none());
        log.create_topic(TOPIC, &TopicSpec::new().with_num_partitions(2))
            .await
            .expect("create");
        let err = ReadFile::open_locator(
            &log,
            Locator::new(TOPIC, "a", Partition::new(7), Offset::new(0), Offset::new(0)),
        )
        .await
        .expect_err("unknown partition");
        assert!(matches!(err, FileError::Read(_)));
    }
}
