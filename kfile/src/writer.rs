//! Write-mode files.
//!
//! A [`WriteFile`] appends records keyed by its name and tracks which offsets
//! the transport acknowledges. Acknowledgments arrive asynchronously, so the
//! file runs a drain task for its whole lifetime:
//!
//! ```text
//!   caller                       drain task
//!   ------                       ----------
//!   append ──send──> transport ──ack──> AckProgress (sole writer)
//!     │                                     │
//!     └─ enqueued (sole writer)             └─ watch::Sender
//!                                                │
//!   close <────────── watch::Receiver <──────────┘
//! ```
//!
//! The caller side only ever writes the enqueued count; the drain task only
//! ever writes the acknowledgment state and publishes it over a `watch`
//! channel. `close` waits on that channel, re-checking at a fixed tick, until
//! every enqueued record is resolved or the wait budget runs out.
//!
//! # Lifecycle
//!
//! `Open` → `Draining` (close requested) → `Closed` (locator returned) or
//! `Errored` (a record failed, or acknowledgments timed out).

use std::fmt;
use std::time::{Duration, Instant};

use bytes::Bytes;
use kfile_core::{Locator, OffsetRange, Partition, WriterConfig};
use kfile_transport::{Ack, AckReceiver, LogTransport, RecordSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{FileError, FileResult, WriteFailure};
use crate::provision::ensure_topic;

/// State of a write-mode file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    /// Accepting appends.
    Open,
    /// Close requested; waiting for acknowledgments.
    Draining,
    /// Finalized; the locator is immutable.
    Closed,
    /// A record failed or close timed out; no locator will be produced.
    Errored,
}

impl WriteState {
    /// Returns the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Draining => "draining",
            Self::Closed => "closed",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for WriteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -----------------------------------------------------------------------------
// Acknowledgment Progress
// -----------------------------------------------------------------------------

/// Acknowledgment state, owned by the drain task.
#[derive(Debug, Default)]
struct AckProgress {
    /// Acknowledgments received, successful or not.
    acked: u64,
    /// Partition of the first successful acknowledgment.
    partition: Option<Partition>,
    /// Offsets acknowledged so far. `None` until the first success.
    range: Option<OffsetRange>,
    /// Failed records, in arrival order.
    failures: Vec<WriteFailure>,
}

impl AckProgress {
    /// Applies one acknowledgment. Returns the failure it produced, if any.
    fn apply(&mut self, ack: Ack) -> Option<WriteFailure> {
        self.acked += 1;
        let (partition, offset) = match ack {
            Ack::Delivered { partition, offset } => (partition, offset),
            Ack::Failed(err) => {
                let failure = WriteFailure::Delivery(err);
                self.failures.push(failure.clone());
                return Some(failure);
            }
        };

        match self.partition {
            None => self.partition = Some(partition),
            Some(expected) if expected != partition => {
                let failure = WriteFailure::PartitionMismatch {
                    expected,
                    actual: partition,
                    offset,
                };
                self.failures.push(failure.clone());
                return Some(failure);
            }
            Some(_) => {}
        }

        match &mut self.range {
            Some(range) => range.include(offset),
            None => self.range = Some(OffsetRange::single(offset)),
        }
        None
    }
}

/// Drains the ack stream into `progress` until cancelled or the stream ends.
async fn drain_acks(
    mut acks: AckReceiver,
    progress: watch::Sender<AckProgress>,
    cancel: CancellationToken,
    name: String,
) {
    debug!(name = %name, "Ack drain started");
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            ack = acks.recv() => {
                let Some(ack) = ack else { break };
                let mut failure = None;
                progress.send_modify(|p| failure = p.apply(ack));
                if let Some(failure) = failure {
                    warn!(name = %name, error = %failure, "Record failed");
                }
            }
        }
    }
    debug!(name = %name, "Ack drain stopped");
}

// -----------------------------------------------------------------------------
// WriteFile
// -----------------------------------------------------------------------------

/// A logical file open for appending.
///
/// Dropping an unclosed file stops its drain task; records already enqueued
/// may still be written but no locator is produced.
pub struct WriteFile {
    topic: String,
    name: String,
    key: Bytes,
    config: WriterConfig,
    sender: Box<dyn RecordSender>,
    /// Records accepted by the sender. Written only by the caller side.
    enqueued: u64,
    /// Records the sender refused to enqueue.
    rejected: Vec<WriteFailure>,
    progress: watch::Receiver<AckProgress>,
    cancel: CancellationToken,
    drain: Option<JoinHandle<()>>,
    state: WriteState,
    locator: Option<Locator>,
}

impl fmt::Debug for WriteFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteFile")
            .field("topic", &self.topic)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("enqueued", &self.enqueued)
            .finish_non_exhaustive()
    }
}

impl WriteFile {
    /// Provisions `topic`, opens a producer, and starts the ack drain.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an empty name or invalid config, and
    /// `Provision` if the topic or producer cannot be set up.
    pub async fn open(
        transport: &dyn LogTransport,
        topic: &str,
        name: &str,
        config: WriterConfig,
    ) -> FileResult<Self> {
        if name.is_empty() {
            return Err(FileError::InvalidConfig {
                message: "file name must not be empty".to_string(),
            });
        }
        config
            .validate()
            .map_err(|(field, reason)| FileError::InvalidConfig {
                message: format!("{field} {reason}"),
            })?;

        ensure_topic(transport, topic, &config.topic).await?;
        let handle = transport
            .open_producer(topic)
            .await
            .map_err(|source| FileError::Provision {
                topic: topic.to_string(),
                source,
            })?;

        let (progress_tx, progress_rx) = watch::channel(AckProgress::default());
        let cancel = CancellationToken::new();
        let drain = tokio::spawn(drain_acks(
            handle.acks,
            progress_tx,
            cancel.clone(),
            name.to_string(),
        ));

        info!(topic, name, "Opened file for writing");
        Ok(Self {
            topic: topic.to_string(),
            name: name.to_string(),
            key: Bytes::copy_from_slice(name.as_bytes()),
            config,
            sender: handle.sender,
            enqueued: 0,
            rejected: Vec::new(),
            progress: progress_rx,
            cancel,
            drain: Some(drain),
            state: WriteState::Open,
            locator: None,
        })
    }

    /// Topic the file is written to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// File name; its bytes key every record.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> WriteState {
        self.state
    }

    /// Records enqueued but not yet acknowledged.
    #[must_use]
    pub fn pending(&self) -> u64 {
        self.enqueued.saturating_sub(self.progress.borrow().acked)
    }

    /// Enqueues each line as one record.
    ///
    /// Waits only while the transport's outbound queue is full, never for
    /// acknowledgments.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the file is open, and `Send` if the
    /// transport refuses a record. Lines before the refused one stay
    /// enqueued; the refusal is also reported again by `close`.
    pub async fn append<I, L>(&mut self, lines: I) -> FileResult<()>
    where
        I: IntoIterator<Item = L>,
        L: Into<Bytes>,
    {
        self.require(WriteState::Open)?;
        for line in lines {
            if let Err(err) = self.sender.send(self.key.clone(), line.into()).await {
                warn!(name = %self.name, error = %err, "Record rejected");
                self.rejected.push(WriteFailure::Delivery(err.clone()));
                return Err(FileError::Send(err));
            }
            self.enqueued += 1;
        }
        Ok(())
    }

    /// Enqueues a single record.
    ///
    /// # Errors
    ///
    /// Same as [`append`](Self::append).
    pub async fn append_line(&mut self, line: impl Into<Bytes>) -> FileResult<()> {
        self.append(std::iter::once(line)).await
    }

    /// Locator of what has been acknowledged so far, without finalizing.
    ///
    /// Before the first acknowledgment this is the empty locator.
    #[must_use]
    pub fn locator_snapshot(&self) -> Locator {
        if let Some(locator) = &self.locator {
            return locator.clone();
        }
        let progress = self.progress.borrow();
        match progress.range {
            Some(range) => Locator::from_range(
                self.topic.as_str(),
                self.name.as_str(),
                progress.partition.unwrap_or_default(),
                range,
            ),
            None => Locator::empty(self.topic.as_str(), self.name.as_str()),
        }
    }

    /// Waits for every enqueued record to be acknowledged and returns the
    /// file's locator.
    ///
    /// `max_wait` bounds the wait; `None` or a zero duration waits
    /// indefinitely. Finalization is all-or-nothing: if any record failed,
    /// the error lists every failure and no locator is produced. A file that
    /// was closed already returns the same locator again.
    ///
    /// # Errors
    ///
    /// - `Delivery` if any record failed
    /// - `AckTimeout` if acknowledgments are still pending after `max_wait`
    /// - `InvalidState` if the file is errored
    pub async fn close(&mut self, max_wait: Option<Duration>) -> FileResult<Locator> {
        match self.state {
            WriteState::Closed => {
                if let Some(locator) = &self.locator {
                    return Ok(locator.clone());
                }
            }
            WriteState::Errored => {
                return Err(FileError::InvalidState {
                    current: self.state.as_str(),
                    required: WriteState::Open.as_str(),
                })
            }
            WriteState::Open | WriteState::Draining => {}
        }
        self.state = WriteState::Draining;
        debug!(name = %self.name, pending = self.pending(), "Closing file");

        // Fail fast on what is already known.
        if let Some(err) = self.failure_error() {
            return Err(self.fail(err));
        }

        let started = Instant::now();
        let resolved = match max_wait.filter(|wait| !wait.is_zero()) {
            Some(budget) => tokio::time::timeout(budget, self.wait_for_acks())
                .await
                .unwrap_or(false),
            None => self.wait_for_acks().await,
        };

        // Failures may have arrived while waiting.
        if let Some(err) = self.failure_error() {
            return Err(self.fail(err));
        }
        if !resolved {
            let err = FileError::AckTimeout {
                pending: self.pending(),
                waited: started.elapsed(),
            };
            return Err(self.fail(err));
        }

        self.cancel.cancel();
        if let Some(drain) = self.drain.take() {
            if let Err(err) = drain.await {
                warn!(name = %self.name, error = %err, "Ack drain task failed");
            }
        }
        if let Err(err) = self.sender.close().await {
            return Err(self.fail(FileError::Send(err)));
        }

        let locator = self.locator_snapshot();
        self.locator = Some(locator.clone());
        self.state = WriteState::Closed;
        info!(
            name = %self.name,
            records = self.enqueued,
            locator = %locator,
            "Closed file"
        );
        Ok(locator)
    }

    /// Waits until nothing is pending, re-checking at least every poll tick.
    ///
    /// Returns false if the ack stream ended with records still pending.
    async fn wait_for_acks(&mut self) -> bool {
        let mut tick = tokio::time::interval(self.config.ack_poll_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            if self.pending() == 0 {
                return true;
            }
            tokio::select! {
                changed = self.progress.changed() => {
                    if changed.is_err() {
                        // Drain task is gone; nothing more will arrive.
                        return self.pending() == 0;
                    }
                }
                _ = tick.tick() => {}
            }
        }
    }

    /// Builds the error for every failure recorded so far, if any.
    fn failure_error(&self) -> Option<FileError> {
        let progress = self.progress.borrow();
        if self.rejected.is_empty() && progress.failures.is_empty() {
            return None;
        }
        let failures = self
            .rejected
            .iter()
            .chain(progress.failures.iter())
            .cloned()
            .collect();
        Some(FileError::Delivery { failures })
    }

    /// Moves the file to `Errored` and stops the drain.
    fn fail(&mut self, err: FileError) -> FileError {
        warn!(name = %self.name, error = %err, "File errored");
        self.state = WriteState::Errored;
        self.cancel.cancel();
        err
    }

    fn require(&self, required: WriteState) -> FileResult<()> {
        if self.state == required {
            Ok(())
        } else {
            Err(FileError::InvalidState {
                current: self.state.as_str(),
                required: required.as_str(),
            })
        }
    }
}

impl Drop for WriteFile {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
