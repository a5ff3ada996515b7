//! Topic provisioning and writer configuration.
//!
//! Provisioning parameters only take effect the first time a topic is
//! created. Re-using a topic with a different `TopicSpec` is not an error;
//! the existing topic keeps its original shape.

use std::time::Duration;

use crate::error::{LocatorError, LocatorResult};

/// Maximum length of a topic name.
pub const TOPIC_NAME_LEN_MAX: usize = 249;

/// Configuration key for topic retention.
const RETENTION_MS_KEY: &str = "retention.ms";

/// How a backing topic is created if it does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicSpec {
    /// Number of partitions.
    ///
    /// Default: 6.
    pub num_partitions: i32,

    /// Replication factor.
    ///
    /// Default: 1.
    pub replication_factor: i16,

    /// Retention override. `None` keeps the broker default.
    ///
    /// Default: `None`.
    pub retention: Option<Duration>,
}

impl Default for TopicSpec {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicSpec {
    /// Creates a spec with the documented defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            num_partitions: 6,
            replication_factor: 1,
            retention: None,
        }
    }

    /// Sets the partition count.
    #[must_use]
    pub const fn with_num_partitions(mut self, num_partitions: i32) -> Self {
        self.num_partitions = num_partitions;
        self
    }

    /// Sets the replication factor.
    #[must_use]
    pub const fn with_replication_factor(mut self, replication_factor: i16) -> Self {
        self.replication_factor = replication_factor;
        self
    }

    /// Sets the retention duration.
    #[must_use]
    pub const fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    /// Returns the topic configuration entries to apply at creation.
    #[must_use]
    pub fn config_entries(&self) -> Vec<(String, String)> {
        self.retention
            .map(|retention| {
                vec![(
                    RETENTION_MS_KEY.to_string(),
                    retention.as_millis().to_string(),
                )]
            })
            .unwrap_or_default()
    }

    /// Validates the topic settings.
    ///
    /// # Errors
    /// Returns the name of the offending field and why it was rejected.
    pub const fn validate(&self) -> Result<(), (&'static str, &'static str)> {
        if self.num_partitions <= 0 {
            return Err(("num_partitions", "must be positive"));
        }
        if self.replication_factor <= 0 {
            return Err(("replication_factor", "must be positive"));
        }
        if let Some(retention) = self.retention {
            if retention.is_zero() {
                return Err(("retention", "must be non-zero when set"));
            }
        }
        Ok(())
    }
}

/// Configuration for a write-mode file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    /// How to create the backing topic if it is missing.
    pub topic: TopicSpec,

    /// Tick at which `close` re-checks outstanding acknowledgments.
    ///
    /// Default: 100ms.
    pub ack_poll_interval: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl WriterConfig {
    /// Creates a config with the documented defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            topic: TopicSpec::new(),
            ack_poll_interval: Duration::from_millis(100),
        }
    }

    /// Sets the topic spec.
    #[must_use]
    pub const fn with_topic(mut self, topic: TopicSpec) -> Self {
        self.topic = topic;
        self
    }

    /// Sets the close poll interval.
    #[must_use]
    pub const fn with_ack_poll_interval(mut self, interval: Duration) -> Self {
        self.ack_poll_interval = interval;
        self
    }

    /// Validates the config.
    ///
    /// # Errors
    /// Returns the name of the offending field and why it was rejected.
    pub const fn validate(&self) -> Result<(), (&'static str, &'static str)> {
        if self.ack_poll_interval.is_zero() {
            return Err(("ack_poll_interval", "must be positive"));
        }
        self.topic.validate()
    }
}

/// Checks that `topic` is a legal log topic name.
///
/// Legal names are 1 to 249 characters of `[A-Za-z0-9._-]`, excluding `.`
/// and `..`. Every legal name survives a locator round trip unchanged.
///
/// # Errors
/// Returns `LocatorError::InvalidTopic` describing the violation.
pub fn validate_topic_name(topic: &str) -> LocatorResult<()> {
    let reject = |reason| {
        Err(LocatorError::InvalidTopic {
            topic: topic.to_string(),
            reason,
        })
    };

    if topic.is_empty() {
        return reject("must not be empty");
    }
    if topic.len() > TOPIC_NAME_LEN_MAX {
        return reject("longer than 249 characters");
    }
    if topic == "." || topic == ".." {
        return reject("'.' and '..' are reserved");
    }
    if !topic
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
    {
        return reject("only [A-Za-z0-9._-] allowed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_topic_spec() {
        let spec = TopicSpec::default();
        assert_eq!(spec.num_partitions, 6);
        assert_eq!(spec.replication_factor, 1);
        assert_eq!(spec.retention, None);
        assert!(spec.validate().is_ok());
        assert!(spec.config_entries().is_empty());
    }

    #[test]
    fn test_retention_entry_in_millis() {
        let spec = TopicSpec::new().with_retention(Duration::from_secs(24 * 3600));
        assert_eq!(
            spec.config_entries(),
            vec![("retention.ms".to_string(), "86400000".to_string())]
        );
    }

    #[test]
    fn test_invalid_topic_spec() {
        assert_eq!(
            TopicSpec::new().with_num_partitions(0).validate(),
            Err(("num_partitions", "must be positive"))
        );
        assert!(TopicSpec::new().with_replication_factor(-1).validate().is_err());
        assert!(TopicSpec::new()
            .with_retention(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_writer_config_validation() {
        assert!(WriterConfig::default().validate().is_ok());
        let config = WriterConfig::new().with_ack_poll_interval(Duration::ZERO);
        assert_eq!(
            config.validate(),
            Err(("ack_poll_interval", "must be positive"))
        );
    }

    #[test]
    fn test_topic_names() {
        assert!(validate_topic_name("kfile.default").is_ok());
        assert!(validate_topic_name("Logs_2024-01").is_ok());
        assert!(validate_topic_name("").is_err());
        assert!(validate_topic_name("..").is_err());
        assert!(validate_topic_name("a/b").is_err());
        assert!(validate_topic_name("with space").is_err());
        assert!(validate_topic_name(&"x".repeat(TOPIC_NAME_LEN_MAX)).is_ok());
        assert!(validate_topic_name(&"x".repeat(TOPIC_NAME_LEN_MAX + 1)).is_err());
    }
}
