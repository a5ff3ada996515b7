//! Topic provisioning.
//!
//! Files live in shared topics that must exist before the first write.
//! [`ensure_topic`] is idempotent: an existing topic is left untouched, and
//! losing a creation race to another writer counts as success.

use kfile_core::{validate_topic_name, TopicSpec};
use kfile_transport::LogTransport;
use tracing::{debug, info};

use crate::error::{FileError, FileResult};

/// Ensures `topic` exists, creating it from `spec` if it does not.
///
/// `spec` only applies when the topic is created here. Calling this again
/// with different parameters against an existing topic is a no-op.
///
/// # Errors
///
/// Returns `InvalidConfig` if the topic name or spec is invalid, and
/// `Provision` for any administrative failure other than "already exists".
pub async fn ensure_topic(
    transport: &dyn LogTransport,
    topic: &str,
    spec: &TopicSpec,
) -> FileResult<()> {
    validate_topic_name(topic).map_err(|err| FileError::InvalidConfig {
        message: err.to_string(),
    })?;
    spec.validate()
        .map_err(|(field, reason)| FileError::InvalidConfig {
            message: format!("{field} {reason}"),
        })?;

    let existing = transport
        .describe_topic(topic)
        .await
        .map_err(|source| FileError::Provision {
            topic: topic.to_string(),
            source,
        })?;
    if let Some(metadata) = existing {
        debug!(
            topic,
            partitions = metadata.num_partitions,
            replication_factor = metadata.replication_factor,
            "Topic already present"
        );
        return Ok(());
    }

    match transport.create_topic(topic, spec).await {
        Ok(()) => {
            info!(
                topic,
                partitions = spec.num_partitions,
                replication_factor = spec.replication_factor,
                retention = ?spec.retention,
                "Created topic"
            );
            Ok(())
        }
        Err(err) if err.is_already_exists() => {
            debug!(topic, "Topic created concurrently");
            Ok(())
        }
        Err(source) => Err(FileError::Provision {
            topic: topic.to_string(),
            source,
        }),
    }
}
