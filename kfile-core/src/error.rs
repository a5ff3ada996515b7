//! Locator error types.
//!
//! Locator errors are surfaced immediately to the caller of
//! [`Locator::parse`](crate::Locator::parse); they are never retried.

use std::num::ParseIntError;

use thiserror::Error;

/// Result type for locator operations.
pub type LocatorResult<T> = Result<T, LocatorError>;

/// A locator string was malformed or incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocatorError {
    /// The string is not a URL at all.
    #[error("malformed locator '{locator}': {source}")]
    Malformed {
        /// The offending locator string.
        locator: String,
        /// Parser failure.
        source: url::ParseError,
    },

    /// The URL scheme is not the kfile scheme.
    #[error("unsupported locator scheme '{scheme}', expected '{expected}'")]
    UnsupportedScheme {
        /// The scheme that was found.
        scheme: String,
        /// The scheme that was expected.
        expected: &'static str,
    },

    /// A required field is absent.
    #[error("{field} is required: {locator}")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
        /// The offending locator string.
        locator: String,
    },

    /// A numeric field did not parse at its required width.
    #[error("invalid {field} '{value}': {source}")]
    InvalidField {
        /// Name of the field.
        field: &'static str,
        /// The raw value.
        value: String,
        /// Integer parse failure.
        source: ParseIntError,
    },

    /// The topic is not a legal topic name.
    #[error("invalid topic '{topic}': {reason}")]
    InvalidTopic {
        /// The offending topic.
        topic: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl LocatorError {
    /// Returns the name of the field this error is about, if any.
    #[must_use]
    pub const fn field(&self) -> Option<&'static str> {
        match self {
            Self::MissingField { field, .. } | Self::InvalidField { field, .. } => Some(field),
            Self::InvalidTopic { .. } => Some("topic"),
            Self::Malformed { .. } | Self::UnsupportedScheme { .. } => None,
        }
    }
}
