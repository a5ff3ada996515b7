//! Locator codec.
//!
//! A locator is the stable, self-describing address of a finished file:
//!
//! ```text
//! kfile://<topic>?name=<name>&partition=<p>&start=<s>&end=<e>
//! ```
//!
//! All four query parameters are mandatory when parsing and always emitted
//! when formatting. `partition` is a 32-bit signed integer, `start` and `end`
//! are 64-bit signed integers. The name is form-urlencoded.
//!
//! A file closed without any records gets the *empty* locator, whose range
//! is `start=0&end=-1`; readers treat it as an already exhausted file.

use std::fmt;
use std::str::FromStr;

use url::form_urlencoded;
use url::Url;

use crate::config::validate_topic_name;
use crate::error::{LocatorError, LocatorResult};
use crate::types::{Offset, OffsetRange, Partition};

/// URL scheme of every locator.
pub const SCHEME: &str = "kfile";

/// Immutable address of a logical file's record range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    topic: String,
    name: String,
    partition: Partition,
    start: Offset,
    end: Offset,
}

impl Locator {
    /// Creates a locator from its five fields.
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        name: impl Into<String>,
        partition: Partition,
        start: Offset,
        end: Offset,
    ) -> Self {
        Self {
            topic: topic.into(),
            name: name.into(),
            partition,
            start,
            end,
        }
    }

    /// Creates a locator covering an acknowledged offset range.
    #[must_use]
    pub fn from_range(
        topic: impl Into<String>,
        name: impl Into<String>,
        partition: Partition,
        range: OffsetRange,
    ) -> Self {
        Self::new(topic, name, partition, range.start(), range.end())
    }

    /// Creates the locator of a file that holds no records.
    #[must_use]
    pub fn empty(topic: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(topic, name, Partition::new(0), Offset::new(0), Offset::new(-1))
    }

    /// Topic the file lives in.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// File name; its UTF-8 bytes are the record key.
    ///
    /// Names are kept as `String` so locators stay printable URIs. A record
    /// whose key is not valid UTF-8 cannot belong to any file.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Partition the whole file is bound to.
    #[must_use]
    pub const fn partition(&self) -> Partition {
        self.partition
    }

    /// First offset of the file (inclusive).
    #[must_use]
    pub const fn start(&self) -> Offset {
        self.start
    }

    /// Last offset of the file (inclusive).
    #[must_use]
    pub const fn end(&self) -> Offset {
        self.end
    }

    /// Returns true if the locator covers no offsets at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Formats the locator string. Always succeeds.
    #[must_use]
    pub fn format(&self) -> String {
        let name: String = form_urlencoded::byte_serialize(self.name.as_bytes()).collect();
        format!(
            "{SCHEME}://{}?name={name}&partition={}&start={}&end={}",
            self.topic, self.partition, self.start, self.end
        )
    }

    /// Parses a locator string.
    ///
    /// # Errors
    /// Returns `LocatorError` naming the missing or malformed field.
    pub fn parse(locator: &str) -> LocatorResult<Self> {
        let url = Url::parse(locator).map_err(|source| LocatorError::Malformed {
            locator: locator.to_string(),
            source,
        })?;

        if url.scheme() != SCHEME {
            return Err(LocatorError::UnsupportedScheme {
                scheme: url.scheme().to_string(),
                expected: SCHEME,
            });
        }

        let topic = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => {
                return Err(LocatorError::MissingField {
                    field: "topic",
                    locator: locator.to_string(),
                })
            }
        };
        validate_topic_name(&topic)?;

        let query = Query { url: &url, locator };
        let name = query.required("name")?;
        let partition = query.number::<i32>("partition")?;
        let start = query.number::<i64>("start")?;
        let end = query.number::<i64>("end")?;

        Ok(Self {
            topic,
            name,
            partition: Partition::new(partition),
            start: Offset::new(start),
            end: Offset::new(end),
        })
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl FromStr for Locator {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Field lookup over a parsed locator query. The first occurrence wins.
struct Query<'a> {
    url: &'a Url,
    locator: &'a str,
}

impl Query<'_> {
    fn required(&self, field: &'static str) -> LocatorResult<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == field)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| LocatorError::MissingField {
                field,
                locator: self.locator.to_string(),
            })
    }

    fn number<T>(&self, field: &'static str) -> LocatorResult<T>
    where
        T: FromStr<Err = std::num::ParseIntError>,
    {
        let value = self.required(field)?;
        value
            .parse::<T>()
            .map_err(|source| LocatorError::InvalidField {
                field,
                value,
                source,
            })
    }
}
