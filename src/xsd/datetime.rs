//! Lenient `xsd:dateTime` codec.
//!
//! # Responsibilities
//! - Parse the timestamp spellings real OPC XML-DA servers put on the wire
//! - Remember whether the wire text carried an explicit zone
//! - Collapse the zero date-time (0001-01-01T00:00:00Z) to "absent"
//! - Format non-zero values with an explicit zone designator
//!
//! # Wire grammar
//! ```text
//! date 'T' time [zone]     zone explicit iff the time part has Z, + or -
//! ```
//! A missing zone is read as UTC. Text without a `T` is classified as
//! explicit iff it has a `Z` or a `':'`, then must still be a full RFC 3339
//! timestamp, so date-only and time-only text is rejected. The `':'` rule
//! also fires for plain times such as `10:30:00`; it is kept for wire
//! compatibility.

use std::borrow::Cow;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use thiserror::Error;

/// Malformed timestamp text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid xsd dateTime {input:?}: {reason}")]
pub struct CodecError {
    /// The offending wire text, as received.
    pub input: String,
    /// Why it was rejected.
    pub reason: String,
}

impl CodecError {
    fn new(input: &str, reason: impl ToString) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A wire timestamp: an optional instant plus the "had explicit zone" flag.
///
/// The zero value (no instant) means the field is absent on the wire.
/// Equality compares instants only; the zone flag is wire metadata.
#[derive(Debug, Clone, Copy)]
pub struct XsdDateTime {
    instant: Option<DateTime<FixedOffset>>,
    explicit_zone: bool,
}

impl XsdDateTime {
    /// The absent timestamp.
    pub const ZERO: Self = Self {
        instant: None,
        explicit_zone: true,
    };

    /// Parse wire text. Empty text is the zero value, not an error.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        if text.is_empty() {
            return Ok(Self::ZERO);
        }

        let explicit_zone = match text.split_once('T') {
            Some((_, time)) => time.contains(['Z', '+', '-']),
            None => text.contains(['Z', ':']),
        };
        let normalized = with_utc_suffix(text, explicit_zone);
        let parsed =
            DateTime::parse_from_rfc3339(&normalized).map_err(|e| CodecError::new(text, e))?;
        Ok(Self::from_parts(parsed, explicit_zone))
    }

    /// Wrap an instant that already carries its offset.
    pub fn from_datetime(instant: DateTime<FixedOffset>) -> Self {
        Self::from_parts(instant, true)
    }

    fn from_parts(instant: DateTime<FixedOffset>, explicit_zone: bool) -> Self {
        if Some(instant.naive_utc()) == zero_sentinel() {
            return Self::ZERO;
        }
        Self {
            instant: Some(instant),
            explicit_zone,
        }
    }

    /// Wire text for this value; `None` means omit the field.
    pub fn format(&self) -> Option<String> {
        self.instant
            .map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn instant(&self) -> Option<DateTime<FixedOffset>> {
        self.instant
    }

    pub fn is_zero(&self) -> bool {
        self.instant.is_none()
    }

    pub fn has_explicit_zone(&self) -> bool {
        self.explicit_zone
    }
}

impl Default for XsdDateTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialEq for XsdDateTime {
    fn eq(&self, other: &Self) -> bool {
        self.instant == other.instant
    }
}

impl Eq for XsdDateTime {}

impl From<DateTime<Utc>> for XsdDateTime {
    fn from(instant: DateTime<Utc>) -> Self {
        Self::from_datetime(instant.fixed_offset())
    }
}

fn with_utc_suffix(text: &str, explicit_zone: bool) -> Cow<'_, str> {
    if explicit_zone {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(format!("{text}Z"))
    }
}

fn zero_sentinel() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1, 1, 1).map(|date| date.and_time(NaiveTime::MIN))
}
