use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl $name {
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(v: i64) -> Self {
                Self(v)
            }
        }
    };
}

id_newtype!(AccountId);
id_newtype!(ChannelId);
id_newtype!(GroupId);
id_newtype!(RawMessageId);
id_newtype!(ItemId);
id_newtype!(ClusterId);
id_newtype!(DecisionId);
id_newtype!(NotificationId);
id_newtype!(IngestErrorId);
id_newtype!(PollJobId);
id_newtype!(AccountPauseId);

/// Correlation id threaded through a single poll job's fetch/normalize/dedupe
/// pass, so every decision and ingest-error row it produces can be grouped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalizes a naive (offset-less) timestamp to UTC.
///
/// Timestamps read back from the store or from upstream payloads sometimes
/// arrive without an explicit offset; this is the single place that
/// assumption ("naive means UTC") is made explicit.
pub fn normalize_naive_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(naive, Utc)
}

/// Parses an RFC3339 timestamp, normalizing naive fallback parses to UTC.
pub fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_newtype_roundtrips_through_display() {
        let id = ChannelId(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(id.as_i64(), 42);
    }

    #[test]
    fn correlation_id_is_unique_per_call() {
        let a = CorrelationId::new();
        let b = CorrelationId::new();
        assert_ne!(a, b);
    }
}
