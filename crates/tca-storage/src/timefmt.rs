use chrono::{DateTime, Utc};
use rusqlite::Result as SqlResult;

/// Encodes a timestamp the way every table in this crate stores one: RFC3339
/// with a UTC offset, so lexicographic `TEXT` ordering matches chronological
/// ordering.
pub fn encode(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub fn encode_opt(dt: Option<DateTime<Utc>>) -> Option<String> {
    dt.map(encode)
}

pub fn decode(s: &str) -> SqlResult<DateTime<Utc>> {
    tca_core::types::parse_rfc3339(s)
        .map_err(|e| rusqlite::Error::InvalidColumnType(0, e.to_string(), rusqlite::types::Type::Text))
}

pub fn decode_opt(s: Option<String>) -> SqlResult<Option<DateTime<Utc>>> {
    s.map(|s| decode(&s)).transpose()
}
