use tca_core::config::SettingValue;
use tca_core::types::GroupId;

use crate::error::Result;
use crate::repo::{group, setting};

/// Seeded dynamic-settings defaults (§6). Every key here is inserted
/// on first boot and backfilled on later boots if somehow missing; reads
/// that still find nothing after seeding are a storage bug, not a user
/// error, so [`resolve_int`]/[`resolve_float`] fall back to these same
/// constants rather than erroring.
pub const SCHEDULER_DEFAULT_POLL_INTERVAL_SECONDS: i64 = 300;
pub const SCHEDULER_JITTER_RATIO: f64 = 0.20;
pub const SCHEDULER_MAX_PAGES_PER_POLL: i64 = 10;
pub const SCHEDULER_MAX_MESSAGES_PER_POLL: i64 = 200;
pub const DEDUPE_DEFAULT_HORIZON_MINUTES: i64 = 10_080; // 7 days
pub const DEDUPE_TITLE_SIMILARITY_THRESHOLD: f64 = 0.92;
pub const RETENTION_RAW_MESSAGES_DAYS: i64 = 30;
pub const RETENTION_ITEMS_DAYS: i64 = 365;
pub const RETENTION_INGEST_ERRORS_DAYS: i64 = 90;
pub const BACKUP_RETAIN_COUNT: i64 = 14;

pub fn seeded_defaults() -> Vec<(&'static str, SettingValue)> {
    vec![
        (
            "scheduler.default_poll_interval_seconds",
            SettingValue::Int(SCHEDULER_DEFAULT_POLL_INTERVAL_SECONDS),
        ),
        ("scheduler.jitter_ratio", SettingValue::Float(SCHEDULER_JITTER_RATIO)),
        (
            "scheduler.max_pages_per_poll",
            SettingValue::Int(SCHEDULER_MAX_PAGES_PER_POLL),
        ),
        (
            "scheduler.max_messages_per_poll",
            SettingValue::Int(SCHEDULER_MAX_MESSAGES_PER_POLL),
        ),
        (
            "dedupe.default_horizon_minutes",
            SettingValue::Int(DEDUPE_DEFAULT_HORIZON_MINUTES),
        ),
        (
            "dedupe.title_similarity_threshold",
            SettingValue::Float(DEDUPE_TITLE_SIMILARITY_THRESHOLD),
        ),
        (
            "retention.raw_messages_days",
            SettingValue::Int(RETENTION_RAW_MESSAGES_DAYS),
        ),
        ("retention.items_days", SettingValue::Int(RETENTION_ITEMS_DAYS)),
        (
            "retention.ingest_errors_days",
            SettingValue::Int(RETENTION_INGEST_ERRORS_DAYS),
        ),
        ("backup.retain_count", SettingValue::Int(BACKUP_RETAIN_COUNT)),
    ]
}

/// Inserts every seeded default that's missing, touching nothing that
/// already exists (§3: "missing seeded keys are backfilled without
/// touching existing rows").
pub fn seed_defaults(tx: &rusqlite::Transaction<'_>, now: chrono::DateTime<chrono::Utc>) -> Result<usize> {
    let mut inserted = 0;
    for (key, value) in seeded_defaults() {
        if setting::seed_if_absent(tx, key, &value, now)? {
            inserted += 1;
        }
    }
    Ok(inserted)
}

fn int_or_default(v: Option<SettingValue>, key: &str, default: i64) -> Result<i64> {
    match v {
        Some(value) => value.as_int(key).map_err(Into::into),
        None => Ok(default),
    }
}

fn float_or_default(v: Option<SettingValue>, key: &str, default: f64) -> Result<f64> {
    match v {
        Some(value) => value.as_float(key).map_err(Into::into),
        None => Ok(default),
    }
}

pub fn resolve_poll_interval_seconds(conn: &rusqlite::Connection) -> Result<i64> {
    int_or_default(
        setting::get(conn, "scheduler.default_poll_interval_seconds")?,
        "scheduler.default_poll_interval_seconds",
        SCHEDULER_DEFAULT_POLL_INTERVAL_SECONDS,
    )
}

pub fn resolve_jitter_ratio(conn: &rusqlite::Connection) -> Result<f64> {
    float_or_default(
        setting::get(conn, "scheduler.jitter_ratio")?,
        "scheduler.jitter_ratio",
        SCHEDULER_JITTER_RATIO,
    )
}

/// Dedupe horizon precedence: per-group override → global dynamic setting
/// → seeded default (§4.3).
pub fn resolve_dedupe_horizon_minutes(conn: &rusqlite::Connection, group_id: Option<GroupId>) -> Result<i64> {
    if let Some(gid) = group_id {
        if let Ok(g) = group::get(conn, gid) {
            if let Some(minutes) = g.dedupe_horizon_minutes_override {
                return Ok(minutes);
            }
        }
    }
    int_or_default(
        setting::get(conn, "dedupe.default_horizon_minutes")?,
        "dedupe.default_horizon_minutes",
        DEDUPE_DEFAULT_HORIZON_MINUTES,
    )
}

pub fn resolve_title_similarity_threshold(conn: &rusqlite::Connection) -> Result<f64> {
    float_or_default(
        setting::get(conn, "dedupe.title_similarity_threshold")?,
        "dedupe.title_similarity_threshold",
        DEDUPE_TITLE_SIMILARITY_THRESHOLD,
    )
}

/// Retention days are coerced per §4.6: invalid/non-numeric values
/// fall back to the seeded default; raw-message and ingest-error retention
/// require a strictly positive value (zero or negative also falls back to
/// default); item retention accepts zero as an explicit "retain forever".
pub fn resolve_retention_days(conn: &rusqlite::Connection, key: &str, default: i64, allow_zero: bool) -> Result<i64> {
    let value = match setting::get(conn, key)? {
        Some(v) => v.as_int(key).unwrap_or(default),
        None => default,
    };
    if value < 0 || (value == 0 && !allow_zero) {
        Ok(default)
    } else {
        Ok(value)
    }
}

pub fn resolve_backup_retain_count(conn: &rusqlite::Connection) -> Result<i64> {
    int_or_default(
        setting::get(conn, "backup.retain_count")?,
        "backup.retain_count",
        BACKUP_RETAIN_COUNT,
    )
}

pub fn resolve_max_pages_per_poll(conn: &rusqlite::Connection) -> Result<i64> {
    int_or_default(
        setting::get(conn, "scheduler.max_pages_per_poll")?,
        "scheduler.max_pages_per_poll",
        SCHEDULER_MAX_PAGES_PER_POLL,
    )
}

pub fn resolve_max_messages_per_poll(conn: &rusqlite::Connection) -> Result<i64> {
    int_or_default(
        setting::get(conn, "scheduler.max_messages_per_poll")?,
        "scheduler.max_messages_per_poll",
        SCHEDULER_MAX_MESSAGES_PER_POLL,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use rusqlite::Connection;

    fn memory_db() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        schema::apply_connection_pragmas(&conn).unwrap();
        schema::migrate(&mut conn).unwrap();
        conn
    }

    #[test]
    fn seed_is_idempotent_and_preserves_edits() {
        let mut conn = memory_db();
        let now = chrono::Utc::now();
        {
            let tx = conn.transaction().unwrap();
            assert_eq!(seed_defaults(&tx, now).unwrap(), seeded_defaults().len());
            tx.commit().unwrap();
        }
        {
            let tx = conn.transaction().unwrap();
            setting::set(&tx, "scheduler.default_poll_interval_seconds", &SettingValue::Int(900), now).unwrap();
            tx.commit().unwrap();
        }
        {
            let tx = conn.transaction().unwrap();
            assert_eq!(seed_defaults(&tx, now).unwrap(), 0);
            tx.commit().unwrap();
        }
        assert_eq!(resolve_poll_interval_seconds(&conn).unwrap(), 900);
    }

    #[test]
    fn retention_days_falls_back_on_invalid_value() {
        let mut conn = memory_db();
        let now = chrono::Utc::now();
        let tx = conn.transaction().unwrap();
        setting::set(&tx, "retention.raw_messages_days", &SettingValue::Str("oops".into()), now).unwrap();
        tx.commit().unwrap();
        let days = resolve_retention_days(&conn, "retention.raw_messages_days", RETENTION_RAW_MESSAGES_DAYS, false).unwrap();
        assert_eq!(days, RETENTION_RAW_MESSAGES_DAYS);
    }

    #[test]
    fn items_retention_allows_zero_as_retain_forever() {
        let mut conn = memory_db();
        let now = chrono::Utc::now();
        let tx = conn.transaction().unwrap();
        setting::set(&tx, "retention.items_days", &SettingValue::Int(0), now).unwrap();
        tx.commit().unwrap();
        let days = resolve_retention_days(&conn, "retention.items_days", RETENTION_ITEMS_DAYS, true).unwrap();
        assert_eq!(days, 0);
    }
}
