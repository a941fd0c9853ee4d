use rusqlite::Connection;

use crate::error::Result;

/// Current schema version. Bumped whenever a migration is appended below.
pub const SCHEMA_VERSION: i64 = 1;

/// Applies every pending migration to `conn`, tracked by a `schema_version`
/// singleton row. Each migration runs inside its own transaction; a failure
/// leaves the schema at the last successfully applied version.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            id      INTEGER NOT NULL PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        ) STRICT;",
    )?;

    let current: i64 = conn
        .query_row(
            "SELECT version FROM schema_version WHERE id = 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    for version in (current + 1)..=SCHEMA_VERSION {
        tracing::info!(version, "applying storage migration");
        let tx = conn.transaction()?;
        match version {
            1 => apply_v1(&tx)?,
            other => unreachable!("no migration defined for version {other}"),
        }
        tx.execute(
            "INSERT INTO schema_version (id, version) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET version = excluded.version",
            [version],
        )?;
        tx.commit()?;
    }

    Ok(())
}

/// Pragmas applied to every connection (read-pool members and the writer).
pub fn apply_connection_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(())
}

fn apply_v1(tx: &rusqlite::Transaction<'_>) -> Result<()> {
    tx.execute_batch(
        "
        CREATE TABLE accounts (
            id              INTEGER NOT NULL PRIMARY KEY,
            api_id          INTEGER NOT NULL,
            api_hash        BLOB    NOT NULL,  -- envelope-encrypted
            session         BLOB,              -- envelope-encrypted, nullable
            key_version     INTEGER NOT NULL,
            paused_at       TEXT,
            pause_reason    TEXT,
            created_at      TEXT    NOT NULL,
            updated_at      TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE groups (
            id                              INTEGER NOT NULL PRIMARY KEY,
            name                            TEXT    NOT NULL,
            description                     TEXT,
            dedupe_horizon_minutes_override INTEGER,
            created_at                      TEXT    NOT NULL,
            updated_at                      TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE channels (
            id                  INTEGER NOT NULL PRIMARY KEY,
            account_id          INTEGER NOT NULL REFERENCES accounts(id),
            group_id            INTEGER REFERENCES groups(id),
            upstream_channel_id TEXT    NOT NULL,
            name                TEXT    NOT NULL,
            username            TEXT,
            is_enabled          INTEGER NOT NULL DEFAULT 1,
            created_at          TEXT    NOT NULL,
            updated_at          TEXT    NOT NULL,
            UNIQUE (upstream_channel_id)
        ) STRICT;
        CREATE INDEX idx_channels_account ON channels (account_id);
        CREATE INDEX idx_channels_group ON channels (group_id);

        CREATE TABLE channel_state (
            channel_id      INTEGER NOT NULL PRIMARY KEY REFERENCES channels(id) ON DELETE CASCADE,
            cursor_json     TEXT    NOT NULL DEFAULT '{}',
            paused_until    TEXT,
            last_success_at TEXT,
            updated_at      TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE account_pauses (
            id              INTEGER NOT NULL PRIMARY KEY,
            account_id      INTEGER NOT NULL UNIQUE REFERENCES accounts(id) ON DELETE CASCADE,
            paused_at       TEXT,
            pause_reason    TEXT,
            created_at      TEXT    NOT NULL,
            updated_at      TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE raw_messages (
            id                  INTEGER NOT NULL PRIMARY KEY,
            channel_id          INTEGER NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
            upstream_message_id TEXT    NOT NULL,
            payload_json        TEXT    NOT NULL,
            created_at          TEXT    NOT NULL,
            UNIQUE (channel_id, upstream_message_id)
        ) STRICT;
        CREATE INDEX idx_raw_messages_created_at ON raw_messages (created_at);

        CREATE TABLE items (
            id                  INTEGER NOT NULL PRIMARY KEY,
            channel_id          INTEGER NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
            upstream_message_id TEXT    NOT NULL,
            raw_message_id      INTEGER REFERENCES raw_messages(id) ON DELETE SET NULL,
            published_at        TEXT,
            title               TEXT,
            body                TEXT,
            canonical_url       TEXT,
            canonical_url_hash  TEXT,
            content_hash        TEXT,
            dedupe_state        TEXT    NOT NULL DEFAULT 'pending',
            created_at          TEXT    NOT NULL,
            UNIQUE (channel_id, upstream_message_id)
        ) STRICT;
        CREATE INDEX idx_items_created_at ON items (created_at);
        CREATE INDEX idx_items_canonical_url_hash ON items (canonical_url_hash);
        CREATE INDEX idx_items_channel ON items (channel_id);

        CREATE TABLE clusters (
            id                      INTEGER NOT NULL PRIMARY KEY,
            cluster_key             TEXT    NOT NULL UNIQUE,
            representative_item_id  INTEGER REFERENCES items(id),
            created_at              TEXT    NOT NULL,
            updated_at              TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE members (
            cluster_id  INTEGER NOT NULL REFERENCES clusters(id) ON DELETE CASCADE,
            item_id     INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
            created_at  TEXT    NOT NULL,
            PRIMARY KEY (cluster_id, item_id)
        ) STRICT;
        CREATE INDEX idx_members_item ON members (item_id);

        CREATE TABLE decisions (
            id                  INTEGER NOT NULL PRIMARY KEY,
            -- item_id/cluster_id/candidate_item_id are deliberately not
            -- declared as enforced foreign keys: the decision trace is
            -- append-only and may outlive the rows it was recorded
            -- against. Retention prune sweeps true orphans explicitly
            -- instead of relying on cascade.
            item_id             INTEGER NOT NULL,
            cluster_id          INTEGER,
            candidate_item_id   INTEGER,
            strategy_name       TEXT    NOT NULL,
            outcome             TEXT    NOT NULL,
            reason_code         TEXT,
            score               REAL,
            metadata_json       TEXT    NOT NULL DEFAULT '{}',
            created_at          TEXT    NOT NULL
        ) STRICT;
        CREATE INDEX idx_decisions_item ON decisions (item_id);

        CREATE TABLE settings (
            key         TEXT    NOT NULL PRIMARY KEY,
            value_json  TEXT    NOT NULL,
            updated_at  TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE notifications (
            id                  INTEGER NOT NULL PRIMARY KEY,
            type                TEXT    NOT NULL,
            severity            TEXT    NOT NULL,
            message             TEXT    NOT NULL,
            payload_json        TEXT,
            is_acknowledged     INTEGER NOT NULL DEFAULT 0,
            acknowledged_at     TEXT,
            created_at          TEXT    NOT NULL
        ) STRICT;
        CREATE INDEX idx_notifications_created_at ON notifications (created_at);

        CREATE TABLE ingest_errors (
            id              INTEGER NOT NULL PRIMARY KEY,
            channel_id      INTEGER REFERENCES channels(id),
            stage           TEXT    NOT NULL,
            error_code      TEXT    NOT NULL,
            error_message   TEXT    NOT NULL,
            payload_ref     TEXT,
            created_at      TEXT    NOT NULL
        ) STRICT;
        CREATE INDEX idx_ingest_errors_created_at ON ingest_errors (created_at);

        CREATE TABLE poll_jobs (
            id              INTEGER NOT NULL PRIMARY KEY,
            channel_id      INTEGER NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
            correlation_id  TEXT    NOT NULL UNIQUE,
            created_at      TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE auth_session_state (
            session_id      TEXT    NOT NULL PRIMARY KEY,
            phone_number    TEXT    NOT NULL,
            status          TEXT    NOT NULL,
            expires_at      TEXT    NOT NULL,
            upstream_session BLOB,  -- envelope-encrypted, nullable
            created_at      TEXT    NOT NULL,
            updated_at      TEXT    NOT NULL
        ) STRICT;
        CREATE INDEX idx_auth_session_state_expires_at ON auth_session_state (expires_at);

        CREATE TABLE key_rotation_state (
            id                      INTEGER NOT NULL PRIMARY KEY CHECK (id = 1),
            target_key_version      INTEGER NOT NULL,
            last_rotated_account_id INTEGER NOT NULL DEFAULT 0,
            started_at              TEXT    NOT NULL,
            updated_at              TEXT    NOT NULL,
            completed_at            TEXT
        ) STRICT;
        ",
    )?;
    Ok(())
}
