//! First-boot bootstrap bearer token (§4.7). Generated exactly once:
//! subsequent boots find the digest already seeded and leave it alone.

use rand::RngCore;
use sha2::{Digest, Sha256};
use tca_core::config::SettingValue;
use tca_storage::repo::setting;

use crate::error::{AuthError, Result};

pub const BOOTSTRAP_TOKEN_DIGEST_KEY: &str = "auth.bootstrap_bearer_token_digest";
const TOKEN_BYTES: usize = 32;

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(unix)]
fn write_token_file(output_path: &str, token: &str) -> std::io::Result<()> {
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(output_path)?;
    writeln!(file, "{token}")
}

#[cfg(not(unix))]
fn write_token_file(output_path: &str, token: &str) -> std::io::Result<()> {
    std::fs::write(output_path, format!("{token}\n"))
}

/// Runs inside a single writer-queue transaction. If the digest is already
/// seeded, this is a no-op and returns `Ok(false)`. Otherwise it inserts
/// the digest row, then writes the plaintext file; a file-write failure
/// propagates as `Err`, rolling back the digest insert along with it, so
/// there is never a digest without a recoverable plaintext.
pub fn ensure_bootstrap_token(
    tx: &rusqlite::Transaction<'_>,
    output_path: &str,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<bool> {
    if setting::get(tx, BOOTSTRAP_TOKEN_DIGEST_KEY)?.is_some() {
        return Ok(false);
    }

    let token = generate_token();
    let digest = hex::encode(Sha256::digest(token.as_bytes()));

    setting::create(tx, BOOTSTRAP_TOKEN_DIGEST_KEY, &SettingValue::Str(digest), now)?;

    write_token_file(output_path, &token).map_err(AuthError::BootstrapTokenWrite)?;

    Ok(true)
}

/// Verifies a bearer token presented by a caller against the seeded digest.
pub fn verify_bootstrap_token(conn: &rusqlite::Connection, candidate: &str) -> Result<bool> {
    let stored = match setting::get(conn, BOOTSTRAP_TOKEN_DIGEST_KEY)? {
        Some(value) => value.as_str(BOOTSTRAP_TOKEN_DIGEST_KEY)?.to_string(),
        None => return Ok(false),
    };
    let candidate_digest = hex::encode(Sha256::digest(candidate.as_bytes()));
    Ok(constant_time_eq(stored.as_bytes(), candidate_digest.as_bytes()))
}

/// Constant-time byte comparison so digest verification doesn't leak
/// timing information about how many leading bytes matched.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use tca_storage::schema;

    fn memory_db() -> rusqlite::Connection {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        schema::apply_connection_pragmas(&conn).unwrap();
        schema::migrate(&mut conn).unwrap();
        conn
    }

    #[test]
    fn first_boot_generates_token_and_writes_file() {
        let mut conn = memory_db();
        let dir = std::env::temp_dir().join(format!("tca-bootstrap-{}", std::process::id()));
        let now = chrono::Utc::now();
        let path = dir.to_str().unwrap().to_string();

        let tx = conn.transaction().unwrap();
        let generated = ensure_bootstrap_token(&tx, &path, now).unwrap();
        tx.commit().unwrap();
        assert!(generated);

        let contents = std::fs::read_to_string(&dir).unwrap();
        assert!(contents.ends_with('\n'));
        let token = contents.trim();

        assert!(verify_bootstrap_token(&conn, token).unwrap());
        assert!(!verify_bootstrap_token(&conn, "wrong-token").unwrap());

        let _ = std::fs::remove_file(&dir);
    }

    #[test]
    fn second_boot_does_not_regenerate() {
        let mut conn = memory_db();
        let dir = std::env::temp_dir().join(format!("tca-bootstrap-2-{}", std::process::id()));
        let now = chrono::Utc::now();
        let path = dir.to_str().unwrap().to_string();

        {
            let tx = conn.transaction().unwrap();
            assert!(ensure_bootstrap_token(&tx, &path, now).unwrap());
            tx.commit().unwrap();
        }
        let first_contents = std::fs::read_to_string(&dir).unwrap();
        {
            let tx = conn.transaction().unwrap();
            assert!(!ensure_bootstrap_token(&tx, &path, now).unwrap());
            tx.commit().unwrap();
        }
        let second_contents = std::fs::read_to_string(&dir).unwrap();
        assert_eq!(first_contents, second_contents);

        let _ = std::fs::remove_file(&dir);
    }

    #[test]
    fn file_write_failure_rolls_back_digest() {
        let mut conn = memory_db();
        let now = chrono::Utc::now();
        // A path inside a nonexistent directory always fails to open.
        let bad_path = "/nonexistent-dir-for-test/token.txt".to_string();

        let tx = conn.transaction().unwrap();
        let result = ensure_bootstrap_token(&tx, &bad_path, now);
        assert!(result.is_err());
        // The caller's writer-queue contract rolls back on Err; dropping
        // the transaction here without commit simulates that rollback.
        drop(tx);

        assert!(setting::get(&conn, BOOTSTRAP_TOKEN_DIGEST_KEY).unwrap().is_none());
    }
}
