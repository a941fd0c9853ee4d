//! Process-local unlock state (§4.7). Sensitive operations — anything
//! that calls [`crate::envelope::unwrap`] or `wrap` — check
//! [`AuthGate::kek`] first; a locked gate fails the call with
//! [`AuthError::Locked`] rather than ever touching ciphertext.

use std::sync::RwLock;

use sha2::{Digest, Sha256};
use tca_core::config::UnlockMode;

use crate::error::{AuthError, Result};

/// A 256-bit key-encryption key, held only in process memory. `Clone` is
/// cheap (32 bytes) and deliberate: callers copy it out from behind the
/// gate's lock rather than holding the lock across an await point.
#[derive(Clone)]
pub struct Kek(Box<[u8; 32]>);

impl Kek {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(Box::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derives a KEK from arbitrary secret material (a passphrase or the
    /// contents of a mounted secret file) via SHA-256. Deterministic: the
    /// same material always yields the same KEK, so auto-unlock mode
    /// recovers the same key across restarts without persisting it.
    pub fn derive_from_material(material: &[u8]) -> Self {
        let digest = Sha256::digest(material);
        Self::from_bytes(digest.into())
    }
}

/// Process-wide lock/unlock state container. Constructed once at startup
/// as part of the lifecycle container and threaded by reference to every
/// collaborator that might need to decrypt row material.
pub struct AuthGate {
    kek: RwLock<Option<Kek>>,
}

impl AuthGate {
    pub fn locked() -> Self {
        Self {
            kek: RwLock::new(None),
        }
    }

    pub fn unlocked_with(kek: Kek) -> Self {
        Self {
            kek: RwLock::new(Some(kek)),
        }
    }

    pub fn unlock(&self, kek: Kek) {
        *self.kek.write().expect("auth gate lock poisoned") = Some(kek);
    }

    pub fn lock(&self) {
        *self.kek.write().expect("auth gate lock poisoned") = None;
    }

    pub fn is_unlocked(&self) -> bool {
        self.kek.read().expect("auth gate lock poisoned").is_some()
    }

    /// Returns a clone of the live KEK, or [`AuthError::Locked`] if the
    /// gate is currently locked.
    pub fn kek(&self) -> Result<Kek> {
        self.kek
            .read()
            .expect("auth gate lock poisoned")
            .clone()
            .ok_or(AuthError::Locked)
    }
}

/// Startup unlock per the configured [`UnlockMode`] (§4.7):
///
/// - `Interactive`: returns a locked gate; an explicit operator action
///   later calls [`AuthGate::unlock`].
/// - `AutoUnlock`: reads `secret_file`, failing startup outright if it is
///   missing, unreadable, or empty, and derives the KEK from its contents.
pub fn startup_unlock(mode: UnlockMode, secret_file: Option<&str>) -> Result<AuthGate> {
    match mode {
        UnlockMode::Interactive => Ok(AuthGate::locked()),
        UnlockMode::AutoUnlock => {
            let path = secret_file.ok_or_else(|| AuthError::MissingSecretFile {
                path: "<unset>".to_string(),
            })?;
            if !std::path::Path::new(path).exists() {
                return Err(AuthError::MissingSecretFile { path: path.to_string() });
            }
            let material = std::fs::read(path).map_err(|source| AuthError::SecretFileIo {
                path: path.to_string(),
                source,
            })?;
            if material.is_empty() {
                return Err(AuthError::EmptySecretFile { path: path.to_string() });
            }
            Ok(AuthGate::unlocked_with(Kek::derive_from_material(&material)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interactive_mode_starts_locked() {
        let gate = startup_unlock(UnlockMode::Interactive, None).unwrap();
        assert!(!gate.is_unlocked());
        assert!(matches!(gate.kek(), Err(AuthError::Locked)));
    }

    #[test]
    fn explicit_unlock_then_lock_round_trips() {
        let gate = AuthGate::locked();
        gate.unlock(Kek::from_bytes([1u8; 32]));
        assert!(gate.is_unlocked());
        gate.lock();
        assert!(!gate.is_unlocked());
    }

    #[test]
    fn auto_unlock_missing_file_is_a_startup_error() {
        let result = startup_unlock(UnlockMode::AutoUnlock, Some("/nonexistent/path/to/secret"));
        assert!(matches!(result, Err(AuthError::MissingSecretFile { .. })));
    }

    #[test]
    fn auto_unlock_empty_file_is_a_startup_error() {
        let dir = std::env::temp_dir().join(format!("tca-auth-test-{}", uuid_like()));
        std::fs::write(&dir, b"").unwrap();
        let result = startup_unlock(UnlockMode::AutoUnlock, Some(dir.to_str().unwrap()));
        let _ = std::fs::remove_file(&dir);
        assert!(matches!(result, Err(AuthError::EmptySecretFile { .. })));
    }

    #[test]
    fn auto_unlock_derives_deterministic_kek_from_file_contents() {
        let dir = std::env::temp_dir().join(format!("tca-auth-test-{}", uuid_like()));
        std::fs::write(&dir, b"correct horse battery staple").unwrap();
        let a = startup_unlock(UnlockMode::AutoUnlock, Some(dir.to_str().unwrap())).unwrap();
        let b = startup_unlock(UnlockMode::AutoUnlock, Some(dir.to_str().unwrap())).unwrap();
        let _ = std::fs::remove_file(&dir);
        assert_eq!(a.kek().unwrap().as_bytes(), b.kek().unwrap().as_bytes());
    }

    fn uuid_like() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos() as u64
    }
}
