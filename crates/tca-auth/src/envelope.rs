//! Envelope encryption for sensitive row bytes (§4.7):
//! `account.api_hash`, `account.session`, `auth_session_state.upstream_session`.
//!
//! The process-resident KEK never directly touches row plaintext. Each
//! call to [`wrap`] mints a fresh random 256-bit data-encryption key (DEK),
//! uses it to encrypt the plaintext once, then encrypts that DEK under the
//! KEK. Both encryptions are AES-256-GCM with independently drawn nonces
//! from `rand`'s CSPRNG. A wrong KEK fails the outer GCM tag check
//! deterministically — it never produces garbage plaintext.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;

use crate::error::{AuthError, Result};
use crate::lock::Kek;

const NONCE_LEN: usize = 12;
const DEK_LEN: usize = 32;
const DEK_CIPHERTEXT_LEN: usize = DEK_LEN + 16; // + GCM tag

fn cipher_for(key_bytes: &[u8; 32]) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key_bytes))
}

fn random_nonce() -> [u8; NONCE_LEN] {
    let mut buf = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}

/// Encrypts `plaintext` under a fresh per-call DEK, itself wrapped by `kek`.
///
/// Wire layout: `kek_nonce(12) || wrapped_dek(48) || data_nonce(12) || ciphertext(N+16)`.
pub fn wrap(kek: &Kek, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut dek = [0u8; DEK_LEN];
    rand::thread_rng().fill_bytes(&mut dek);

    let kek_nonce = random_nonce();
    let wrapped_dek = cipher_for(kek.as_bytes())
        .encrypt(Nonce::from_slice(&kek_nonce), dek.as_ref())
        .map_err(|_| AuthError::DecryptionFailed)?;

    let data_nonce = random_nonce();
    let ciphertext = cipher_for(&dek)
        .encrypt(Nonce::from_slice(&data_nonce), plaintext)
        .map_err(|_| AuthError::DecryptionFailed)?;

    let mut out = Vec::with_capacity(NONCE_LEN + wrapped_dek.len() + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&kek_nonce);
    out.extend_from_slice(&wrapped_dek);
    out.extend_from_slice(&data_nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Reverses [`wrap`]. Fails with [`AuthError::DecryptionFailed`] if `kek` is
/// wrong (GCM tag mismatch on the wrapped DEK), or
/// [`AuthError::MalformedCiphertext`] if the blob is too short to be one of
/// ours — never returns garbage plaintext either way.
pub fn unwrap(kek: &Kek, blob: &[u8]) -> Result<Vec<u8>> {
    let min_len = NONCE_LEN + DEK_CIPHERTEXT_LEN + NONCE_LEN + 16;
    if blob.len() < min_len {
        return Err(AuthError::MalformedCiphertext {
            reason: "blob shorter than the minimum envelope layout",
        });
    }

    let (kek_nonce, rest) = blob.split_at(NONCE_LEN);
    let (wrapped_dek, rest) = rest.split_at(DEK_CIPHERTEXT_LEN);
    let (data_nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let dek_bytes = cipher_for(kek.as_bytes())
        .decrypt(Nonce::from_slice(kek_nonce), wrapped_dek)
        .map_err(|_| AuthError::DecryptionFailed)?;
    let dek: [u8; DEK_LEN] = dek_bytes
        .try_into()
        .map_err(|_| AuthError::MalformedCiphertext { reason: "unwrapped DEK is not 32 bytes" })?;

    cipher_for(&dek)
        .decrypt(Nonce::from_slice(data_nonce), ciphertext)
        .map_err(|_| AuthError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_recovers_plaintext() {
        let kek = Kek::from_bytes([7u8; 32]);
        let plaintext = b"super secret api_hash bytes";
        let ciphertext = wrap(&kek, plaintext).unwrap();
        assert_ne!(ciphertext.as_slice(), plaintext.as_ref());
        let recovered = unwrap(&kek, &ciphertext).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn wrong_kek_fails_deterministically() {
        let kek = Kek::from_bytes([7u8; 32]);
        let other = Kek::from_bytes([9u8; 32]);
        let ciphertext = wrap(&kek, b"secret").unwrap();
        let result = unwrap(&other, &ciphertext);
        assert!(matches!(result, Err(AuthError::DecryptionFailed)));
    }

    #[test]
    fn truncated_blob_is_malformed_not_garbage() {
        let kek = Kek::from_bytes([1u8; 32]);
        let result = unwrap(&kek, b"too short");
        assert!(matches!(result, Err(AuthError::MalformedCiphertext { .. })));
    }

    #[test]
    fn two_encryptions_of_same_plaintext_differ() {
        let kek = Kek::from_bytes([3u8; 32]);
        let a = wrap(&kek, b"same plaintext").unwrap();
        let b = wrap(&kek, b"same plaintext").unwrap();
        assert_ne!(a, b);
    }
}
