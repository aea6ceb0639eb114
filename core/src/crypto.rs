//! Symmetric file-encryption wrapper, out of scope beyond this interface.
//! Grounded on `original_source/aes/key_management.go` and
//! `original_source/aes/entropy.go`; the ring itself never calls these —
//! only the CLI's `storefile`/`getfile` commands do, when the config's AES
//! toggle is on.

use std::path::Path;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use zeroize::Zeroize;

use crate::error::ChordError;

const KEY_SIZE: usize = 32;
const KEY_ENTROPY_THRESHOLD: f64 = 4.0;
const NONCE_SIZE: usize = 12;

/// Shannon entropy over a byte slice, in bits per byte.
fn calculate_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut freq = [0u64; 256];
    for &b in data {
        freq[b as usize] += 1;
    }
    let len = data.len() as f64;
    freq.iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Loads a hex-encoded AES-256 key from disk, validating its length and
/// entropy the way `LoadKey` does.
pub fn load_key(path: impl AsRef<Path>) -> Result<[u8; KEY_SIZE], ChordError> {
    let mut raw = std::fs::read_to_string(path).map_err(|e| ChordError::Config(e.to_string()))?;
    let mut key = hex::decode(raw.trim()).map_err(|e| ChordError::Config(e.to_string()))?;
    raw.zeroize();
    if key.len() != KEY_SIZE {
        key.zeroize();
        return Err(ChordError::Config(format!(
            "invalid key length: expected {KEY_SIZE} bytes, got {}",
            key.len()
        )));
    }
    let entropy = calculate_entropy(&key);
    if entropy < KEY_ENTROPY_THRESHOLD {
        key.zeroize();
        return Err(ChordError::Config(format!(
            "key has insufficient entropy: {entropy:.3} < {KEY_ENTROPY_THRESHOLD}"
        )));
    }
    let mut out = [0u8; KEY_SIZE];
    out.copy_from_slice(&key);
    key.zeroize();
    Ok(out)
}

/// AES-256-GCM encrypt with a random 96-bit nonce, prepended to the
/// ciphertext.
pub fn encrypt(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> Result<Vec<u8>, ChordError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| ChordError::Config(format!("encryption failed: {e}")))?;
    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub fn decrypt(key: &[u8; KEY_SIZE], blob: &[u8]) -> Result<Vec<u8>, ChordError> {
    if blob.len() < NONCE_SIZE {
        return Err(ChordError::Config("ciphertext too short to contain a nonce".into()));
    }
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| ChordError::Config(format!("decryption failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let key = [7u8; KEY_SIZE];
        let plaintext = b"chord file contents";
        let blob = encrypt(&key, plaintext).unwrap();
        assert_ne!(blob, plaintext);
        let recovered = decrypt(&key, &blob).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn low_entropy_key_is_rejected() {
        let dir = std::env::temp_dir().join(format!("chordring-key-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("key.hex");
        std::fs::write(&path, "00".repeat(KEY_SIZE)).unwrap();
        assert!(load_key(&path).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
