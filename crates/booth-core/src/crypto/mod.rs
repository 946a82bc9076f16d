//! Cryptographic primitives for Transfer Booth.
//!
//! This module provides:
//! - Ephemeral X25519 key exchange for per-transfer session keys
//! - HKDF-SHA256 session key derivation
//! - AES-256-GCM sealing of data chunks
//! - Ed25519 signatures for device identity
//!
//! ## Security Model
//!
//! - Every transfer derives a fresh AES-256 key from an ephemeral X25519
//!   exchange; session keys never outlive one transfer session
//! - Each chunk is sealed with a random 12-byte nonce and carries the
//!   16-byte GCM authentication tag; tampering fails decryption
//! - Long-term Ed25519 keys sign discovery beacons and transfer ids,
//!   letting previously verified peers resolve each other by name

mod identity;

pub use identity::DeviceIdentity;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::{Error, Result};

/// AES-256-GCM nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// AES-GCM authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// HKDF info string binding derived keys to this protocol version.
const SESSION_KEY_INFO: &[u8] = b"transfer-booth-v1-session-key";

/// Generate an ephemeral X25519 keypair.
///
/// Returns the secret and the 32-byte public key suitable for
/// transmission in a `HandshakePubkey` message.
#[must_use]
pub fn generate_keypair() -> (StaticSecret, [u8; 32]) {
    let secret = StaticSecret::random_from_rng(rand::thread_rng());
    let public = PublicKey::from(&secret);
    (secret, public.to_bytes())
}

/// Derive the 32-byte AES-256 session key from an X25519 exchange.
///
/// Runs the Diffie-Hellman exchange and feeds the shared secret through
/// HKDF-SHA256 (no salt, protocol-versioned info string). Both sides of a
/// transfer derive the same key from their own secret and the peer's
/// public key.
///
/// # Errors
///
/// Returns `Error::Crypto` if key expansion fails.
pub fn derive_session_key(secret: &StaticSecret, peer_public: &[u8; 32]) -> Result<[u8; KEY_SIZE]> {
    let shared = secret.diffie_hellman(&PublicKey::from(*peer_public));

    let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
    let mut key = [0u8; KEY_SIZE];
    hk.expand(SESSION_KEY_INFO, &mut key)
        .map_err(|e| Error::Crypto(format!("session key derivation failed: {e}")))?;

    Ok(key)
}

/// Encrypt a data chunk with AES-256-GCM.
///
/// Returns `nonce (12 bytes) || ciphertext || tag (16 bytes)`; the nonce
/// is freshly random per chunk and no associated data is used.
///
/// # Errors
///
/// Returns `Error::Crypto` if encryption fails.
pub fn encrypt_chunk(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::Crypto(format!("invalid session key: {e}")))?;

    let nonce_bytes = random_bytes::<NONCE_SIZE>();
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| Error::Crypto("chunk encryption failed".to_string()))?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Decrypt a data chunk sealed by [`encrypt_chunk`].
///
/// # Errors
///
/// Returns `Error::Crypto` if the blob is too short or the GCM tag does
/// not verify. Tag mismatches are a hard failure and are never retried.
pub fn decrypt_chunk(key: &[u8; KEY_SIZE], sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::Crypto(format!(
            "sealed chunk too short: {} bytes",
            sealed.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::Crypto(format!("invalid session key: {e}")))?;

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| Error::Crypto("chunk authentication failed".to_string()))
}

/// Verify an Ed25519 signature against a raw 32-byte public key.
///
/// Returns `false` for malformed keys as well as invalid signatures.
#[must_use]
pub fn ed25519_verify(public_key: &[u8; 32], signature: &[u8; 64], data: &[u8]) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };

    let signature = Signature::from_bytes(signature);
    verifying_key.verify(data, &signature).is_ok()
}

/// Verify an Ed25519 signature where key and signature are hex strings.
///
/// Returns `false` if either value fails to decode to the expected length.
#[must_use]
pub fn ed25519_verify_hex(public_key_hex: &str, signature_hex: &str, data: &[u8]) -> bool {
    let Ok(key_bytes) = hex::decode(public_key_hex) else {
        return false;
    };
    let Ok(key_array): std::result::Result<[u8; 32], _> = key_bytes.try_into() else {
        return false;
    };

    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(sig_array): std::result::Result<[u8; 64], _> = sig_bytes.try_into() else {
        return false;
    };

    ed25519_verify(&key_array, &sig_array, data)
}

/// Generate cryptographically secure random bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    use rand::RngCore;

    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let (_, pub_a) = generate_keypair();
        let (_, pub_b) = generate_keypair();

        assert_eq!(pub_a.len(), 32);
        assert_ne!(pub_a, pub_b, "Generated keys should be unique");
    }

    #[test]
    fn test_session_key_agreement() {
        let (secret_a, pub_a) = generate_keypair();
        let (secret_b, pub_b) = generate_keypair();

        let key_a = derive_session_key(&secret_a, &pub_b).expect("derive a");
        let key_b = derive_session_key(&secret_b, &pub_a).expect("derive b");

        assert_eq!(key_a, key_b, "Both sides should derive the same key");
        assert_eq!(key_a.len(), KEY_SIZE);
    }

    #[test]
    fn test_session_keys_differ_between_exchanges() {
        let (secret_a, _) = generate_keypair();
        let (_, pub_b) = generate_keypair();
        let (_, pub_c) = generate_keypair();

        let key_b = derive_session_key(&secret_a, &pub_b).expect("derive");
        let key_c = derive_session_key(&secret_a, &pub_c).expect("derive");

        assert_ne!(key_b, key_c);
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = random_bytes::<KEY_SIZE>();
        let plaintext = b"a chunk of file data";

        let sealed = encrypt_chunk(&key, plaintext).expect("encrypt");
        let opened = decrypt_chunk(&key, &sealed).expect("decrypt");

        assert_eq!(opened, plaintext);
    }

    #[test]
    fn test_sealed_chunk_overhead() {
        let key = random_bytes::<KEY_SIZE>();
        let plaintext = vec![0xAB; crate::CHUNK_SIZE];

        let sealed = encrypt_chunk(&key, &plaintext).expect("encrypt");

        assert_eq!(sealed.len(), plaintext.len() + NONCE_SIZE + TAG_SIZE);
    }

    #[test]
    fn test_empty_plaintext_roundtrip() {
        let key = random_bytes::<KEY_SIZE>();

        let sealed = encrypt_chunk(&key, b"").expect("encrypt");
        assert_eq!(sealed.len(), NONCE_SIZE + TAG_SIZE);

        let opened = decrypt_chunk(&key, &sealed).expect("decrypt");
        assert!(opened.is_empty());
    }

    #[test]
    fn test_tampered_chunk_fails() {
        let key = random_bytes::<KEY_SIZE>();
        let mut sealed = encrypt_chunk(&key, b"payload").expect("encrypt");

        // Flip one ciphertext byte
        let idx = sealed.len() - 1;
        sealed[idx] ^= 0x01;

        let result = decrypt_chunk(&key, &sealed);
        assert!(matches!(result, Err(Error::Crypto(_))));
    }

    #[test]
    fn test_wrong_key_fails() {
        let key_a = random_bytes::<KEY_SIZE>();
        let key_b = random_bytes::<KEY_SIZE>();

        let sealed = encrypt_chunk(&key_a, b"payload").expect("encrypt");
        assert!(decrypt_chunk(&key_b, &sealed).is_err());
    }

    #[test]
    fn test_short_blob_fails() {
        let key = random_bytes::<KEY_SIZE>();
        assert!(decrypt_chunk(&key, &[0u8; 10]).is_err());
    }

    #[test]
    fn test_ed25519_verify_hex() {
        use ed25519_dalek::{Signer, SigningKey};

        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let data = b"transfer-id-bytes";
        let signature = signing_key.sign(data);

        let pk_hex = hex::encode(signing_key.verifying_key().to_bytes());
        let sig_hex = hex::encode(signature.to_bytes());

        assert!(ed25519_verify_hex(&pk_hex, &sig_hex, data));
        assert!(!ed25519_verify_hex(&pk_hex, &sig_hex, b"other data"));
        assert!(!ed25519_verify_hex("not hex", &sig_hex, data));
        assert!(!ed25519_verify_hex(&pk_hex, "beef", data));
    }
}
