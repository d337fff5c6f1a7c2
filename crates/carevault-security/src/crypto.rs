// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Crypto primitives — AES-256-GCM field encryption, PBKDF2 salted hashing,
// secure token generation, and display masking.
//
// Envelope wire format (base64-encoded):
//   [ IV (16 bytes) ][ GCM tag (16 bytes) ][ ciphertext ]
//
// The decoder relies on these positions; changing any length is a breaking
// format change and would require an envelope version byte.

use std::num::NonZeroU32;

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::rand::{SecureRandom, SystemRandom};
use ring::{constant_time, pbkdf2};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use carevault_core::config::SecurityConfig;
use carevault_core::error::{CareVaultError, Result};

/// AES-256-GCM with a 16-byte nonce, matching the stored envelope format.
/// (The default 12-byte nonce construction would not decode existing data.)
type EnvelopeCipher = AesGcm<Aes256, U16>;

/// IV length in bytes. Positional — the first 16 bytes of every envelope.
pub const IV_LEN: usize = 16;

/// GCM authentication tag length in bytes. Positional — bytes 16..32.
pub const TAG_LEN: usize = 16;

/// Encryption key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Salt length in bytes for one-way hashing.
pub const SALT_LEN: usize = 64;

/// Derived-key output length in bytes for one-way hashing.
pub const DERIVED_KEY_LEN: usize = 64;

/// PBKDF2 iteration count. Deliberately expensive to resist brute force.
pub const PBKDF2_ITERATIONS: NonZeroU32 = NonZeroU32::new(100_000).unwrap();

/// Authenticated field encryption for sensitive record data.
///
/// The key is loaded once (from [`SecurityConfig`]) and the cipher is cached
/// for the process lifetime — no key material is read per call. Every
/// encryption draws a fresh random IV from the OS CSPRNG, so identical
/// plaintexts never produce identical envelopes.
pub struct FieldCipher {
    cipher: EnvelopeCipher,
    rng: SystemRandom,
}

impl FieldCipher {
    /// Create a cipher from raw 32-byte key material.
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        Self {
            cipher: EnvelopeCipher::new(key.into()),
            rng: SystemRandom::new(),
        }
    }

    /// Create a cipher from configuration.
    ///
    /// A missing key is fatal in the production posture
    /// ([`CareVaultError::EncryptionUnavailable`]). In any other posture a
    /// fixed development key is derived instead, with a loud warning —
    /// data encrypted this way is NOT protected.
    #[instrument(skip_all, fields(posture = ?config.posture))]
    pub fn from_config(config: &SecurityConfig) -> Result<Self> {
        let key = match &config.encryption_key {
            Some(hex_key) => {
                let bytes = hex::decode(hex_key).map_err(|_| {
                    CareVaultError::InvalidConfig(
                        "encryption key is not valid hex".to_owned(),
                    )
                })?;
                let key: [u8; KEY_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
                    CareVaultError::InvalidConfig(format!(
                        "encryption key must be {KEY_LEN} bytes, got {}",
                        b.len()
                    ))
                })?;
                key
            }
            None if config.posture.is_production() => {
                return Err(CareVaultError::EncryptionUnavailable);
            }
            None => {
                warn!(
                    "no encryption key configured — using an INSECURE development \
                     fallback key; sensitive fields are not protected"
                );
                let digest = Sha256::digest(b"carevault-insecure-development-key");
                digest.into()
            }
        };

        Ok(Self::new(&key))
    }

    /// Encrypt a plaintext string into a base64 envelope.
    ///
    /// Empty input maps to empty output: empty strings carry no
    /// confidentiality requirement and encrypting them would only turn unset
    /// form fields into spurious ciphertext.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let mut iv = [0u8; IV_LEN];
        self.rng
            .fill(&mut iv)
            .map_err(|_| CareVaultError::EncryptionFailed("rng failure".to_owned()))?;
        let nonce = Nonce::<U16>::from_slice(&iv);

        // aes-gcm returns ciphertext with the tag appended; the envelope
        // stores the tag between the IV and the ciphertext.
        let sealed = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CareVaultError::EncryptionFailed(e.to_string()))?;
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        let mut envelope = Vec::with_capacity(IV_LEN + TAG_LEN + ciphertext.len());
        envelope.extend_from_slice(&iv);
        envelope.extend_from_slice(tag);
        envelope.extend_from_slice(ciphertext);

        debug!(envelope_len = envelope.len(), "field encrypted");
        Ok(BASE64.encode(envelope))
    }

    /// Decrypt a base64 envelope back to the plaintext string.
    ///
    /// All failure modes — bad base64, an envelope too short to hold
    /// IV + tag, a failed tag verification, non-UTF-8 plaintext — collapse
    /// into [`CareVaultError::DecryptionFailed`]. No partial plaintext is
    /// ever returned.
    pub fn decrypt(&self, envelope: &str) -> Result<String> {
        if envelope.is_empty() {
            return Ok(String::new());
        }

        let bytes = BASE64
            .decode(envelope)
            .map_err(|_| CareVaultError::DecryptionFailed)?;
        if bytes.len() < IV_LEN + TAG_LEN {
            return Err(CareVaultError::DecryptionFailed);
        }

        let iv = &bytes[..IV_LEN];
        let tag = &bytes[IV_LEN..IV_LEN + TAG_LEN];
        let ciphertext = &bytes[IV_LEN + TAG_LEN..];
        let nonce = Nonce::<U16>::from_slice(iv);

        let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_LEN);
        sealed.extend_from_slice(ciphertext);
        sealed.extend_from_slice(tag);

        let plaintext = self
            .cipher
            .decrypt(nonce, sealed.as_slice())
            .map_err(|_| CareVaultError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| CareVaultError::DecryptionFailed)
    }
}

/// One-way hash a value with a fresh random salt.
///
/// Output format: `"<salt-hex>:<derived-key-hex>"` with a 64-byte salt and a
/// 64-byte PBKDF2-HMAC-SHA512 derived key. The same input hashed twice
/// produces different outputs, so the hash store leaks no equality
/// information.
pub fn hash_with_salt(value: &str) -> Result<String> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| CareVaultError::HashingFailed("rng failure".to_owned()))?;

    let mut derived = [0u8; DERIVED_KEY_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA512,
        PBKDF2_ITERATIONS,
        &salt,
        value.as_bytes(),
        &mut derived,
    );

    Ok(format!("{}:{}", hex::encode(salt), hex::encode(derived)))
}

/// Verify a value against a stored salted hash.
///
/// Recomputes the full derivation with the stored salt and compares in
/// constant time — there is no fast-hash shortcut and no partial-match
/// signal. Malformed stored values verify as `false` rather than erroring,
/// so the caller cannot distinguish "wrong value" from "corrupt record".
pub fn verify_hash(value: &str, stored: &str) -> bool {
    let Some((salt_hex, derived_hex)) = stored.split_once(':') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(derived_hex)) else {
        return false;
    };
    if salt.len() != SALT_LEN || expected.len() != DERIVED_KEY_LEN {
        return false;
    }

    let mut derived = [0u8; DERIVED_KEY_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA512,
        PBKDF2_ITERATIONS,
        &salt,
        value.as_bytes(),
        &mut derived,
    );

    constant_time::verify_slices_are_equal(&derived, &expected).is_ok()
}

/// Generate `byte_len` bytes of cryptographically secure randomness as a hex
/// string. There is no pseudo-random fallback.
pub fn generate_secure_token(byte_len: usize) -> Result<String> {
    let rng = SystemRandom::new();
    let mut buf = vec![0u8; byte_len];
    rng.fill(&mut buf)
        .map_err(|_| CareVaultError::EncryptionFailed("rng failure".to_owned()))?;
    Ok(hex::encode(buf))
}

/// Replace all but the trailing `visible_suffix` characters with `*`.
///
/// Pure display transform, not security-bearing. Values no longer than the
/// visible suffix are returned unchanged.
pub fn mask_sensitive(value: &str, visible_suffix: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= visible_suffix {
        return value.to_owned();
    }
    let masked = chars.len() - visible_suffix;
    let mut out = "*".repeat(masked);
    out.extend(&chars[masked..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use carevault_core::config::Posture;

    fn test_cipher() -> FieldCipher {
        FieldCipher::new(&[0x42u8; KEY_LEN])
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let cipher = test_cipher();
        let plaintext = "gestational diabetes, 28 weeks";
        let envelope = cipher.encrypt(plaintext).unwrap();
        assert_ne!(envelope, plaintext);
        assert_eq!(cipher.decrypt(&envelope).unwrap(), plaintext);
    }

    #[test]
    fn fresh_iv_per_call() {
        let cipher = test_cipher();
        let e1 = cipher.encrypt("same input").unwrap();
        let e2 = cipher.encrypt("same input").unwrap();
        assert_ne!(e1, e2);
        assert_eq!(cipher.decrypt(&e1).unwrap(), "same input");
        assert_eq!(cipher.decrypt(&e2).unwrap(), "same input");
    }

    #[test]
    fn empty_string_short_circuits() {
        let cipher = test_cipher();
        assert_eq!(cipher.encrypt("").unwrap(), "");
        assert_eq!(cipher.decrypt("").unwrap(), "");
    }

    #[test]
    fn envelope_layout() {
        let cipher = test_cipher();
        let envelope = cipher.encrypt("x").unwrap();
        let bytes = BASE64.decode(envelope).unwrap();
        // IV + tag + 1 byte of ciphertext
        assert_eq!(bytes.len(), IV_LEN + TAG_LEN + 1);
    }

    #[test]
    fn tampering_any_byte_fails() {
        let cipher = test_cipher();
        let envelope = cipher.encrypt("tamper target").unwrap();
        let bytes = BASE64.decode(&envelope).unwrap();

        for i in 0..bytes.len() {
            let mut corrupted = bytes.clone();
            corrupted[i] ^= 0x01;
            let result = cipher.decrypt(&BASE64.encode(&corrupted));
            assert!(
                matches!(result, Err(CareVaultError::DecryptionFailed)),
                "flipping byte {i} must fail decryption"
            );
        }
    }

    #[test]
    fn truncated_envelope_fails() {
        let cipher = test_cipher();
        let short = BASE64.encode([0u8; IV_LEN + TAG_LEN - 1]);
        assert!(matches!(
            cipher.decrypt(&short),
            Err(CareVaultError::DecryptionFailed)
        ));
    }

    #[test]
    fn invalid_base64_fails() {
        let cipher = test_cipher();
        assert!(matches!(
            cipher.decrypt("not base64!!!"),
            Err(CareVaultError::DecryptionFailed)
        ));
    }

    #[test]
    fn wrong_key_fails() {
        let a = FieldCipher::new(&[0x01u8; KEY_LEN]);
        let b = FieldCipher::new(&[0x02u8; KEY_LEN]);
        let envelope = a.encrypt("secret").unwrap();
        assert!(matches!(
            b.decrypt(&envelope),
            Err(CareVaultError::DecryptionFailed)
        ));
    }

    #[test]
    fn missing_key_fatal_in_production() {
        let config = SecurityConfig {
            encryption_key: None,
            posture: Posture::Production,
            ..SecurityConfig::default()
        };
        assert!(matches!(
            FieldCipher::from_config(&config),
            Err(CareVaultError::EncryptionUnavailable)
        ));
    }

    #[test]
    fn missing_key_tolerated_in_development() {
        let config = SecurityConfig::default();
        let cipher = FieldCipher::from_config(&config).unwrap();
        let envelope = cipher.encrypt("dev data").unwrap();
        assert_eq!(cipher.decrypt(&envelope).unwrap(), "dev data");
    }

    #[test]
    fn configured_key_round_trip() {
        let config = SecurityConfig {
            encryption_key: Some(hex::encode([0xA5u8; KEY_LEN])),
            posture: Posture::Production,
            ..SecurityConfig::default()
        };
        let cipher = FieldCipher::from_config(&config).unwrap();
        assert_eq!(
            cipher.decrypt(&cipher.encrypt("prod data").unwrap()).unwrap(),
            "prod data"
        );
    }

    #[test]
    fn bad_key_hex_rejected() {
        let config = SecurityConfig {
            encryption_key: Some("zz".repeat(32)),
            ..SecurityConfig::default()
        };
        assert!(matches!(
            FieldCipher::from_config(&config),
            Err(CareVaultError::InvalidConfig(_))
        ));
    }

    #[test]
    fn short_key_rejected() {
        let config = SecurityConfig {
            encryption_key: Some(hex::encode([0u8; 16])),
            ..SecurityConfig::default()
        };
        assert!(matches!(
            FieldCipher::from_config(&config),
            Err(CareVaultError::InvalidConfig(_))
        ));
    }

    #[test]
    fn salted_hash_is_salted() {
        let h1 = hash_with_salt("national-id-1234").unwrap();
        let h2 = hash_with_salt("national-id-1234").unwrap();
        assert_ne!(h1, h2, "same input must hash differently under new salts");
    }

    #[test]
    fn salted_hash_format() {
        let stored = hash_with_salt("value").unwrap();
        let (salt_hex, derived_hex) = stored.split_once(':').unwrap();
        assert_eq!(salt_hex.len(), SALT_LEN * 2);
        assert_eq!(derived_hex.len(), DERIVED_KEY_LEN * 2);
    }

    #[test]
    fn verify_hash_accepts_correct_value() {
        let stored = hash_with_salt("correct horse").unwrap();
        assert!(verify_hash("correct horse", &stored));
    }

    #[test]
    fn verify_hash_rejects_wrong_value() {
        let stored = hash_with_salt("correct horse").unwrap();
        assert!(!verify_hash("incorrect horse", &stored));
    }

    #[test]
    fn verify_hash_rejects_malformed_stored_value() {
        assert!(!verify_hash("anything", ""));
        assert!(!verify_hash("anything", "no-separator"));
        assert!(!verify_hash("anything", "abc:def"));
        assert!(!verify_hash("anything", "zz:zz"));
    }

    #[test]
    fn secure_token_length_and_charset() {
        let token = generate_secure_token(32).unwrap();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn secure_tokens_are_unique() {
        assert_ne!(
            generate_secure_token(16).unwrap(),
            generate_secure_token(16).unwrap()
        );
    }

    #[test]
    fn mask_hides_all_but_suffix() {
        assert_eq!(mask_sensitive("1234567890", 4), "******7890");
    }

    #[test]
    fn mask_short_value_is_noop() {
        assert_eq!(mask_sensitive("789", 4), "789");
        assert_eq!(mask_sensitive("7890", 4), "7890");
    }

    #[test]
    fn mask_counts_characters_not_bytes() {
        assert_eq!(mask_sensitive("áéíóú", 2), "***óú");
    }
}
