//! Authenticated encryption for the OSM connection cookie.
//!
//! The cookie payload lives in the user's browser, so it is encrypted with
//! AES-256-GCM under a key derived from the configured secret. Decryption
//! fails closed: truncation, bit-flips, a different secret, or a different
//! format version all produce the same [`AuthError::CookieDecryption`], with
//! no detail for an attacker to distinguish. Rotating the secret invalidates
//! every outstanding cookie and forces re-authentication of the OSM linkage;
//! that is the intended operational behavior.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::{ExposeSecret, SecretBox, SecretString};
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::config::{ConfigError, MIN_COOKIE_SECRET_BYTES};
use crate::errors::AuthError;
use crate::models::OsmConnection;

/// Format version prefix on every ciphertext blob. Bumped if the wire layout
/// ever changes; unknown prefixes fail decryption like any other tamper.
const FORMAT_PREFIX: &str = "v1.";

/// 96-bit GCM nonce.
const NONCE_LEN: usize = 12;

/// 128-bit GCM authentication tag.
const TAG_LEN: usize = 16;

/// Symmetric cipher for the OSM connection cookie.
///
/// Cheap to construct, `Send + Sync`, and safe to share by reference across
/// concurrent requests; both operations are pure CPU work.
pub struct CookieCrypto {
    key: SecretBox<[u8; 32]>,
    rng: SystemRandom,
}

impl std::fmt::Debug for CookieCrypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieCrypto")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl CookieCrypto {
    /// Derive the cookie key from the configured secret.
    ///
    /// The secret length is re-checked here even though `AuthConfig` already
    /// validates it, so this type stays safe when constructed directly.
    ///
    /// # Errors
    ///
    /// Returns `CookieSecretTooShort` for secrets under 32 bytes.
    pub fn new(secret: &SecretString) -> Result<Self, ConfigError> {
        let secret_bytes = secret.expose_secret().as_bytes();
        if secret_bytes.len() < MIN_COOKIE_SECRET_BYTES {
            return Err(ConfigError::CookieSecretTooShort {
                len: secret_bytes.len(),
            });
        }

        let key: [u8; 32] = Sha256::digest(secret_bytes).into();

        Ok(Self {
            key: SecretBox::new(Box::new(key)),
            rng: SystemRandom::new(),
        })
    }

    /// Encrypt an OSM connection for cookie transport.
    ///
    /// Output is `v1.<base64url(nonce || ciphertext || tag)>` — URL-safe,
    /// no padding, no control characters.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Crypto` if nonce generation or the seal operation
    /// fails. These indicate local malfunction, not bad input.
    #[instrument(skip_all)]
    pub fn encrypt_osm_connection(&self, connection: &OsmConnection) -> Result<String, AuthError> {
        let plaintext = serde_json::to_vec(connection)
            .map_err(|e| AuthError::Crypto(format!("Payload serialization failed: {e}")))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|e| AuthError::Crypto(format!("Nonce generation failed: {e}")))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let sealing_key = self.cipher_key()?;

        let mut in_out = plaintext;
        sealing_key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|e| AuthError::Crypto(format!("Encryption operation failed: {e}")))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + in_out.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&in_out);

        Ok(format!("{FORMAT_PREFIX}{}", URL_SAFE_NO_PAD.encode(blob)))
    }

    /// Decrypt a cookie blob back into an OSM connection.
    ///
    /// # Errors
    ///
    /// Every failure mode — bad version prefix, malformed base64, short
    /// input, authentication failure, structural mismatch of the plaintext —
    /// returns `AuthError::CookieDecryption`. The specific cause is logged
    /// at debug level only.
    #[instrument(skip_all)]
    pub fn decrypt_osm_connection(&self, blob: &str) -> Result<OsmConnection, AuthError> {
        let encoded = blob.strip_prefix(FORMAT_PREFIX).ok_or_else(|| {
            tracing::debug!(target: "auth.cookie", "Cookie rejected: missing or unknown version prefix");
            AuthError::CookieDecryption
        })?;

        let bytes = URL_SAFE_NO_PAD.decode(encoded).map_err(|e| {
            tracing::debug!(target: "auth.cookie", error = %e, "Cookie rejected: invalid base64");
            AuthError::CookieDecryption
        })?;

        if bytes.len() < NONCE_LEN + TAG_LEN {
            tracing::debug!(
                target: "auth.cookie",
                len = bytes.len(),
                "Cookie rejected: ciphertext too short"
            );
            return Err(AuthError::CookieDecryption);
        }

        let (nonce_part, ciphertext) = bytes.split_at(NONCE_LEN);
        let nonce_bytes: [u8; NONCE_LEN] = nonce_part
            .try_into()
            .map_err(|_| AuthError::CookieDecryption)?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let opening_key = self.cipher_key().map_err(|_| AuthError::CookieDecryption)?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = opening_key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| {
                // No reason detail even at debug level: an AEAD open failure
                // cannot distinguish wrong key from corruption anyway.
                tracing::debug!(target: "auth.cookie", "Cookie rejected: authentication failed");
                AuthError::CookieDecryption
            })?;

        serde_json::from_slice(plaintext).map_err(|e| {
            tracing::debug!(target: "auth.cookie", error = %e, "Cookie rejected: payload mismatch");
            AuthError::CookieDecryption
        })
    }

    /// Build the AEAD key. `LessSafeKey` is not `Clone`, so one is
    /// constructed per operation from the derived key bytes.
    fn cipher_key(&self) -> Result<LessSafeKey, AuthError> {
        let unbound = UnboundKey::new(&AES_256_GCM, self.key.expose_secret().as_slice())
            .map_err(|e| AuthError::Crypto(format!("Cipher key creation failed: {e}")))?;
        Ok(LessSafeKey::new(unbound))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::models::OsmScope;
    use chrono::{Duration, Utc};

    fn test_crypto() -> CookieCrypto {
        CookieCrypto::new(&SecretString::from(
            "cookie-secret-with-at-least-32-bytes!",
        ))
        .unwrap()
    }

    fn test_connection() -> OsmConnection {
        OsmConnection {
            osm_username: "alice".to_string(),
            osm_id: 42,
            access_token: "access-token-value".to_string(),
            refresh_token: Some("refresh-token-value".to_string()),
            expires_at: Some(Utc::now() + Duration::seconds(3600)),
            scopes: vec![OsmScope::ReadPrefs, OsmScope::WriteApi],
        }
    }

    #[test]
    fn test_short_secret_rejected() {
        let result = CookieCrypto::new(&SecretString::from("short"));
        assert!(matches!(
            result,
            Err(ConfigError::CookieSecretTooShort { len: 5 })
        ));
    }

    #[test]
    fn test_round_trip() {
        let crypto = test_crypto();
        let conn = test_connection();

        let blob = crypto.encrypt_osm_connection(&conn).unwrap();
        let back = crypto.decrypt_osm_connection(&blob).unwrap();

        assert_eq!(back, conn);
    }

    #[test]
    fn test_output_is_cookie_safe() {
        let crypto = test_crypto();
        let blob = crypto.encrypt_osm_connection(&test_connection()).unwrap();

        assert!(blob.starts_with("v1."));
        // URL-safe alphabet plus the version separator; nothing a cookie
        // header would need to escape.
        assert!(blob
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
    }

    #[test]
    fn test_nonces_are_unique_per_encryption() {
        let crypto = test_crypto();
        let conn = test_connection();

        let blob1 = crypto.encrypt_osm_connection(&conn).unwrap();
        let blob2 = crypto.encrypt_osm_connection(&conn).unwrap();

        // Same plaintext, different ciphertext: the nonce is random.
        assert_ne!(blob1, blob2);
    }

    #[test]
    fn test_wrong_secret_fails_uniformly() {
        let crypto_a = test_crypto();
        let crypto_b = CookieCrypto::new(&SecretString::from(
            "a-completely-different-32-byte-secret!!",
        ))
        .unwrap();

        let blob = crypto_a.encrypt_osm_connection(&test_connection()).unwrap();
        let result = crypto_b.decrypt_osm_connection(&blob);

        assert!(matches!(result, Err(AuthError::CookieDecryption)));
    }

    #[test]
    fn test_single_bit_flip_fails() {
        let crypto = test_crypto();
        let blob = crypto.encrypt_osm_connection(&test_connection()).unwrap();

        // Flip one bit in the middle of the base64 payload by swapping a
        // character for a different alphabet member.
        let mid = blob.len() / 2;
        let original = blob.as_bytes()[mid];
        let replacement = if original == b'A' { b'B' } else { b'A' };
        let mut tampered = blob.into_bytes();
        tampered[mid] = replacement;
        let tampered = String::from_utf8(tampered).unwrap();

        let result = crypto.decrypt_osm_connection(&tampered);
        assert!(matches!(result, Err(AuthError::CookieDecryption)));
    }

    #[test]
    fn test_truncated_blob_fails() {
        let crypto = test_crypto();
        let blob = crypto.encrypt_osm_connection(&test_connection()).unwrap();

        let truncated = &blob[..blob.len() - 8];
        let result = crypto.decrypt_osm_connection(truncated);
        assert!(matches!(result, Err(AuthError::CookieDecryption)));
    }

    #[test]
    fn test_missing_version_prefix_fails() {
        let crypto = test_crypto();
        let blob = crypto.encrypt_osm_connection(&test_connection()).unwrap();

        let stripped = blob.trim_start_matches("v1.");
        assert!(matches!(
            crypto.decrypt_osm_connection(stripped),
            Err(AuthError::CookieDecryption)
        ));

        let rewritten = format!("v2.{stripped}");
        assert!(matches!(
            crypto.decrypt_osm_connection(&rewritten),
            Err(AuthError::CookieDecryption)
        ));
    }

    #[test]
    fn test_garbage_inputs_fail() {
        let crypto = test_crypto();

        for input in ["", "v1.", "v1.!!!not-base64!!!", "v1.AAAA", "plainly-wrong"] {
            let result = crypto.decrypt_osm_connection(input);
            assert!(
                matches!(result, Err(AuthError::CookieDecryption)),
                "input {input:?} should fail closed"
            );
        }
    }

    #[test]
    fn test_valid_ciphertext_of_wrong_structure_fails() {
        // Encrypt something that is valid JSON but not an OsmConnection.
        let crypto = test_crypto();

        let plaintext = br#"{"hello":"world"}"#.to_vec();
        let mut nonce_bytes = [0u8; NONCE_LEN];
        crypto.rng.fill(&mut nonce_bytes).unwrap();
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let key = crypto.cipher_key().unwrap();
        let mut in_out = plaintext;
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .unwrap();

        let mut blob = Vec::new();
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&in_out);
        let encoded = format!("v1.{}", URL_SAFE_NO_PAD.encode(blob));

        let result = crypto.decrypt_osm_connection(&encoded);
        assert!(matches!(result, Err(AuthError::CookieDecryption)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug_str = format!("{:?}", test_crypto());
        assert!(debug_str.contains("[REDACTED]"));
    }
}
