//! Remote JWKS fetching and caching.
//!
//! Signing keys rotate infrequently but unpredictably. The cache serves keys
//! from memory while the document is within its TTL and the requested `kid`
//! is present; any miss triggers one blocking refetch of the whole document,
//! which both handles rotation without polling and bounds staleness. The
//! cached set is replaced wholesale so readers never observe a mix of stale
//! and fresh keys.
//!
//! Concurrent misses coalesce: one caller fetches while the rest wait on the
//! refresh lock, then re-check against the set that fetch produced.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::config::ConfigError;
use crate::errors::AuthError;

/// Connect timeout for the JWKS fetch, separate from the request timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A single verification key resolved from the JWKS document.
#[derive(Clone)]
pub struct SigningKey {
    /// Key material ready for signature verification.
    pub decoding_key: DecodingKey,

    /// Algorithm the JWKS declares for this key, when it declares one.
    pub algorithm: Option<Algorithm>,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// One fetched generation of the key set.
struct CachedKeySet {
    keys: HashMap<String, SigningKey>,
    fetched_at: Instant,
}

impl CachedKeySet {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() <= ttl
    }
}

/// TTL'd cache over a remote JWKS endpoint.
///
/// `Send + Sync`; share one instance (by reference or `Arc`) across all
/// concurrent requests.
pub struct JwksCache {
    url: String,
    ttl: Duration,
    http_client: reqwest::Client,
    keys: RwLock<Option<CachedKeySet>>,
    refresh_lock: Mutex<()>,
}

impl std::fmt::Debug for JwksCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksCache")
            .field("url", &self.url)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl JwksCache {
    /// Create a cache for the given JWKS URL. Starts empty; the first
    /// [`JwksCache::get_key`] call performs the initial fetch.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::HttpClient` if the HTTP client cannot be built.
    pub fn new(url: String, ttl: Duration, http_timeout: Duration) -> Result<Self, ConfigError> {
        let http_client = reqwest::Client::builder()
            .timeout(http_timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            url,
            ttl,
            http_client,
            keys: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Resolve a verification key by its key id.
    ///
    /// Served from the cache when the set is fresh and contains `kid`;
    /// otherwise the document is refetched once and the lookup retried
    /// against the fresh set.
    ///
    /// # Errors
    ///
    /// - `UnknownKey` if `kid` is absent from a freshly fetched set
    /// - `KeySourceUnavailable` on network error, non-2xx response, or a
    ///   malformed document (transient; the next request retries naturally)
    pub async fn get_key(&self, kid: &str) -> Result<SigningKey, AuthError> {
        let entered = Instant::now();

        // Fast path: no I/O, no exclusive lock.
        {
            let guard = self.keys.read().await;
            if let Some(set) = guard.as_ref() {
                if set.is_fresh(self.ttl) {
                    if let Some(key) = set.keys.get(kid) {
                        return Ok(key.clone());
                    }
                }
            }
        }

        // Coalesce concurrent misses into one fetch.
        let _refresh = self.refresh_lock.lock().await;

        // A caller that held the lock before this one may already have
        // refreshed; a set fetched after this call began is the "retry once
        // against the fresh set" the contract asks for.
        {
            let guard = self.keys.read().await;
            if let Some(set) = guard.as_ref() {
                if set.fetched_at >= entered {
                    return match set.keys.get(kid) {
                        Some(key) => Ok(key.clone()),
                        None => Err(AuthError::UnknownKey {
                            kid: kid.to_string(),
                        }),
                    };
                }
            }
        }

        self.refresh().await?;

        let guard = self.keys.read().await;
        guard
            .as_ref()
            .and_then(|set| set.keys.get(kid).cloned())
            .ok_or_else(|| AuthError::UnknownKey {
                kid: kid.to_string(),
            })
    }

    /// Fetch the document and replace the cached set wholesale.
    ///
    /// On failure the previous set is left untouched (it may still satisfy
    /// fresh-enough lookups for other kids).
    async fn refresh(&self) -> Result<(), AuthError> {
        let response = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "auth.jwks", url = %self.url, error = %e, "JWKS fetch failed");
                AuthError::KeySourceUnavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                target: "auth.jwks",
                url = %self.url,
                status = %status,
                "JWKS endpoint returned non-success status"
            );
            return Err(AuthError::KeySourceUnavailable(format!(
                "JWKS endpoint returned {status}"
            )));
        }

        let document: JwkSet = response.json().await.map_err(|e| {
            warn!(target: "auth.jwks", url = %self.url, error = %e, "JWKS document malformed");
            AuthError::KeySourceUnavailable(format!("Malformed JWKS document: {e}"))
        })?;

        let keys = build_key_map(&document);
        debug!(
            target: "auth.jwks",
            url = %self.url,
            key_count = keys.len(),
            "JWKS refreshed"
        );

        let mut guard = self.keys.write().await;
        *guard = Some(CachedKeySet {
            keys,
            fetched_at: Instant::now(),
        });

        Ok(())
    }
}

/// Index the document by `kid`. Entries without a key id, or whose material
/// cannot be decoded, are skipped with a warning; the rest still serve.
fn build_key_map(document: &JwkSet) -> HashMap<String, SigningKey> {
    let mut keys = HashMap::new();

    for jwk in &document.keys {
        let Some(kid) = jwk.common.key_id.as_deref().filter(|k| !k.is_empty()) else {
            warn!(target: "auth.jwks", "Skipping JWKS entry without a kid");
            continue;
        };

        match DecodingKey::from_jwk(jwk) {
            Ok(decoding_key) => {
                keys.insert(
                    kid.to_string(),
                    SigningKey {
                        decoding_key,
                        algorithm: declared_algorithm(jwk),
                    },
                );
            }
            Err(e) => {
                warn!(
                    target: "auth.jwks",
                    kid = %kid,
                    error = %e,
                    "Skipping JWKS entry with undecodable key material"
                );
            }
        }
    }

    keys
}

/// Map the JWK `alg` field to a signature algorithm. Encryption algorithms
/// (RSA-OAEP and friends) have no signature counterpart and yield `None`.
fn declared_algorithm(jwk: &Jwk) -> Option<Algorithm> {
    use jsonwebtoken::jwk::KeyAlgorithm;

    match jwk.common.key_algorithm? {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    /// A syntactically valid Ed25519 OKP entry (32 zero bytes of key
    /// material — enough for decoding, which is all the map builder does).
    fn okp_entry(kid: &str) -> serde_json::Value {
        serde_json::json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "kid": kid,
            "alg": "EdDSA",
            "use": "sig",
            "x": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"
        })
    }

    fn parse_set(value: serde_json::Value) -> JwkSet {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_build_key_map_indexes_by_kid() {
        let set = parse_set(serde_json::json!({
            "keys": [okp_entry("key-1"), okp_entry("key-2")]
        }));

        let keys = build_key_map(&set);
        assert_eq!(keys.len(), 2);
        assert!(keys.contains_key("key-1"));
        assert!(keys.contains_key("key-2"));
        assert_eq!(keys["key-1"].algorithm, Some(Algorithm::EdDSA));
    }

    #[test]
    fn test_build_key_map_skips_entries_without_kid() {
        let mut entry = okp_entry("ignored");
        entry.as_object_mut().unwrap().remove("kid");

        let set = parse_set(serde_json::json!({
            "keys": [entry, okp_entry("key-1")]
        }));

        let keys = build_key_map(&set);
        assert_eq!(keys.len(), 1);
        assert!(keys.contains_key("key-1"));
    }

    #[test]
    fn test_build_key_map_skips_empty_kid() {
        let set = parse_set(serde_json::json!({
            "keys": [okp_entry("")]
        }));

        assert!(build_key_map(&set).is_empty());
    }

    #[test]
    fn test_cached_set_freshness() {
        let set = CachedKeySet {
            keys: HashMap::new(),
            fetched_at: Instant::now(),
        };
        assert!(set.is_fresh(Duration::from_secs(60)));

        std::thread::sleep(Duration::from_millis(5));
        assert!(!set.is_fresh(Duration::ZERO));
    }

    #[test]
    fn test_cache_construction() {
        let cache = JwksCache::new(
            "https://login.hotosm.org/.well-known/jwks.json".to_string(),
            Duration::from_secs(300),
            Duration::from_secs(10),
        );
        assert!(cache.is_ok());
    }
}
