//! JWT validation against the remote key set.
//!
//! The validator owns the full verification pipeline: structural parsing,
//! algorithm allow-listing (with an unconditional rejection of `"none"`),
//! key resolution through the [`JwksCache`], signature verification, claim
//! validation, and the mapping to a [`HankoUser`]. Claims are only ever read
//! from the output of signature verification. Every call re-verifies; there
//! is no result caching.
//!
//! JWKS resolution failures are logged distinctly for operators but surfaced
//! to callers as plain [`AuthError::TokenInvalid`], so responses do not leak
//! whether the key infrastructure is reachable.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::DateTime;
use jsonwebtoken::{Algorithm, Validation};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::config::{AuthConfig, ConfigError};
use crate::errors::AuthError;
use crate::jwks::JwksCache;
use crate::models::HankoUser;

/// Maximum allowed JWT size in bytes (8KB).
///
/// Tokens larger than this are rejected before base64 decoding or any
/// cryptographic work. Typical tokens are 200-800 bytes.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Validated pieces of a token header.
struct TokenHeader {
    algorithm: Algorithm,
    kid: String,
}

/// Token validator for Hanko-issued JWTs.
///
/// Construct once from configuration and share across requests; all methods
/// take `&self` and the only interior state is the JWKS cache.
#[derive(Debug)]
pub struct JwtValidator {
    jwks: JwksCache,
    allowed_algorithms: Vec<Algorithm>,
    audience: Option<String>,
    issuer: Option<String>,
}

impl JwtValidator {
    /// Build a validator (and its JWKS cache) from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the HTTP client for JWKS fetching cannot be
    /// built or the algorithm allow-list is empty.
    pub fn new(config: &AuthConfig) -> Result<Self, ConfigError> {
        if config.allowed_algorithms.is_empty() {
            return Err(ConfigError::InvalidAlgorithm(
                "allow-list must not be empty".to_string(),
            ));
        }

        let jwks = JwksCache::new(
            config.jwks_url.clone(),
            config.jwks_ttl,
            config.http_timeout,
        )?;

        Ok(Self {
            jwks,
            allowed_algorithms: config.allowed_algorithms.clone(),
            audience: config.audience.clone(),
            issuer: config.issuer.clone(),
        })
    }

    /// Verify a bearer token and produce the identity it asserts.
    ///
    /// # Errors
    ///
    /// - [`AuthError::TokenExpired`] for a structurally valid token whose
    ///   `exp` is in the past — callers commonly branch on this
    /// - [`AuthError::TokenInvalid`] for everything else: malformed
    ///   structure, disallowed or `none` algorithm, unresolvable key, bad
    ///   signature, audience/issuer mismatch, missing subject or email
    pub async fn validate_token(&self, token: &str) -> Result<HankoUser, AuthError> {
        let header = parse_header(token)?;

        if !self.allowed_algorithms.contains(&header.algorithm) {
            debug!(
                target: "auth.validator",
                alg = ?header.algorithm,
                "Token rejected: algorithm not in allow-list"
            );
            return Err(AuthError::TokenInvalid);
        }

        let key = match self.jwks.get_key(&header.kid).await {
            Ok(key) => key,
            Err(AuthError::UnknownKey { kid }) => {
                warn!(
                    target: "auth.validator",
                    kid = %kid,
                    "Token rejected: key id not present in key set"
                );
                return Err(AuthError::TokenInvalid);
            }
            Err(AuthError::KeySourceUnavailable(reason)) => {
                warn!(
                    target: "auth.validator",
                    reason = %reason,
                    "Token rejected: signing key source unavailable"
                );
                return Err(AuthError::TokenInvalid);
            }
            Err(other) => return Err(other),
        };

        // A key published for one algorithm must not verify a token claiming
        // another (key-confusion defense).
        if let Some(declared) = key.algorithm {
            if declared != header.algorithm {
                debug!(
                    target: "auth.validator",
                    header_alg = ?header.algorithm,
                    key_alg = ?declared,
                    "Token rejected: header algorithm disagrees with JWKS entry"
                );
                return Err(AuthError::TokenInvalid);
            }
        }

        let mut validation = Validation::new(header.algorithm);
        validation.leeway = 0; // exp must be strictly in the future
        validation.validate_exp = true;
        match &self.audience {
            Some(audience) => {
                validation.set_audience(&[audience]);
                // A configured audience is mandatory in the token, not
                // merely checked when present.
                validation.required_spec_claims.insert("aud".to_string());
            }
            None => validation.validate_aud = false,
        }
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
            validation.required_spec_claims.insert("iss".to_string());
        }

        let token_data = jsonwebtoken::decode::<serde_json::Map<String, serde_json::Value>>(
            token,
            &key.decoding_key,
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => {
                debug!(target: "auth.validator", error = %e, "Token verification failed");
                AuthError::TokenInvalid
            }
        })?;

        claims_to_user(token_data.claims)
    }
}

/// Select the credential from the request: `Authorization: Bearer` header
/// first, the named session cookie second.
///
/// A header with a different scheme or an empty value falls through to the
/// cookie rather than failing, matching how browsers and API clients mix
/// the two transports.
#[must_use]
pub fn bearer_token<'a>(
    authorization: Option<&'a str>,
    cookie: Option<&'a str>,
) -> Option<&'a str> {
    if let Some(header) = authorization {
        let mut parts = header.trim().splitn(2, ' ');
        if let (Some(scheme), Some(value)) = (parts.next(), parts.next()) {
            if scheme.eq_ignore_ascii_case("bearer") {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
    }

    cookie.filter(|c| !c.is_empty())
}

/// Parse the token header without verifying anything.
///
/// The size gate runs first so oversized garbage never reaches base64 or
/// JSON decoding. The extracted values are only trustworthy enough to pick
/// a key and an algorithm; the token must still be verified.
fn parse_header(token: &str) -> Result<TokenHeader, AuthError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        debug!(
            target: "auth.validator",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(AuthError::TokenInvalid);
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        debug!(
            target: "auth.validator",
            parts = parts.len(),
            "Token rejected: not header.payload.signature"
        );
        return Err(AuthError::TokenInvalid);
    }

    let header_part = parts.first().ok_or(AuthError::TokenInvalid)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        debug!(target: "auth.validator", error = %e, "Token rejected: header not base64url");
        AuthError::TokenInvalid
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        debug!(target: "auth.validator", error = %e, "Token rejected: header not JSON");
        AuthError::TokenInvalid
    })?;

    let alg = header
        .get("alg")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            debug!(target: "auth.validator", "Token rejected: header missing alg");
            AuthError::TokenInvalid
        })?;

    // Mandatory anti-forgery check: "none" is rejected no matter what the
    // rest of the header or the allow-list says.
    if alg.eq_ignore_ascii_case("none") {
        debug!(target: "auth.validator", "Token rejected: 'none' algorithm");
        return Err(AuthError::TokenInvalid);
    }

    let algorithm = Algorithm::from_str(alg).map_err(|_| {
        debug!(target: "auth.validator", alg = %alg, "Token rejected: unrecognized algorithm");
        AuthError::TokenInvalid
    })?;

    let kid = header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| {
            debug!(target: "auth.validator", "Token rejected: header missing kid");
            AuthError::TokenInvalid
        })?;

    Ok(TokenHeader { algorithm, kid })
}

/// Map a validated claim set to a [`HankoUser`].
///
/// `sub` and a usable email address are required. Hanko emits the email
/// either as a plain string claim or as an object carrying `address`; both
/// shapes are accepted.
fn claims_to_user(claims: serde_json::Map<String, serde_json::Value>) -> Result<HankoUser, AuthError> {
    let id = claims
        .get("sub")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| {
            debug!(target: "auth.validator", "Token rejected: missing sub claim");
            AuthError::TokenInvalid
        })?;

    let email = extract_email(&claims).ok_or_else(|| {
        debug!(target: "auth.validator", "Token rejected: missing email claim");
        AuthError::TokenInvalid
    })?;

    let name = claims
        .get("name")
        .and_then(|v| v.as_str())
        .map(ToString::to_string);

    let expires_at = claims
        .get("exp")
        .and_then(|v| v.as_i64())
        .and_then(|t| DateTime::from_timestamp(t, 0))
        .ok_or_else(|| {
            debug!(target: "auth.validator", "Token rejected: unusable exp claim");
            AuthError::TokenInvalid
        })?;

    let issued_at = claims
        .get("iat")
        .and_then(|v| v.as_i64())
        .and_then(|t| DateTime::from_timestamp(t, 0));

    Ok(HankoUser {
        id,
        email,
        name,
        issued_at,
        expires_at,
        claims,
    })
}

fn extract_email(claims: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    match claims.get("email") {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(serde_json::Value::Object(obj)) => obj
            .get("address")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(ToString::to_string),
        _ => None,
    }
}
