//! Error types for the authentication library.
//!
//! The token and cookie kinds carry deliberately generic display strings:
//! callers see "invalid" or "expired" and nothing else, while the specific
//! rejection reason is logged at debug level where it occurred. Expiry is a
//! distinct kind because session middleware commonly branches on it (silent
//! re-authentication vs. hard rejection).

use thiserror::Error;

/// Errors produced by token validation, cookie crypto, and user mapping.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed, unverifiable, or claim-mismatched token.
    #[error("The access token is invalid")]
    TokenInvalid,

    /// Structurally valid token whose `exp` is in the past.
    #[error("The access token has expired")]
    TokenExpired,

    /// The key set was fetched fresh and still does not contain the key id.
    ///
    /// Surfaced to validator callers as [`AuthError::TokenInvalid`]; the
    /// distinction exists for the JWKS cache's own callers and for logs.
    #[error("No signing key found for kid {kid}")]
    UnknownKey { kid: String },

    /// The JWKS endpoint could not be fetched or returned a malformed
    /// document. Transient: the next request naturally retries.
    #[error("Signing key source unavailable: {0}")]
    KeySourceUnavailable(String),

    /// Any cookie integrity or format failure. Deliberately undifferentiated
    /// so the error gives no oracle between "wrong key" and "corrupted data".
    #[error("Cookie decryption failed")]
    CookieDecryption,

    /// No mapping row exists and auto-creation was disabled.
    #[error("No user mapping for application {app_name}")]
    MappingNotFound { app_name: String },

    /// Database error from the mapping repository.
    #[error("Database error: {0}")]
    Database(String),

    /// Local cryptographic malfunction (RNG, cipher construction). Not an
    /// input-validation failure.
    #[error("Cryptographic error: {0}")]
    Crypto(String),
}
