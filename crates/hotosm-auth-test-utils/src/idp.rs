//! A stand-in identity provider for tests.
//!
//! Wraps a deterministic Ed25519 keypair behind the two things a validator
//! sees from a real provider: a JWKS document and signed tokens.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

use crate::crypto_fixtures::test_signing_key;

/// Test identity provider with a single Ed25519 signing key.
pub struct TestIdentityProvider {
    kid: String,
    public_key: Vec<u8>,
    private_key_pkcs8: Vec<u8>,
}

impl TestIdentityProvider {
    /// Create a provider whose key is derived from `seed`. The key id is
    /// `test-key-<seed>`.
    pub fn new(seed: u8) -> Self {
        let (public_key, private_key_pkcs8) =
            test_signing_key(seed).expect("test keypair generation");
        Self {
            kid: format!("test-key-{seed:02}"),
            public_key,
            private_key_pkcs8,
        }
    }

    /// The provider's key id.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// This provider's key as a single JWK entry.
    pub fn jwk(&self) -> Value {
        json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "kid": self.kid,
            "alg": "EdDSA",
            "use": "sig",
            "x": URL_SAFE_NO_PAD.encode(&self.public_key),
        })
    }

    /// A complete JWKS document containing only this provider's key.
    ///
    /// For rotation scenarios, combine several providers:
    /// `json!({"keys": [old.jwk(), new.jwk()]})`.
    pub fn jwks_document(&self) -> Value {
        json!({ "keys": [self.jwk()] })
    }

    /// Sign claims into a JWT with this provider's key and kid.
    pub fn sign(&self, claims: &Value) -> String {
        self.sign_with_kid(claims, &self.kid)
    }

    /// Sign claims but stamp an arbitrary kid into the header. Useful for
    /// unknown-kid scenarios.
    pub fn sign_with_kid(&self, claims: &Value, kid: &str) -> String {
        let mut header = Header::new(Algorithm::EdDSA);
        header.typ = Some("JWT".to_string());
        header.kid = Some(kid.to_string());

        let encoding_key = EncodingKey::from_ed_der(&self.private_key_pkcs8);
        jsonwebtoken::encode(&header, claims, &encoding_key).expect("test token signing")
    }

    /// Build a token with `alg: none` and an empty signature. Never valid;
    /// exists to prove the validator rejects it.
    pub fn unsigned_token(&self, claims: &Value) -> String {
        let header = json!({"alg": "none", "typ": "JWT", "kid": self.kid});
        let header_b64 =
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).expect("header serialization"));
        let claims_b64 =
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).expect("claims serialization"));
        format!("{header_b64}.{claims_b64}.")
    }
}
