//! Builder patterns for test data construction.

use chrono::{Duration, Utc};
use serde_json::{json, Value};

/// Builder for Hanko-shaped JWT claims.
///
/// # Example
/// ```rust,ignore
/// let claims = TestClaimsBuilder::new()
///     .for_subject("alice-uuid")
///     .with_email("alice@example.org")
///     .expires_in(3600)
///     .build();
/// ```
pub struct TestClaimsBuilder {
    sub: String,
    email: Value,
    name: Option<String>,
    aud: Option<String>,
    iss: Option<String>,
    exp: i64,
    iat: i64,
}

impl TestClaimsBuilder {
    /// Create a builder with sensible defaults: a fixed subject, a string
    /// email claim, and a one-hour expiry.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: "test-subject".to_string(),
            email: json!("test@example.org"),
            name: None,
            aud: None,
            iss: None,
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Set the subject.
    pub fn for_subject(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    /// Set the email as a plain string claim.
    pub fn with_email(mut self, email: &str) -> Self {
        self.email = json!(email);
        self
    }

    /// Set the email in Hanko's object form (`{"address": ..., "is_verified": ...}`).
    pub fn with_email_object(mut self, address: &str, is_verified: bool) -> Self {
        self.email = json!({"address": address, "is_verified": is_verified});
        self
    }

    /// Set the display name.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Set the audience claim.
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.aud = Some(audience.to_string());
        self
    }

    /// Set the issuer claim.
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.iss = Some(issuer.to_string());
        self
    }

    /// Set expiration in seconds from now (negative for an already-expired
    /// token).
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set the issued-at timestamp.
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    /// Build the claims as a JSON value.
    pub fn build(self) -> Value {
        let mut claims = json!({
            "sub": self.sub,
            "email": self.email,
            "exp": self.exp,
            "iat": self.iat,
        });
        let obj = claims.as_object_mut().expect("claims are an object");
        if let Some(name) = self.name {
            obj.insert("name".to_string(), json!(name));
        }
        if let Some(aud) = self.aud {
            obj.insert("aud".to_string(), json!(aud));
        }
        if let Some(iss) = self.iss {
            obj.insert("iss".to_string(), json!(iss));
        }
        claims
    }
}

impl Default for TestClaimsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
