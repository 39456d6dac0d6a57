//! Authentication configuration.
//!
//! [`AuthConfig`] is an explicit, typed record validated at construction:
//! a cookie secret shorter than 32 bytes or an empty algorithm allow-list is
//! rejected here, not on first use. Load from the process environment with
//! [`AuthConfig::from_env`] or from a map with [`AuthConfig::from_vars`]
//! (the latter exists for tests).

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Minimum cookie secret length in bytes (AES-256 key material is derived
/// from it, and anything shorter is trivially brute-forceable).
pub const MIN_COOKIE_SECRET_BYTES: usize = 32;

/// Default time-to-live for the cached JWKS document.
pub const DEFAULT_JWKS_TTL: Duration = Duration::from_secs(300);

/// Default HTTP request timeout for the JWKS fetch.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while constructing an [`AuthConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Cookie secret too short: {len} bytes (minimum {MIN_COOKIE_SECRET_BYTES})")]
    CookieSecretTooShort { len: usize },

    #[error("Invalid SameSite policy: {0}")]
    InvalidSameSite(String),

    #[error("Invalid signature algorithm: {0}")]
    InvalidAlgorithm(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid duration value: {0}")]
    InvalidDuration(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// SameSite attribute for the OSM connection cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    Strict,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Lax => write!(f, "Lax"),
            SameSite::Strict => write!(f, "Strict"),
            SameSite::None => write!(f, "None"),
        }
    }
}

impl FromStr for SameSite {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lax" => Ok(SameSite::Lax),
            "strict" => Ok(SameSite::Strict),
            "none" => Ok(SameSite::None),
            other => Err(ConfigError::InvalidSameSite(other.to_string())),
        }
    }
}

/// Authentication configuration.
///
/// Construct with [`AuthConfig::new`] and refine with the `with_*` builders,
/// or load from the environment. The cookie secret is held as a
/// [`SecretString`] and redacted in `Debug` output.
#[derive(Clone)]
pub struct AuthConfig {
    /// Base URL of the Hanko instance (e.g. `https://login.hotosm.org`).
    pub hanko_api_url: String,

    /// JWKS document URL, derived from `hanko_api_url`.
    pub jwks_url: String,

    /// Signature algorithms accepted from token headers. Never empty; the
    /// "none" algorithm cannot be expressed here and is rejected separately.
    pub allowed_algorithms: Vec<Algorithm>,

    /// Expected `aud` claim. Validated only when set.
    pub audience: Option<String>,

    /// Expected `iss` claim. Validated only when set.
    pub issuer: Option<String>,

    /// Secret the cookie encryption key is derived from (≥ 32 bytes).
    pub cookie_secret: SecretString,

    /// Domain attribute for the OSM connection cookie.
    pub cookie_domain: Option<String>,

    /// Secure attribute for the OSM connection cookie.
    pub cookie_secure: bool,

    /// SameSite attribute for the OSM connection cookie.
    pub cookie_samesite: SameSite,

    /// How long a fetched JWKS document is served without refetching.
    pub jwks_ttl: Duration,

    /// HTTP request timeout for the JWKS fetch.
    pub http_timeout: Duration,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("hanko_api_url", &self.hanko_api_url)
            .field("jwks_url", &self.jwks_url)
            .field("allowed_algorithms", &self.allowed_algorithms)
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .field("cookie_secret", &"[REDACTED]")
            .field("cookie_domain", &self.cookie_domain)
            .field("cookie_secure", &self.cookie_secure)
            .field("cookie_samesite", &self.cookie_samesite)
            .field("jwks_ttl", &self.jwks_ttl)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl AuthConfig {
    /// Create a configuration from the Hanko base URL and the cookie secret.
    ///
    /// Defaults: RS256 only, no audience/issuer check, secure Lax cookies,
    /// 5 minute JWKS TTL, 10 second fetch timeout.
    ///
    /// # Errors
    ///
    /// - `CookieSecretTooShort` if the secret is under 32 bytes
    /// - `InvalidUrl` if the base URL is empty or not http(s)
    pub fn new(hanko_api_url: String, cookie_secret: SecretString) -> Result<Self, ConfigError> {
        let secret_len = cookie_secret.expose_secret().len();
        if secret_len < MIN_COOKIE_SECRET_BYTES {
            return Err(ConfigError::CookieSecretTooShort { len: secret_len });
        }

        if !hanko_api_url.starts_with("http://") && !hanko_api_url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(hanko_api_url));
        }

        let base = hanko_api_url.trim_end_matches('/').to_string();
        let jwks_url = format!("{base}/.well-known/jwks.json");

        Ok(Self {
            hanko_api_url: base,
            jwks_url,
            allowed_algorithms: vec![Algorithm::RS256],
            audience: None,
            issuer: None,
            cookie_secret,
            cookie_domain: None,
            cookie_secure: true,
            cookie_samesite: SameSite::Lax,
            jwks_ttl: DEFAULT_JWKS_TTL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Required: `HANKO_API_URL`, `COOKIE_SECRET`. Optional: `HANKO_AUDIENCE`,
    /// `HANKO_ISSUER`, `COOKIE_DOMAIN`, `COOKIE_SECURE`, `COOKIE_SAMESITE`,
    /// `JWKS_TTL_SECONDS`, `ALLOWED_ALGORITHMS` (comma-separated).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or any value
    /// fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a map (for testing).
    ///
    /// # Errors
    ///
    /// Same as [`AuthConfig::from_env`].
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let hanko_api_url = vars
            .get("HANKO_API_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("HANKO_API_URL".to_string()))?
            .clone();

        let cookie_secret = vars
            .get("COOKIE_SECRET")
            .ok_or_else(|| ConfigError::MissingEnvVar("COOKIE_SECRET".to_string()))?
            .clone();

        let mut config = Self::new(hanko_api_url, SecretString::from(cookie_secret))?;

        config.audience = vars.get("HANKO_AUDIENCE").cloned();
        config.issuer = vars.get("HANKO_ISSUER").cloned();
        config.cookie_domain = vars.get("COOKIE_DOMAIN").cloned();

        if let Some(secure) = vars.get("COOKIE_SECURE") {
            config.cookie_secure = secure.eq_ignore_ascii_case("true") || secure == "1";
        }

        if let Some(samesite) = vars.get("COOKIE_SAMESITE") {
            config.cookie_samesite = samesite.parse()?;
        }

        if let Some(ttl) = vars.get("JWKS_TTL_SECONDS") {
            let secs: u64 = ttl
                .parse()
                .map_err(|_| ConfigError::InvalidDuration(format!("JWKS_TTL_SECONDS={ttl}")))?;
            config.jwks_ttl = Duration::from_secs(secs);
        }

        if let Some(algs) = vars.get("ALLOWED_ALGORITHMS") {
            config.allowed_algorithms = parse_algorithms(algs)?;
        }

        Ok(config)
    }

    /// Set the accepted signature algorithms.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAlgorithm` if the list is empty.
    pub fn with_allowed_algorithms(
        mut self,
        algorithms: Vec<Algorithm>,
    ) -> Result<Self, ConfigError> {
        if algorithms.is_empty() {
            return Err(ConfigError::InvalidAlgorithm(
                "allow-list must not be empty".to_string(),
            ));
        }
        self.allowed_algorithms = algorithms;
        Ok(self)
    }

    /// Set the expected audience.
    #[must_use]
    pub fn with_audience(mut self, audience: String) -> Self {
        self.audience = Some(audience);
        self
    }

    /// Set the expected issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: String) -> Self {
        self.issuer = Some(issuer);
        self
    }

    /// Set the cookie domain.
    #[must_use]
    pub fn with_cookie_domain(mut self, domain: String) -> Self {
        self.cookie_domain = Some(domain);
        self
    }

    /// Set the JWKS cache TTL.
    #[must_use]
    pub fn with_jwks_ttl(mut self, ttl: Duration) -> Self {
        self.jwks_ttl = ttl;
        self
    }

    /// Set the HTTP request timeout for JWKS fetches.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}

/// Parse a comma-separated algorithm list (e.g. `"RS256,EdDSA"`).
fn parse_algorithms(list: &str) -> Result<Vec<Algorithm>, ConfigError> {
    let algorithms: Vec<Algorithm> = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Algorithm::from_str(s).map_err(|_| ConfigError::InvalidAlgorithm(s.to_string()))
        })
        .collect::<Result<_, _>>()?;

    if algorithms.is_empty() {
        return Err(ConfigError::InvalidAlgorithm(
            "allow-list must not be empty".to_string(),
        ));
    }

    Ok(algorithms)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn test_secret() -> String {
        "0123456789abcdef0123456789abcdef".to_string() // 32 bytes
    }

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "HANKO_API_URL".to_string(),
                "https://login.hotosm.org".to_string(),
            ),
            ("COOKIE_SECRET".to_string(), test_secret()),
        ])
    }

    #[test]
    fn test_from_vars_success() {
        let config = AuthConfig::from_vars(&base_vars()).expect("config should load");

        assert_eq!(config.hanko_api_url, "https://login.hotosm.org");
        assert_eq!(
            config.jwks_url,
            "https://login.hotosm.org/.well-known/jwks.json"
        );
        assert_eq!(config.allowed_algorithms, vec![Algorithm::RS256]);
        assert!(config.cookie_secure);
        assert_eq!(config.cookie_samesite, SameSite::Lax);
        assert_eq!(config.jwks_ttl, DEFAULT_JWKS_TTL);
    }

    #[test]
    fn test_from_vars_missing_url() {
        let vars = HashMap::from([("COOKIE_SECRET".to_string(), test_secret())]);
        let result = AuthConfig::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "HANKO_API_URL"));
    }

    #[test]
    fn test_from_vars_missing_secret() {
        let vars = HashMap::from([(
            "HANKO_API_URL".to_string(),
            "https://login.hotosm.org".to_string(),
        )]);
        let result = AuthConfig::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "COOKIE_SECRET"));
    }

    #[test]
    fn test_short_secret_rejected_at_construction() {
        let result = AuthConfig::new(
            "https://login.hotosm.org".to_string(),
            SecretString::from("too-short"),
        );
        assert!(matches!(
            result,
            Err(ConfigError::CookieSecretTooShort { len: 9 })
        ));
    }

    #[test]
    fn test_secret_at_exact_minimum_accepted() {
        let result = AuthConfig::new(
            "https://login.hotosm.org".to_string(),
            SecretString::from("a".repeat(MIN_COOKIE_SECRET_BYTES)),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_non_http_url_rejected() {
        let result = AuthConfig::new(
            "login.hotosm.org".to_string(),
            SecretString::from(test_secret()),
        );
        assert!(matches!(result, Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_trailing_slash_trimmed_from_url() {
        let config = AuthConfig::new(
            "https://login.hotosm.org/".to_string(),
            SecretString::from(test_secret()),
        )
        .unwrap();
        assert_eq!(
            config.jwks_url,
            "https://login.hotosm.org/.well-known/jwks.json"
        );
    }

    #[test]
    fn test_samesite_parsing() {
        assert_eq!("lax".parse::<SameSite>().unwrap(), SameSite::Lax);
        assert_eq!("Strict".parse::<SameSite>().unwrap(), SameSite::Strict);
        assert_eq!("NONE".parse::<SameSite>().unwrap(), SameSite::None);
        assert!(matches!(
            "sideways".parse::<SameSite>(),
            Err(ConfigError::InvalidSameSite(_))
        ));
    }

    #[test]
    fn test_samesite_display() {
        assert_eq!(SameSite::Lax.to_string(), "Lax");
        assert_eq!(SameSite::Strict.to_string(), "Strict");
        assert_eq!(SameSite::None.to_string(), "None");
    }

    #[test]
    fn test_allowed_algorithms_from_env() {
        let mut vars = base_vars();
        vars.insert("ALLOWED_ALGORITHMS".to_string(), "RS256, EdDSA".to_string());

        let config = AuthConfig::from_vars(&vars).unwrap();
        assert_eq!(
            config.allowed_algorithms,
            vec![Algorithm::RS256, Algorithm::EdDSA]
        );
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        let mut vars = base_vars();
        vars.insert("ALLOWED_ALGORITHMS".to_string(), "ROT13".to_string());

        let result = AuthConfig::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidAlgorithm(a)) if a == "ROT13"));
    }

    #[test]
    fn test_empty_algorithm_list_rejected() {
        let mut vars = base_vars();
        vars.insert("ALLOWED_ALGORITHMS".to_string(), " , ".to_string());

        let result = AuthConfig::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidAlgorithm(_))));
    }

    #[test]
    fn test_cookie_overrides() {
        let mut vars = base_vars();
        vars.insert("COOKIE_SECURE".to_string(), "false".to_string());
        vars.insert("COOKIE_SAMESITE".to_string(), "strict".to_string());
        vars.insert("COOKIE_DOMAIN".to_string(), ".hotosm.org".to_string());

        let config = AuthConfig::from_vars(&vars).unwrap();
        assert!(!config.cookie_secure);
        assert_eq!(config.cookie_samesite, SameSite::Strict);
        assert_eq!(config.cookie_domain.as_deref(), Some(".hotosm.org"));
    }

    #[test]
    fn test_builder_methods() {
        let config = AuthConfig::new(
            "https://login.hotosm.org".to_string(),
            SecretString::from(test_secret()),
        )
        .unwrap()
        .with_audience("drone-tm".to_string())
        .with_issuer("https://login.hotosm.org".to_string())
        .with_jwks_ttl(Duration::from_secs(60))
        .with_http_timeout(Duration::from_secs(2));

        assert_eq!(config.audience.as_deref(), Some("drone-tm"));
        assert_eq!(config.issuer.as_deref(), Some("https://login.hotosm.org"));
        assert_eq!(config.jwks_ttl, Duration::from_secs(60));
        assert_eq!(config.http_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_debug_redacts_cookie_secret() {
        let config = AuthConfig::new(
            "https://login.hotosm.org".to_string(),
            SecretString::from(test_secret()),
        )
        .unwrap();

        let debug_str = format!("{config:?}");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("0123456789abcdef"));
    }
}
