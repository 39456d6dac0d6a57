//! HOTOSM SSO authentication library.
//!
//! Validates Hanko-issued JWTs against the instance's published JWKS,
//! protects the OpenStreetMap account linkage inside an encrypted httpOnly
//! cookie payload, and correlates verified identities with application-local
//! user records.
//!
//! # Modules
//!
//! - `config` - Typed configuration, validated at construction
//! - `errors` - Error types
//! - `models` - Verified identity and OSM connection models
//! - `jwks` - Remote signing-key cache
//! - `validator` - JWT verification
//! - `crypto` - Cookie encryption/decryption
//! - `repositories` - Database access layer
//! - `services` - User mapping resolution
//!
//! # Usage
//!
//! ```rust,ignore
//! use hotosm_auth::{AuthConfig, CookieCrypto, JwtValidator};
//!
//! let config = AuthConfig::from_env()?;
//! let validator = JwtValidator::new(&config)?;
//! let crypto = CookieCrypto::new(&config.cookie_secret)?;
//!
//! // Per request:
//! let user = validator.validate_token(token).await?;
//! let osm = crypto.decrypt_osm_connection(cookie_value)?;
//! ```
//!
//! Construct the validator and cookie crypto once at startup and share them;
//! there is no process-global state.

pub mod config;
pub mod crypto;
pub mod errors;
pub mod jwks;
pub mod models;
pub mod repositories;
pub mod services;
pub mod validator;

pub use config::{AuthConfig, ConfigError, SameSite};
pub use crypto::CookieCrypto;
pub use errors::AuthError;
pub use jwks::JwksCache;
pub use models::{HankoUser, OsmConnection, OsmScope};
pub use repositories::mappings::HankoUserMapping;
pub use services::mapping_service::{
    resolve_app_user_id, AppUserDirectory, NoDirectory, ResolveOptions,
};
pub use validator::{bearer_token, JwtValidator};
