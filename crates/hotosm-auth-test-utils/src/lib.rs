//! # hotosm-auth test utilities
//!
//! Shared fixtures for testing the authentication library:
//! - Deterministic Ed25519 signing keys (same seed, same key)
//! - A test identity provider that publishes a JWKS document and signs
//!   tokens, standing in for a Hanko instance
//! - A fluent claims builder
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hotosm_auth_test_utils::{TestClaimsBuilder, TestIdentityProvider};
//!
//! let idp = TestIdentityProvider::new(1);
//! let claims = TestClaimsBuilder::new().for_subject("alice").build();
//! let token = idp.sign(&claims);
//! // Serve idp.jwks_document() from a mock server, then validate `token`.
//! ```

pub mod claims_builder;
pub mod crypto_fixtures;
pub mod idp;

pub use claims_builder::*;
pub use crypto_fixtures::*;
pub use idp::*;
