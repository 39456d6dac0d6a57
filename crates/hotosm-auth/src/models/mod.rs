//! Data models for verified identities and the OSM account linkage.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A verified Hanko identity, produced only by the JWT validator after a
/// successful verification. Immutable; discarded at end of request scope.
///
/// The full claim set is retained in [`HankoUser::claims`] so callers can
/// read provider-specific extensions without re-parsing the token.
#[derive(Clone)]
pub struct HankoUser {
    /// Stable subject identifier (the `sub` claim). Globally unique and
    /// stable across sessions; independent of email and display name.
    pub id: String,

    /// Email address asserted by the provider. May be unverified there.
    pub email: String,

    /// Display name, when the provider supplies one.
    pub name: Option<String>,

    /// When the token was issued.
    pub issued_at: Option<DateTime<Utc>>,

    /// When the token expires.
    pub expires_at: DateTime<Utc>,

    /// The complete validated claim set.
    pub claims: serde_json::Map<String, serde_json::Value>,
}

/// `id` and `email` identify a person; keep them out of logs.
impl fmt::Debug for HankoUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HankoUser")
            .field("id", &"[REDACTED]")
            .field("email", &"[REDACTED]")
            .field("name", &self.name)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("claims", &format!("{} claims", self.claims.len()))
            .finish()
    }
}

/// OAuth2 scopes grantable by the OpenStreetMap provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsmScope {
    ReadPrefs,
    WritePrefs,
    WriteApi,
    ReadGpx,
    WriteGpx,
    WriteNotes,
    WriteDiary,
    WriteRedactions,
    Openid,
}

impl fmt::Display for OsmScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OsmScope::ReadPrefs => "read_prefs",
            OsmScope::WritePrefs => "write_prefs",
            OsmScope::WriteApi => "write_api",
            OsmScope::ReadGpx => "read_gpx",
            OsmScope::WriteGpx => "write_gpx",
            OsmScope::WriteNotes => "write_notes",
            OsmScope::WriteDiary => "write_diary",
            OsmScope::WriteRedactions => "write_redactions",
            OsmScope::Openid => "openid",
        };
        write!(f, "{s}")
    }
}

/// The OSM account linkage stored client-side inside the encrypted cookie.
///
/// Serialized with serde_json before encryption; the plaintext never leaves
/// the process. `Debug` redacts both OAuth tokens.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct OsmConnection {
    /// OSM display name of the linked account.
    pub osm_username: String,

    /// Numeric OSM account id.
    pub osm_id: i64,

    /// OAuth access token for the OSM API.
    pub access_token: String,

    /// OAuth refresh token, when the provider issued one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub refresh_token: Option<String>,

    /// Access-token expiry. Also drives the cookie max-age at the caller.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expires_at: Option<DateTime<Utc>>,

    /// Scopes granted during authorization.
    #[serde(default)]
    pub scopes: Vec<OsmScope>,
}

impl OsmConnection {
    /// Remaining token lifetime in whole seconds, for deriving the cookie
    /// max-age. `None` when no expiry is recorded; zero once expired.
    #[must_use]
    pub fn cookie_max_age(&self) -> Option<i64> {
        self.expires_at
            .map(|expires| (expires - Utc::now()).num_seconds().max(0))
    }
}

impl fmt::Debug for OsmConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OsmConnection")
            .field("osm_username", &self.osm_username)
            .field("osm_id", &self.osm_id)
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}
