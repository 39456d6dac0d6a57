//! Resolution of verified identities to application-local user ids.
//!
//! Applications that predate the SSO migration keep their own user tables
//! and foreign keys. Rather than rewriting those, a mapping table correlates
//! each Hanko subject with the application's user id. This service is the
//! idempotent front door to that table: returning users hit a single lookup,
//! first-time users get a mapping created — optionally linked to an existing
//! application account by email — and concurrent first requests converge on
//! one row via the database's unique constraint.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::errors::AuthError;
use crate::models::HankoUser;
use crate::repositories::mappings::{self, MappingInsert};

/// Caller-supplied lookup and creation capabilities over the application's
/// own user store.
///
/// Both methods default to "capability not provided" (`Ok(None)`), so an
/// implementor overrides only what its application supports. [`NoDirectory`]
/// is the ready-made implementation with neither capability.
#[async_trait]
pub trait AppUserDirectory: Send + Sync {
    /// Find an existing application user by email, to link a pre-existing
    /// account instead of duplicating it.
    async fn find_by_email(&self, _email: &str) -> Result<Option<String>, AuthError> {
        Ok(None)
    }

    /// Create a new application user for this identity, returning its id.
    async fn create_app_user(&self, _user: &HankoUser) -> Result<Option<String>, AuthError> {
        Ok(None)
    }
}

/// Directory with no lookup or creation capability.
pub struct NoDirectory;

#[async_trait]
impl AppUserDirectory for NoDirectory {}

/// Options for [`resolve_app_user_id`].
pub struct ResolveOptions {
    /// Create the mapping (and possibly the application user) when none
    /// exists. When false, a missing mapping is `MappingNotFound`.
    pub auto_create: bool,

    /// Generator for fresh application user ids, used when the directory
    /// yields nothing. Without one, the Hanko subject id is reused.
    pub id_generator: Option<Box<dyn Fn() -> String + Send + Sync>>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            auto_create: true,
            id_generator: None,
        }
    }
}

impl std::fmt::Debug for ResolveOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolveOptions")
            .field("auto_create", &self.auto_create)
            .field("id_generator", &self.id_generator.is_some())
            .finish()
    }
}

/// Resolve the application-local user id for a verified identity.
///
/// Fast path: an existing mapping row answers immediately. On a miss with
/// `auto_create` enabled, the new id is chosen in order of preference:
/// directory email lookup (links an existing account), directory user
/// creation, the configured `id_generator`, and finally the Hanko subject id
/// itself.
///
/// **Caution on the subject-id fallback**: it reuses the identity-provider
/// namespace as the application's user-id namespace. If the application
/// later adds email-based linking, a subject that already got a
/// subject-id-shaped mapping will keep it — the two defaults do not merge.
/// Supply a directory or an `id_generator` from the start if the namespaces
/// must stay distinct.
///
/// Two concurrent first-time calls for the same (subject, app) both return
/// the same id: the insert loser detects the unique-constraint conflict and
/// re-reads the winner's row.
///
/// # Errors
///
/// - [`AuthError::MappingNotFound`] when no row exists and `auto_create` is
///   disabled (callers usually translate this to "needs onboarding")
/// - [`AuthError::Database`] on query failure
pub async fn resolve_app_user_id(
    pool: &PgPool,
    user: &HankoUser,
    app_name: &str,
    directory: &dyn AppUserDirectory,
    options: &ResolveOptions,
) -> Result<String, AuthError> {
    if let Some(mapping) = mappings::get(pool, &user.id, app_name).await? {
        debug!(
            target: "auth.mapping",
            app_name = %app_name,
            "Mapping found"
        );
        return Ok(mapping.app_user_id);
    }

    if !options.auto_create {
        warn!(
            target: "auth.mapping",
            app_name = %app_name,
            "No mapping and auto-create disabled"
        );
        return Err(AuthError::MappingNotFound {
            app_name: app_name.to_string(),
        });
    }

    // Choose the application user id: link by email, create, generate,
    // or fall back to the subject id.
    let mut app_user_id = directory.find_by_email(&user.email).await?;
    if let Some(existing) = &app_user_id {
        info!(
            target: "auth.mapping",
            app_name = %app_name,
            app_user_id = %existing,
            "Linking existing application user by email"
        );
    }

    if app_user_id.is_none() {
        app_user_id = directory.create_app_user(user).await?;
        if let Some(created) = &app_user_id {
            info!(
                target: "auth.mapping",
                app_name = %app_name,
                app_user_id = %created,
                "Created new application user"
            );
        }
    }

    let app_user_id = app_user_id.unwrap_or_else(|| match &options.id_generator {
        Some(generate) => generate(),
        None => user.id.clone(),
    });

    match mappings::insert(pool, &user.id, &app_user_id, app_name).await? {
        MappingInsert::Created(mapping) => {
            info!(
                target: "auth.mapping",
                app_name = %app_name,
                app_user_id = %mapping.app_user_id,
                "Mapping created"
            );
            Ok(mapping.app_user_id)
        }
        MappingInsert::Conflict => {
            // Another resolution won the race; its row is authoritative,
            // including an app_user_id that may differ from the one chosen
            // above.
            let mapping = mappings::get(pool, &user.id, app_name).await?.ok_or_else(|| {
                AuthError::Database(
                    "Mapping insert conflicted but no row is visible".to_string(),
                )
            })?;
            debug!(
                target: "auth.mapping",
                app_name = %app_name,
                "Returning mapping created by concurrent resolution"
            );
            Ok(mapping.app_user_id)
        }
    }
}
