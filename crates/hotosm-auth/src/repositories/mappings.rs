//! User mapping repository.
//!
//! One row correlates a Hanko subject id with an application-local user id,
//! scoped per application. Uniqueness of `(hanko_user_id, app_name)` is
//! enforced by the database constraint, not application logic, because
//! multiple process instances may race on the first insert.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use crate::errors::AuthError;

/// Name of the unique constraint guarding one mapping per (subject, app).
const UNIQUE_CONSTRAINT: &str = "hanko_user_mappings_user_app_unique";

/// Mapping row (maps to the `hanko_user_mappings` table).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HankoUserMapping {
    pub hanko_user_id: String,
    pub app_user_id: String,
    pub app_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of an insert attempt.
#[derive(Debug)]
pub enum MappingInsert {
    /// The row was created by this call.
    Created(HankoUserMapping),

    /// The unique constraint fired: a row for this (subject, app) pair
    /// already exists — typically because a concurrent resolution won.
    Conflict,
}

/// Get the mapping for a subject within an application.
///
/// # Errors
///
/// Returns `AuthError::Database` on query failure.
pub async fn get(
    pool: &PgPool,
    hanko_user_id: &str,
    app_name: &str,
) -> Result<Option<HankoUserMapping>, AuthError> {
    let mapping = sqlx::query_as::<_, HankoUserMapping>(
        r#"
        SELECT hanko_user_id, app_user_id, app_name, created_at, updated_at
        FROM hanko_user_mappings
        WHERE hanko_user_id = $1 AND app_name = $2
        "#,
    )
    .bind(hanko_user_id)
    .bind(app_name)
    .fetch_optional(pool)
    .await
    .map_err(|e| AuthError::Database(format!("Failed to fetch user mapping: {e}")))?;

    Ok(mapping)
}

/// Insert a new mapping row.
///
/// A unique-constraint violation is not an error at this layer: it is
/// reported as [`MappingInsert::Conflict`] so the caller can re-read the row
/// the concurrent winner created.
///
/// # Errors
///
/// Returns `AuthError::Database` on any other query failure.
pub async fn insert(
    pool: &PgPool,
    hanko_user_id: &str,
    app_user_id: &str,
    app_name: &str,
) -> Result<MappingInsert, AuthError> {
    let result = sqlx::query_as::<_, HankoUserMapping>(
        r#"
        INSERT INTO hanko_user_mappings (hanko_user_id, app_user_id, app_name)
        VALUES ($1, $2, $3)
        RETURNING hanko_user_id, app_user_id, app_name, created_at, updated_at
        "#,
    )
    .bind(hanko_user_id)
    .bind(app_user_id)
    .bind(app_name)
    .fetch_one(pool)
    .await;

    match result {
        Ok(mapping) => Ok(MappingInsert::Created(mapping)),
        Err(e) if e.to_string().contains(UNIQUE_CONSTRAINT) => {
            debug!(
                target: "auth.mapping",
                app_name = %app_name,
                "Mapping insert lost a race; row already exists"
            );
            Ok(MappingInsert::Conflict)
        }
        Err(e) => Err(AuthError::Database(format!(
            "Failed to insert user mapping: {e}"
        ))),
    }
}

/// Manually create a mapping, e.g. from a data-migration script that links
/// pre-existing application users to their Hanko accounts.
///
/// Unlike [`insert`], a duplicate here is an error: a migration writing over
/// an existing mapping is a bug worth surfacing.
///
/// # Errors
///
/// Returns `AuthError::Database` on query failure, including duplicates.
pub async fn create_mapping(
    pool: &PgPool,
    hanko_user_id: &str,
    app_user_id: &str,
    app_name: &str,
) -> Result<HankoUserMapping, AuthError> {
    match insert(pool, hanko_user_id, app_user_id, app_name).await? {
        MappingInsert::Created(mapping) => Ok(mapping),
        MappingInsert::Conflict => Err(AuthError::Database(format!(
            "Mapping already exists for this user in {app_name}"
        ))),
    }
}

/// Reverse lookup: all mappings pointing at an application user id.
///
/// Served by the secondary index on `(app_user_id, app_name)`.
///
/// # Errors
///
/// Returns `AuthError::Database` on query failure.
pub async fn get_by_app_user(
    pool: &PgPool,
    app_user_id: &str,
    app_name: &str,
) -> Result<Vec<HankoUserMapping>, AuthError> {
    let mappings = sqlx::query_as::<_, HankoUserMapping>(
        r#"
        SELECT hanko_user_id, app_user_id, app_name, created_at, updated_at
        FROM hanko_user_mappings
        WHERE app_user_id = $1 AND app_name = $2
        ORDER BY created_at
        "#,
    )
    .bind(app_user_id)
    .bind(app_name)
    .fetch_all(pool)
    .await
    .map_err(|e| AuthError::Database(format!("Failed to fetch mappings by app user: {e}")))?;

    Ok(mappings)
}
