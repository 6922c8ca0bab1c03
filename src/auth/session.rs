use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tracing::error;
use uuid::Uuid;

use crate::users::User;

pub const SESSION_COOKIE: &str = "campus_session";
pub const SESSION_TTL_DAYS: i64 = 7;

pub async fn create_session(pool: &SqlitePool, user_id: i64) -> sqlx::Result<Uuid> {
    create_session_until(pool, user_id, Utc::now() + Duration::days(SESSION_TTL_DAYS)).await
}

pub async fn create_session_until(
    pool: &SqlitePool,
    user_id: i64,
    expires_at: DateTime<Utc>,
) -> sqlx::Result<Uuid> {
    let token = Uuid::new_v4();
    sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(token)
        .bind(user_id)
        .bind(expires_at.timestamp())
        .execute(pool)
        .await?;
    Ok(token)
}

pub async fn fetch_user_by_session(pool: &SqlitePool, token: Uuid) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "SELECT users.id, users.username, users.email, users.password_hash, users.role, users.created_at
         FROM sessions JOIN users ON users.id = sessions.user_id
         WHERE sessions.id = $1 AND sessions.expires_at > $2",
    )
    .bind(token)
    .bind(Utc::now().timestamp())
    .fetch_optional(pool)
    .await
}

/// Resolve the identifier held in a session cookie to its user.
///
/// Malformed, unknown and expired identifiers all come back as `None`, and so
/// do backend faults (after being logged): callers treat every miss as an
/// unauthenticated request.
pub async fn load_user(pool: &SqlitePool, stored_id: &str) -> Option<User> {
    let token = Uuid::parse_str(stored_id.trim()).ok()?;
    match fetch_user_by_session(pool, token).await {
        Ok(user) => user,
        Err(err) => {
            error!(?err, "failed to load session user");
            None
        }
    }
}

pub async fn revoke_session(pool: &SqlitePool, token: Uuid) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM sessions WHERE id = $1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn purge_expired_sessions(pool: &SqlitePool) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
        .bind(Utc::now().timestamp())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
