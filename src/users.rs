use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Student,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Fields needed to insert a user; the password must already be hashed.
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
}

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at";

/// Emails are the login key and compare case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
    ))
    .bind(normalize_email(email))
    .fetch_optional(pool)
    .await
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn insert(pool: &SqlitePool, user: NewUser<'_>) -> sqlx::Result<User> {
    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (username, email, password_hash, role, created_at)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(user.username.trim())
    .bind(normalize_email(user.email))
    .bind(user.password_hash)
    .bind(user.role)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
}

#[cfg(test)]
pub async fn count_by_role(pool: &SqlitePool, role: Role) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = $1")
        .bind(role)
        .fetch_one(pool)
        .await
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::db::{self, testing};

    async fn fresh_pool(dir: &std::path::Path) -> SqlitePool {
        let pool = db::connect(&testing::config_in(dir)).await.unwrap();
        db::ensure_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn insert_then_lookup_by_email_and_id() {
        let dir = tempdir().unwrap();
        let pool = fresh_pool(dir.path()).await;

        let created = insert(
            &pool,
            NewUser {
                username: "asha",
                email: "  Asha@Campus.EDU ",
                password_hash: "$argon2id$stub",
                role: Role::Student,
            },
        )
        .await
        .unwrap();

        assert_eq!(created.email, "asha@campus.edu");
        assert_eq!(created.role, Role::Student);

        let by_email = find_by_email(&pool, "ASHA@campus.edu").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);

        let by_id = find_by_id(&pool, created.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "asha");

        assert!(find_by_id(&pool, created.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let dir = tempdir().unwrap();
        let pool = fresh_pool(dir.path()).await;

        let first = NewUser {
            username: "one",
            email: "dup@campus.edu",
            password_hash: "x",
            role: Role::Student,
        };
        insert(&pool, first).await.unwrap();

        let second = NewUser {
            username: "two",
            email: "DUP@campus.edu",
            password_hash: "x",
            role: Role::Student,
        };
        let err = insert(&pool, second).await.unwrap_err();
        assert!(is_unique_violation(&err));
        assert_eq!(count_by_role(&pool, Role::Student).await.unwrap(), 1);
    }
}
