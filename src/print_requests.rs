use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::pricing::{PrintQuote, PrintType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PrintStatus {
    Pending,
    Printing,
    Completed,
    Cancelled,
}

impl PrintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrintStatus::Pending => "pending",
            PrintStatus::Printing => "printing",
            PrintStatus::Completed => "completed",
            PrintStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PrintRequest {
    pub id: i64,
    pub user_id: i64,
    pub original_filename: String,
    #[serde(skip_serializing)]
    pub stored_filename: String,
    pub file_size: i64,
    pub print_type: PrintType,
    pub pages: i64,
    pub copies: i64,
    pub double_sided: bool,
    pub total_pages: i64,
    pub total_cost: i64,
    pub status: PrintStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewPrintRequest<'a> {
    pub user_id: i64,
    pub original_filename: &'a str,
    pub stored_filename: &'a str,
    pub file_size: i64,
    pub print_type: PrintType,
    pub pages: i64,
    pub copies: i64,
    pub double_sided: bool,
    pub quote: PrintQuote,
}

const PRINT_REQUEST_COLUMNS: &str = "id, user_id, original_filename, stored_filename, file_size, print_type, pages, copies, double_sided, total_pages, total_cost, status, created_at, updated_at";

pub async fn insert(pool: &SqlitePool, request: NewPrintRequest<'_>) -> sqlx::Result<PrintRequest> {
    let now = Utc::now();
    sqlx::query_as::<_, PrintRequest>(&format!(
        "INSERT INTO print_requests
            (user_id, original_filename, stored_filename, file_size, print_type, pages, copies,
             double_sided, total_pages, total_cost, status, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
         RETURNING {PRINT_REQUEST_COLUMNS}"
    ))
    .bind(request.user_id)
    .bind(request.original_filename)
    .bind(request.stored_filename)
    .bind(request.file_size)
    .bind(request.print_type)
    .bind(request.pages)
    .bind(request.copies)
    .bind(request.double_sided)
    .bind(request.quote.total_pages)
    .bind(request.quote.total_cost)
    .bind(PrintStatus::Pending)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub async fn list_for_user(pool: &SqlitePool, user_id: i64) -> sqlx::Result<Vec<PrintRequest>> {
    sqlx::query_as::<_, PrintRequest>(&format!(
        "SELECT {PRINT_REQUEST_COLUMNS} FROM print_requests WHERE user_id = $1 ORDER BY id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn list_all(pool: &SqlitePool) -> sqlx::Result<Vec<PrintRequest>> {
    sqlx::query_as::<_, PrintRequest>(&format!(
        "SELECT {PRINT_REQUEST_COLUMNS} FROM print_requests ORDER BY id DESC"
    ))
    .fetch_all(pool)
    .await
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<PrintRequest>> {
    sqlx::query_as::<_, PrintRequest>(&format!(
        "SELECT {PRINT_REQUEST_COLUMNS} FROM print_requests WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Returns `None` when no request has this id.
pub async fn update_status(
    pool: &SqlitePool,
    id: i64,
    status: PrintStatus,
) -> sqlx::Result<Option<PrintRequest>> {
    sqlx::query_as::<_, PrintRequest>(&format!(
        "UPDATE print_requests SET status = $1, updated_at = $2 WHERE id = $3
         RETURNING {PRINT_REQUEST_COLUMNS}"
    ))
    .bind(status)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::{
        db::{self, testing},
        pricing,
        users::{self, NewUser, Role},
    };

    #[tokio::test]
    async fn insert_list_and_update_status() {
        let dir = tempdir().unwrap();
        let pool = db::connect(&testing::config_in(dir.path())).await.unwrap();
        db::ensure_schema(&pool).await.unwrap();

        let owner = users::insert(
            &pool,
            NewUser {
                username: "kiran",
                email: "kiran@campus.edu",
                password_hash: "x",
                role: Role::Student,
            },
        )
        .await
        .unwrap();

        let created = insert(
            &pool,
            NewPrintRequest {
                user_id: owner.id,
                original_filename: "thesis.pdf",
                stored_filename: "abc_thesis.pdf",
                file_size: 2048,
                print_type: PrintType::Color,
                pages: 3,
                copies: 2,
                double_sided: true,
                quote: pricing::quote(PrintType::Color, 3, 2, true),
            },
        )
        .await
        .unwrap();

        assert_eq!(created.status, PrintStatus::Pending);
        assert_eq!(created.total_pages, 3);
        assert_eq!(created.total_cost, 60);

        let mine = list_for_user(&pool, owner.id).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert!(list_for_user(&pool, owner.id + 1).await.unwrap().is_empty());
        assert_eq!(list_all(&pool).await.unwrap().len(), 1);

        let fetched = find_by_id(&pool, created.id).await.unwrap().unwrap();
        assert_eq!(fetched.stored_filename, "abc_thesis.pdf");
        assert!(find_by_id(&pool, created.id + 10).await.unwrap().is_none());

        let updated = update_status(&pool, created.id, PrintStatus::Printing)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, PrintStatus::Printing);

        assert!(
            update_status(&pool, created.id + 10, PrintStatus::Completed)
                .await
                .unwrap()
                .is_none()
        );
    }
}
