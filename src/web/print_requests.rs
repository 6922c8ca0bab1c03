use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    pricing::{self, PrintType},
    print_requests::{self, NewPrintRequest, PrintRequest, PrintStatus},
    web::{
        AppState,
        extract::{AdminUser, CurrentUser},
        responses::{ApiMessage, json_error},
        storage,
        uploads::{self, FileFieldConfig, UploadOutcome},
    },
};

const DOCUMENT_FIELD: &str = "file";
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx"];
const MAX_PAGES: i64 = 1000;
const MAX_COPIES: i64 = 100;

type ApiError = (StatusCode, Json<ApiMessage>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PrintOptions {
    print_type: PrintType,
    pages: i64,
    copies: i64,
    double_sided: bool,
}

impl PrintOptions {
    /// Read job options from the non-file form fields. Missing page counts are
    /// estimated from the document size.
    fn from_form(outcome: &UploadOutcome, file_size: u64) -> Result<Self, String> {
        let print_type = match outcome.first_text("print_type") {
            Some(raw) => {
                PrintType::parse(raw).ok_or_else(|| format!("Unknown print type `{raw}`"))?
            }
            None => PrintType::Bw,
        };

        let pages = match outcome.first_text("pages") {
            Some(raw) => parse_bounded("pages", raw, MAX_PAGES)?,
            None => pricing::estimate_pages(file_size),
        };

        let copies = match outcome.first_text("copies") {
            Some(raw) => parse_bounded("copies", raw, MAX_COPIES)?,
            None => 1,
        };

        let double_sided = outcome.first_text("double_sided").is_some_and(|raw| {
            matches!(
                raw.to_ascii_lowercase().as_str(),
                "on" | "true" | "1" | "yes"
            )
        });

        Ok(Self {
            print_type,
            pages,
            copies,
            double_sided,
        })
    }
}

fn parse_bounded(field: &str, raw: &str, max: i64) -> Result<i64, String> {
    match raw.parse::<i64>() {
        Ok(value) if (1..=max).contains(&value) => Ok(value),
        _ => Err(format!("`{field}` must be a whole number from 1 to {max}")),
    }
}

pub async fn create_print_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<PrintRequest>), ApiError> {
    let prefix = format!("{}_", Uuid::new_v4().simple());
    let fields = [FileFieldConfig::new(
        DOCUMENT_FIELD,
        DOCUMENT_EXTENSIONS,
        1,
        &prefix,
    )];

    let outcome = uploads::process_upload_form(multipart, &state.config().upload_dir, &fields)
        .await
        .map_err(|err| {
            if err.status().is_server_error() {
                error!(?err, "failed to store print upload");
            }
            json_error(err.status(), err.message())
        })?;

    let Some(document) = outcome.first_file_for(DOCUMENT_FIELD) else {
        return Err(json_error(StatusCode::BAD_REQUEST, "A document is required"));
    };

    let options = match PrintOptions::from_form(&outcome, document.file_size) {
        Ok(options) => options,
        Err(message) => {
            outcome.discard().await;
            return Err(json_error(StatusCode::BAD_REQUEST, message));
        }
    };

    let quote = pricing::quote(
        options.print_type,
        options.pages,
        options.copies,
        options.double_sided,
    );

    let result = print_requests::insert(
        state.pool_ref(),
        NewPrintRequest {
            user_id: user.id,
            original_filename: &document.original_name,
            stored_filename: &document.stored_name,
            file_size: i64::try_from(document.file_size).unwrap_or(i64::MAX),
            print_type: options.print_type,
            pages: options.pages,
            copies: options.copies,
            double_sided: options.double_sided,
            quote,
        },
    )
    .await;

    match result {
        Ok(request) => {
            info!(
                request_id = request.id,
                user_id = user.id,
                total_cost = request.total_cost,
                "print request submitted"
            );
            Ok((StatusCode::CREATED, Json(request)))
        }
        Err(err) => {
            error!(?err, "failed to record print request");
            outcome.discard().await;
            Err(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            ))
        }
    }
}

pub async fn list_print_requests(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<PrintRequest>>, ApiError> {
    let result = if user.is_admin() {
        print_requests::list_all(state.pool_ref()).await
    } else {
        print_requests::list_for_user(state.pool_ref(), user.id).await
    };

    result.map(Json).map_err(|err| {
        error!(?err, "failed to list print requests");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    })
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: PrintStatus,
}

pub async fn update_print_request_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<PrintRequest>, ApiError> {
    match print_requests::update_status(state.pool_ref(), id, update.status).await {
        Ok(Some(request)) => {
            info!(
                request_id = id,
                admin_id = admin.id,
                status = update.status.as_str(),
                "print request status changed"
            );
            if request.status == PrintStatus::Cancelled {
                storage::remove_stored_file(&state.config().upload_dir, &request.stored_filename)
                    .await;
            }
            Ok(Json(request))
        }
        Ok(None) => Err(json_error(StatusCode::NOT_FOUND, "Print request not found")),
        Err(err) => {
            error!(?err, request_id = id, "failed to update print request status");
            Err(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            ))
        }
    }
}

pub async fn download_print_request_file(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let request = print_requests::find_by_id(state.pool_ref(), id)
        .await
        .map_err(|err| {
            error!(?err, request_id = id, "failed to load print request");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        })?
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "Print request not found"))?;

    let path = state.config().upload_dir.join(&request.stored_filename);
    let response = storage::stream_file(
        &path,
        &request.original_filename,
        storage::content_type_for(&request.stored_filename),
    )
    .await?;

    info!(request_id = id, admin_id = admin.id, "print document downloaded");
    Ok(response)
}
