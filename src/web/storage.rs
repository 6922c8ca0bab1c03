use std::{io::ErrorKind, path::Path};

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use crate::web::{
    responses::{ApiMessage, json_error},
    uploads,
};

const FALLBACK_DOWNLOAD_NAME: &str = "document";

/// Content type for a stored document, chosen from its extension.
pub fn content_type_for(filename: &str) -> &'static str {
    match uploads::file_extension(filename).as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

/// Client filenames may hold quotes or non-ASCII text that a header value cannot carry.
fn attachment_name(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .filter(|c| (c.is_ascii_graphic() || *c == ' ') && *c != '"' && *c != '\\')
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        FALLBACK_DOWNLOAD_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Stream a file with a standard attachment disposition. A missing file is a 404.
pub async fn stream_file(
    path: &Path,
    filename: &str,
    content_type: &'static str,
) -> Result<Response, (StatusCode, Json<ApiMessage>)> {
    let bytes = tokio::fs::read(path).await.map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            return json_error(StatusCode::NOT_FOUND, "Document is no longer available");
        }
        error!(?err, file = %path.display(), "failed to read stored document");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    let disposition = format!("attachment; filename=\"{}\"", attachment_name(filename));
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|_| json_error(StatusCode::INTERNAL_SERVER_ERROR, "Invalid download header"))?;
    headers.insert(header::CONTENT_DISPOSITION, disposition);

    Ok((headers, bytes).into_response())
}

/// Delete a stored upload. Already-missing files are fine; other failures are logged.
pub async fn remove_stored_file(upload_dir: &Path, stored_name: &str) {
    let path = upload_dir.join(stored_name);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(?err, file = %path.display(), "failed to remove stored document"),
    }
}
