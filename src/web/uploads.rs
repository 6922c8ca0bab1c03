use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use axum::{
    extract::{Multipart, multipart::MultipartError},
    http::StatusCode,
};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::warn;

/// Result type used by the shared upload helpers.
pub type UploadResult<T> = Result<T, UploadError>;

/// Error returned when validating or persisting uploaded files.
#[derive(Debug)]
pub struct UploadError {
    status: StatusCode,
    message: String,
}

impl UploadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    /// Keeps the multipart parser's status, so an over-limit body stays a 413.
    fn from_multipart(context: &str, err: MultipartError) -> Self {
        Self {
            status: err.status(),
            message: format!("{context}: {}", err.body_text()),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UploadError {}

/// Configuration describing the expectations for a single multipart file field.
#[derive(Debug, Clone, Copy)]
pub struct FileFieldConfig<'a> {
    pub field_name: &'a str,
    pub allowed_extensions: &'a [&'a str],
    pub max_files: usize,
    pub min_files: usize,
    /// Prepended to the sanitized client filename when stored.
    pub prefix: &'a str,
}

impl<'a> FileFieldConfig<'a> {
    pub fn new(
        field_name: &'a str,
        allowed_extensions: &'a [&'a str],
        max_files: usize,
        prefix: &'a str,
    ) -> Self {
        Self {
            field_name,
            allowed_extensions,
            max_files,
            min_files: if max_files == 0 { 0 } else { 1 },
            prefix,
        }
    }
}

/// Metadata describing a stored upload on disk.
#[derive(Debug, Clone)]
pub struct SavedFile {
    pub field_name: String,
    pub original_name: String,
    pub stored_name: String,
    pub stored_path: PathBuf,
    pub file_size: u64,
}

/// Aggregated output of the shared upload processor.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub files: Vec<SavedFile>,
    pub text_fields: HashMap<String, Vec<String>>,
}

impl UploadOutcome {
    pub fn first_file_for(&self, field_name: &str) -> Option<&SavedFile> {
        self.files.iter().find(|file| file.field_name == field_name)
    }

    pub fn first_text(&self, field_name: &str) -> Option<&str> {
        self.text_fields
            .get(field_name)
            .and_then(|values| values.first())
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Delete every stored file, e.g. after the rest of the form failed validation.
    pub async fn discard(&self) {
        for file in &self.files {
            if let Err(err) = tokio::fs::remove_file(&file.stored_path).await {
                warn!(
                    ?err,
                    file = %file.stored_path.display(),
                    "failed to remove discarded upload"
                );
            }
        }
    }
}

/// Ensures the destination directory exists.
pub async fn ensure_directory(path: &Path) -> UploadResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|err| UploadError::internal(format!("failed to create upload directory: {err}")))
}

/// Parses multipart form data, persisting files according to the provided configuration.
///
/// Files already written are removed again if a later part of the form is rejected.
pub async fn process_upload_form(
    mut multipart: Multipart,
    dest_dir: &Path,
    field_configs: &[FileFieldConfig<'_>],
) -> UploadResult<UploadOutcome> {
    ensure_directory(dest_dir).await?;

    let mut outcome = UploadOutcome::default();
    match read_fields(&mut multipart, dest_dir, field_configs, &mut outcome).await {
        Ok(()) => Ok(outcome),
        Err(err) => {
            outcome.discard().await;
            Err(err)
        }
    }
}

async fn read_fields(
    multipart: &mut Multipart,
    dest_dir: &Path,
    field_configs: &[FileFieldConfig<'_>],
    outcome: &mut UploadOutcome,
) -> UploadResult<()> {
    let mut counts: HashMap<&str, usize> = field_configs
        .iter()
        .map(|config| (config.field_name, 0))
        .collect();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| UploadError::from_multipart("failed to parse upload form", err))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        if field.file_name().is_none() {
            let value = field.text().await.map_err(|err| {
                UploadError::from_multipart(&format!("failed to read field `{field_name}`"), err)
            })?;
            outcome
                .text_fields
                .entry(field_name)
                .or_default()
                .push(value);
            continue;
        }

        let Some(config) = field_configs
            .iter()
            .find(|config| config.field_name == field_name)
        else {
            return Err(UploadError::new(format!(
                "unsupported file field `{field_name}`"
            )));
        };

        let count = counts.entry(config.field_name).or_default();
        if *count >= config.max_files {
            return Err(UploadError::new(format!(
                "too many files for `{}` (at most {})",
                config.field_name, config.max_files
            )));
        }

        let file_name = field.file_name().unwrap_or("upload.bin").to_string();
        let extension = file_extension(&file_name);

        if !config.allowed_extensions.is_empty()
            && !config
                .allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(&extension))
        {
            return Err(UploadError::new(format!(
                "`{}` does not accept `{extension}` files (allowed: {})",
                config.field_name,
                config.allowed_extensions.join(", ")
            )));
        }

        let mut sanitized = sanitize_filename::sanitize(&file_name);
        if sanitized.is_empty() {
            sanitized = format!("file_{}.{extension}", *count);
        }
        let stored_name = format!("{}{}", config.prefix, sanitized);
        let stored_path = dest_dir.join(&stored_name);

        let mut file = File::create(&stored_path)
            .await
            .map_err(|err| UploadError::internal(format!("failed to save file: {err}")))?;

        // Track the file before streaming so a failed read still cleans it up.
        outcome.files.push(SavedFile {
            field_name: config.field_name.to_string(),
            original_name: file_name,
            stored_name,
            stored_path,
            file_size: 0,
        });

        let mut total_bytes: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|err| UploadError::from_multipart("failed to read upload data", err))?
        {
            total_bytes += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .map_err(|err| UploadError::internal(format!("failed to write file: {err}")))?;
        }
        file.flush()
            .await
            .map_err(|err| UploadError::internal(format!("failed to flush file: {err}")))?;

        if let Some(saved) = outcome.files.last_mut() {
            saved.file_size = total_bytes;
        }
        *count += 1;
    }

    for config in field_configs {
        let count = counts.get(config.field_name).copied().unwrap_or(0);
        if count < config.min_files {
            return Err(UploadError::new(format!(
                "`{}` needs at least {} file(s)",
                config.field_name, config.min_files
            )));
        }
    }

    Ok(())
}

pub(crate) fn file_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}
