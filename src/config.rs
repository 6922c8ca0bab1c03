use std::{env, fmt, path::PathBuf};

use chrono::Duration;
use tracing::warn;

pub const SESSION_SECRET_VAR: &str = "SESSION_SECRET";
pub const JWT_SECRET_VAR: &str = "JWT_SECRET_KEY";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const UPLOAD_FOLDER_VAR: &str = "UPLOAD_FOLDER";
pub const MAX_CONTENT_LENGTH_VAR: &str = "MAX_CONTENT_LENGTH";
pub const ADMIN_PASSWORD_VAR: &str = "ADMIN_PASSWORD";
pub const PORT_VAR: &str = "PORT";

const DEFAULT_SESSION_SECRET: &str = "dev-secret-key-change-in-production";
const DEFAULT_JWT_SECRET: &str = "jwt-secret-key-change-in-production";
const DEFAULT_DATABASE_URL: &str = "sqlite://campus_print.db";
const DEFAULT_UPLOAD_FOLDER: &str = "uploads";
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
const DEFAULT_PORT: u16 = 8080;

pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 16 * 1024 * 1024;
pub const ACCESS_TOKEN_TTL: Duration = Duration::hours(1);

/// Session secrets shorter than this still work but are reported as weak.
pub const MIN_SESSION_SECRET_BYTES: usize = 32;

/// Error raised when an environment value is present but unusable.
#[derive(Debug)]
pub struct ConfigError {
    variable: &'static str,
    message: String,
}

impl ConfigError {
    fn new(variable: &'static str, message: impl Into<String>) -> Self {
        Self {
            variable,
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.variable, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Process-wide settings resolved once at startup.
#[derive(Clone)]
pub struct AppConfig {
    pub session_secret: String,
    pub jwt_secret: String,
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub admin_password: String,
    pub port: u16,
    pub access_token_ttl: Duration,
    insecure_defaults: Vec<&'static str>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve every setting through `lookup`, falling back to development defaults.
    ///
    /// Blank values count as absent. Secrets that fall back are recorded so the
    /// caller can surface them with [`AppConfig::warn_insecure_defaults`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut insecure_defaults = Vec::new();
        let mut secret = |key: &'static str, default: &str| match read(key) {
            Some(value) => value,
            None => {
                insecure_defaults.push(key);
                default.to_string()
            }
        };

        let session_secret = secret(SESSION_SECRET_VAR, DEFAULT_SESSION_SECRET);
        let jwt_secret = secret(JWT_SECRET_VAR, DEFAULT_JWT_SECRET);
        let admin_password = secret(ADMIN_PASSWORD_VAR, DEFAULT_ADMIN_PASSWORD);

        let database_url =
            read(DATABASE_URL_VAR).unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let upload_dir = PathBuf::from(
            read(UPLOAD_FOLDER_VAR).unwrap_or_else(|| DEFAULT_UPLOAD_FOLDER.to_string()),
        );

        let max_upload_bytes = match read(MAX_CONTENT_LENGTH_VAR) {
            Some(raw) => match raw.parse::<usize>() {
                Ok(0) => {
                    return Err(ConfigError::new(
                        MAX_CONTENT_LENGTH_VAR,
                        "must be greater than zero",
                    ));
                }
                Ok(bytes) => bytes,
                Err(err) => {
                    return Err(ConfigError::new(
                        MAX_CONTENT_LENGTH_VAR,
                        format!("`{raw}` is not a byte count: {err}"),
                    ));
                }
            },
            None => DEFAULT_MAX_CONTENT_LENGTH,
        };

        let port = match read(PORT_VAR) {
            Some(raw) => raw.parse::<u16>().map_err(|err| {
                ConfigError::new(PORT_VAR, format!("`{raw}` is not a port: {err}"))
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            session_secret,
            jwt_secret,
            database_url,
            upload_dir,
            max_upload_bytes,
            admin_password,
            port,
            access_token_ttl: ACCESS_TOKEN_TTL,
            insecure_defaults,
        })
    }

    /// Variables that were not set and fell back to a value unfit for production.
    pub fn insecure_defaults(&self) -> &[&'static str] {
        &self.insecure_defaults
    }

    pub fn has_weak_session_secret(&self) -> bool {
        self.session_secret.len() < MIN_SESSION_SECRET_BYTES
    }

    pub fn warn_insecure_defaults(&self) {
        for variable in &self.insecure_defaults {
            warn!(
                variable,
                "{variable} is not set; using an insecure development default. Do not deploy this."
            );
        }
        if self.has_weak_session_secret() {
            warn!(
                variable = SESSION_SECRET_VAR,
                "{SESSION_SECRET_VAR} is shorter than {MIN_SESSION_SECRET_BYTES} bytes"
            );
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("session_secret", &"<redacted>")
            .field("jwt_secret", &"<redacted>")
            .field("database_url", &self.database_url)
            .field("upload_dir", &self.upload_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("admin_password", &"<redacted>")
            .field("port", &self.port)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("insecure_defaults", &self.insecure_defaults)
            .finish()
    }
}
