use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};
use sqlx::SqlitePool;

use crate::{auth::TokenIssuer, config::AppConfig};

#[derive(Clone)]
pub struct AppState {
    pool: SqlitePool,
    config: Arc<AppConfig>,
    tokens: TokenIssuer,
    cookie_key: Key,
}

impl AppState {
    pub fn new(config: AppConfig, pool: SqlitePool) -> Self {
        let tokens = TokenIssuer::new(&config.jwt_secret, config.access_token_ttl);
        let cookie_key = cookie_key_from(&config.session_secret);

        Self {
            pool,
            config: Arc::new(config),
            tokens,
            cookie_key,
        }
    }

    pub fn pool_ref(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }
}

/// `Key::derive_from` needs at least 32 bytes of input, so the secret is
/// stretched through SHA-512 first.
fn cookie_key_from(secret: &str) -> Key {
    Key::derive_from(&Sha512::digest(secret.as_bytes()))
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_secrets_still_derive_distinct_keys() {
        let short = cookie_key_from("tiny");
        assert_eq!(short.master(), cookie_key_from("tiny").master());
        assert_ne!(short.master(), cookie_key_from("tinier").master());
        assert_ne!(short.master(), cookie_key_from("").master());
    }
}
