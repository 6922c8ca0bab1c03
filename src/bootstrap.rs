use anyhow::{Context, Result, anyhow, bail};
use sqlx::SqlitePool;
use tracing::info;

use crate::{
    auth,
    config::AppConfig,
    db,
    users::{self, NewUser, Role},
    web::{AppState, uploads},
};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_EMAIL: &str = "admin@campus.edu";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStage {
    Uninitialized,
    SchemaReady,
    Seeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Created,
    AlreadyPresent,
}

/// Drives a fresh pool through schema creation and admin seeding, in that order.
pub struct Bootstrap {
    pool: SqlitePool,
    stage: BootstrapStage,
}

impl Bootstrap {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            stage: BootstrapStage::Uninitialized,
        }
    }

    pub fn stage(&self) -> BootstrapStage {
        self.stage
    }

    pub async fn ensure_schema(&mut self) -> Result<()> {
        db::ensure_schema(&self.pool).await?;
        if self.stage == BootstrapStage::Uninitialized {
            self.stage = BootstrapStage::SchemaReady;
        }
        Ok(())
    }

    /// Create the administrator unless one with [`ADMIN_EMAIL`] already exists.
    pub async fn seed_admin(&mut self, password: &str) -> Result<SeedOutcome> {
        if self.stage == BootstrapStage::Uninitialized {
            bail!("cannot seed the admin user before the schema exists");
        }

        let existing = users::find_by_email(&self.pool, ADMIN_EMAIL)
            .await
            .context("failed to look up admin user")?;

        let outcome = if existing.is_some() {
            SeedOutcome::AlreadyPresent
        } else {
            let password_hash = auth::hash_password(password)
                .map_err(|err| anyhow!("failed to hash seed admin password: {err}"))?;

            users::insert(
                &self.pool,
                NewUser {
                    username: ADMIN_USERNAME,
                    email: ADMIN_EMAIL,
                    password_hash: &password_hash,
                    role: Role::Admin,
                },
            )
            .await
            .context("failed to insert seed admin user")?;

            info!(email = ADMIN_EMAIL, "default admin user created");
            SeedOutcome::Created
        };

        self.stage = BootstrapStage::Seeded;
        Ok(outcome)
    }

    pub fn into_pool(self) -> SqlitePool {
        self.pool
    }
}

/// Full startup sequence: upload directory, pool, schema, admin seed, then state.
pub async fn initialize(config: AppConfig) -> Result<AppState> {
    config.warn_insecure_defaults();

    uploads::ensure_directory(&config.upload_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create upload directory {}",
                config.upload_dir.display()
            )
        })?;

    let pool = db::connect(&config).await?;

    let mut bootstrap = Bootstrap::new(pool);
    bootstrap.ensure_schema().await?;
    let seeded = bootstrap.seed_admin(&config.admin_password).await?;
    info!(stage = ?bootstrap.stage(), admin = ?seeded, "bootstrap complete");

    Ok(AppState::new(config, bootstrap.into_pool()))
}
