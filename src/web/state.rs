use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
    accounts::{self, AccountStore, PgAccountStore},
    attachments::{AttachmentStore, Attachments, LocalStore, RemoteStore},
    config::PortalConfig,
    submissions::{PgSubmissionRepository, SubmissionService},
};

#[derive(Clone)]
pub struct AppState {
    pool: PgPool,
    config: Arc<PortalConfig>,
    accounts: Arc<dyn AccountStore>,
    attachments: Arc<dyn AttachmentStore>,
    submissions: SubmissionService,
}

impl AppState {
    pub async fn new(config: PortalConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("failed to connect to Postgres")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;

        let local = LocalStore::new(config.uploads_dir.clone(), config.uploads_url_prefix.clone())
            .await
            .context("failed to prepare uploads directory")?;
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        let remote = RemoteStore::new(http, config.remote_upload.clone());
        let attachments = Attachments::new(local, remote, config.storage_backend).shared();

        let submissions = SubmissionService::new(
            Arc::new(PgSubmissionRepository::new(pool.clone())),
            attachments.clone(),
        );

        Ok(Self {
            accounts: Arc::new(PgAccountStore::new(pool.clone())),
            pool,
            config: Arc::new(config),
            attachments,
            submissions,
        })
    }

    pub async fn ensure_seed_admin(&self) -> Result<()> {
        let seed = &self.config.seed_admin;
        accounts::ensure_seed_admin(self.accounts.as_ref(), &seed.username, &seed.password)
            .await
            .context("failed to seed admin user")
    }

    pub fn pool_ref(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn accounts(&self) -> &dyn AccountStore {
        self.accounts.as_ref()
    }

    pub fn accounts_handle(&self) -> Arc<dyn AccountStore> {
        self.accounts.clone()
    }

    pub fn attachments(&self) -> &dyn AttachmentStore {
        self.attachments.as_ref()
    }

    pub fn submissions(&self) -> &SubmissionService {
        &self.submissions
    }
}
