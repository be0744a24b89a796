//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use shopfront_commerce::email::EmailService;
use shopfront_commerce::env::ShopConfig;
use shopfront_commerce::storage::StorageClient;

use crate::config::AdminConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    email: EmailService,
    storage: Option<StorageClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// `storage` is `None` when object storage is not configured; image
    /// uploads are then rejected.
    #[must_use]
    pub fn new(
        config: AdminConfig,
        pool: PgPool,
        email: EmailService,
        storage: Option<StorageClient>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                email,
                storage,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    /// Shop name and currency, used to format amounts.
    #[must_use]
    pub fn shop(&self) -> &ShopConfig {
        &self.inner.config.shop
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    /// Product image storage, if configured.
    #[must_use]
    pub fn storage(&self) -> Option<&StorageClient> {
        self.inner.storage.as_ref()
    }
}
