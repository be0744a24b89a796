//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `CATALOG_CACHE_TTL_SECS` - Catalog cache lifetime (default: 300, max: 30 days)
//! - `CATALOG_CACHE_CAPACITY` - Maximum cached catalog responses (default: 1000)
//! - `CATALOG_CACHE_SNAPSHOT` - File the catalog cache is saved to on shutdown
//! - `SHOP_NAME`, `SHOP_CURRENCY`, `SHIPPING_FLAT_RATE`, `FREE_SHIPPING_OVER`, `TAX_RATE`
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM`
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT` - Sentry error tracking
//! - `LOG_FORMAT` - `json` for JSON logs, anything else for text

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use shopfront_commerce::env::{
    ConfigError, EmailConfig, SentryConfig, ShopConfig, get_database_url, get_env_or_default,
    get_optional_env, get_required_env, get_validated_secret, load_dotenv, parse_env_or_default,
    parse_ttl_env, validate_session_secret,
};

/// Catalog response cache settings.
#[derive(Debug, Clone)]
pub struct CatalogCacheConfig {
    /// Lifetime of a cached response
    pub ttl: Duration,
    /// Maximum number of cached responses
    pub capacity: u64,
    /// Snapshot file restored at startup and written at shutdown
    pub snapshot_path: Option<PathBuf>,
}

impl CatalogCacheConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let ttl = parse_ttl_env("CATALOG_CACHE_TTL_SECS", "300")?;
        let capacity: u64 = parse_env_or_default("CATALOG_CACHE_CAPACITY", "1000")?;
        Ok(Self {
            ttl,
            capacity,
            snapshot_path: get_optional_env("CATALOG_CACHE_SNAPSHOT").map(PathBuf::from),
        })
    }
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront (no trailing slash)
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Shop name, currency, shipping and tax
    pub shop: ShopConfig,
    /// Catalog cache settings
    pub catalog_cache: CatalogCacheConfig,
    /// SMTP settings; emails are logged when absent
    pub email: Option<EmailConfig>,
    /// Sentry settings
    pub sentry: SentryConfig,
    /// Emit JSON logs
    pub json_logs: bool,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Loads `.env` first if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host: IpAddr = parse_env_or_default("STOREFRONT_HOST", "127.0.0.1")?;
        let port: u16 = parse_env_or_default("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_string(), e.to_string())
        })?;
        let session_secret = get_validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_secret,
            shop: ShopConfig::from_env()?,
            catalog_cache: CatalogCacheConfig::from_env()?,
            email: EmailConfig::from_env()?,
            sentry: SentryConfig::from_env()?,
            json_logs: get_env_or_default("LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the storefront is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}
