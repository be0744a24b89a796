//! Admin configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ADMIN_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `ADMIN_BASE_URL` - Public URL for the admin panel
//! - `ADMIN_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `STOREFRONT_BASE_URL` - Storefront URL used for links in customer emails
//!
//! ## Optional
//! - `ADMIN_HOST` - Bind address (default: 127.0.0.1)
//! - `ADMIN_PORT` - Listen port (default: 3001)
//! - `DASHBOARD_CACHE_TTL_SECS` - Dashboard cache lifetime (default: 60, max: 30 days)
//! - `LOW_STOCK_THRESHOLD` - Stock level listed on the dashboard (default: 5)
//! - `SHOP_NAME`, `SHOP_CURRENCY`, `SHIPPING_FLAT_RATE`, `FREE_SHIPPING_OVER`, `TAX_RATE`
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM`
//! - `STORAGE_URL`, `STORAGE_BUCKET`, `STORAGE_KEY`, `STORAGE_PUBLIC_URL` - Product images
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT` - Sentry error tracking
//! - `LOG_FORMAT` - `json` for JSON logs, anything else for text
//!
//! ## Optional (TLS)
//! - `ADMIN_TLS_CERT` - PEM-encoded certificate chain
//! - `ADMIN_TLS_KEY` - PEM-encoded private key

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;

use shopfront_commerce::env::{
    ConfigError, EmailConfig, SentryConfig, ShopConfig, StorageConfig, get_database_url,
    get_env_or_default, get_optional_env, get_required_env, get_validated_secret, load_dotenv,
    parse_env_or_default, parse_ttl_env, validate_session_secret,
};

/// TLS configuration for HTTPS.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

impl TlsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_parts(
            get_optional_env("ADMIN_TLS_CERT"),
            get_optional_env("ADMIN_TLS_KEY"),
        )
    }

    fn from_parts(cert: Option<String>, key: Option<String>) -> Result<Option<Self>, ConfigError> {
        match (cert, key) {
            (Some(cert), Some(key)) => Ok(Some(Self {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "ADMIN_TLS_*".to_string(),
                "Both ADMIN_TLS_CERT and ADMIN_TLS_KEY must be set together".to_string(),
            )),
        }
    }
}

/// Admin application configuration.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the admin panel (no trailing slash)
    pub base_url: String,
    /// Public storefront URL (no trailing slash)
    pub storefront_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Shop name, currency, shipping and tax
    pub shop: ShopConfig,
    /// Lifetime of cached dashboard statistics
    pub dashboard_ttl: Duration,
    /// Products at or below this stock level are flagged
    pub low_stock_threshold: i32,
    /// SMTP settings; emails are logged when unset
    pub email: Option<EmailConfig>,
    /// Object storage; image uploads are disabled when unset
    pub storage: Option<StorageConfig>,
    /// Sentry settings
    pub sentry: SentryConfig,
    /// Emit JSON logs
    pub json_logs: bool,
    /// TLS configuration for HTTPS (optional)
    pub tls: Option<TlsConfig>,
}

impl AdminConfig {
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

        let database_url = get_database_url("ADMIN_DATABASE_URL")?;
        let host: IpAddr = parse_env_or_default("ADMIN_HOST", "127.0.0.1")?;
        let port: u16 = parse_env_or_default("ADMIN_PORT", "3001")?;
        let base_url = required_url("ADMIN_BASE_URL")?;
        let storefront_url = required_url("STOREFRONT_BASE_URL")?;
        let session_secret = get_validated_secret("ADMIN_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "ADMIN_SESSION_SECRET")?;
        let dashboard_ttl = parse_ttl_env("DASHBOARD_CACHE_TTL_SECS", "60")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            storefront_url,
            session_secret,
            shop: ShopConfig::from_env()?,
            dashboard_ttl,
            low_stock_threshold: parse_env_or_default("LOW_STOCK_THRESHOLD", "5")?,
            email: EmailConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            sentry: SentryConfig::from_env()?,
            json_logs: get_env_or_default("LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
            tls: TlsConfig::from_env()?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the admin panel is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.tls.is_some() || self.base_url.starts_with("https://")
    }
}

/// A required URL variable, validated and without a trailing slash.
fn required_url(key: &str) -> Result<String, ConfigError> {
    let value = get_required_env(key)?;
    url::Url::parse(&value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    Ok(value.trim_end_matches('/').to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> AdminConfig {
        AdminConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3001,
            base_url: base_url.to_string(),
            storefront_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            shop: ShopConfig::default(),
            dashboard_ttl: Duration::from_secs(60),
            low_stock_threshold: 5,
            email: None,
            storage: None,
            sentry: SentryConfig {
                dsn: None,
                environment: None,
                sample_rate: 1.0,
                traces_sample_rate: 0.0,
            },
            json_logs: false,
            tls: None,
        }
    }

    #[test]
    fn test_socket_addr() {
        let addr = config("http://localhost:3001").socket_addr();
        assert_eq!(addr.to_string(), "127.0.0.1:3001");
    }

    #[test]
    fn test_is_secure() {
        assert!(!config("http://localhost:3001").is_secure());
        assert!(config("https://admin.example.com").is_secure());
    }

    #[test]
    fn test_tls_requires_both_parts() {
        assert!(TlsConfig::from_parts(None, None).unwrap().is_none());
        assert!(
            TlsConfig::from_parts(Some("cert".to_string()), Some("key".to_string()))
                .unwrap()
                .is_some()
        );
        assert!(TlsConfig::from_parts(Some("cert".to_string()), None).is_err());
        assert!(TlsConfig::from_parts(None, Some("key".to_string())).is_err());
    }

    #[test]
    fn test_tls_debug_redacts_key() {
        let tls = TlsConfig::from_parts(Some("cert".to_string()), Some("private".to_string()))
            .unwrap()
            .unwrap();
        let debug = format!("{tls:?}");
        assert!(!debug.contains("private"));
        assert!(debug.contains("[REDACTED]"));
    }
}
