//! Environment configuration shared by the storefront, admin and CLI.
//!
//! Each binary builds its own config struct from these helpers and the
//! grouped settings below.
//!
//! # Environment Variables
//!
//! ## Shop
//! - `SHOP_NAME` - Display name used in pages and emails (default: Shopfront)
//! - `SHOP_CURRENCY` - ISO currency code (default: USD)
//! - `SHIPPING_FLAT_RATE` - Flat shipping charge (default: 5.00)
//! - `FREE_SHIPPING_OVER` - Subtotal at which shipping is free (optional)
//! - `TAX_RATE` - Tax percentage applied to the subtotal (default: 0)
//!
//! ## Email (optional as a group, enabled by `SMTP_HOST`)
//! - `SMTP_HOST`, `SMTP_PORT` (default: 587), `SMTP_USERNAME`, `SMTP_PASSWORD`
//! - `EMAIL_FROM` - Sender address
//!
//! ## Object storage (optional as a group, enabled by `STORAGE_URL`)
//! - `STORAGE_URL`, `STORAGE_BUCKET`, `STORAGE_KEY`, `STORAGE_PUBLIC_URL`
//!
//! ## Error tracking
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE` (default: 1.0),
//!   `SENTRY_TRACES_SAMPLE_RATE` (default: 0.1)

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use shopfront_core::{CurrencyCode, MAX_TTL, Price, ShippingPolicy, TaxRate};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Load `.env` if present.
pub fn load_dotenv() {
    // Missing .env is fine; real deployments set the environment directly.
    let _ = dotenvy::dotenv();
}

/// Get a required environment variable.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if the variable is unset or empty.
pub fn get_required_env(key: &str) -> Result<String, ConfigError> {
    get_optional_env(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
#[must_use]
pub fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
#[must_use]
pub fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` if the value does not parse.
pub fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a cache TTL in seconds, falling back to `default_secs` when unset.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` if the value does not parse or is
/// longer than [`MAX_TTL`].
pub fn parse_ttl_env(key: &str, default_secs: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_env_or_default(key, default_secs)?;
    ttl_from_secs(key, secs)
}

fn ttl_from_secs(key: &str, secs: u64) -> Result<Duration, ConfigError> {
    let ttl = Duration::from_secs(secs);
    if ttl > MAX_TTL {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must be at most {} seconds", MAX_TTL.as_secs()),
        ));
    }
    Ok(ttl)
}

/// Parse an optional environment variable.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` if the value is set but does not parse.
pub fn parse_optional_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
        .transpose()
}

/// Get database URL with fallback to generic `DATABASE_URL`.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` naming `primary_key` when neither is set.
pub fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    get_optional_env(primary_key)
        .or_else(|| get_optional_env("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Load and validate a secret from environment.
///
/// # Errors
///
/// Returns an error if the variable is missing or fails [`validate_secret_strength`].
pub fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

/// Validate that a session secret meets minimum length requirements.
///
/// # Errors
///
/// Returns `ConfigError::InsecureSecret` if the secret is shorter than 32 characters.
pub fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
///
/// # Errors
///
/// Returns `ConfigError::InsecureSecret` describing the failed check.
pub fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

// =============================================================================
// Grouped settings
// =============================================================================

/// Store-wide selling settings.
#[derive(Debug, Clone)]
pub struct ShopConfig {
    /// Display name.
    pub name: String,
    /// Currency all prices are quoted in.
    pub currency: CurrencyCode,
    /// Shipping charges.
    pub shipping: ShippingPolicy,
    /// Tax applied to the subtotal.
    pub tax_rate: TaxRate,
}

impl ShopConfig {
    /// Load shop settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` for unparseable or negative amounts.
    pub fn from_env() -> Result<Self, ConfigError> {
        let currency: CurrencyCode = parse_env_or_default("SHOP_CURRENCY", "USD")?;
        let flat_rate: Decimal = parse_env_or_default("SHIPPING_FLAT_RATE", "5.00")?;
        let free_over: Option<Decimal> = parse_optional_env("FREE_SHIPPING_OVER")?;
        let shipping = ShippingPolicy::new(flat_rate, free_over).map_err(|e| {
            ConfigError::InvalidEnvVar("SHIPPING_FLAT_RATE".to_string(), e.to_string())
        })?;
        let tax_rate: TaxRate = parse_env_or_default("TAX_RATE", "0")?;

        Ok(Self {
            name: get_env_or_default("SHOP_NAME", "Shopfront"),
            currency,
            shipping,
            tax_rate,
        })
    }

    /// Format an amount in the shop currency (e.g. `$19.99`).
    #[must_use]
    pub fn format(&self, amount: Decimal) -> String {
        Price::new(amount, self.currency).display()
    }
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            name: "Shopfront".to_string(),
            currency: CurrencyCode::USD,
            shipping: ShippingPolicy::free(),
            tax_rate: TaxRate::ZERO,
        }
    }
}

/// Email (SMTP) configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP authentication username
    pub smtp_username: String,
    /// SMTP authentication password
    pub smtp_password: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl EmailConfig {
    /// Load SMTP settings. Returns `None` when `SMTP_HOST` is unset.
    ///
    /// # Errors
    ///
    /// Returns an error if `SMTP_HOST` is set but the rest of the group is
    /// missing or invalid.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: parse_env_or_default("SMTP_PORT", "587")?,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: get_validated_secret("SMTP_PASSWORD")?,
            from_address: get_required_env("EMAIL_FROM")?,
        }))
    }
}

/// HTTP object storage configuration.
///
/// Implements `Debug` manually to redact the access key.
#[derive(Clone)]
pub struct StorageConfig {
    /// Base URL of the storage API (e.g. `https://storage.example.net`)
    pub endpoint: String,
    /// Bucket that holds product images
    pub bucket: String,
    /// Bearer token for uploads and deletes
    pub access_key: SecretString,
    /// Public base URL that objects are served from
    pub public_url: String,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("access_key", &"[REDACTED]")
            .field("public_url", &self.public_url)
            .finish()
    }
}

impl StorageConfig {
    /// Load storage settings. Returns `None` when `STORAGE_URL` is unset.
    ///
    /// # Errors
    ///
    /// Returns an error if `STORAGE_URL` is set but the rest of the group is
    /// missing or invalid.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(endpoint) = get_optional_env("STORAGE_URL") else {
            return Ok(None);
        };
        url::Url::parse(&endpoint)
            .map_err(|e| ConfigError::InvalidEnvVar("STORAGE_URL".to_string(), e.to_string()))?;

        Ok(Some(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: get_required_env("STORAGE_BUCKET")?,
            access_key: get_validated_secret("STORAGE_KEY")?,
            public_url: get_required_env("STORAGE_PUBLIC_URL")?
                .trim_end_matches('/')
                .to_string(),
        }))
    }
}

/// Sentry error tracking configuration.
#[derive(Debug, Clone)]
pub struct SentryConfig {
    /// Sentry DSN; tracking is disabled when unset
    pub dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub environment: Option<String>,
    /// Error sample rate (0.0 to 1.0)
    pub sample_rate: f32,
    /// Traces sample rate for performance monitoring (0.0 to 1.0)
    pub traces_sample_rate: f32,
}

impl SentryConfig {
    /// Load Sentry settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` for sample rates outside `0.0..=1.0`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let sample_rate: f32 = parse_env_or_default("SENTRY_SAMPLE_RATE", "1.0")?;
        let traces_sample_rate: f32 = parse_env_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.1")?;
        for (key, rate) in [
            ("SENTRY_SAMPLE_RATE", sample_rate),
            ("SENTRY_TRACES_SAMPLE_RATE", traces_sample_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::InvalidEnvVar(
                    key.to_string(),
                    "must be between 0.0 and 1.0".to_string(),
                ));
            }
        }

        Ok(Self {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate,
            traces_sample_rate,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_from_secs_bounds() {
        assert_eq!(ttl_from_secs("T", 300).unwrap(), Duration::from_secs(300));
        assert_eq!(ttl_from_secs("T", MAX_TTL.as_secs()).unwrap(), MAX_TTL);

        let err = ttl_from_secs("T", 100_000_000_000).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "T"));
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-api-key-here", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"a".repeat(33), "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_validate_session_secret_length() {
        assert!(validate_session_secret(&SecretString::from("short"), "S").is_err());
        assert!(validate_session_secret(&SecretString::from("a".repeat(32)), "S").is_ok());
    }

    #[test]
    fn test_shop_format() {
        let shop = ShopConfig {
            currency: CurrencyCode::GBP,
            ..ShopConfig::default()
        };
        assert_eq!(shop.format(Decimal::new(1234, 2)), "£12.34");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let email = EmailConfig {
            smtp_host: "smtp.mailhost.test".to_string(),
            smtp_port: 587,
            smtp_username: "mailer".to_string(),
            smtp_password: SecretString::from("hunter2-very-private"),
            from_address: "shop@mailhost.test".to_string(),
        };
        let storage = StorageConfig {
            endpoint: "https://objects.test".to_string(),
            bucket: "images".to_string(),
            access_key: SecretString::from("storage-key-very-private"),
            public_url: "https://cdn.test".to_string(),
        };

        let debug_output = format!("{email:?} {storage:?}");
        assert!(debug_output.contains("smtp.mailhost.test"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2-very-private"));
        assert!(!debug_output.contains("storage-key-very-private"));
    }
}
