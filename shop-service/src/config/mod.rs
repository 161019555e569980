use serde::{Deserialize, Serialize};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct ShopConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub storage: StorageBackend,
    pub mongodb: MongoConfig,
    pub smtp: SmtpConfig,
    pub jwt: JwtConfig,
    pub auth: AuthConfig,
    pub otp: OtpConfig,
    pub shop: ShopProfile,
    pub mailer: MailerConfig,
    pub console: ConsoleConfig,
}

/// Where items, invoices and OTP codes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Mongodb,
    /// Process-local; data is lost on exit.
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(StorageBackend::Mongodb),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "Unknown SHOP_STORAGE backend '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub access_token_expiry_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// When false the API is open, matching a single-terminal shop setup.
    pub required: bool,
    /// Addresses allowed to request a login code. Empty allows everyone.
    pub operator_emails: Vec<String>,
}

impl AuthConfig {
    pub fn is_operator(&self, email: &str) -> bool {
        self.operator_emails.is_empty()
            || self
                .operator_emails
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(email))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    pub ttl_seconds: i64,
    pub max_attempts: i32,
    pub max_sends_per_window: u64,
    pub send_window_minutes: i64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            max_attempts: 5,
            max_sends_per_window: 3,
            send_window_minutes: 15,
        }
    }
}

/// Letterhead printed on every invoice.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopProfile {
    pub name: String,
    pub owner: String,
    pub address: String,
    pub contact: String,
    pub email: String,
    pub gst_number: String,
    pub currency: String,
}

impl Default for ShopProfile {
    fn default() -> Self {
        Self {
            name: "Grocery Shop".to_string(),
            owner: "Shop Owner".to_string(),
            address: "Main Road".to_string(),
            contact: "0000000000".to_string(),
            email: "shop@example.com".to_string(),
            gst_number: "N/A".to_string(),
            currency: "Rs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailerConfig {
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    /// Directory the console writes invoice PDFs into.
    pub invoice_dir: String,
}

impl ShopConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";
        let defaults = ShopProfile::default();
        let otp_defaults = OtpConfig::default();

        let storage: StorageBackend = env::var("SHOP_STORAGE")
            .unwrap_or_else(|_| "mongodb".to_string())
            .parse()?;

        // Memory-backed runs need no database URI even in prod
        let mongo_uri_default = match storage {
            StorageBackend::Memory => Some("mongodb://localhost:27017"),
            StorageBackend::Mongodb => None,
        };

        Ok(ShopConfig {
            common: common_config,
            storage,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", mongo_uri_default, is_prod && mongo_uri_default.is_none())?,
                database: get_env("MONGODB_DATABASE", Some("grocery_shop"), false)?,
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some("smtp.gmail.com"), false)?,
                port: get_env("SMTP_PORT", Some("587"), false)?
                    .parse()
                    .unwrap_or(587),
                user: get_env("SMTP_USER", Some(""), false)?,
                password: get_env("SMTP_PASSWORD", Some(""), false)?,
                from_email: get_env("SMTP_FROM_EMAIL", Some("noreply@example.com"), false)?,
                from_name: get_env("SMTP_FROM_NAME", Some(defaults.name.as_str()), false)?,
                enabled: env::var("SMTP_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
            },
            jwt: JwtConfig {
                secret: get_env("JWT_SECRET", Some("dev-only-insecure-secret"), is_prod)?,
                issuer: get_env("JWT_ISSUER", Some("shop-service"), false)?,
                access_token_expiry_minutes: get_env("JWT_EXPIRY_MINUTES", Some("60"), false)?
                    .parse()
                    .unwrap_or(60),
            },
            auth: AuthConfig {
                required: env::var("AUTH_REQUIRED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
                operator_emails: env::var("OPERATOR_EMAILS")
                    .map(|v| split_list(&v))
                    .unwrap_or_default(),
            },
            otp: OtpConfig {
                ttl_seconds: env_number("OTP_TTL_SECONDS", otp_defaults.ttl_seconds),
                max_attempts: env_number("OTP_MAX_ATTEMPTS", otp_defaults.max_attempts),
                max_sends_per_window: env_number(
                    "OTP_MAX_SENDS_PER_WINDOW",
                    otp_defaults.max_sends_per_window,
                ),
                send_window_minutes: env_number(
                    "OTP_SEND_WINDOW_MINUTES",
                    otp_defaults.send_window_minutes,
                ),
            },
            shop: ShopProfile {
                name: get_env("SHOP_NAME", Some(defaults.name.as_str()), false)?,
                owner: get_env("SHOP_OWNER", Some(defaults.owner.as_str()), false)?,
                address: get_env("SHOP_ADDRESS", Some(defaults.address.as_str()), false)?,
                contact: get_env("SHOP_CONTACT", Some(defaults.contact.as_str()), false)?,
                email: get_env("SHOP_EMAIL", Some(defaults.email.as_str()), false)?,
                gst_number: get_env("SHOP_GST_NUMBER", Some(defaults.gst_number.as_str()), false)?,
                currency: get_env("SHOP_CURRENCY", Some(defaults.currency.as_str()), false)?,
            },
            mailer: MailerConfig {
                queue_capacity: env_number("MAILER_QUEUE_CAPACITY", 100),
            },
            console: ConsoleConfig {
                invoice_dir: get_env("INVOICE_DIR", Some("."), false)?,
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn env_number<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
