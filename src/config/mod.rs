//! Configuration module for the admission service

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// Main application settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub security: SecuritySettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub workers: Option<usize>,
}

/// Admission secrets and the trusted origin list.
///
/// All three values fail closed when absent: an empty origin list denies every
/// origin, a missing API key rejects every key check, and a missing JWT secret
/// rejects every non-public request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecuritySettings {
    /// Comma-separated trusted origins, same wire format as `ALLOWED_ORIGINS`.
    #[serde(default)]
    pub allowed_origins: String,
    /// The single expected `x-api-key` value, shared by all trusted origins.
    #[serde(default)]
    pub api_key: Option<String>,
    /// HS256 secret for bearer-token validation.
    #[serde(default)]
    pub jwt_secret: Option<String>,
}

/// Window lengths and caps for the two rate-limit tiers.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_limit")]
    pub default_limit: u32,
    #[serde(default = "default_window_secs")]
    pub default_window_secs: u64,
    #[serde(default = "strict_limit")]
    pub strict_limit: u32,
    #[serde(default = "default_window_secs")]
    pub strict_window_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_limit() -> u32 {
    10
}

fn strict_limit() -> u32 {
    2
}

fn default_window_secs() -> u64 {
    60
}

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Configuration priority (highest to lowest):
    /// 1. Deployment-contract environment variables
    ///    (`ALLOWED_ORIGINS`, `API_KEY`, `JWT_SECRET`)
    /// 2. Environment variables (prefixed with GATEKEEPER_)
    /// 3. config/local.toml (gitignored)
    /// 4. config/default.toml
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"));

        let builder = Config::builder()
            // Start with default configuration
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local overrides (gitignored)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment variables (GATEKEEPER_SERVER__PORT, etc.)
            .add_source(
                Environment::with_prefix("GATEKEEPER")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut settings: Settings = builder.build()?.try_deserialize()?;

        // The deployment contract names these bare variables; they win over
        // anything the files or prefixed variables set.
        if let Ok(origins) = std::env::var("ALLOWED_ORIGINS") {
            settings.security.allowed_origins = origins;
        }
        if let Ok(api_key) = std::env::var("API_KEY") {
            settings.security.api_key = Some(api_key);
        }
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            settings.security.jwt_secret = Some(secret);
        }

        Ok(settings)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            default_window_secs: default_window_secs(),
            strict_limit: strict_limit(),
            strict_window_secs: default_window_secs(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server: ServerSettings::default(),
            security: SecuritySettings::default(),
            rate_limit: RateLimitSettings::default(),
        }
    }
}
