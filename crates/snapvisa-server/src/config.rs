//! Server Configuration

use chrono::TimeDelta;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{key} has invalid value '{value}'")]
    Invalid { key: &'static str, value: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Process-wide settings read once at startup
#[derive(Clone)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,

    /// Externally visible origin used in checkout redirect URLs
    pub public_base_url: String,

    /// HMAC key for the session cookie
    pub session_secret: Vec<u8>,

    /// Idle time after which a session is discarded
    pub session_ttl: TimeDelta,

    /// Downloads allowed before payment
    pub free_downloads: u32,

    /// Request body ceiling for uploads
    pub max_upload_bytes: usize,

    /// Enables `/admin/feedback` when set
    pub admin_password: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            public_base_url: "http://localhost:3000".into(),
            session_secret: random_secret(),
            session_ttl: TimeDelta::hours(1),
            free_downloads: 1,
            max_upload_bytes: 10 * 1024 * 1024,
            admin_password: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let session_secret = match var("SESSION_SECRET") {
            Some(secret) => secret.into_bytes(),
            None if cfg!(debug_assertions) => {
                tracing::warn!("⚠ SESSION_SECRET not set - sessions will not survive a restart");
                defaults.session_secret
            }
            None => return Err(ConfigError::Missing("SESSION_SECRET")),
        };

        let session_ttl = parse::<i64>("SESSION_TTL_SECS")?
            .map_or(defaults.session_ttl, TimeDelta::seconds);

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            public_base_url: var("PUBLIC_BASE_URL").unwrap_or(defaults.public_base_url),
            session_secret,
            session_ttl,
            free_downloads: parse("FREE_DOWNLOADS")?.unwrap_or(defaults.free_downloads),
            max_upload_bytes: parse("MAX_UPLOAD_BYTES")?.unwrap_or(defaults.max_upload_bytes),
            admin_password: var("ADMIN_PASSWORD"),
        })
    }
}

// Secrets never reach logs.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("public_base_url", &self.public_base_url)
            .field("session_ttl", &self.session_ttl)
            .field("free_downloads", &self.free_downloads)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("admin_enabled", &self.admin_password.is_some())
            .finish_non_exhaustive()
    }
}

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    var(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value })
        })
        .transpose()
}

fn random_secret() -> Vec<u8> {
    rand::random::<[u8; 32]>().to_vec()
}
