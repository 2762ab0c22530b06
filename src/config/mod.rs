//! Process configuration derived from environment variables.

mod builder;

use std::path::PathBuf;

pub use builder::ConfigBuilder;

use crate::domain::{Credential, SecretRef, SessionConfig};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SECRET_MANAGER_BASE_URL: &str = "https://secretmanager.googleapis.com";

/// Deployment flavour; production hides error details and refuses the env key fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Development,
    Production,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Development => "development",
            RunMode::Production => "production",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" | "default" => Some(RunMode::Development),
            "production" | "prod" => Some(RunMode::Production),
            _ => None,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, RunMode::Production)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Single origin allowed to call the API from a browser.
    pub cors_allowed_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_allowed_origin: None,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Everything the process needs, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: RunMode,
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub secret: SecretRef,
    pub secret_manager_base_url: String,
    /// Bearer token for Secret Manager; fetched from the metadata server when absent.
    pub access_token: Option<Credential>,
    /// Key taken from `GOOGLE_API_KEY`.
    pub env_api_key: Option<Credential>,
    /// Production opt-in for `env_api_key`.
    pub allow_env_api_key: bool,
    /// Where `errors.log` is written; console logging only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            server: ServerConfig::default(),
            session: SessionConfig::default(),
            secret: SecretRef::default(),
            secret_manager_base_url: DEFAULT_SECRET_MANAGER_BASE_URL.to_string(),
            access_token: None,
            env_api_key: None,
            allow_env_api_key: false,
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Whether the environment key may stand in for the secret store.
    pub fn env_key_allowed(&self) -> bool {
        !self.mode.is_production() || self.allow_env_api_key
    }
}
