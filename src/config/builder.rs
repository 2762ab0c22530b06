use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use super::{AppConfig, RunMode, ServerConfig};
use crate::domain::{
    Credential, HarmCategory, SafetySettings, SafetyThreshold, SecretRef, SessionConfig,
    DEFAULT_SECRET_NAME, DEFAULT_SECRET_VERSION,
};

/// Builds an [`AppConfig`] from named environment values.
///
/// Pure: it only looks at the map it was given. Every optional value has a
/// default, and an unparseable value logs a warning and falls back to it.
///
/// | Variable                        | Default                                      |
/// |---------------------------------|----------------------------------------------|
/// | `APP_CONFIG`                    | `development`                                |
/// | `HOST` / `PORT`                 | `0.0.0.0` / `8080`                           |
/// | `CORS_ALLOWED_ORIGIN`           | unset                                        |
/// | `GCP_PROJECT_ID`                | unset                                        |
/// | `GEMINI_API_KEY_SECRET_NAME`    | `gemini-api-key`                             |
/// | `GEMINI_API_KEY_SECRET_VERSION` | `latest`                                     |
/// | `GOOGLE_API_KEY`                | unset                                        |
/// | `ALLOW_ENV_API_KEY`             | `false`                                      |
/// | `GEMINI_MODEL`                  | `gemini-1.5-pro-latest`                      |
/// | `GEMINI_API_BASE_URL`           | `https://generativelanguage.googleapis.com`  |
/// | `GEMINI_SAFETY_<CATEGORY>`      | `block-high`                                 |
/// | `MAX_HISTORY_LENGTH`            | `50`                                         |
/// | `MAX_QUESTION_LENGTH`           | `4000`                                       |
/// | `REQUEST_TIMEOUT_SECS`          | `120`                                        |
/// | `SECRET_MANAGER_BASE_URL`       | `https://secretmanager.googleapis.com`       |
/// | `GOOGLE_OAUTH_ACCESS_TOKEN`     | unset                                        |
/// | `LOG_DIR`                       | unset (no error log file)                    |
pub struct ConfigBuilder {
    vars: HashMap<String, String>,
}

impl ConfigBuilder {
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn build(&self) -> AppConfig {
        let defaults = AppConfig::default();

        let mode = match self.get("APP_CONFIG") {
            Some(raw) => RunMode::parse(raw).unwrap_or_else(|| {
                warn!("Unknown APP_CONFIG '{raw}', defaulting to development");
                RunMode::Development
            }),
            None => RunMode::default(),
        };

        let server = ServerConfig {
            host: self
                .get("HOST")
                .map(str::to_string)
                .unwrap_or(defaults.server.host),
            port: self.parse_or("PORT", defaults.server.port),
            cors_allowed_origin: self.get("CORS_ALLOWED_ORIGIN").map(str::to_string),
        };

        let secret = SecretRef::new(
            self.get("GCP_PROJECT_ID").map(str::to_string),
            self.get("GEMINI_API_KEY_SECRET_NAME").unwrap_or(DEFAULT_SECRET_NAME),
            self.get("GEMINI_API_KEY_SECRET_VERSION")
                .unwrap_or(DEFAULT_SECRET_VERSION),
        );

        AppConfig {
            mode,
            server,
            session: self.session_config(),
            secret,
            secret_manager_base_url: self
                .get("SECRET_MANAGER_BASE_URL")
                .map(str::to_string)
                .unwrap_or(defaults.secret_manager_base_url),
            access_token: self.get("GOOGLE_OAUTH_ACCESS_TOKEN").and_then(Credential::new),
            env_api_key: self.get("GOOGLE_API_KEY").and_then(Credential::new),
            allow_env_api_key: self.parse_bool("ALLOW_ENV_API_KEY", false),
            log_dir: self.log_dir(),
        }
    }

    /// Read on its own so logging can start before the rest is parsed.
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.get("LOG_DIR").map(PathBuf::from)
    }

    fn session_config(&self) -> SessionConfig {
        let defaults = SessionConfig::default();

        let mut safety = SafetySettings::default();
        for category in HarmCategory::ALL {
            let key = format!("GEMINI_SAFETY_{}", category.env_suffix());
            if let Some(raw) = self.get(&key) {
                match SafetyThreshold::parse(raw) {
                    Some(threshold) => safety = safety.with_threshold(category, threshold),
                    None => warn!(
                        "Invalid {key} '{raw}', keeping {}",
                        safety.threshold(category).as_str()
                    ),
                }
            }
        }

        let max_question_length =
            self.parse_positive("MAX_QUESTION_LENGTH", defaults.max_question_length());
        let timeout_secs = self.parse_positive(
            "REQUEST_TIMEOUT_SECS",
            defaults.request_timeout().as_secs() as usize,
        );

        SessionConfig::default()
            .with_model(self.get("GEMINI_MODEL").unwrap_or(defaults.model()))
            .with_api_base_url(
                self.get("GEMINI_API_BASE_URL")
                    .unwrap_or(defaults.api_base_url()),
            )
            .with_safety(safety)
            .with_max_history_length(
                self.parse_positive("MAX_HISTORY_LENGTH", defaults.max_history_length()),
            )
            .with_max_question_length(max_question_length)
            .with_request_timeout(Duration::from_secs(timeout_secs as u64))
    }

    /// Blank values count as unset.
    fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> T
    where
        T: FromStr + std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("Invalid {key} '{raw}', using default {default}");
                default
            }),
            None => default,
        }
    }

    fn parse_positive(&self, key: &str, default: usize) -> usize {
        let value = self.parse_or(key, default);
        if value == 0 {
            warn!("{key} must be greater than zero, using default {default}");
            default
        } else {
            value
        }
    }

    fn parse_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key).map(str::to_lowercase).as_deref() {
            Some("1" | "true" | "yes" | "on") => true,
            Some("0" | "false" | "no" | "off") => false,
            Some(raw) => {
                warn!("Invalid {key} '{raw}', using default {default}");
                default
            }
            None => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_environment_yields_defaults() {
        let config = ConfigBuilder::from_vars(Vec::<(String, String)>::new()).build();

        assert_eq!(config.mode, RunMode::Development);
        assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
        assert!(config.server.cors_allowed_origin.is_none());
        assert_eq!(config.session, SessionConfig::default());
        assert_eq!(config.secret, SecretRef::default());
        assert!(config.env_api_key.is_none());
        assert!(config.env_key_allowed());
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn reads_every_documented_variable() {
        let config = ConfigBuilder::from_vars([
            ("APP_CONFIG", "production"),
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("CORS_ALLOWED_ORIGIN", "https://chat.example.com"),
            ("GCP_PROJECT_ID", "my-project"),
            ("GEMINI_API_KEY_SECRET_NAME", "other-key"),
            ("GEMINI_API_KEY_SECRET_VERSION", "3"),
            ("GOOGLE_API_KEY", "env-key"),
            ("ALLOW_ENV_API_KEY", "true"),
            ("GEMINI_MODEL", "gemini-pro"),
            ("GEMINI_SAFETY_HATE_SPEECH", "block-low"),
            ("GEMINI_SAFETY_DANGEROUS_CONTENT", "BLOCK_NONE"),
            ("MAX_HISTORY_LENGTH", "10"),
            ("MAX_QUESTION_LENGTH", "500"),
            ("REQUEST_TIMEOUT_SECS", "30"),
            ("LOG_DIR", "/var/log/gemini-relay"),
        ])
        .build();

        assert_eq!(config.mode, RunMode::Production);
        assert_eq!(config.server.bind_address(), "127.0.0.1:9000");
        assert_eq!(
            config.server.cors_allowed_origin.as_deref(),
            Some("https://chat.example.com")
        );
        assert_eq!(config.secret.project_id(), Some("my-project"));
        assert_eq!(config.secret.name(), "other-key");
        assert_eq!(config.secret.version(), "3");
        assert_eq!(config.env_api_key.as_ref().map(|c| c.expose()), Some("env-key"));
        assert!(config.env_key_allowed());
        assert_eq!(config.session.model(), "gemini-pro");
        assert_eq!(
            config.session.safety().threshold(HarmCategory::HateSpeech),
            SafetyThreshold::BlockLow
        );
        assert_eq!(
            config.session.safety().threshold(HarmCategory::DangerousContent),
            SafetyThreshold::BlockNone
        );
        assert_eq!(
            config.session.safety().threshold(HarmCategory::Harassment),
            SafetyThreshold::BlockHigh
        );
        assert_eq!(config.session.max_history_length(), 10);
        assert_eq!(config.session.max_question_length(), 500);
        assert_eq!(config.session.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/gemini-relay")));
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = ConfigBuilder::from_vars([
            ("APP_CONFIG", "staging"),
            ("PORT", "not-a-port"),
            ("GEMINI_SAFETY_HARASSMENT", "sometimes"),
            ("MAX_HISTORY_LENGTH", "-1"),
            ("MAX_QUESTION_LENGTH", "0"),
            ("ALLOW_ENV_API_KEY", "maybe"),
        ])
        .build();

        assert_eq!(config.mode, RunMode::Development);
        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.session.safety().threshold(HarmCategory::Harassment),
            SafetyThreshold::BlockHigh
        );
        assert_eq!(config.session.max_history_length(), 50);
        assert_eq!(config.session.max_question_length(), 4000);
        assert!(!config.allow_env_api_key);
    }

    #[test]
    fn production_refuses_env_key_without_opt_in() {
        let config = ConfigBuilder::from_vars([
            ("APP_CONFIG", "production"),
            ("GOOGLE_API_KEY", "env-key"),
        ])
        .build();

        assert!(config.env_api_key.is_some());
        assert!(!config.env_key_allowed());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = ConfigBuilder::from_vars([("GCP_PROJECT_ID", "  "), ("GOOGLE_API_KEY", "")]).build();

        assert!(config.secret.project_id().is_none());
        assert!(config.env_api_key.is_none());
    }
}
