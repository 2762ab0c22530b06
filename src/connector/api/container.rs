use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::application::{ChatProvider, ChatRelayUseCase, CredentialResolver, SecretStore};
use crate::config::{AppConfig, RunMode};
use crate::connector::adapter::{GcpSecretManager, GeminiClient, MockChatProvider};
use crate::domain::Credential;

/// Stand-in key used with `--mock-provider` when nothing else resolved.
const MOCK_CREDENTIAL: &str = "mock-provider-key";

pub struct ContainerConfig {
    pub app: AppConfig,
    /// Serve replies from [`MockChatProvider`] instead of Gemini.
    pub mock_provider: bool,
}

/// Wires configuration, credential and provider into the chat relay.
///
/// Built once at startup and shared by every request handler.
pub struct Container {
    relay: Arc<ChatRelayUseCase>,
    config: AppConfig,
}

impl Container {
    pub async fn new(config: ContainerConfig) -> Result<Self> {
        let ContainerConfig { app, mock_provider } = config;
        let session = Arc::new(app.session.clone());

        let provider: Arc<dyn ChatProvider> = if mock_provider {
            debug!("Using mock chat provider");
            Arc::new(MockChatProvider::echo())
        } else {
            reqwest::Url::parse(session.api_base_url()).with_context(|| {
                format!("Invalid GEMINI_API_BASE_URL '{}'", session.api_base_url())
            })?;
            debug!("Using Gemini model {}", session.model());
            Arc::new(GeminiClient::from_config(&session))
        };

        let store: Arc<dyn SecretStore> = Arc::new(GcpSecretManager::new(
            app.secret_manager_base_url.clone(),
            app.access_token.clone(),
        ));
        let resolver = CredentialResolver::standard(
            store,
            app.secret.clone(),
            app.env_api_key.clone(),
            app.env_key_allowed(),
        );
        debug!("Credential sources: {:?}", resolver.strategy_names());

        let mut credential = resolver.resolve().await;
        if credential.is_none() && mock_provider {
            warn!("No API key resolved; the mock provider will run with a placeholder key");
            credential = Credential::new(MOCK_CREDENTIAL);
        }

        info!(
            mode = app.mode.as_str(),
            model = provider.model_name(),
            configured = credential.is_some(),
            "Chat relay ready"
        );

        let relay = Arc::new(ChatRelayUseCase::new(session, credential, provider));
        Ok(Self::with_relay(app, relay))
    }

    /// Assemble a container around an already built relay.
    pub fn with_relay(config: AppConfig, relay: Arc<ChatRelayUseCase>) -> Self {
        Self { relay, config }
    }

    pub fn relay(&self) -> Arc<ChatRelayUseCase> {
        Arc::clone(&self.relay)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn mode(&self) -> RunMode {
        self.config.mode
    }
}
