use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::application::SecretStore;
use crate::domain::{Credential, DomainError, SecretRef};

/// Environment variable holding a directly supplied API key.
pub const API_KEY_ENV_VAR: &str = "GOOGLE_API_KEY";

/// One way of obtaining the provider credential.
#[async_trait]
pub trait CredentialStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means this source has no credential; the resolver moves on.
    async fn resolve(&self) -> Result<Option<Credential>, DomainError>;
}

/// Reads the API key from the remote secret store.
pub struct SecretStoreStrategy {
    store: Arc<dyn SecretStore>,
    secret: SecretRef,
}

impl SecretStoreStrategy {
    pub fn new(store: Arc<dyn SecretStore>, secret: SecretRef) -> Self {
        Self { store, secret }
    }
}

#[async_trait]
impl CredentialStrategy for SecretStoreStrategy {
    fn name(&self) -> &'static str {
        "secret-manager"
    }

    async fn resolve(&self) -> Result<Option<Credential>, DomainError> {
        let Some(project_id) = self.secret.project_id() else {
            return Err(DomainError::configuration(
                "GCP_PROJECT_ID is not set; cannot read the API key from Secret Manager",
            ));
        };
        let secret_name = self.secret.name();

        info!("Fetching secret {}", self.secret.resource_name(project_id));

        match self.store.access(project_id, &self.secret).await {
            Ok(value) => match Credential::new(value) {
                Some(credential) => {
                    info!("Fetched the Gemini API key from Secret Manager");
                    Ok(Some(credential))
                }
                None => {
                    warn!(
                        secret = secret_name,
                        project = project_id,
                        "Secret '{secret_name}' exists but its payload is empty"
                    );
                    Ok(None)
                }
            },
            Err(DomainError::Unauthenticated(detail)) => {
                error!(
                    secret = secret_name,
                    project = project_id,
                    "Secret Manager authentication failed: {detail}. \
                     Run 'gcloud auth application-default login' or attach a service account."
                );
                Ok(None)
            }
            Err(DomainError::PermissionDenied(detail)) => {
                error!(
                    secret = secret_name,
                    project = project_id,
                    "Permission denied reading secret '{secret_name}': {detail}"
                );
                warn!("Check that the service account has the 'Secret Manager Secret Accessor' role.");
                Ok(None)
            }
            Err(DomainError::NotFound(detail)) => {
                error!(
                    secret = secret_name,
                    project = project_id,
                    "Secret '{secret_name}' not found in project '{project_id}': {detail}"
                );
                Ok(None)
            }
            Err(e) => {
                error!(
                    secret = secret_name,
                    project = project_id,
                    "Unexpected error while contacting Secret Manager: {e}"
                );
                Ok(None)
            }
        }
    }
}

/// Uses a key captured from the process environment at startup.
pub struct EnvironmentStrategy {
    var_name: &'static str,
    value: Option<Credential>,
}

impl EnvironmentStrategy {
    pub fn new(var_name: &'static str, value: Option<Credential>) -> Self {
        Self { var_name, value }
    }
}

#[async_trait]
impl CredentialStrategy for EnvironmentStrategy {
    fn name(&self) -> &'static str {
        "environment"
    }

    async fn resolve(&self) -> Result<Option<Credential>, DomainError> {
        if self.value.is_none() {
            debug!("{} is not set", self.var_name);
        }
        Ok(self.value.clone())
    }
}

/// Tries credential sources in order; the first one that yields a key wins.
pub struct CredentialResolver {
    strategies: Vec<Box<dyn CredentialStrategy>>,
}

impl CredentialResolver {
    pub fn new(strategies: Vec<Box<dyn CredentialStrategy>>) -> Self {
        Self { strategies }
    }

    /// Secret store first, then the environment key when `allow_env_key` is set.
    ///
    /// Production deployments pass `allow_env_key = false` unless the operator
    /// opted in explicitly, so a missing secret leaves the relay unconfigured.
    pub fn standard(
        store: Arc<dyn SecretStore>,
        secret: SecretRef,
        env_key: Option<Credential>,
        allow_env_key: bool,
    ) -> Self {
        let mut strategies: Vec<Box<dyn CredentialStrategy>> =
            vec![Box::new(SecretStoreStrategy::new(store, secret))];
        if allow_env_key {
            strategies.push(Box::new(EnvironmentStrategy::new(API_KEY_ENV_VAR, env_key)));
        } else if env_key.is_some() {
            warn!(
                "{API_KEY_ENV_VAR} is set but ignored in production; set ALLOW_ENV_API_KEY=true to use it"
            );
        }
        Self::new(strategies)
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub async fn resolve(&self) -> Option<Credential> {
        for strategy in &self.strategies {
            match strategy.resolve().await {
                Ok(Some(credential)) => {
                    info!(source = strategy.name(), "Gemini API key resolved");
                    return Some(credential);
                }
                Ok(None) => {
                    debug!(source = strategy.name(), "No credential from this source");
                }
                Err(e) => {
                    error!(source = strategy.name(), "Credential source failed: {e}");
                }
            }
        }

        warn!("No Gemini API key available; the chat relay will run unconfigured");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeSecretStore {
        result: Mutex<Option<Result<String, DomainError>>>,
        calls: AtomicUsize,
    }

    impl FakeSecretStore {
        fn new(result: Result<String, DomainError>) -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(Some(result)),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SecretStore for FakeSecretStore {
        async fn access(&self, _project_id: &str, _secret: &SecretRef) -> Result<String, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(DomainError::provider("called twice")))
        }
    }

    fn secret_with_project() -> SecretRef {
        SecretRef::new(Some("proj".to_string()), "gemini-api-key", "latest")
    }

    #[tokio::test]
    async fn missing_project_id_fails_without_network_call() {
        let store = FakeSecretStore::new(Ok("key".to_string()));
        let strategy = SecretStoreStrategy::new(store.clone(), SecretRef::default());

        let err = strategy.resolve().await.unwrap_err();

        assert!(matches!(err, DomainError::Configuration(_)));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn secret_store_value_becomes_credential() {
        let store = FakeSecretStore::new(Ok("from-secret".to_string()));
        let strategy = SecretStoreStrategy::new(store, secret_with_project());

        let credential = strategy.resolve().await.unwrap().unwrap();
        assert_eq!(credential.expose(), "from-secret");
    }

    #[tokio::test]
    async fn every_store_failure_degrades_to_no_credential() {
        for err in [
            DomainError::unauthenticated("no adc"),
            DomainError::permission_denied("403"),
            DomainError::not_found("404"),
            DomainError::provider("connection reset"),
        ] {
            let strategy = SecretStoreStrategy::new(FakeSecretStore::new(Err(err)), secret_with_project());
            assert!(strategy.resolve().await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn resolver_falls_back_to_environment() {
        let store = FakeSecretStore::new(Err(DomainError::not_found("404")));
        let resolver = CredentialResolver::standard(
            store.clone(),
            secret_with_project(),
            Credential::new("env-key"),
            true,
        );

        let credential = resolver.resolve().await.unwrap();

        assert_eq!(credential.expose(), "env-key");
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn secret_store_wins_over_environment() {
        let store = FakeSecretStore::new(Ok("from-secret".to_string()));
        let resolver =
            CredentialResolver::standard(store, secret_with_project(), Credential::new("env-key"), true);

        assert_eq!(resolver.resolve().await.unwrap().expose(), "from-secret");
    }

    #[tokio::test]
    async fn environment_key_ignored_when_not_allowed() {
        let store = FakeSecretStore::new(Ok("unused".to_string()));
        let resolver =
            CredentialResolver::standard(store.clone(), SecretRef::default(), Credential::new("env-key"), false);

        assert_eq!(resolver.strategy_names(), ["secret-manager"]);
        assert!(resolver.resolve().await.is_none());
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn empty_resolver_yields_nothing() {
        assert!(CredentialResolver::new(vec![]).resolve().await.is_none());
    }
}
