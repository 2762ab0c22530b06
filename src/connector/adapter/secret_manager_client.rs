use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::application::SecretStore;
use crate::domain::{Credential, DomainError, SecretRef};

/// GCE / Cloud Run metadata endpoint handing out the attached service account's token.
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

#[derive(Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Deserialize)]
struct SecretPayload {
    /// Base64-encoded secret bytes.
    data: String,
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
}

/// [`SecretStore`] backed by the Google Secret Manager REST API.
///
/// Authentication uses an explicit OAuth access token when one is configured
/// (`GOOGLE_OAUTH_ACCESS_TOKEN`), otherwise the token of the service account
/// attached to the instance, read from the metadata server. Outside Google
/// Cloud without a token, every lookup fails as unauthenticated.
pub struct GcpSecretManager {
    client: reqwest::Client,
    /// Short timeouts: off Google Cloud the metadata host does not resolve.
    metadata_client: reqwest::Client,
    base_url: String,
    metadata_url: String,
    access_token: Option<Credential>,
}

impl GcpSecretManager {
    pub fn new(base_url: impl Into<String>, access_token: Option<Credential>) -> Self {
        let base: String = base_url.into();
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            metadata_client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(2))
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap_or_default(),
            base_url: base.trim_end_matches('/').to_string(),
            metadata_url: METADATA_TOKEN_URL.to_string(),
            access_token,
        }
    }

    pub fn with_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_url = url.into();
        self
    }

    fn access_url(&self, project_id: &str, secret: &SecretRef) -> String {
        format!("{}/v1/{}:access", self.base_url, secret.resource_name(project_id))
    }

    async fn bearer_token(&self) -> Result<String, DomainError> {
        if let Some(token) = &self.access_token {
            return Ok(token.expose().to_string());
        }

        debug!("No access token configured; asking the metadata server");
        let response = self
            .metadata_client
            .get(&self.metadata_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| {
                DomainError::unauthenticated(format!(
                    "no application default credentials (GOOGLE_OAUTH_ACCESS_TOKEN unset, metadata server unreachable: {e})"
                ))
            })?;

        if !response.status().is_success() {
            return Err(DomainError::unauthenticated(format!(
                "metadata server returned {}",
                response.status()
            )));
        }

        let token: MetadataToken = response.json().await.map_err(|e| {
            DomainError::unauthenticated(format!("unreadable metadata token response: {e}"))
        })?;
        Ok(token.access_token)
    }

    /// Map a failed access call onto the error the resolver reports.
    fn classify_status(status: StatusCode, resource: &str, body: &str) -> DomainError {
        match status {
            StatusCode::UNAUTHORIZED => {
                DomainError::unauthenticated(format!("access token rejected for {resource}"))
            }
            StatusCode::FORBIDDEN => {
                DomainError::permission_denied(format!("caller may not access {resource}"))
            }
            StatusCode::NOT_FOUND => DomainError::not_found(resource.to_string()),
            _ => {
                warn!("GcpSecretManager: API returned {status}: {body}");
                DomainError::provider(format!("Secret Manager returned {status} for {resource}"))
            }
        }
    }

    fn decode_payload(data: &str) -> Result<String, DomainError> {
        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|e| DomainError::provider(format!("secret payload is not valid base64: {e}")))?;
        String::from_utf8(bytes)
            .map_err(|_| DomainError::provider("secret payload is not valid UTF-8"))
    }
}

#[async_trait]
impl SecretStore for GcpSecretManager {
    async fn access(&self, project_id: &str, secret: &SecretRef) -> Result<String, DomainError> {
        let token = self.bearer_token().await?;
        let resource = secret.resource_name(project_id);

        let response = self
            .client
            .get(self.access_url(project_id, secret))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| DomainError::provider(format!("GcpSecretManager: request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &resource, &body));
        }

        let body: AccessSecretVersionResponse = response.json().await.map_err(|e| {
            DomainError::provider(format!("GcpSecretManager: failed to parse response: {e}"))
        })?;

        Self::decode_payload(&body.payload.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_url_uses_resource_name() {
        let store = GcpSecretManager::new("https://secretmanager.googleapis.com/", None);
        let secret = SecretRef::new(Some("proj".to_string()), "gemini-api-key", "latest");
        assert_eq!(
            store.access_url("proj", &secret),
            "https://secretmanager.googleapis.com/v1/projects/proj/secrets/gemini-api-key/versions/latest:access"
        );
    }

    #[test]
    fn status_codes_map_to_distinct_causes() {
        let r = "projects/p/secrets/s/versions/latest";
        assert!(matches!(
            GcpSecretManager::classify_status(StatusCode::UNAUTHORIZED, r, ""),
            DomainError::Unauthenticated(_)
        ));
        assert!(matches!(
            GcpSecretManager::classify_status(StatusCode::FORBIDDEN, r, ""),
            DomainError::PermissionDenied(_)
        ));
        assert!(matches!(
            GcpSecretManager::classify_status(StatusCode::NOT_FOUND, r, ""),
            DomainError::NotFound(_)
        ));
        assert!(matches!(
            GcpSecretManager::classify_status(StatusCode::INTERNAL_SERVER_ERROR, r, "boom"),
            DomainError::Provider(_)
        ));
    }

    #[test]
    fn payload_is_base64_decoded() {
        let encoded = STANDARD.encode("my-api-key");
        assert_eq!(GcpSecretManager::decode_payload(&encoded).unwrap(), "my-api-key");
    }

    #[test]
    fn invalid_payload_is_a_provider_error() {
        assert!(matches!(
            GcpSecretManager::decode_payload("***"),
            Err(DomainError::Provider(_))
        ));
        let not_utf8 = STANDARD.encode([0xff, 0xfe]);
        assert!(GcpSecretManager::decode_payload(&not_utf8).is_err());
    }
}
