use async_trait::async_trait;

use crate::domain::{DomainError, SecretRef};

/// Remote store holding the provider API key.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch and decode one secret version.
    ///
    /// Failures are reported as [`DomainError::Unauthenticated`],
    /// [`DomainError::PermissionDenied`], [`DomainError::NotFound`] or
    /// [`DomainError::Provider`] so callers can tell operators how to fix them.
    async fn access(&self, project_id: &str, secret: &SecretRef) -> Result<String, DomainError>;
}
