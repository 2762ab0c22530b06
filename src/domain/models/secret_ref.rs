pub const DEFAULT_SECRET_NAME: &str = "gemini-api-key";
pub const DEFAULT_SECRET_VERSION: &str = "latest";

/// Location of the provider API key in the secret store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRef {
    project_id: Option<String>,
    name: String,
    version: String,
}

impl SecretRef {
    pub fn new(project_id: Option<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            project_id: project_id.filter(|p| !p.trim().is_empty()),
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Fully qualified resource name, e.g. `projects/p/secrets/s/versions/latest`.
    pub fn resource_name(&self, project_id: &str) -> String {
        format!(
            "projects/{}/secrets/{}/versions/{}",
            project_id, self.name, self.version
        )
    }
}

impl Default for SecretRef {
    fn default() -> Self {
        Self::new(None, DEFAULT_SECRET_NAME, DEFAULT_SECRET_VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_project_id_counts_as_absent() {
        let secret = SecretRef::new(Some("  ".to_string()), "k", "1");
        assert!(secret.project_id().is_none());
    }

    #[test]
    fn resource_name_is_fully_qualified() {
        let secret = SecretRef::new(Some("proj".to_string()), "gemini-api-key", "latest");
        assert_eq!(
            secret.resource_name("proj"),
            "projects/proj/secrets/gemini-api-key/versions/latest"
        );
    }
}
