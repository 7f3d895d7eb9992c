// Registry provider classification

use super::reference::{ReferenceError, RepositoryRef};

/// Classifies repositories by registry provider.
///
/// A credential-less provider is one whose registry client authenticates from
/// ambient identity (cloud metadata, gcloud helpers), so no explicit
/// `docker login` must be attempted for it.
pub trait ProviderClassifier: Send + Sync {
    fn is_credentialless(&self, repository: &str) -> Result<bool, ReferenceError>;
}

/// Google Container Registry and Artifact Registry
#[derive(Debug, Default, Clone, Copy)]
pub struct GcrClassifier;

impl GcrClassifier {
    fn is_google_host(host: &str) -> bool {
        // DNS names are case-insensitive
        let host = host.to_ascii_lowercase();
        host == "gcr.io" || host.ends_with(".gcr.io") || host.ends_with("-docker.pkg.dev")
    }
}

impl ProviderClassifier for GcrClassifier {
    fn is_credentialless(&self, repository: &str) -> Result<bool, ReferenceError> {
        // No repository means nothing to classify
        if repository.is_empty() {
            return Ok(false);
        }

        let repo = RepositoryRef::parse(repository)?;
        Ok(Self::is_google_host(repo.registry_hostname()))
    }
}
