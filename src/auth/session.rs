// Operation entry points: resolve credentials, then build the authorizer

use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::authorizer::{Authorizer, CredentialSlots};
use super::credentials::{resolve, OperationContext, OperationKind, Resolution};
use super::docker::{DockerCli, DockerClient};
use super::env::AuthEnv;
use super::error::AuthError;
use super::provider::{GcrClassifier, ProviderClassifier};

/// Collaborators shared by every entry point of one command invocation
pub struct AuthSession {
    env: AuthEnv,
    classifier: Box<dyn ProviderClassifier>,
    client: Arc<dyn DockerClient>,
}

impl AuthSession {
    pub fn new(
        env: AuthEnv,
        classifier: Box<dyn ProviderClassifier>,
        client: Arc<dyn DockerClient>,
    ) -> Self {
        Self {
            env,
            classifier,
            client,
        }
    }

    /// Session over the process environment, GCR classification and the given container CLI
    pub fn from_env(container_cli: &str) -> Self {
        Self::new(
            AuthEnv::from_env(),
            Box::new(GcrClassifier),
            Arc::new(DockerCli::new(container_cli)),
        )
    }

    pub fn env(&self) -> &AuthEnv {
        &self.env
    }

    /// Resolve one operation's credentials without touching the filesystem
    pub fn resolve(
        &self,
        kind: OperationKind,
        ctx: &OperationContext,
    ) -> Result<Resolution, AuthError> {
        let resolution = resolve(kind, ctx, &self.env, self.classifier.as_ref())?;

        match &resolution {
            Resolution::Credentials(creds) => debug!(
                "Resolved docker credentials for {} (username: {})",
                kind,
                creds.username()
            ),
            Resolution::NoCredentials => debug!(
                "Registry of '{}' needs no docker login for {}",
                ctx.repository, kind
            ),
            Resolution::Unresolved => debug!("No docker credentials for {}", kind),
        }

        Ok(resolution)
    }

    /// Stages build: pull credentials only; the repository is never classified
    pub fn build_stages(
        &self,
        tmp_root: &Path,
        ctx: &OperationContext,
    ) -> Result<Authorizer, AuthError> {
        let pull = self.resolve(OperationKind::Pull, ctx)?.into_credentials();

        self.authorizer(tmp_root, CredentialSlots::Stages { pull, push: None })
    }

    pub fn image_publish(
        &self,
        tmp_root: &Path,
        ctx: &OperationContext,
    ) -> Result<Authorizer, AuthError> {
        let push = self.resolve(OperationKind::Push, ctx)?.into_credentials();

        self.authorizer(tmp_root, CredentialSlots::Stages { pull: None, push })
    }

    /// Combined flow; pull resolution failure aborts before push is resolved
    pub fn build_and_publish(
        &self,
        tmp_root: &Path,
        pull_ctx: &OperationContext,
        push_ctx: &OperationContext,
    ) -> Result<Authorizer, AuthError> {
        let pull = self
            .resolve(OperationKind::Pull, pull_ctx)?
            .into_credentials();
        let push = self
            .resolve(OperationKind::Push, push_ctx)?
            .into_credentials();

        self.authorizer(tmp_root, CredentialSlots::Stages { pull, push })
    }

    pub fn purge(&self, tmp_root: &Path, ctx: &OperationContext) -> Result<Authorizer, AuthError> {
        self.generic(OperationKind::Purge, tmp_root, ctx)
    }

    pub fn sync(&self, tmp_root: &Path, ctx: &OperationContext) -> Result<Authorizer, AuthError> {
        self.generic(OperationKind::Sync, tmp_root, ctx)
    }

    pub fn cleanup(
        &self,
        tmp_root: &Path,
        ctx: &OperationContext,
    ) -> Result<Authorizer, AuthError> {
        self.generic(OperationKind::Cleanup, tmp_root, ctx)
    }

    pub fn deploy(&self, tmp_root: &Path, ctx: &OperationContext) -> Result<Authorizer, AuthError> {
        self.generic(OperationKind::Deploy, tmp_root, ctx)
    }

    fn generic(
        &self,
        operation: OperationKind,
        tmp_root: &Path,
        ctx: &OperationContext,
    ) -> Result<Authorizer, AuthError> {
        let credentials = self.resolve(operation, ctx)?.into_credentials();

        self.authorizer(
            tmp_root,
            CredentialSlots::Generic {
                operation,
                credentials,
            },
        )
    }

    fn authorizer(&self, tmp_root: &Path, slots: CredentialSlots) -> Result<Authorizer, AuthError> {
        Authorizer::build(tmp_root, slots, &self.env, self.client.clone())
    }
}
