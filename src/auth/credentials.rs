// Credential resolution per operation kind

use std::fmt;

use super::env::AuthEnv;
use super::error::AuthError;
use super::provider::ProviderClassifier;

/// Username paired with `WERF_CLEANUP_REGISTRY_PASSWORD`
pub const CLEANUP_USERNAME: &str = "werf-cleanup";
/// Username paired with the GitLab CI job token
pub const CI_USERNAME: &str = "gitlab-ci-token";

/// A complete username/password pair; never half-filled
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialSet {
    username: String,
    password: String,
}

impl CredentialSet {
    /// Returns `None` unless both fields are non-empty
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Option<Self> {
        let username = username.into();
        let password = password.into();
        if username.is_empty() || password.is_empty() {
            return None;
        }
        Some(Self { username, password })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Outcome of walking a resolution chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No rule matched
    Unresolved,
    /// The registry provider authenticates ambiently; login must be skipped
    NoCredentials,
    Credentials(CredentialSet),
}

impl Resolution {
    pub fn into_credentials(self) -> Option<CredentialSet> {
        match self {
            Resolution::Credentials(creds) => Some(creds),
            Resolution::Unresolved | Resolution::NoCredentials => None,
        }
    }

    pub fn credentials(&self) -> Option<&CredentialSet> {
        match self {
            Resolution::Credentials(creds) => Some(creds),
            Resolution::Unresolved | Resolution::NoCredentials => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Pulling base images during a stages build
    Pull,
    /// Publishing images
    Push,
    Purge,
    Sync,
    Cleanup,
    Deploy,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Pull => "pull",
            OperationKind::Push => "push",
            OperationKind::Purge => "purge",
            OperationKind::Sync => "sync",
            OperationKind::Cleanup => "cleanup",
            OperationKind::Deploy => "deploy",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call resolution inputs
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    pub username: String,
    pub password: String,
    /// Target repository; empty when the operation has none
    pub repository: String,
}

impl OperationContext {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            repository: repository.into(),
        }
    }
}

/// Resolve credentials for one operation.
///
/// Rules are tried in a fixed order and the first match wins:
///
/// | Operation              | Chain                                               |
/// |------------------------|-----------------------------------------------------|
/// | pull                   | explicit, CI auto-login                             |
/// | push / sync / deploy   | explicit, provider, CI auto-login                   |
/// | purge                  | explicit                                            |
/// | cleanup                | explicit, cleanup password, provider, CI auto-login |
pub fn resolve(
    kind: OperationKind,
    ctx: &OperationContext,
    env: &AuthEnv,
    classifier: &dyn ProviderClassifier,
) -> Result<Resolution, AuthError> {
    let resolution = explicit(ctx);
    if resolution != Resolution::Unresolved {
        return Ok(resolution);
    }

    let resolution = match kind {
        OperationKind::Pull => ci_autologin(env),
        OperationKind::Push | OperationKind::Sync | OperationKind::Deploy => {
            match provider(kind, ctx, classifier)? {
                Resolution::Unresolved => ci_autologin(env),
                resolution => resolution,
            }
        }
        OperationKind::Purge => Resolution::Unresolved,
        OperationKind::Cleanup => match cleanup_password(env) {
            Resolution::Unresolved => match provider(kind, ctx, classifier)? {
                Resolution::Unresolved => ci_autologin(env),
                resolution => resolution,
            },
            resolution => resolution,
        },
    };

    Ok(resolution)
}

fn explicit(ctx: &OperationContext) -> Resolution {
    match CredentialSet::new(ctx.username.as_str(), ctx.password.as_str()) {
        Some(creds) => Resolution::Credentials(creds),
        None => Resolution::Unresolved,
    }
}

fn cleanup_password(env: &AuthEnv) -> Resolution {
    env.cleanup_registry_password
        .as_deref()
        .and_then(|password| CredentialSet::new(CLEANUP_USERNAME, password))
        .map_or(Resolution::Unresolved, Resolution::Credentials)
}

fn provider(
    kind: OperationKind,
    ctx: &OperationContext,
    classifier: &dyn ProviderClassifier,
) -> Result<Resolution, AuthError> {
    let credentialless = classifier
        .is_credentialless(&ctx.repository)
        .map_err(|source| AuthError::Resolution {
            operation: kind,
            source,
        })?;

    Ok(if credentialless {
        Resolution::NoCredentials
    } else {
        Resolution::Unresolved
    })
}

fn ci_autologin(env: &AuthEnv) -> Resolution {
    if env.ignore_ci_autologin || env.ci_registry.as_deref().unwrap_or_default().is_empty() {
        return Resolution::Unresolved;
    }

    env.ci_job_token
        .as_deref()
        .and_then(|token| CredentialSet::new(CI_USERNAME, token))
        .map_or(Resolution::Unresolved, Resolution::Credentials)
}
