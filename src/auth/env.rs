// Environment inputs, read once at the process boundary

use std::path::PathBuf;

use super::error::AuthError;

pub const WERF_DOCKER_CONFIG: &str = "WERF_DOCKER_CONFIG";
pub const WERF_CLEANUP_REGISTRY_PASSWORD: &str = "WERF_CLEANUP_REGISTRY_PASSWORD";
pub const WERF_IGNORE_CI_DOCKER_AUTOLOGIN: &str = "WERF_IGNORE_CI_DOCKER_AUTOLOGIN";
pub const CI_REGISTRY: &str = "CI_REGISTRY";
pub const CI_JOB_TOKEN: &str = "CI_JOB_TOKEN";
pub const HOME: &str = "HOME";

/// Name under which the active config directory is handed to the docker CLI
pub const DOCKER_CONFIG: &str = "DOCKER_CONFIG";

/// Read an environment variable, treating empty strings as if the variable is not set.
///
/// This helper ensures that empty environment variables (e.g., `CI_JOB_TOKEN=""`) are
/// handled the same as unset variables.
pub fn env_var_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|v| {
        if v.is_empty() {
            None
        } else {
            Some(v)
        }
    })
}

/// Snapshot of every environment input the resolver and authorizer consult.
///
/// Built once with [`AuthEnv::from_env`] and passed down explicitly, so the
/// resolution logic itself never touches the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthEnv {
    /// Operator-supplied docker config directory (`WERF_DOCKER_CONFIG`)
    pub docker_config: Option<PathBuf>,
    /// Password for the cleanup operation (`WERF_CLEANUP_REGISTRY_PASSWORD`)
    pub cleanup_registry_password: Option<String>,
    /// CI auto-login disabled (`WERF_IGNORE_CI_DOCKER_AUTOLOGIN` non-empty)
    pub ignore_ci_autologin: bool,
    pub ci_registry: Option<String>,
    pub ci_job_token: Option<String>,
    /// Base for the `~/.docker` fallback
    pub home_dir: Option<PathBuf>,
}

impl AuthEnv {
    /// Read the process environment
    pub fn from_env() -> Self {
        let mut env = Self::from_lookup(env_var_non_empty);
        if env.home_dir.is_none() {
            env.home_dir = dirs::home_dir();
        }
        env
    }

    /// Build from an arbitrary lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        Self {
            docker_config: get(WERF_DOCKER_CONFIG).map(PathBuf::from),
            cleanup_registry_password: get(WERF_CLEANUP_REGISTRY_PASSWORD),
            ignore_ci_autologin: get(WERF_IGNORE_CI_DOCKER_AUTOLOGIN).is_some(),
            ci_registry: get(CI_REGISTRY),
            ci_job_token: get(CI_JOB_TOKEN),
            home_dir: get(HOME).map(PathBuf::from),
        }
    }

    /// `HOME/.docker`, the config directory used when nothing else applies
    pub fn home_docker_config_dir(&self) -> Result<PathBuf, AuthError> {
        self.home_dir
            .as_ref()
            .map(|home| home.join(".docker"))
            .ok_or(AuthError::HomeDirUnavailable)
    }
}
