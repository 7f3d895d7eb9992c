// Docker CLI collaborator (login and config loading)

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use tracing::debug;

use super::reference::RepositoryRef;

/// Registry client operations the authorizer drives.
///
/// Every call receives the config directory explicitly; implementations must
/// not fall back to `DOCKER_CONFIG` from the process environment.
pub trait DockerClient: Send + Sync {
    /// Authenticate against the registry that hosts `repository`
    fn login(&self, config_dir: &Path, username: &str, password: &str, repository: &str)
        -> Result<()>;

    /// (Re)load the client configuration stored in `config_dir`
    fn init_config(&self, config_dir: &Path) -> Result<()>;
}

/// Docker `config.json` structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DockerConfigFile {
    /// Registry auths (base64 encoded credentials)
    #[serde(default)]
    pub auths: HashMap<String, DockerAuthEntry>,

    /// Credential store (e.g., "osxkeychain", "secretservice")
    #[serde(rename = "credsStore")]
    pub creds_store: Option<String>,

    /// Per-registry credential helpers
    #[serde(rename = "credHelpers", default)]
    pub cred_helpers: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DockerAuthEntry {
    /// Base64-encoded "username:password"
    pub auth: Option<String>,

    #[serde(rename = "identitytoken")]
    pub identity_token: Option<String>,
}

impl DockerConfigFile {
    pub const FILE_NAME: &'static str = "config.json";

    /// Load `config.json` from a config directory; a missing file is an empty config
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(Self::FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Registries this config can authenticate against
    pub fn registries(&self) -> Vec<&str> {
        let mut registries: Vec<&str> = self
            .auths
            .keys()
            .chain(self.cred_helpers.keys())
            .map(String::as_str)
            .collect();
        registries.sort_unstable();
        registries.dedup();
        registries
    }
}

/// [`DockerClient`] backed by the `docker` (or `podman`) CLI
#[derive(Debug, Clone)]
pub struct DockerCli {
    container_cli: String,
}

impl DockerCli {
    pub fn new(container_cli: impl Into<String>) -> Self {
        Self {
            container_cli: container_cli.into(),
        }
    }

    pub fn container_cli(&self) -> &str {
        &self.container_cli
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerClient for DockerCli {
    fn login(
        &self,
        config_dir: &Path,
        username: &str,
        password: &str,
        repository: &str,
    ) -> Result<()> {
        let repo = RepositoryRef::parse(repository)?;
        let registry = repo.registry();

        debug!(
            "Executing: {} --config {} login {} --username {} --password-stdin",
            self.container_cli,
            config_dir.display(),
            registry,
            username
        );

        let status = Command::new(&self.container_cli)
            .arg("--config")
            .arg(config_dir)
            .arg("login")
            .arg(registry)
            .arg("--username")
            .arg(username)
            .arg("--password-stdin")
            .stdin(std::process::Stdio::piped())
            .spawn()
            .and_then(|mut child| {
                use std::io::Write;
                // Reap the child even when it stops reading the password early
                let written = match child.stdin.take() {
                    Some(mut stdin) => stdin.write_all(password.as_bytes()),
                    None => Ok(()),
                };
                let status = child.wait();
                written.and(status)
            })
            .with_context(|| format!("Failed to execute {} login", self.container_cli))?;

        if !status.success() {
            bail!("{} login failed with status: {}", self.container_cli, status);
        }

        Ok(())
    }

    fn init_config(&self, config_dir: &Path) -> Result<()> {
        let config = DockerConfigFile::load(config_dir)?;

        debug!(
            "Loaded docker config from {} (registries: {:?}, credsStore: {:?})",
            config_dir.display(),
            config.registries(),
            config.creds_store
        );

        Ok(())
    }
}
