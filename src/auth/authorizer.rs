// Docker config directory selection and registry logins

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::info;

use super::credentials::{CredentialSet, OperationKind};
use super::docker::DockerClient;
use super::env::{AuthEnv, DOCKER_CONFIG};
use super::error::AuthError;

/// Name of the scratch config directory created under the temporary root
pub const TMP_DOCKER_CONFIG_DIR: &str = "docker";

/// Resolved credentials an authorizer logs in with.
///
/// Generic operations (purge, sync, cleanup, deploy) and stage builds use
/// disjoint slots, so an authorizer never holds both kinds.
#[derive(Debug, Clone)]
pub enum CredentialSlots {
    Generic {
        operation: OperationKind,
        credentials: Option<CredentialSet>,
    },
    Stages {
        pull: Option<CredentialSet>,
        push: Option<CredentialSet>,
    },
}

impl CredentialSlots {
    fn has_any(&self) -> bool {
        match self {
            CredentialSlots::Generic { credentials, .. } => credentials.is_some(),
            CredentialSlots::Stages { pull, push } => pull.is_some() || push.is_some(),
        }
    }
}

/// Login progress of a single credential slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginState {
    #[default]
    Unattempted,
    /// No credentials or an external config; nothing to do
    Skipped,
    LoggedIn,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Generic,
    Pull,
    Push,
}

/// Holds resolved credentials and the docker config directory they are written into
pub struct Authorizer {
    config_dir: PathBuf,
    external_config: bool,
    slots: CredentialSlots,
    generic_state: LoginState,
    pull_state: LoginState,
    push_state: LoginState,
    client: Arc<dyn DockerClient>,
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer")
            .field("config_dir", &self.config_dir)
            .field("external_config", &self.external_config)
            .field("slots", &self.slots)
            .field("generic_state", &self.generic_state)
            .field("pull_state", &self.pull_state)
            .field("push_state", &self.push_state)
            .finish_non_exhaustive()
    }
}

impl Authorizer {
    /// Select the docker config directory and initialize the client config there.
    ///
    /// Directory precedence:
    /// 1. `WERF_DOCKER_CONFIG`, adopted as-is (external)
    /// 2. `<tmp_root>/docker`, freshly created, when any credentials are present
    /// 3. `HOME/.docker` (external)
    pub fn build(
        tmp_root: &Path,
        slots: CredentialSlots,
        env: &AuthEnv,
        client: Arc<dyn DockerClient>,
    ) -> Result<Self, AuthError> {
        let (config_dir, external_config) = if let Some(dir) = &env.docker_config {
            (dir.clone(), true)
        } else if slots.has_any() {
            let tmp_dir = tmp_root.join(TMP_DOCKER_CONFIG_DIR);

            std::fs::create_dir(&tmp_dir).map_err(|source| AuthError::Directory {
                path: tmp_dir.clone(),
                source,
            })?;

            info!("Using tmp docker config at {}", tmp_dir.display());

            (tmp_dir, false)
        } else {
            (env.home_docker_config_dir()?, true)
        };

        client
            .init_config(&config_dir)
            .map_err(|source| AuthError::ConfigInit {
                path: config_dir.clone(),
                source,
            })?;

        Ok(Self {
            config_dir,
            external_config,
            slots,
            generic_state: LoginState::default(),
            pull_state: LoginState::default(),
            push_state: LoginState::default(),
            client,
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Whether the config directory is owned by the environment rather than this process
    pub fn is_external_config(&self) -> bool {
        self.external_config
    }

    pub fn slots(&self) -> &CredentialSlots {
        &self.slots
    }

    pub fn state(&self, slot: Slot) -> LoginState {
        match slot {
            Slot::Generic => self.generic_state,
            Slot::Pull => self.pull_state,
            Slot::Push => self.push_state,
        }
    }

    /// The `DOCKER_CONFIG` pair downstream registry-client invocations need
    pub fn docker_config_env(&self) -> (&'static str, &Path) {
        (DOCKER_CONFIG, &self.config_dir)
    }

    /// Point a child process at the active config directory
    pub fn configure_command<'a>(&self, cmd: &'a mut Command) -> &'a mut Command {
        cmd.env(DOCKER_CONFIG, &self.config_dir)
    }

    pub fn login_generic(&mut self, repo: &str) -> Result<(), AuthError> {
        self.login(Slot::Generic, repo)
    }

    pub fn login_for_pull(&mut self, repo: &str) -> Result<(), AuthError> {
        self.login(Slot::Pull, repo)
    }

    pub fn login_for_push(&mut self, repo: &str) -> Result<(), AuthError> {
        self.login(Slot::Push, repo)
    }

    /// Log in for pull, then for push.
    ///
    /// A missing or empty repository skips that slot. A pull failure returns
    /// immediately without attempting push; a push failure leaves the pull
    /// login in place.
    pub fn login_stages(
        &mut self,
        pull_repo: Option<&str>,
        push_repo: Option<&str>,
    ) -> Result<(), AuthError> {
        if let Some(repo) = pull_repo.filter(|r| !r.is_empty()) {
            self.login_for_pull(repo)?;
        }
        if let Some(repo) = push_repo.filter(|r| !r.is_empty()) {
            self.login_for_push(repo)?;
        }
        Ok(())
    }

    /// Credentials held for `slot`; slots the authorizer was not built with are absent
    fn slot_credentials(&self, slot: Slot) -> Option<(OperationKind, &CredentialSet)> {
        match (&self.slots, slot) {
            (CredentialSlots::Generic { operation, credentials }, Slot::Generic) => {
                credentials.as_ref().map(|creds| (*operation, creds))
            }
            (CredentialSlots::Stages { pull, .. }, Slot::Pull) => {
                pull.as_ref().map(|creds| (OperationKind::Pull, creds))
            }
            (CredentialSlots::Stages { push, .. }, Slot::Push) => {
                push.as_ref().map(|creds| (OperationKind::Push, creds))
            }
            _ => None,
        }
    }

    fn state_mut(&mut self, slot: Slot) -> &mut LoginState {
        match slot {
            Slot::Generic => &mut self.generic_state,
            Slot::Pull => &mut self.pull_state,
            Slot::Push => &mut self.push_state,
        }
    }

    fn login(&mut self, slot: Slot, repo: &str) -> Result<(), AuthError> {
        let slot_credentials = self
            .slot_credentials(slot)
            .map(|(operation, creds)| (operation, creds.clone()));

        let (operation, credentials) = match slot_credentials {
            Some(found) if !self.external_config => found,
            _ => {
                *self.state_mut(slot) = LoginState::Skipped;
                return Ok(());
            }
        };

        match self.state(slot) {
            LoginState::Unattempted => {}
            LoginState::Skipped | LoginState::LoggedIn => return Ok(()),
            LoginState::Failed => return Err(AuthError::SlotFailed { operation }),
        }

        let result = self.perform_login(operation, &credentials, repo);
        *self.state_mut(slot) = if result.is_ok() {
            LoginState::LoggedIn
        } else {
            LoginState::Failed
        };
        result?;

        info!("Login into docker repo '{}' for {}", repo, operation);

        Ok(())
    }

    fn perform_login(
        &self,
        operation: OperationKind,
        credentials: &CredentialSet,
        repo: &str,
    ) -> Result<(), AuthError> {
        self.client
            .login(
                &self.config_dir,
                credentials.username(),
                credentials.password(),
                repo,
            )
            .map_err(|source| AuthError::Login {
                operation,
                repo: repo.to_string(),
                source,
            })?;

        // Login may have rewritten config.json
        self.client
            .init_config(&self.config_dir)
            .map_err(|source| AuthError::ConfigInit {
                path: self.config_dir.clone(),
                source,
            })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Call {
        Login {
            config_dir: PathBuf,
            username: String,
            password: String,
            repository: String,
        },
        InitConfig(PathBuf),
    }

    /// Records every collaborator call; optionally fails logins or inits
    #[derive(Default)]
    pub(crate) struct RecordingClient {
        pub calls: Mutex<Vec<Call>>,
        pub fail_login: bool,
        /// Fail only logins against this repository
        pub fail_login_repo: Option<String>,
        pub fail_init: bool,
    }

    impl RecordingClient {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn login_count(&self) -> usize {
            self.calls()
                .iter()
                .filter(|call| matches!(call, Call::Login { .. }))
                .count()
        }
    }

    impl DockerClient for RecordingClient {
        fn login(
            &self,
            config_dir: &Path,
            username: &str,
            password: &str,
            repository: &str,
        ) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(Call::Login {
                config_dir: config_dir.to_path_buf(),
                username: username.to_string(),
                password: password.to_string(),
                repository: repository.to_string(),
            });
            if self.fail_login || self.fail_login_repo.as_deref() == Some(repository) {
                bail!("unauthorized: authentication required");
            }
            Ok(())
        }

        fn init_config(&self, config_dir: &Path) -> anyhow::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::InitConfig(config_dir.to_path_buf()));
            if self.fail_init {
                bail!("malformed config.json");
            }
            Ok(())
        }
    }

    fn creds(username: &str, password: &str) -> Option<CredentialSet> {
        CredentialSet::new(username, password)
    }

    fn home_env(home: &Path) -> AuthEnv {
        AuthEnv {
            home_dir: Some(home.to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    fn test_werf_docker_config_is_adopted_as_external() {
        let tmp = tempfile::tempdir().unwrap();
        let client = Arc::new(RecordingClient::default());
        let env = AuthEnv {
            docker_config: Some(PathBuf::from("/etc/werf/docker")),
            ..home_env(tmp.path())
        };

        let mut authorizer = Authorizer::build(
            tmp.path(),
            CredentialSlots::Generic {
                operation: OperationKind::Cleanup,
                credentials: creds("werf-cleanup", "secret"),
            },
            &env,
            client.clone(),
        )
        .unwrap();

        assert!(authorizer.is_external_config());
        assert_eq!(authorizer.config_dir(), Path::new("/etc/werf/docker"));
        assert!(!tmp.path().join(TMP_DOCKER_CONFIG_DIR).exists());

        authorizer.login_generic("registry.example.com/app").unwrap();
        assert_eq!(authorizer.state(Slot::Generic), LoginState::Skipped);
        assert_eq!(
            client.calls(),
            vec![Call::InitConfig(PathBuf::from("/etc/werf/docker"))]
        );
    }

    #[test]
    fn test_credentials_create_scratch_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let client = Arc::new(RecordingClient::default());

        let authorizer = Authorizer::build(
            tmp.path(),
            CredentialSlots::Stages {
                pull: creds("gitlab-ci-token", "tok123"),
                push: None,
            },
            &home_env(tmp.path()),
            client.clone(),
        )
        .unwrap();

        let expected = tmp.path().join(TMP_DOCKER_CONFIG_DIR);
        assert!(!authorizer.is_external_config());
        assert_eq!(authorizer.config_dir(), expected);
        assert!(expected.is_dir());
        assert_eq!(client.calls(), vec![Call::InitConfig(expected)]);
    }

    #[test]
    fn test_existing_scratch_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join(TMP_DOCKER_CONFIG_DIR)).unwrap();
        let client = Arc::new(RecordingClient::default());

        let err = Authorizer::build(
            tmp.path(),
            CredentialSlots::Generic {
                operation: OperationKind::Purge,
                credentials: creds("alice", "s3cret"),
            },
            &home_env(tmp.path()),
            client.clone(),
        )
        .unwrap_err();

        assert!(matches!(err, AuthError::Directory { .. }));
        assert!(err.to_string().starts_with("error creating tmp dir"));
        assert!(client.calls().is_empty());
    }

    #[test]
    fn test_no_credentials_fall_back_to_home() {
        let tmp = tempfile::tempdir().unwrap();
        let client = Arc::new(RecordingClient::default());

        let authorizer = Authorizer::build(
            tmp.path(),
            CredentialSlots::Stages {
                pull: None,
                push: None,
            },
            &home_env(Path::new("/home/builder")),
            client.clone(),
        )
        .unwrap();

        assert!(authorizer.is_external_config());
        assert_eq!(authorizer.config_dir(), Path::new("/home/builder/.docker"));
        assert!(!tmp.path().join(TMP_DOCKER_CONFIG_DIR).exists());
    }

    #[test]
    fn test_no_credentials_without_home_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Authorizer::build(
            tmp.path(),
            CredentialSlots::Generic {
                operation: OperationKind::Deploy,
                credentials: None,
            },
            &AuthEnv::default(),
            Arc::new(RecordingClient::default()),
        )
        .unwrap_err();

        assert!(matches!(err, AuthError::HomeDirUnavailable));
    }

    #[test]
    fn test_init_failure_during_build() {
        let tmp = tempfile::tempdir().unwrap();
        let client = Arc::new(RecordingClient {
            fail_init: true,
            ..Default::default()
        });

        let err = Authorizer::build(
            tmp.path(),
            CredentialSlots::Generic {
                operation: OperationKind::Sync,
                credentials: None,
            },
            &home_env(tmp.path()),
            client,
        )
        .unwrap_err();

        assert!(matches!(err, AuthError::ConfigInit { .. }));
    }

    #[test]
    fn test_login_for_push_logs_in_and_reinitializes() {
        let tmp = tempfile::tempdir().unwrap();
        let client = Arc::new(RecordingClient::default());

        let mut authorizer = Authorizer::build(
            tmp.path(),
            CredentialSlots::Stages {
                pull: None,
                push: creds("alice", "s3cret"),
            },
            &home_env(tmp.path()),
            client.clone(),
        )
        .unwrap();

        authorizer.login_for_pull("registry.example.com/base").unwrap();
        authorizer.login_for_push("registry.example.com/app").unwrap();

        let dir = tmp.path().join(TMP_DOCKER_CONFIG_DIR);
        assert_eq!(
            client.calls(),
            vec![
                Call::InitConfig(dir.clone()),
                Call::Login {
                    config_dir: dir.clone(),
                    username: "alice".to_string(),
                    password: "s3cret".to_string(),
                    repository: "registry.example.com/app".to_string(),
                },
                Call::InitConfig(dir),
            ]
        );
        assert_eq!(authorizer.state(Slot::Pull), LoginState::Skipped);
        assert_eq!(authorizer.state(Slot::Push), LoginState::LoggedIn);
    }

    #[test]
    fn test_repeated_login_is_a_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let client = Arc::new(RecordingClient::default());

        let mut authorizer = Authorizer::build(
            tmp.path(),
            CredentialSlots::Generic {
                operation: OperationKind::Deploy,
                credentials: creds("alice", "s3cret"),
            },
            &home_env(tmp.path()),
            client.clone(),
        )
        .unwrap();

        authorizer.login_generic("registry.example.com/app").unwrap();
        authorizer.login_generic("registry.example.com/app").unwrap();
        assert_eq!(client.login_count(), 1);

        // Stage slots are absent on a generic authorizer
        authorizer.login_for_pull("registry.example.com/app").unwrap();
        authorizer.login_for_push("registry.example.com/app").unwrap();
        assert_eq!(client.login_count(), 1);
        assert_eq!(authorizer.state(Slot::Pull), LoginState::Skipped);
        assert_eq!(authorizer.state(Slot::Push), LoginState::Skipped);
    }

    #[test]
    fn test_generic_slot_is_absent_on_stages_authorizer() {
        let tmp = tempfile::tempdir().unwrap();
        let client = Arc::new(RecordingClient::default());

        let mut authorizer = Authorizer::build(
            tmp.path(),
            CredentialSlots::Stages {
                pull: creds("alice", "s3cret"),
                push: creds("alice", "s3cret"),
            },
            &home_env(tmp.path()),
            client.clone(),
        )
        .unwrap();

        authorizer.login_generic("registry.example.com/app").unwrap();
        authorizer.login_generic("registry.example.com/app").unwrap();

        assert_eq!(authorizer.state(Slot::Generic), LoginState::Skipped);
        assert_eq!(client.login_count(), 0);
    }

    fn stages_authorizer(tmp: &Path, client: Arc<RecordingClient>) -> Authorizer {
        Authorizer::build(
            tmp,
            CredentialSlots::Stages {
                pull: creds("gitlab-ci-token", "tok123"),
                push: creds("bob", "pushpass"),
            },
            &home_env(tmp),
            client,
        )
        .unwrap()
    }

    #[test]
    fn test_login_stages_pull_failure_aborts_push() {
        let tmp = tempfile::tempdir().unwrap();
        let client = Arc::new(RecordingClient {
            fail_login_repo: Some("registry.example.com/base".to_string()),
            ..Default::default()
        });
        let mut authorizer = stages_authorizer(tmp.path(), client.clone());

        let err = authorizer
            .login_stages(
                Some("registry.example.com/base"),
                Some("registry.example.com/app"),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            AuthError::Login {
                operation: OperationKind::Pull,
                ..
            }
        ));
        assert_eq!(authorizer.state(Slot::Pull), LoginState::Failed);
        assert_eq!(authorizer.state(Slot::Push), LoginState::Unattempted);
        assert_eq!(client.login_count(), 1);
    }

    #[test]
    fn test_login_stages_push_failure_keeps_pull_login() {
        let tmp = tempfile::tempdir().unwrap();
        let client = Arc::new(RecordingClient {
            fail_login_repo: Some("registry.example.com/app".to_string()),
            ..Default::default()
        });
        let mut authorizer = stages_authorizer(tmp.path(), client.clone());

        let err = authorizer
            .login_stages(
                Some("registry.example.com/base"),
                Some("registry.example.com/app"),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            AuthError::Login {
                operation: OperationKind::Push,
                ..
            }
        ));
        assert_eq!(authorizer.state(Slot::Pull), LoginState::LoggedIn);
        assert_eq!(authorizer.state(Slot::Push), LoginState::Failed);
        assert_eq!(client.login_count(), 2);
    }

    #[test]
    fn test_login_stages_skips_missing_repositories() {
        let tmp = tempfile::tempdir().unwrap();
        let client = Arc::new(RecordingClient::default());
        let mut authorizer = stages_authorizer(tmp.path(), client.clone());

        authorizer
            .login_stages(None, Some("registry.example.com/app"))
            .unwrap();
        authorizer.login_stages(Some(""), None).unwrap();

        assert_eq!(authorizer.state(Slot::Pull), LoginState::Unattempted);
        assert_eq!(authorizer.state(Slot::Push), LoginState::LoggedIn);
        assert_eq!(client.login_count(), 1);
    }

    #[test]
    fn test_login_failure_marks_slot_failed() {
        let tmp = tempfile::tempdir().unwrap();
        let client = Arc::new(RecordingClient {
            fail_login: true,
            ..Default::default()
        });

        let mut authorizer = Authorizer::build(
            tmp.path(),
            CredentialSlots::Stages {
                pull: creds("gitlab-ci-token", "tok123"),
                push: creds("gitlab-ci-token", "tok123"),
            },
            &home_env(tmp.path()),
            client.clone(),
        )
        .unwrap();

        let err = authorizer
            .login_for_pull("registry.example.com/base")
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::Login {
                operation: OperationKind::Pull,
                ..
            }
        ));
        assert!(err
            .to_string()
            .contains("cannot login into docker repo 'registry.example.com/base' for pull"));
        assert_eq!(authorizer.state(Slot::Pull), LoginState::Failed);
        assert_eq!(authorizer.state(Slot::Push), LoginState::Unattempted);

        // Scratch directory is left for caller-level cleanup
        assert!(tmp.path().join(TMP_DOCKER_CONFIG_DIR).is_dir());

        let err = authorizer
            .login_for_pull("registry.example.com/base")
            .unwrap_err();
        assert!(matches!(err, AuthError::SlotFailed { .. }));
        assert_eq!(client.login_count(), 1);
    }

    #[test]
    fn test_docker_config_env_and_command() {
        let tmp = tempfile::tempdir().unwrap();
        let authorizer = Authorizer::build(
            tmp.path(),
            CredentialSlots::Generic {
                operation: OperationKind::Purge,
                credentials: creds("alice", "s3cret"),
            },
            &home_env(tmp.path()),
            Arc::new(RecordingClient::default()),
        )
        .unwrap();

        let (key, dir) = authorizer.docker_config_env();
        assert_eq!(key, "DOCKER_CONFIG");
        assert_eq!(dir, tmp.path().join(TMP_DOCKER_CONFIG_DIR));

        let mut cmd = Command::new("docker");
        authorizer.configure_command(&mut cmd);
        let envs: Vec<_> = cmd.get_envs().collect();
        assert_eq!(envs.len(), 1);
        assert_eq!(envs[0].0, "DOCKER_CONFIG");
        assert_eq!(
            envs[0].1.map(PathBuf::from),
            Some(tmp.path().join(TMP_DOCKER_CONFIG_DIR))
        );
    }
}
