// Auth module - registry credential resolution and docker config management
//
// Resolves which registry credentials a build, publish, purge, sync, cleanup or
// deploy operation should log in with, selects the docker config directory the
// logins are written into, and drives the logins through the docker CLI.

mod authorizer;
mod credentials;
mod docker;
mod env;
mod error;
mod provider;
mod reference;
mod session;

pub use authorizer::{Authorizer, CredentialSlots, LoginState, Slot, TMP_DOCKER_CONFIG_DIR};
pub use credentials::{
    resolve, CredentialSet, OperationContext, OperationKind, Resolution, CI_USERNAME,
    CLEANUP_USERNAME,
};
pub use docker::{DockerAuthEntry, DockerCli, DockerClient, DockerConfigFile};
pub use env::{env_var_non_empty, AuthEnv, DOCKER_CONFIG};
pub use error::AuthError;
pub use provider::{GcrClassifier, ProviderClassifier};
pub use reference::{ReferenceError, RepositoryRef, DEFAULT_REGISTRY};
pub use session::AuthSession;
