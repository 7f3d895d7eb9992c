// Error taxonomy for credential resolution and docker config management

use std::path::PathBuf;

use super::credentials::OperationKind;
use super::reference::ReferenceError;

/// Errors surfaced by the resolver and the authorizer.
///
/// None of these are retried internally; every variant is terminal for the
/// enclosing operation.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("cannot get docker credentials for {operation}: {source}")]
    Resolution {
        operation: OperationKind,
        #[source]
        source: ReferenceError,
    },

    #[error("error creating tmp dir {} for docker config: {source}", .path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot login into docker repo '{repo}' for {operation}: {source}")]
    Login {
        operation: OperationKind,
        repo: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("cannot initialize docker config at {}: {source}", .path.display())]
    ConfigInit {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("cannot determine home directory for the default docker config")]
    HomeDirUnavailable,

    #[error("login for {operation} already failed for this authorizer")]
    SlotFailed { operation: OperationKind },
}
