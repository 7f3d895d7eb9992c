//! Registry credential resolution and docker config directory management.
//!
//! Given the command-line options of one operation (stages build, publish,
//! purge, sync, cleanup, deploy) and the surrounding CI environment, the
//! [`auth::AuthSession`] entry points decide which credentials to log in with
//! and which docker config directory the resulting logins live in.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use werf_docker_auth::auth::{AuthSession, OperationContext};
//!
//! # fn main() -> Result<(), werf_docker_auth::auth::AuthError> {
//! let session = AuthSession::from_env("docker");
//! let ctx = OperationContext::new("", "", "registry.example.com/group/app");
//! let mut authorizer = session.image_publish(Path::new("/tmp/werf-project"), &ctx)?;
//! authorizer.login_for_push(&ctx.repository)?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
