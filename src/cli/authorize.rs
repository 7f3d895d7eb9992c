// Authorize command - resolve credentials, prepare the docker config, optionally log in

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

use werf_docker_auth::auth::{AuthSession, Authorizer, OperationContext};

/// Credential options shared by every operation subcommand
#[derive(Debug, Clone, Default, Args)]
pub struct CredentialArgs {
    /// Registry username (used only together with --password)
    #[arg(long, default_value = "")]
    pub username: String,

    /// Registry password or token (used only together with --username)
    #[arg(long, default_value = "")]
    pub password: String,
}

/// Options common to all operation subcommands
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Temporary project directory; a scratch docker config is created below it
    #[arg(long)]
    pub tmp_dir: PathBuf,

    /// Container CLI to use (docker or podman)
    #[arg(long, default_value = "docker")]
    pub container_cli: String,

    /// Perform the registry logins after preparing the config directory
    #[arg(long)]
    pub login: bool,
}

/// The operation an invocation authorizes, with its resolved inputs
pub enum AuthorizeRequest {
    BuildStages {
        pull: OperationContext,
        base_repo: Option<String>,
    },
    Publish {
        push: OperationContext,
    },
    BuildAndPublish {
        pull: OperationContext,
        push: OperationContext,
        base_repo: Option<String>,
    },
    Purge {
        ctx: OperationContext,
    },
    Sync {
        ctx: OperationContext,
    },
    Cleanup {
        ctx: OperationContext,
    },
    Deploy {
        ctx: OperationContext,
    },
}

pub fn context(creds: &CredentialArgs, repo: Option<&str>) -> OperationContext {
    OperationContext::new(
        creds.username.as_str(),
        creds.password.as_str(),
        repo.unwrap_or_default(),
    )
}

/// Run one operation's authorization and print the resulting `DOCKER_CONFIG`
pub fn authorize(common: &CommonArgs, request: AuthorizeRequest) -> Result<()> {
    let session = AuthSession::from_env(&common.container_cli);
    let authorizer = authorize_with(&session, common, request)?;

    info!(
        "Docker config at {} ({})",
        authorizer.config_dir().display(),
        if authorizer.is_external_config() {
            "external"
        } else {
            "tmp"
        }
    );

    let (key, dir) = authorizer.docker_config_env();
    println!("{}={}", key, dir.display());

    Ok(())
}

/// Build the authorizer for one request and perform the requested logins
pub fn authorize_with(
    session: &AuthSession,
    common: &CommonArgs,
    request: AuthorizeRequest,
) -> Result<Authorizer> {
    let tmp_root = common.tmp_dir.as_path();

    let authorizer = match request {
        AuthorizeRequest::BuildStages { pull, base_repo } => {
            let mut authorizer = session.build_stages(tmp_root, &pull)?;
            if common.login {
                login_optional(&mut authorizer, base_repo.as_deref(), Authorizer::login_for_pull)?;
            }
            authorizer
        }
        AuthorizeRequest::Publish { push } => {
            let mut authorizer = session.image_publish(tmp_root, &push)?;
            if common.login {
                login_optional(
                    &mut authorizer,
                    Some(push.repository.as_str()),
                    Authorizer::login_for_push,
                )?;
            }
            authorizer
        }
        AuthorizeRequest::BuildAndPublish {
            pull,
            push,
            base_repo,
        } => {
            let mut authorizer = session.build_and_publish(tmp_root, &pull, &push)?;
            if common.login {
                authorizer
                    .login_stages(base_repo.as_deref(), Some(push.repository.as_str()))
                    .context("Docker login for build and publish failed")?;
            }
            authorizer
        }
        AuthorizeRequest::Purge { ctx } => generic(common, session.purge(tmp_root, &ctx)?, &ctx)?,
        AuthorizeRequest::Sync { ctx } => generic(common, session.sync(tmp_root, &ctx)?, &ctx)?,
        AuthorizeRequest::Cleanup { ctx } => {
            generic(common, session.cleanup(tmp_root, &ctx)?, &ctx)?
        }
        AuthorizeRequest::Deploy { ctx } => {
            generic(common, session.deploy(tmp_root, &ctx)?, &ctx)?
        }
    };

    Ok(authorizer)
}

fn generic(
    common: &CommonArgs,
    mut authorizer: Authorizer,
    ctx: &OperationContext,
) -> Result<Authorizer> {
    if common.login {
        login_optional(
            &mut authorizer,
            Some(ctx.repository.as_str()),
            Authorizer::login_generic,
        )?;
    }
    Ok(authorizer)
}

fn login_optional<F, E>(authorizer: &mut Authorizer, repo: Option<&str>, login: F) -> Result<()>
where
    F: FnOnce(&mut Authorizer, &str) -> std::result::Result<(), E>,
    E: std::error::Error + Send + Sync + 'static,
{
    match repo.filter(|r| !r.is_empty()) {
        Some(repo) => {
            login(authorizer, repo).with_context(|| format!("Docker login for '{}' failed", repo))
        }
        None => {
            info!("No repository given, skipping docker login");
            Ok(())
        }
    }
}
