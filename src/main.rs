use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use cli::authorize::{self, AuthorizeRequest, CommonArgs, CredentialArgs};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Prepare docker credentials for pulling base images during a stages build
    Build {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        pull: CredentialArgs,
        /// Repository of the base image to log in to (only with --login)
        #[arg(long)]
        base_repo: Option<String>,
    },
    /// Prepare docker credentials for publishing images
    Publish {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        push: CredentialArgs,
        /// Repository images are published to
        #[arg(long)]
        repo: String,
    },
    /// Prepare docker credentials for a combined build and publish
    BuildAndPublish {
        #[command(flatten)]
        common: CommonArgs,
        /// Username for pulling base images
        #[arg(long, default_value = "")]
        pull_username: String,
        /// Password for pulling base images
        #[arg(long, default_value = "")]
        pull_password: String,
        /// Username for publishing images
        #[arg(long, default_value = "")]
        push_username: String,
        /// Password for publishing images
        #[arg(long, default_value = "")]
        push_password: String,
        /// Repository images are published to
        #[arg(long)]
        repo: String,
        /// Repository of the base image to log in to (only with --login)
        #[arg(long)]
        base_repo: Option<String>,
    },
    /// Prepare docker credentials for purging a repository
    Purge {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        creds: CredentialArgs,
        /// Repository to purge
        #[arg(long)]
        repo: Option<String>,
    },
    /// Prepare docker credentials for syncing a repository
    Sync {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        creds: CredentialArgs,
        /// Repository to sync
        #[arg(long)]
        repo: String,
    },
    /// Prepare docker credentials for cleaning up a repository
    Cleanup {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        creds: CredentialArgs,
        /// Repository to clean up
        #[arg(long)]
        repo: String,
    },
    /// Prepare docker credentials for deploying images
    Deploy {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        creds: CredentialArgs,
        /// Repository images are deployed from
        #[arg(long)]
        repo: String,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries only the DOCKER_CONFIG line
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            common,
            pull,
            base_repo,
        } => authorize::authorize(
            &common,
            AuthorizeRequest::BuildStages {
                pull: authorize::context(&pull, None),
                base_repo,
            },
        ),
        Commands::Publish { common, push, repo } => authorize::authorize(
            &common,
            AuthorizeRequest::Publish {
                push: authorize::context(&push, Some(repo.as_str())),
            },
        ),
        Commands::BuildAndPublish {
            common,
            pull_username,
            pull_password,
            push_username,
            push_password,
            repo,
            base_repo,
        } => {
            let pull = CredentialArgs {
                username: pull_username,
                password: pull_password,
            };
            let push = CredentialArgs {
                username: push_username,
                password: push_password,
            };
            authorize::authorize(
                &common,
                AuthorizeRequest::BuildAndPublish {
                    pull: authorize::context(&pull, None),
                    push: authorize::context(&push, Some(repo.as_str())),
                    base_repo,
                },
            )
        }
        Commands::Purge {
            common,
            creds,
            repo,
        } => authorize::authorize(
            &common,
            AuthorizeRequest::Purge {
                ctx: authorize::context(&creds, repo.as_deref()),
            },
        ),
        Commands::Sync {
            common,
            creds,
            repo,
        } => authorize::authorize(
            &common,
            AuthorizeRequest::Sync {
                ctx: authorize::context(&creds, Some(repo.as_str())),
            },
        ),
        Commands::Cleanup {
            common,
            creds,
            repo,
        } => authorize::authorize(
            &common,
            AuthorizeRequest::Cleanup {
                ctx: authorize::context(&creds, Some(repo.as_str())),
            },
        ),
        Commands::Deploy {
            common,
            creds,
            repo,
        } => authorize::authorize(
            &common,
            AuthorizeRequest::Deploy {
                ctx: authorize::context(&creds, Some(repo.as_str())),
            },
        ),
    }
}
