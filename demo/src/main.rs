//! ikon-auth-demo - verify platform tokens and fetch the service's own token
//!
//! Settings come from `BASE_ISSUER_URL`, `OAUTH_CLIENT_ID` and
//! `OAUTH_CLIENT_SECRET`, optionally layered over a `--config` file.
//!
//! ```text
//! ikon-auth-demo verify eyJhbGciOiJSUzI1NiIs...   # prints the verified claims
//! ikon-auth-demo token                            # prints "Bearer ..."
//! ikon-auth-demo keys                             # lists the published key ids
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ikon_auth::{AuthSettings, ClientCredentialsCache, TokenVerifier};
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

/// Verify platform tokens and fetch the service's own token
#[derive(Parser, Debug)]
#[command(name = "ikon-auth-demo", version, about, author)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Command,

    /// Settings file (.toml, .yaml, .yml or .json); environment variables win
    #[arg(short, long, global = true, env = "IKON_AUTH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging (-v, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify a bearer token and print its claims as JSON
    Verify {
        /// The compact JWT, with or without a "Bearer " prefix
        token: String,
    },
    /// Obtain the service's own token and print the Authorization header value
    Token,
    /// List the key ids published by the platform
    Keys,
}

impl Cli {
    fn init_tracing(&self) {
        let level = match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };

        // RUST_LOG takes precedence over -v
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    fn settings(&self) -> anyhow::Result<AuthSettings> {
        let settings = match &self.config {
            Some(path) => AuthSettings::from_file(path)
                .with_context(|| format!("loading settings from {}", path.display()))?,
            None => AuthSettings::from_env().context("loading settings from the environment")?,
        };
        Ok(settings)
    }

    async fn execute(self) -> anyhow::Result<()> {
        self.init_tracing();
        let settings = self.settings()?;

        match self.command {
            Command::Verify { token } => {
                let verifier = TokenVerifier::connect(&settings)
                    .await
                    .context("building token verifier")?;

                let token = token.strip_prefix("Bearer ").unwrap_or(&token).trim();
                match verifier.verify(token) {
                    Ok(claims) => {
                        info!(sub = ?claims.subject(), "Token accepted");
                        println!("{}", serde_json::to_string_pretty(&claims)?);
                    }
                    Err(e) => anyhow::bail!("token rejected ({:?}): {}", e.kind(), e),
                }
            }
            Command::Token => {
                let cache = ClientCredentialsCache::new(&settings)?;
                let authorization = cache.get_token().await.context("requesting token")?;
                println!("{authorization}");
            }
            Command::Keys => {
                let verifier = TokenVerifier::connect(&settings)
                    .await
                    .context("loading key set")?;
                for kid in verifier.key_set().key_ids() {
                    println!("{kid}");
                }
            }
        }

        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    Cli::parse().execute().await
}
