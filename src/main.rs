// ssomon - AWS SSO/IAM credential session monitor

mod cli;
mod config;
mod credentials;
mod error;
mod exec;
mod expiry;
mod mapping;
mod models;
mod profiles;
mod session;

use clap::Parser;
use error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    cli::execute(args).await
}
