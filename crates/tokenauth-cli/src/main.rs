mod cli;
mod commands;
mod observability;
mod output;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{AudienceCommands, Cli, Commands, TokenCommands};
use output::{print_error, print_value};
use tokenauth::{DefaultScheme, StoreRegistry, TokenAuth, TokenAuthConfig};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present; a missing file is not an error.
    if let Err(e) = dotenvy::dotenv()
        && !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
    {
        eprintln!("Warning: Failed to load .env file: {e}");
    }

    let cli = Cli::parse();
    observability::init_tracing(&cli.log_level);
    let format = cli.format.unwrap_or_default();

    let config =
        TokenAuthConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Commands::Config = cli.command {
        print_value(&commands::config_json(&config)?, format);
        return Ok(());
    }

    let registry = build_registry()?;
    let auth = TokenAuth::open(&registry, &config, Arc::new(DefaultScheme))
        .await
        .with_context(|| format!("Failed to open token store \"{}\"", config.store.name))?;
    tracing::debug!(backend = auth.store().backend_name(), "Token store opened");

    let result = dispatch(&cli, &auth, &config, format).await;
    if let Err(e) = auth.close().await {
        tracing::warn!(error = %e, "Failed to close token store");
    }
    result
}

fn build_registry() -> Result<StoreRegistry> {
    let mut registry = StoreRegistry::new();
    tokenauth_store_memory::register(&mut registry)?;
    tokenauth_store_redis::register(&mut registry)?;
    Ok(registry)
}

async fn dispatch(
    cli: &Cli,
    auth: &TokenAuth,
    config: &TokenAuthConfig,
    format: cli::OutputFormat,
) -> Result<()> {
    match &cli.command {
        Commands::Audience(args) => match &args.command {
            AudienceCommands::Create { name, period } => {
                let period = period.unwrap_or(config.token_period);
                commands::audience::create(auth, name, period, format).await?;
            }
            AudienceCommands::Show { id, reveal_secret } => {
                commands::audience::show(auth, id, *reveal_secret, format).await?;
            }
            AudienceCommands::Update {
                id,
                name,
                period,
                rotate_secret,
            } => {
                commands::audience::update(
                    auth,
                    id,
                    name.as_deref(),
                    *period,
                    *rotate_secret,
                    format,
                )
                .await?;
            }
            AudienceCommands::Delete { id } => {
                commands::audience::delete(auth, id).await?;
            }
        },
        Commands::Token(args) => match &args.command {
            TokenCommands::Issue {
                audience,
                client,
                single,
            } => {
                commands::token::issue(
                    auth,
                    audience,
                    client.as_deref(),
                    single.as_deref(),
                    format,
                )
                .await?;
            }
            TokenCommands::Validate { value } => {
                commands::token::validate(auth, value, format).await?;
            }
            TokenCommands::Revoke { value } => {
                commands::token::revoke(auth, value).await?;
            }
            TokenCommands::Extend { value, audience } => {
                commands::token::extend(auth, value, audience, format).await?;
            }
        },
        Commands::Sign(args) => {
            commands::sign::sign(auth, args, format).await?;
        }
        Commands::Sweep => {
            commands::sweep(auth, format).await?;
        }
        Commands::Config => {}
    }

    Ok(())
}
