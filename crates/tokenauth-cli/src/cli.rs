use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "tokenauth")]
#[command(about = "tokenauth CLI: manage audiences and tokens in a token store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./tokenauth.toml when present)
    #[arg(short, long, global = true, env = "TOKENAUTH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Toml,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage audiences
    Audience(AudienceArgs),
    /// Issue, validate, revoke and extend tokens
    Token(TokenArgs),
    /// Sign or verify request parameters with an audience secret
    Sign(SignArgs),
    /// Remove expired tokens from the store
    Sweep,
    /// Show the effective configuration
    Config,
}

#[derive(clap::Args)]
pub struct AudienceArgs {
    #[command(subcommand)]
    pub command: AudienceCommands,
}

#[derive(Subcommand)]
pub enum AudienceCommands {
    /// Register a new audience
    Create {
        /// Display name
        name: String,
        /// Token lifetime in seconds, 0 for tokens that never expire
        /// (defaults to token_period from the configuration)
        #[arg(long)]
        period: Option<u64>,
    },
    /// Show an audience
    Show {
        id: String,
        /// Print the secret instead of redacting it
        #[arg(long)]
        reveal_secret: bool,
    },
    /// Change the name, token lifetime or secret of an audience
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        period: Option<u64>,
        /// Generate a new secret
        #[arg(long)]
        rotate_secret: bool,
    },
    /// Delete an audience
    Delete { id: String },
}

#[derive(clap::Args)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommands,
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Issue a token, superseding the principal's previous token
    #[command(group(ArgGroup::new("principal").required(true).multiple(true).args(["client", "single"])))]
    Issue {
        /// Audience id
        #[arg(short, long)]
        audience: String,
        /// API client id
        #[arg(long)]
        client: Option<String>,
        /// End-user id for single-session tokens
        #[arg(long)]
        single: Option<String>,
    },
    /// Check that a token exists and has not expired
    Validate { value: String },
    /// Revoke a token
    Revoke { value: String },
    /// Push a token's deadline out by its audience's lifetime
    Extend {
        value: String,
        /// Audience id
        #[arg(short, long)]
        audience: String,
    },
}

#[derive(clap::Args)]
pub struct SignArgs {
    /// Audience id whose secret signs the request
    #[arg(short, long)]
    pub audience: String,
    /// Request parameters as key=value pairs (e.g. order=42 amount=100)
    pub params: Vec<String>,
    /// Verify the signature carried in the `sign` parameter instead
    #[arg(long)]
    pub verify: bool,
    /// Leave sign_type out of the signed string
    #[arg(long)]
    pub exclude_sign_type: bool,
}
