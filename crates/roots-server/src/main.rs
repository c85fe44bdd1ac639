//! RootsLegacy server CLI
//!
//! Starts the HTTP server, or mints a bearer token for an operator.

use anyhow::Context;
use clap::{Parser, Subcommand};
use roots_server::{config::ServerConfig, session::Role, session::SessionManager, start_server};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "roots-server", version, about = "RootsLegacy family graph server")]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "ROOTS_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Print a signed bearer token
    Token {
        /// User id placed in the `sub` claim
        #[arg(long)]
        user: String,

        /// admin or member
        #[arg(long, default_value = "member")]
        role: Role,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => {
            eprintln!("Warning: No config file specified, using default test configuration");
            eprintln!("Usage: roots-server --config <path-to-config.toml>");
            eprintln!();
            ServerConfig::default_test_config()
        }
    };

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => start_server(config).await.context("server failed")?,
        Command::Token { user, role } => {
            let sessions = SessionManager::new(&config.jwt_secret, config.token_expiry_secs);
            let token = sessions
                .generate_token(&user, role)
                .context("signing token")?;
            println!("{}", token);
        }
    }

    Ok(())
}
