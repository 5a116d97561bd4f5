//! CLI entry point for parley

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use parley_core::config::loader::load_dotenv;
use parley_core::config::{Config, ConfigLoader};
use parley_core::logging::init_logging;
use parley_core::{SessionStore, Turn};
use parley_providers::{CompletionProvider, OpenAiResponsesClient};
use parley_server::{extract_reply, run_server, AppState, ChatSettings};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "A minimal chat relay in front of an LLM completion API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP relay
    Serve {
        /// Address to bind, overrides server.host
        #[arg(long)]
        host: Option<String>,
        /// Port to bind, overrides server.port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Send a single message and print the reply
    Ask {
        /// Message to send
        #[arg(short, long)]
        message: String,
        /// System-level instructions, overrides provider.instructions
        #[arg(short, long)]
        instructions: Option<String>,
    },
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Write a default config.json
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Print the effective configuration (API key masked)
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv_path = load_dotenv()?;
    let cli = Cli::parse();

    let loader = match &cli.config_dir {
        Some(dir) => ConfigLoader::with_dir(dir),
        None => ConfigLoader::new(),
    };

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = loader.load()?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let _guard = init_logging(&config.logging)?;
            if let Some(path) = dotenv_path {
                info!("Loaded environment from {}", path.display());
            }
            run_serve(config).await
        }
        Commands::Ask {
            message,
            instructions,
        } => {
            let config = loader.load()?;
            let _guard = init_logging(&config.logging)?;
            run_ask(&config, message, instructions).await
        }
        Commands::Config { command } => match command {
            ConfigCommands::Init { force } => init_config(&loader, force),
            ConfigCommands::Show => {
                let config = loader.load()?;
                println!("{}", serde_json::to_string_pretty(&config.redacted())?);
                Ok(())
            }
        },
    }
}

async fn run_serve(config: Config) -> Result<()> {
    let addr = resolve_addr(&config.server.host, config.server.port)?;

    if config.provider.api_key.trim().is_empty() {
        warn!("No API key configured; every chat will answer with an error");
    }

    let provider: Arc<dyn CompletionProvider> =
        Arc::new(OpenAiResponsesClient::from_config(&config.provider));
    let settings = ChatSettings::from_config(&config);

    println!("{}", style("Starting parley chat relay...").bold().cyan());
    println!("Model: {}", provider.model());
    println!("Listening on: http://{}", addr);
    info!(
        "Server started. Default session ID for chat history is: {}",
        settings.default_session
    );

    let state = AppState::new(Arc::new(SessionStore::new()), provider, settings);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl+C received"),
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    run_server(state, addr, shutdown_rx).await?;
    println!("{}", style("parley stopped.").green());
    Ok(())
}

async fn run_ask(config: &Config, message: String, instructions: Option<String>) -> Result<()> {
    let provider = OpenAiResponsesClient::from_config(&config.provider);
    let settings = ChatSettings::from_config(config);
    let instructions = instructions.or(settings.instructions.clone());

    let turns = vec![Turn::user(message)];
    let result = provider.complete(&turns, instructions.as_deref()).await;
    let reply = extract_reply(&result, &settings.extraction);

    let label = format!("{}:", reply.role);
    println!("{} {}", style(label).bold().green(), reply.content);
    Ok(())
}

fn init_config(loader: &ConfigLoader, force: bool) -> Result<()> {
    let path = loader.config_path();
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    loader
        .save(&Config::default())
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("{} {}", style("Wrote").green(), path.display());
    Ok(())
}

fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr> {
    let host = if host.eq_ignore_ascii_case("localhost") {
        "127.0.0.1"
    } else {
        host
    };
    format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", host, port))
}
