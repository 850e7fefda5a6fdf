//! Agent Relay - server and terminal chat client
//!
//! `agent-relay serve` runs the WebSocket relay; `agent-relay chat` talks to one.

use agent_relay::client::{ChatClient, Transcript};
use agent_relay::relay::OutboundEvent;
use agent_relay::upstream::UpstreamMode;
use agent_relay::Config;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "agent-relay")]
#[command(about = "Streaming chat relay between WebSocket clients and a conversational agent")]
struct Cli {
    /// Path to the YAML config file (default: ./config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Address to bind (overrides config and SERVER_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config and SERVER_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Upstream backend: agent, canned or auto
        #[arg(long)]
        mode: Option<UpstreamMode>,
    },

    /// Chat with a running relay
    Chat {
        /// Relay WebSocket URL
        #[arg(short, long, default_value = "ws://127.0.0.1:8080/ws")]
        url: String,

        /// Send one message and exit instead of reading stdin
        #[arg(short, long)]
        message: Option<String>,

        /// Print chunks as they arrive instead of the cleaned reply
        #[arg(long)]
        raw: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,agent_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port, mode } => {
            let mut config = Config::from_yaml_and_env(cli.config.as_deref())?;
            if let Some(host) = host {
                config.server_host = host;
            }
            if let Some(port) = port {
                config.server_port = port;
            }
            if let Some(mode) = mode {
                config.upstream_mode = mode;
            }
            agent_relay::start_server(config).await
        }
        Commands::Chat { url, message, raw } => run_chat(&url, message, raw).await,
    }
}

async fn run_chat(url: &str, message: Option<String>, raw: bool) -> Result<()> {
    let mut client = ChatClient::connect(url)
        .await
        .with_context(|| format!("Failed to connect to {}", url))?;

    match message {
        Some(message) => {
            send_and_print(&mut client, &message, raw).await?;
        }
        None => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            prompt();
            while let Some(line) = lines.next_line().await? {
                if !line.trim().is_empty() {
                    send_and_print(&mut client, &line, raw).await?;
                }
                prompt();
            }
        }
    }

    client.close().await?;
    Ok(())
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

async fn send_and_print(client: &mut ChatClient, message: &str, raw: bool) -> Result<Transcript> {
    let transcript = client
        .send(message, |event| {
            if raw {
                if let OutboundEvent::Chunk { text } = event {
                    print!("{}", text);
                    let _ = std::io::stdout().flush();
                }
            }
        })
        .await?;

    if raw {
        println!();
    } else {
        println!("{}", transcript.display_text());
    }
    if let Some(error) = transcript.error() {
        eprintln!("error: {}", error);
    }
    Ok(transcript)
}
