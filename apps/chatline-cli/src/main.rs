mod commands;
mod config;
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use chatline_client::{
    ChatClient, ChatClientHandle, CredentialProvider, HistorySource, HttpHistorySource,
    NoHistory, SharedToken,
};
use chatline_transport_websocket::WebSocketConnector;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::commands::{parse_input, Input};
use crate::config::CliConfig;
use crate::render::format_event;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (.toml or .env)
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Channel to join on startup
    #[arg(long)]
    channel: Option<String>,
    /// Bearer token presented on every connection
    #[arg(long, env = "CHATLINE_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[tokio::main]
async fn main() {
    let filter = std::env::var("CHATLINE_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match CliConfig::new(cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("failed to load config: {err}");
            std::process::exit(1);
        }
    };

    let token = SharedToken::new(cli.token.or_else(|| config.token.clone()));
    if token.token().is_none() {
        warn!("no token configured; connections will fail until one is set");
    }
    let credentials: Arc<dyn CredentialProvider> = Arc::new(token);
    let client_config = config.client_config();
    let history: Arc<dyn HistorySource> = match &config.api_base {
        Some(api_base) => Arc::new(HttpHistorySource::from_config(
            api_base.clone(),
            Arc::clone(&credentials),
            &client_config,
        )),
        None => Arc::new(NoHistory),
    };
    let connector = Arc::new(WebSocketConnector::new(config.connector_config()));

    let client = ChatClient::spawn(
        client_config,
        connector.clone(),
        credentials,
        history,
    );
    let mut events = client.subscribe();

    if let Some(channel) = cli.channel.or_else(|| config.channel.clone()) {
        if let Err(err) = client.bind(&channel).await {
            error!("failed to bind {channel}: {err}");
            std::process::exit(1);
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !handle_line(&client, &line).await {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    error!("failed to read stdin: {err}");
                    break;
                }
            },
            event = events.recv() => match event {
                Ok(event) => {
                    for line in format_event(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!("skipped {skipped} session events"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    if let Err(err) = client.shutdown().await {
        warn!("client already stopped: {err}");
    }
    let metrics = connector.metrics_snapshot();
    info!(
        connect_attempts = metrics.connect_attempts,
        connect_failures = metrics.connect_failures,
        frames_sent = metrics.frames_sent,
        frames_received = metrics.frames_received,
        "session ended"
    );
}

/// Returns false when the user asked to quit.
async fn handle_line(client: &ChatClientHandle, line: &str) -> bool {
    match parse_input(line) {
        Input::Nothing => {}
        Input::Join(channel) => {
            if let Err(err) = client.bind(&channel).await {
                error!("{err}");
                return false;
            }
        }
        Input::Leave => {
            if let Err(err) = client.unbind().await {
                error!("{err}");
                return false;
            }
        }
        Input::Quit => return false,
        Input::Say(text) => {
            if !client.send(text).await {
                println!("!! not connected");
            }
        }
    }
    true
}
