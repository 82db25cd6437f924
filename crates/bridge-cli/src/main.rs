//! `confbridge`: operator console for ARI call and conference bridges

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use rvoip_ari_client::AriClient;
use rvoip_bridge_cli::{setup_logging, AppConfig, CommandDispatcher, Flow, LoggingConfig, Overrides};
use rvoip_bridge_core::{BridgeEvent, BridgeLifecycleManager, InMemoryBus, SignalingBus};

const PROMPT: &str = "Please enter your choice: ";

#[derive(Parser, Debug)]
#[command(name = "confbridge", version)]
#[command(about = "Create and manage ARI calls and conferences from the command line")]
struct Cli {
    /// Configuration file (defaults to ./confbridge.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// ARI REST base URL
    #[arg(long, env = "ARI_URL")]
    ari_url: Option<String>,

    /// ARI event WebSocket URL
    #[arg(long, env = "ARI_WS_URL")]
    ws_url: Option<String>,

    /// Stasis application name
    #[arg(long, env = "ARI_APP")]
    app: Option<String>,

    #[arg(short, long, env = "ARI_USERNAME")]
    username: Option<String>,

    #[arg(short, long, env = "ARI_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Seconds a dial may ring before it is abandoned
    #[arg(long)]
    dial_timeout: Option<u64>,

    /// Log level (RUST_LOG takes precedence)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Run against an in-memory signaling bus instead of Asterisk
    #[arg(long)]
    simulate: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            ari_url: self.ari_url.clone(),
            websocket_url: self.ws_url.clone(),
            application: self.app.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            dial_timeout_secs: self.dial_timeout,
            log_level: self.log_level.clone(),
            json_logs: self.json_logs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.apply(cli.overrides());
    config.validate().context("Invalid configuration")?;

    setup_logging(&LoggingConfig::from_section(&config.logging)?)?;
    info!("Starting confbridge v{}", env!("CARGO_PKG_VERSION"));

    let (manager, dispatcher, ari) = if cli.simulate {
        info!("Simulate mode: using an in-memory signaling bus");
        let bus = Arc::new(InMemoryBus::new());
        let bus_handle = Arc::clone(&bus) as Arc<dyn SignalingBus>;
        let manager = BridgeLifecycleManager::new(bus_handle, config.bridge)?;
        let dispatcher = CommandDispatcher::new(Arc::clone(&manager)).with_simulator(bus);
        (manager, dispatcher, None)
    } else {
        let client = AriClient::connect(config.ari)
            .await
            .context("Failed to connect to ARI")?;
        let bus_handle = Arc::clone(&client) as Arc<dyn SignalingBus>;
        let manager = BridgeLifecycleManager::new(bus_handle, config.bridge)?;
        let dispatcher = CommandDispatcher::new(Arc::clone(&manager));
        (manager, dispatcher, Some(client))
    };

    spawn_event_logger(&manager);
    run_console(&dispatcher).await?;

    let stats = manager.stats();
    info!(
        "Exiting with {} active sessions ({} created, {} torn down)",
        stats.active_sessions, stats.total_created, stats.total_torn_down
    );
    if let Some(client) = ari {
        client.close().await;
    }
    Ok(())
}

async fn run_console(dispatcher: &CommandDispatcher) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    loop {
        write!(stdout, "{}", PROMPT)?;
        stdout.flush()?;

        let Some(line) = lines.next_line().await? else {
            // stdin closed
            writeln!(stdout)?;
            return Ok(());
        };

        if dispatcher.handle_line(&line, &mut stdout).await? == Flow::Exit {
            return Ok(());
        }
    }
}

fn spawn_event_logger(manager: &Arc<BridgeLifecycleManager>) {
    let mut events = manager.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(BridgeEvent::SessionTornDown { bridge_id }) => {
                    info!("Session {} ended", bridge_id);
                }
                Ok(event) => tracing::debug!(?event, "Bridge event"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    error!("Event logger lagged, {} events missed", missed);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
