use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "Ferry — relay a messaging account to an HTTP agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and default files (config, auth storage).
    Init {
        /// Config file path (default: FERRY_CONFIG_PATH or ~/.ferry/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the relay: connect the messaging session, forward allow-listed
    /// messages to the agent, and serve POST /send and GET /health.
    Run {
        /// Config file path (default: FERRY_CONFIG_PATH or ~/.ferry/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 3000)
        #[arg(long, short)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("ferry {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Run { config, port }) => {
            if let Err(e) = run_relay(config, port).await {
                log::error!("run failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_relay(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    config.server.port = port.unwrap_or_else(|| lib::config::resolve_server_port(&config));

    let agent_url = lib::config::resolve_agent_url(&config)
        .context("agent base URL not configured (set agent.baseUrl or AGENT_URL)")?;
    let token = lib::config::resolve_telegram_token(&config)
        .context("no channel configured (set channels.telegram.botToken or TELEGRAM_BOT_TOKEN)")?;
    let allowed = lib::config::resolve_allowed_senders(&config);
    if allowed.is_empty() {
        log::warn!("allow-list is empty; every inbound message will be dropped");
    }

    let store = lib::store::CredentialStore::new(lib::config::auth_dir(&path));
    let connector: Arc<dyn lib::channels::Connector> =
        Arc::new(lib::channels::TelegramConnector::new(token));
    let session = Arc::new(lib::session::SessionManager::new(connector, store));
    let agent: Arc<dyn lib::agent::AgentBackend> = Arc::new(lib::agent::AgentClient::new(
        agent_url,
        Duration::from_secs(config.agent.timeout_secs),
    ));

    let (inbound_tx, inbound_rx) = tokio::sync::mpsc::channel(64);
    let port: Arc<dyn lib::session::MessagePort> = session.clone();
    let relay = Arc::new(lib::relay::Relay::new(allowed, agent, port));
    let _relay_task = relay.start(inbound_rx);
    let _session_task = session.clone().start(inbound_tx);

    log::info!(
        "starting relay on {}:{}",
        config.server.bind,
        config.server.port
    );
    lib::server::run_server(&config.server, session).await
}
