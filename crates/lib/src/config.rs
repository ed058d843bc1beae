//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.ferry/config.json`) and environment.
//! Everything is read once at startup; there is no hot-reload.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings (POST /send, GET /health).
    #[serde(default)]
    pub server: ServerConfig,

    /// Agent endpoint settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Relay settings (allow-list).
    #[serde(default)]
    pub relay: RelayConfig,

    /// Channel settings (e.g. Telegram).
    #[serde(default)]
    pub channels: ChannelsConfig,
}

/// HTTP bind and port settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port for the HTTP surface (default 3000).
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_server_bind")]
    pub bind: String,
}

fn default_server_port() -> u16 {
    3000
}

fn default_server_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            bind: default_server_bind(),
        }
    }
}

/// Agent endpoint config. The relay POSTs to `{baseUrl}/webhook`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Agent base URL. Overridden by AGENT_URL env when set.
    pub base_url: Option<String>,

    /// Upper bound on one webhook call, in seconds (default 360).
    #[serde(default = "default_agent_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_agent_timeout_secs() -> u64 {
    360
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_agent_timeout_secs(),
        }
    }
}

/// Relay config: which senders may trigger agent forwarding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// Sender identifiers allowed to reach the agent. A single-owner setup is
    /// a one-element list. Overridden by FERRY_ALLOWED_SENDERS (comma-separated).
    #[serde(default)]
    pub allowed_senders: Vec<String>,
}

/// Per-channel config (e.g. Telegram bot token).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub telegram: TelegramChannelConfig,
}

/// Telegram channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramChannelConfig {
    /// Bot token from BotFather. Overridden by TELEGRAM_BOT_TOKEN env when set.
    pub bot_token: Option<String>,
}

fn nonempty(s: String) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Resolve the agent base URL: env AGENT_URL overrides config. Trailing slashes are stripped.
pub fn resolve_agent_url(config: &Config) -> Option<String> {
    std::env::var("AGENT_URL")
        .ok()
        .and_then(nonempty)
        .or_else(|| config.agent.base_url.clone().and_then(nonempty))
        .map(|u| u.trim_end_matches('/').to_string())
}

/// Resolve the Telegram bot token: env TELEGRAM_BOT_TOKEN overrides config.
pub fn resolve_telegram_token(config: &Config) -> Option<String> {
    std::env::var("TELEGRAM_BOT_TOKEN")
        .ok()
        .and_then(nonempty)
        .or_else(|| config.channels.telegram.bot_token.clone().and_then(nonempty))
}

/// Resolve the HTTP port: env FERRY_PORT overrides config when it parses.
pub fn resolve_server_port(config: &Config) -> u16 {
    std::env::var("FERRY_PORT")
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(config.server.port)
}

/// Resolve the allow-list: env FERRY_ALLOWED_SENDERS (comma-separated) overrides config.
pub fn resolve_allowed_senders(config: &Config) -> Vec<String> {
    if let Ok(raw) = std::env::var("FERRY_ALLOWED_SENDERS") {
        let list = split_sender_list(&raw);
        if !list.is_empty() {
            return list;
        }
    }
    config
        .relay
        .allowed_senders
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split a comma-separated sender list, trimming entries and dropping empty ones.
pub fn split_sender_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("FERRY_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".ferry").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Directory for session credentials: `auth` subdirectory of the config file's parent.
pub fn auth_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .join("auth")
}

/// Load config from the default path (or FERRY_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used (for resolving the auth directory).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_server_port_and_bind() {
        let s = ServerConfig::default();
        assert_eq!(s.port, 3000);
        assert_eq!(s.bind, "127.0.0.1");
    }

    #[test]
    fn default_agent_timeout() {
        let a = AgentConfig::default();
        assert_eq!(a.timeout_secs, 360);
    }

    #[test]
    fn auth_dir_next_to_config() {
        let path = Path::new("/home/user/.ferry/config.json");
        assert_eq!(auth_dir(path), PathBuf::from("/home/user/.ferry/auth"));
    }

    #[test]
    fn split_sender_list_trims_and_drops_empty() {
        assert_eq!(
            split_sender_list("15197310464@s.whatsapp.net, 491701234567@s.whatsapp.net,,"),
            vec![
                "15197310464@s.whatsapp.net".to_string(),
                "491701234567@s.whatsapp.net".to_string()
            ]
        );
        assert!(split_sender_list(" , ").is_empty());
    }

    #[test]
    fn parse_config_camel_case() {
        let raw = r#"{
            "server": { "port": 8080 },
            "agent": { "baseUrl": "http://127.0.0.1:8000/" },
            "relay": { "allowedSenders": ["owner@s.whatsapp.net"] },
            "channels": { "telegram": { "botToken": "123:abc" } }
        }"#;
        let config: Config = serde_json::from_str(raw).expect("parse config");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.agent.base_url.as_deref(), Some("http://127.0.0.1:8000/"));
        assert_eq!(config.agent.timeout_secs, 360);
        assert_eq!(config.relay.allowed_senders, vec!["owner@s.whatsapp.net"]);
        assert_eq!(config.channels.telegram.bot_token.as_deref(), Some("123:abc"));
    }
}
