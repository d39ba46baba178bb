//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/docket.sqlite"
//!
//! [embedding]
//! provider = "http"
//! url = "http://127.0.0.1:8000"
//! dims = 384
//!
//! [server]
//! bind = "127.0.0.1:8888"
//!
//! [[thesaurus]]
//! phrases = ["address proof", "utility bill"]
//! ```
//!
//! `HTTP_PORT` (falling back to `PORT`) overrides the port of
//! `server.bind` when set and non-blank.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub thesaurus: Vec<ThesaurusGroup>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            url: None,
            model: default_model(),
            dims: default_dims(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}
fn default_dims() -> usize {
    384
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EngineConfig {
    /// Deadline applied to each search or create call.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8888".to_string()
}

/// One group of equivalent phrases.
#[derive(Debug, Deserialize, Clone)]
pub struct ThesaurusGroup {
    pub phrases: Vec<String>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    let port = port_override(
        std::env::var("HTTP_PORT").ok().as_deref(),
        std::env::var("PORT").ok().as_deref(),
    );
    if let Some(port) = port {
        config.server.bind = with_port(&config.server.bind, port)?;
    }

    validate(&config)?;
    Ok(config)
}

/// Pick the port override: `HTTP_PORT` first, then `PORT`. Blank values
/// are ignored.
pub fn port_override(http_port: Option<&str>, port: Option<&str>) -> Option<String> {
    [http_port, port]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|p| !p.is_empty())
        .map(str::to_string)
}

fn with_port(bind: &str, port: String) -> Result<String> {
    let port: u16 = port
        .parse()
        .with_context(|| format!("Invalid port override: {}", port))?;
    let mut addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("server.bind is not a socket address: {}", bind))?;
    addr.set_port(port);
    Ok(addr.to_string())
}

fn validate(config: &Config) -> Result<()> {
    if config.db.max_connections == 0 {
        bail!("db.max_connections must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "http" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled or http.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims == 0 {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            bail!(
                "embedding.url must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    if config.engine.request_timeout_ms == Some(0) {
        bail!("engine.request_timeout_ms must be > 0 when set");
    }

    config
        .server
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("server.bind is not a socket address: {}", config.server.bind))?;

    Ok(())
}
