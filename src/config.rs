use anyhow::{Context, Result};
use std::{collections::HashSet, time::Duration};

use crate::audio::{node::NodeConfig, track::SearchSource};

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Nodos de audio
    pub nodes: Vec<NodeConfig>,
    pub auto_move: bool,
    pub node_health_interval: Duration,
    pub node_request_timeout: Duration,

    // Reproducción
    pub max_queue_size: usize,
    pub default_search_source: SearchSource,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construye la configuración a partir de una fuente de variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Self {
            // Discord
            discord_token: lookup("DISCORD_TOKEN").context("DISCORD_TOKEN no está definido")?,
            application_id: lookup("APPLICATION_ID")
                .context("APPLICATION_ID no está definido")?
                .parse()
                .context("APPLICATION_ID inválido")?,
            guild_id: lookup("GUILD_ID").and_then(|s| s.parse().ok()),

            // Nodos
            nodes: parse_nodes(&lookup)?,
            auto_move: var("AUTO_MOVE", "true")
                .parse()
                .context("AUTO_MOVE debe ser true o false")?,
            node_health_interval: humantime::parse_duration(&var("NODE_HEALTH_INTERVAL", "30s"))
                .context("NODE_HEALTH_INTERVAL inválido")?,
            node_request_timeout: humantime::parse_duration(&var("NODE_REQUEST_TIMEOUT", "10s"))
                .context("NODE_REQUEST_TIMEOUT inválido")?,

            // Reproducción
            max_queue_size: var("MAX_QUEUE_SIZE", "1000")
                .parse()
                .context("MAX_QUEUE_SIZE inválido")?,
            default_search_source: var("DEFAULT_SEARCH_SOURCE", "youtube").parse()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// - A non-zero application id, needed by the node sockets
    /// - At least one node, with unique identifiers and non-empty hosts
    /// - Queue capacity greater than zero
    /// - Health interval and request timeout greater than zero
    pub fn validate(&self) -> Result<()> {
        if self.application_id == 0 {
            anyhow::bail!("APPLICATION_ID debe ser distinto de 0");
        }

        if self.nodes.is_empty() {
            anyhow::bail!("Se necesita al menos un nodo de audio");
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.identifier.trim().is_empty() {
                anyhow::bail!("Todos los nodos necesitan un identificador");
            }
            if node.host.trim().is_empty() {
                anyhow::bail!("El nodo {} no tiene host", node.identifier);
            }
            if !seen.insert(node.identifier.as_str()) {
                anyhow::bail!("Identificador de nodo duplicado: {}", node.identifier);
            }
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("El tamaño máximo de la cola debe ser mayor que 0");
        }

        if self.node_health_interval.is_zero() || self.node_request_timeout.is_zero() {
            anyhow::bail!("Los intervalos de nodo deben ser mayores que 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes the Discord token and node passwords.
    pub fn summary(&self) -> String {
        let nodes: Vec<String> = self
            .nodes
            .iter()
            .map(|n| format!("{} ({})", n.identifier, n.endpoint()))
            .collect();

        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Nodes: {}\n  \
            Auto-move: {}, health every {}, timeout {}\n  \
            Queue: {} max, search source {}",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            nodes.join(", "),
            self.auto_move,
            humantime::format_duration(self.node_health_interval),
            humantime::format_duration(self.node_request_timeout),
            self.max_queue_size,
            self.default_search_source,
        )
    }
}

/// `LAVALINK_NODES` (arreglo JSON) tiene prioridad sobre las variables de un
/// solo nodo.
fn parse_nodes(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Vec<NodeConfig>> {
    if let Some(raw) = lookup("LAVALINK_NODES").filter(|s| !s.trim().is_empty()) {
        return serde_json::from_str(&raw).context("LAVALINK_NODES no es un arreglo JSON válido");
    }

    let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
    Ok(vec![NodeConfig {
        identifier: var("LAVALINK_IDENTIFIER", "main"),
        host: var("LAVALINK_HOST", "localhost"),
        port: var("LAVALINK_PORT", "2333")
            .parse()
            .context("LAVALINK_PORT inválido")?,
        password: var("LAVALINK_PASSWORD", "youshallnotpass"),
        secure: var("LAVALINK_SECURE", "false")
            .parse()
            .context("LAVALINK_SECURE debe ser true o false")?,
    }])
}
