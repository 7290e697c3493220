//! Pool of remote audio nodes.
//!
//! Every node is registered at startup from configuration and starts
//! disconnected; its connectivity flag flips on transport events and health
//! polls. Nodes are never removed while the process runs.

use async_trait::async_trait;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    audio::track::{Requester, SearchResult, SearchSource, Track},
    error::{MusicError, MusicResult, NodeTransportError},
};

fn default_port() -> u16 {
    2333
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    pub identifier: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub password: String,
    #[serde(default)]
    pub secure: bool,
}

impl NodeConfig {
    pub fn endpoint(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// URL del socket de eventos de Lavalink v4.
    pub fn socket_endpoint(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}:{}/v4/websocket", scheme, self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryStats {
    pub free: u64,
    pub used: u64,
    pub allocated: u64,
    pub reservable: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CpuStats {
    pub cores: u32,
    pub system_load: f64,
    pub lavalink_load: f64,
}

/// Métricas de salud reportadas por un nodo.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeStats {
    pub players: u32,
    pub playing_players: u32,
    /// Milisegundos.
    pub uptime: u64,
    pub memory: MemoryStats,
    pub cpu: CpuStats,
}

impl NodeStats {
    /// Fracción de carga de CPU (sistema + proceso del nodo).
    pub fn cpu_load(&self) -> f64 {
        self.cpu.system_load + self.cpu.lavalink_load
    }
}

/// Primitivas que expone un nodo de audio.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NodeClient: Send + Sync {
    async fn search(
        &self,
        query: &str,
        source: SearchSource,
        requester: &Requester,
    ) -> Result<SearchResult, NodeTransportError>;

    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), NodeTransportError>;

    async fn play(&self, guild_id: GuildId, track: &Track) -> Result<(), NodeTransportError>;

    async fn destroy(&self, guild_id: GuildId) -> Result<(), NodeTransportError>;

    async fn stats(&self) -> Result<NodeStats, NodeTransportError>;

    /// Llamado cuando el transporte del nodo informa una nueva sesión.
    fn attach_session(&self, _session_id: &str) {}

    /// El transporte cerró la sesión; los players del nodo ya no existen.
    fn detach_session(&self) {}

    /// `false` mientras el nodo no pueda crear players (sin sesión activa).
    fn is_ready(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndReason {
    Finished,
    LoadFailed,
    Stopped,
    Replaced,
    Cleanup,
}

/// Eventos del ciclo de vida de un track, emitidos por el nodo.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackEvent {
    Start { encoded: String },
    End { encoded: String, reason: EndReason },
    Error { encoded: String, message: String },
}

impl TrackEvent {
    pub fn encoded(&self) -> &str {
        match self {
            TrackEvent::Start { encoded }
            | TrackEvent::End { encoded, .. }
            | TrackEvent::Error { encoded, .. } => encoded,
        }
    }
}

/// Todo lo que llega desde el transporte de los nodos.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    Ready { node: String, session_id: String },
    Connected { node: String },
    Disconnected { node: String },
    /// El socket de eventos se cerró y la sesión del nodo se perdió.
    SessionClosed { node: String },
    Stats { node: String, stats: NodeStats },
    Track { node: String, guild_id: GuildId, event: TrackEvent },
}

struct NodeEntry {
    config: NodeConfig,
    connected: bool,
    stats: NodeStats,
    client: Arc<dyn NodeClient>,
}

/// Vista consistente de un nodo en un instante.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub identifier: String,
    pub endpoint: String,
    pub connected: bool,
    pub stats: NodeStats,
}

#[derive(Clone)]
pub struct SelectedNode {
    pub identifier: String,
    pub client: Arc<dyn NodeClient>,
    /// `true` si se pidió otro nodo y no estaba disponible.
    pub fell_back: bool,
}

impl std::fmt::Debug for SelectedNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedNode")
            .field("identifier", &self.identifier)
            .field("fell_back", &self.fell_back)
            .finish()
    }
}

#[derive(Default)]
pub struct NodePool {
    nodes: RwLock<Vec<NodeEntry>>,
}

impl NodePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra un nodo desconectado. Devuelve `false` si el identificador ya
    /// existía.
    pub fn register(&self, config: NodeConfig, client: Arc<dyn NodeClient>) -> bool {
        let mut nodes = self.nodes.write();
        if nodes.iter().any(|n| n.config.identifier == config.identifier) {
            debug!("Nodo {} ya registrado, ignorando", config.identifier);
            return false;
        }

        info!("🎼 Nodo registrado: {} ({})", config.identifier, config.endpoint());
        nodes.push(NodeEntry {
            config,
            connected: false,
            stats: NodeStats::default(),
            client,
        });
        true
    }

    /// Devuelve `true` si el estado cambió.
    pub fn mark_connected(&self, id: &str) -> bool {
        self.set_connected(id, true)
    }

    /// Devuelve `true` si el nodo estaba conectado.
    pub fn mark_disconnected(&self, id: &str) -> bool {
        self.set_connected(id, false)
    }

    fn set_connected(&self, id: &str, connected: bool) -> bool {
        let mut nodes = self.nodes.write();
        let Some(node) = nodes.iter_mut().find(|n| n.config.identifier == id) else {
            warn!("Evento de conectividad para nodo desconocido: {}", id);
            return false;
        };

        if node.connected == connected {
            return false;
        }
        node.connected = connected;
        if connected {
            info!("🟢 Nodo {} conectado", id);
        } else {
            warn!("🔴 Nodo {} desconectado", id);
        }
        true
    }

    pub fn update_stats(&self, id: &str, stats: NodeStats) -> bool {
        let mut nodes = self.nodes.write();
        match nodes.iter_mut().find(|n| n.config.identifier == id) {
            Some(node) => {
                node.stats = stats;
                true
            }
            None => false,
        }
    }

    /// Elige un nodo conectado: el preferido si está disponible, si no uno al
    /// azar. Sin nodos conectados falla con [`MusicError::NoHealthyNode`].
    pub fn select_node(&self, preferred: Option<&str>) -> MusicResult<SelectedNode> {
        let nodes = self.nodes.read();

        if let Some(id) = preferred {
            if let Some(node) = nodes
                .iter()
                .find(|n| n.connected && n.config.identifier == id)
            {
                return Ok(SelectedNode {
                    identifier: node.config.identifier.clone(),
                    client: Arc::clone(&node.client),
                    fell_back: false,
                });
            }
        }

        let connected: Vec<&NodeEntry> = nodes.iter().filter(|n| n.connected).collect();
        let node = connected
            .choose(&mut rand::thread_rng())
            .ok_or(MusicError::NoHealthyNode)?;

        if let Some(id) = preferred {
            warn!(
                "Nodo {} no disponible, usando {} en su lugar",
                id, node.config.identifier
            );
        }

        Ok(SelectedNode {
            identifier: node.config.identifier.clone(),
            client: Arc::clone(&node.client),
            fell_back: preferred.is_some(),
        })
    }

    pub fn client(&self, id: &str) -> Option<Arc<dyn NodeClient>> {
        self.nodes
            .read()
            .iter()
            .find(|n| n.config.identifier == id)
            .map(|n| Arc::clone(&n.client))
    }

    pub fn is_connected(&self, id: &str) -> bool {
        self.nodes
            .read()
            .iter()
            .any(|n| n.connected && n.config.identifier == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.read().iter().any(|n| n.config.identifier == id)
    }

    pub fn snapshots(&self) -> Vec<NodeSnapshot> {
        self.nodes
            .read()
            .iter()
            .map(|n| NodeSnapshot {
                identifier: n.config.identifier.clone(),
                endpoint: n.config.endpoint(),
                connected: n.connected,
                stats: n.stats.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}
