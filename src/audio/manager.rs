use futures::future::join_all;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        dispatch::{dispatch, Dispatch, DispatchContext},
        node::{NodeClient, NodeEvent, NodePool},
        queue::RepeatMode,
        registry::{SessionHandle, SessionRegistry},
        session::Session,
        track::{Requester, SearchResult, SearchSource},
        voice_guard::{VoiceChannel, VoiceGuard},
    },
    config::Config,
    error::{MusicError, MusicResult},
    ui::{
        messages,
        notification::{ChannelNotifier, Notification, Notifier},
    },
};

/// Discord limita las opciones de autocompletado a 25, de 100 caracteres.
const MAX_CHOICES: usize = 25;
const MAX_CHOICE_LENGTH: usize = 100;
const NO_RESULTS_CHOICE: &str = "No se encontraron resultados";

#[derive(Debug, Clone)]
pub struct PlaybackSettings {
    pub max_queue_size: usize,
    pub default_source: SearchSource,
    /// Mover las sesiones a otro nodo cuando el suyo se desconecta.
    pub auto_move: bool,
}

impl From<&Config> for PlaybackSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_queue_size: config.max_queue_size,
            default_source: config.default_search_source,
            auto_move: config.auto_move,
        }
    }
}

/// Petición `/play` con el estado de voz ya resuelto por la plataforma.
#[derive(Debug, Clone)]
pub struct PlayRequest {
    pub guild_id: GuildId,
    pub text_channel: ChannelId,
    pub requester: Requester,
    pub requester_voice: Option<VoiceChannel>,
    pub bot_voice: Option<ChannelId>,
    pub query: String,
    /// Nodo preferido; si no está disponible se usa otro.
    pub node: Option<String>,
    pub source: Option<SearchSource>,
}

/// Orquesta nodos, sesiones y notificaciones.
///
/// Cada operación entrega exactamente una notificación a quien la pidió. Los
/// fallos de entrega solo se registran.
pub struct PlaybackManager {
    nodes: Arc<NodePool>,
    sessions: SessionRegistry,
    settings: PlaybackSettings,
}

impl PlaybackManager {
    pub fn new(nodes: Arc<NodePool>, settings: PlaybackSettings) -> Self {
        info!(
            "🎵 Inicializando PlaybackManager ({} nodos, auto-move: {})",
            nodes.len(),
            settings.auto_move
        );
        let sessions = SessionRegistry::new(Arc::clone(&nodes), settings.max_queue_size);
        Self {
            nodes,
            sessions,
            settings,
        }
    }

    pub fn nodes(&self) -> &Arc<NodePool> {
        &self.nodes
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub async fn play(&self, request: PlayRequest, notifier: &dyn Notifier) {
        let notification = self.execute_play(request).await;
        deliver(notifier, &notification).await;
    }

    async fn execute_play(&self, request: PlayRequest) -> Notification {
        let guild_id = request.guild_id;

        let voice_channel = match validate_channels(&request) {
            Ok(channel) => channel,
            Err(e) => {
                info!("🚫 Petición rechazada en guild {}: {}", guild_id, e);
                return messages::request_failed(&e);
            }
        };

        // Una petición anterior pudo destruir la sesión mientras esperábamos
        // turno; se reintenta una vez con una sesión nueva
        let mut retried = false;
        loop {
            let (handle, fallback_from) = match self.session_for(&request, voice_channel) {
                Ok(found) => found,
                Err(e) => {
                    warn!("❌ Sin nodo para guild {}: {}", guild_id, e);
                    return messages::request_failed(&e);
                }
            };

            let mut session = handle.lock().await;
            if session.is_destroyed() && !retried {
                debug!("Sesión de guild {} destruida antes de su turno, reintentando", guild_id);
                retried = true;
                continue;
            }
            let outcome = self
                .run_play(&mut session, &request, fallback_from.as_deref())
                .await;
            drop(session);

            if outcome.teardown {
                self.sessions.destroy_session(&handle).await;
            }
            return outcome.notification;
        }
    }

    /// Una sesión existente conserva su nodo; si no hay, se elige uno.
    fn session_for(
        &self,
        request: &PlayRequest,
        voice_channel: ChannelId,
    ) -> MusicResult<(Arc<SessionHandle>, Option<String>)> {
        if let Some(handle) = self.sessions.get(request.guild_id) {
            return Ok((handle, None));
        }

        let selected = self.nodes.select_node(request.node.as_deref())?;
        let fallback_from = if selected.fell_back {
            request.node.clone()
        } else {
            None
        };
        let (handle, _) = self.sessions.get_or_create(
            request.guild_id,
            voice_channel,
            request.text_channel,
            &selected.identifier,
        );
        Ok((handle, fallback_from))
    }

    async fn run_play(
        &self,
        session: &mut Session,
        request: &PlayRequest,
        fallback_from: Option<&str>,
    ) -> Dispatch {
        if session.is_destroyed() {
            return failure(session, MusicError::SessionDestroyed);
        }

        let node_id = session.node_id().to_string();
        let Some(client) = self.nodes.client(&node_id) else {
            return failure(session, MusicError::UnknownNode(node_id));
        };

        if let Err(e) = session.connect(client.as_ref()).await {
            return failure(session, e);
        }

        let source = request.source.unwrap_or(self.settings.default_source);
        debug!(
            "🔍 Buscando '{}' ({}) en nodo {} para guild {}",
            request.query,
            source,
            node_id,
            session.guild_id()
        );
        let result = match client.search(&request.query, source, &request.requester).await {
            Ok(result) => result,
            Err(e) => return failure(session, e.into()),
        };
        if session.is_destroyed() {
            return failure(session, MusicError::SessionDestroyed);
        }

        let ctx = DispatchContext {
            query: &request.query,
            requester: &request.requester,
            node_id: &node_id,
            fallback_from,
        };
        dispatch(result, session, client.as_ref(), &ctx).await
    }

    pub async fn set_repeat(&self, guild_id: GuildId, mode: RepeatMode, notifier: &dyn Notifier) {
        let notification = match self.sessions.get(guild_id) {
            Some(handle) => match handle.lock().await.set_repeat(mode) {
                Ok(()) => messages::repeat_changed(mode),
                Err(e) => messages::request_failed(&e),
            },
            None => messages::request_failed(&MusicError::NoSession),
        };
        deliver(notifier, &notification).await;
    }

    pub async fn stop(&self, guild_id: GuildId, notifier: &dyn Notifier) {
        let notification = if self.sessions.destroy(guild_id).await {
            messages::stopped()
        } else {
            messages::request_failed(&MusicError::NoSession)
        };
        deliver(notifier, &notification).await;
    }

    pub async fn node_overview(&self, notifier: &dyn Notifier) {
        let notification = messages::node_overview(&self.nodes.snapshots());
        deliver(notifier, &notification).await;
    }

    /// El bot salió del canal de voz. Las salidas que provocó el propio bot
    /// al destruir una sesión no afectan a la sesión actual.
    pub async fn voice_disconnected(&self, guild_id: GuildId) {
        if self.sessions.voice_left(guild_id).await {
            info!("👋 Bot desconectado del canal de voz en guild {}", guild_id);
        }
    }

    /// Aplica un evento de nodo sin esperar a ninguna sesión. La pérdida de un
    /// nodo se atiende en una tarea aparte, que se devuelve por si se quiere
    /// esperar.
    pub fn handle_node_event(
        self: &Arc<Self>,
        event: NodeEvent,
        announcer: &Arc<dyn ChannelNotifier>,
    ) -> Option<JoinHandle<()>> {
        match event {
            NodeEvent::Ready { node, session_id } => {
                match self.nodes.client(&node) {
                    Some(client) => client.attach_session(&session_id),
                    None => warn!("Sesión recibida para nodo desconocido: {}", node),
                }
                self.nodes.mark_connected(&node);
                None
            }
            NodeEvent::Connected { node } => {
                // Responder a /stats no basta: sin sesión no hay players
                match self.nodes.client(&node) {
                    Some(client) if client.is_ready() => {
                        self.nodes.mark_connected(&node);
                    }
                    _ => debug!("Nodo {} responde pero aún no tiene sesión", node),
                }
                None
            }
            NodeEvent::Disconnected { node } => self.lose_node(node, announcer),
            NodeEvent::SessionClosed { node } => {
                if let Some(client) = self.nodes.client(&node) {
                    client.detach_session();
                }
                self.lose_node(node, announcer)
            }
            NodeEvent::Stats { node, stats } => {
                self.nodes.update_stats(&node, stats);
                None
            }
            NodeEvent::Track {
                node,
                guild_id,
                event,
            } => {
                self.sessions.route_event(&node, guild_id, event);
                None
            }
        }
    }

    fn lose_node(
        self: &Arc<Self>,
        node: String,
        announcer: &Arc<dyn ChannelNotifier>,
    ) -> Option<JoinHandle<()>> {
        if !self.nodes.mark_disconnected(&node) {
            return None;
        }
        let manager = Arc::clone(self);
        let announcer = Arc::clone(announcer);
        Some(tokio::spawn(async move {
            manager.node_lost(&node, announcer.as_ref()).await;
        }))
    }

    /// Cada sesión afectada se reubica por su cuenta; una sesión ocupada solo
    /// retrasa su propio aviso.
    async fn node_lost(&self, node_id: &str, announcer: &dyn ChannelNotifier) {
        let bound = self.sessions.bound_to(node_id);
        if bound.is_empty() {
            return;
        }
        warn!("🔴 Nodo {} perdido con {} sesiones activas", node_id, bound.len());

        let relocations = bound.iter().map(|handle| async move {
            let Some((channel, notification)) = self.relocate(handle, node_id).await else {
                return;
            };
            if let Err(e) = announcer.notify_channel(channel, &notification).await {
                warn!(
                    "No se pudo avisar en el canal {} de guild {}: {:?}",
                    channel,
                    handle.guild_id(),
                    e
                );
            }
        });
        join_all(relocations).await;
    }

    /// Mueve la sesión a otro nodo (si está permitido) conservando la cola.
    async fn relocate(
        &self,
        handle: &SessionHandle,
        lost: &str,
    ) -> Option<(ChannelId, Notification)> {
        let mut session = handle.lock().await;
        if session.is_destroyed() || session.node_id() != lost {
            return None;
        }
        let channel = session.text_channel();

        if !self.settings.auto_move {
            session.mark_detached();
            return Some((channel, messages::node_lost(lost)));
        }

        let selected = match self.nodes.select_node(None) {
            Ok(selected) => selected,
            Err(e) => {
                warn!("No hay nodo al que mover guild {}: {}", handle.guild_id(), e);
                session.mark_detached();
                return Some((channel, messages::node_lost(lost)));
            }
        };

        handle.rebind(&mut session, &selected.identifier);
        if let Err(e) = session.connect(selected.client.as_ref()).await {
            error!("Error reconectando guild {} en nodo {}: {}", handle.guild_id(), selected.identifier, e);
            return Some((channel, messages::request_failed(&e).footer_node(&selected.identifier)));
        }
        if session.queue().current().is_some() {
            if let Err(e) = session.play(selected.client.as_ref()).await {
                error!("Error reanudando guild {} en nodo {}: {}", handle.guild_id(), selected.identifier, e);
            }
        }

        Some((channel, messages::node_moved(lost, &selected.identifier)))
    }

    /// Opciones de autocompletado para el nodo: `"<id> - <n> Players"`.
    pub fn node_choices(&self, partial: &str) -> Vec<(String, String)> {
        let partial = partial.to_lowercase();
        self.nodes
            .snapshots()
            .into_iter()
            .filter(|n| n.connected && n.identifier.to_lowercase().contains(&partial))
            .take(MAX_CHOICES)
            .map(|n| (format!("{} - {} Players", n.identifier, n.stats.players), n.identifier))
            .collect()
    }

    /// Opciones de autocompletado para la búsqueda, resueltas en el nodo de la
    /// sesión o en cualquier nodo sano.
    pub async fn search_choices(
        &self,
        guild_id: GuildId,
        query: &str,
        requester: &Requester,
    ) -> Vec<(String, String)> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        let client = match self.choice_client(guild_id) {
            Some(client) => client,
            None => return Vec::new(),
        };

        match client
            .search(query, self.settings.default_source, requester)
            .await
        {
            Ok(result) => search_result_choices(result, query),
            Err(e) => {
                debug!("Autocompletado falló para '{}': {}", query, e);
                Vec::new()
            }
        }
    }

    fn choice_client(&self, guild_id: GuildId) -> Option<Arc<dyn NodeClient>> {
        if let Some(handle) = self.sessions.get(guild_id) {
            let node_id = handle.node_id();
            if self.nodes.is_connected(&node_id) {
                return self.nodes.client(&node_id);
            }
        }
        self.nodes.select_node(None).ok().map(|selected| selected.client)
    }
}

fn validate_channels(request: &PlayRequest) -> Result<ChannelId, MusicError> {
    let voice = VoiceGuard::validate_requester_channel(request.requester_voice.as_ref())?;
    VoiceGuard::validate_bot_channel(request.bot_voice, voice)?;
    Ok(voice)
}

/// Falla de red o de estado: se notifica y la sesión solo se descarta si su
/// cola quedó vacía.
fn failure(session: &Session, error: MusicError) -> Dispatch {
    error!(
        "❌ Error en guild {} (nodo {}): {}",
        session.guild_id(),
        session.node_id(),
        error
    );
    Dispatch {
        notification: messages::request_failed(&error).footer_node(session.node_id()),
        teardown: !session.is_destroyed() && session.queue().is_empty(),
    }
}

fn search_result_choices(result: SearchResult, query: &str) -> Vec<(String, String)> {
    let tracks = match result {
        SearchResult::Search(tracks) => tracks,
        SearchResult::Track(track) => vec![track],
        SearchResult::Playlist(playlist) => {
            return vec![(truncate(&playlist.name), truncate(query))];
        }
        SearchResult::Empty | SearchResult::Error(_) => Vec::new(),
    };
    if tracks.is_empty() {
        return vec![(NO_RESULTS_CHOICE.to_string(), truncate(query))];
    }

    tracks
        .iter()
        .take(MAX_CHOICES)
        .map(|t| {
            let value = t.uri().unwrap_or(t.title());
            (truncate(t.title()), truncate(value))
        })
        .collect()
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_CHOICE_LENGTH).collect()
}

async fn deliver(notifier: &dyn Notifier, notification: &Notification) {
    if let Err(e) = notifier.notify(notification).await {
        warn!("No se pudo enviar la notificación '{}': {:?}", notification.title, e);
    }
}
