//! Registry of live playback sessions, one per guild.
//!
//! Each session lives behind its own fair mutex, so operations on one guild
//! run in arrival order while different guilds never wait on each other.
//! Track lifecycle events reach a session through a dedicated channel drained
//! by a single task that ends when the session is destroyed.

use dashmap::{mapref::entry::Entry, DashMap, DashSet};
use parking_lot::RwLock;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        node::{NodePool, TrackEvent},
        session::{Session, SessionState},
    },
    error::{MusicError, MusicResult},
};

type EventSender = mpsc::UnboundedSender<(String, TrackEvent)>;
type EventReceiver = mpsc::UnboundedReceiver<(String, TrackEvent)>;

pub struct SessionHandle {
    guild_id: GuildId,
    /// Copia del nodo ligado, legible sin esperar el turno de la sesión.
    node_id: RwLock<String>,
    session: Mutex<Session>,
    cancel: CancellationToken,
    events: EventSender,
}

impl SessionHandle {
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn node_id(&self) -> String {
        self.node_id.read().clone()
    }

    /// Liga la sesión a otro nodo. Debe llamarse con el lock de la sesión
    /// tomado para que ambas copias del nodo cambien en el mismo turno.
    pub fn rebind(&self, session: &mut Session, node_id: &str) {
        session.rebind(node_id);
        *self.node_id.write() = node_id.to_string();
    }

    /// Espera su turno en la cola FIFO de la sesión.
    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().await
    }

    pub fn is_destroyed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<GuildId, Arc<SessionHandle>>>,
    /// Guilds cuyo canal de voz abandonó el propio bot al destruir la sesión.
    expected_leaves: Arc<DashSet<GuildId>>,
    nodes: Arc<NodePool>,
    max_queue_size: usize,
}

impl SessionRegistry {
    pub fn new(nodes: Arc<NodePool>, max_queue_size: usize) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            expected_leaves: Arc::new(DashSet::new()),
            nodes,
            max_queue_size,
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<SessionHandle>> {
        self.sessions.get(&guild_id).map(|h| Arc::clone(h.value()))
    }

    pub fn contains(&self, guild_id: GuildId) -> bool {
        self.sessions.contains_key(&guild_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn create(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
        node_id: &str,
    ) -> MusicResult<Arc<SessionHandle>> {
        match self.sessions.entry(guild_id) {
            Entry::Occupied(_) => Err(MusicError::SessionAlreadyExists(guild_id)),
            Entry::Vacant(entry) => {
                let handle = self.spawn_session(guild_id, voice_channel, text_channel, node_id);
                entry.insert(Arc::clone(&handle));
                Ok(handle)
            }
        }
    }

    /// Devuelve la sesión existente o crea una nueva de forma atómica. El
    /// booleano indica si fue creada ahora.
    pub fn get_or_create(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
        node_id: &str,
    ) -> (Arc<SessionHandle>, bool) {
        match self.sessions.entry(guild_id) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let handle = self.spawn_session(guild_id, voice_channel, text_channel, node_id);
                entry.insert(Arc::clone(&handle));
                (handle, true)
            }
        }
    }

    fn spawn_session(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
        node_id: &str,
    ) -> Arc<SessionHandle> {
        let session = Session::new(
            guild_id,
            voice_channel,
            text_channel,
            node_id,
            self.max_queue_size,
        );
        let cancel = session.cancellation();
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = Arc::new(SessionHandle {
            guild_id,
            node_id: RwLock::new(node_id.to_string()),
            session: Mutex::new(session),
            cancel,
            events: tx,
        });

        tokio::spawn(run_events(
            Arc::clone(&handle),
            Arc::clone(&self.nodes),
            rx,
        ));

        info!("🎧 Sesión creada para guild {} en nodo {}", guild_id, node_id);
        handle
    }

    /// Destruye la sesión del guild. Devuelve `false` si no existía.
    ///
    /// La entrada se quita del registro y el token se cancela antes de esperar
    /// el lock, así las llamadas en vuelo terminan como no-op.
    pub async fn destroy(&self, guild_id: GuildId) -> bool {
        let Some((_, handle)) = self.sessions.remove(&guild_id) else {
            debug!("No hay sesión que destruir en guild {}", guild_id);
            return false;
        };
        self.release(handle, true).await;
        true
    }

    /// Como [`destroy`](Self::destroy), pero solo si el registro todavía
    /// apunta a esta misma sesión y no a una creada después.
    pub async fn destroy_session(&self, handle: &Arc<SessionHandle>) -> bool {
        let removed = self
            .sessions
            .remove_if(&handle.guild_id, |_, current| Arc::ptr_eq(current, handle));
        match removed {
            Some((_, handle)) => {
                self.release(handle, true).await;
                true
            }
            None => false,
        }
    }

    /// El bot ya no está en el canal de voz (expulsado o desconectado a mano).
    ///
    /// Las salidas provocadas por una destrucción propia se descartan una vez,
    /// así no se llevan por delante una sesión nueva del mismo guild.
    pub async fn voice_left(&self, guild_id: GuildId) -> bool {
        if self.expected_leaves.remove(&guild_id).is_some() {
            debug!("Salida de voz propia en guild {}, ignorando", guild_id);
            return false;
        }
        let Some((_, handle)) = self.sessions.remove(&guild_id) else {
            return false;
        };
        self.release(handle, false).await;
        true
    }

    async fn release(&self, handle: Arc<SessionHandle>, leaves_voice: bool) {
        let guild_id = handle.guild_id;
        handle.cancel.cancel();

        let (node_id, joined) = {
            let mut session = handle.lock().await;
            let joined = matches!(
                session.state(),
                SessionState::Connecting | SessionState::Connected
            );
            session.teardown();
            (session.node_id().to_string(), joined)
        };

        if leaves_voice && joined {
            self.expected_leaves.insert(guild_id);
        }

        if let Some(client) = self.nodes.client(&node_id) {
            if let Err(e) = client.destroy(guild_id).await {
                warn!("Error liberando el player de guild {} en nodo {}: {}", guild_id, node_id, e);
            }
        }

        info!("🗑️ Sesión de guild {} destruida", guild_id);
    }

    /// Sesiones ligadas actualmente al nodo indicado. No espera el lock de
    /// ninguna sesión.
    pub fn bound_to(&self, node_id: &str) -> Vec<Arc<SessionHandle>> {
        self.sessions
            .iter()
            .filter(|entry| *entry.value().node_id.read() == node_id)
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Encola un evento de track para la sesión del guild.
    pub fn route_event(&self, node_id: &str, guild_id: GuildId, event: TrackEvent) -> bool {
        let Some(handle) = self.get(guild_id) else {
            debug!("Evento de track para guild {} sin sesión, ignorando", guild_id);
            return false;
        };
        handle.events.send((node_id.to_string(), event)).is_ok()
    }
}

async fn run_events(handle: Arc<SessionHandle>, nodes: Arc<NodePool>, mut rx: EventReceiver) {
    let guild_id = handle.guild_id;

    loop {
        let (node_id, event) = tokio::select! {
            _ = handle.cancel.cancelled() => break,
            received = rx.recv() => match received {
                Some(received) => received,
                None => break,
            },
        };

        let mut session = handle.lock().await;
        if session.is_destroyed() {
            break;
        }
        // Eventos de un nodo anterior tras un cambio de nodo
        if session.node_id() != node_id {
            debug!(
                "Evento del nodo {} descartado, guild {} ahora usa {}",
                node_id,
                guild_id,
                session.node_id()
            );
            continue;
        }
        let Some(client) = nodes.client(&node_id) else {
            continue;
        };

        match session.handle_track_event(client.as_ref(), event).await {
            Ok(Some(track)) => debug!("⏭️ Siguiente en guild {}: {}", guild_id, track.title()),
            Ok(None) => {}
            Err(e) => error!("Error procesando evento de track en guild {}: {}", guild_id, e),
        }
    }

    debug!("Tarea de eventos de guild {} terminada", guild_id);
}
