use serenity::model::id::{ChannelId, GuildId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        node::{EndReason, NodeClient, TrackEvent},
        queue::{MusicQueue, RepeatMode},
        track::Track,
    },
    error::{MusicError, MusicResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Destroyed,
}

/// Contexto de reproducción de un servidor, ligado a un único nodo.
///
/// `node_id` es una referencia no propietaria: la sesión no controla el ciclo
/// de vida del nodo. El token de cancelación se dispara al destruir la sesión
/// y permite que las llamadas de red en vuelo detecten que quedaron huérfanas.
#[derive(Debug)]
pub struct Session {
    guild_id: GuildId,
    node_id: String,
    state: SessionState,
    voice_channel: ChannelId,
    text_channel: ChannelId,
    queue: MusicQueue,
    repeat: RepeatMode,
    playing: bool,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
        node_id: impl Into<String>,
        max_queue_size: usize,
    ) -> Self {
        Self {
            guild_id,
            node_id: node_id.into(),
            state: SessionState::Idle,
            voice_channel,
            text_channel,
            queue: MusicQueue::new(max_queue_size),
            repeat: RepeatMode::Off,
            playing: false,
            cancel: CancellationToken::new(),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn voice_channel(&self) -> ChannelId {
        self.voice_channel
    }

    pub fn text_channel(&self) -> ChannelId {
        self.text_channel
    }

    pub fn queue(&self) -> &MusicQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut MusicQueue {
        &mut self.queue
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == SessionState::Destroyed || self.cancel.is_cancelled()
    }

    pub(crate) fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn ensure_alive(&self) -> MusicResult<()> {
        if self.is_destroyed() {
            return Err(MusicError::SessionDestroyed);
        }
        Ok(())
    }

    /// Handshake de voz con el nodo ligado. Si falla, el estado vuelve al que
    /// tenía antes del intento.
    pub async fn connect(&mut self, node: &dyn NodeClient) -> MusicResult<()> {
        self.ensure_alive()?;
        if self.state == SessionState::Connected {
            return Ok(());
        }

        let previous = self.state;
        self.state = SessionState::Connecting;
        debug!(
            "🔗 Conectando guild {} al canal {} vía nodo {}",
            self.guild_id, self.voice_channel, self.node_id
        );

        let result = node.connect(self.guild_id, self.voice_channel).await;

        // La sesión pudo destruirse mientras esperábamos al nodo
        if self.cancel.is_cancelled() {
            debug!("Conexión completada para guild {} ya destruida, ignorando", self.guild_id);
            return Err(MusicError::SessionDestroyed);
        }

        match result {
            Ok(()) => {
                self.state = SessionState::Connected;
                info!(
                    "🔊 Guild {} conectada al canal {} (nodo {})",
                    self.guild_id, self.voice_channel, self.node_id
                );
                Ok(())
            }
            Err(source) => {
                self.state = previous;
                warn!(
                    "❌ Falló la conexión de guild {} con nodo {}: {}",
                    self.guild_id, self.node_id, source
                );
                Err(MusicError::ConnectFailed {
                    node: self.node_id.clone(),
                    source,
                })
            }
        }
    }

    /// Inicia la reproducción del track actual, avanzando la cola si no hay
    /// ninguno. Devuelve el track que empezó a sonar.
    pub async fn play(&mut self, node: &dyn NodeClient) -> MusicResult<Track> {
        self.ensure_alive()?;
        if self.state != SessionState::Connected {
            return Err(MusicError::NotConnected);
        }

        let advanced = self.queue.current().is_none();
        if advanced {
            self.queue.advance();
        }
        let track = self.queue.current().cloned().ok_or(MusicError::EmptyQueue)?;

        match self.start(node, &track).await {
            Ok(()) => Ok(track),
            Err(e) => {
                // Dejar la cola como estaba para que un reintento la reutilice
                if advanced && !self.is_destroyed() {
                    self.queue.rewind();
                }
                Err(e)
            }
        }
    }

    async fn start(&mut self, node: &dyn NodeClient, track: &Track) -> MusicResult<()> {
        let result = node.play(self.guild_id, track).await;

        if self.cancel.is_cancelled() {
            debug!("Reproducción completada para guild {} ya destruida, ignorando", self.guild_id);
            return Err(MusicError::SessionDestroyed);
        }

        match result {
            Ok(()) => {
                self.playing = true;
                info!("🎵 Reproduciendo en guild {}: {}", self.guild_id, track.title());
                Ok(())
            }
            Err(e) => {
                self.playing = false;
                error!(
                    "Error al reproducir {} en guild {} (nodo {}): {}",
                    track.title(),
                    self.guild_id,
                    self.node_id,
                    e
                );
                Err(e.into())
            }
        }
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) -> MusicResult<()> {
        self.ensure_alive()?;
        self.repeat = mode;
        match mode {
            RepeatMode::Off => info!("➡️ Repetición desactivada en guild {}", self.guild_id),
            RepeatMode::Track => info!("🔂 Repetir canción activado en guild {}", self.guild_id),
            RepeatMode::Queue => info!("🔁 Repetir cola activado en guild {}", self.guild_id),
        }
        Ok(())
    }

    /// Aplica un evento del ciclo de vida del track. Devuelve el track que
    /// empezó a sonar como consecuencia, si hubo alguno.
    pub async fn handle_track_event(
        &mut self,
        node: &dyn NodeClient,
        event: TrackEvent,
    ) -> MusicResult<Option<Track>> {
        if self.is_destroyed() {
            return Ok(None);
        }

        let is_current = self
            .queue
            .current()
            .is_some_and(|t| t.encoded() == event.encoded());
        if !is_current {
            debug!(
                "Evento {:?} para un track que ya no es el actual en guild {}",
                event, self.guild_id
            );
            return Ok(None);
        }

        match event {
            TrackEvent::Start { .. } => {
                self.playing = true;
                Ok(None)
            }
            TrackEvent::End {
                reason: EndReason::Replaced,
                ..
            } => Ok(None),
            TrackEvent::End { .. } => {
                self.playing = false;
                let mode = self.repeat;
                self.advance_and_play(node, mode).await
            }
            TrackEvent::Error { message, .. } => {
                self.playing = false;
                error!(
                    "❌ Error en el track {} de guild {}: {} (nodo {})",
                    self.queue.current().map(Track::title).unwrap_or_default(),
                    self.guild_id,
                    message,
                    self.node_id
                );
                // Un track roto nunca se repite, se salta como con repeat=off
                self.advance_and_play(node, RepeatMode::Off).await
            }
        }
    }

    async fn advance_and_play(
        &mut self,
        node: &dyn NodeClient,
        mode: RepeatMode,
    ) -> MusicResult<Option<Track>> {
        let Some(next) = self.queue.finish_current(mode).cloned() else {
            info!("📭 Cola terminada en guild {}", self.guild_id);
            return Ok(None);
        };

        if self.state != SessionState::Connected {
            return Ok(None);
        }

        self.start(node, &next).await?;
        Ok(Some(next))
    }

    /// Liga la sesión a otro nodo sin tocar la cola. Requiere reconectar.
    pub fn rebind(&mut self, node_id: impl Into<String>) {
        let node_id = node_id.into();
        info!(
            "🔀 Guild {} movida del nodo {} al nodo {}",
            self.guild_id, self.node_id, node_id
        );
        self.node_id = node_id;
        self.mark_detached();
    }

    /// El nodo perdió el player: hay que reconectar antes de reproducir.
    pub fn mark_detached(&mut self) {
        if self.is_destroyed() {
            return;
        }
        self.state = SessionState::Idle;
        self.playing = false;
    }

    /// Estado terminal. Idempotente.
    pub(crate) fn teardown(&mut self) {
        self.cancel.cancel();
        if self.state == SessionState::Destroyed {
            return;
        }
        self.state = SessionState::Destroyed;
        self.playing = false;
        self.queue.clear();
    }
}
