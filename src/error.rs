//! Error taxonomy for the playback core.
//!
//! Validation failures ([`MusicError::NotInVoiceChannel`],
//! [`MusicError::ChannelMismatch`]) are shown to the user verbatim, so the
//! `Display` strings here are user-facing.

use serenity::model::id::{ChannelId, GuildId};
use thiserror::Error;

/// Fallo de bajo nivel al hablar con un nodo de audio.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("error de transporte en el nodo {node}: {message}")]
pub struct NodeTransportError {
    pub node: String,
    pub message: String,
}

impl NodeTransportError {
    pub fn new(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MusicError {
    #[error("No hay nodos de audio disponibles en este momento")]
    NoHealthyNode,

    #[error("Ya existe un reproductor para el servidor {0}")]
    SessionAlreadyExists(GuildId),

    #[error("No se pudo conectar al nodo {node}: {source}")]
    ConnectFailed {
        node: String,
        #[source]
        source: NodeTransportError,
    },

    #[error("La cola está vacía")]
    EmptyQueue,

    #[error("La cola está llena (máximo {0} canciones)")]
    QueueFull(usize),

    #[error("Debes estar en un canal de voz para usar este comando")]
    NotInVoiceChannel,

    #[error("Ya estoy reproduciendo en <#{bot}>, únete a ese canal de voz")]
    ChannelMismatch { bot: ChannelId, requester: ChannelId },

    #[error("El reproductor no está conectado al canal de voz")]
    NotConnected,

    #[error("El reproductor de este servidor ya fue destruido")]
    SessionDestroyed,

    #[error("No hay ninguna canción reproduciéndose")]
    NoSession,

    #[error("Nodo desconocido: {0}")]
    UnknownNode(String),

    #[error(transparent)]
    Transport(#[from] NodeTransportError),
}

impl MusicError {
    /// Errores de validación: terminales para la petición, nunca se reintentan.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MusicError::NotInVoiceChannel | MusicError::ChannelMismatch { .. }
        )
    }
}

pub type MusicResult<T> = std::result::Result<T, MusicError>;
