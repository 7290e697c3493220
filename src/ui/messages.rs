//! Notificaciones que produce el núcleo de reproducción.

use crate::{
    audio::{
        node::NodeSnapshot,
        queue::{MusicQueue, RepeatMode},
        track::{LoadError, Playlist, Requester, Track},
    },
    error::MusicError,
    ui::{
        format::{format_memory, format_time},
        notification::Notification,
    },
};

pub const FIELD_REQUESTER: &str = "👤 Solicitado por";
pub const FIELD_DURATION: &str = "⏱️ Duración";
pub const FIELD_TRACKS: &str = "📊 Canciones";
pub const FIELD_NODE: &str = "🛰️ Nodo";
pub const FIELD_AUTHOR: &str = "✍️ Autor";
pub const FIELD_POSITION: &str = "📍 Posición";
pub const FIELD_QUEUE: &str = "⏳ Cola";
pub const FIELD_EXECUTION: &str = "⏱️ Ejecución";

pub fn duration_label(track: &Track) -> String {
    if track.is_stream() {
        return "🔴 EN VIVO".to_string();
    }
    format_time(track.duration().unwrap_or_default().as_millis() as u64)
}

/// Canción agregada; `started` indica si empezó a sonar de inmediato.
///
/// Si quedó en espera se muestra su posición y el tamaño de la cola.
pub fn track_added(track: &Track, queue: &MusicQueue, node_id: &str, started: bool) -> Notification {
    let title = if started {
        "🎵 Reproduciendo ahora"
    } else {
        "📋 Agregado a la cola"
    };

    let mut notification = Notification::info(title)
        .description(format!("**{}**", track.title()))
        .field(FIELD_REQUESTER, track.requester().mention(), true)
        .field(FIELD_DURATION, duration_label(track), true);

    if let Some(author) = track.author().filter(|a| !a.is_empty()) {
        notification = notification.field(FIELD_AUTHOR, author, true);
    }
    if !started {
        notification = notification
            .field(FIELD_POSITION, format!("#{}", queue.len()), true)
            .field(
                FIELD_QUEUE,
                format!(
                    "{} en espera · {}",
                    queue.len(),
                    format_time(queue.total_duration().as_millis() as u64)
                ),
                true,
            );
    }
    if let Some(url) = track.thumbnail() {
        notification = notification.thumbnail(url);
    }

    notification.footer_node(node_id)
}

pub fn playlist_added(
    playlist: &Playlist,
    added: usize,
    requester: &Requester,
    node_id: &str,
) -> Notification {
    Notification::info("✅ Playlist agregada")
        .description(format!("**{}**", playlist.name))
        .field(FIELD_REQUESTER, requester.mention(), true)
        .field(
            FIELD_DURATION,
            format_time(playlist.duration().as_millis() as u64),
            true,
        )
        .field(FIELD_TRACKS, added.to_string(), true)
        .footer_node(node_id)
}

pub fn not_found(query: &str, node_id: &str) -> Notification {
    Notification::error("❌ No encontrado")
        .description(format!("```No se encontraron resultados para: {}```", query))
        .footer_node(node_id)
}

/// Error de carga del nodo con el payload crudo.
pub fn load_failed(error: &LoadError, node_id: &str) -> Notification {
    let payload = serde_json::to_string_pretty(error).unwrap_or_else(|_| format!("{:?}", error));

    Notification::error(format!("❌ Error en el nodo {}", node_id))
        .description(format!("```json\n{}```", payload))
        .footer_node(node_id)
}

pub fn request_failed(error: &MusicError) -> Notification {
    let title = if error.is_validation() {
        "❌ Canal de voz"
    } else {
        "❌ No se pudo completar la petición"
    };
    Notification::error(title).description(error.to_string())
}

/// Nodo pedido no disponible: se informa cuál se usó realmente.
pub fn with_fallback(notification: Notification, requested: &str, used: &str) -> Notification {
    notification.field(
        FIELD_NODE,
        format!("`{}` no disponible, se usó `{}`", requested, used),
        false,
    )
}

pub fn repeat_changed(mode: RepeatMode) -> Notification {
    let description = match mode {
        RepeatMode::Track => "🔂 Repetición de canción activada",
        RepeatMode::Queue => "🔁 Repetición de cola activada",
        RepeatMode::Off => "➡️ Repetición desactivada",
    };
    Notification::info("🔁 Modo de repetición").description(description)
}

/// Indicador de latencia del gateway.
pub fn ping_status(millis: u64) -> &'static str {
    match millis {
        0..=49 => "🟢",
        50..=99 => "🟡",
        100..=259 => "🔴",
        _ => "⚫",
    }
}

/// Respuesta de `/ping`. `latency` es `None` hasta que el shard mide su
/// primer heartbeat.
pub fn pong(bot_name: &str, shard_id: u32, latency: Option<u64>, execution_ms: u64) -> Notification {
    let (status, value) = match latency {
        Some(ms) => (ping_status(ms), format!("┗ {}ms", ms)),
        None => ("⚫", "┗ sin medir".to_string()),
    };

    Notification::info(format!("🏓 {} Pong!", bot_name))
        .field(format!("{} Shard [{}]", status, shard_id), value, false)
        .field(FIELD_EXECUTION, format!("{}ms", execution_ms), true)
}

pub fn stopped() -> Notification {
    Notification::info("⏹️ Detenido").description("Reproducción detenida y cola limpiada.")
}

pub fn node_lost(node_id: &str) -> Notification {
    Notification::error("🔴 Nodo desconectado")
        .description(format!(
            "El nodo `{}` perdió la conexión. La cola se conserva; usa /play para continuar cuando vuelva.",
            node_id
        ))
        .footer_node(node_id)
}

pub fn node_moved(from: &str, to: &str) -> Notification {
    Notification::info("🔀 Reproductor movido")
        .description(format!(
            "El nodo `{}` perdió la conexión, la reproducción continúa en `{}`.",
            from, to
        ))
        .footer_node(to)
}

/// Resumen de todos los nodos con su carga.
pub fn node_overview(nodes: &[NodeSnapshot]) -> Notification {
    let players: u32 = nodes.iter().map(|n| n.stats.players).sum();
    let playing: u32 = nodes.iter().map(|n| n.stats.playing_players).sum();

    let mut notification = Notification::info("🪐 Información de nodos").description(format!(
        "**Nodos: [{}]**\n```ml\nConectados : {} salas\nReproduciendo : {} salas\n```",
        nodes.len(),
        players,
        playing
    ));

    for node in nodes {
        let status = if node.connected { "🟢" } else { "🔴" };
        let value = format!(
            "```autohotkey\nConectados : {} salas\nReproduciendo : {} salas\nCPU : {:.1} %\nRAM : {}\nRAM máx : {}\nUptime : {}\n```",
            node.stats.players,
            node.stats.playing_players,
            node.stats.cpu_load() * 100.0,
            format_memory(node.stats.memory.used),
            format_memory(node.stats.memory.reservable),
            format_time(node.stats.uptime),
        );
        notification = notification.field(format!("`{}` {}", status, node.identifier), value, true);
    }

    notification
}
