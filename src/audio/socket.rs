//! Lavalink v4 event socket.
//!
//! One long-lived websocket per node. The `ready` frame carries the session id
//! the REST client needs for player calls; `event` frames carry the track
//! lifecycle of every guild on that node. When the socket drops, the node's
//! players are gone with it, so the loss is reported before reconnecting.

use anyhow::{Context, Result};
use futures::StreamExt;
use serde::Deserialize;
use serenity::model::id::{GuildId, UserId};
use std::time::Duration;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audio::node::{EndReason, NodeConfig, NodeEvent, NodeStats, TrackEvent};

const CLIENT_NAME: &str = concat!("Starlight/", env!("CARGO_PKG_VERSION"));
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct FrameTrack {
    encoded: String,
}

#[derive(Debug, Deserialize)]
struct FrameException {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
enum Frame {
    #[serde(rename_all = "camelCase")]
    Ready { session_id: String },
    Stats(NodeStats),
    Event(EventFrame),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
enum EventFrame {
    TrackStartEvent {
        guild_id: String,
        track: FrameTrack,
    },
    TrackEndEvent {
        guild_id: String,
        track: FrameTrack,
        reason: EndReason,
    },
    TrackExceptionEvent {
        guild_id: String,
        track: FrameTrack,
        exception: FrameException,
    },
    TrackStuckEvent {
        guild_id: String,
        track: FrameTrack,
        threshold_ms: u64,
    },
    #[serde(other)]
    Other,
}

fn guild(raw: &str) -> Option<GuildId> {
    raw.parse::<u64>().ok().filter(|id| *id != 0).map(GuildId::new)
}

/// Traduce un frame de texto del nodo. `None` para frames que no interesan o
/// que no se pueden interpretar.
pub fn parse_frame(node_id: &str, text: &str) -> Option<NodeEvent> {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Frame inválido del nodo {}: {}", node_id, e);
            return None;
        }
    };

    let node = node_id.to_string();
    let (guild_id, event) = match frame {
        Frame::Ready { session_id } => return Some(NodeEvent::Ready { node, session_id }),
        Frame::Stats(stats) => return Some(NodeEvent::Stats { node, stats }),
        Frame::Other => return None,
        Frame::Event(event) => match event {
            EventFrame::TrackStartEvent { guild_id, track } => {
                (guild_id, TrackEvent::Start { encoded: track.encoded })
            }
            EventFrame::TrackEndEvent {
                guild_id,
                track,
                reason,
            } => (
                guild_id,
                TrackEvent::End {
                    encoded: track.encoded,
                    reason,
                },
            ),
            EventFrame::TrackExceptionEvent {
                guild_id,
                track,
                exception,
            } => (
                guild_id,
                TrackEvent::Error {
                    encoded: track.encoded,
                    message: exception
                        .message
                        .unwrap_or_else(|| "error desconocido".to_string()),
                },
            ),
            EventFrame::TrackStuckEvent {
                guild_id,
                track,
                threshold_ms,
            } => (
                guild_id,
                TrackEvent::Error {
                    encoded: track.encoded,
                    message: format!("track atascado durante {}ms", threshold_ms),
                },
            ),
            EventFrame::Other => return None,
        },
    };

    let Some(guild_id) = guild(&guild_id) else {
        warn!("Evento del nodo {} con guild inválido: {}", node_id, guild_id);
        return None;
    };
    Some(NodeEvent::Track {
        node,
        guild_id,
        event,
    })
}

/// Mantiene abierto el socket de eventos del nodo hasta el shutdown.
pub fn spawn_event_socket(
    config: NodeConfig,
    user_id: UserId,
    events: mpsc::UnboundedSender<NodeEvent>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let node = config.identifier.clone();
        let mut backoff = INITIAL_BACKOFF;

        loop {
            let outcome = tokio::select! {
                _ = shutdown.cancelled() => break,
                outcome = run_socket(&config, user_id, &events) => outcome,
            };

            match outcome {
                Ok(had_session) => {
                    if had_session {
                        backoff = INITIAL_BACKOFF;
                    }
                    info!("🔌 Socket del nodo {} cerrado", node);
                }
                Err(e) => warn!("⚠️ Socket del nodo {}: {:#}", node, e),
            }

            if events
                .send(NodeEvent::SessionClosed { node: node.clone() })
                .is_err()
            {
                break;
            }

            debug!("Reconectando socket del nodo {} en {:?}", node, backoff);
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }

        debug!("Socket del nodo {} detenido", node);
    })
}

/// Una conexión completa. Devuelve si llegó a recibir una sesión.
async fn run_socket(
    config: &NodeConfig,
    user_id: UserId,
    events: &mpsc::UnboundedSender<NodeEvent>,
) -> Result<bool> {
    let mut request = config
        .socket_endpoint()
        .into_client_request()
        .context("URL de socket inválida")?;
    let headers = request.headers_mut();
    headers.insert(
        "Authorization",
        HeaderValue::from_str(&config.password).context("password inválido")?,
    );
    headers.insert("User-Id", HeaderValue::from_str(&user_id.to_string())?);
    headers.insert("Client-Name", HeaderValue::from_static(CLIENT_NAME));

    let (mut stream, _) = connect_async(request)
        .await
        .context("no se pudo abrir el socket")?;
    info!("📡 Socket del nodo {} conectado", config.identifier);

    let mut had_session = false;
    while let Some(message) = stream.next().await {
        let text = match message.context("error leyendo el socket")? {
            Message::Text(text) => text,
            Message::Close(frame) => {
                debug!("Nodo {} cerró el socket: {:?}", config.identifier, frame);
                break;
            }
            _ => continue,
        };

        let Some(event) = parse_frame(&config.identifier, &text) else {
            continue;
        };
        had_session |= matches!(event, NodeEvent::Ready { .. });
        if events.send(event).is_err() {
            break;
        }
    }

    Ok(had_session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::node_config;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_socket_endpoint_follows_tls_flag() {
        let mut config = node_config("A");
        config.host = "lava.local".into();
        config.port = 2333;
        assert_eq!(config.socket_endpoint(), "ws://lava.local:2333/v4/websocket");

        config.secure = true;
        assert_eq!(config.socket_endpoint(), "wss://lava.local:2333/v4/websocket");
    }

    #[test]
    fn test_ready_frame_carries_session() {
        let event = parse_frame("A", r#"{"op":"ready","resumed":false,"sessionId":"abc"}"#);
        assert_eq!(
            event,
            Some(NodeEvent::Ready {
                node: "A".into(),
                session_id: "abc".into(),
            })
        );
    }

    #[test]
    fn test_stats_frame() {
        let text = r#"{"op":"stats","players":3,"playingPlayers":1,"uptime":1000,
            "memory":{"free":1,"used":2,"allocated":3,"reservable":4},
            "cpu":{"cores":4,"systemLoad":0.5,"lavalinkLoad":0.1}}"#;
        let Some(NodeEvent::Stats { node, stats }) = parse_frame("A", text) else {
            panic!("se esperaba un evento de stats");
        };
        assert_eq!(node, "A");
        assert_eq!(stats.players, 3);
        assert_eq!(stats.playing_players, 1);
        assert_eq!(stats.cpu.cores, 4);
    }

    #[test]
    fn test_track_events() {
        let start = r#"{"op":"event","type":"TrackStartEvent","guildId":"42","track":{"encoded":"QA","info":{}}}"#;
        assert_eq!(
            parse_frame("A", start),
            Some(NodeEvent::Track {
                node: "A".into(),
                guild_id: GuildId::new(42),
                event: TrackEvent::Start { encoded: "QA".into() },
            })
        );

        let end = r#"{"op":"event","type":"TrackEndEvent","guildId":"42","track":{"encoded":"QA"},"reason":"loadFailed"}"#;
        assert_eq!(
            parse_frame("A", end),
            Some(NodeEvent::Track {
                node: "A".into(),
                guild_id: GuildId::new(42),
                event: TrackEvent::End {
                    encoded: "QA".into(),
                    reason: EndReason::LoadFailed,
                },
            })
        );

        let failed = r#"{"op":"event","type":"TrackExceptionEvent","guildId":"42","track":{"encoded":"QA"},
            "exception":{"message":"This video is unavailable","severity":"common","cause":"x"}}"#;
        assert_eq!(
            parse_frame("A", failed),
            Some(NodeEvent::Track {
                node: "A".into(),
                guild_id: GuildId::new(42),
                event: TrackEvent::Error {
                    encoded: "QA".into(),
                    message: "This video is unavailable".into(),
                },
            })
        );
    }

    #[test]
    fn test_ignored_frames() {
        assert_eq!(
            parse_frame("A", r#"{"op":"playerUpdate","guildId":"42","state":{"position":10}}"#),
            None
        );
        assert_eq!(
            parse_frame("A", r#"{"op":"event","type":"WebSocketClosedEvent","guildId":"42","code":4006}"#),
            None
        );
        assert_eq!(
            parse_frame("A", r#"{"op":"event","type":"TrackStartEvent","guildId":"0","track":{"encoded":"QA"}}"#),
            None
        );
        assert_eq!(parse_frame("A", "no es json"), None);
    }
}
