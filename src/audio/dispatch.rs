//! Turns a node search result into queue changes plus exactly one
//! notification for the requester.

use tracing::{debug, info, warn};

use crate::{
    audio::{
        node::NodeClient,
        session::Session,
        track::{Playlist, Requester, SearchResult, Track},
    },
    error::MusicError,
    ui::{messages, notification::Notification},
};

/// Datos de la petición que solo se usan para armar la respuesta.
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    pub query: &'a str,
    pub requester: &'a Requester,
    pub node_id: &'a str,
    /// Nodo pedido originalmente, si no estaba disponible.
    pub fallback_from: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub notification: Notification,
    /// La sesión quedó sin nada que reproducir y debe destruirse.
    pub teardown: bool,
}

impl Dispatch {
    fn keep(notification: Notification) -> Self {
        Self {
            notification,
            teardown: false,
        }
    }
}

pub async fn dispatch(
    result: SearchResult,
    session: &mut Session,
    node: &dyn NodeClient,
    ctx: &DispatchContext<'_>,
) -> Dispatch {
    let had_current = session.queue().current().is_some();
    debug!(
        "Resultado {} del nodo {} para '{}' (guild {})",
        result.load_type(),
        ctx.node_id,
        ctx.query,
        session.guild_id()
    );

    let mut dispatch = match result {
        SearchResult::Error(payload) => {
            warn!(
                "❌ Error de carga en nodo {} para '{}' (guild {}): {:?}",
                ctx.node_id,
                ctx.query,
                session.guild_id(),
                payload
            );
            Dispatch {
                notification: messages::load_failed(&payload, ctx.node_id),
                teardown: !had_current,
            }
        }
        SearchResult::Empty => not_found(had_current, ctx),
        SearchResult::Track(track) => enqueue_track(session, node, track, had_current, ctx).await,
        SearchResult::Search(tracks) => match tracks.into_iter().next() {
            Some(first) => enqueue_track(session, node, first, had_current, ctx).await,
            None => not_found(had_current, ctx),
        },
        SearchResult::Playlist(playlist) => {
            enqueue_playlist(session, node, playlist, had_current, ctx).await
        }
    };

    if let Some(requested) = ctx.fallback_from {
        dispatch.notification = messages::with_fallback(dispatch.notification, requested, ctx.node_id);
    }
    dispatch
}

fn not_found(had_current: bool, ctx: &DispatchContext<'_>) -> Dispatch {
    info!("🔍 Sin resultados para '{}' en nodo {}", ctx.query, ctx.node_id);
    Dispatch {
        notification: messages::not_found(ctx.query, ctx.node_id),
        teardown: !had_current,
    }
}

async fn enqueue_track(
    session: &mut Session,
    node: &dyn NodeClient,
    track: Track,
    had_current: bool,
    ctx: &DispatchContext<'_>,
) -> Dispatch {
    if let Err(e) = session.queue_mut().add_track(track.clone()) {
        return Dispatch::keep(failed(&e, ctx));
    }
    if had_current && session.is_playing() {
        return Dispatch::keep(messages::track_added(&track, session.queue(), ctx.node_id, false));
    }

    match session.play(node).await {
        Ok(started) => {
            let is_new = started.encoded() == track.encoded();
            Dispatch::keep(messages::track_added(&track, session.queue(), ctx.node_id, is_new))
        }
        Err(e) => Dispatch::keep(failed(&e, ctx)),
    }
}

async fn enqueue_playlist(
    session: &mut Session,
    node: &dyn NodeClient,
    playlist: Playlist,
    had_current: bool,
    ctx: &DispatchContext<'_>,
) -> Dispatch {
    if playlist.tracks.is_empty() {
        return not_found(had_current, ctx);
    }

    let added = session.queue_mut().add_tracks(playlist.tracks.iter().cloned());
    if added == 0 {
        let full = MusicError::QueueFull(session.queue().capacity());
        return Dispatch::keep(failed(&full, ctx));
    }

    // Reanudar también si hay track actual pero el nodo no lo está sonando
    if !had_current || !session.is_playing() {
        if let Err(e) = session.play(node).await {
            return Dispatch::keep(failed(&e, ctx));
        }
    }

    Dispatch::keep(messages::playlist_added(
        &playlist,
        added,
        ctx.requester,
        ctx.node_id,
    ))
}

fn failed(error: &MusicError, ctx: &DispatchContext<'_>) -> Notification {
    messages::request_failed(error).footer_node(ctx.node_id)
}
