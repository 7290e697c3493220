//! REST client for a Lavalink v4 node.
//!
//! Covers the request/response half of the node API: track loading, stats and
//! player updates. The node's event socket lives in [`super::socket`] and
//! hands over its session id through [`NodeClient::attach_session`]; until that
//! happens player calls fail with a transport error and the node is not
//! selectable.

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{header, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use serenity::model::id::{ChannelId, GuildId};
use songbird::Songbird;
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, info};

use crate::{
    audio::{
        node::{NodeClient, NodeConfig, NodeStats},
        track::{LoadError, Playlist, Requester, SearchResult, SearchSource, Track},
    },
    error::NodeTransportError,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTrackInfo {
    title: String,
    author: String,
    length: u64,
    is_stream: bool,
    uri: Option<String>,
    artwork_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    encoded: String,
    info: ApiTrackInfo,
}

impl ApiTrack {
    fn into_track(self, requester: &Requester) -> Track {
        let info = self.info;
        let mut track = Track::new(info.title, self.encoded, requester.clone()).with_author(info.author);
        if !info.is_stream {
            track = track.with_duration(Duration::from_millis(info.length));
        }
        if let Some(uri) = info.uri {
            track = track.with_uri(uri);
        }
        if let Some(artwork) = info.artwork_url {
            track = track.with_thumbnail(artwork);
        }
        track
    }
}

#[derive(Debug, Deserialize)]
struct ApiPlaylistInfo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiPlaylist {
    info: ApiPlaylistInfo,
    tracks: Vec<ApiTrack>,
}

/// Respuesta de `/v4/loadtracks`, etiquetada por `loadType`.
#[derive(Debug, Deserialize)]
#[serde(tag = "loadType", content = "data", rename_all = "lowercase")]
enum LoadResponse {
    Track(ApiTrack),
    Playlist(ApiPlaylist),
    Search(Vec<ApiTrack>),
    Empty(serde::de::IgnoredAny),
    Error(LoadError),
}

impl LoadResponse {
    fn into_result(self, requester: &Requester) -> SearchResult {
        match self {
            LoadResponse::Track(track) => SearchResult::Track(track.into_track(requester)),
            LoadResponse::Playlist(playlist) => SearchResult::Playlist(Playlist {
                name: playlist.info.name,
                tracks: playlist
                    .tracks
                    .into_iter()
                    .map(|t| t.into_track(requester))
                    .collect(),
            }),
            LoadResponse::Search(tracks) => SearchResult::Search(
                tracks.into_iter().map(|t| t.into_track(requester)).collect(),
            ),
            LoadResponse::Empty(_) => SearchResult::Empty,
            LoadResponse::Error(error) => SearchResult::Error(error),
        }
    }
}

pub struct RestNode {
    config: NodeConfig,
    http: reqwest::Client,
    voice: Arc<Songbird>,
    session_id: RwLock<Option<String>>,
}

impl RestNode {
    pub fn new(config: NodeConfig, voice: Arc<Songbird>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("starlight/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            config,
            http,
            voice,
            session_id: RwLock::new(None),
        })
    }

    fn error(&self, message: impl fmt::Display) -> NodeTransportError {
        NodeTransportError::new(&self.config.identifier, message.to_string())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.config.endpoint(), path))
            .header(header::AUTHORIZATION, &self.config.password)
    }

    fn player_path(&self, guild_id: GuildId) -> Result<String, NodeTransportError> {
        let session = self
            .session_id
            .read()
            .clone()
            .ok_or_else(|| self.error("sesión del nodo no establecida"))?;
        Ok(format!("/v4/sessions/{}/players/{}", session, guild_id))
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, NodeTransportError> {
        let response = request.send().await.map_err(|e| self.error(e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.error(format!("HTTP {}: {}", status, body)));
        }
        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, NodeTransportError> {
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| self.error(format!("respuesta inválida: {}", e)))
    }

    async fn update_player(&self, guild_id: GuildId, body: serde_json::Value) -> Result<(), NodeTransportError> {
        let path = self.player_path(guild_id)?;
        self.send(self.request(Method::PATCH, &path).json(&body)).await?;
        Ok(())
    }
}

#[async_trait]
impl NodeClient for RestNode {
    async fn search(
        &self,
        query: &str,
        source: SearchSource,
        requester: &Requester,
    ) -> Result<SearchResult, NodeTransportError> {
        let identifier = source.identifier_for(query);
        debug!("🔍 loadtracks '{}' en nodo {}", identifier, self.config.identifier);

        let response: LoadResponse = self
            .fetch(
                self.request(Method::GET, "/v4/loadtracks")
                    .query(&[("identifier", identifier.as_str())]),
            )
            .await?;
        Ok(response.into_result(requester))
    }

    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), NodeTransportError> {
        let (connection, _call) = self
            .voice
            .join_gateway(guild_id, channel_id)
            .await
            .map_err(|e| self.error(format!("error al unirse al canal de voz: {:?}", e)))?;

        self.update_player(
            guild_id,
            json!({
                "voice": {
                    "token": connection.token,
                    "endpoint": connection.endpoint,
                    "sessionId": connection.session_id,
                }
            }),
        )
        .await?;

        info!("🔗 Voz de guild {} entregada al nodo {}", guild_id, self.config.identifier);
        Ok(())
    }

    async fn play(&self, guild_id: GuildId, track: &Track) -> Result<(), NodeTransportError> {
        self.update_player(guild_id, json!({ "track": { "encoded": track.encoded() } }))
            .await
    }

    async fn destroy(&self, guild_id: GuildId) -> Result<(), NodeTransportError> {
        if let Err(e) = self.voice.remove(guild_id).await {
            debug!("Sin llamada de voz que cerrar en guild {}: {:?}", guild_id, e);
        }

        let path = self.player_path(guild_id)?;
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn stats(&self) -> Result<NodeStats, NodeTransportError> {
        self.fetch(self.request(Method::GET, "/v4/stats")).await
    }

    fn attach_session(&self, session_id: &str) {
        info!("🎼 Nodo {} con sesión {}", self.config.identifier, session_id);
        *self.session_id.write() = Some(session_id.to_string());
    }

    fn detach_session(&self) {
        if self.session_id.write().take().is_some() {
            info!("🔌 Nodo {} sin sesión", self.config.identifier);
        }
    }

    fn is_ready(&self) -> bool {
        self.session_id.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::requester;
    use pretty_assertions::assert_eq;

    fn parse(payload: &str) -> SearchResult {
        serde_json::from_str::<LoadResponse>(payload)
            .unwrap()
            .into_result(&requester())
    }

    const TRACK: &str = r#"{
        "encoded": "QAAAjQIAJVJpY2s=",
        "info": {
            "identifier": "dQw4w9WgXcQ", "isSeekable": true, "author": "RickAstleyVEVO",
            "length": 212000, "isStream": false, "position": 0,
            "title": "Never Gonna Give You Up", "uri": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "artworkUrl": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg",
            "isrc": null, "sourceName": "youtube"
        },
        "pluginInfo": {}, "userData": {}
    }"#;

    #[test]
    fn test_track_response() {
        let result = parse(&format!(r#"{{"loadType":"track","data":{}}}"#, TRACK));
        let SearchResult::Track(track) = result else {
            panic!("se esperaba un track");
        };
        assert_eq!(track.title(), "Never Gonna Give You Up");
        assert_eq!(track.encoded(), "QAAAjQIAJVJpY2s=");
        assert_eq!(track.duration(), Some(Duration::from_millis(212_000)));
        assert_eq!(track.author(), Some("RickAstleyVEVO"));
        assert_eq!(track.requester(), &requester());
    }

    #[test]
    fn test_search_and_playlist_responses() {
        let search = parse(&format!(r#"{{"loadType":"search","data":[{0},{0}]}}"#, TRACK));
        assert!(matches!(search, SearchResult::Search(ref tracks) if tracks.len() == 2));

        let playlist = parse(&format!(
            r#"{{"loadType":"playlist","data":{{"info":{{"name":"Mix","selectedTrack":-1}},"pluginInfo":{{}},"tracks":[{}]}}}}"#,
            TRACK
        ));
        let SearchResult::Playlist(playlist) = playlist else {
            panic!("se esperaba una playlist");
        };
        assert_eq!(playlist.name, "Mix");
        assert_eq!(playlist.tracks.len(), 1);
    }

    #[test]
    fn test_empty_and_error_responses() {
        assert_eq!(parse(r#"{"loadType":"empty","data":{}}"#), SearchResult::Empty);

        let error = parse(
            r#"{"loadType":"error","data":{"message":"Video unavailable","severity":"common","cause":"FriendlyException"}}"#,
        );
        assert_eq!(
            error,
            SearchResult::Error(LoadError {
                message: Some("Video unavailable".into()),
                severity: "common".into(),
                cause: "FriendlyException".into(),
            })
        );
    }

    #[test]
    fn test_streams_have_no_duration() {
        let live = TRACK.replace(r#""isStream": false"#, r#""isStream": true"#);
        let result = parse(&format!(r#"{{"loadType":"track","data":{}}}"#, live));
        let SearchResult::Track(track) = result else {
            panic!("se esperaba un track");
        };
        assert!(track.is_stream());
    }
}
