use serde::{Deserialize, Serialize};
use serenity::model::id::UserId;
use std::{fmt, str::FromStr, time::Duration};

/// Usuario que pidió una canción.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub id: UserId,
    pub name: String,
}

impl Requester {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// Track resuelto por un nodo. Inmutable una vez construido.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    title: String,
    encoded: String,
    author: Option<String>,
    uri: Option<String>,
    duration: Option<Duration>,
    thumbnail: Option<String>,
    requester: Requester,
}

impl Track {
    pub fn new(title: impl Into<String>, encoded: impl Into<String>, requester: Requester) -> Self {
        Self {
            title: title.into(),
            encoded: encoded.into(),
            author: None,
            uri: None,
            duration: None,
            thumbnail: None,
            requester,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Handle opaco que el nodo acepta para reproducir el track.
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// `None` para transmisiones en vivo.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    pub fn requester(&self) -> &Requester {
        &self.requester
    }

    pub fn is_stream(&self) -> bool {
        self.duration.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    pub name: String,
    pub tracks: Vec<Track>,
}

impl Playlist {
    pub fn duration(&self) -> Duration {
        self.tracks.iter().filter_map(Track::duration).sum()
    }
}

/// Payload crudo que devuelve el nodo cuando una búsqueda falla.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadError {
    #[serde(default)]
    pub message: Option<String>,
    pub severity: String,
    pub cause: String,
}

/// Resultado de una búsqueda, un único variante por respuesta.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchResult {
    Error(LoadError),
    Empty,
    Track(Track),
    Playlist(Playlist),
    Search(Vec<Track>),
}

impl SearchResult {
    pub fn load_type(&self) -> &'static str {
        match self {
            SearchResult::Error(_) => "error",
            SearchResult::Empty => "empty",
            SearchResult::Track(_) => "track",
            SearchResult::Playlist(_) => "playlist",
            SearchResult::Search(_) => "search",
        }
    }
}

/// Plataforma donde el nodo resuelve búsquedas de texto libre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchSource {
    #[default]
    YouTube,
    YouTubeMusic,
    SoundCloud,
}

impl SearchSource {
    pub fn prefix(self) -> &'static str {
        match self {
            SearchSource::YouTube => "ytsearch",
            SearchSource::YouTubeMusic => "ytmsearch",
            SearchSource::SoundCloud => "scsearch",
        }
    }

    /// Las URLs se envían tal cual; el texto libre lleva el prefijo de búsqueda.
    pub fn identifier_for(self, query: &str) -> String {
        let query = query.trim();
        match url::Url::parse(query) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => query.to_string(),
            _ => format!("{}:{}", self.prefix(), query),
        }
    }
}

impl fmt::Display for SearchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchSource::YouTube => "youtube",
            SearchSource::YouTubeMusic => "youtubemusic",
            SearchSource::SoundCloud => "soundcloud",
        };
        f.write_str(name)
    }
}

impl FromStr for SearchSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "youtube" | "yt" => Ok(SearchSource::YouTube),
            "youtubemusic" | "ytm" => Ok(SearchSource::YouTubeMusic),
            "soundcloud" | "sc" => Ok(SearchSource::SoundCloud),
            other => anyhow::bail!("Fuente de búsqueda desconocida: {}", other),
        }
    }
}
