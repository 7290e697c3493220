//! Fakes compartidos por los tests de los distintos módulos.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use crate::{
    audio::{
        node::{EndReason, NodeClient, NodeConfig, NodeStats, TrackEvent},
        track::{Requester, SearchResult, SearchSource, Track},
    },
    error::NodeTransportError,
    ui::notification::{ChannelNotifier, Notification, Notifier},
};

pub fn requester() -> Requester {
    Requester::new(UserId::new(42), "tester")
}

pub fn track(title: &str, millis: u64) -> Track {
    Track::new(title, format!("enc-{title}"), requester())
        .with_author("Lofi Girl")
        .with_duration(Duration::from_millis(millis))
        .with_thumbnail(format!("https://img.example/{title}.jpg"))
}

pub fn node_config(id: &str) -> NodeConfig {
    NodeConfig {
        identifier: id.to_string(),
        host: "localhost".into(),
        port: 2333,
        password: "youshallnotpass".into(),
        secure: false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeCall {
    Search(String),
    Connect(GuildId, ChannelId),
    Play(GuildId, String),
    Destroy(GuildId),
}

/// Nodo en memoria con respuestas configurables que registra cada llamada.
pub struct FakeNode {
    id: String,
    search_result: Mutex<Result<SearchResult, NodeTransportError>>,
    stats: Mutex<Result<NodeStats, NodeTransportError>>,
    fail_connect: AtomicBool,
    fail_play: AtomicBool,
    ready: AtomicBool,
    connect_delay: Mutex<Option<Duration>>,
    search_delay: Mutex<Option<Duration>>,
    search_by_query: Mutex<HashMap<String, SearchResult>>,
    calls: Mutex<Vec<NodeCall>>,
    session: Mutex<Option<String>>,
}

impl FakeNode {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            search_result: Mutex::new(Ok(SearchResult::Empty)),
            stats: Mutex::new(Ok(NodeStats::default())),
            fail_connect: AtomicBool::new(false),
            fail_play: AtomicBool::new(false),
            ready: AtomicBool::new(true),
            connect_delay: Mutex::new(None),
            search_delay: Mutex::new(None),
            search_by_query: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            session: Mutex::new(None),
        }
    }

    pub fn finished(title: &str) -> TrackEvent {
        TrackEvent::End {
            encoded: format!("enc-{title}"),
            reason: EndReason::Finished,
        }
    }

    pub fn set_search(&self, result: SearchResult) {
        *self.search_result.lock() = Ok(result);
    }

    /// Respuesta para una consulta concreta; el resto usa la general.
    pub fn set_search_for(&self, query: &str, result: SearchResult) {
        self.search_by_query.lock().insert(query.to_string(), result);
    }

    pub fn fail_search(&self, message: &str) {
        *self.search_result.lock() = Err(NodeTransportError::new(&self.id, message));
    }

    pub fn set_stats(&self, stats: Result<NodeStats, NodeTransportError>) {
        *self.stats.lock() = stats;
    }

    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn fail_play(&self, fail: bool) {
        self.fail_play.store(fail, Ordering::SeqCst);
    }

    pub fn delay_connect(&self, delay: Duration) {
        *self.connect_delay.lock() = Some(delay);
    }

    pub fn delay_search(&self, delay: Duration) {
        *self.search_delay.lock() = Some(delay);
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<NodeCall> {
        self.calls.lock().clone()
    }

    pub fn played(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                NodeCall::Play(_, title) => Some(title.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn session(&self) -> Option<String> {
        self.session.lock().clone()
    }
}

#[async_trait]
impl NodeClient for FakeNode {
    async fn search(
        &self,
        query: &str,
        _source: SearchSource,
        _requester: &Requester,
    ) -> Result<SearchResult, NodeTransportError> {
        self.calls.lock().push(NodeCall::Search(query.to_string()));
        let delay = *self.search_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(result) = self.search_by_query.lock().get(query) {
            return Ok(result.clone());
        }
        self.search_result.lock().clone()
    }

    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), NodeTransportError> {
        self.calls.lock().push(NodeCall::Connect(guild_id, channel_id));
        let delay = *self.connect_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(NodeTransportError::new(&self.id, "voice handshake failed"));
        }
        Ok(())
    }

    async fn play(&self, guild_id: GuildId, track: &Track) -> Result<(), NodeTransportError> {
        self.calls
            .lock()
            .push(NodeCall::Play(guild_id, track.title().to_string()));
        if self.fail_play.load(Ordering::SeqCst) {
            return Err(NodeTransportError::new(&self.id, "player update rejected"));
        }
        Ok(())
    }

    async fn destroy(&self, guild_id: GuildId) -> Result<(), NodeTransportError> {
        self.calls.lock().push(NodeCall::Destroy(guild_id));
        Ok(())
    }

    async fn stats(&self) -> Result<NodeStats, NodeTransportError> {
        self.stats.lock().clone()
    }

    fn attach_session(&self, session_id: &str) {
        *self.session.lock() = Some(session_id.to_string());
        self.ready.store(true, Ordering::SeqCst);
    }

    fn detach_session(&self) {
        *self.session.lock() = None;
        self.ready.store(false, Ordering::SeqCst);
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Notificador que guarda todo lo que se le envía.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Option<ChannelId>, Notification)>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.fail.store(true, Ordering::SeqCst);
        notifier
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().iter().map(|(_, n)| n.clone()).collect()
    }

    pub fn sent_to(&self, channel: ChannelId) -> Vec<Notification> {
        self.sent
            .lock()
            .iter()
            .filter(|(target, _)| *target == Some(channel))
            .map(|(_, n)| n.clone())
            .collect()
    }

    fn record(&self, target: Option<ChannelId>, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().push((target, notification.clone()));
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("Missing Access");
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.record(None, notification)
    }
}

#[async_trait]
impl ChannelNotifier for RecordingNotifier {
    async fn notify_channel(&self, channel: ChannelId, notification: &Notification) -> anyhow::Result<()> {
        self.record(Some(channel), notification)
    }
}
