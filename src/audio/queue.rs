use std::{collections::VecDeque, str::FromStr, time::Duration};
use tracing::{debug, info};

use crate::{
    audio::track::Track,
    error::{MusicError, MusicResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    #[default]
    Off,
    Track,
    Queue,
}

impl FromStr for RepeatMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" => Ok(RepeatMode::Off),
            "song" | "track" => Ok(RepeatMode::Track),
            "queue" => Ok(RepeatMode::Queue),
            other => anyhow::bail!("Modo de repetición desconocido: {}", other),
        }
    }
}

/// Cola de una sesión: pendientes en orden FIFO más el track actual.
///
/// El track actual nunca está duplicado dentro de los pendientes. La única
/// reordenación es la de [`RepeatMode::Queue`], que devuelve el track
/// terminado al final de la cola.
#[derive(Debug)]
pub struct MusicQueue {
    items: VecDeque<Track>,
    current: Option<Track>,
    max_size: usize,
}

impl MusicQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            current: None,
            max_size,
        }
    }

    /// Agrega un track al final. No toca el track actual.
    pub fn add_track(&mut self, track: Track) -> MusicResult<()> {
        if self.items.len() >= self.max_size {
            return Err(MusicError::QueueFull(self.max_size));
        }

        debug!("➕ Agregado a la cola: {}", track.title());
        self.items.push_back(track);
        Ok(())
    }

    /// Agrega varios tracks (playlist) hasta llenar la cola.
    pub fn add_tracks(&mut self, tracks: impl IntoIterator<Item = Track>) -> usize {
        let available_space = self.max_size.saturating_sub(self.items.len());
        let before = self.items.len();

        self.items.extend(tracks.into_iter().take(available_space));

        let added = self.items.len() - before;
        info!("➕ Agregadas {} canciones a la cola", added);
        added
    }

    /// Mueve la cabeza de la cola a `current`. Con la cola vacía deja
    /// `current` vacío.
    pub fn advance(&mut self) -> Option<&Track> {
        self.current = self.items.pop_front();
        match &self.current {
            Some(track) => debug!("➡️ Siguiente en cola (FIFO): {}", track.title()),
            None => debug!("📭 Cola vacía, no hay siguiente track"),
        }
        self.current.as_ref()
    }

    /// Aplica la regla de fin de track según el modo de repetición.
    pub fn finish_current(&mut self, mode: RepeatMode) -> Option<&Track> {
        match mode {
            RepeatMode::Track if self.current.is_some() => {
                debug!("🔂 Repitiendo track");
                self.current.as_ref()
            }
            RepeatMode::Queue => {
                if let Some(finished) = self.current.take() {
                    debug!("🔁 Track agregado al final por loop de cola: {}", finished.title());
                    self.items.push_back(finished);
                }
                self.advance()
            }
            _ => self.advance(),
        }
    }

    /// Devuelve el track actual al frente de la cola.
    pub fn rewind(&mut self) {
        if let Some(track) = self.current.take() {
            self.items.push_front(track);
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.current = None;
        debug!("🗑️ Cola limpiada");
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    /// Cantidad de tracks pendientes (sin contar el actual).
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.current.is_none()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    pub fn total_duration(&self) -> Duration {
        let pending: Duration = self.items.iter().filter_map(Track::duration).sum();
        pending + self.current.as_ref().and_then(Track::duration).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::Requester;
    use serenity::model::id::UserId;

    fn track(title: &str) -> Track {
        Track::new(title, format!("enc-{title}"), Requester::new(UserId::new(1), "tester"))
            .with_duration(Duration::from_secs(60))
    }

    fn titles(queue: &MusicQueue) -> Vec<String> {
        queue.items.iter().map(|t| t.title().to_string()).collect()
    }

    #[test]
    fn test_advance_on_empty_is_idempotent() {
        let mut queue = MusicQueue::new(10);
        assert!(queue.advance().is_none());
        assert!(queue.advance().is_none());
        assert!(queue.current().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_add_does_not_set_current() {
        let mut queue = MusicQueue::new(10);
        queue.add_track(track("a")).unwrap();
        assert!(queue.current().is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_add_then_advance_moves_to_current() {
        let mut queue = MusicQueue::new(10);
        queue.add_track(track("a")).unwrap();

        assert_eq!(queue.advance().map(Track::title), Some("a"));
        assert_eq!(queue.current().map(Track::title), Some("a"));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = MusicQueue::new(10);
        queue.add_tracks(vec![track("a"), track("b"), track("c")]);

        let played: Vec<String> = std::iter::from_fn(|| queue.advance().map(|t| t.title().to_string()))
            .collect();
        assert_eq!(played, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_repeat_track_replays_current() {
        let mut queue = MusicQueue::new(10);
        queue.add_tracks(vec![track("a"), track("b")]);
        queue.advance();

        assert_eq!(queue.finish_current(RepeatMode::Track).map(Track::title), Some("a"));
        assert_eq!(titles(&queue), vec!["b"]);
    }

    #[test]
    fn test_repeat_queue_cycles_back_to_original_order() {
        let mut queue = MusicQueue::new(10);
        queue.add_tracks(vec![track("a"), track("b"), track("c")]);
        queue.advance();

        let mut order = vec![queue.current().unwrap().title().to_string()];
        for _ in 0..3 {
            let next = queue.finish_current(RepeatMode::Queue).unwrap();
            order.push(next.title().to_string());
        }

        assert_eq!(order, vec!["a", "b", "c", "a"]);
        assert_eq!(titles(&queue), vec!["b", "c"]);
    }

    #[test]
    fn test_repeat_off_drains_queue() {
        let mut queue = MusicQueue::new(10);
        queue.add_track(track("a")).unwrap();
        queue.advance();

        assert!(queue.finish_current(RepeatMode::Off).is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_capacity_limits() {
        let mut queue = MusicQueue::new(2);
        assert_eq!(queue.add_tracks(vec![track("a"), track("b"), track("c")]), 2);
        assert_eq!(queue.add_track(track("d")), Err(MusicError::QueueFull(2)));
    }

    #[test]
    fn test_rewind_restores_head() {
        let mut queue = MusicQueue::new(10);
        queue.add_tracks(vec![track("a"), track("b")]);
        queue.advance();
        queue.rewind();

        assert!(queue.current().is_none());
        assert_eq!(titles(&queue), vec!["a", "b"]);
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut queue = MusicQueue::new(10);
        queue.add_tracks(vec![track("a"), track("b")]);
        queue.advance();
        queue.clear();

        assert!(queue.is_empty());
        assert_eq!(queue.total_duration(), Duration::ZERO);
    }

    #[test]
    fn test_repeat_mode_parsing() {
        assert_eq!("song".parse::<RepeatMode>().unwrap(), RepeatMode::Track);
        assert_eq!("queue".parse::<RepeatMode>().unwrap(), RepeatMode::Queue);
        assert_eq!("OFF".parse::<RepeatMode>().unwrap(), RepeatMode::Off);
        assert!("shuffle".parse::<RepeatMode>().is_err());
    }
}
