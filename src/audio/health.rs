//! Periodic node health polling.
//!
//! A node that answers `stats()` is reported connected together with its
//! metrics; one that fails is reported disconnected. The manager only acts on
//! actual transitions, so repeating the same report is harmless.

use futures::future::join_all;
use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audio::node::{NodeEvent, NodePool};

/// Consulta todos los nodos una vez y devuelve los eventos resultantes.
pub async fn poll_once(nodes: &NodePool) -> Vec<NodeEvent> {
    let targets: Vec<_> = nodes
        .snapshots()
        .into_iter()
        .filter_map(|snapshot| {
            nodes
                .client(&snapshot.identifier)
                .map(|client| (snapshot.identifier, client))
        })
        .collect();

    let polls = targets.into_iter().map(|(id, client)| async move {
        match client.stats().await {
            Ok(stats) => vec![
                NodeEvent::Connected { node: id.clone() },
                NodeEvent::Stats { node: id, stats },
            ],
            Err(e) => {
                warn!("⚠️ Nodo {} no responde: {}", id, e);
                vec![NodeEvent::Disconnected { node: id }]
            }
        }
    });

    join_all(polls).await.into_iter().flatten().collect()
}

pub fn spawn_monitor(
    nodes: Arc<NodePool>,
    events: mpsc::UnboundedSender<NodeEvent>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("🩺 Monitor de nodos cada {}", humantime::format_duration(interval));
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    for event in poll_once(&nodes).await {
                        if events.send(event).is_err() {
                            debug!("Canal de eventos de nodos cerrado");
                            return;
                        }
                    }
                }
            }
        }

        debug!("Monitor de nodos detenido");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::node::NodeStats,
        error::NodeTransportError,
        testing::{node_config, FakeNode},
    };

    #[tokio::test]
    async fn test_poll_reports_each_node() {
        let pool = NodePool::new();
        let healthy = Arc::new(FakeNode::new("A"));
        healthy.set_stats(Ok(NodeStats {
            players: 2,
            ..NodeStats::default()
        }));
        let broken = Arc::new(FakeNode::new("B"));
        broken.set_stats(Err(NodeTransportError::new("B", "connection refused")));
        pool.register(node_config("A"), healthy);
        pool.register(node_config("B"), broken);

        let events = poll_once(&pool).await;

        assert_eq!(
            events,
            vec![
                NodeEvent::Connected { node: "A".into() },
                NodeEvent::Stats {
                    node: "A".into(),
                    stats: NodeStats {
                        players: 2,
                        ..NodeStats::default()
                    },
                },
                NodeEvent::Disconnected { node: "B".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_monitor_stops_on_shutdown() {
        let pool = Arc::new(NodePool::new());
        pool.register(node_config("A"), Arc::new(FakeNode::new("A")));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let handle = spawn_monitor(pool, tx, Duration::from_millis(10), shutdown.clone());
        let first = rx.recv().await;
        assert_eq!(first, Some(NodeEvent::Connected { node: "A".into() }));

        shutdown.cancel();
        handle.await.unwrap();
    }
}
