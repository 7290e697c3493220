use anyhow::{Context, Result};
use futures::future::join_all;
use serenity::{
    model::{gateway::GatewayIntents, id::UserId},
    Client,
};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod ui;

#[cfg(test)]
mod testing;

use crate::audio::{
    health,
    manager::{PlaybackManager, PlaybackSettings},
    node::NodePool,
    rest::RestNode,
    socket,
};
use crate::bot::{notifier::ChannelAnnouncer, ShardManagerContainer, StarlightBot};
use crate::config::Config;
use crate::ui::notification::ChannelNotifier;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("starlight=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Starlight v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    // Songbird solo negocia la voz; el audio lo transmiten los nodos
    let songbird = Songbird::serenity();

    let nodes = Arc::new(NodePool::new());
    for node in &config.nodes {
        let client = RestNode::new(node.clone(), Arc::clone(&songbird), config.node_request_timeout)
            .with_context(|| format!("No se pudo crear el cliente del nodo {}", node.identifier))?;
        nodes.register(node.clone(), Arc::new(client));
    }

    let manager = Arc::new(PlaybackManager::new(
        Arc::clone(&nodes),
        PlaybackSettings::from(config.as_ref()),
    ));

    // Eventos de nodos: monitor de salud y transporte de eventos
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();
    let monitor = health::spawn_monitor(
        Arc::clone(&nodes),
        events_tx.clone(),
        config.node_health_interval,
        shutdown.clone(),
    );
    let sockets: Vec<_> = config
        .nodes
        .iter()
        .map(|node| {
            socket::spawn_event_socket(
                node.clone(),
                UserId::new(config.application_id),
                events_tx.clone(),
                shutdown.clone(),
            )
        })
        .collect();
    drop(events_tx);

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let handler = StarlightBot::new(Arc::clone(&config), Arc::clone(&manager));
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await
        .context("Error al construir el cliente de Discord")?;

    client
        .data
        .write()
        .await
        .insert::<ShardManagerContainer>(Arc::clone(&client.shard_manager));

    let pump = {
        let manager = Arc::clone(&manager);
        let announcer: Arc<dyn ChannelNotifier> =
            Arc::new(ChannelAnnouncer::new(Arc::clone(&client.http)));
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = events_rx.recv() => match event {
                        // La pérdida de un nodo se atiende en su propia tarea
                        Some(event) => {
                            manager.handle_node_event(event, &announcer);
                        }
                        None => break,
                    },
                }
            }
        })
    };

    // Manejar shutdown graceful
    {
        let shard_manager = Arc::clone(&client.shard_manager);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Error al registrar Ctrl+C: {:?}", e);
                return;
            }
            info!("⚠️ Señal de shutdown recibida, cerrando...");
            shutdown.cancel();
            shard_manager.shutdown_all().await;
        });
    }

    // Iniciar bot
    info!("🚀 Bot iniciado con {} nodos", nodes.len());
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    shutdown.cancel();
    let _ = tokio::join!(monitor, pump, join_all(sockets));
    info!("👋 Starlight detenido");

    Ok(())
}
