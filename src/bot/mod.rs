//! # Bot Module
//!
//! Discord glue for the playback core: slash command registration,
//! interaction routing, voice state tracking and notification delivery.
//!
//! The bot is built around [`StarlightBot`], which implements Serenity's
//! [`EventHandler`] trait and forwards every request to the shared
//! [`PlaybackManager`].

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, ShardManager, VoiceState},
    async_trait,
    prelude::TypeMapKey,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;
pub mod notifier;

use crate::{audio::manager::PlaybackManager, config::Config};

/// Acceso al shard manager desde los comandos, para medir latencia.
pub struct ShardManagerContainer;

impl TypeMapKey for ShardManagerContainer {
    type Value = Arc<ShardManager>;
}

pub struct StarlightBot {
    config: Arc<Config>,
    manager: Arc<PlaybackManager>,
}

impl StarlightBot {
    pub fn new(config: Arc<Config>, manager: Arc<PlaybackManager>) -> Self {
        Self { config, manager }
    }

    pub fn manager(&self) -> &PlaybackManager {
        &self.manager
    }

    /// Registers slash commands with Discord.
    ///
    /// Commands go to a single guild when `GUILD_ID` is set (fast propagation,
    /// useful for development) and globally otherwise.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await?;
            }
        }

        info!("✅ Comandos registrados");
        Ok(())
    }
}

#[async_trait]
impl EventHandler for StarlightBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => {
                if let Err(e) = handlers::handle_command(&ctx, &command, self).await {
                    error!("Error manejando comando: {:?}", e);
                }
            }
            Interaction::Autocomplete(autocomplete) => {
                if let Err(e) = handlers::handle_autocomplete(&ctx, &autocomplete, self).await {
                    warn!("Error en autocompletado: {:?}", e);
                }
            }
            _ => {}
        }
    }

    /// Cuando el bot sale del canal de voz (kick, desconexión manual) la sesión
    /// de ese servidor se destruye.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            info!("🔌 Bot desconectado en guild {}", guild_id);
            self.manager.voice_disconnected(guild_id).await;
        }
    }
}
