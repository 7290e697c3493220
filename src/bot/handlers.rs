use anyhow::Result;
use serenity::{
    builder::{CreateAutocompleteResponse, CreateInteractionResponse},
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::time::Instant;
use tracing::{debug, info};

use crate::{
    audio::{
        manager::PlayRequest,
        queue::RepeatMode,
        track::{Requester, SearchSource},
        voice_guard::{ChannelKind, VoiceChannel},
    },
    bot::{notifier::InteractionNotifier, ShardManagerContainer, StarlightBot},
    ui::{
        messages,
        notification::{Notification, Notifier},
    },
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &StarlightBot,
) -> Result<()> {
    let started = Instant::now();
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    // Respuesta diferida: la búsqueda en el nodo puede tardar
    command.defer(&ctx.http).await?;
    let notifier = InteractionNotifier::new(ctx, command);
    let manager = bot.manager();

    match command.data.name.as_str() {
        "play" => handle_play(ctx, command, guild_id, bot, &notifier).await?,
        "loop" => {
            let mode: RepeatMode = string_option(command, "mode").unwrap_or("off").parse()?;
            manager.set_repeat(guild_id, mode, &notifier).await;
        }
        "stop" => manager.stop(guild_id, &notifier).await,
        "node" => manager.node_overview(&notifier).await,
        "ping" => handle_ping(ctx, started, &notifier).await?,
        _ => {
            notifier
                .notify(&Notification::error("❌ Comando no reconocido"))
                .await?;
        }
    }

    Ok(())
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &StarlightBot,
    notifier: &InteractionNotifier<'_>,
) -> Result<()> {
    let query = string_option(command, "search")
        .ok_or_else(|| anyhow::anyhow!("Falta el término de búsqueda"))?
        .to_string();
    let source = string_option(command, "source")
        .map(str::parse::<SearchSource>)
        .transpose()?;
    let (requester_voice, bot_voice) = voice_context(ctx, guild_id, command.user.id);

    let request = PlayRequest {
        guild_id,
        text_channel: command.channel_id,
        requester: Requester::new(command.user.id, command.user.name.clone()),
        requester_voice,
        bot_voice,
        query,
        node: string_option(command, "node").map(String::from),
        source,
    };

    bot.manager().play(request, notifier).await;
    Ok(())
}

async fn handle_ping(ctx: &Context, started: Instant, notifier: &InteractionNotifier<'_>) -> Result<()> {
    let shard_manager = ctx.data.read().await.get::<ShardManagerContainer>().cloned();
    let latency = match shard_manager {
        Some(shard_manager) => shard_manager
            .runners
            .lock()
            .await
            .get(&ctx.shard_id)
            .and_then(|runner| runner.latency),
        None => None,
    };

    let bot_name = ctx.cache.current_user().name.clone();
    let notification = messages::pong(
        &bot_name,
        ctx.shard_id.0,
        latency.map(|l| l.as_millis() as u64),
        started.elapsed().as_millis() as u64,
    );
    notifier.notify(&notification).await
}

/// Maneja el autocompletado de `/play`
pub async fn handle_autocomplete(
    ctx: &Context,
    interaction: &CommandInteraction,
    bot: &StarlightBot,
) -> Result<()> {
    let Some(guild_id) = interaction.guild_id else {
        return Ok(());
    };
    let Some(focused) = interaction.data.autocomplete() else {
        return Ok(());
    };

    let manager = bot.manager();
    let choices = match focused.name {
        "node" => manager.node_choices(focused.value),
        "search" => {
            let requester = Requester::new(interaction.user.id, interaction.user.name.clone());
            manager
                .search_choices(guild_id, focused.value, &requester)
                .await
        }
        other => {
            debug!("Autocompletado sin manejar para opción {}", other);
            Vec::new()
        }
    };

    let response = choices
        .into_iter()
        .fold(CreateAutocompleteResponse::new(), |response, (name, value)| {
            response.add_string_choice(name, value)
        });
    interaction
        .create_response(&ctx.http, CreateInteractionResponse::Autocomplete(response))
        .await?;

    Ok(())
}

// Funciones auxiliares

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|option| option.name == name)
        .and_then(|option| option.value.as_str())
}

/// Canal de voz del usuario (con su tipo) y canal actual del bot, según la
/// caché del servidor.
fn voice_context(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
) -> (Option<VoiceChannel>, Option<ChannelId>) {
    let bot_id = ctx.cache.current_user().id;
    let Some(guild) = guild_id.to_guild_cached(&ctx.cache) else {
        return (None, None);
    };

    let requester = guild
        .voice_states
        .get(&user_id)
        .and_then(|state| state.channel_id)
        .map(|channel_id| {
            let kind = guild
                .channels
                .get(&channel_id)
                .map(|channel| ChannelKind::from(channel.kind))
                .unwrap_or(ChannelKind::Other);
            VoiceChannel::new(channel_id, kind)
        });
    let bot = guild
        .voice_states
        .get(&bot_id)
        .and_then(|state| state.channel_id);

    (requester, bot)
}
