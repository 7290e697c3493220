use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

pub fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        loop_command(),
        stop_command(),
        node_command(),
        ping_command(),
    ]
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce una canción o playlist")
        .dm_permission(false)
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "search",
                "URL o término de búsqueda",
            )
            .required(true)
            .set_autocomplete(true),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "node", "Nodo de audio preferido")
                .set_autocomplete(true),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "source", "Fuente de búsqueda")
                .add_string_choice("YouTube", "youtube")
                .add_string_choice("YouTube Music", "youtubemusic")
                .add_string_choice("SoundCloud", "soundcloud"),
        )
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop")
        .description("Cambia el modo de repetición")
        .dm_permission(false)
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "mode", "Modo de repetición")
                .add_string_choice("Canción", "song")
                .add_string_choice("Cola", "queue")
                .add_string_choice("Desactivado", "off")
                .required(true),
        )
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop")
        .description("Detiene la música y limpia la cola")
        .dm_permission(false)
}

// Comandos de información

fn node_command() -> CreateCommand {
    CreateCommand::new("node").description("Muestra el estado de los nodos de audio")
}

fn ping_command() -> CreateCommand {
    CreateCommand::new("ping").description("Muestra la latencia con Discord")
}
