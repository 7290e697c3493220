use async_trait::async_trait;
use serenity::{
    builder::{CreateMessage, EditInteractionResponse},
    http::Http,
    model::{application::CommandInteraction, id::ChannelId},
    prelude::Context,
};
use std::sync::Arc;

use crate::ui::{
    embeds::create_notification_embed,
    notification::{ChannelNotifier, Notification, Notifier},
};

/// Responde editando la respuesta diferida de un comando.
pub struct InteractionNotifier<'a> {
    ctx: &'a Context,
    command: &'a CommandInteraction,
}

impl<'a> InteractionNotifier<'a> {
    pub fn new(ctx: &'a Context, command: &'a CommandInteraction) -> Self {
        Self { ctx, command }
    }
}

#[async_trait]
impl Notifier for InteractionNotifier<'_> {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.command
            .edit_response(
                &self.ctx.http,
                EditInteractionResponse::new().embed(create_notification_embed(notification)),
            )
            .await?;
        Ok(())
    }
}

/// Publica avisos en canales de texto, fuera de cualquier comando.
pub struct ChannelAnnouncer {
    http: Arc<Http>,
}

impl ChannelAnnouncer {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChannelNotifier for ChannelAnnouncer {
    async fn notify_channel(&self, channel: ChannelId, notification: &Notification) -> anyhow::Result<()> {
        channel
            .send_message(
                self.http.as_ref(),
                CreateMessage::new().embed(create_notification_embed(notification)),
            )
            .await?;
        Ok(())
    }
}
