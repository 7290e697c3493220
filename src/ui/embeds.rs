use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::ui::notification::{Notification, NotificationKind};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

/// Footer estandarizado para todos los embeds
pub const STANDARD_FOOTER: &str = "🎵 Starlight";

pub fn footer_text(notification: &Notification) -> String {
    match &notification.footer_node_id {
        Some(node) => format!("Node: {}", node),
        None => STANDARD_FOOTER.to_string(),
    }
}

/// Convierte una notificación en un embed de Discord
pub fn create_notification_embed(notification: &Notification) -> CreateEmbed {
    let color = match notification.kind {
        NotificationKind::Error => colors::ERROR_RED,
        NotificationKind::Info if notification.footer_node_id.is_some() => colors::MUSIC_PURPLE,
        NotificationKind::Info => colors::SUCCESS_GREEN,
    };

    let mut embed = CreateEmbed::default()
        .color(color)
        .footer(CreateEmbedFooter::new(footer_text(notification)))
        .timestamp(Timestamp::now());

    if !notification.title.is_empty() {
        embed = embed.title(&notification.title);
    }
    if !notification.description.is_empty() {
        embed = embed.description(&notification.description);
    }
    if let Some(url) = &notification.thumbnail {
        embed = embed.thumbnail(url);
    }

    notification.fields.iter().fold(embed, |embed, field| {
        embed.field(&field.name, &field.value, field.inline)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footer_names_serving_node() {
        let notification = Notification::info("x").footer_node("A");
        assert_eq!(footer_text(&notification), "Node: A");
        assert_eq!(footer_text(&Notification::error("y")), STANDARD_FOOTER);
    }
}
