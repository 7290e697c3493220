use async_trait::async_trait;
use serde::Serialize;
use serenity::model::id::ChannelId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Mensaje para el usuario, independiente de la plataforma de chat.
///
/// `footer_node_id` lleva el nodo que realmente atendió la petición.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub description: String,
    pub fields: Vec<NotificationField>,
    pub footer_node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl Notification {
    fn new(kind: NotificationKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            description: String::new(),
            fields: Vec::new(),
            footer_node_id: None,
            thumbnail: None,
        }
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, title)
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, title)
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(NotificationField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn footer_node(mut self, node_id: impl Into<String>) -> Self {
        self.footer_node_id = Some(node_id.into());
        self
    }

    pub fn thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail = Some(url.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.kind == NotificationKind::Error
    }

    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

/// Respuesta a la petición que originó la operación.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Envío a un canal de texto, para avisos que no responden a una petición.
#[async_trait]
pub trait ChannelNotifier: Send + Sync {
    async fn notify_channel(&self, channel: ChannelId, notification: &Notification) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_payload_shape() {
        let notification = Notification::info("Canción agregada")
            .description("**lofi**")
            .field("Duración", "3m", true)
            .footer_node("A");

        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "kind": "info",
                "title": "Canción agregada",
                "description": "**lofi**",
                "fields": [{"name": "Duración", "value": "3m", "inline": true}],
                "footerNodeId": "A"
            })
        );

        let with_art = notification.thumbnail("https://img/lofi.jpg");
        let json = serde_json::to_value(&with_art).unwrap();
        assert_eq!(json["thumbnail"], "https://img/lofi.jpg");
    }
}
