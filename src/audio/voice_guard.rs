use serenity::model::{channel::ChannelType, id::ChannelId};

use crate::error::{MusicError, MusicResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Voice,
    Stage,
    Text,
    Category,
    Other,
}

impl ChannelKind {
    pub fn is_voice_capable(self) -> bool {
        matches!(self, ChannelKind::Voice | ChannelKind::Stage)
    }
}

impl From<ChannelType> for ChannelKind {
    fn from(kind: ChannelType) -> Self {
        match kind {
            ChannelType::Voice => ChannelKind::Voice,
            ChannelType::Stage => ChannelKind::Stage,
            ChannelType::Text | ChannelType::News => ChannelKind::Text,
            ChannelType::Category => ChannelKind::Category,
            _ => ChannelKind::Other,
        }
    }
}

/// Canal en el que está un usuario según el estado de voz del servidor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceChannel {
    pub id: ChannelId,
    pub kind: ChannelKind,
}

impl VoiceChannel {
    pub fn new(id: ChannelId, kind: ChannelKind) -> Self {
        Self { id, kind }
    }
}

/// Validaciones de canal previas a cualquier operación de reproducción.
pub struct VoiceGuard;

impl VoiceGuard {
    pub fn validate_requester_channel(channel: Option<&VoiceChannel>) -> MusicResult<ChannelId> {
        match channel {
            Some(channel) if channel.kind.is_voice_capable() => Ok(channel.id),
            _ => Err(MusicError::NotInVoiceChannel),
        }
    }

    /// El bot puede no estar en ningún canal; si está en uno, debe ser el del
    /// usuario.
    pub fn validate_bot_channel(bot: Option<ChannelId>, requester: ChannelId) -> MusicResult<()> {
        match bot {
            Some(bot) if bot != requester => Err(MusicError::ChannelMismatch { bot, requester }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requester_must_be_in_voice() {
        assert_eq!(
            VoiceGuard::validate_requester_channel(None),
            Err(MusicError::NotInVoiceChannel)
        );

        let text = VoiceChannel::new(ChannelId::new(5), ChannelKind::Text);
        assert_eq!(
            VoiceGuard::validate_requester_channel(Some(&text)),
            Err(MusicError::NotInVoiceChannel)
        );

        let stage = VoiceChannel::new(ChannelId::new(6), ChannelKind::Stage);
        assert_eq!(
            VoiceGuard::validate_requester_channel(Some(&stage)),
            Ok(ChannelId::new(6))
        );
    }

    #[test]
    fn test_bot_channel_must_match() {
        let requester = ChannelId::new(10);
        assert_eq!(VoiceGuard::validate_bot_channel(None, requester), Ok(()));
        assert_eq!(VoiceGuard::validate_bot_channel(Some(requester), requester), Ok(()));
        assert_eq!(
            VoiceGuard::validate_bot_channel(Some(ChannelId::new(11)), requester),
            Err(MusicError::ChannelMismatch {
                bot: ChannelId::new(11),
                requester
            })
        );
    }

    #[test]
    fn test_channel_type_mapping() {
        assert_eq!(ChannelKind::from(ChannelType::Voice), ChannelKind::Voice);
        assert_eq!(ChannelKind::from(ChannelType::Stage), ChannelKind::Stage);
        assert!(!ChannelKind::from(ChannelType::Forum).is_voice_capable());
    }
}
