pub mod embeds;
pub mod format;
pub mod messages;
pub mod notification;
