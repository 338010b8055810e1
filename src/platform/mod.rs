pub mod slack;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A real-time event delivered by the chat platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Event type, e.g. "message"
    pub event_type: String,
    pub text: String,
    /// Conversation identifier the event was posted in
    pub channel: String,
    /// Author identifier
    pub user: String,
}

impl InboundEvent {
    #[cfg(test)]
    pub fn message(channel: &str, user: &str, text: &str) -> Self {
        Self {
            event_type: "message".to_string(),
            text: text.to_string(),
            channel: channel.to_string(),
            user: user.to_string(),
        }
    }
}

/// Capabilities the bot needs from a chat platform.
/// The bot composes an implementation of this rather than extending platform types.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// The bot's own user identifier on the platform
    fn self_identity(&self) -> &str;

    /// Map a channel identifier to its display name
    async fn resolve_channel_name(&self, channel_id: &str) -> Result<Option<String>>;

    /// Channel used for unsolicited messages (the welcome greeting)
    async fn default_channel(&self) -> Result<Option<String>>;

    /// Post `text` to the channel with the given name. `as_user` asks the
    /// platform to present the message as authored by the bot identity.
    async fn post_message(&self, channel_name: &str, text: &str, as_user: bool) -> Result<()>;

    /// Start receiving events. Events arrive in platform order.
    async fn subscribe(&self) -> Result<mpsc::Receiver<InboundEvent>>;
}
