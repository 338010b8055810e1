use crate::platform::InboundEvent;

/// Public channel identifiers start with this marker; DMs ("D") and
/// private groups ("G") do not.
const CHANNEL_PREFIX: char = 'C';

/// Decides whether an inbound event is a channel mention addressed to the bot
#[derive(Debug, Clone)]
pub struct MessageFilter {
    invocation_name: String,
    self_id: String,
}

impl MessageFilter {
    pub fn new(invocation_name: &str, self_id: &str) -> Self {
        Self {
            invocation_name: invocation_name.to_lowercase(),
            self_id: self_id.to_string(),
        }
    }

    pub fn accept(&self, event: &InboundEvent) -> bool {
        self.is_chat_message(event)
            && is_channel_conversation(event)
            && !self.is_from_self(event)
            && self.is_mentioning_bot(event)
    }

    fn is_chat_message(&self, event: &InboundEvent) -> bool {
        event.event_type == "message" && !event.text.is_empty()
    }

    fn is_from_self(&self, event: &InboundEvent) -> bool {
        event.user == self.self_id
    }

    fn is_mentioning_bot(&self, event: &InboundEvent) -> bool {
        event.text.to_lowercase().contains(&self.invocation_name)
    }
}

fn is_channel_conversation(event: &InboundEvent) -> bool {
    event.channel.starts_with(CHANNEL_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> MessageFilter {
        MessageFilter::new("trainbot", "UBOT")
    }

    #[test]
    fn test_accepts_channel_mention() {
        let event = InboundEvent::message("C123", "U1", "trainbot, Central, North");
        assert!(filter().accept(&event));
    }

    #[test]
    fn test_mention_is_case_insensitive() {
        let event = InboundEvent::message("C123", "U1", "Hey TrainBot, help");
        assert!(filter().accept(&event));
    }

    #[test]
    fn test_configured_name_is_lowercased() {
        let filter = MessageFilter::new("ChooChoo", "UBOT");
        assert!(filter.accept(&InboundEvent::message("C1", "U1", "choochoo, help")));
        assert!(!filter.accept(&InboundEvent::message("C1", "U1", "trainbot, help")));
    }

    #[test]
    fn test_rejects_non_message_events() {
        let mut event = InboundEvent::message("C123", "U1", "trainbot");
        event.event_type = "user_typing".to_string();
        assert!(!filter().accept(&event));
    }

    #[test]
    fn test_rejects_empty_text() {
        let event = InboundEvent::message("C123", "U1", "");
        assert!(!filter().accept(&event));
    }

    #[test]
    fn test_rejects_direct_and_group_conversations() {
        assert!(!filter().accept(&InboundEvent::message("D123", "U1", "trainbot")));
        assert!(!filter().accept(&InboundEvent::message("G123", "U1", "trainbot")));
        assert!(!filter().accept(&InboundEvent::message("", "U1", "trainbot")));
    }

    #[test]
    fn test_rejects_own_messages() {
        let event = InboundEvent::message("C123", "UBOT", "trainbot usage: ...");
        assert!(!filter().accept(&event));
    }

    #[test]
    fn test_rejects_messages_without_mention() {
        let event = InboundEvent::message("C123", "U1", "anyone know when the train leaves?");
        assert!(!filter().accept(&event));
    }
}
