// Per-plugin diagnostic queue and the collapse rule used before publishing to the host.
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct LogChannel {
    queue: VecDeque<String>,
}

impl LogChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `message`; blank or whitespace-only messages are dropped.
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        if message.trim().is_empty() {
            return;
        }
        self.queue.push_back(message);
    }

    /// Removes and returns every queued message, oldest first.
    pub fn drain(&mut self) -> Vec<String> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// The native side exposes one message slot, so only the last non-empty message survives.
pub fn last_non_empty<I>(messages: I) -> Option<String>
where
    I: IntoIterator<Item = String>,
{
    messages.into_iter().filter(|message| !message.is_empty()).last()
}

#[cfg(test)]
mod tests {
    use super::{LogChannel, last_non_empty};

    fn owned(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn drain_is_fifo_and_empties_queue() {
        let mut channel = LogChannel::new();
        channel.push("first");
        channel.push("second");
        assert_eq!(channel.len(), 2);
        assert_eq!(channel.drain(), owned(&["first", "second"]));
        assert!(channel.is_empty());
        assert!(channel.drain().is_empty());
    }

    #[test]
    fn blank_messages_are_ignored() {
        let mut channel = LogChannel::new();
        channel.push("");
        channel.push("   ");
        channel.push("\t\n");
        assert!(channel.is_empty());
    }

    #[test]
    fn collapse_keeps_last_non_empty() {
        assert_eq!(
            last_non_empty(owned(&["", "a", "", "b"])),
            Some("b".to_string())
        );
        assert_eq!(last_non_empty(owned(&["a", ""])), Some("a".to_string()));
        assert_eq!(last_non_empty(Vec::new()), None);
        assert_eq!(last_non_empty(owned(&["", ""])), None);
    }
}
