//! Best-effort fan-out of one message to many clients

use crate::client::handle::{ClientHandle, Delivery};
use crate::types::ServerMessage;
use std::sync::Arc;

/// Per-broadcast delivery counts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub dropped: usize,
}

impl DeliveryReport {
    pub fn record(&mut self, delivery: Delivery) {
        if delivery.is_delivered() {
            self.delivered += 1;
        } else {
            self.dropped += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.delivered + self.dropped
    }
}

/// Deliver `message` to every recipient independently
///
/// The message is allocated once and shared. A failed delivery to one
/// recipient does not affect the others.
pub fn fan_out<'a, I>(recipients: I, message: ServerMessage) -> DeliveryReport
where
    I: IntoIterator<Item = &'a Arc<ClientHandle>>,
{
    let message = Arc::new(message);
    let mut report = DeliveryReport::default();
    for client in recipients {
        report.record(client.send(message.clone()));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatMessage, ServerEvent, SteamId};
    use crate::utils::current_timestamp;

    fn chat(text: &str) -> ServerMessage {
        ServerMessage::ok(ServerEvent::UserMessage(ChatMessage {
            steam_id: SteamId::new(1),
            name: "alice".to_string(),
            message: text.to_string(),
            created_at: current_timestamp(),
        }))
    }

    #[test]
    fn test_fan_out_reaches_every_recipient() {
        let (a, mut rx_a) = ClientHandle::new(SteamId::new(1), "alice", 4);
        let (b, mut rx_b) = ClientHandle::new(SteamId::new(2), "bob", 4);

        let report = fan_out([&a, &b], chat("hello"));
        assert_eq!(report, DeliveryReport { delivered: 2, dropped: 0 });

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn test_one_dead_recipient_does_not_block_others() {
        let (a, rx_a) = ClientHandle::new(SteamId::new(1), "alice", 4);
        let (b, mut rx_b) = ClientHandle::new(SteamId::new(2), "bob", 4);
        let (c, mut rx_c) = ClientHandle::new(SteamId::new(3), "carol", 4);
        drop(rx_a);

        let report = fan_out([&a, &b, &c], chat("still here"));
        assert_eq!(report.delivered, 2);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.total(), 3);

        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_ok());
    }
}
