//! Connected client sessions and lobby-wide fan-out
//!
//! A [`ClientHandle`] is handed to the core by the transport layer once the
//! user's identity has been verified. Outbound messages are pushed onto a
//! bounded per-client queue that the transport drains.

pub mod broadcast;
pub mod handle;

pub use broadcast::{fan_out, DeliveryReport};
pub use handle::{ClientHandle, Delivery, OutboundReceiver, OutboundSender};
