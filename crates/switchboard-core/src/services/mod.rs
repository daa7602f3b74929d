//! Ready-made services.
//!
//! Each service wraps an [`RpcClient`](crate::rpc::RpcClient), exposes its
//! server commands as typed methods and through [`RpcService::invoke`], and
//! reports notifications to an [`EventSink`](crate::events::EventSink) as a
//! typed event enum.
//!
//! | Service | Commands | Events |
//! |---|---|---|
//! | [`PubSub`] | publish, subscribe, unsubscribe | [`PubSubEvent`] |
//! | [`Messaging`] | registerParticipant, unregisterParticipant, listParticipants, send | [`MessagingEvent`] |
//! | [`Chat`] | join, leave, send, read | [`ChatEvent`] |
//! | [`DataSync`] | acquireSubscription, cancelSubscription | [`DataSyncEvent`] |
//! | [`Cursors`] | join, leave, createCursor, updateCursor, removeCursor | [`CursorEvent`] |
//! | [`GenericService`] | any | [`GenericEvent`] |
//!
//! [`RpcService::invoke`]: crate::rpc::RpcService::invoke

mod chat;
pub mod cursors;
mod datasync;
mod generic;
mod messaging;
mod pubsub;

pub use chat::{Chat, ChatEvent, ChatMessage, Presence, ReadReceipt};
pub use cursors::{CursorEvent, Cursors};
pub use datasync::{DataSync, DataSyncEvent};
pub use generic::{GenericEvent, GenericService};
pub use messaging::{Messaging, MessagingEvent, ParticipantMessage};
pub use pubsub::{PubSub, PubSubEvent, PublishedMessage};

use crate::rpc::protocol::notification_type;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

/// A service's notification shapes, with a catch-all for unknown types.
pub(crate) trait Notification: DeserializeOwned {
    fn is_unrecognized(&self) -> bool;
}

/// Parse a notification payload.
///
/// Unknown types and malformed payloads are logged and yield `None`.
pub(crate) fn classify<N: Notification>(service: &str, message: Value) -> Option<N> {
    let kind = notification_type(&message).unwrap_or("<none>").to_string();
    match serde_json::from_value::<N>(message) {
        Ok(notification) if notification.is_unrecognized() => {
            warn!("Unknown message type \"{}\" in service \"{}\"", kind, service);
            None
        }
        Ok(notification) => Some(notification),
        Err(e) => {
            warn!(
                "Malformed \"{}\" notification in service \"{}\": {}",
                kind, service, e
            );
            None
        }
    }
}
