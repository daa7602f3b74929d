//! Multi-user chat channels with presence and read receipts.

use super::{classify, Notification};
use crate::events::{BoxedSink, EventSink, NullSink};
use crate::rpc::{CallFuture, RpcClient, RpcMethods, RpcService};
use crate::service::{Service, ServiceChannel};
use crate::{Result, SwitchboardError};
use serde::Deserialize;
use serde_json::{json, Value};

/// A message posted to a joined channel. Identities and channels are
/// arbitrary values chosen by the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatMessage {
    pub from: Value,
    pub channel: Value,
    pub body: Value,
    pub timestamp: String,
}

/// A member joined or left a channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Presence {
    pub from: Value,
    pub channel: Value,
    /// `"joined"` or `"left"`.
    pub status: String,
    pub timestamp: String,
}

/// Another session of the same identity marked the channel as read.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadReceipt {
    pub channel: Value,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Message(ChatMessage),
    Presence(Presence),
    Read(ReadReceipt),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ChatNotification {
    Message(ChatMessage),
    Presence(Presence),
    Read(ReadReceipt),
    #[serde(other)]
    Unrecognized,
}

impl Notification for ChatNotification {
    fn is_unrecognized(&self) -> bool {
        matches!(self, ChatNotification::Unrecognized)
    }
}

pub struct Chat {
    rpc: RpcClient,
    methods: RpcMethods,
    events: BoxedSink<ChatEvent>,
}

impl Chat {
    pub fn new(channel: ServiceChannel) -> Result<Self> {
        Self::with_events(channel, NullSink)
    }

    pub fn with_events(channel: ServiceChannel, events: impl EventSink<ChatEvent> + 'static) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::new(channel),
            methods: RpcMethods::with(&[
                ("join", "join"),
                ("leave", "leave"),
                ("send", "send"),
                ("read", "read"),
            ])?,
            events: Box::new(events),
        })
    }

    /// Join a channel. Resolves with the identities already present.
    pub fn join(&self, channel: Value) -> CallFuture<Vec<Value>> {
        self.rpc.call_with("join", json!({ "channel": channel }), |result| {
            let data = result?;
            match data.get("members") {
                Some(Value::Array(members)) => Ok(members.clone()),
                _ => Err(SwitchboardError::Validation {
                    field: "members".into(),
                    message: format!("expected an array in join reply, got {}", data),
                }),
            }
        })
    }

    pub fn leave(&self, channel: Value) -> CallFuture<Value> {
        self.rpc.call("leave", json!({ "channel": channel }))
    }

    pub fn send(&self, channel: Value, body: Value) -> CallFuture<Value> {
        self.rpc.call("send", json!({ "channel": channel, "body": body }))
    }

    /// Tell the identity's other sessions the channel has been read.
    pub fn read(&self, channel: Value) -> CallFuture<Value> {
        self.rpc.call("read", json!({ "channel": channel }))
    }
}

impl Service for Chat {
    fn name(&self) -> &str {
        self.rpc.service_name()
    }

    fn on_packet(&self, message: Value) {
        let Some(message) = self.rpc.handle_packet(message) else {
            return;
        };
        let event = match classify::<ChatNotification>(self.name(), message) {
            Some(ChatNotification::Message(m)) => ChatEvent::Message(m),
            Some(ChatNotification::Presence(p)) => ChatEvent::Presence(p),
            Some(ChatNotification::Read(r)) => ChatEvent::Read(r),
            Some(ChatNotification::Unrecognized) | None => return,
        };
        self.events.emit(event);
    }
}

impl RpcService for Chat {
    fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    fn methods(&self) -> &RpcMethods {
        &self.methods
    }
}
