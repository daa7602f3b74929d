//! Publish/subscribe channels.

use super::{classify, Notification};
use crate::events::{BoxedSink, EventSink, NullSink};
use crate::rpc::{CallFuture, RpcClient, RpcMethods, RpcService};
use crate::service::{Service, ServiceChannel};
use crate::Result;
use serde::Deserialize;
use serde_json::{json, Value};

/// A message published on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PublishedMessage {
    pub channel: String,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PubSubEvent {
    Message(PublishedMessage),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum PubSubNotification {
    Message(PublishedMessage),
    #[serde(other)]
    Unrecognized,
}

impl Notification for PubSubNotification {
    fn is_unrecognized(&self) -> bool {
        matches!(self, PubSubNotification::Unrecognized)
    }
}

pub struct PubSub {
    rpc: RpcClient,
    methods: RpcMethods,
    events: BoxedSink<PubSubEvent>,
}

impl PubSub {
    pub fn new(channel: ServiceChannel) -> Result<Self> {
        Self::with_events(channel, NullSink)
    }

    pub fn with_events(channel: ServiceChannel, events: impl EventSink<PubSubEvent> + 'static) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::new(channel),
            methods: RpcMethods::with(&[
                ("publish", "publish"),
                ("subscribe", "subscribe"),
                ("unsubscribe", "unsubscribe"),
            ])?,
            events: Box::new(events),
        })
    }

    pub fn publish(&self, channel: &str, body: Value) -> CallFuture<Value> {
        self.rpc.call("publish", json!({ "channel": channel, "msg": body }))
    }

    pub fn subscribe(&self, channel: &str) -> CallFuture<Value> {
        self.rpc.call("subscribe", json!({ "channel": channel }))
    }

    pub fn unsubscribe(&self, channel: &str) -> CallFuture<Value> {
        self.rpc.call("unsubscribe", json!({ "channel": channel }))
    }
}

impl Service for PubSub {
    fn name(&self) -> &str {
        self.rpc.service_name()
    }

    fn on_packet(&self, message: Value) {
        let Some(message) = self.rpc.handle_packet(message) else {
            return;
        };
        match classify::<PubSubNotification>(self.name(), message) {
            Some(PubSubNotification::Message(published)) => {
                self.events.emit(PubSubEvent::Message(published))
            }
            Some(PubSubNotification::Unrecognized) | None => {}
        }
    }
}

impl RpcService for PubSub {
    fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    fn methods(&self) -> &RpcMethods {
        &self.methods
    }
}
