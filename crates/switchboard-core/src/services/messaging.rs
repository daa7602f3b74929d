//! Direct messages between named participants.

use super::{classify, Notification};
use crate::events::{BoxedSink, EventSink, NullSink};
use crate::rpc::{CallFuture, RpcClient, RpcMethods, RpcService};
use crate::service::{Service, ServiceChannel};
use crate::Result;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParticipantMessage {
    pub sender: String,
    pub dest: String,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessagingEvent {
    Message(ParticipantMessage),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum MessagingNotification {
    Message(ParticipantMessage),
    #[serde(other)]
    Unrecognized,
}

impl Notification for MessagingNotification {
    fn is_unrecognized(&self) -> bool {
        matches!(self, MessagingNotification::Unrecognized)
    }
}

pub struct Messaging {
    rpc: RpcClient,
    methods: RpcMethods,
    events: BoxedSink<MessagingEvent>,
}

impl Messaging {
    pub fn new(channel: ServiceChannel) -> Result<Self> {
        Self::with_events(channel, NullSink)
    }

    pub fn with_events(channel: ServiceChannel, events: impl EventSink<MessagingEvent> + 'static) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::new(channel),
            methods: RpcMethods::with(&[
                ("register_participant", "registerParticipant"),
                ("unregister_participant", "unregisterParticipant"),
                ("list_participants", "listParticipants"),
                ("send", "send"),
            ])?,
            events: Box::new(events),
        })
    }

    pub fn register_participant(&self, name: &str) -> CallFuture<Value> {
        self.rpc.call("registerParticipant", json!({ "name": name }))
    }

    pub fn unregister_participant(&self, name: &str) -> CallFuture<Value> {
        self.rpc.call("unregisterParticipant", json!({ "name": name }))
    }

    /// Registered participant names, sorted by the server.
    pub fn list_participants(&self) -> CallFuture<Vec<String>> {
        self.rpc.call_with("listParticipants", json!({}), |result| {
            Ok(serde_json::from_value(result?)?)
        })
    }

    pub fn send(&self, sender: &str, dest: &str, body: Value) -> CallFuture<Value> {
        self.rpc.call(
            "send",
            json!({ "sender": sender, "dest": dest, "body": body }),
        )
    }
}

impl Service for Messaging {
    fn name(&self) -> &str {
        self.rpc.service_name()
    }

    fn on_packet(&self, message: Value) {
        let Some(message) = self.rpc.handle_packet(message) else {
            return;
        };
        match classify::<MessagingNotification>(self.name(), message) {
            Some(MessagingNotification::Message(received)) => {
                self.events.emit(MessagingEvent::Message(received))
            }
            Some(MessagingNotification::Unrecognized) | None => {}
        }
    }
}

impl RpcService for Messaging {
    fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    fn methods(&self) -> &RpcMethods {
        &self.methods
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Connector;
    use tokio::sync::mpsc;

    #[test]
    fn test_participant_message_is_emitted() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut builder = Connector::builder();
        builder
            .service("messaging", |ch| Messaging::with_events(ch, tx))
            .unwrap();
        let connector = builder.build();

        connector.handle_message(
            r#"{"service":"messaging","message":{"type":"message","sender":"ann","dest":"bob","body":"hi"}}"#,
        );
        connector.handle_message(r#"{"service":"messaging","message":{"type":"typing"}}"#);

        assert_eq!(
            rx.try_recv().unwrap(),
            MessagingEvent::Message(ParticipantMessage {
                sender: "ann".into(),
                dest: "bob".into(),
                body: json!("hi"),
            })
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_list_participants_decodes_names() {
        let mut builder = Connector::builder();
        let messaging = builder.service("messaging", Messaging::new).unwrap();
        let _connector = builder.build();

        let mut names = messaging.list_participants();
        messaging.on_packet(json!({"type": "response", "callId": 0, "data": ["ann", "bob"]}));
        assert_eq!(names.try_take().unwrap().unwrap(), vec!["ann".to_string(), "bob".to_string()]);
    }

    #[test]
    fn test_invoke_uses_method_table() {
        let mut builder = Connector::builder();
        let messaging = builder.service("messaging", Messaging::new).unwrap();
        let connector = builder.build();

        let call = messaging.invoke("register_participant", Some(json!({"name": "ann"}))).unwrap();
        assert_eq!(call.call_id(), Some(0));
        assert_eq!(connector.queued_len(), 1);
        assert!(messaging.invoke("shout", None).is_err());
    }
}
