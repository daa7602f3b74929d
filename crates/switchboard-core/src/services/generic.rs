//! Untyped service for channels without a dedicated client.

use crate::events::{BoxedSink, EventSink, NullSink};
use crate::rpc::{CallFuture, RpcClient, RpcMethods, RpcService};
use crate::service::{Service, ServiceChannel};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum GenericEvent {
    Notification(Value),
}

/// Issues arbitrary commands and forwards every notification as-is.
pub struct GenericService {
    rpc: RpcClient,
    methods: RpcMethods,
    events: BoxedSink<GenericEvent>,
}

impl GenericService {
    pub fn new(channel: ServiceChannel) -> Self {
        Self::with_methods(channel, RpcMethods::new(), NullSink)
    }

    pub fn with_methods(
        channel: ServiceChannel,
        methods: RpcMethods,
        events: impl EventSink<GenericEvent> + 'static,
    ) -> Self {
        Self {
            rpc: RpcClient::new(channel),
            methods,
            events: Box::new(events),
        }
    }

    pub fn call(&self, command: &str, params: Value) -> CallFuture<Value> {
        self.rpc.call(command, params)
    }
}

impl Service for GenericService {
    fn name(&self) -> &str {
        self.rpc.service_name()
    }

    fn on_packet(&self, message: Value) {
        if let Some(notification) = self.rpc.handle_packet(message) {
            self.events.emit(GenericEvent::Notification(notification));
        }
    }
}

impl RpcService for GenericService {
    fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    fn methods(&self) -> &RpcMethods {
        &self.methods
    }
}
