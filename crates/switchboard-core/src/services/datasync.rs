//! Server-pushed deltas for subscribed models.

use super::{classify, Notification};
use crate::datasync::{Delta, DeltaProcessor};
use crate::events::{BoxedSink, EventSink, NullSink};
use crate::rpc::{CallFuture, RpcClient, RpcMethods, RpcService};
use crate::service::{Service, ServiceChannel};
use crate::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum DataSyncEvent {
    /// Emitted after the delta has been applied to its registered collection.
    /// Deltas for an unregistered model or tag are dropped without an event.
    Delta(Delta),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum DataSyncNotification {
    Delta { delta: Value },
    #[serde(other)]
    Unrecognized,
}

impl Notification for DataSyncNotification {
    fn is_unrecognized(&self) -> bool {
        matches!(self, DataSyncNotification::Unrecognized)
    }
}

/// Subscription client feeding a [`DeltaProcessor`].
pub struct DataSync {
    rpc: RpcClient,
    methods: RpcMethods,
    processor: Mutex<DeltaProcessor>,
    events: BoxedSink<DataSyncEvent>,
}

impl DataSync {
    pub fn new(channel: ServiceChannel) -> Result<Self> {
        Self::with_processor(channel, DeltaProcessor::new(), NullSink)
    }

    pub fn with_processor(
        channel: ServiceChannel,
        processor: DeltaProcessor,
        events: impl EventSink<DataSyncEvent> + 'static,
    ) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::new(channel),
            methods: RpcMethods::with(&[
                ("acquire_subscription", "acquireSubscription"),
                ("cancel_subscription", "cancelSubscription"),
            ])?,
            processor: Mutex::new(processor),
            events: Box::new(events),
        })
    }

    /// Processor the service applies incoming deltas to, for registering
    /// collections after construction.
    pub fn processor(&self) -> MutexGuard<'_, DeltaProcessor> {
        self.processor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Redeem a subscription token issued by the application backend.
    pub fn acquire_subscription(&self, token: &str) -> CallFuture<Value> {
        self.rpc.call("acquireSubscription", json!({ "token": token }))
    }

    pub fn cancel_subscription(&self, token: &str) -> CallFuture<Value> {
        self.rpc.call("cancelSubscription", json!({ "token": token }))
    }

    fn on_delta(&self, raw: Value) {
        let delta: Delta = match serde_json::from_value(raw) {
            Ok(delta) => delta,
            Err(e) => {
                warn!("Dropping malformed delta in service \"{}\": {}", self.name(), e);
                return;
            }
        };

        let applied = self.processor().process_delta(delta.clone());
        match applied {
            Ok(true) => self.events.emit(DataSyncEvent::Delta(delta)),
            Ok(false) => {}
            Err(e) => warn!("Failed to apply {} delta for \"{}\": {}", delta.kind(), delta.model(), e),
        }
    }
}

impl Service for DataSync {
    fn name(&self) -> &str {
        self.rpc.service_name()
    }

    fn on_packet(&self, message: Value) {
        let Some(message) = self.rpc.handle_packet(message) else {
            return;
        };
        match classify::<DataSyncNotification>(self.name(), message) {
            Some(DataSyncNotification::Delta { delta }) => self.on_delta(delta),
            Some(DataSyncNotification::Unrecognized) | None => {}
        }
    }
}

impl RpcService for DataSync {
    fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    fn methods(&self) -> &RpcMethods {
        &self.methods
    }
}
