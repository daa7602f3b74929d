//! Request/response correlation over one service channel.
//!
//! Every call gets the next call id of its service (starting at 0, never
//! reused) and a pending entry keyed by that id. A `response` or `error`
//! payload carrying a known call id settles and removes the entry. Anything
//! else is handed back to the owning service as a notification.
//!
//! Calls cannot be cancelled or timed out here. A call settles when its reply
//! arrives, or never. Wrap the future in `tokio::time::timeout` if needed.

use super::protocol::{Inbound, RpcRequest};
use crate::config::RpcConfig;
use crate::service::ServiceChannel;
use crate::{Result, SwitchboardError};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, warn};

type SettleFn = Box<dyn FnOnce(Result<Value>) + Send>;

struct PendingCall {
    command: String,
    settle: SettleFn,
}

/// RPC engine bound to one service channel.
pub struct RpcClient {
    channel: ServiceChannel,
    next_call_id: AtomicU64,
    pending: Mutex<HashMap<u64, PendingCall>>,
}

impl RpcClient {
    pub fn new(channel: ServiceChannel) -> Self {
        Self {
            channel,
            next_call_id: AtomicU64::new(RpcConfig::FIRST_CALL_ID),
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<u64, PendingCall>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn service_name(&self) -> &str {
        self.channel.name()
    }

    pub fn channel(&self) -> &ServiceChannel {
        &self.channel
    }

    /// Issue a call and return a future for its reply data.
    pub fn call(&self, command: &str, params: Value) -> CallFuture<Value> {
        self.call_with(command, params, |result| result)
    }

    /// Issue a call whose settlement runs `on_settle` as soon as the reply
    /// arrives, whether or not the returned future is ever polled.
    ///
    /// The hook runs after the pending entry is removed, so it may issue new
    /// calls on this client.
    pub fn call_with<T, F>(&self, command: &str, params: Value, on_settle: F) -> CallFuture<T>
    where
        T: Send + 'static,
        F: FnOnce(Result<Value>) -> Result<T> + Send + 'static,
    {
        let call_id = self.next_call_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        let settle: SettleFn = Box::new(move |result| {
            // The caller may have dropped the future; the hook still ran.
            let _ = tx.send(on_settle(result));
        });

        self.lock_pending().insert(
            call_id,
            PendingCall {
                command: command.to_string(),
                settle,
            },
        );

        debug!("RPC call {}#{} on \"{}\"", command, call_id, self.service_name());

        let request = RpcRequest::new(command, params, call_id);
        let sent = serde_json::to_value(&request)
            .map_err(SwitchboardError::from)
            .and_then(|message| self.channel.send_message(message));

        if let Err(e) = sent {
            let pending = self.lock_pending().remove(&call_id);
            if let Some(pending) = pending {
                (pending.settle)(Err(e));
            }
        }

        CallFuture::pending(rx, command, call_id)
    }

    /// Route one inbound payload.
    ///
    /// Settles the matching call for `response`/`error` payloads and returns
    /// `None`; returns every other payload as a notification.
    pub fn handle_packet(&self, message: Value) -> Option<Value> {
        match Inbound::classify(message) {
            Inbound::Response { call_id, data } => {
                self.settle(call_id, Ok(data));
                None
            }
            Inbound::Error { call_id, message } => {
                self.settle(call_id, Err(message));
                None
            }
            Inbound::MalformedReply { kind } => {
                warn!(
                    "Dropping {} without a valid callId from service \"{}\"",
                    kind,
                    self.service_name()
                );
                None
            }
            Inbound::Notification(message) => Some(message),
        }
    }

    fn settle(&self, call_id: u64, outcome: std::result::Result<Value, String>) {
        let pending = self.lock_pending().remove(&call_id);
        let Some(pending) = pending else {
            warn!(
                "Response for unknown call with id \"{}\" from service \"{}\"",
                call_id,
                self.service_name()
            );
            return;
        };

        let result = outcome.map_err(|message| SwitchboardError::CallFailed {
            command: pending.command.clone(),
            message,
        });
        (pending.settle)(result);
    }

    /// Call ids still waiting for a reply, with their commands, in id order.
    pub fn pending_calls(&self) -> Vec<(u64, String)> {
        let mut calls: Vec<(u64, String)> = self
            .lock_pending()
            .iter()
            .map(|(id, call)| (*id, call.command.clone()))
            .collect();
        calls.sort_unstable_by_key(|(id, _)| *id);
        calls
    }

    /// Id the next call will receive.
    pub fn next_call_id(&self) -> u64 {
        self.next_call_id.load(Ordering::SeqCst)
    }
}

/// Future for the outcome of one RPC call.
#[must_use = "a call's reply is only observable through its future"]
pub struct CallFuture<T> {
    rx: oneshot::Receiver<Result<T>>,
    command: String,
    call_id: Option<u64>,
}

impl<T> CallFuture<T> {
    fn pending(rx: oneshot::Receiver<Result<T>>, command: &str, call_id: u64) -> Self {
        Self {
            rx,
            command: command.to_string(),
            call_id: Some(call_id),
        }
    }

    /// A future that is already settled, used for calls skipped locally.
    pub fn ready(result: Result<T>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self {
            rx,
            command: String::new(),
            call_id: None,
        }
    }

    /// Call id on the wire, `None` for locally settled futures.
    pub fn call_id(&self) -> Option<u64> {
        self.call_id
    }

    /// Take the outcome if the call has settled, without waiting.
    pub fn try_take(&mut self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(self.abandoned())),
        }
    }

    fn abandoned(&self) -> SwitchboardError {
        SwitchboardError::CallAbandoned {
            command: self.command.clone(),
            call_id: self.call_id.unwrap_or_default(),
        }
    }
}

impl<T> Future for CallFuture<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(this.abandoned())),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> std::fmt::Debug for CallFuture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallFuture")
            .field("command", &self.command)
            .field("call_id", &self.call_id)
            .finish()
    }
}
