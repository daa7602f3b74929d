//! Connection multiplexer.
//!
//! A [`Connector`] owns the single transport connection and a fixed set of
//! named services. Outbound payloads from every service funnel through one
//! ordering point ([`Link`]); inbound frames are demultiplexed by their
//! envelope's `service` field.
//!
//! While not connected, outbound envelopes are queued. When the transport
//! opens, the queue is flushed in FIFO order before the `Connected` event is
//! emitted, so nothing sent from an event handler can overtake queued frames.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut builder = Connector::builder();
//! let pubsub = builder.service("pubsub", PubSub::new)?;
//! let connector = Arc::new(builder.build());
//! transport::websocket::connect(connector.clone(), "ws://localhost:5001/websocket").await?;
//! pubsub.subscribe("news").await?;
//! ```

use crate::events::{BoxedSink, EventSink, NullSink};
use crate::rpc::protocol::Envelope;
use crate::service::{Service, ServiceChannel};
use crate::transport::Transport;
use crate::{Result, SwitchboardError};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Transport lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Identifies one transport attachment, as returned by [`Connector::connect`].
///
/// Open and close reports carry it so that a late event from a replaced
/// transport cannot act on the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

/// Lifecycle events emitted by the connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
}

/// Shared outbound state: status, transport and the pending queue.
///
/// Every send goes through [`Link::send`] under one lock, which is what keeps
/// server-observed order equal to call order.
pub(crate) struct Link {
    state: Mutex<LinkState>,
}

struct LinkState {
    status: ConnectionStatus,
    transport: Option<Box<dyn Transport>>,
    queue: VecDeque<String>,
    /// Most recent attachment; events from any other are stale.
    current: Option<ConnectionId>,
    next_id: u64,
}

impl LinkState {
    fn is_current(&self, id: ConnectionId) -> bool {
        self.current == Some(id)
    }
}

impl Link {
    fn new() -> Self {
        Self {
            state: Mutex::new(LinkState {
                status: ConnectionStatus::Disconnected,
                transport: None,
                queue: VecDeque::new(),
                current: None,
                next_id: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serialize an envelope and send or queue it.
    pub(crate) fn send(&self, service: &str, message: Value) -> Result<()> {
        let frame = serde_json::to_string(&Envelope::new(service, message))?;

        let mut state = self.lock();
        let state = &mut *state;
        // A non-empty queue while connected means an earlier write failed;
        // keep appending so order is preserved until the next flush.
        if state.status == ConnectionStatus::Connected && state.queue.is_empty() {
            if let Some(transport) = state.transport.as_mut() {
                if let Err(e) = transport.send(frame.clone()) {
                    warn!("Send on service \"{}\" failed, queueing frame: {}", service, e);
                    state.queue.push_back(frame);
                }
                return Ok(());
            }
        }

        debug!("Not connected, queueing frame for service \"{}\"", service);
        state.queue.push_back(frame);
        Ok(())
    }
}

/// Owns the transport connection and the registered services.
pub struct Connector {
    link: Arc<Link>,
    services: HashMap<String, Arc<dyn Service>>,
    events: BoxedSink<ConnectionEvent>,
}

impl Connector {
    /// Start registering services.
    pub fn builder() -> ConnectorBuilder {
        ConnectorBuilder::new()
    }

    /// Attach a transport and start connecting.
    ///
    /// Fails with [`SwitchboardError::ConnectInProgress`] unless the connector
    /// is currently disconnected. The outbound queue is kept across attempts.
    /// The returned id must accompany the driver's open and close reports.
    pub fn connect(&self, transport: Box<dyn Transport>) -> Result<ConnectionId> {
        let mut state = self.link.lock();
        if state.status != ConnectionStatus::Disconnected {
            return Err(SwitchboardError::ConnectInProgress);
        }
        let id = ConnectionId(state.next_id);
        state.next_id += 1;
        state.current = Some(id);
        state.status = ConnectionStatus::Connecting;
        state.transport = Some(transport);
        debug!("Connecting as {:?} ({} queued frames)", id, state.queue.len());
        Ok(id)
    }

    /// Id of the most recent attachment, if `connect` was ever called.
    pub fn current_connection(&self) -> Option<ConnectionId> {
        self.link.lock().current
    }

    /// Close the transport and mark the connector disconnected immediately.
    ///
    /// The `Disconnected` event is emitted once the driver reports the close.
    pub fn disconnect(&self) {
        let mut state = self.link.lock();
        if let Some(mut transport) = state.transport.take() {
            transport.close();
        }
        state.status = ConnectionStatus::Disconnected;
    }

    /// Send a payload on behalf of a named service.
    pub fn send(&self, service: &str, message: Value) -> Result<()> {
        self.link.send(service, message)
    }

    /// Transport `id` opened: mark connected, flush the queue, emit
    /// `Connected`. Ignored unless `id` is the current attachment.
    pub fn handle_open(&self, id: ConnectionId) {
        {
            let mut state = self.link.lock();
            let state = &mut *state;
            if !state.is_current(id) {
                debug!("Ignoring open of replaced connection {:?}", id);
                return;
            }
            let Some(transport) = state.transport.as_mut() else {
                debug!("Ignoring open of {:?} after disconnect", id);
                return;
            };

            state.status = ConnectionStatus::Connected;
            info!("Connected ({} queued frames to flush)", state.queue.len());

            while let Some(frame) = state.queue.front() {
                if let Err(e) = transport.send(frame.clone()) {
                    warn!("Flush interrupted, {} frames stay queued: {}", state.queue.len(), e);
                    break;
                }
                state.queue.pop_front();
            }
        }

        self.events.emit(ConnectionEvent::Connected);
    }

    /// Transport delivered one frame: demultiplex it to its service.
    ///
    /// Malformed frames and unknown service names are dropped with a warning.
    pub fn handle_message(&self, text: &str) {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping malformed frame: {}", e);
                return;
            }
        };

        match self.services.get(&envelope.service) {
            Some(service) => service.on_packet(envelope.message),
            None => warn!("Dropping message for unknown service \"{}\"", envelope.service),
        }
    }

    /// Transport `id` closed: mark disconnected and emit `Disconnected`.
    ///
    /// Pending RPC calls are left untouched and queued frames are kept. A
    /// close reported by a replaced connection changes nothing.
    pub fn handle_close(&self, id: ConnectionId) {
        {
            let mut state = self.link.lock();
            if !state.is_current(id) {
                debug!("Ignoring close of replaced connection {:?}", id);
                return;
            }
            state.status = ConnectionStatus::Disconnected;
            state.transport = None;
            info!("Disconnected ({} frames queued)", state.queue.len());
        }
        self.events.emit(ConnectionEvent::Disconnected);
    }

    pub fn status(&self) -> ConnectionStatus {
        self.link.lock().status
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.status() == ConnectionStatus::Connecting
    }

    /// Number of serialized envelopes waiting for the next open.
    pub fn queued_len(&self) -> usize {
        self.link.lock().queue.len()
    }

    /// Names of the registered services, sorted.
    pub fn service_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Look up a registered service by name.
    pub fn service(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services.get(name).cloned()
    }
}

/// Registers services and the lifecycle event sink before a [`Connector`]
/// is built. The service set is fixed afterwards.
pub struct ConnectorBuilder {
    link: Arc<Link>,
    services: HashMap<String, Arc<dyn Service>>,
    events: Option<BoxedSink<ConnectionEvent>>,
}

impl ConnectorBuilder {
    fn new() -> Self {
        Self {
            link: Arc::new(Link::new()),
            services: HashMap::new(),
            events: None,
        }
    }

    /// Register a service under `name`.
    ///
    /// The factory receives the service's channel and may fail (for example on
    /// an RPC method collision). Returns the typed service handle.
    pub fn service<S, F>(&mut self, name: impl Into<String>, factory: F) -> Result<Arc<S>>
    where
        S: Service + 'static,
        F: FnOnce(ServiceChannel) -> Result<S>,
    {
        let name = name.into();
        if self.services.contains_key(&name) {
            return Err(SwitchboardError::DuplicateService { name });
        }

        let channel = ServiceChannel::new(name.clone(), self.link.clone());
        let service = Arc::new(factory(channel)?);
        self.services.insert(name, service.clone() as Arc<dyn Service>);
        Ok(service)
    }

    /// Set the sink receiving [`ConnectionEvent`]s.
    pub fn events(&mut self, sink: impl EventSink<ConnectionEvent> + 'static) -> &mut Self {
        self.events = Some(Box::new(sink));
        self
    }

    pub fn build(self) -> Connector {
        Connector {
            link: self.link,
            services: self.services,
            events: self.events.unwrap_or_else(|| Box::new(NullSink)),
        }
    }
}
