//! Switchboard - client-side service multiplexer for realtime servers.
//!
//! This crate multiplexes named services over one persistent message
//! connection, correlates RPC replies with their calls, and keeps client-side
//! collections in sync with server-pushed deltas. It performs no I/O itself
//! unless the `websocket` feature's driver is used.
//!
//! # Architecture
//!
//! - [`Connector`]: owns the connection, queues outbound envelopes while
//!   disconnected and routes inbound envelopes to services by name
//! - [`rpc`]: call id allocation and reply correlation for services
//! - [`datasync`]: applies server deltas to client-side collections
//! - [`services`]: pub/sub, messaging, chat, data sync and cursor clients
//! - [`transport`]: the sans-IO transport seam and a WebSocket driver
//!
//! # Example
//!
//! ```rust,ignore
//! use switchboard::{services::PubSub, Connector};
//!
//! let mut builder = Connector::builder();
//! let pubsub = builder.service("pubsub", PubSub::new)?;
//! let connector = std::sync::Arc::new(builder.build());
//!
//! switchboard::transport::websocket::connect(connector.clone(), "ws://localhost:5001/websocket").await?;
//! pubsub.subscribe("news").await?;
//! ```

pub mod canonical;
pub mod config;
pub mod connector;
pub mod datasync;
pub mod error;
pub mod events;
pub mod rpc;
pub mod service;
pub mod services;
pub mod transport;

pub use canonical::{canonical_key, canonical_key_of};
pub use connector::{ConnectionEvent, ConnectionId, ConnectionStatus, Connector, ConnectorBuilder};
pub use error::{Result, SwitchboardError};
pub use events::{BoxedSink, EventSink, FnSink, NullSink};
pub use rpc::{CallFuture, RpcClient, RpcMethods, RpcService};
pub use service::{Service, ServiceChannel};
pub use transport::Transport;
