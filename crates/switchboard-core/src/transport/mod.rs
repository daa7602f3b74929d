//! Transport abstraction.
//!
//! The connector is sans-IO: it writes frames through a [`Transport`] and is
//! told about open/message/close events by whatever drives the socket. The
//! embedding application owns address resolution and socket construction.
//!
//! With the `websocket` feature (default) a `tokio-tungstenite` driver is
//! available in [`websocket`].

#[cfg(feature = "websocket")]
pub mod websocket;

use crate::Result;

/// Outbound half of one persistent, message-oriented connection.
///
/// One call to [`Transport::send`] is one frame on the wire.
pub trait Transport: Send {
    /// Write one textual frame.
    fn send(&mut self, frame: String) -> Result<()>;

    /// Ask the underlying connection to close. The driver reports completion
    /// through [`crate::Connector::handle_close`].
    fn close(&mut self);
}
