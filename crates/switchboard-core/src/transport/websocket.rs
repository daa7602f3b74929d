//! WebSocket driver built on `tokio-tungstenite`.
//!
//! [`connect`] attaches a channel-backed [`Transport`] to the connector, opens
//! the socket, and spawns two tasks: a writer draining outbound frames into
//! the socket and a reader feeding inbound text frames to
//! [`Connector::handle_message`]. When the socket ends the reader reports
//! [`Connector::handle_close`] for its own [`ConnectionId`], so a socket
//! replaced by a later `connect` cannot tear down its successor.

use super::Transport;
use crate::{ConnectionId, Connector, Result, SwitchboardError};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Outbound half handed to the connector. Frames are queued on an unbounded
/// channel so `send` never blocks the caller.
pub struct WsTransport {
    tx: mpsc::UnboundedSender<Message>,
}

impl Transport for WsTransport {
    fn send(&mut self, frame: String) -> Result<()> {
        self.tx
            .send(Message::Text(frame.into()))
            .map_err(|_| SwitchboardError::transport("WebSocket writer has stopped"))
    }

    fn close(&mut self) {
        if self.tx.send(Message::Close(None)).is_err() {
            debug!("WebSocket writer already stopped");
        }
    }
}

/// Running driver tasks of one connection.
#[derive(Debug)]
pub struct WsConnection {
    id: ConnectionId,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl WsConnection {
    /// Wait until the socket has closed and the close has been reported.
    pub async fn closed(self) {
        if let Err(e) = self.reader.await {
            warn!("WebSocket reader task failed: {}", e);
        }
        if let Err(e) = self.writer.await {
            warn!("WebSocket writer task failed: {}", e);
        }
    }

    /// Attachment this socket reports its lifecycle under.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.reader.is_finished()
    }
}

/// Open a WebSocket to `url` and drive `connector` with it.
///
/// Frames queued while disconnected are flushed as soon as the socket opens.
/// A failed handshake is reported to the connector as a close and returned.
pub async fn connect(connector: Arc<Connector>, url: &str) -> Result<WsConnection> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let id = connector.connect(Box::new(WsTransport { tx }))?;

    info!("Connecting to {}", url);
    let stream = match connect_async(url).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", url, e);
            connector.handle_close(id);
            return Err(SwitchboardError::transport(e));
        }
    };

    let (mut write, mut read) = stream.split();

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if let Err(e) = write.send(message).await {
                warn!("Failed to write WebSocket frame: {}", e);
                break;
            }
            if closing {
                break;
            }
        }
        debug!("WebSocket writer stopped");
    });

    connector.handle_open(id);

    let reader = tokio::spawn(async move {
        loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => connector.handle_message(text.as_str()),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    break;
                }
                Some(Ok(_)) => {}
            }
        }
        connector.handle_close(id);
    });

    Ok(WsConnection { id, reader, writer })
}
