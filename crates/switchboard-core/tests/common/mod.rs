//! Shared helpers for integration tests: an in-memory transport that records
//! every frame it is asked to write.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use switchboard::{ConnectionId, Connector, Result, SwitchboardError, Transport};

#[derive(Clone, Default)]
pub struct Recorder {
    frames: Arc<Mutex<Vec<String>>>,
    failing: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl Transport for Recorder {
    fn send(&mut self, frame: String) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SwitchboardError::transport("socket buffer full"));
        }
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl Recorder {
    /// Raw frames written so far.
    pub fn raw(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }

    /// Frames written so far, parsed as envelopes.
    pub fn envelopes(&self) -> Vec<Value> {
        self.raw()
            .iter()
            .map(|frame| serde_json::from_str(frame).unwrap())
            .collect()
    }

    /// Payloads of the frames written so far.
    pub fn messages(&self) -> Vec<Value> {
        self.envelopes()
            .into_iter()
            .map(|mut envelope| envelope["message"].take())
            .collect()
    }

    /// Most recent payload.
    pub fn last_message(&self) -> Value {
        self.messages().pop().expect("no frame written")
    }

    pub fn count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Attach a fresh recorder to `connector` and open it.
pub fn open(connector: &Connector) -> Recorder {
    open_with_id(connector).0
}

/// Like [`open`], also returning the attachment id.
pub fn open_with_id(connector: &Connector) -> (Recorder, ConnectionId) {
    let recorder = Recorder::default();
    let id = connector.connect(Box::new(recorder.clone())).unwrap();
    connector.handle_open(id);
    (recorder, id)
}

/// Report a close of the current attachment.
pub fn close(connector: &Connector) {
    connector.handle_close(connector.current_connection().unwrap());
}

/// Deliver a payload to `service` as if the server sent it.
pub fn deliver(connector: &Connector, service: &str, message: Value) {
    let frame = json!({ "service": service, "message": message }).to_string();
    connector.handle_message(&frame);
}

/// Deliver a successful reply for `call_id`.
pub fn respond(connector: &Connector, service: &str, call_id: u64, data: Value) {
    deliver(
        connector,
        service,
        json!({ "type": "response", "callId": call_id, "data": data }),
    );
}

/// Deliver an error reply for `call_id`.
pub fn fail(connector: &Connector, service: &str, call_id: u64, message: &str) {
    deliver(
        connector,
        service,
        json!({ "type": "error", "callId": call_id, "message": message }),
    );
}
