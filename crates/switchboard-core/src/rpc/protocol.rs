//! Wire format shared by the connector and the RPC layer.
//!
//! One message per transport frame, JSON text:
//!
//! ```text
//! Envelope     := { service: string, message: any }
//! RpcRequest   := { command: string, params: object, callId: integer }
//! RpcResponse  := { type: "response", callId: integer, data: any }
//! RpcError     := { type: "error",    callId: integer, message: string }
//! Notification := { type: string, ...application fields }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outer wrapper multiplexing services over one connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub service: String,
    pub message: Value,
}

impl Envelope {
    pub fn new(service: impl Into<String>, message: Value) -> Self {
        Self {
            service: service.into(),
            message,
        }
    }
}

/// Outbound RPC request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcRequest {
    pub command: String,
    pub params: Value,
    pub call_id: u64,
}

impl RpcRequest {
    pub fn new(command: impl Into<String>, params: Value, call_id: u64) -> Self {
        Self {
            command: command.into(),
            params,
            call_id,
        }
    }
}

/// Classification of one inbound service payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Successful reply to a pending call.
    Response { call_id: u64, data: Value },
    /// Failed reply to a pending call.
    Error { call_id: u64, message: String },
    /// A reply whose call id is missing or not an integer.
    MalformedReply { kind: &'static str },
    /// Anything else, left for the service to interpret.
    Notification(Value),
}

impl Inbound {
    /// Classify a payload by its `type` discriminator.
    pub fn classify(message: Value) -> Self {
        let kind = match message.get("type").and_then(Value::as_str) {
            Some("response") => "response",
            Some("error") => "error",
            _ => return Inbound::Notification(message),
        };

        let Some(call_id) = message.get("callId").and_then(Value::as_u64) else {
            return Inbound::MalformedReply { kind };
        };

        if kind == "response" {
            let data = message.get("data").cloned().unwrap_or(Value::Null);
            Inbound::Response { call_id, data }
        } else {
            let message = match message.get("message") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            Inbound::Error { call_id, message }
        }
    }
}

/// The `type` field of a notification, if it carries a string one.
pub fn notification_type(message: &Value) -> Option<&str> {
    message.get("type").and_then(Value::as_str)
}
