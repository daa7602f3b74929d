//! Named remote methods.
//!
//! A service exposes a table mapping local verbs to server command names. A
//! verb may be registered once, and never under a name the service type
//! already uses for its own operations.

use super::client::{CallFuture, RpcClient};
use crate::service::Service;
use crate::{Result, SwitchboardError};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Verbs that clash with operations every RPC service already has.
pub const RESERVED_VERBS: &[&str] = &[
    "call",
    "call_with",
    "invoke",
    "handle_packet",
    "on_packet",
    "send_message",
    "name",
    "rpc",
    "methods",
    "service_name",
    "pending_calls",
    "next_call_id",
    "channel",
];

/// Verb to server command table of one service.
#[derive(Debug, Clone, Default)]
pub struct RpcMethods {
    table: HashMap<String, String>,
}

impl RpcMethods {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(verb, command)` pairs.
    pub fn with(pairs: &[(&str, &str)]) -> Result<Self> {
        let mut methods = Self::new();
        for (verb, command) in pairs {
            methods.register(verb, command)?;
        }
        Ok(methods)
    }

    /// Register `verb` as a shortcut for `command`.
    ///
    /// Fails with [`SwitchboardError::MethodCollision`] if the verb is already
    /// taken or reserved.
    pub fn register(&mut self, verb: &str, command: &str) -> Result<()> {
        if RESERVED_VERBS.contains(&verb) || self.table.contains_key(verb) {
            return Err(SwitchboardError::MethodCollision {
                verb: verb.to_string(),
            });
        }
        self.table.insert(verb.to_string(), command.to_string());
        Ok(())
    }

    /// Server command bound to `verb`.
    pub fn command(&self, verb: &str) -> Option<&str> {
        self.table.get(verb).map(String::as_str)
    }

    /// Registered verbs, sorted.
    pub fn verbs(&self) -> Vec<&str> {
        let mut verbs: Vec<&str> = self.table.keys().map(String::as_str).collect();
        verbs.sort_unstable();
        verbs
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// A service built on an [`RpcClient`] with a method table.
pub trait RpcService: Service {
    fn rpc(&self) -> &RpcClient;

    fn methods(&self) -> &RpcMethods;

    /// Call the command registered under `verb`.
    ///
    /// Missing params are sent as an empty object.
    fn invoke(&self, verb: &str, params: Option<Value>) -> Result<CallFuture<Value>> {
        let command =
            self.methods()
                .command(verb)
                .ok_or_else(|| SwitchboardError::UnknownMethod {
                    service: self.name().to_string(),
                    verb: verb.to_string(),
                })?;
        let params = params.unwrap_or_else(|| Value::Object(Map::new()));
        Ok(self.rpc().call(command, params))
    }
}
