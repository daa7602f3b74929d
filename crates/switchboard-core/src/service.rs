//! Service base abstraction.
//!
//! A service is one named logical channel of a [`crate::Connector`]. It
//! receives every payload addressed to its name and sends payloads tagged with
//! that name. Services know nothing about the transport lifecycle; while the
//! connector is disconnected their sends are queued.

use crate::connector::Link;
use crate::Result;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// One named channel multiplexed over the connector.
pub trait Service: Send + Sync {
    /// Channel name this service was registered under.
    fn name(&self) -> &str;

    /// Inbound hook, invoked for every payload addressed to this service.
    fn on_packet(&self, message: Value);
}

/// Outbound handle a service uses to reach its connector.
#[derive(Clone)]
pub struct ServiceChannel {
    name: Arc<str>,
    link: Arc<Link>,
}

impl ServiceChannel {
    pub(crate) fn new(name: String, link: Arc<Link>) -> Self {
        Self {
            name: name.into(),
            link,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send a payload tagged with this channel's name.
    pub fn send_message(&self, message: Value) -> Result<()> {
        self.link.send(&self.name, message)
    }
}

impl fmt::Debug for ServiceChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceChannel").field("name", &self.name).finish()
    }
}
