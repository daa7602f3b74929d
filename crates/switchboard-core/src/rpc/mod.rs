//! RPC over service channels.
//!
//! - [`protocol`]: wire shapes of envelopes, requests and replies
//! - [`RpcClient`]: call id allocation and reply correlation
//! - [`RpcMethods`] / [`RpcService`]: named verbs bound to server commands

mod client;
mod methods;
pub mod protocol;

pub use client::{CallFuture, RpcClient};
pub use methods::{RpcMethods, RpcService, RESERVED_VERBS};
