//! Centralized configuration for switchboard.
//!
//! Protocol constants are grouped by the component that owns them. Runtime
//! choices (services, event sinks, equality predicates) are injected through
//! builders instead.

/// Configuration for client-local handle allocation.
pub struct HandleConfig;

impl HandleConfig {
    /// Largest private handle value. Handles are drawn from `0..=HANDLE_MAX`.
    pub const HANDLE_MAX: u8 = 255;
    /// Maximum number of simultaneously live locally-owned objects.
    pub const MAX_LIVE: usize = 100;
}

/// Configuration for the canonical key encoder.
pub struct KeyConfig;

impl KeyConfig {
    /// Nesting depth past which a value is treated as cyclic.
    pub const MAX_DEPTH: usize = 64;
}

/// RPC correlation constants.
pub struct RpcConfig;

impl RpcConfig {
    /// Call id assigned to the first call of every service.
    pub const FIRST_CALL_ID: u64 = 0;
}

/// Delta synchronization defaults.
pub struct DeltaConfig;

impl DeltaConfig {
    /// Field compared by the default item equality predicate.
    pub const DEFAULT_ID_FIELD: &'static str = "id";
}

/// Transport-level configuration.
pub struct TransportConfig;

impl TransportConfig {
    /// Port assumed when a probe URL has none.
    pub const DEFAULT_PORT: u16 = 5001;
    /// Path of the WebSocket endpoint on a default server.
    pub const DEFAULT_PATH: &'static str = "/websocket";
}
