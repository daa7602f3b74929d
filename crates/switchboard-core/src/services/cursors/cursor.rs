//! Foreign and locally-owned cursors.

use super::CursorsShared;
use crate::rpc::CallFuture;
use crate::{Result, SwitchboardError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Fields of an owned cursor the server lets clients change.
pub const UPDATABLE_FIELDS: &[&str] = &["position", "status"];

/// A cursor owned by another client, as last reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignCursor {
    pub public_handle: u64,
    pub document: Value,
    #[serde(default)]
    pub position: Value,
    #[serde(default)]
    pub status: Value,
    #[serde(default)]
    pub owner: Value,
}

#[derive(Debug)]
pub(super) struct OwnState {
    pub(super) private_handle: u8,
    pub(super) public_handle: Option<u64>,
    pub(super) position: Value,
    pub(super) status: Value,
    pub(super) pending: u32,
    pub(super) removed: bool,
}

pub(super) type SharedOwnState = Arc<Mutex<OwnState>>;

pub(super) fn lock_state(state: &Mutex<OwnState>) -> MutexGuard<'_, OwnState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Settlement bookkeeping shared by update and remove round trips.
pub(super) fn settle_pending(state: &Mutex<OwnState>) {
    let mut state = lock_state(state);
    state.pending = state.pending.saturating_sub(1);
}

/// A cursor created by this client.
///
/// The cursor exists locally before the server confirms it. Every mutating
/// round trip bumps a pending counter that drops again when the reply
/// arrives; [`OwnCursor::is_synchronized`] reports whether any are left.
#[derive(Clone)]
pub struct OwnCursor {
    shared: Arc<CursorsShared>,
    document: Value,
    state: SharedOwnState,
}

impl OwnCursor {
    pub(super) fn new(shared: Arc<CursorsShared>, document: Value, state: SharedOwnState) -> Self {
        Self {
            shared,
            document,
            state,
        }
    }

    fn lock(&self) -> MutexGuard<'_, OwnState> {
        lock_state(&self.state)
    }

    pub fn private_handle(&self) -> u8 {
        self.lock().private_handle
    }

    /// Server-assigned handle, known once creation is confirmed.
    pub fn public_handle(&self) -> Option<u64> {
        self.lock().public_handle
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn position(&self) -> Value {
        self.lock().position.clone()
    }

    pub fn status(&self) -> Value {
        self.lock().status.clone()
    }

    pub fn pending_count(&self) -> u32 {
        self.lock().pending
    }

    pub fn is_synchronized(&self) -> bool {
        self.pending_count() == 0
    }

    pub fn is_removed(&self) -> bool {
        self.lock().removed
    }

    /// Change `position` and/or `status`.
    ///
    /// The change is applied locally right away. An update that changes
    /// nothing settles immediately without a round trip.
    pub fn update(&self, changes: Value) -> Result<CallFuture<()>> {
        let Value::Object(changes) = changes else {
            return Err(SwitchboardError::Validation {
                field: "changes".into(),
                message: "cursor changes must be an object".into(),
            });
        };
        if let Some(field) = changes
            .keys()
            .find(|field| !UPDATABLE_FIELDS.contains(&field.as_str()))
        {
            return Err(SwitchboardError::FieldNotUpdatable {
                field: field.clone(),
            });
        }

        let private_handle = {
            let mut state = self.lock();
            if state.removed {
                return Err(SwitchboardError::CursorRemoved {
                    handle: state.private_handle,
                });
            }

            let unchanged = changes.iter().all(|(field, value)| match field.as_str() {
                "position" => state.position == *value,
                _ => state.status == *value,
            });
            if unchanged {
                return Ok(CallFuture::ready(Ok(())));
            }

            for (field, value) in &changes {
                match field.as_str() {
                    "position" => state.position = value.clone(),
                    _ => state.status = value.clone(),
                }
            }
            state.pending += 1;
            state.private_handle
        };

        let state = self.state.clone();
        Ok(self.shared.rpc.call_with(
            "updateCursor",
            json!({ "privateHandle": private_handle, "newData": Value::Object(changes) }),
            move |result| {
                settle_pending(&state);
                result.map(|_| ())
            },
        ))
    }

    /// Remove the cursor.
    ///
    /// The handle is freed immediately; the returned future settles when the
    /// server acknowledges. Removing twice fails.
    pub fn remove(&self) -> Result<CallFuture<()>> {
        let private_handle = {
            let mut state = self.lock();
            if state.removed {
                return Err(SwitchboardError::CursorRemoved {
                    handle: state.private_handle,
                });
            }
            state.removed = true;
            state.pending += 1;
            state.private_handle
        };

        self.shared.evict(private_handle, &self.state);
        debug!("Removing cursor {}", private_handle);

        let state = self.state.clone();
        Ok(self.shared.rpc.call_with(
            "removeCursor",
            json!({ "privateHandle": private_handle }),
            move |result| {
                settle_pending(&state);
                result.map(|_| ())
            },
        ))
    }

    /// Snapshot of the locally known fields.
    pub fn data(&self) -> Map<String, Value> {
        let state = self.lock();
        let mut data = Map::new();
        data.insert("privateHandle".into(), json!(state.private_handle));
        if let Some(public) = state.public_handle {
            data.insert("publicHandle".into(), json!(public));
        }
        data.insert("document".into(), self.document.clone());
        data.insert("position".into(), state.position.clone());
        data.insert("status".into(), state.status.clone());
        data
    }
}

impl std::fmt::Debug for OwnCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnCursor")
            .field("document", &self.document)
            .field("state", &*self.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_cursor_defaults_missing_fields() {
        let cursor: ForeignCursor =
            serde_json::from_value(json!({"publicHandle": 7, "document": {"id": 1}})).unwrap();
        assert_eq!(cursor.public_handle, 7);
        assert_eq!(cursor.position, Value::Null);
        assert_eq!(cursor.owner, Value::Null);
    }

    #[test]
    fn test_settle_pending_never_underflows() {
        let state = Mutex::new(OwnState {
            private_handle: 1,
            public_handle: None,
            position: Value::Null,
            status: Value::Null,
            pending: 0,
            removed: false,
        });
        settle_pending(&state);
        assert_eq!(lock_state(&state).pending, 0);
    }
}
