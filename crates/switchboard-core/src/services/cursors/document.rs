//! Joined documents and their cursor collections.

use super::cursor::{lock_state, ForeignCursor, OwnCursor, OwnState};
use super::{CursorsShared, OwnEntry};
use crate::rpc::CallFuture;
use crate::{Result, SwitchboardError};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

pub(super) struct DocumentState {
    pub(super) name: Value,
    pub(super) key: String,
    foreign: Mutex<Vec<ForeignCursor>>,
}

impl DocumentState {
    pub(super) fn new(name: Value, key: String, foreign: Vec<ForeignCursor>) -> Self {
        Self {
            name,
            key,
            foreign: Mutex::new(foreign),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ForeignCursor>> {
        self.foreign.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace the cursor with the same public handle.
    pub(super) fn upsert(&self, cursor: ForeignCursor) {
        let mut foreign = self.lock();
        match foreign
            .iter_mut()
            .find(|c| c.public_handle == cursor.public_handle)
        {
            Some(existing) => *existing = cursor,
            None => foreign.push(cursor),
        }
    }

    /// Returns false if no cursor had that handle.
    pub(super) fn remove(&self, public_handle: u64) -> bool {
        let mut foreign = self.lock();
        let before = foreign.len();
        foreign.retain(|c| c.public_handle != public_handle);
        foreign.len() != before
    }
}

/// A document this client has joined.
///
/// Holds the server-confirmed cursors of other clients in arrival order, and
/// creates cursors owned by this client.
#[derive(Clone)]
pub struct Document {
    shared: Arc<CursorsShared>,
    state: Arc<DocumentState>,
}

impl Document {
    pub(super) fn new(shared: Arc<CursorsShared>, state: Arc<DocumentState>) -> Self {
        Self { shared, state }
    }

    pub(super) fn state(&self) -> &Arc<DocumentState> {
        &self.state
    }

    /// Document identifier as passed to `join`.
    pub fn name(&self) -> &Value {
        &self.state.name
    }

    /// Canonical key the document is indexed by.
    pub fn key(&self) -> &str {
        &self.state.key
    }

    pub fn foreign_cursors(&self) -> Vec<ForeignCursor> {
        self.state.lock().clone()
    }

    pub fn foreign_cursor(&self, public_handle: u64) -> Option<ForeignCursor> {
        self.state
            .lock()
            .iter()
            .find(|c| c.public_handle == public_handle)
            .cloned()
    }

    /// Live cursors this client owns on the document, by private handle.
    pub fn own_cursors(&self) -> Vec<OwnCursor> {
        let cursors = self.shared.lock();
        let mut own: Vec<(u8, OwnCursor)> = cursors
            .own_cursors
            .values()
            .filter(|entry| entry.document_key == self.state.key)
            .map(|entry| {
                let handle = lock_state(&entry.state).private_handle;
                let cursor = OwnCursor::new(self.shared.clone(), self.state.name.clone(), entry.state.clone());
                (handle, cursor)
            })
            .collect();
        own.sort_unstable_by_key(|(handle, _)| *handle);
        own.into_iter().map(|(_, cursor)| cursor).collect()
    }

    /// Whether the service still tracks this document.
    pub fn is_joined(&self) -> bool {
        self.shared
            .lock()
            .documents
            .get(&self.state.key)
            .is_some_and(|doc| Arc::ptr_eq(doc, &self.state))
    }

    /// Create a cursor owned by this client.
    ///
    /// The cursor is usable immediately with one pending operation. The
    /// future settles once the server assigns a public handle. Fails without
    /// a round trip when too many owned cursors are live.
    pub fn create_cursor(&self, position: Value, status: Value) -> Result<(OwnCursor, CallFuture<()>)> {
        let state = Arc::new(Mutex::new(OwnState {
            private_handle: 0,
            public_handle: None,
            position: position.clone(),
            status: status.clone(),
            pending: 1,
            removed: false,
        }));

        let private_handle = {
            let entry_state = state.clone();
            let document_key = self.state.key.clone();
            self.shared.lock().own_cursors.allocate(|handle| {
                lock_state(&entry_state).private_handle = handle;
                OwnEntry {
                    document_key,
                    state: entry_state,
                }
            })?
        };
        debug!("Creating cursor {} on document {}", private_handle, self.state.key);

        let cursor = OwnCursor::new(self.shared.clone(), self.state.name.clone(), state.clone());
        let shared = Arc::downgrade(&self.shared);
        let confirmed = self.shared.rpc.call_with(
            "createCursor",
            json!({
                "privateHandle": private_handle,
                "document": self.state.name,
                "position": position,
                "status": status,
            }),
            move |result| {
                let outcome = result.and_then(|data| {
                    data.as_u64().ok_or_else(|| SwitchboardError::Validation {
                        field: "publicHandle".into(),
                        message: format!("expected an integer handle, got {}", data),
                    })
                });

                let mut own = lock_state(&state);
                own.pending = own.pending.saturating_sub(1);
                match outcome {
                    Ok(public_handle) => {
                        own.public_handle = Some(public_handle);
                        Ok(())
                    }
                    Err(e) => {
                        own.removed = true;
                        drop(own);
                        if let Some(shared) = shared.upgrade() {
                            shared.evict(private_handle, &state);
                        }
                        Err(e)
                    }
                }
            },
        );

        Ok((cursor, confirmed))
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.state.name)
            .field("foreign_cursors", &*self.state.lock())
            .finish()
    }
}
