//! Collaborative cursors.
//!
//! Clients join documents (identified by arbitrary JSON values) and place
//! cursors on them. A cursor this client creates gets a random private handle
//! right away and a public handle once the server confirms it. Cursors of
//! other clients arrive as `cursorAdded` / `cursorUpdated` / `cursorRemoved`
//! notifications and are merged into the joined [`Document`].
//!
//! # Example
//!
//! ```rust,ignore
//! let document = cursors.join(json!({"file": "README"}))?.await?;
//! let (cursor, created) = document.create_cursor(json!(0), json!("idle"))?;
//! created.await?;
//! cursor.update(json!({"position": 12}))?.await?;
//! assert!(cursor.is_synchronized());
//! ```

mod cursor;
mod document;
mod handles;

pub use cursor::{ForeignCursor, OwnCursor, UPDATABLE_FIELDS};
pub use document::Document;
pub use handles::HandleTable;

use super::{classify, Notification};
use crate::canonical::canonical_key;
use crate::events::{BoxedSink, EventSink, NullSink};
use crate::rpc::{CallFuture, RpcClient, RpcMethods, RpcService};
use crate::service::{Service, ServiceChannel};
use crate::{Result, SwitchboardError};
use cursor::{lock_state, SharedOwnState};
use document::DocumentState;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Changes to other clients' cursors on a joined document.
#[derive(Debug, Clone, PartialEq)]
pub enum CursorEvent {
    Added(ForeignCursor),
    Updated(ForeignCursor),
    /// Only `public_handle` and `document` are meaningful.
    Removed(ForeignCursor),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum CursorsNotification {
    CursorAdded { cursor: ForeignCursor },
    CursorUpdated { cursor: ForeignCursor },
    CursorRemoved { cursor: ForeignCursor },
    #[serde(other)]
    Unrecognized,
}

impl Notification for CursorsNotification {
    fn is_unrecognized(&self) -> bool {
        matches!(self, CursorsNotification::Unrecognized)
    }
}

struct OwnEntry {
    document_key: String,
    state: SharedOwnState,
}

#[derive(Default)]
struct CursorsState {
    documents: HashMap<String, Arc<DocumentState>>,
    own_cursors: HandleTable<OwnEntry>,
}

struct CursorsShared {
    rpc: RpcClient,
    methods: RpcMethods,
    events: BoxedSink<CursorEvent>,
    state: Mutex<CursorsState>,
}

impl CursorsShared {
    fn lock(&self) -> MutexGuard<'_, CursorsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Free `handle` if it still belongs to `state`.
    fn evict(&self, handle: u8, state: &SharedOwnState) {
        self.lock()
            .own_cursors
            .remove_if(handle, |entry| Arc::ptr_eq(&entry.state, state));
    }

    /// Drop a left document and every owned cursor placed on it.
    fn forget_document(&self, document: &Arc<DocumentState>) {
        let mut cursors = self.lock();
        if cursors
            .documents
            .get(&document.key)
            .is_some_and(|doc| Arc::ptr_eq(doc, document))
        {
            cursors.documents.remove(&document.key);
        }
        cursors.own_cursors.retain(|_, entry| {
            if entry.document_key == document.key {
                lock_state(&entry.state).removed = true;
                false
            } else {
                true
            }
        });
        debug!("Left document {}", document.key);
    }

    fn document_for(&self, cursor: &ForeignCursor) -> Option<Arc<DocumentState>> {
        let key = match canonical_key(&cursor.document) {
            Ok(key) => key,
            Err(e) => {
                warn!("Cursor notification with unusable document: {}", e);
                return None;
            }
        };
        let document = self.lock().documents.get(&key).cloned();
        if document.is_none() {
            warn!(
                "Notification for unknown document {} in service \"{}\"",
                key,
                self.rpc.service_name()
            );
        }
        document
    }
}

/// Cursor tracking service.
pub struct Cursors {
    shared: Arc<CursorsShared>,
}

impl Cursors {
    pub fn new(channel: ServiceChannel) -> Result<Self> {
        Self::with_events(channel, NullSink)
    }

    pub fn with_events(channel: ServiceChannel, events: impl EventSink<CursorEvent> + 'static) -> Result<Self> {
        let methods = RpcMethods::with(&[
            ("join", "join"),
            ("leave", "leave"),
            ("create_cursor", "createCursor"),
            ("update_cursor", "updateCursor"),
            ("remove_cursor", "removeCursor"),
        ])?;
        Ok(Self {
            shared: Arc::new(CursorsShared {
                rpc: RpcClient::new(channel),
                methods,
                events: Box::new(events),
                state: Mutex::new(CursorsState::default()),
            }),
        })
    }

    /// Join a document and receive the cursors already on it.
    ///
    /// The identifier is canonicalized before anything is sent, so an
    /// unencodable identifier fails here.
    pub fn join(&self, document: Value) -> Result<CallFuture<Document>> {
        let key = canonical_key(&document)?;
        let shared = Arc::downgrade(&self.shared);
        let params = json!({ "document": document });

        Ok(self.shared.rpc.call_with("join", params, move |result| {
            let data = result?;
            let foreign: Vec<ForeignCursor> = match data.get("cursors") {
                Some(cursors) => serde_json::from_value(cursors.clone())?,
                None => Vec::new(),
            };
            let shared = shared
                .upgrade()
                .ok_or_else(|| SwitchboardError::transport("cursor service dropped"))?;

            let state = Arc::new(DocumentState::new(document, key, foreign));
            shared
                .lock()
                .documents
                .insert(state.key.clone(), state.clone());
            debug!("Joined document {}", state.key);
            Ok(Document::new(shared, state))
        }))
    }

    /// Leave a document. Once the server confirms, the document and the
    /// cursors this client placed on it are forgotten.
    pub fn leave(&self, document: &Document) -> CallFuture<()> {
        let shared = Arc::downgrade(&self.shared);
        let state = document.state().clone();
        let params = json!({ "document": state.name });

        self.shared.rpc.call_with("leave", params, move |result| {
            result?;
            if let Some(shared) = shared.upgrade() {
                shared.forget_document(&state);
            }
            Ok(())
        })
    }

    /// A joined document by identifier.
    pub fn document(&self, name: &Value) -> Result<Option<Document>> {
        let key = canonical_key(name)?;
        let state = self.shared.lock().documents.get(&key).cloned();
        Ok(state.map(|state| Document::new(self.shared.clone(), state)))
    }

    /// All joined documents, by canonical key.
    pub fn documents(&self) -> Vec<Document> {
        let mut states: Vec<Arc<DocumentState>> = self.shared.lock().documents.values().cloned().collect();
        states.sort_unstable_by(|a, b| a.key.cmp(&b.key));
        states
            .into_iter()
            .map(|state| Document::new(self.shared.clone(), state))
            .collect()
    }

    /// Private handles of the live owned cursors, sorted.
    pub fn own_handles(&self) -> Vec<u8> {
        self.shared.lock().own_cursors.handles()
    }

    fn on_notification(&self, message: Value) {
        let Some(notification) = classify::<CursorsNotification>(self.name(), message) else {
            return;
        };

        let event = match notification {
            CursorsNotification::CursorAdded { cursor } => {
                let Some(document) = self.shared.document_for(&cursor) else {
                    return;
                };
                document.upsert(cursor.clone());
                CursorEvent::Added(cursor)
            }
            CursorsNotification::CursorUpdated { cursor } => {
                let Some(document) = self.shared.document_for(&cursor) else {
                    return;
                };
                document.upsert(cursor.clone());
                CursorEvent::Updated(cursor)
            }
            CursorsNotification::CursorRemoved { cursor } => {
                let Some(document) = self.shared.document_for(&cursor) else {
                    return;
                };
                if !document.remove(cursor.public_handle) {
                    debug!("Removal of untracked cursor {}", cursor.public_handle);
                }
                CursorEvent::Removed(cursor)
            }
            CursorsNotification::Unrecognized => return,
        };
        self.shared.events.emit(event);
    }
}

impl Service for Cursors {
    fn name(&self) -> &str {
        self.shared.rpc.service_name()
    }

    fn on_packet(&self, message: Value) {
        if let Some(notification) = self.shared.rpc.handle_packet(message) {
            self.on_notification(notification);
        }
    }
}

impl RpcService for Cursors {
    fn rpc(&self) -> &RpcClient {
        &self.shared.rpc
    }

    fn methods(&self) -> &RpcMethods {
        &self.shared.methods
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Connector;

    fn cursors() -> (Connector, Arc<Cursors>) {
        let mut builder = Connector::builder();
        let cursors = builder.service("cursors", Cursors::new).unwrap();
        (builder.build(), cursors)
    }

    fn joined(cursors: &Cursors, name: Value) -> Document {
        let mut joining = cursors.join(name).unwrap();
        let call_id = joining.call_id().unwrap();
        cursors.on_packet(json!({"type": "response", "callId": call_id, "data": {"cursors": []}}));
        joining.try_take().unwrap().unwrap()
    }

    #[test]
    fn test_join_indexes_by_canonical_key() {
        let (_connector, cursors) = cursors();
        joined(&cursors, json!({"a": 1, "b": 2}));
        let found = cursors.document(&json!({"b": 2, "a": 1})).unwrap();
        assert!(found.is_some_and(|doc| doc.is_joined()));
    }

    #[test]
    fn test_create_cursor_lifecycle() {
        let (_connector, cursors) = cursors();
        let document = joined(&cursors, json!("doc"));

        let (cursor, mut created) = document.create_cursor(json!(3), json!("typing")).unwrap();
        assert_eq!(cursor.pending_count(), 1);
        assert!(!cursor.is_synchronized());
        assert_eq!(cursors.own_handles(), vec![cursor.private_handle()]);

        let call_id = created.call_id().unwrap();
        cursors.on_packet(json!({"type": "response", "callId": call_id, "data": 4242}));
        assert!(created.try_take().unwrap().is_ok());
        assert!(cursor.is_synchronized());
        assert_eq!(cursor.public_handle(), Some(4242));
    }

    #[test]
    fn test_failed_create_frees_handle() {
        let (_connector, cursors) = cursors();
        let document = joined(&cursors, json!("doc"));
        let (cursor, mut created) = document.create_cursor(json!(0), json!(null)).unwrap();

        let call_id = created.call_id().unwrap();
        cursors.on_packet(json!({"type": "error", "callId": call_id, "message": "Too many cursors"}));
        assert!(created.try_take().unwrap().unwrap_err().is_call_failure());
        assert!(cursor.is_removed());
        assert!(cursor.is_synchronized());
        assert!(cursors.own_handles().is_empty());
    }

    #[test]
    fn test_unknown_document_notification_is_dropped() {
        let (_connector, cursors) = cursors();
        let document = joined(&cursors, json!("doc"));
        cursors.on_packet(json!({
            "type": "cursorAdded",
            "cursor": {"publicHandle": 1, "document": "other", "position": 0, "status": null, "owner": "x"}
        }));
        assert!(document.foreign_cursors().is_empty());
    }
}
