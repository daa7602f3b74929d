//! Collection and iterator abstractions the delta engine writes through.

use crate::{Result, SwitchboardError};
use serde_json::Value;

/// A client-side container deltas are applied to.
pub trait Collection: Send {
    /// Add one item.
    fn insert(&mut self, item: Value);

    /// Start a forward pass over the items.
    fn iterator(&mut self) -> Box<dyn CollectionIterator + '_>;
}

/// Forward cursor supporting in-place update and removal.
///
/// `update` and `remove` are only valid right after a successful `next`. After
/// `remove` the cursor points at a deleted position until the next `next`.
pub trait CollectionIterator {
    fn has_next(&self) -> bool;

    /// Advance and return the item at the new position.
    fn next(&mut self) -> Result<Value>;

    /// Replace the current item.
    fn update(&mut self, item: Value) -> Result<()>;

    /// Remove the current item.
    fn remove(&mut self) -> Result<()>;
}

/// Where an iterator stands relative to its current item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Position {
    #[default]
    NotAdvanced,
    Valid,
    Deleted,
}

impl Position {
    /// Fails unless the iterator points at a live item.
    pub(crate) fn require_valid(self) -> Result<()> {
        match self {
            Position::Valid => Ok(()),
            Position::NotAdvanced => Err(SwitchboardError::CursorNotPositioned),
            Position::Deleted => Err(SwitchboardError::CursorOnDeletedItem),
        }
    }
}
