//! Collection wrapping a single logical item behind accessors.

use super::collection::{Collection, CollectionIterator, Position};
use crate::{Result, SwitchboardError};
use serde_json::Value;
use tracing::warn;

type ReadFn = Box<dyn Fn() -> Option<Value> + Send>;
type UpdateFn = Box<dyn FnMut(Value) + Send>;
type RemoveFn = Box<dyn FnMut() + Send>;

/// At most one item, read and written through caller-supplied accessors.
///
/// Useful for models like "the current user profile" where the application
/// stores the value in its own state.
pub struct SingleItemCollection {
    read: ReadFn,
    update: UpdateFn,
    remove: Option<RemoveFn>,
}

impl SingleItemCollection {
    pub fn new<R, U>(read: R, update: U) -> Self
    where
        R: Fn() -> Option<Value> + Send + 'static,
        U: FnMut(Value) + Send + 'static,
    {
        Self {
            read: Box::new(read),
            update: Box::new(update),
            remove: None,
        }
    }

    pub fn with_remove<F>(mut self, remove: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.remove = Some(Box::new(remove));
        self
    }
}

impl Collection for SingleItemCollection {
    fn insert(&mut self, _item: Value) {
        warn!("Received insert() request in SingleItemCollection, ignoring");
    }

    fn iterator(&mut self) -> Box<dyn CollectionIterator + '_> {
        Box::new(SingleIterator {
            collection: self,
            consumed: false,
            position: Position::NotAdvanced,
        })
    }
}

struct SingleIterator<'a> {
    collection: &'a mut SingleItemCollection,
    consumed: bool,
    position: Position,
}

impl CollectionIterator for SingleIterator<'_> {
    fn has_next(&self) -> bool {
        !self.consumed && (self.collection.read)().is_some()
    }

    fn next(&mut self) -> Result<Value> {
        if self.consumed {
            return Err(SwitchboardError::CursorExhausted);
        }
        let item = (self.collection.read)().ok_or(SwitchboardError::CursorExhausted)?;
        self.consumed = true;
        self.position = Position::Valid;
        Ok(item)
    }

    fn update(&mut self, item: Value) -> Result<()> {
        self.position.require_valid()?;
        (self.collection.update)(item);
        Ok(())
    }

    fn remove(&mut self) -> Result<()> {
        self.position.require_valid()?;
        match self.collection.remove.as_mut() {
            Some(remove) => remove(),
            None => warn!("Received remove() request in SingleItemCollection without a remove accessor"),
        }
        self.position = Position::Deleted;
        Ok(())
    }
}
