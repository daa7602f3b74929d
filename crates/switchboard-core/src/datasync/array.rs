//! Array-backed collection.

use super::collection::{Collection, CollectionIterator, Position};
use crate::{Result, SwitchboardError};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Transform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Ordered sequence of items. Cloning yields another handle to the same items,
/// so the application can keep one handle while the delta engine owns another.
#[derive(Clone)]
pub struct ArrayCollection {
    items: Arc<Mutex<Vec<Value>>>,
    transform: Transform,
}

impl ArrayCollection {
    pub fn new() -> Self {
        Self::from_items(Vec::new())
    }

    pub fn from_items(items: Vec<Value>) -> Self {
        Self {
            items: Arc::new(Mutex::new(items)),
            transform: Arc::new(|item| item),
        }
    }

    /// Set the hook applied to every inserted or updated item.
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transform = Arc::new(transform);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Value>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current items.
    pub fn snapshot(&self) -> Vec<Value> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for ArrayCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ArrayCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayCollection")
            .field("items", &*self.lock())
            .finish()
    }
}

impl Collection for ArrayCollection {
    fn insert(&mut self, item: Value) {
        let item = (self.transform)(item);
        self.lock().push(item);
    }

    fn iterator(&mut self) -> Box<dyn CollectionIterator + '_> {
        Box::new(ArrayIterator {
            items: self.items.lock().unwrap_or_else(PoisonError::into_inner),
            transform: &self.transform,
            next_index: 0,
            position: Position::NotAdvanced,
        })
    }
}

/// Holds the lock for the whole pass; `next_index` is the index `next` will
/// read, so the current item is always `next_index - 1`.
struct ArrayIterator<'a> {
    items: MutexGuard<'a, Vec<Value>>,
    transform: &'a Transform,
    next_index: usize,
    position: Position,
}

impl CollectionIterator for ArrayIterator<'_> {
    fn has_next(&self) -> bool {
        self.next_index < self.items.len()
    }

    fn next(&mut self) -> Result<Value> {
        let item = self
            .items
            .get(self.next_index)
            .cloned()
            .ok_or(SwitchboardError::CursorExhausted)?;
        self.next_index += 1;
        self.position = Position::Valid;
        Ok(item)
    }

    fn update(&mut self, item: Value) -> Result<()> {
        self.position.require_valid()?;
        let current = self.next_index - 1;
        self.items[current] = (self.transform)(item);
        Ok(())
    }

    fn remove(&mut self) -> Result<()> {
        self.position.require_valid()?;
        self.next_index -= 1;
        self.items.remove(self.next_index);
        self.position = Position::Deleted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn colors() -> ArrayCollection {
        ArrayCollection::from_items(vec![json!("red"), json!("blue")])
    }

    #[test]
    fn test_insert_appends() {
        let mut collection = colors();
        collection.insert(json!("orange"));
        assert_eq!(collection.snapshot(), vec![json!("red"), json!("blue"), json!("orange")]);
    }

    #[test]
    fn test_iterator_reads_in_order() {
        let mut collection = colors();
        let mut iter = collection.iterator();
        assert!(iter.has_next());
        assert_eq!(iter.next().unwrap(), json!("red"));
        assert!(iter.has_next());
        assert_eq!(iter.next().unwrap(), json!("blue"));
        assert!(!iter.has_next());
        assert!(matches!(iter.next(), Err(SwitchboardError::CursorExhausted)));
    }

    #[test]
    fn test_update_current_item() {
        let mut collection = colors();
        {
            let mut iter = collection.iterator();
            iter.next().unwrap();
            iter.update(json!("black")).unwrap();
        }
        assert_eq!(collection.snapshot(), vec![json!("black"), json!("blue")]);
    }

    #[test]
    fn test_update_or_remove_before_next_fails() {
        let mut collection = colors();
        let mut iter = collection.iterator();
        assert!(matches!(
            iter.update(json!("black")),
            Err(SwitchboardError::CursorNotPositioned)
        ));
        assert!(matches!(iter.remove(), Err(SwitchboardError::CursorNotPositioned)));
    }

    #[test]
    fn test_remove_keeps_forward_position() {
        let mut collection = colors();
        {
            let mut iter = collection.iterator();
            iter.next().unwrap();
            iter.remove().unwrap();
            assert!(iter.has_next());
            assert_eq!(iter.next().unwrap(), json!("blue"));
            iter.remove().unwrap();
            assert!(!iter.has_next());
        }
        assert!(collection.is_empty());
    }

    #[test]
    fn test_act_on_deleted_item_fails() {
        let mut collection = colors();
        let mut iter = collection.iterator();
        iter.next().unwrap();
        iter.remove().unwrap();
        assert!(matches!(iter.remove(), Err(SwitchboardError::CursorOnDeletedItem)));
        assert!(matches!(
            iter.update(json!("black")),
            Err(SwitchboardError::CursorOnDeletedItem)
        ));
    }

    #[test]
    fn test_transform_applies_to_insert_and_update() {
        let mut collection = ArrayCollection::new().with_transform(|item| json!({ "wrapped": item }));
        collection.insert(json!(1));
        {
            let mut iter = collection.iterator();
            iter.next().unwrap();
            iter.update(json!(2)).unwrap();
        }
        assert_eq!(collection.snapshot(), vec![json!({"wrapped": 2})]);
    }

    #[test]
    fn test_clones_share_items() {
        let view = colors();
        let mut engine_side = view.clone();
        engine_side.insert(json!("green"));
        assert_eq!(view.len(), 3);
    }
}
