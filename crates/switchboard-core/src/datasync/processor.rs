//! Applies deltas to registered collections.

use super::collection::Collection;
use super::delta::{Delta, ItemsEqual};
use crate::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace, warn};

enum Registered {
    Single(Box<dyn Collection>),
    Tagged(HashMap<String, Box<dyn Collection>>),
}

/// Routes deltas to the collection registered for their model (and tag).
#[derive(Default)]
pub struct DeltaProcessor {
    collections: HashMap<String, Registered>,
    equality: ItemsEqual,
}

impl DeltaProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the predicate used to find the item an update or delete targets.
    pub fn with_equality(mut self, equality: ItemsEqual) -> Self {
        self.equality = equality;
        self
    }

    /// Register `collection` as the sole target of `model`.
    ///
    /// Replaces any earlier registration for the model, tagged or not.
    pub fn register(&mut self, model: impl Into<String>, collection: impl Collection + 'static) -> &mut Self {
        let model = model.into();
        debug!("Registering collection for model \"{}\"", model);
        self.collections
            .insert(model, Registered::Single(Box::new(collection)));
        self
    }

    /// Register `collection` as one tagged view of `model`.
    pub fn register_tagged(
        &mut self,
        model: impl Into<String>,
        tag: impl Into<String>,
        collection: impl Collection + 'static,
    ) -> &mut Self {
        let model = model.into();
        let tag = tag.into();
        debug!("Registering collection for model \"{}\" tag \"{}\"", model, tag);

        let entry = self
            .collections
            .entry(model)
            .or_insert_with(|| Registered::Tagged(HashMap::new()));
        if let Registered::Single(_) = entry {
            *entry = Registered::Tagged(HashMap::new());
        }
        if let Registered::Tagged(views) = entry {
            views.insert(tag, Box::new(collection));
        }
        self
    }

    /// Collection a delta for `(model, tag)` would be applied to.
    pub fn collection(&mut self, model: &str, tag: Option<&str>) -> Option<&mut (dyn Collection + 'static)> {
        match (self.collections.get_mut(model)?, tag) {
            (Registered::Single(collection), _) => Some(collection.as_mut()),
            (Registered::Tagged(views), Some(tag)) => views.get_mut(tag).map(|c| c.as_mut()),
            (Registered::Tagged(_), None) => None,
        }
    }

    /// Apply a raw delta payload.
    ///
    /// Payloads that are not a valid delta are logged and dropped.
    pub fn process_value(&mut self, value: Value) {
        match serde_json::from_value::<Delta>(value) {
            Ok(delta) => {
                if let Err(e) = self.process_delta(delta) {
                    warn!("Failed to apply delta: {}", e);
                }
            }
            Err(e) => warn!("Dropping malformed delta: {}", e),
        }
    }

    /// Apply one delta to its collection.
    ///
    /// Returns `false` when the model or tag is unregistered; the delta is
    /// logged and dropped. An update or delete matching no item changes nothing
    /// but still counts as processed. Errors only come from a misbehaving
    /// collection iterator.
    pub fn process_delta(&mut self, delta: Delta) -> Result<bool> {
        let equality = self.equality.clone();
        let model = delta.model().to_string();
        let tag = delta.tag().map(str::to_string);

        let Some(collection) = self.collection(&model, tag.as_deref()) else {
            warn!(
                "Dropping {} delta for unregistered model \"{}\" (tag {:?})",
                delta.kind(),
                model,
                tag
            );
            return Ok(false);
        };

        match delta {
            Delta::Insert { data, .. } => collection.insert(data),
            Delta::Update {
                old_data, new_data, ..
            } => {
                let mut iter = collection.iterator();
                while iter.has_next() {
                    let item = iter.next()?;
                    if equality.matches(&item, &old_data) {
                        iter.update(new_data)?;
                        return Ok(true);
                    }
                }
                trace!("Update delta for \"{}\" matched no item", model);
            }
            Delta::Delete { data, .. } => {
                let mut iter = collection.iterator();
                while iter.has_next() {
                    let item = iter.next()?;
                    if equality.matches(&item, &data) {
                        iter.remove()?;
                        return Ok(true);
                    }
                }
                trace!("Delete delta for \"{}\" matched no item", model);
            }
        }
        Ok(true)
    }
}

impl fmt::Debug for DeltaProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut models: Vec<&str> = self.collections.keys().map(String::as_str).collect();
        models.sort_unstable();
        f.debug_struct("DeltaProcessor")
            .field("models", &models)
            .field("equality", &self.equality)
            .finish()
    }
}
