//! Client-local handle allocation.

use crate::config::HandleConfig;
use crate::{Result, SwitchboardError};
use rand::Rng;
use std::collections::HashMap;

/// Live objects keyed by a random private handle in `0..=HANDLE_MAX`.
///
/// At most [`HandleConfig::MAX_LIVE`] entries are live at once, which keeps
/// the random probe for a free handle short.
#[derive(Debug)]
pub struct HandleTable<T> {
    entries: HashMap<u8, T>,
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Draw a free handle and store the value built for it.
    pub fn allocate(&mut self, build: impl FnOnce(u8) -> T) -> Result<u8> {
        let live = self.entries.len();
        if live >= HandleConfig::MAX_LIVE {
            return Err(SwitchboardError::HandleSpaceExhausted {
                live,
                limit: HandleConfig::MAX_LIVE,
            });
        }

        let mut rng = rand::rng();
        let handle = loop {
            let candidate = rng.random_range(0..=HandleConfig::HANDLE_MAX);
            if !self.entries.contains_key(&candidate) {
                break candidate;
            }
        };
        self.entries.insert(handle, build(handle));
        Ok(handle)
    }

    pub fn get(&self, handle: u8) -> Option<&T> {
        self.entries.get(&handle)
    }

    pub fn remove(&mut self, handle: u8) -> Option<T> {
        self.entries.remove(&handle)
    }

    /// Remove the entry only if `matches` accepts it.
    pub fn remove_if(&mut self, handle: u8, matches: impl FnOnce(&T) -> bool) -> Option<T> {
        if self.entries.get(&handle).is_some_and(matches) {
            self.entries.remove(&handle)
        } else {
            None
        }
    }

    pub fn retain(&mut self, keep: impl FnMut(&u8, &mut T) -> bool) {
        self.entries.retain(keep);
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    pub fn contains(&self, handle: u8) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Live handles, sorted.
    pub fn handles(&self) -> Vec<u8> {
        let mut handles: Vec<u8> = self.entries.keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
