//! Delta synchronization engine.
//!
//! The server describes every change to a subscribed model as a [`Delta`].
//! A [`DeltaProcessor`] applies each delta to the [`Collection`] registered for
//! its model (and optional tag), locating the targeted item with an
//! [`ItemsEqual`] predicate during a single forward pass.
//!
//! # Example
//!
//! ```rust,ignore
//! let players = ArrayCollection::new();
//! let mut processor = DeltaProcessor::new();
//! processor.register("Player", players.clone());
//! processor.process_value(json!({"type": "insert", "model": "Player", "data": {"id": 1}}));
//! assert_eq!(players.len(), 1);
//! ```

mod array;
mod collection;
mod delta;
mod processor;
mod single;

pub use array::ArrayCollection;
pub use collection::{Collection, CollectionIterator};
pub use delta::{Delta, ItemsEqual};
pub use processor::DeltaProcessor;
pub use single::SingleItemCollection;
