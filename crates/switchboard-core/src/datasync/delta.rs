//! Delta wire shape and item equality predicates.

use crate::config::DeltaConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// One incremental change to a server-side model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Delta {
    Insert {
        model: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
        data: Value,
    },
    Update {
        model: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
        #[serde(rename = "oldData")]
        old_data: Value,
        #[serde(rename = "newData")]
        new_data: Value,
    },
    Delete {
        model: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
        data: Value,
    },
}

impl Delta {
    pub fn model(&self) -> &str {
        match self {
            Delta::Insert { model, .. } | Delta::Update { model, .. } | Delta::Delete { model, .. } => model,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Delta::Insert { tag, .. } | Delta::Update { tag, .. } | Delta::Delete { tag, .. } => tag.as_deref(),
        }
    }

    /// Wire name of the delta type.
    pub fn kind(&self) -> &'static str {
        match self {
            Delta::Insert { .. } => "insert",
            Delta::Update { .. } => "update",
            Delta::Delete { .. } => "delete",
        }
    }
}

/// Predicate deciding whether a collection item is the one a delta targets.
#[derive(Clone)]
pub enum ItemsEqual {
    /// Both items carry the field and its values are equal.
    Field(String),
    /// Whole-value equality.
    Structural,
    Custom(Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>),
}

impl ItemsEqual {
    pub fn field(name: impl Into<String>) -> Self {
        ItemsEqual::Field(name.into())
    }

    pub fn structural() -> Self {
        ItemsEqual::Structural
    }

    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        ItemsEqual::Custom(Arc::new(predicate))
    }

    pub fn matches(&self, item: &Value, target: &Value) -> bool {
        match self {
            ItemsEqual::Field(name) => match (item.get(name), target.get(name)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            ItemsEqual::Structural => item == target,
            ItemsEqual::Custom(predicate) => predicate(item, target),
        }
    }
}

impl Default for ItemsEqual {
    fn default() -> Self {
        ItemsEqual::field(DeltaConfig::DEFAULT_ID_FIELD)
    }
}

impl fmt::Debug for ItemsEqual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemsEqual::Field(name) => f.debug_tuple("Field").field(name).finish(),
            ItemsEqual::Structural => f.write_str("Structural"),
            ItemsEqual::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
