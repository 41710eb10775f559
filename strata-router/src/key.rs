//! Hierarchical identity keys and the item shape
//!
//! A **primary** item is identified by kind + id alone. A **contained** item
//! additionally carries an ordered chain of [`LocationKey`]s, nearest parent
//! first, that pins it to its parent scopes. Keys are value types: composing
//! a composite key never mutates the primary key it was built from.
//!
//! # Example
//!
//! ```rust
//! use strata_router::key::{CompositeKey, ItemKey, LocationKey, PrimaryKey};
//!
//! let primary = PrimaryKey::new("task", "t1");
//! let key = ItemKey::from(CompositeKey::new(
//!     primary,
//!     vec![
//!         LocationKey::new("project", "p1"),
//!         LocationKey::new("org", "o1"),
//!     ],
//! ));
//! assert_eq!(key.kind(), "task");
//! assert_eq!(key.locations().len(), 2);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// Top-level identity: item kind plus an opaque identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrimaryKey {
    /// Compile-time-known discriminator for the item type
    pub kind: String,
    /// Opaque identifier (string or UUID)
    pub id: String,
}

impl PrimaryKey {
    /// Create a new primary key
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// Reference to a parent scope, never the item's own identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationKey {
    /// Kind of the parent item this location refers to
    pub kind: String,
    /// Identifier of the parent item
    pub id: String,
}

impl LocationKey {
    /// Create a new location key
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// Unambiguous identity of a contained item: primary key plus location chain
///
/// The location order encodes the nesting path (nearest parent first) and is
/// preserved exactly when handed to the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositeKey {
    /// Item kind
    pub kind: String,
    /// Item identifier
    pub id: String,
    /// Parent scope chain, nearest first, length 1..=5
    pub locations: Vec<LocationKey>,
}

impl CompositeKey {
    /// Build a composite key from a primary key and a location chain
    #[must_use]
    pub fn new(primary: PrimaryKey, locations: Vec<LocationKey>) -> Self {
        Self {
            kind: primary.kind,
            id: primary.id,
            locations,
        }
    }

    /// The primary portion of this key, without locations
    #[must_use]
    pub fn primary(&self) -> PrimaryKey {
        PrimaryKey::new(&self.kind, &self.id)
    }
}

/// The key shape store calls receive
///
/// Primary routers produce `Primary` keys; contained routers always produce
/// `Composite` keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemKey {
    /// Contained item identity
    Composite(CompositeKey),
    /// Top-level item identity
    Primary(PrimaryKey),
}

impl ItemKey {
    /// Item kind discriminator
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Primary(key) => &key.kind,
            Self::Composite(key) => &key.kind,
        }
    }

    /// Item identifier
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Primary(key) => &key.id,
            Self::Composite(key) => &key.id,
        }
    }

    /// Parent scope chain; empty for primary keys
    #[must_use]
    pub fn locations(&self) -> &[LocationKey] {
        match self {
            Self::Primary(_) => &[],
            Self::Composite(key) => &key.locations,
        }
    }
}

impl From<PrimaryKey> for ItemKey {
    fn from(key: PrimaryKey) -> Self {
        Self::Primary(key)
    }
}

impl From<CompositeKey> for ItemKey {
    fn from(key: CompositeKey) -> Self {
        Self::Composite(key)
    }
}

/// A stored item: its primary key plus arbitrary JSON fields
///
/// The fields flatten into the item's JSON representation alongside `key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// The item's identity
    pub key: PrimaryKey,
    /// Item payload
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Item {
    /// Create an item with no fields
    pub fn new(key: PrimaryKey) -> Self {
        Self {
            key,
            fields: Map::new(),
        }
    }

    /// Create an item from a key and a field map
    pub fn with_fields(key: PrimaryKey, fields: Map<String, Value>) -> Self {
        Self { key, fields }
    }

    /// Look up a payload field by name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Set a payload field
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }
}

/// Confirm an item's key kind matches the router's configured kind.
///
/// Applied after every store call that returns items, so a mistyped item is
/// never forwarded to the transport layer.
pub fn validate_primary_key(item: Item, expected_kind: &str) -> Result<Item, Error> {
    if item.key.kind == expected_kind {
        Ok(item)
    } else {
        Err(Error::validation(format!(
            "item kind '{}' does not match expected kind '{}'",
            item.key.kind, expected_kind
        )))
    }
}
