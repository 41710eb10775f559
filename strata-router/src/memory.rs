//! In-memory reference store
//!
//! [`MemoryItemStore`] implements the full [`ItemStore`] contract against a
//! concurrent map, scoped by location chain. Finders, actions, and facets
//! are closures registered at construction, matching the contract's rule
//! that unknown names fail with an unknown-operation error. Intended for
//! tests, demos, and as a template for real backends.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use strata_router::memory::MemoryItemStore;
//!
//! let store = MemoryItemStore::new()
//!     .with_finder("byStatus", |params, items| {
//!         let wanted = params["status"].clone();
//!         items
//!             .into_iter()
//!             .filter(|item| item.field("status") == Some(&wanted))
//!             .collect()
//!     })
//!     .with_facet("summary", |item, _params| {
//!         json!({ "id": item.key.id })
//!     });
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::envelope::{EnvelopeMetadata, ResultEnvelope};
use crate::key::{Item, ItemKey, LocationKey};
use crate::query::{ItemQuery, PageOptions};
use crate::store::{ItemStore, StoreError, StoreResult};

type FinderFn = Arc<dyn Fn(&Value, Vec<Item>) -> Vec<Item> + Send + Sync>;
type ActionFn = Arc<dyn Fn(&Item, &Value) -> (Value, Vec<Value>) + Send + Sync>;
type FacetFn = Arc<dyn Fn(&Item, &Value) -> Value + Send + Sync>;
type AllActionFn = Arc<dyn Fn(&Value, Vec<Item>) -> (Vec<Value>, Vec<Value>) + Send + Sync>;
type AllFacetFn = Arc<dyn Fn(&Value, Vec<Item>) -> Value + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StorageKey {
    locations: Vec<LocationKey>,
    kind: String,
    id: String,
}

impl StorageKey {
    fn from_item_key(key: &ItemKey) -> Self {
        Self {
            locations: key.locations().to_vec(),
            kind: key.kind().to_owned(),
            id: key.id().to_owned(),
        }
    }
}

/// Concurrent in-memory [`ItemStore`]
#[derive(Default)]
pub struct MemoryItemStore {
    items: DashMap<StorageKey, Item>,
    required_fields: Vec<String>,
    finders: HashMap<String, FinderFn>,
    actions: HashMap<String, ActionFn>,
    facets: HashMap<String, FacetFn>,
    all_actions: HashMap<String, AllActionFn>,
    all_facets: HashMap<String, AllFacetFn>,
}

impl MemoryItemStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare fields that must be present and non-null on create and update
    #[must_use]
    pub fn with_required_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Register a named finder
    #[must_use]
    pub fn with_finder<F>(mut self, name: impl Into<String>, finder: F) -> Self
    where
        F: Fn(&Value, Vec<Item>) -> Vec<Item> + Send + Sync + 'static,
    {
        self.finders.insert(name.into(), Arc::new(finder));
        self
    }

    /// Register a named item action
    #[must_use]
    pub fn with_action<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&Item, &Value) -> (Value, Vec<Value>) + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Arc::new(action));
        self
    }

    /// Register a named item facet
    #[must_use]
    pub fn with_facet<F>(mut self, name: impl Into<String>, facet: F) -> Self
    where
        F: Fn(&Item, &Value) -> Value + Send + Sync + 'static,
    {
        self.facets.insert(name.into(), Arc::new(facet));
        self
    }

    /// Register a named bulk action
    #[must_use]
    pub fn with_all_action<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&Value, Vec<Item>) -> (Vec<Value>, Vec<Value>) + Send + Sync + 'static,
    {
        self.all_actions.insert(name.into(), Arc::new(action));
        self
    }

    /// Register a named bulk facet
    #[must_use]
    pub fn with_all_facet<F>(mut self, name: impl Into<String>, facet: F) -> Self
    where
        F: Fn(&Value, Vec<Item>) -> Value + Send + Sync + 'static,
    {
        self.all_facets.insert(name.into(), Arc::new(facet));
        self
    }

    /// Number of items currently stored, across all scopes
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the store holds no items
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn scope_items(&self, locations: &[LocationKey]) -> Vec<Item> {
        let mut items: Vec<Item> = self
            .items
            .iter()
            .filter(|entry| entry.key().locations == locations)
            .map(|entry| entry.value().clone())
            .collect();
        items.sort_by(|a, b| a.key.id.cmp(&b.key.id));
        items
    }

    fn check_required(&self, fields: &Map<String, Value>) -> StoreResult<()> {
        for name in &self.required_fields {
            match fields.get(name) {
                Some(value) if !value.is_null() => {}
                _ => {
                    return Err(StoreError::validation(format!(
                        "field '{name}' cannot be null"
                    )))
                }
            }
        }
        Ok(())
    }

    fn check_parent(&self, locations: &[LocationKey]) -> StoreResult<()> {
        let Some((nearest, rest)) = locations.split_first() else {
            return Ok(());
        };
        let parent = StorageKey {
            locations: rest.to_vec(),
            kind: nearest.kind.clone(),
            id: nearest.id.clone(),
        };
        if self.items.contains_key(&parent) {
            Ok(())
        } else {
            Err(StoreError::not_found(format!(
                "{} '{}' not found",
                nearest.kind, nearest.id
            )))
        }
    }

    fn fetch(&self, key: &ItemKey) -> StoreResult<Item> {
        self.items
            .get(&StorageKey::from_item_key(key))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                StoreError::not_found(format!("{} '{}' not found", key.kind(), key.id()))
            })
    }
}

fn matches_query(item: &Item, query: &ItemQuery) -> bool {
    query.predicates().all(|(field, wanted)| {
        item.field(field).is_some_and(|value| match value {
            Value::String(text) => text == wanted,
            other => other.to_string() == wanted,
        })
    })
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn create(&self, item: Item, locations: &[LocationKey]) -> StoreResult<Item> {
        self.check_required(&item.fields)?;
        self.check_parent(locations)?;
        let storage_key = StorageKey {
            locations: locations.to_vec(),
            kind: item.key.kind.clone(),
            id: item.key.id.clone(),
        };
        if self.items.contains_key(&storage_key) {
            return Err(StoreError::validation(format!(
                "{} '{}' already exists",
                item.key.kind, item.key.id
            )));
        }
        self.items.insert(storage_key, item.clone());
        Ok(item)
    }

    async fn get(&self, key: &ItemKey) -> StoreResult<Item> {
        self.fetch(key)
    }

    async fn update(&self, key: &ItemKey, partial: Map<String, Value>) -> StoreResult<Item> {
        let storage_key = StorageKey::from_item_key(key);
        let Some(mut entry) = self.items.get_mut(&storage_key) else {
            return Err(StoreError::not_found(format!(
                "{} '{}' not found",
                key.kind(),
                key.id()
            )));
        };
        // Merge into a copy so a rejected update never dirties the entry.
        let mut merged = entry.fields.clone();
        for (name, value) in partial {
            merged.insert(name, value);
        }
        self.check_required(&merged)?;
        entry.fields = merged;
        Ok(entry.value().clone())
    }

    async fn remove(&self, key: &ItemKey) -> StoreResult<bool> {
        Ok(self.items.remove(&StorageKey::from_item_key(key)).is_some())
    }

    async fn all(
        &self,
        query: &ItemQuery,
        locations: &[LocationKey],
        page: PageOptions,
    ) -> StoreResult<ResultEnvelope> {
        let matching: Vec<Item> = self
            .scope_items(locations)
            .into_iter()
            .filter(|item| matches_query(item, query))
            .collect();

        let total = matching.len() as u64;
        let offset = page.offset.unwrap_or(0);
        let items: Vec<Item> = matching
            .into_iter()
            .skip(offset as usize)
            .take(page.limit.map_or(usize::MAX, |limit| limit as usize))
            .collect();
        let returned = items.len() as u64;

        Ok(ResultEnvelope::new(
            items,
            EnvelopeMetadata {
                total,
                returned,
                offset,
                has_more: offset + returned < total,
            },
        ))
    }

    async fn find(
        &self,
        name: &str,
        params: &Value,
        locations: &[LocationKey],
    ) -> StoreResult<Vec<Item>> {
        let finder = self
            .finders
            .get(name)
            .ok_or_else(|| StoreError::unknown_operation(name))?;
        Ok(finder(params, self.scope_items(locations)))
    }

    async fn find_one(
        &self,
        name: &str,
        params: &Value,
        locations: &[LocationKey],
    ) -> StoreResult<Option<Item>> {
        let items = self.find(name, params, locations).await?;
        Ok(items.into_iter().next())
    }

    async fn action(
        &self,
        key: &ItemKey,
        name: &str,
        body: Value,
    ) -> StoreResult<(Value, Vec<Value>)> {
        let action = self
            .actions
            .get(name)
            .ok_or_else(|| StoreError::unknown_operation(name))?;
        let item = self.fetch(key)?;
        Ok(action(&item, &body))
    }

    async fn facet(&self, key: &ItemKey, name: &str, params: &Value) -> StoreResult<Value> {
        let facet = self
            .facets
            .get(name)
            .ok_or_else(|| StoreError::unknown_operation(name))?;
        let item = self.fetch(key)?;
        Ok(facet(&item, params))
    }

    async fn all_action(
        &self,
        name: &str,
        body: Value,
        locations: &[LocationKey],
    ) -> StoreResult<(Vec<Value>, Vec<Value>)> {
        let action = self
            .all_actions
            .get(name)
            .ok_or_else(|| StoreError::unknown_operation(name))?;
        Ok(action(&body, self.scope_items(locations)))
    }

    async fn all_facet(
        &self,
        name: &str,
        params: &Value,
        locations: &[LocationKey],
    ) -> StoreResult<Value> {
        let facet = self
            .all_facets
            .get(name)
            .ok_or_else(|| StoreError::unknown_operation(name))?;
        Ok(facet(params, self.scope_items(locations)))
    }
}
