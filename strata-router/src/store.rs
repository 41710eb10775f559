//! The backing-store contract
//!
//! Routers consume the store through this narrow async trait and never see
//! its persistence model. Error classification is explicit: the store tags
//! not-found, validation, and unknown-operation failures itself, rather than
//! callers sniffing message text.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::envelope::ResultEnvelope;
use crate::key::{Item, ItemKey, LocationKey};
use crate::query::{ItemQuery, PageOptions};

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by a backing store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced key or parent location absent
    #[error("{0}")]
    NotFound(String),
    /// Supplied data failed the store's rules
    #[error("{0}")]
    Validation(String),
    /// The store has no operation registered under this name
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),
    /// Opaque store-internal failure
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    /// A not-found failure with a client-visible message
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// A validation failure; the message stays store-internal
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// The named action/facet/finder does not exist in this store
    pub fn unknown_operation(name: impl Into<String>) -> Self {
        Self::UnknownOperation(name.into())
    }

    /// Wrap an opaque failure
    pub fn other(source: impl Into<anyhow::Error>) -> Self {
        Self::Other(source.into())
    }
}

/// Async contract a backing store implements per item kind
///
/// All calls are non-blocking handoffs; the store owns any ordering or
/// transactional guarantees. Location arrays arrive nearest parent first and
/// must be interpreted in that order.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Persist a new item within the given parent scope
    async fn create(&self, item: Item, locations: &[LocationKey]) -> StoreResult<Item>;

    /// Fetch one item by key
    async fn get(&self, key: &ItemKey) -> StoreResult<Item>;

    /// Apply a partial field update and return the updated item
    async fn update(&self, key: &ItemKey, partial: Map<String, Value>) -> StoreResult<Item>;

    /// Delete an item; `false` means it did not exist
    async fn remove(&self, key: &ItemKey) -> StoreResult<bool>;

    /// Filtered, paginated bulk read; the store fills envelope metadata
    async fn all(
        &self,
        query: &ItemQuery,
        locations: &[LocationKey],
        page: PageOptions,
    ) -> StoreResult<ResultEnvelope>;

    /// Run a named multi-result finder
    async fn find(
        &self,
        name: &str,
        params: &Value,
        locations: &[LocationKey],
    ) -> StoreResult<Vec<Item>>;

    /// Run a named single-result finder
    async fn find_one(
        &self,
        name: &str,
        params: &Value,
        locations: &[LocationKey],
    ) -> StoreResult<Option<Item>>;

    /// Run a named side-effecting operation on one item.
    ///
    /// Returns the operation result plus a sequence of side-effect records
    /// (e.g. events to publish).
    async fn action(
        &self,
        key: &ItemKey,
        name: &str,
        body: Value,
    ) -> StoreResult<(Value, Vec<Value>)>;

    /// Run a named read-only derived view on one item
    async fn facet(&self, key: &ItemKey, name: &str, params: &Value) -> StoreResult<Value>;

    /// Run a named side-effecting operation over a collection scope
    async fn all_action(
        &self,
        name: &str,
        body: Value,
        locations: &[LocationKey],
    ) -> StoreResult<(Vec<Value>, Vec<Value>)>;

    /// Run a named read-only derived view over a collection scope
    async fn all_facet(
        &self,
        name: &str,
        params: &Value,
        locations: &[LocationKey],
    ) -> StoreResult<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_messages() {
        assert_eq!(
            StoreError::not_found("note 'n1' not found").to_string(),
            "note 'n1' not found"
        );
        assert_eq!(
            StoreError::unknown_operation("promote").to_string(),
            "unknown operation 'promote'"
        );
        assert_eq!(
            StoreError::other(anyhow::anyhow!("disk full")).to_string(),
            "disk full"
        );
    }
}
