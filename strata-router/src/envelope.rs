//! Bulk-read result shaping
//!
//! Both retrieval modes — generic query and named finder — return the same
//! [`ResultEnvelope`] shape, so consumers never need to know which mode
//! served them.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::key::{validate_primary_key, Item};

/// Pagination metadata attached to bulk reads
///
/// Serialized with camelCase keys (`hasMore`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeMetadata {
    /// Total number of matching items across all pages
    pub total: u64,
    /// Number of items in this envelope
    pub returned: u64,
    /// Number of items skipped before this page
    pub offset: u64,
    /// Whether further items exist past this page
    pub has_more: bool,
}

impl EnvelopeMetadata {
    /// Metadata for a complete, non-paginated result set.
    ///
    /// Finder results are not assumed paginated by the store, so
    /// `total == returned`, `offset == 0`, and `hasMore == false`.
    #[must_use]
    pub fn complete(count: u64) -> Self {
        Self {
            total: count,
            returned: count,
            offset: 0,
            has_more: false,
        }
    }
}

/// The uniform shape returned by list endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// Ordered result items
    pub items: Vec<Item>,
    /// Pagination metadata
    pub metadata: EnvelopeMetadata,
}

impl ResultEnvelope {
    /// Create an envelope from items and explicit metadata
    pub fn new(items: Vec<Item>, metadata: EnvelopeMetadata) -> Self {
        Self { items, metadata }
    }

    /// Wrap a complete (finder-style) result set with synthetic metadata
    #[must_use]
    pub fn complete(items: Vec<Item>) -> Self {
        let metadata = EnvelopeMetadata::complete(items.len() as u64);
        Self { items, metadata }
    }

    /// Re-validate every item against the expected kind.
    ///
    /// Guarantees type-tagged consistency at the boundary regardless of
    /// store correctness.
    pub fn validate_kinds(self, expected_kind: &str) -> Result<Self, Error> {
        let Self { items, metadata } = self;
        let items = items
            .into_iter()
            .map(|item| validate_primary_key(item, expected_kind))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { items, metadata })
    }
}

impl IntoResponse for ResultEnvelope {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}
