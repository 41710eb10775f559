//! Query-string translation for list requests
//!
//! A list request runs in one of two modes. If the reserved `finder`
//! parameter is present, the request names a store-defined query shortcut
//! and carries its parameters as JSON in `finderParams`. Otherwise every
//! non-reserved parameter becomes an equality predicate in an [`ItemQuery`]
//! and `limit`/`offset` become [`PageOptions`].
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use strata_router::query::{translate, ListRequest};
//!
//! let mut raw = BTreeMap::new();
//! raw.insert("status".to_string(), "open".to_string());
//! raw.insert("limit".to_string(), "10".to_string());
//!
//! let ListRequest::Query { query, page } = translate(&raw).unwrap() else {
//!     panic!("expected query mode");
//! };
//! assert_eq!(query.get("status"), Some("open"));
//! assert_eq!(page.limit, Some(10));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Reserved parameter selecting finder mode
pub const FINDER: &str = "finder";
/// Reserved parameter carrying finder arguments as JSON
pub const FINDER_PARAMS: &str = "finderParams";
/// Reserved parameter selecting the single-result finder (`"true"` literal)
pub const ONE: &str = "one";
/// Reserved pagination parameter
pub const LIMIT: &str = "limit";
/// Reserved pagination parameter
pub const OFFSET: &str = "offset";

const RESERVED: [&str; 5] = [FINDER, FINDER_PARAMS, ONE, LIMIT, OFFSET];

/// Field/value equality predicates, independent of pagination
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuery {
    predicates: BTreeMap<String, String>,
}

impl ItemQuery {
    /// Create an empty query
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate
    #[must_use]
    pub fn with_predicate(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.predicates.insert(field.into(), value.into());
        self
    }

    /// Look up the predicate value for a field
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.predicates.get(field).map(String::as_str)
    }

    /// Iterate predicates in field order
    pub fn predicates(&self) -> impl Iterator<Item = (&str, &str)> {
        self.predicates
            .iter()
            .map(|(field, value)| (field.as_str(), value.as_str()))
    }

    /// Whether the query has no predicates
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// Pagination options; absent values mean "use store default"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageOptions {
    /// Maximum number of items to return
    pub limit: Option<u64>,
    /// Number of items to skip
    pub offset: Option<u64>,
}

impl PageOptions {
    /// Cap the limit at a configured maximum, leaving absent limits absent
    #[must_use]
    pub fn clamp_limit(self, max: Option<u64>) -> Self {
        match (self.limit, max) {
            (Some(limit), Some(max)) => Self {
                limit: Some(limit.min(max)),
                offset: self.offset,
            },
            _ => self,
        }
    }
}

/// A named, store-defined query shortcut
#[derive(Debug, Clone, PartialEq)]
pub struct FinderSpec {
    /// Finder name as registered in the store
    pub name: String,
    /// Finder arguments, parsed from `finderParams`
    pub params: Value,
    /// Whether the single-result finder was requested
    pub one: bool,
}

/// The translated form of a list request
#[derive(Debug, Clone, PartialEq)]
pub enum ListRequest {
    /// Named finder mode
    Finder(FinderSpec),
    /// Generic filtered/paginated mode
    Query {
        /// Equality predicates from non-reserved parameters
        query: ItemQuery,
        /// Pagination parsed from `limit`/`offset`
        page: PageOptions,
    },
}

/// Translate raw query-string parameters into a [`ListRequest`].
///
/// Fails with a malformed-request error, before any store involvement, when
/// `finderParams` is not valid JSON. Non-numeric `limit`/`offset` values are
/// dropped rather than defaulted to zero.
pub fn translate(raw: &BTreeMap<String, String>) -> Result<ListRequest, Error> {
    if let Some(name) = raw.get(FINDER) {
        let params = match raw.get(FINDER_PARAMS) {
            Some(text) => serde_json::from_str(text).map_err(|err| {
                Error::malformed_request(format!("invalid finderParams JSON: {err}"))
            })?,
            None => Value::Object(serde_json::Map::new()),
        };
        let one = raw.get(ONE).is_some_and(|value| value == "true");
        return Ok(ListRequest::Finder(FinderSpec {
            name: name.clone(),
            params,
            one,
        }));
    }

    let mut query = ItemQuery::new();
    for (field, value) in raw {
        if !RESERVED.contains(&field.as_str()) {
            query.predicates.insert(field.clone(), value.clone());
        }
    }
    let page = PageOptions {
        limit: parse_decimal(raw.get(LIMIT)),
        offset: parse_decimal(raw.get(OFFSET)),
    };
    Ok(ListRequest::Query { query, page })
}

fn parse_decimal(value: Option<&String>) -> Option<u64> {
    value.and_then(|text| text.parse().ok())
}
