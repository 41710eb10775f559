//! Action and facet dispatch
//!
//! Two independently configured layers can answer a named operation: the
//! router's own [`OperationMap`], supplied once at construction, and the
//! backing store's generic operations. The router map is closer to the
//! transport boundary and always wins for a matching name and category — a
//! strict override, never a merge. The layers form a prioritized provider
//! list, checked router-first.
//!
//! Operation names are read from the tail of the request path, so dispatch
//! is indifferent to mount prefixes of arbitrary depth.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use http::Method;
use serde_json::Value;

use crate::error::Error;
use crate::key::{ItemKey, LocationKey};

/// The four operation categories a router dispatches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationCategory {
    /// Side-effecting operation on one item (`POST /{id}/{action}`)
    ItemAction,
    /// Read-only derived view of one item (`GET /{id}/{facet}`)
    ItemFacet,
    /// Side-effecting operation over the collection (`POST /{action}`)
    AllAction,
    /// Read-only derived view over the collection (`GET /{facet}`)
    AllFacet,
}

impl OperationCategory {
    /// Whether the category addresses a single item
    #[must_use]
    pub const fn is_item_scoped(&self) -> bool {
        matches!(self, Self::ItemAction | Self::ItemFacet)
    }
}

impl fmt::Display for OperationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ItemAction => write!(f, "action"),
            Self::ItemFacet => write!(f, "facet"),
            Self::AllAction => write!(f, "all_action"),
            Self::AllFacet => write!(f, "all_facet"),
        }
    }
}

/// Operation name (and item id, for item-scoped categories) read from a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedOperation {
    /// The operation name: always the last path segment
    pub name: String,
    /// The item id: the second-to-last segment, item-scoped categories only
    pub id: Option<String>,
}

/// Extract the operation name from the full request path.
///
/// Only the trailing one or two segments are semantically meaningful; any
/// mount prefix ahead of them is ignored. A path too short for the category
/// is a routing contract violation, not client input.
pub fn extract_operation(
    path: &str,
    category: OperationCategory,
) -> Result<ExtractedOperation, Error> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some(&name) = segments.last() else {
        return Err(Error::internal(format!(
            "path '{path}' has no segments to dispatch as {category}"
        )));
    };
    let id = if category.is_item_scoped() {
        let Some(&id) = segments.len().checked_sub(2).and_then(|i| segments.get(i)) else {
            return Err(Error::internal(format!(
                "path '{path}' too short for {category} dispatch"
            )));
        };
        Some(id.to_owned())
    } else {
        None
    };
    Ok(ExtractedOperation {
        name: name.to_owned(),
        id,
    })
}

/// Request context handed to override handlers
#[derive(Debug, Clone)]
pub struct OpContext {
    /// HTTP method of the request
    pub method: Method,
    /// Full request path, mount prefix included
    pub path: String,
    /// Matched route parameters
    pub params: BTreeMap<String, String>,
}

/// Result type for override handlers
pub type OperationResult = Result<Value, Error>;

/// Handler for item-scoped override operations
pub type ItemOperationFn =
    Arc<dyn Fn(ItemKey, Value, OpContext) -> BoxFuture<'static, OperationResult> + Send + Sync>;

/// Handler for collection-scoped override operations
pub type ScopeOperationFn = Arc<
    dyn Fn(Value, Vec<LocationKey>, OpContext) -> BoxFuture<'static, OperationResult>
        + Send
        + Sync,
>;

/// Router-level override handlers, one independent table per category
///
/// Supplied once at router construction and immutable thereafter; looked up
/// per request by operation name.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use strata_router::dispatch::OperationMap;
///
/// let ops = OperationMap::new()
///     .action("archive", |key, _body, _ctx| async move {
///         Ok(json!({ "archived": key.id() }))
///     })
///     .all_facet("stats", |_params, locations, _ctx| async move {
///         Ok(json!({ "scopes": locations.len() }))
///     });
/// assert!(ops.has_all_facet("stats"));
/// ```
#[derive(Clone, Default)]
pub struct OperationMap {
    actions: HashMap<String, ItemOperationFn>,
    facets: HashMap<String, ItemOperationFn>,
    all_actions: HashMap<String, ScopeOperationFn>,
    all_facets: HashMap<String, ScopeOperationFn>,
}

impl OperationMap {
    /// Create an empty map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item action override
    #[must_use]
    pub fn action<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ItemKey, Value, OpContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OperationResult> + Send + 'static,
    {
        self.actions.insert(name.into(), wrap_item(handler));
        self
    }

    /// Register an item facet override
    #[must_use]
    pub fn facet<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ItemKey, Value, OpContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OperationResult> + Send + 'static,
    {
        self.facets.insert(name.into(), wrap_item(handler));
        self
    }

    /// Register a bulk action override
    #[must_use]
    pub fn all_action<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value, Vec<LocationKey>, OpContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OperationResult> + Send + 'static,
    {
        self.all_actions.insert(name.into(), wrap_scope(handler));
        self
    }

    /// Register a bulk facet override
    #[must_use]
    pub fn all_facet<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value, Vec<LocationKey>, OpContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OperationResult> + Send + 'static,
    {
        self.all_facets.insert(name.into(), wrap_scope(handler));
        self
    }

    /// Look up an item-scoped override for a category and name
    #[must_use]
    pub fn item_override(
        &self,
        category: OperationCategory,
        name: &str,
    ) -> Option<ItemOperationFn> {
        match category {
            OperationCategory::ItemAction => self.actions.get(name).cloned(),
            OperationCategory::ItemFacet => self.facets.get(name).cloned(),
            _ => None,
        }
    }

    /// Look up a collection-scoped override for a category and name
    #[must_use]
    pub fn scope_override(
        &self,
        category: OperationCategory,
        name: &str,
    ) -> Option<ScopeOperationFn> {
        match category {
            OperationCategory::AllAction => self.all_actions.get(name).cloned(),
            OperationCategory::AllFacet => self.all_facets.get(name).cloned(),
            _ => None,
        }
    }

    /// Whether a bulk facet override exists under this name
    #[must_use]
    pub fn has_all_facet(&self, name: &str) -> bool {
        self.all_facets.contains_key(name)
    }
}

impl fmt::Debug for OperationMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationMap")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("facets", &self.facets.keys().collect::<Vec<_>>())
            .field("all_actions", &self.all_actions.keys().collect::<Vec<_>>())
            .field("all_facets", &self.all_facets.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn wrap_item<F, Fut>(handler: F) -> ItemOperationFn
where
    F: Fn(ItemKey, Value, OpContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = OperationResult> + Send + 'static,
{
    Arc::new(move |key, body, ctx| Box::pin(handler(key, body, ctx)))
}

fn wrap_scope<F, Fut>(handler: F) -> ScopeOperationFn
where
    F: Fn(Value, Vec<LocationKey>, OpContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = OperationResult> + Send + 'static,
{
    Arc::new(move |body, locations, ctx| Box::pin(handler(body, locations, ctx)))
}
