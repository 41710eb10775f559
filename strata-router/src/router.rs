//! Resource routers and per-verb orchestration
//!
//! A [`ResourceRouter`] binds one item kind to one [`ItemStore`] and exposes
//! the full verb surface as an [`axum::Router`]: create, read, update,
//! delete, filtered/paginated listing, named finders, and the four dispatch
//! categories (item/bulk actions and facets). Each HTTP handler is a thin
//! orchestrator: compose identity from the request scope, translate the
//! query string, resolve the operation between router overrides and the
//! store, and shape the response. Status codes come from the error taxonomy,
//! never from the orchestrators.
//!
//! Routers nest: a contained router holds a handle to its parent level and
//! prefixes every store call with the composed location chain, nearest
//! parent first.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use axum::Router;
//! use strata_router::memory::MemoryItemStore;
//! use strata_router::router::ResourceRouter;
//!
//! # fn main() -> Result<(), strata_router::error::Error> {
//! let store = Arc::new(MemoryItemStore::new());
//! let notes = ResourceRouter::builder("note", store).build()?;
//! let app: Router = Router::new().nest("/notes", notes.into_router());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, OriginalUri, Query, RawPathParams, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::RouterConfig;
use crate::dispatch::{extract_operation, OpContext, OperationCategory, OperationMap};
use crate::envelope::ResultEnvelope;
use crate::error::{Error, Result};
use crate::key::{validate_primary_key, CompositeKey, Item, ItemKey, LocationKey, PrimaryKey};
use crate::location::{Containment, LocationSource};
use crate::normalize::normalize_temporal_fields;
use crate::query::{translate, ListRequest};
use crate::scope::RequestScope;
use crate::store::{ItemStore, StoreError};

/// Hook run on the stored item after a successful create, before the
/// response is shaped
pub type PostCreateHook =
    Arc<dyn Fn(&mut Item, &[LocationKey]) -> Result<()> + Send + Sync>;

/// One item kind's full HTTP surface over one backing store
pub struct ResourceRouter {
    kind: String,
    store: Arc<dyn ItemStore>,
    ops: OperationMap,
    containment: Containment,
    temporal_fields: Vec<String>,
    post_create: Option<PostCreateHook>,
    config: RouterConfig,
}

impl fmt::Debug for ResourceRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRouter")
            .field("kind", &self.kind)
            .field("containment", &self.containment)
            .field("ops", &self.ops)
            .finish()
    }
}

impl LocationSource for ResourceRouter {
    fn location_kind(&self) -> &str {
        &self.kind
    }

    fn containment(&self) -> &Containment {
        &self.containment
    }
}

impl ResourceRouter {
    /// Start building a router for one item kind
    #[must_use]
    pub fn builder(kind: impl Into<String>, store: Arc<dyn ItemStore>) -> ResourceRouterBuilder {
        ResourceRouterBuilder {
            kind: kind.into(),
            store,
            ops: OperationMap::new(),
            containment: Containment::Primary,
            temporal_fields: Vec::new(),
            post_create: None,
            config: RouterConfig::default(),
        }
    }

    /// The item kind this router serves
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Mount this router's routes as an [`axum::Router`].
    ///
    /// The caller picks the mount point; a contained router's prefix must
    /// declare the route parameters its location chain reads.
    #[must_use]
    pub fn into_router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/", post(create).get(list))
            .route(
                "/{token}",
                get(read_or_all_facet)
                    .put(update)
                    .delete(remove)
                    .post(all_action),
            )
            .route("/{token}/{operation}", post(item_action).get(item_facet))
            .with_state(self)
    }

    /// The identity key for an item id under this request's scope.
    ///
    /// Primary routers yield a bare primary key; contained routers always
    /// yield a composite key with the full chain.
    fn identity_key(&self, scope: &RequestScope, id: &str) -> Result<ItemKey> {
        let primary = PrimaryKey::new(&self.kind, id);
        match &self.containment {
            Containment::Primary => Ok(primary.into()),
            Containment::Contained { .. } => {
                let locations = self.containment.compose_full_chain(scope)?;
                Ok(CompositeKey::new(primary, locations).into())
            }
        }
    }
}

/// Builder for [`ResourceRouter`]
pub struct ResourceRouterBuilder {
    kind: String,
    store: Arc<dyn ItemStore>,
    ops: OperationMap,
    containment: Containment,
    temporal_fields: Vec<String>,
    post_create: Option<PostCreateHook>,
    config: RouterConfig,
}

impl ResourceRouterBuilder {
    /// Install router-level operation overrides
    #[must_use]
    pub fn operations(mut self, ops: OperationMap) -> Self {
        self.ops = ops;
        self
    }

    /// Nest this router under a parent level.
    ///
    /// `location_param` names the route parameter in the mount prefix that
    /// carries the parent item's id.
    #[must_use]
    pub fn contained_in<S>(mut self, parent: Arc<S>, location_param: impl Into<String>) -> Self
    where
        S: LocationSource + 'static,
    {
        self.containment = Containment::contained(parent, location_param);
        self
    }

    /// Declare which payload fields are normalized as timestamps on writes
    #[must_use]
    pub fn temporal_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.temporal_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Install a hook run on each created item before the response
    #[must_use]
    pub fn post_create<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Item, &[LocationKey]) -> Result<()> + Send + Sync + 'static,
    {
        self.post_create = Some(Arc::new(hook));
        self
    }

    /// Override the default configuration
    #[must_use]
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Finalize the router.
    ///
    /// Fails when the containment chain is deeper than the configured
    /// maximum.
    pub fn build(self) -> Result<Arc<ResourceRouter>> {
        let depth = self.containment.depth();
        if depth > self.config.max_nesting_depth {
            return Err(Error::internal(format!(
                "router '{}' nested {depth} levels deep, maximum is {}",
                self.kind, self.config.max_nesting_depth
            )));
        }
        Ok(Arc::new(ResourceRouter {
            kind: self.kind,
            store: self.store,
            ops: self.ops,
            containment: self.containment,
            temporal_fields: self.temporal_fields,
            post_create: self.post_create,
            config: self.config,
        }))
    }
}

/// Unwrap the JSON body extractor so parse failures wear the crate's error
/// envelope instead of axum's plain-text rejection.
fn json_body(body: std::result::Result<Json<Value>, JsonRejection>) -> Result<Value> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(Error::malformed_request(rejection.body_text())),
    }
}

fn require_object(body: Value) -> Result<Map<String, Value>> {
    match body {
        Value::Object(fields) => Ok(fields),
        other => Err(Error::malformed_request(format!(
            "request body must be a JSON object, got {}",
            value_shape(&other)
        ))),
    }
}

fn value_shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn query_params_value(raw: &BTreeMap<String, String>) -> Value {
    Value::Object(
        raw.iter()
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect(),
    )
}

fn op_context(
    method: http::Method,
    path: &str,
    scope: &RequestScope,
) -> OpContext {
    OpContext {
        method,
        path: path.to_owned(),
        params: scope.params().clone(),
    }
}

async fn create(
    State(router): State<Arc<ResourceRouter>>,
    params: RawPathParams,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Response> {
    let scope = RequestScope::from(&params);
    let mut fields = require_object(json_body(body)?)?;

    let id = match fields.get("id").and_then(Value::as_str) {
        Some(id) => id.to_owned(),
        None => Uuid::now_v7().to_string(),
    };
    fields.remove("id");
    normalize_temporal_fields(&mut fields, &router.temporal_fields)?;

    let locations = router.containment.compose_full_chain(&scope)?;
    let item = Item::with_fields(PrimaryKey::new(&router.kind, &id), fields);

    let mut created = router.store.create(item, &locations).await?;
    if let Some(hook) = &router.post_create {
        hook(&mut created, &locations)?;
    }
    // Validation runs last so hook mutations cannot bypass the kind check.
    let created = validate_primary_key(created, &router.kind)?;

    tracing::debug!(kind = %router.kind, id = %created.key.id, "item created");
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

async fn list(
    State(router): State<Arc<ResourceRouter>>,
    params: RawPathParams,
    Query(raw): Query<BTreeMap<String, String>>,
) -> Result<Response> {
    let scope = RequestScope::from(&params);
    let locations = router.containment.compose_full_chain(&scope)?;

    let envelope = match translate(&raw)? {
        ListRequest::Finder(spec) => {
            let items = if spec.one {
                let item = router
                    .store
                    .find_one(&spec.name, &spec.params, &locations)
                    .await?;
                item.into_iter().collect()
            } else {
                router
                    .store
                    .find(&spec.name, &spec.params, &locations)
                    .await?
            };
            ResultEnvelope::complete(items)
        }
        ListRequest::Query { query, page } => {
            let page = page.clamp_limit(router.config.max_limit);
            router.store.all(&query, &locations, page).await?
        }
    };

    Ok(envelope.validate_kinds(&router.kind)?.into_response())
}

/// `GET /{token}` serves both single-item reads and bulk facets; the token
/// alone cannot distinguish them. Resolution order: router-level bulk facet
/// override, then the store read, then the store bulk facet. When the facet
/// fallback is also unknown, the original not-found answer stands.
async fn read_or_all_facet(
    State(router): State<Arc<ResourceRouter>>,
    OriginalUri(uri): OriginalUri,
    params: RawPathParams,
    Query(raw): Query<BTreeMap<String, String>>,
) -> Result<Response> {
    let scope = RequestScope::from(&params);
    let token = scope.require("token")?.to_owned();
    let facet_params = query_params_value(&raw);

    if let Some(handler) = router.ops.scope_override(OperationCategory::AllFacet, &token) {
        let locations = router.containment.compose_full_chain(&scope)?;
        let ctx = op_context(http::Method::GET, uri.path(), &scope);
        let value = handler(facet_params, locations, ctx).await?;
        return Ok(Json(value).into_response());
    }

    let key = router.identity_key(&scope, &token)?;
    match router.store.get(&key).await {
        Ok(item) => {
            let item = validate_primary_key(item, &router.kind)?;
            Ok(Json(item).into_response())
        }
        Err(StoreError::NotFound(message)) => {
            let locations = router.containment.compose_full_chain(&scope)?;
            match router.store.all_facet(&token, &facet_params, &locations).await {
                Ok(value) => Ok(Json(value).into_response()),
                Err(StoreError::UnknownOperation(_)) => Err(Error::not_found(message)),
                Err(other) => Err(other.into()),
            }
        }
        Err(other) => Err(other.into()),
    }
}

async fn update(
    State(router): State<Arc<ResourceRouter>>,
    params: RawPathParams,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Response> {
    let scope = RequestScope::from(&params);
    let id = scope.require("token")?.to_owned();
    let mut fields = require_object(json_body(body)?)?;
    fields.remove("id");
    normalize_temporal_fields(&mut fields, &router.temporal_fields)?;

    let key = router.identity_key(&scope, &id)?;
    let updated = router.store.update(&key, fields).await?;
    let updated = validate_primary_key(updated, &router.kind)?;
    Ok(Json(updated).into_response())
}

async fn remove(
    State(router): State<Arc<ResourceRouter>>,
    params: RawPathParams,
) -> Result<Response> {
    let scope = RequestScope::from(&params);
    let id = scope.require("token")?.to_owned();
    let key = router.identity_key(&scope, &id)?;

    if router.store.remove(&key).await? {
        tracing::debug!(kind = %router.kind, id = %id, "item removed");
        Ok(Json(serde_json::json!({ "removed": true })).into_response())
    } else {
        Err(Error::not_found(format!(
            "{} '{}' not found",
            router.kind, id
        )))
    }
}

async fn all_action(
    State(router): State<Arc<ResourceRouter>>,
    OriginalUri(uri): OriginalUri,
    params: RawPathParams,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Response> {
    let scope = RequestScope::from(&params);
    let body = json_body(body)?;
    let extracted = extract_operation(uri.path(), OperationCategory::AllAction)?;
    let locations = router.containment.compose_full_chain(&scope)?;

    if let Some(handler) = router
        .ops
        .scope_override(OperationCategory::AllAction, &extracted.name)
    {
        let ctx = op_context(http::Method::POST, uri.path(), &scope);
        let value = handler(body, locations, ctx).await?;
        return Ok(Json(value).into_response());
    }

    let (results, effects) = router
        .store
        .all_action(&extracted.name, body, &locations)
        .await?;
    tracing::debug!(
        kind = %router.kind,
        operation = %extracted.name,
        side_effects = effects.len(),
        "bulk action completed"
    );
    Ok(Json(Value::Array(results)).into_response())
}

async fn item_action(
    State(router): State<Arc<ResourceRouter>>,
    OriginalUri(uri): OriginalUri,
    params: RawPathParams,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Response> {
    let scope = RequestScope::from(&params);
    let body = json_body(body)?;
    let extracted = extract_operation(uri.path(), OperationCategory::ItemAction)?;
    let id = extracted
        .id
        .ok_or_else(|| Error::internal("item action dispatched without an item id"))?;
    let key = router.identity_key(&scope, &id)?;

    if let Some(handler) = router
        .ops
        .item_override(OperationCategory::ItemAction, &extracted.name)
    {
        let ctx = op_context(http::Method::POST, uri.path(), &scope);
        let value = handler(key, body, ctx).await?;
        return Ok(Json(value).into_response());
    }

    let (result, effects) = router.store.action(&key, &extracted.name, body).await?;
    tracing::debug!(
        kind = %router.kind,
        id = %id,
        operation = %extracted.name,
        side_effects = effects.len(),
        "item action completed"
    );
    Ok(Json(result).into_response())
}

async fn item_facet(
    State(router): State<Arc<ResourceRouter>>,
    OriginalUri(uri): OriginalUri,
    params: RawPathParams,
    Query(raw): Query<BTreeMap<String, String>>,
) -> Result<Response> {
    let scope = RequestScope::from(&params);
    let extracted = extract_operation(uri.path(), OperationCategory::ItemFacet)?;
    let id = extracted
        .id
        .ok_or_else(|| Error::internal("item facet dispatched without an item id"))?;
    let key = router.identity_key(&scope, &id)?;
    let facet_params = query_params_value(&raw);

    if let Some(handler) = router
        .ops
        .item_override(OperationCategory::ItemFacet, &extracted.name)
    {
        let ctx = op_context(http::Method::GET, uri.path(), &scope);
        let value = handler(key, facet_params, ctx).await?;
        return Ok(Json(value).into_response());
    }

    let value = router
        .store
        .facet(&key, &extracted.name, &facet_params)
        .await?;
    Ok(Json(value).into_response())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::body::{to_bytes, Body};
    use http::{header, Method, Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::envelope::EnvelopeMetadata;
    use crate::memory::MemoryItemStore;
    use crate::query::{ItemQuery, PageOptions};
    use crate::store::StoreResult;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = match body {
            Some(body) => Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn notes_app(store: Arc<MemoryItemStore>) -> Router {
        init_tracing();
        let notes = ResourceRouter::builder("note", store).build().unwrap();
        Router::new().nest("/notes", notes.into_router())
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Create {
            kind: String,
            locations: Vec<LocationKey>,
        },
        All {
            query: ItemQuery,
            locations: Vec<LocationKey>,
            page: PageOptions,
        },
        Find {
            name: String,
            params: Value,
        },
        Action {
            key: ItemKey,
            name: String,
            body: Value,
        },
        Facet {
            key: ItemKey,
            name: String,
        },
        AllAction {
            name: String,
            body: Value,
            locations: Vec<LocationKey>,
        },
        AllFacet {
            name: String,
            locations: Vec<LocationKey>,
        },
    }

    /// Records every call and answers with canned successes, so tests can
    /// assert exactly what the orchestrators hand to the store.
    #[derive(Default)]
    struct RecordingStore {
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingStore {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait::async_trait]
    impl ItemStore for RecordingStore {
        async fn create(&self, item: Item, locations: &[LocationKey]) -> StoreResult<Item> {
            self.record(Call::Create {
                kind: item.key.kind.clone(),
                locations: locations.to_vec(),
            });
            Ok(item)
        }

        async fn get(&self, _key: &ItemKey) -> StoreResult<Item> {
            Err(StoreError::not_found("not found"))
        }

        async fn update(&self, key: &ItemKey, partial: Map<String, Value>) -> StoreResult<Item> {
            Ok(Item::with_fields(
                PrimaryKey::new(key.kind(), key.id()),
                partial,
            ))
        }

        async fn remove(&self, _key: &ItemKey) -> StoreResult<bool> {
            Ok(true)
        }

        async fn all(
            &self,
            query: &ItemQuery,
            locations: &[LocationKey],
            page: PageOptions,
        ) -> StoreResult<ResultEnvelope> {
            self.record(Call::All {
                query: query.clone(),
                locations: locations.to_vec(),
                page,
            });
            Ok(ResultEnvelope::new(
                Vec::new(),
                EnvelopeMetadata {
                    total: 0,
                    returned: 0,
                    offset: page.offset.unwrap_or(0),
                    has_more: false,
                },
            ))
        }

        async fn find(
            &self,
            name: &str,
            params: &Value,
            _locations: &[LocationKey],
        ) -> StoreResult<Vec<Item>> {
            self.record(Call::Find {
                name: name.to_owned(),
                params: params.clone(),
            });
            Ok(Vec::new())
        }

        async fn find_one(
            &self,
            name: &str,
            params: &Value,
            _locations: &[LocationKey],
        ) -> StoreResult<Option<Item>> {
            self.record(Call::Find {
                name: name.to_owned(),
                params: params.clone(),
            });
            Ok(None)
        }

        async fn action(
            &self,
            key: &ItemKey,
            name: &str,
            body: Value,
        ) -> StoreResult<(Value, Vec<Value>)> {
            self.record(Call::Action {
                key: key.clone(),
                name: name.to_owned(),
                body,
            });
            Ok((json!({ "acted": true }), vec![json!({ "event": name })]))
        }

        async fn facet(&self, key: &ItemKey, name: &str, _params: &Value) -> StoreResult<Value> {
            self.record(Call::Facet {
                key: key.clone(),
                name: name.to_owned(),
            });
            Ok(json!({ "facet": name }))
        }

        async fn all_action(
            &self,
            name: &str,
            body: Value,
            locations: &[LocationKey],
        ) -> StoreResult<(Vec<Value>, Vec<Value>)> {
            self.record(Call::AllAction {
                name: name.to_owned(),
                body,
                locations: locations.to_vec(),
            });
            Ok((vec![json!({ "acted": true })], Vec::new()))
        }

        async fn all_facet(
            &self,
            name: &str,
            _params: &Value,
            locations: &[LocationKey],
        ) -> StoreResult<Value> {
            self.record(Call::AllFacet {
                name: name.to_owned(),
                locations: locations.to_vec(),
            });
            Ok(json!({ "facet": name }))
        }
    }

    #[tokio::test]
    async fn test_create_returns_201_with_minted_id() {
        let app = notes_app(Arc::new(MemoryItemStore::new()));
        let (status, body) = send(
            app,
            Method::POST,
            "/notes",
            Some(json!({ "title": "groceries" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["key"]["kind"], "note");
        assert!(!body["key"]["id"].as_str().unwrap().is_empty());
        assert_eq!(body["title"], "groceries");
    }

    #[tokio::test]
    async fn test_create_honors_supplied_id() {
        let app = notes_app(Arc::new(MemoryItemStore::new()));
        let (status, body) = send(
            app,
            Method::POST,
            "/notes",
            Some(json!({ "id": "n1", "title": "groceries" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["key"]["id"], "n1");
    }

    #[tokio::test]
    async fn test_create_rejects_non_object_body() {
        let app = notes_app(Arc::new(MemoryItemStore::new()));
        let (status, body) = send(app, Method::POST, "/notes", Some(json!([1, 2]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "MALFORMED_REQUEST");
    }

    #[tokio::test]
    async fn test_create_normalizes_temporal_fields() {
        let store = Arc::new(MemoryItemStore::new());
        let notes = ResourceRouter::builder("note", store)
            .temporal_fields(["dueAt"])
            .build()
            .unwrap();
        let app = Router::new().nest("/notes", notes.into_router());
        let (status, body) = send(
            app,
            Method::POST,
            "/notes",
            Some(json!({ "dueAt": "2026-08-26" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["dueAt"], "2026-08-26T00:00:00.000Z");
    }

    #[tokio::test]
    async fn test_post_create_hook_shapes_response() {
        let store = Arc::new(MemoryItemStore::new());
        let notes = ResourceRouter::builder("note", store)
            .post_create(|item, locations| {
                item.set_field("depth", json!(locations.len()));
                Ok(())
            })
            .build()
            .unwrap();
        let app = Router::new().nest("/notes", notes.into_router());
        let (_, body) = send(app, Method::POST, "/notes", Some(json!({}))).await;
        assert_eq!(body["depth"], 0);
    }

    #[tokio::test]
    async fn test_post_create_hook_cannot_bypass_kind_validation() {
        let store = Arc::new(MemoryItemStore::new());
        let notes = ResourceRouter::builder("note", store)
            .post_create(|item, _locations| {
                item.key.kind = "task".to_string();
                Ok(())
            })
            .build()
            .unwrap();
        let app = Router::new().nest("/notes", notes.into_router());
        let (status, body) = send(app, Method::POST, "/notes", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION");
    }

    #[tokio::test]
    async fn test_unparseable_json_body_uses_error_envelope() {
        let app = notes_app(Arc::new(MemoryItemStore::new()));
        let request = Request::builder()
            .method(Method::POST)
            .uri("/notes")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "MALFORMED_REQUEST");
        assert_eq!(body["status"], 400);
    }

    #[tokio::test]
    async fn test_nested_create_composes_locations_nearest_first() {
        let store = Arc::new(RecordingStore::default());
        let orgs = ResourceRouter::builder("org", store.clone() as Arc<dyn ItemStore>)
            .build()
            .unwrap();
        let projects = ResourceRouter::builder("project", store.clone() as Arc<dyn ItemStore>)
            .contained_in(orgs, "org_id")
            .build()
            .unwrap();
        let tasks = ResourceRouter::builder("task", store.clone() as Arc<dyn ItemStore>)
            .contained_in(projects, "project_id")
            .build()
            .unwrap();
        let app = Router::new().nest(
            "/orgs/{org_id}/projects/{project_id}/tasks",
            tasks.into_router(),
        );

        let (status, _) = send(
            app,
            Method::POST,
            "/orgs/o1/projects/p1/tasks",
            Some(json!({ "id": "t1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            store.calls(),
            vec![Call::Create {
                kind: "task".to_string(),
                locations: vec![
                    LocationKey::new("project", "p1"),
                    LocationKey::new("org", "o1"),
                ],
            }]
        );
    }

    #[tokio::test]
    async fn test_create_under_missing_parent_is_404() {
        let store = Arc::new(MemoryItemStore::new());
        let orgs = ResourceRouter::builder("org", store.clone()).build().unwrap();
        let projects = ResourceRouter::builder("project", store.clone())
            .contained_in(orgs, "org_id")
            .build()
            .unwrap();
        let app = Router::new().nest("/orgs/{org_id}/projects", projects.into_router());

        let (status, body) = send(
            app,
            Method::POST,
            "/orgs/ghost/projects",
            Some(json!({ "id": "p1" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_list_passes_pagination_verbatim() {
        let store = Arc::new(RecordingStore::default());
        let notes = ResourceRouter::builder("note", store.clone() as Arc<dyn ItemStore>)
            .build()
            .unwrap();
        let app = Router::new().nest("/notes", notes.into_router());

        let (status, body) = send(
            app,
            Method::GET,
            "/notes?status=open&limit=10&offset=5",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metadata"]["offset"], 5);
        assert_eq!(
            store.calls(),
            vec![Call::All {
                query: ItemQuery::new().with_predicate("status", "open"),
                locations: Vec::new(),
                page: PageOptions {
                    limit: Some(10),
                    offset: Some(5),
                },
            }]
        );
    }

    #[tokio::test]
    async fn test_list_clamps_limit_to_configured_maximum() {
        let store = Arc::new(RecordingStore::default());
        let notes = ResourceRouter::builder("note", store.clone() as Arc<dyn ItemStore>)
            .config(RouterConfig {
                max_limit: Some(100),
                ..RouterConfig::default()
            })
            .build()
            .unwrap();
        let app = Router::new().nest("/notes", notes.into_router());

        send(app, Method::GET, "/notes?limit=500", None).await;
        let calls = store.calls();
        let Call::All { page, .. } = &calls[0] else {
            panic!("expected an all() call");
        };
        assert_eq!(page.limit, Some(100));
    }

    #[tokio::test]
    async fn test_finder_modes_share_envelope_shape() {
        let store = Arc::new(
            MemoryItemStore::new().with_finder("byStatus", |params, items| {
                let wanted = params["status"].clone();
                items
                    .into_iter()
                    .filter(|item| item.field("status") == Some(&wanted))
                    .collect()
            }),
        );
        let app = notes_app(store.clone());
        send(
            app.clone(),
            Method::POST,
            "/notes",
            Some(json!({ "id": "n1", "status": "open" })),
        )
        .await;

        let (status, body) = send(
            app.clone(),
            Method::GET,
            "/notes?finder=byStatus&finderParams=%7B%22status%22%3A%22open%22%7D",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
        assert_eq!(body["metadata"]["total"], 1);
        assert_eq!(body["metadata"]["hasMore"], false);

        let (status, body) = send(
            app,
            Method::GET,
            "/notes?finder=byStatus&finderParams=%7B%22status%22%3A%22closed%22%7D&one=true",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 0);
        assert_eq!(body["metadata"]["total"], 0);
    }

    #[tokio::test]
    async fn test_malformed_finder_params_fail_before_store() {
        let store = Arc::new(RecordingStore::default());
        let notes = ResourceRouter::builder("note", store.clone() as Arc<dyn ItemStore>)
            .build()
            .unwrap();
        let app = Router::new().nest("/notes", notes.into_router());

        let (status, body) = send(
            app,
            Method::GET,
            "/notes?finder=recent&finderParams=%7Bbad",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "MALFORMED_REQUEST");
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_router_overrides_beat_the_store() {
        let store = Arc::new(RecordingStore::default());
        let ops = OperationMap::new()
            .action("archive", |key, _body, _ctx| async move {
                Ok(json!({ "archived": key.id() }))
            })
            .facet("summary", |key, _params, _ctx| async move {
                Ok(json!({ "summary": key.id() }))
            })
            .all_action("reindex", |_body, locations, _ctx| async move {
                Ok(json!({ "scopes": locations.len() }))
            })
            .all_facet("stats", |_params, _locations, _ctx| async move {
                Ok(json!({ "count": 0 }))
            });
        let notes = ResourceRouter::builder("note", store.clone() as Arc<dyn ItemStore>)
            .operations(ops)
            .build()
            .unwrap();
        let app = Router::new().nest("/notes", notes.into_router());

        let (status, body) =
            send(app.clone(), Method::POST, "/notes/n1/archive", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["archived"], "n1");

        let (status, body) = send(app.clone(), Method::GET, "/notes/n1/summary", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], "n1");

        let (status, body) =
            send(app.clone(), Method::POST, "/notes/reindex", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["scopes"], 0);

        let (status, body) = send(app, Method::GET, "/notes/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);

        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_store_fallback_receives_exact_arguments() {
        let store = Arc::new(RecordingStore::default());
        let notes = ResourceRouter::builder("note", store.clone() as Arc<dyn ItemStore>)
            .build()
            .unwrap();
        let app = Router::new().nest("/notes", notes.into_router());

        let (status, body) = send(
            app,
            Method::POST,
            "/notes/n1/archive",
            Some(json!({ "reason": "stale" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["acted"], true);
        assert_eq!(
            store.calls(),
            vec![Call::Action {
                key: PrimaryKey::new("note", "n1").into(),
                name: "archive".to_string(),
                body: json!({ "reason": "stale" }),
            }]
        );
    }

    #[tokio::test]
    async fn test_item_facet_falls_back_to_store() {
        let store = Arc::new(RecordingStore::default());
        let notes = ResourceRouter::builder("note", store.clone() as Arc<dyn ItemStore>)
            .build()
            .unwrap();
        let app = Router::new().nest("/notes", notes.into_router());

        let (status, body) = send(app, Method::GET, "/notes/n1/history", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["facet"], "history");
        assert_eq!(
            store.calls(),
            vec![Call::Facet {
                key: PrimaryKey::new("note", "n1").into(),
                name: "history".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_all_action_returns_result_array() {
        let store = Arc::new(RecordingStore::default());
        let notes = ResourceRouter::builder("note", store.clone() as Arc<dyn ItemStore>)
            .build()
            .unwrap();
        let app = Router::new().nest("/notes", notes.into_router());

        let (status, body) =
            send(app, Method::POST, "/notes/reindex", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_array());
    }

    #[tokio::test]
    async fn test_unknown_operation_is_400() {
        let app = notes_app(Arc::new(MemoryItemStore::new()));
        send(
            app.clone(),
            Method::POST,
            "/notes",
            Some(json!({ "id": "n1" })),
        )
        .await;

        let (status, body) = send(
            app,
            Method::POST,
            "/notes/n1/promote",
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "UNKNOWN_OPERATION");
    }

    #[tokio::test]
    async fn test_get_token_disambiguates_read_and_bulk_facet() {
        let store = Arc::new(MemoryItemStore::new().with_all_facet("stats", |_params, items| {
            json!({ "count": items.len() })
        }));
        let app = notes_app(store.clone());
        send(
            app.clone(),
            Method::POST,
            "/notes",
            Some(json!({ "id": "n1" })),
        )
        .await;

        // An existing id wins over any facet interpretation.
        let (status, body) = send(app.clone(), Method::GET, "/notes/n1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["key"]["id"], "n1");

        // A non-id token falls through to the store's bulk facet.
        let (status, body) = send(app.clone(), Method::GET, "/notes/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);

        // Neither an id nor a facet: the original not-found answer stands.
        let (status, body) = send(app, Method::GET, "/notes/ghost", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_update_merges_and_normalizes() {
        let store = Arc::new(MemoryItemStore::new());
        let notes = ResourceRouter::builder("note", store)
            .temporal_fields(["dueAt"])
            .build()
            .unwrap();
        let app = Router::new().nest("/notes", notes.into_router());
        send(
            app.clone(),
            Method::POST,
            "/notes",
            Some(json!({ "id": "n1", "title": "a" })),
        )
        .await;

        let (status, body) = send(
            app,
            Method::PUT,
            "/notes/n1",
            Some(json!({ "dueAt": "2026-08-26" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "a");
        assert_eq!(body["dueAt"], "2026-08-26T00:00:00.000Z");
    }

    #[tokio::test]
    async fn test_remove_then_404() {
        let app = notes_app(Arc::new(MemoryItemStore::new()));
        send(
            app.clone(),
            Method::POST,
            "/notes",
            Some(json!({ "id": "n1" })),
        )
        .await;

        let (status, body) = send(app.clone(), Method::DELETE, "/notes/n1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], true);

        let (status, _) = send(app, Method::DELETE, "/notes/n1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_validation_detail_is_flattened() {
        let store = Arc::new(MemoryItemStore::new().with_required_fields(["title"]));
        let app = notes_app(store);

        let (status, body) = send(
            app,
            Method::POST,
            "/notes",
            Some(json!({ "title": null })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid data supplied");
        assert_eq!(body["code"], "VALIDATION");
    }

    #[test]
    fn test_build_enforces_nesting_depth() {
        let store = Arc::new(MemoryItemStore::new());
        let shallow_config = RouterConfig {
            max_nesting_depth: 1,
            ..RouterConfig::default()
        };
        let orgs = ResourceRouter::builder("org", store.clone()).build().unwrap();
        let projects = ResourceRouter::builder("project", store.clone())
            .contained_in(orgs, "org_id")
            .build()
            .unwrap();
        let result = ResourceRouter::builder("task", store)
            .contained_in(projects, "project_id")
            .config(shallow_config)
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_contained_reads_use_composite_keys() {
        let store = Arc::new(RecordingStore::default());
        let orgs = ResourceRouter::builder("org", store.clone() as Arc<dyn ItemStore>)
            .build()
            .unwrap();
        let projects = ResourceRouter::builder("project", store.clone() as Arc<dyn ItemStore>)
            .contained_in(orgs, "org_id")
            .build()
            .unwrap();
        let app = Router::new().nest("/orgs/{org_id}/projects", projects.into_router());

        send(
            app,
            Method::POST,
            "/orgs/o1/projects/p1/archive",
            Some(json!({})),
        )
        .await;
        assert_eq!(
            store.calls(),
            vec![Call::Action {
                key: CompositeKey::new(
                    PrimaryKey::new("project", "p1"),
                    vec![LocationKey::new("org", "o1")],
                )
                .into(),
                name: "archive".to_string(),
                body: json!({}),
            }]
        );
    }
}
