//! # strata-router
//!
//! HTTP request dispatch for hierarchically keyed item stores, built on
//! [axum](https://docs.rs/axum).
//!
//! A [`router::ResourceRouter`] binds one item kind to one backing
//! [`store::ItemStore`] and exposes the full verb surface: create with id
//! minting and temporal normalization, keyed reads, partial updates,
//! deletes, filtered and paginated listing, named finders, and named
//! actions/facets at item and collection scope. Routers nest up to five
//! levels deep; a contained router composes its parents into a location
//! chain, nearest parent first, on every store call.
//!
//! ## Features
//!
//! - **Composite identity** — primary keys for top-level kinds, composite
//!   keys carrying the full parent chain for contained kinds
//! - **Two-layer dispatch** — router-level operation overrides strictly
//!   shadow store-level operations of the same name and category
//! - **Uniform envelopes** — query mode and finder mode return the same
//!   paginated [`envelope::ResultEnvelope`] shape
//! - **Explicit error taxonomy** — the error kind alone decides the HTTP
//!   status; validation and internal detail never leak to clients
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use axum::Router;
//! use serde_json::json;
//! use strata_router::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(
//!         MemoryItemStore::new()
//!             .with_required_fields(["title"])
//!             .with_facet("summary", |item, _params| {
//!                 json!({ "id": item.key.id, "title": item.field("title") })
//!             }),
//!     );
//!
//!     let notes = ResourceRouter::builder("note", store)
//!         .temporal_fields(["dueAt"])
//!         .operations(OperationMap::new().all_facet(
//!             "stats",
//!             |_params, _locations, _ctx| async move { Ok(json!({ "ok": true })) },
//!         ))
//!         .build()?;
//!
//!     let app: Router = Router::new().nest("/notes", notes.into_router());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod key;
pub mod location;
pub mod memory;
pub mod normalize;
pub mod query;
pub mod router;
pub mod scope;
pub mod store;

/// Common imports for building routers
pub mod prelude {
    pub use crate::config::RouterConfig;
    pub use crate::dispatch::{OpContext, OperationCategory, OperationMap};
    pub use crate::envelope::{EnvelopeMetadata, ResultEnvelope};
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::key::{CompositeKey, Item, ItemKey, LocationKey, PrimaryKey};
    pub use crate::location::{Containment, LocationSource};
    pub use crate::memory::MemoryItemStore;
    pub use crate::query::{ItemQuery, ListRequest, PageOptions};
    pub use crate::router::{ResourceRouter, ResourceRouterBuilder};
    pub use crate::scope::RequestScope;
    pub use crate::store::{ItemStore, StoreError, StoreResult};
}
