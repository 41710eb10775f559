//! Location composition for contained routers
//!
//! A contained router contributes one [`LocationKey`] — its parent's kind
//! paired with the identifier read from the request scope — and delegates
//! the rest of the chain to its parent. A primary router terminates the
//! recursion with the empty chain. The parent handle is an interface handle
//! set once at build time; the reference graph is acyclic by construction
//! because a parent must be fully built before any child can point at it.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use strata_router::location::{Containment, LocationSource};
//! use strata_router::scope::RequestScope;
//!
//! struct Level(&'static str, Containment);
//! impl LocationSource for Level {
//!     fn location_kind(&self) -> &str { self.0 }
//!     fn containment(&self) -> &Containment { &self.1 }
//! }
//!
//! let orgs = Arc::new(Level("org", Containment::Primary));
//! let projects = Containment::contained(orgs, "org_id");
//!
//! let scope = RequestScope::new().with_param("org_id", "o1");
//! let chain = projects.compose_full_chain(&scope).unwrap();
//! assert_eq!(chain.len(), 1);
//! assert_eq!(chain[0].kind, "org");
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::key::LocationKey;
use crate::scope::RequestScope;

/// Default bound on ancestor levels for a contained router
pub const MAX_NESTING_DEPTH: usize = 5;

/// A router level that can contribute location context to its children
pub trait LocationSource: Send + Sync {
    /// The item kind this level contributes as a parent scope
    fn location_kind(&self) -> &str;

    /// This level's own containment
    fn containment(&self) -> &Containment;
}

/// Whether a router is top-level or nested under a parent level
#[derive(Clone)]
pub enum Containment {
    /// Top-level router; contributes no location context
    Primary,
    /// Nested router; its parent handle and the route parameter carrying
    /// the parent's identifier
    Contained {
        /// Handle to the parent level, set once and never reassigned
        parent: Arc<dyn LocationSource>,
        /// Route parameter name holding the parent item's id
        location_param: String,
    },
}

impl Containment {
    /// Containment under `parent`, reading the parent id from `location_param`
    pub fn contained(
        parent: Arc<dyn LocationSource>,
        location_param: impl Into<String>,
    ) -> Self {
        Self::Contained {
            parent,
            location_param: location_param.into(),
        }
    }

    /// Number of ancestor levels above this router
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Primary => 0,
            Self::Contained { parent, .. } => 1 + parent.containment().depth(),
        }
    }

    /// This level's own location key, or `None` for a primary router.
    ///
    /// A missing identifier is a caller contract violation: routes that
    /// reach composition always declare the parameter, so the composer never
    /// substitutes an empty segment.
    pub fn compose_own_location(&self, scope: &RequestScope) -> Result<Option<LocationKey>, Error> {
        match self {
            Self::Primary => Ok(None),
            Self::Contained {
                parent,
                location_param,
            } => {
                let id = scope.require(location_param)?;
                Ok(Some(LocationKey::new(parent.location_kind(), id)))
            }
        }
    }

    /// The full location chain for this level, nearest parent first.
    ///
    /// `[own] ++ parent chain` for contained routers; empty for primary
    /// routers, terminating the recursion.
    pub fn compose_full_chain(&self, scope: &RequestScope) -> Result<Vec<LocationKey>, Error> {
        match self {
            Self::Primary => Ok(Vec::new()),
            Self::Contained { parent, .. } => {
                let own = self
                    .compose_own_location(scope)?
                    .ok_or_else(|| Error::internal("contained router produced no own location"))?;
                let mut chain = Vec::with_capacity(self.depth());
                chain.push(own);
                chain.extend(parent.containment().compose_full_chain(scope)?);
                Ok(chain)
            }
        }
    }
}

impl fmt::Debug for Containment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "Primary"),
            Self::Contained { location_param, .. } => f
                .debug_struct("Contained")
                .field("location_param", location_param)
                .field("depth", &self.depth())
                .finish(),
        }
    }
}
