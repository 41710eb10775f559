//! Request-scoped route context
//!
//! [`RequestScope`] is the side channel through which orchestrators and the
//! location composer read matched route parameters, including parameters
//! contributed by parent mounts (`/orgs/{org_id}/projects/...`). It is built
//! fresh per request and discarded at response time.

use std::collections::BTreeMap;

use axum::extract::RawPathParams;

use crate::error::Error;

/// Matched route parameters for one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestScope {
    params: BTreeMap<String, String>,
}

impl RequestScope {
    /// Create an empty scope
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route parameter (used when composing scopes by hand, e.g. tests)
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Look up a route parameter
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Look up a route parameter that the route contract guarantees.
    ///
    /// Absence is a wiring bug in the caller, not client input, so this is
    /// an internal error.
    pub fn require(&self, name: &str) -> Result<&str, Error> {
        self.param(name).ok_or_else(|| {
            Error::internal(format!(
                "route parameter '{name}' missing from request scope"
            ))
        })
    }

    /// All matched parameters
    #[must_use]
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }
}

impl From<&RawPathParams> for RequestScope {
    fn from(params: &RawPathParams) -> Self {
        let mut scope = Self::new();
        for (name, value) in params.iter() {
            scope.params.insert(name.to_owned(), value.to_owned());
        }
        scope
    }
}
