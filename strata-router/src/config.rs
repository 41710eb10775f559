//! Router configuration
//!
//! Loaded from an optional `strata.toml` merged with `STRATA_`-prefixed
//! environment variables, environment taking precedence. All fields have
//! defaults, so a missing file and empty environment yield a usable config.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::location::MAX_NESTING_DEPTH;

/// Tunables shared by every router built from one configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Hard cap applied to client-supplied `limit` values; `None` passes
    /// limits through untouched
    pub max_limit: Option<u64>,
    /// Maximum ancestor levels a contained router may have
    pub max_nesting_depth: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_limit: None,
            max_nesting_depth: MAX_NESTING_DEPTH,
        }
    }
}

impl RouterConfig {
    /// Load configuration from `strata.toml` and the environment
    ///
    /// ```bash
    /// STRATA_MAX_LIMIT=100 my-service
    /// ```
    pub fn load() -> Result<Self, Error> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file("strata.toml"))
                .merge(Env::prefixed("STRATA_")),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self, Error> {
        figment
            .extract()
            .map_err(|err| Error::internal(format!("configuration error: {err}")))
    }
}
