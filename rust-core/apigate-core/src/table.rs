//! # Route Table
//!
//! Ordered collection of route definitions, resolved segment by segment.
//!
//! ## Matching
//!
//! - Segment counts must be equal, no prefix matches
//! - Literal segments compare exactly (case-sensitive)
//! - `{name}` matches any single non-empty segment and captures it
//! - The match with the most literal segments wins; ties go to the route
//!   registered first
//! - `/users` and `/users/` are the same path
//!
//! The table is filled once at startup and only read afterwards, so the
//! router shares it behind an `Arc` without locking.

use crate::error::{Error, Result};
use crate::request::{url_decode, Method};
use crate::route::{split_path, HandlerRef, RouteDefinition};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// A resolved route with its captured path parameters
#[derive(Debug, Clone)]
pub struct MatchedRoute {
    /// The matched route
    pub route: Arc<RouteDefinition>,
    /// Placeholder name to percent-decoded segment
    pub params: HashMap<String, String>,
}

impl MatchedRoute {
    /// Get a captured parameter
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Registered routes in registration order, grouped by method
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    by_method: HashMap<Method, Vec<Arc<RouteDefinition>>>,
    ordered: Vec<Arc<RouteDefinition>>,
}

impl RouteTable {
    /// Create a new empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route
    ///
    /// # Errors
    ///
    /// Returns `Error::DuplicateRoute` if a route with the same method and
    /// normalized pattern exists, or `Error::InvalidRoute` if the definition
    /// is inconsistent.
    pub fn register(&mut self, route: RouteDefinition) -> Result<()> {
        let route = route.finalize()?;
        let normalized = route.pattern.normalized();

        let routes = self.by_method.entry(route.method).or_default();
        if routes.iter().any(|r| r.pattern.normalized() == normalized) {
            return Err(Error::DuplicateRoute {
                method: route.method.to_string(),
                pattern: normalized,
            });
        }

        debug!(
            method = %route.method,
            pattern = %route.pattern.as_str(),
            handler = %route.handler,
            "Route registered"
        );
        let route = Arc::new(route);
        routes.push(Arc::clone(&route));
        self.ordered.push(route);
        Ok(())
    }

    /// Resolve a method and path to a route
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteNotFound` if no route of that method matches
    pub fn resolve(&self, method: Method, path: &str) -> Result<MatchedRoute> {
        let not_found = || Error::RouteNotFound {
            method: method.to_string(),
            path: path.to_string(),
        };

        let segments = split_path(path);
        let mut best: Option<(&Arc<RouteDefinition>, Vec<(&str, &str)>)> = None;

        for route in self.by_method.get(&method).ok_or_else(not_found)? {
            let Some(captures) = route.pattern.match_segments(&segments) else {
                continue;
            };
            let better = best.as_ref().map_or(true, |(current, _)| {
                route.pattern.literal_count() > current.pattern.literal_count()
            });
            if better {
                best = Some((route, captures));
            }
        }

        let (route, captures) = best.ok_or_else(not_found)?;
        Ok(MatchedRoute {
            route: Arc::clone(route),
            params: captures
                .into_iter()
                .map(|(name, raw)| (name.to_string(), url_decode(raw, false)))
                .collect(),
        })
    }

    /// Routes in registration order
    pub fn routes(&self) -> impl Iterator<Item = &RouteDefinition> {
        self.ordered.iter().map(AsRef::as_ref)
    }

    /// Distinct handler references used by the table
    #[must_use]
    pub fn handlers(&self) -> BTreeSet<HandlerRef> {
        self.ordered.iter().map(|r| r.handler.clone()).collect()
    }

    /// Number of registered routes
    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Check if no routes are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}
