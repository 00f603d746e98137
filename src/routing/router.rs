//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Compile configured endpoints into an immutable route table
//! - Look up the backend for a (method, path) pair
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) lookup for literal routes via HashMap
//! - O(n) scan over templated routes in configuration order
//! - Duplicate (method, path) pairs: the last configured backend wins

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use axum::http::uri::Authority;
use axum::http::Method;

use crate::config::ServiceConfig;
use crate::http::HEALTH_CHECK_PATH;
use crate::routing::matcher::{PathPattern, PatternError};

/// Error raised while building the route table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("unsupported method '{method}' for route '{uri}'")]
    UnsupportedMethod { method: String, uri: String },
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error("route '{0}' collides with the reserved health-check path")]
    ReservedPath(String),
    #[error("backend address '{0}' is not a valid authority")]
    InvalidBackend(String),
}

/// The HTTP verbs a route may be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Patch,
}

impl HttpVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Head => "HEAD",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Options => "OPTIONS",
            HttpVerb::Patch => "PATCH",
        }
    }

    /// Map a request method onto a routable verb.
    pub fn from_method(method: &Method) -> Option<Self> {
        method.as_str().parse().ok()
    }
}

impl FromStr for HttpVerb {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(HttpVerb::Get),
            "HEAD" => Ok(HttpVerb::Head),
            "POST" => Ok(HttpVerb::Post),
            "PUT" => Ok(HttpVerb::Put),
            "DELETE" => Ok(HttpVerb::Delete),
            "OPTIONS" => Ok(HttpVerb::Options),
            "PATCH" => Ok(HttpVerb::Patch),
            _ => Err(()),
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled route.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub method: HttpVerb,
    pub pattern: PathPattern,
    /// Backend "host:port".
    pub backend: String,
}

/// Immutable route table built once from configuration.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
    /// (verb, template) → entry index, for every route.
    index: HashMap<(HttpVerb, String), usize>,
    /// Entry indices of templated routes, in configuration order.
    templated: Vec<usize>,
}

impl RouteTable {
    /// Compile the configured services into a route table.
    pub fn build(services: &[ServiceConfig]) -> Result<Self, RouteError> {
        let mut table = RouteTable::default();

        for service in services {
            Authority::from_str(&service.addr)
                .map_err(|_| RouteError::InvalidBackend(service.addr.clone()))?;

            for endpoint in &service.endpoints {
                let method: HttpVerb =
                    endpoint
                        .method
                        .parse()
                        .map_err(|_| RouteError::UnsupportedMethod {
                            method: endpoint.method.clone(),
                            uri: endpoint.uri.clone(),
                        })?;
                let pattern = PathPattern::parse(&endpoint.uri)?;
                if pattern.as_str() == HEALTH_CHECK_PATH {
                    return Err(RouteError::ReservedPath(endpoint.uri.clone()));
                }

                table.insert(RouteEntry {
                    method,
                    pattern,
                    backend: service.addr.clone(),
                });
            }
        }

        if table.is_empty() {
            tracing::warn!("No routes configured, every proxied request will be 404");
        } else {
            tracing::info!(routes = table.len(), "Route table built");
        }
        Ok(table)
    }

    fn insert(&mut self, entry: RouteEntry) {
        let key = (entry.method, entry.pattern.as_str().to_string());

        if let Some(&i) = self.index.get(&key) {
            tracing::warn!(
                method = %entry.method,
                path = %entry.pattern,
                previous = %self.entries[i].backend,
                backend = %entry.backend,
                "Duplicate route, last configured backend wins"
            );
            self.entries[i] = entry;
            return;
        }

        tracing::debug!(
            method = %entry.method,
            path = %entry.pattern,
            backend = %entry.backend,
            "Route registered"
        );
        let i = self.entries.len();
        if !entry.pattern.is_static() {
            self.templated.push(i);
        }
        self.index.insert(key, i);
        self.entries.push(entry);
    }

    /// Find the route for a request, or `None` when nothing matches.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<&RouteEntry> {
        let verb = HttpVerb::from_method(method)?;

        if let Some(&i) = self.index.get(&(verb, path.to_string())) {
            let entry = &self.entries[i];
            if entry.pattern.is_static() {
                return Some(entry);
            }
        }

        self.templated
            .iter()
            .map(|&i| &self.entries[i])
            .find(|entry| entry.method == verb && entry.pattern.matches(path))
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
