//! Request handling and transformation.
//!
//! # Responsibilities
//! - Rewrite the request target to the resolved backend
//! - Add forwarding metadata headers
//!
//! # Design Decisions
//! - Method, path, query, body, and every client header are preserved
//!   (including `Host`); forwarding headers are appended, never replaced
//! - Backends are always spoken to over HTTP/1.1

use std::net::IpAddr;
use std::str::FromStr;

use axum::body::Body;
use axum::http::header::HOST;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{HeaderName, HeaderValue, Request, Uri, Version};

pub static X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub static X_ORIGIN_HOST: HeaderName = HeaderName::from_static("x-origin-host");
pub static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Error rewriting a request for its backend.
#[derive(Debug, thiserror::Error)]
#[error("backend address '{0}' cannot be used as a request target")]
pub struct InvalidBackend(pub String);

/// Point `request` at `backend` and stamp the forwarding headers.
pub fn rewrite_for_backend(
    request: Request<Body>,
    backend: &str,
    client_ip: Option<IpAddr>,
) -> Result<Request<Body>, InvalidBackend> {
    let (mut parts, body) = request.into_parts();
    let invalid = || InvalidBackend(backend.to_string());

    let original_host = parts.headers.get(HOST).cloned().or_else(|| {
        parts
            .uri
            .authority()
            .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
    });
    let origin_host = HeaderValue::from_str(backend).map_err(|_| invalid())?;

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(Authority::from_str(backend).map_err(|_| invalid())?);
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = Uri::from_parts(uri_parts).map_err(|_| invalid())?;
    parts.version = Version::HTTP_11;

    if let Some(host) = original_host {
        parts.headers.append(X_FORWARDED_HOST.clone(), host);
    }
    parts.headers.append(X_ORIGIN_HOST.clone(), origin_host);
    if let Some(ip) = client_ip {
        if let Ok(value) = HeaderValue::from_str(&ip.to_string()) {
            parts.headers.append(X_FORWARDED_FOR.clone(), value);
        }
    }

    Ok(Request::from_parts(parts, body))
}

/// The request URI as received: path plus query.
pub fn request_uri<B>(request: &Request<B>) -> String {
    request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}
