//! Per-request authorization decision.

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Method, Uri};

use crate::auth::{AuthError, AuthorizationClient, AuthorizationRequest};
use crate::http::HEALTH_CHECK_PATH;
use crate::observability::SpanContext;

/// Result of running a request through the gate.
#[derive(Debug)]
pub enum GateOutcome {
    /// Reserved health-check path, no upstream call made.
    Bypass,
    Allowed,
    Denied,
    /// The authorization service could not answer. Treated as a denial.
    UpstreamError(AuthError),
}

impl GateOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateOutcome::Bypass | GateOutcome::Allowed)
    }
}

/// Decide whether a request may proceed to routing.
pub async fn evaluate(
    client: &AuthorizationClient,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    parent: Option<SpanContext>,
) -> GateOutcome {
    if uri.path() == HEALTH_CHECK_PATH {
        return GateOutcome::Bypass;
    }

    let request = AuthorizationRequest {
        credential: find_credential(headers, uri),
        resource: uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string()),
        action: method.to_string(),
    };

    match client.authorize(&request, parent.as_ref()).await {
        Ok(decision) if decision.allowed => GateOutcome::Allowed,
        Ok(_) => GateOutcome::Denied,
        Err(e) => GateOutcome::UpstreamError(e),
    }
}

/// The request credential: the `Authorization` header, else the first
/// `token` query parameter, else empty.
pub fn find_credential(headers: &HeaderMap, uri: &Uri) -> String {
    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return token.to_string();
    }

    uri.query()
        .and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "token")
                .map(|(_, value)| value.into_owned())
        })
        .unwrap_or_default()
}
