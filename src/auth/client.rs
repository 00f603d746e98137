//! HTTP client for the external authorization service.

use std::time::Duration;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use url::Url;

use crate::auth::{AuthError, AuthorizationDecision, AuthorizationRequest};
use crate::config::validation::base_url;
use crate::observability::{SpanContext, SpanKind, Tracer};

const IS_ACCESS_ALLOWED_PATH: &str = "/auth/is-access-allowed";

/// Asks the authorization service whether a request may proceed.
#[derive(Debug, Clone)]
pub struct AuthorizationClient {
    http: reqwest::Client,
    endpoint: Url,
    tracer: Tracer,
}

impl AuthorizationClient {
    pub fn new(permission_addr: &str, timeout: Duration, tracer: Tracer) -> Result<Self, AuthError> {
        let endpoint = base_url(permission_addr)
            .and_then(|base| base.join(IS_ACCESS_ALLOWED_PATH))
            .map_err(|_| AuthError::InvalidAddress(permission_addr.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AuthError::Transport)?;

        Ok(Self {
            http,
            endpoint,
            tracer,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Call the authorization service.
    ///
    /// The call runs under an `authorization` client span whose context is
    /// sent along, so the decision is attributable to the inbound request.
    pub async fn authorize(
        &self,
        request: &AuthorizationRequest,
        parent: Option<&SpanContext>,
    ) -> Result<AuthorizationDecision, AuthError> {
        let mut span = self
            .tracer
            .start_span("authorization", parent, SpanKind::Client);
        span.set_tag("peer.address", self.endpoint.as_str());

        let mut headers = HeaderMap::new();
        self.tracer.inject(span.context(), &mut headers);

        let result = self.send(request, headers).await;
        match &result {
            Ok(decision) => span.set_tag("authorization.allowed", decision.allowed),
            Err(e) => {
                span.set_tag("error", true);
                span.set_tag("error.message", e);
            }
        }
        span.finish();

        result
    }

    async fn send(
        &self,
        request: &AuthorizationRequest,
        headers: HeaderMap,
    ) -> Result<AuthorizationDecision, AuthError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .headers(headers)
            .header(AUTHORIZATION, request.credential.as_str())
            .json(request)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let decision = response
            .json::<AuthorizationDecision>()
            .await
            .map_err(|e| match classify(e) {
                AuthError::Transport(source) => AuthError::Decode {
                    status: status.as_u16(),
                    source,
                },
                other => other,
            })?;

        tracing::debug!(
            resource = %request.resource,
            action = %request.action,
            allowed = decision.allowed,
            "Authorization decision received"
        );
        Ok(decision)
    }
}

fn classify(err: reqwest::Error) -> AuthError {
    if err.is_timeout() {
        AuthError::Timeout
    } else {
        AuthError::Transport(err)
    }
}
