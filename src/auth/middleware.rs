use crate::auth::jwt::JwtReader;
use crate::auth::policy::{AuthorizationPolicies, PolicyError};
use crate::types::{AppError, ClaimsPrincipal};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        request::Parts,
        Extensions, HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{debug, error, warn};

/// The authenticated caller, inserted into request extensions by
/// [`authenticate`].
#[derive(Debug, Clone)]
pub struct Principal {
    pub claims: ClaimsPrincipal,
    pub valid_to: DateTime<Utc>,
}

/// Marks a request that presented a bearer token which failed validation.
#[derive(Debug, Clone, Copy)]
struct InvalidBearerToken;

/// Authentication middleware.
///
/// Requests without a bearer token pass through anonymously. A valid token
/// attaches a [`Principal`]; an invalid one is logged and the request
/// continues anonymously, so only routes that require authentication
/// reject it.
pub async fn authenticate(
    State(reader): State<Arc<JwtReader>>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(req.headers()).map(str::to_owned) {
        match reader.verify(&token) {
            Ok(validated) => {
                debug!(
                    subject = validated.claims.subject().unwrap_or("-"),
                    "request authenticated"
                );
                req.extensions_mut().insert(Principal {
                    claims: validated.claims,
                    valid_to: validated.valid_to,
                });
            }
            Err(err) => {
                warn!(error = %err, path = %req.uri().path(), "bearer token rejected");
                req.extensions_mut().insert(InvalidBearerToken);
            }
        }
    }

    next.run(req).await
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
/// The scheme name is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// 401 response carrying a bearer challenge.
#[derive(Debug, Clone, Copy)]
pub struct AuthRejection {
    invalid_token: bool,
}

impl AuthRejection {
    fn from_extensions(extensions: &Extensions) -> Self {
        Self {
            invalid_token: extensions.get::<InvalidBearerToken>().is_some(),
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (challenge, message) = if self.invalid_token {
            (
                r#"Bearer error="invalid_token""#,
                "The bearer token is invalid or has expired",
            )
        } else {
            ("Bearer", "Authentication required")
        };

        let mut response = AppError::Auth(message.to_string()).into_response();
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
        response
    }
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| AuthRejection::from_extensions(&parts.extensions))
    }
}

impl<S> OptionalFromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Principal>().cloned())
    }
}

/// Route middleware rejecting anonymous requests with 401.
///
/// ```ignore
/// Router::new().route(
///     "/me",
///     get(handler).route_layer(middleware::from_fn(require_authenticated)),
/// )
/// ```
pub async fn require_authenticated(req: Request, next: Next) -> Response {
    if req.extensions().get::<Principal>().is_none() {
        return AuthRejection::from_extensions(req.extensions()).into_response();
    }
    next.run(req).await
}

/// Route layer enforcing a named authorization policy.
///
/// ```ignore
/// Router::new().route("/admin", get(handler).route_layer(require_policy("Admin")))
/// ```
pub fn require_policy(policy: impl Into<String>) -> RequirePolicyLayer {
    RequirePolicyLayer {
        policy: Arc::from(policy.into()),
    }
}

#[derive(Debug, Clone)]
pub struct RequirePolicyLayer {
    policy: Arc<str>,
}

impl<S> Layer<S> for RequirePolicyLayer {
    type Service = RequirePolicy<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequirePolicy {
            inner,
            policy: self.policy.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequirePolicy<S> {
    inner: S,
    policy: Arc<str>,
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

impl<S> Service<Request> for RequirePolicy<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        match authorize(&self.policy, req.extensions()) {
            Ok(()) => Box::pin(self.inner.call(req)),
            Err(response) => Box::pin(async move { Ok(response) }),
        }
    }
}

fn authorize(policy: &str, extensions: &Extensions) -> Result<(), Response> {
    let principal = extensions.get::<Principal>().map(|p| &p.claims);
    let result = match extensions.get::<Arc<AuthorizationPolicies>>() {
        Some(policies) => policies.evaluate(policy, principal),
        None => Err(PolicyError::Unknown(policy.to_string())),
    };

    match result {
        Ok(()) => Ok(()),
        Err(PolicyError::Unauthenticated) => {
            Err(AuthRejection::from_extensions(extensions).into_response())
        }
        Err(err @ PolicyError::Forbidden { .. }) => {
            debug!(policy, "authorization policy denied request");
            Err(AppError::Forbidden(err.to_string()).into_response())
        }
        Err(err @ PolicyError::Unknown(_)) => {
            error!(policy, "route requires an authorization policy that was never registered");
            Err(AppError::Internal(err.to_string()).into_response())
        }
    }
}
