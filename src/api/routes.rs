use crate::api::handlers::{auth, health};
use crate::auth::middleware::{require_authenticated, require_policy};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::collections::BTreeSet;
use tracing::warn;

/// Routes of the demo service.
///
/// Every distinct policy name gets its own `/api/policies/{name}` route
/// guarded by that policy. `/api/tokens/validate` is mounted only when a token reader
/// is registered.
pub fn create_router(policies: &[String], with_token_validation: bool) -> Router {
    let mut router = Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/whoami",
            get(auth::whoami).route_layer(middleware::from_fn(require_authenticated)),
        );

    if with_token_validation {
        router = router.route("/api/tokens/validate", post(auth::validate_token));
    }

    let unique: BTreeSet<&str> = policies.iter().map(String::as_str).collect();
    for policy in unique {
        if !is_route_safe(policy) {
            warn!(policy = %policy, "policy name is not usable as a path segment; skipping route");
            continue;
        }

        let name = policy.to_string();
        router = router.route(
            &format!("/api/policies/{policy}"),
            get(move || auth::check_policy(name.clone())).route_layer(require_policy(policy)),
        );
    }

    router
}

fn is_route_safe(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
