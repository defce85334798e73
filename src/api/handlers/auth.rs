//! Identity and token inspection handlers.

use crate::{
    auth::{jwt::JwtReader, middleware::Principal},
    types::{AppError, Result},
};
use axum::{extract::Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WhoAmIResponse {
    pub subject: Option<String>,
    /// Every claim carried by the caller's token
    #[schema(value_type = Object)]
    pub claims: serde_json::Value,
    pub valid_to: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidateTokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidateTokenResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub claims: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PolicyCheckResponse {
    pub policy: String,
    pub granted: bool,
}

/// Describe the authenticated caller
#[utoipa::path(
    get,
    path = "/api/whoami",
    responses(
        (status = 200, description = "Caller identity", body = WhoAmIResponse),
        (status = 401, description = "Missing or invalid bearer token")
    ),
    tag = "auth"
)]
pub async fn whoami(principal: Principal) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse {
        subject: principal.claims.subject().map(str::to_owned),
        valid_to: principal.valid_to,
        claims: serde_json::Value::Object(principal.claims.into_inner()),
    })
}

/// Validate a token with the shared token reader
///
/// Failures are reported as `valid = false` without a reason.
#[utoipa::path(
    post,
    path = "/api/tokens/validate",
    request_body = ValidateTokenRequest,
    responses(
        (status = 200, description = "Validation result", body = ValidateTokenResponse),
        (status = 400, description = "Empty token")
    ),
    tag = "auth",
    security(())
)]
pub async fn validate_token(
    Extension(reader): Extension<Arc<JwtReader>>,
    Json(payload): Json<ValidateTokenRequest>,
) -> Result<Json<ValidateTokenResponse>> {
    if payload.token.trim().is_empty() {
        return Err(AppError::InvalidInput("token must not be empty".to_string()));
    }

    let response = match reader.read_access_token(payload.token.trim()) {
        Some(validated) => ValidateTokenResponse {
            valid: true,
            valid_to: Some(validated.valid_to),
            claims: Some(serde_json::Value::Object(validated.claims.into_inner())),
        },
        None => ValidateTokenResponse {
            valid: false,
            valid_to: None,
            claims: None,
        },
    };

    Ok(Json(response))
}

/// Confirm the caller satisfies a named policy
///
/// Each registered policy is mounted on its own route guarded by that
/// policy, so reaching the handler means access was granted. The route
/// closure supplies the policy name.
#[utoipa::path(
    get,
    path = "/api/policies/{policy}",
    params(
        ("policy" = String, Path, description = "Name of a registered policy")
    ),
    responses(
        (status = 200, description = "Policy granted", body = PolicyCheckResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Permission claim missing")
    ),
    tag = "auth"
)]
pub async fn check_policy(policy: String) -> Json<PolicyCheckResponse> {
    Json(PolicyCheckResponse {
        policy,
        granted: true,
    })
}
