use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

// ============= Claims =============

/// The full set of claims carried by a validated token.
///
/// Claims are kept exactly as they appear in the token payload. A claim
/// whose value is an array is treated as several claims of the same type,
/// so `{"Permission": ["Admin", "Billing"]}` satisfies both an `Admin` and
/// a `Billing` check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimsPrincipal {
    claims: Map<String, Value>,
}

impl ClaimsPrincipal {
    pub fn new(claims: Map<String, Value>) -> Self {
        Self { claims }
    }

    /// Raw claim value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// The `sub` claim, if it is a string.
    pub fn subject(&self) -> Option<&str> {
        self.get("sub").and_then(Value::as_str)
    }

    /// The `iss` claim, if it is a string.
    pub fn issuer(&self) -> Option<&str> {
        self.get("iss").and_then(Value::as_str)
    }

    /// Every audience the token was issued for.
    pub fn audiences(&self) -> Vec<String> {
        self.values("aud")
    }

    /// All values of a claim type, flattening arrays. Scalars other than
    /// strings are rendered with their JSON representation.
    pub fn values(&self, name: &str) -> Vec<String> {
        match self.get(name) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().filter_map(claim_value_to_string).collect(),
            Some(other) => claim_value_to_string(other).into_iter().collect(),
        }
    }

    /// Whether a claim of type `name` with value `value` is present.
    pub fn has_claim(&self, name: &str, value: &str) -> bool {
        self.values(name).iter().any(|v| v == value)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.claims
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.claims
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

fn claim_value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
    }
}

impl From<Map<String, Value>> for ClaimsPrincipal {
    fn from(claims: Map<String, Value>) -> Self {
        Self::new(claims)
    }
}

// ============= Authentication Types =============

/// An access/refresh token pair.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub access_token_expires_at: DateTime<Utc>,
}

// ============= Error Types =============

/// Reasons a bearer token can fail validation or issuance.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token signing algorithm is not accepted")]
    InvalidAlgorithm,

    #[error("token has expired")]
    Expired,

    #[error("token is not valid yet")]
    NotYetValid,

    #[error("token issuer is invalid")]
    InvalidIssuer,

    #[error("token audience is invalid")]
    InvalidAudience,

    #[error("token is missing required claim '{0}'")]
    MissingClaim(String),

    #[error("token claim '{0}' has an invalid value")]
    InvalidClaim(&'static str),

    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error("token validation failed: {0}")]
    Other(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => TokenError::Malformed(err.to_string()),
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidAlgorithm => TokenError::InvalidAlgorithm,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::ImmatureSignature => TokenError::NotYetValid,
            ErrorKind::InvalidIssuer => TokenError::InvalidIssuer,
            ErrorKind::InvalidAudience => TokenError::InvalidAudience,
            ErrorKind::MissingRequiredClaim(claim) => TokenError::MissingClaim(claim.clone()),
            _ => TokenError::Other(err.to_string()),
        }
    }
}

/// Errors surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Auth(msg) => (axum::http::StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (axum::http::StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (axum::http::StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (axum::http::StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn principal(value: Value) -> ClaimsPrincipal {
        match value {
            Value::Object(map) => ClaimsPrincipal::new(map),
            _ => panic!("claims must be an object"),
        }
    }

    #[test]
    fn test_has_claim_with_scalar_and_array() {
        let claims = principal(json!({
            "sub": "user-1",
            "Permission": ["Admin", "Billing"],
            "role": "manager"
        }));

        assert!(claims.has_claim("Permission", "Admin"));
        assert!(claims.has_claim("Permission", "Billing"));
        assert!(!claims.has_claim("Permission", "Support"));
        assert!(claims.has_claim("role", "manager"));
        assert!(!claims.has_claim("missing", "anything"));
    }

    #[test]
    fn test_audiences_single_and_many() {
        let single = principal(json!({ "aud": "api" }));
        assert_eq!(single.audiences(), vec!["api".to_string()]);

        let many = principal(json!({ "aud": ["api", "admin"] }));
        assert_eq!(many.audiences(), vec!["api".to_string(), "admin".to_string()]);
    }

    #[test]
    fn test_numeric_claims_render_as_strings() {
        let claims = principal(json!({ "tenant": 42, "verified": true, "nothing": null }));
        assert!(claims.has_claim("tenant", "42"));
        assert!(claims.has_claim("verified", "true"));
        assert!(claims.values("nothing").is_empty());
    }

    #[test]
    fn test_subject_requires_string() {
        let claims = principal(json!({ "sub": 7 }));
        assert_eq!(claims.subject(), None);
        assert_eq!(claims.len(), 1);
    }

    #[test]
    fn test_app_error_status_codes() {
        use axum::http::StatusCode;
        use axum::response::IntoResponse;

        let cases = [
            (AppError::Auth("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
