use crate::types::{ClaimsPrincipal, TokenError, TokenResponse};
use crate::utils::toml_config::JwtOptions;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, warn};
use uuid::Uuid;

/// HMAC algorithms accepted for tokens signed with the symmetric key.
const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// A token that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedToken {
    /// Every claim from the token payload
    pub claims: ClaimsPrincipal,
    /// Expiry taken from the `exp` claim
    pub valid_to: DateTime<Utc>,
}

/// Validates bearer tokens against the configured issuer, audience and
/// symmetric key.
///
/// The reader holds only immutable state and is shared across requests
/// behind an `Arc`.
#[derive(Clone)]
pub struct JwtReader {
    options: JwtOptions,
    key: DecodingKey,
    validation: Validation,
}

impl JwtReader {
    pub fn new(options: JwtOptions) -> Self {
        let validation = validation_for(&options);
        Self {
            key: options.decoding_key(),
            options,
            validation,
        }
    }

    pub fn options(&self) -> &JwtOptions {
        &self.options
    }

    /// Reads an access token.
    ///
    /// Returns the claims and expiry when the token is valid. Every failure
    /// (malformed token, bad signature, wrong issuer or audience, expired)
    /// yields `None`; the cause is only logged.
    pub fn read_access_token(&self, token: &str) -> Option<ValidatedToken> {
        match self.verify(token) {
            Ok(validated) => {
                debug!(
                    subject = validated.claims.subject().unwrap_or("-"),
                    valid_to = %validated.valid_to,
                    "access token validated"
                );
                Some(validated)
            }
            Err(err) => {
                warn!(error = %err, "access token rejected");
                None
            }
        }
    }

    /// Validates a token and reports why it was rejected.
    pub fn verify(&self, token: &str) -> Result<ValidatedToken, TokenError> {
        let data = decode::<Map<String, Value>>(token, &self.key, &self.validation)?;
        let claims = ClaimsPrincipal::new(data.claims);

        let exp = claims
            .get("exp")
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .ok_or(TokenError::InvalidClaim("exp"))?;
        let valid_to = DateTime::from_timestamp(exp, 0).ok_or(TokenError::InvalidClaim("exp"))?;

        Ok(ValidatedToken { claims, valid_to })
    }
}

impl fmt::Debug for JwtReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtReader")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn validation_for(options: &JwtOptions) -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
    validation.set_issuer(&[options.issuer.as_str()]);
    validation.set_audience(&[options.audience.as_str()]);
    validation.set_required_spec_claims(&["exp", "iss", "aud"]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = options.clock_skew;
    validation
}

/// Issues HS256 access and refresh tokens that [`JwtReader`] accepts.
#[derive(Clone)]
pub struct TokenIssuer {
    options: JwtOptions,
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(options: JwtOptions) -> Self {
        Self {
            key: options.encoding_key(),
            options,
        }
    }

    /// Issues an access/refresh pair for `subject`.
    ///
    /// `extra` claims (for example `Permission`) are copied into both
    /// tokens; registered claims (`sub`, `iss`, `aud`, `iat`, `nbf`, `exp`,
    /// `jti`) always take the issuer's values.
    pub fn issue_token_pair(
        &self,
        subject: &str,
        extra: &Map<String, Value>,
    ) -> Result<TokenResponse, TokenError> {
        let (access_token, access_token_expires_at) =
            self.issue_access_token(subject, extra)?;
        let (refresh_token, _) = self.issue_refresh_token(subject, extra)?;
        let expires_in = self
            .options
            .access_token_lifetime()
            .ok_or(TokenError::InvalidClaim("exp"))?
            .num_seconds();

        Ok(TokenResponse {
            access_token,
            refresh_token,
            expires_in,
            access_token_expires_at,
        })
    }

    pub fn issue_access_token(
        &self,
        subject: &str,
        extra: &Map<String, Value>,
    ) -> Result<(String, DateTime<Utc>), TokenError> {
        self.issue(subject, extra, self.options.access_token_lifetime())
    }

    pub fn issue_refresh_token(
        &self,
        subject: &str,
        extra: &Map<String, Value>,
    ) -> Result<(String, DateTime<Utc>), TokenError> {
        self.issue(subject, extra, self.options.refresh_token_lifetime())
    }

    fn issue(
        &self,
        subject: &str,
        extra: &Map<String, Value>,
        lifetime: Option<Duration>,
    ) -> Result<(String, DateTime<Utc>), TokenError> {
        let now = Utc::now();
        let expires_at = lifetime
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or(TokenError::InvalidClaim("exp"))?;

        let mut claims = extra.clone();
        claims.insert("sub".into(), Value::from(subject));
        claims.insert("iss".into(), Value::from(self.options.issuer.as_str()));
        claims.insert("aud".into(), Value::from(self.options.audience.as_str()));
        claims.insert("iat".into(), Value::from(now.timestamp()));
        claims.insert("nbf".into(), Value::from(now.timestamp()));
        claims.insert("exp".into(), Value::from(expires_at.timestamp()));
        claims.insert("jti".into(), Value::from(Uuid::new_v4().to_string()));

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        // Truncate to whole seconds so the value matches the `exp` claim
        let expires_at = DateTime::from_timestamp(expires_at.timestamp(), 0)
            .ok_or(TokenError::InvalidClaim("exp"))?;

        Ok((token, expires_at))
    }
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    const SECRET: &str = "test-secret-key-that-is-at-least-32-chars";
    const ISSUER: &str = "test-issuer";
    const AUDIENCE: &str = "test-audience";

    fn test_options() -> JwtOptions {
        JwtOptions::new(ISSUER, AUDIENCE, SECRET).with_lifetimes(15, 60)
    }

    fn sign(claims: &Value, secret: &str, algorithm: Algorithm) -> String {
        encode(
            &Header::new(algorithm),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("should sign token")
    }

    fn claims_with(iss: &str, aud: &str, exp_offset_secs: i64) -> Value {
        let now = Utc::now().timestamp();
        json!({
            "sub": "user-123",
            "iss": iss,
            "aud": aud,
            "iat": now,
            "exp": now + exp_offset_secs,
            "Permission": ["Admin", "Reports"],
            "email": "user@example.com"
        })
    }

    #[test]
    fn test_valid_token_returns_claims() {
        let reader = JwtReader::new(test_options());
        let payload = claims_with(ISSUER, AUDIENCE, 600);
        let token = sign(&payload, SECRET, Algorithm::HS256);

        let validated = reader
            .read_access_token(&token)
            .expect("token should validate");

        assert_eq!(validated.claims.subject(), Some("user-123"));
        assert_eq!(validated.claims.get("email"), payload.get("email"));
        assert!(validated.claims.has_claim("Permission", "Reports"));
        assert_eq!(
            validated.valid_to.timestamp(),
            payload["exp"].as_i64().expect("exp is numeric"),
            "valid_to should mirror the exp claim"
        );
        assert_eq!(
            Value::Object(validated.claims.into_inner()),
            payload,
            "every payload claim should be returned"
        );
    }

    #[test]
    fn test_other_hmac_algorithms_accepted() {
        let reader = JwtReader::new(test_options());
        let token = sign(&claims_with(ISSUER, AUDIENCE, 600), SECRET, Algorithm::HS512);
        assert!(reader.read_access_token(&token).is_some());
    }

    #[test]
    fn test_audience_array_containing_expected_value() {
        let reader = JwtReader::new(test_options());
        let mut payload = claims_with(ISSUER, AUDIENCE, 600);
        payload["aud"] = json!(["another-api", AUDIENCE]);
        let token = sign(&payload, SECRET, Algorithm::HS256);

        assert!(reader.verify(&token).is_ok());
    }

    #[rstest]
    #[case::wrong_key(
        sign(&claims_with(ISSUER, AUDIENCE, 600), "a-completely-different-secret-key-000", Algorithm::HS256),
        TokenError::InvalidSignature
    )]
    #[case::expired(
        sign(&claims_with(ISSUER, AUDIENCE, -3600), SECRET, Algorithm::HS256),
        TokenError::Expired
    )]
    #[case::wrong_issuer(
        sign(&claims_with("someone-else", AUDIENCE, 600), SECRET, Algorithm::HS256),
        TokenError::InvalidIssuer
    )]
    #[case::wrong_audience(
        sign(&claims_with(ISSUER, "other-api", 600), SECRET, Algorithm::HS256),
        TokenError::InvalidAudience
    )]
    fn test_rejected_tokens(#[case] token: String, #[case] expected: TokenError) {
        let reader = JwtReader::new(test_options());

        assert_eq!(reader.verify(&token), Err(expected));
        assert!(
            reader.read_access_token(&token).is_none(),
            "read_access_token should report failure as None"
        );
    }

    #[rstest]
    #[case::garbage("invalid.token.here")]
    #[case::empty("")]
    #[case::two_segments("abc.def")]
    fn test_malformed_tokens_rejected(#[case] token: &str) {
        let reader = JwtReader::new(test_options());
        assert!(reader.read_access_token(token).is_none());
        assert!(reader.verify(token).is_err());
    }

    #[test]
    fn test_missing_expiry_rejected() {
        let reader = JwtReader::new(test_options());
        let token = sign(
            &json!({ "sub": "user", "iss": ISSUER, "aud": AUDIENCE }),
            SECRET,
            Algorithm::HS256,
        );

        assert_eq!(
            reader.verify(&token),
            Err(TokenError::MissingClaim("exp".to_string()))
        );
    }

    #[test]
    fn test_not_yet_valid_rejected() {
        let reader = JwtReader::new(test_options());
        let mut payload = claims_with(ISSUER, AUDIENCE, 7200);
        payload["nbf"] = json!(Utc::now().timestamp() + 3600);
        let token = sign(&payload, SECRET, Algorithm::HS256);

        assert_eq!(reader.verify(&token), Err(TokenError::NotYetValid));
    }

    #[test]
    fn test_clock_skew_tolerates_recent_expiry() {
        let token = sign(&claims_with(ISSUER, AUDIENCE, -60), SECRET, Algorithm::HS256);

        let lenient = JwtReader::new(test_options());
        assert!(lenient.verify(&token).is_ok(), "default skew is five minutes");

        let strict = JwtReader::new(test_options().with_clock_skew(0));
        assert_eq!(strict.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_issued_tokens_validate() {
        let issuer = TokenIssuer::new(test_options());
        let reader = JwtReader::new(test_options());

        let mut extra = Map::new();
        extra.insert("Permission".into(), json!("Admin"));
        extra.insert("sub".into(), json!("spoofed"));

        let tokens = issuer
            .issue_token_pair("user-456", &extra)
            .expect("should issue tokens");

        assert_eq!(tokens.expires_in, 15 * 60);
        assert_ne!(tokens.access_token, tokens.refresh_token);

        let access = reader
            .verify(&tokens.access_token)
            .expect("access token should validate");
        assert_eq!(access.claims.subject(), Some("user-456"));
        assert!(access.claims.has_claim("Permission", "Admin"));
        assert_eq!(access.valid_to, tokens.access_token_expires_at);

        let refresh = reader
            .verify(&tokens.refresh_token)
            .expect("refresh token should validate");
        assert!(refresh.valid_to > access.valid_to);
    }

    #[test]
    fn test_issued_token_expiry_matches_lifetime() {
        let issuer = TokenIssuer::new(test_options());
        let before = Utc::now().timestamp();
        let (_, expires_at) = issuer
            .issue_access_token("user", &Map::new())
            .expect("should issue");

        let expected = before + 15 * 60;
        assert!(
            (expires_at.timestamp() - expected).abs() <= 5,
            "exp should be now + access lifetime"
        );
    }

    #[test]
    fn test_unrepresentable_lifetime_is_an_error() {
        let issuer = TokenIssuer::new(test_options().with_lifetimes(1_000_000_000_000, 10));

        assert_eq!(
            issuer.issue_access_token("user", &Map::new()),
            Err(TokenError::InvalidClaim("exp"))
        );
        assert!(issuer.issue_token_pair("user", &Map::new()).is_err());

        let refresh_overflow = TokenIssuer::new(test_options().with_lifetimes(15, i64::MAX));
        assert!(refresh_overflow
            .issue_refresh_token("user", &Map::new())
            .is_err());
    }

    #[test]
    fn test_token_from_other_issuer_config_rejected() {
        let other = TokenIssuer::new(JwtOptions::new(ISSUER, AUDIENCE, "secret-two-that-is-32-chars-long!"));
        let reader = JwtReader::new(test_options());

        let (token, _) = other
            .issue_access_token("user", &Map::new())
            .expect("should issue");

        assert!(reader.read_access_token(&token).is_none());
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let reader = JwtReader::new(test_options());
        assert!(!format!("{reader:?}").contains(SECRET));
    }
}
