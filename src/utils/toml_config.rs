//! TOML-based configuration for service-commons
//!
//! Configuration is read once at startup from a TOML file (`commons.toml`
//! by default) and is immutable afterwards. Secrets such as the signing key
//! can be supplied through environment variables using the
//! `Section__Key` convention, e.g. `JwtOptions__Key`.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! environment = "development"
//!
//! [JwtOptions]
//! Issuer = "https://auth.example.com"
//! Audience = "orders-api"
//! Key = "a-long-random-secret-of-at-least-32-bytes"
//! AccessTokenLifetime = 15
//! RefreshTokenLifetime = 10080
//! ```

use jsonwebtoken::{DecodingKey, EncodingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// Name of the configuration section holding [`JwtOptions`].
pub const JWT_OPTIONS_SECTION: &str = "JwtOptions";

/// Environment variable selecting the hosting [`Environment`].
pub const ENVIRONMENT_VAR: &str = "APP_ENVIRONMENT";

/// Upper bound for token lifetimes: ten years, in minutes.
pub const MAX_TOKEN_LIFETIME_MINUTES: i64 = 10 * 365 * 24 * 60;

/// Keys shorter than this are accepted but logged as weak.
const RECOMMENDED_KEY_BYTES: usize = 32;

/// Root configuration structure loaded from commons.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// JWT settings; required only when JWT authentication is enabled
    #[serde(
        rename = "JwtOptions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub jwt_options: Option<JwtOptions>,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text
    #[serde(default)]
    pub log_json: bool,

    #[serde(default)]
    pub environment: Environment,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_json: false,
            environment: Environment::default(),
        }
    }
}

/// Hosting environment the application runs in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

// ============= JWT Configuration =============

/// Issuer, audience and symmetric key shared by token issuance and
/// validation, plus token lifetimes.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct JwtOptions {
    /// Expected `iss` claim
    #[serde(default)]
    pub issuer: String,

    /// Expected `aud` claim
    #[serde(default)]
    pub audience: String,

    /// Symmetric signing key; its UTF-8 bytes are the HMAC secret
    #[serde(default)]
    pub key: String,

    /// Access token lifetime in minutes
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime: i64,

    /// Refresh token lifetime in minutes
    #[serde(default = "default_refresh_token_lifetime")]
    pub refresh_token_lifetime: i64,

    /// Tolerance in seconds applied to `exp` and `nbf` checks
    #[serde(default = "default_clock_skew")]
    pub clock_skew: u64,
}

fn default_access_token_lifetime() -> i64 {
    15
}

fn default_refresh_token_lifetime() -> i64 {
    10080
}

fn default_clock_skew() -> u64 {
    300
}

impl JwtOptions {
    pub fn new(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            key: key.into(),
            access_token_lifetime: default_access_token_lifetime(),
            refresh_token_lifetime: default_refresh_token_lifetime(),
            clock_skew: default_clock_skew(),
        }
    }

    /// Set access and refresh token lifetimes (minutes).
    pub fn with_lifetimes(mut self, access_minutes: i64, refresh_minutes: i64) -> Self {
        self.access_token_lifetime = access_minutes;
        self.refresh_token_lifetime = refresh_minutes;
        self
    }

    pub fn with_clock_skew(mut self, seconds: u64) -> Self {
        self.clock_skew = seconds;
        self
    }

    pub fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.key.as_bytes())
    }

    pub fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.key.as_bytes())
    }

    /// `None` when the configured minutes overflow a `Duration`.
    pub fn access_token_lifetime(&self) -> Option<chrono::Duration> {
        chrono::Duration::try_minutes(self.access_token_lifetime)
    }

    pub fn refresh_token_lifetime(&self) -> Option<chrono::Duration> {
        chrono::Duration::try_minutes(self.refresh_token_lifetime)
    }

    /// Copy with the signing key masked, for display.
    pub fn redacted(&self) -> Self {
        Self {
            key: "********".to_string(),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{JWT_OPTIONS_SECTION}.Key must not be empty"
            )));
        }
        validate_lifetime("AccessTokenLifetime", self.access_token_lifetime)?;
        validate_lifetime("RefreshTokenLifetime", self.refresh_token_lifetime)?;
        if self.key.len() < RECOMMENDED_KEY_BYTES {
            warn!(
                key_bytes = self.key.len(),
                "{JWT_OPTIONS_SECTION}.Key is shorter than {RECOMMENDED_KEY_BYTES} bytes"
            );
        }
        Ok(())
    }
}

fn validate_lifetime(name: &str, minutes: i64) -> Result<(), ConfigError> {
    if minutes <= 0 {
        return Err(ConfigError::ValidationError(format!(
            "{JWT_OPTIONS_SECTION}.{name} must be positive"
        )));
    }
    if minutes > MAX_TOKEN_LIFETIME_MINUTES {
        return Err(ConfigError::ValidationError(format!(
            "{JWT_OPTIONS_SECTION}.{name} must not exceed {MAX_TOKEN_LIFETIME_MINUTES} minutes"
        )));
    }
    Ok(())
}

impl fmt::Debug for JwtOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtOptions")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("key", &"<redacted>")
            .field("access_token_lifetime", &self.access_token_lifetime)
            .field("refresh_token_lifetime", &self.refresh_token_lifetime)
            .field("clock_skew", &self.clock_skew)
            .finish()
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Environment variable '{key}' has an invalid value: {reason}")]
    InvalidOverride { key: String, reason: String },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl AppConfig {
    /// Load configuration from a TOML file, apply environment overrides and
    /// validate the result.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML text without consulting the environment.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(jwt) = &self.jwt_options {
            jwt.validate()?;
        }
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `Section__Key` overrides resolved through `lookup`.
    ///
    /// Any `JwtOptions__*` override creates the section when the file did
    /// not declare it.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENVIRONMENT_VAR) {
            self.server.environment = value
                .parse()
                .map_err(|reason| ConfigError::InvalidOverride {
                    key: ENVIRONMENT_VAR.to_string(),
                    reason,
                })?;
        }

        let var = |name: &str| format!("{JWT_OPTIONS_SECTION}__{name}");

        let issuer = lookup(&var("Issuer"));
        let audience = lookup(&var("Audience"));
        let key = lookup(&var("Key"));
        let access = lookup(&var("AccessTokenLifetime"));
        let refresh = lookup(&var("RefreshTokenLifetime"));
        let skew = lookup(&var("ClockSkew"));

        let any_set = [&issuer, &audience, &key, &access, &refresh, &skew]
            .iter()
            .any(|v| v.is_some());
        if !any_set {
            return Ok(());
        }

        let jwt = self
            .jwt_options
            .get_or_insert_with(|| JwtOptions::new("", "", ""));

        if let Some(v) = issuer {
            jwt.issuer = v;
        }
        if let Some(v) = audience {
            jwt.audience = v;
        }
        if let Some(v) = key {
            jwt.key = v;
        }
        if let Some(v) = access {
            jwt.access_token_lifetime = parse_override(&var("AccessTokenLifetime"), &v)?;
        }
        if let Some(v) = refresh {
            jwt.refresh_token_lifetime = parse_override(&var("RefreshTokenLifetime"), &v)?;
        }
        if let Some(v) = skew {
            jwt.clock_skew = parse_override(&var("ClockSkew"), &v)?;
        }

        Ok(())
    }

    /// Socket address string the server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        Self {
            server: self.server.clone(),
            jwt_options: self.jwt_options.as_ref().map(JwtOptions::redacted),
        }
    }
}

fn parse_override<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidOverride {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn create_test_config() -> String {
        r#"
[server]
host = "0.0.0.0"
port = 9000
log_level = "debug"
environment = "development"

[JwtOptions]
Issuer = "test-issuer"
Audience = "test-audience"
Key = "test-secret-key-that-is-at-least-32-chars"
AccessTokenLifetime = 30
RefreshTokenLifetime = 1440
"#
        .to_string()
    }

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_config() {
        let config = AppConfig::from_toml_str(&create_test_config()).expect("should parse");

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.environment, Environment::Development);

        let jwt = config.jwt_options.expect("JwtOptions section present");
        assert_eq!(jwt.issuer, "test-issuer");
        assert_eq!(jwt.audience, "test-audience");
        assert_eq!(jwt.access_token_lifetime, 30);
        assert_eq!(jwt.refresh_token_lifetime, 1440);
        assert_eq!(jwt.clock_skew, 300, "clock skew should default");
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_toml_str("").expect("empty config is valid");

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.server.environment, Environment::Production);
        assert!(config.jwt_options.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_key_fails_validation() {
        let config = AppConfig::from_toml_str(
            r#"
[JwtOptions]
Issuer = "i"
Audience = "a"
"#,
        )
        .expect("should parse");

        let err = config.validate().expect_err("empty key must be rejected");
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_non_positive_lifetime_fails_validation() {
        let key = "k".repeat(32);
        for (access, refresh) in [(-1, 10), (0, 10), (15, 0), (0, 0)] {
            let options = JwtOptions::new("i", "a", key.as_str()).with_lifetimes(access, refresh);
            assert!(
                matches!(options.validate(), Err(ConfigError::ValidationError(ref msg)) if msg.contains("must be positive")),
                "lifetimes ({access}, {refresh}) should be rejected"
            );
        }
    }

    #[test]
    fn test_oversized_lifetime_fails_validation() {
        let key = "k".repeat(32);

        let huge = JwtOptions::new("i", "a", key.as_str()).with_lifetimes(1_000_000_000_000, 10);
        assert!(huge.validate().is_err());

        let huge_refresh = JwtOptions::new("i", "a", key.as_str())
            .with_lifetimes(15, MAX_TOKEN_LIFETIME_MINUTES + 1);
        assert!(huge_refresh.validate().is_err());

        let at_limit = JwtOptions::new("i", "a", key.as_str())
            .with_lifetimes(MAX_TOKEN_LIFETIME_MINUTES, MAX_TOKEN_LIFETIME_MINUTES);
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config = AppConfig::from_toml_str(&create_test_config()).expect("should parse");

        config
            .apply_overrides(lookup_from(&[
                ("JwtOptions__Key", "override-secret-override-secret-123"),
                ("JwtOptions__AccessTokenLifetime", "5"),
                ("APP_ENVIRONMENT", "Production"),
            ]))
            .expect("overrides should apply");

        let jwt = config.jwt_options.as_ref().expect("section present");
        assert_eq!(jwt.key, "override-secret-override-secret-123");
        assert_eq!(jwt.access_token_lifetime, 5);
        assert_eq!(jwt.issuer, "test-issuer", "untouched keys keep file values");
        assert_eq!(config.server.environment, Environment::Production);
    }

    #[test]
    fn test_overrides_create_missing_section() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(lookup_from(&[
                ("JwtOptions__Issuer", "env-issuer"),
                ("JwtOptions__Audience", "env-audience"),
                ("JwtOptions__Key", "env-secret-env-secret-env-secret-00"),
            ]))
            .expect("overrides should apply");

        let jwt = config.jwt_options.expect("section created from environment");
        assert_eq!(jwt.issuer, "env-issuer");
        assert_eq!(jwt.access_token_lifetime, 15);
    }

    #[test]
    fn test_no_overrides_leave_section_absent() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(lookup_from(&[]))
            .expect("nothing to apply");
        assert!(config.jwt_options.is_none());
    }

    #[test]
    fn test_invalid_override_value() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(lookup_from(&[("JwtOptions__ClockSkew", "soon")]))
            .expect_err("non-numeric skew must fail");

        match err {
            ConfigError::InvalidOverride { key, .. } => assert_eq!(key, "JwtOptions__ClockSkew"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_environment_override() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides(lookup_from(&[("APP_ENVIRONMENT", "moon")]));
        assert!(matches!(result, Err(ConfigError::InvalidOverride { .. })));
    }

    #[test]
    fn test_load_missing_file() {
        let result = AppConfig::load("/definitely/not/here/commons.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("commons.toml");
        fs::write(&path, create_test_config()).expect("write config");

        let config = AppConfig::load(&path).expect("should load");
        assert!(config.jwt_options.is_some());
    }

    #[test]
    fn test_debug_and_redacted_hide_key() {
        let options = JwtOptions::new("i", "a", "super-secret-value");
        let debug = format!("{options:?}");
        assert!(!debug.contains("super-secret-value"));
        assert_ne!(options.redacted().key, options.key);
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("Development".parse::<Environment>(), Ok(Environment::Development));
        assert_eq!("prod".parse::<Environment>(), Ok(Environment::Production));
        assert!("qa".parse::<Environment>().is_err());
        assert!(Environment::Development.is_development());
        assert!(!Environment::Staging.is_development());
    }
}
