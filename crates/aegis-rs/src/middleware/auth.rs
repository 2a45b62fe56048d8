//! JWT authentication and role-based authorization stages.
//!
//! Token primitives stay external: this stage only validates an HS256-signed
//! bearer token against a shared secret, checks issuer/audience/required
//! claims, and exposes the decoded claim set to downstream stages (limiter
//! keys, authorization rules).

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared secret for HS256 signature validation.
    pub secret: String,
    /// Expected `iss` claim, when present.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Expected `aud` claim, when present.
    #[serde(default)]
    pub audience: Option<String>,
    /// Claims that must be present in a valid token.
    #[serde(default)]
    pub required_claims: Vec<String>,
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.secret.is_empty() {
            return Err("auth secret cannot be empty".to_string());
        }
        if self.secret.len() < 32 {
            return Err("auth secret should be at least 32 characters".to_string());
        }
        Ok(())
    }
}

/// Authorization rules evaluated after authentication.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthzConfig {
    /// The request passes when the token's `roles` claim contains at least
    /// one of these. Empty means any authenticated caller passes.
    #[serde(default)]
    pub required_roles: Vec<String>,
}

/// Validates bearer tokens for one route.
#[derive(Clone)]
pub struct Authenticator {
    decoding_key: DecodingKey,
    validation: Validation,
    required_claims: HashSet<String>,
}

impl Authenticator {
    pub fn new(config: &AuthConfig) -> Result<Self, String> {
        config.validate()?;
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(ref iss) = config.issuer {
            validation.set_issuer(&[iss]);
        }
        if let Some(ref aud) = config.audience {
            validation.set_audience(&[aud]);
        } else {
            validation.validate_aud = false;
        }
        Ok(Self {
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            required_claims: config.required_claims.iter().cloned().collect(),
        })
    }

    /// Extracts and validates the bearer token, returning the claim set.
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<Value, String> {
        let header = authorization.ok_or_else(|| "missing Authorization header".to_string())?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| "Authorization header is not a bearer token".to_string())?;

        let data = decode::<Value>(token, &self.decoding_key, &self.validation)
            .map_err(|e| format!("invalid token: {}", e))?;

        for claim in &self.required_claims {
            if data.claims.get(claim).is_none() {
                return Err(format!("token is missing required claim '{}'", claim));
            }
        }
        Ok(data.claims)
    }
}

/// Checks the `roles` claim against the route's required roles.
pub fn authorize(config: &AuthzConfig, claims: &Value) -> Result<(), String> {
    if config.required_roles.is_empty() {
        return Ok(());
    }
    let roles: HashSet<&str> = claims
        .get("roles")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|r| r.as_str()).collect())
        .unwrap_or_default();
    if config.required_roles.iter().any(|r| roles.contains(r.as_str())) {
        Ok(())
    } else {
        Err(format!(
            "caller lacks required role (one of: {})",
            config.required_roles.join(", ")
        ))
    }
}

/// Creates a signed token for tests and local tooling.
pub fn create_test_token(
    claims: &Value,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &str = "a-test-secret-that-is-long-enough!!";

    fn future_exp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            + 3600
    }

    fn authenticator(required: &[&str]) -> Authenticator {
        Authenticator::new(&AuthConfig {
            secret: SECRET.to_string(),
            issuer: None,
            audience: None,
            required_claims: required.iter().map(|s| s.to_string()).collect(),
        })
        .unwrap()
    }

    #[test]
    fn accepts_valid_bearer_token() {
        let auth = authenticator(&["sub"]);
        let token = create_test_token(
            &json!({"sub": "user-1", "exp": future_exp()}),
            SECRET,
        )
        .unwrap();
        let claims = auth
            .authenticate(Some(&format!("Bearer {}", token)))
            .unwrap();
        assert_eq!(claims["sub"], "user-1");
    }

    #[test]
    fn rejects_missing_and_malformed_headers() {
        let auth = authenticator(&[]);
        assert!(auth.authenticate(None).is_err());
        assert!(auth.authenticate(Some("Basic dXNlcjpwYXNz")).is_err());
        assert!(auth.authenticate(Some("Bearer not.a.jwt")).is_err());
    }

    #[test]
    fn enforces_required_claims() {
        let auth = authenticator(&["tenant"]);
        let token = create_test_token(
            &json!({"sub": "user-1", "exp": future_exp()}),
            SECRET,
        )
        .unwrap();
        let err = auth
            .authenticate(Some(&format!("Bearer {}", token)))
            .unwrap_err();
        assert!(err.contains("tenant"));
    }

    #[test]
    fn authorization_checks_roles() {
        let config = AuthzConfig {
            required_roles: vec!["admin".into()],
        };
        assert!(authorize(&config, &json!({"roles": ["admin", "ops"]})).is_ok());
        assert!(authorize(&config, &json!({"roles": ["viewer"]})).is_err());
        assert!(authorize(&config, &json!({})).is_err());
        let open = AuthzConfig::default();
        assert!(authorize(&open, &json!({})).is_ok());
    }
}
