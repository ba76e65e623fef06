use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Map, Value, json};

use crate::error::{Error, Result};

/// Default token subject.
pub const DEFAULT_SUBJECT: &str = "test_user_123";
/// Default token issuer.
pub const DEFAULT_ISSUER: &str = "https://clerk.cfipros.com";
/// Default token audience.
pub const DEFAULT_AUDIENCE: &str = "cfipros-api";
/// 2021-01-01T00:00:00Z
pub const DEFAULT_ISSUED_AT: u64 = 1_609_459_200;
pub const DEFAULT_EXPIRY: u64 = 9_999_999_999;

/// A claim set for exercising a remote token verifier.
///
/// Claims can be changed or removed before encoding to build expired,
/// wrong-issuer or incomplete tokens. Encoding never checks the claims.
///
/// # Examples
///
/// ```
/// use apicheck::auth::MockToken;
///
/// let token = MockToken::new().set("exp", 1_000_000_000).remove("sub");
/// assert!(token.claim("sub").is_none());
///
/// let encoded = token.encode("test_secret").unwrap();
/// assert_eq!(encoded.split('.').count(), 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MockToken {
    claims: Map<String, Value>,
}

impl Default for MockToken {
    fn default() -> Self {
        Self::with_subject(DEFAULT_SUBJECT, "test@cfipros.com")
    }
}

impl MockToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default claims for the given user.
    pub fn with_subject(sub: impl Into<String>, email: impl Into<String>) -> Self {
        let claims = json!({
            "sub": sub.into(),
            "email": email.into(),
            "org_id": "org_test_123",
            "org_role": "student",
            "iat": DEFAULT_ISSUED_AT,
            "exp": DEFAULT_EXPIRY,
            "iss": DEFAULT_ISSUER,
            "aud": DEFAULT_AUDIENCE,
        });
        let claims = match claims {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { claims }
    }

    /// Sets or replaces a claim.
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.claims.insert(name.to_string(), value.into());
        self
    }

    /// Removes a claim.
    pub fn remove(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// Signs the claims with HS256.
    pub fn encode(&self, secret: &str) -> Result<String> {
        encode(
            &Header::new(Algorithm::HS256),
            &self.claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| Error::token(format!("failed to encode token: {}", e)))
    }

    /// `Bearer <token>` header value.
    pub fn bearer(&self, secret: &str) -> Result<String> {
        Ok(format!("Bearer {}", self.encode(secret)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    fn decode_claims(token: &str, secret: &str) -> Map<String, Value> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[DEFAULT_AUDIENCE]);
        validation.set_issuer(&[DEFAULT_ISSUER]);
        decode::<Map<String, Value>>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
            .unwrap()
            .claims
    }

    #[test]
    fn test_defaults() {
        let token = MockToken::new();
        assert_eq!(token.claim("sub"), Some(&json!("test_user_123")));
        assert_eq!(token.claim("email"), Some(&json!("test@cfipros.com")));
        assert_eq!(token.claim("org_id"), Some(&json!("org_test_123")));
        assert_eq!(token.claim("org_role"), Some(&json!("student")));
        assert_eq!(token.claim("iat"), Some(&json!(1609459200u64)));
        assert_eq!(token.claim("exp"), Some(&json!(9999999999u64)));
        assert_eq!(token.claim("iss"), Some(&json!("https://clerk.cfipros.com")));
        assert_eq!(token.claim("aud"), Some(&json!("cfipros-api")));
    }

    #[test]
    fn test_encode_round_trip() {
        let encoded = MockToken::new().encode("test_secret").unwrap();
        let claims = decode_claims(&encoded, "test_secret");
        assert_eq!(claims["sub"], json!("test_user_123"));
        assert_eq!(claims["iss"], json!(DEFAULT_ISSUER));
        assert_eq!(claims["exp"], json!(DEFAULT_EXPIRY));
    }

    #[test]
    fn test_encode_without_subject() {
        let token = MockToken::new().remove("sub");
        assert!(token.claim("sub").is_none());
        let encoded = token.encode("test_secret").unwrap();
        assert_eq!(encoded.split('.').count(), 3);
    }

    #[test]
    fn test_set_overrides() {
        let token = MockToken::new().set("iss", "https://malicious-issuer.com");
        assert_eq!(token.claim("iss"), Some(&json!("https://malicious-issuer.com")));
    }

    #[test]
    fn test_bearer_prefix() {
        let value = MockToken::new().bearer("test_secret").unwrap();
        assert!(value.starts_with("Bearer ey"));
    }

    #[test]
    fn test_wrong_secret_fails_verification() {
        let encoded = MockToken::new().encode("one").unwrap();
        let validation = Validation::new(Algorithm::HS256);
        let result = decode::<Map<String, Value>>(
            &encoded,
            &DecodingKey::from_secret(b"two"),
            &validation,
        );
        assert!(result.is_err());
    }
}
