use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shortest accepted signing secret, in bytes
pub const MIN_SECRET_LEN: usize = 32;

/// Used only when the server runs in development mode
pub const DEV_SECRET: &str = "library-manager-dev-secret-not-for-production";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to sign token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("Token expired")]
    Expired,
    #[error("Invalid token signature")]
    InvalidSignature,
    #[error("Malformed token")]
    Malformed,
    #[error("Token secret must be at least {min} bytes", min = MIN_SECRET_LEN)]
    SecretTooShort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies HS256 access tokens. No revocation: a token is good
/// until `exp`.
#[derive(Clone)]
pub struct TokenService {
    decoding: DecodingKey,
    encoding: EncodingKey,
    ttl: Duration,
    validation: Validation,
}

impl TokenService {
    pub fn new(secret: &str, ttl_seconds: u64) -> Result<Self, TokenError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::SecretTooShort);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_seconds.min(u64::from(u32::MAX)) as i64),
            validation,
        })
    }

    /// Token lifetime in seconds, as reported to clients
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn issue(&self, account_id: u64) -> Result<String, TokenError> {
        self.issue_at(account_id, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(&self, account_id: u64, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims {
            sub: account_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(TokenError::Encoding)
    }

    /// Verify signature and expiry, returning the account id.
    pub fn verify(&self, token: &str) -> Result<u64, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|err| {
            match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            }
        })?;
        data.claims.sub.parse().map_err(|_| TokenError::Malformed)
    }
}

/// Token from an `Authorization: Bearer <token>` header value
pub fn extract_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret-that-is-at-least-32-bytes-long", 3600).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let tokens = service();
        let token = tokens.issue(42).unwrap();
        assert_eq!(tokens.verify(&token).unwrap(), 42);
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(matches!(
            TokenService::new("too-short", 3600),
            Err(TokenError::SecretTooShort)
        ));
        assert!(TokenService::new(DEV_SECRET, 3600).is_ok());
    }

    #[test]
    fn test_expired_token() {
        let tokens = service();
        let issued = Utc::now() - Duration::seconds(3601 + 5);
        let token = tokens.issue_at(7, issued).unwrap();
        assert!(matches!(tokens.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_wrong_secret() {
        let token = service().issue(1).unwrap();
        let other = TokenService::new("another-secret-that-is-at-least-32-bytes", 3600).unwrap();
        assert!(matches!(other.verify(&token), Err(TokenError::InvalidSignature)));
    }

    #[test]
    fn test_tampered_and_garbage_tokens() {
        let tokens = service();
        assert!(matches!(tokens.verify("not-a-token"), Err(TokenError::Malformed)));
        assert!(tokens.verify("").is_err());

        let token = tokens.issue(1).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = tokens.issue(2).unwrap();
        let forged_payload = forged.split('.').nth(1).unwrap();
        parts[1] = forged_payload;
        assert!(tokens.verify(&parts.join(".")).is_err());
    }

    #[test]
    fn test_non_numeric_subject() {
        let tokens = service();
        let claims = Claims {
            sub: "librarian".to_string(),
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
        };
        let token = encode(&Header::default(), &claims, &tokens.encoding).unwrap();
        assert!(matches!(tokens.verify(&token), Err(TokenError::Malformed)));
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("bearer   abc "), Some("abc"));
        assert_eq!(extract_bearer("Basic dXNlcg=="), None);
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("abc.def"), None);
    }
}
