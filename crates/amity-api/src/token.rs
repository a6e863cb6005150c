use chrono::{TimeDelta, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use amity_types::api::Claims;
use amity_types::models::Role;

use crate::error::ApiError;

/// Tokens stay valid for 90 days.
pub const TOKEN_TTL_DAYS: i64 = 90;

/// Stateless HS256 session tokens. The secret is injected at startup from
/// process configuration; it never lives in source.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(
        &self,
        subject: &str,
        roles: &[Role],
        deletion_requested: bool,
    ) -> anyhow::Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            roles: roles.to_vec(),
            deletion_requested,
            iat: now.timestamp() as usize,
            exp: (now + TimeDelta::days(TOKEN_TTL_DAYS)).timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Bad signature, malformed payload, and past expiry are all routine
    /// outcomes here, reported as `InvalidToken` rather than anything
    /// panicking or more specific.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| ApiError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_verify_roundtrip() {
        let tokens = TokenService::new("test-secret");
        let token = tokens.issue("alice", &[Role::User], false).unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.roles, vec![Role::User]);
        assert!(!claims.deletion_requested);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn deletion_flag_survives_roundtrip() {
        let tokens = TokenService::new("test-secret");
        let token = tokens
            .issue("bob", &[Role::User, Role::Admin], true)
            .unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert!(claims.deletion_requested);
        assert_eq!(claims.roles, vec![Role::User, Role::Admin]);
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let tokens = TokenService::new("test-secret");
        let other = TokenService::new("other-secret");

        let token = tokens.issue("alice", &[Role::User], false).unwrap();
        assert!(matches!(
            other.verify(&token),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn garbage_input_fails_verification() {
        let tokens = TokenService::new("test-secret");
        assert!(matches!(
            tokens.verify("not.a.token"),
            Err(ApiError::InvalidToken)
        ));
        assert!(matches!(tokens.verify(""), Err(ApiError::InvalidToken)));
    }

    #[test]
    fn expired_token_fails_verification() {
        let tokens = TokenService::new("test-secret");

        let now = Utc::now();
        let claims = Claims {
            sub: "alice".into(),
            roles: vec![Role::User],
            deletion_requested: false,
            iat: (now - TimeDelta::days(91)).timestamp() as usize,
            exp: (now - TimeDelta::days(1)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(matches!(
            tokens.verify(&token),
            Err(ApiError::InvalidToken)
        ));
    }
}
