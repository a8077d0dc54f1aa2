//! HS256 token signing and verification.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockroom_core::UserId;

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};
use crate::Role;

/// Verifies a bearer token and returns its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// On-the-wire claim layout (RFC 7519 numeric dates).
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    sub: Uuid,
    username: String,
    roles: Vec<Role>,
    iat: i64,
    exp: i64,
}

/// Symmetric HS256 signer/validator.
pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Hs256Jwt {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn sign(&self, claims: &JwtClaims) -> Result<String, TokenValidationError> {
        let wire = WireClaims {
            sub: *claims.sub.as_uuid(),
            username: claims.username.clone(),
            roles: claims.roles.clone(),
            iat: claims.issued_at.timestamp(),
            exp: claims.expires_at.timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &wire, &self.encoding)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))
    }
}

impl JwtValidator for Hs256Jwt {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        // Expiry is checked by `validate_claims` against the caller's clock,
        // so the library's own leeway-based exp check stays disabled.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let wire = jsonwebtoken::decode::<WireClaims>(token, &self.decoding, &validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?
            .claims;

        let issued_at = Utc
            .timestamp_opt(wire.iat, 0)
            .single()
            .ok_or_else(|| TokenValidationError::Malformed("bad iat".to_string()))?;
        let expires_at = Utc
            .timestamp_opt(wire.exp, 0)
            .single()
            .ok_or_else(|| TokenValidationError::Malformed("bad exp".to_string()))?;

        let claims = JwtClaims {
            sub: UserId::from_uuid(wire.sub),
            username: wire.username,
            roles: wire.roles,
            issued_at,
            expires_at,
        };
        validate_claims(&claims, now)?;
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims_valid_for(minutes: i64) -> JwtClaims {
        let now = Utc::now();
        JwtClaims {
            sub: UserId::new(),
            username: "admin".to_string(),
            roles: vec![Role::Admin, Role::User],
            issued_at: now - Duration::minutes(5),
            expires_at: now + Duration::minutes(minutes),
        }
    }

    #[test]
    fn sign_then_validate_roundtrip() {
        let jwt = Hs256Jwt::new(b"test-secret");
        let claims = claims_valid_for(10);
        let token = jwt.sign(&claims).unwrap();

        let decoded = jwt.validate(&token, Utc::now()).unwrap();
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.roles, claims.roles);
        assert_eq!(decoded.username, "admin");
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let signer = Hs256Jwt::new(b"secret-a");
        let verifier = Hs256Jwt::new(b"secret-b");
        let token = signer.sign(&claims_valid_for(10)).unwrap();

        assert!(matches!(
            verifier.validate(&token, Utc::now()),
            Err(TokenValidationError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let jwt = Hs256Jwt::new(b"test-secret");
        let token = jwt.sign(&claims_valid_for(-1)).unwrap();

        assert_eq!(
            jwt.validate(&token, Utc::now()),
            Err(TokenValidationError::Expired)
        );
    }
}
