use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crm_core::UserId;

use crate::Identity;

/// Claims carried by the auth provider's access tokens.
///
/// Timestamps are unix seconds, as issued by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Provider-level role (`authenticated` for signed-in users). Not the CRM role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Issued-at.
    pub iat: i64,

    /// Expiration.
    pub exp: i64,
}

impl SessionClaims {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.sub,
            email: self.email.clone(),
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("malformed or badly signed token: {0}")]
    Malformed(String),
}

/// Deterministically validate session claims against `now`.
///
/// Signature verification happens in [`SessionValidator`] implementations.
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

/// Verifies an access token and returns its claims.
pub trait SessionValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenValidationError>;
}

/// HS256 verifier using the provider's shared JWT secret.
pub struct Hs256SessionValidator {
    key: DecodingKey,
}

impl Hs256SessionValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
        }
    }
}

impl SessionValidator for Hs256SessionValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenValidationError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time checks are done by `validate_claims` against the caller's clock.
        validation.validate_exp = false;
        validation.validate_aud = false;

        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.key, &validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

/// HS256 token issuer (dev/in-memory auth provider and tests).
pub struct Hs256TokenIssuer {
    key: EncodingKey,
}

impl Hs256TokenIssuer {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_ref()),
        }
    }

    pub fn issue(&self, claims: &SessionClaims) -> Result<String, TokenValidationError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.key)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims_at(now: DateTime<Utc>) -> SessionClaims {
        SessionClaims {
            sub: UserId::new(),
            email: Some("ana@exemple.fr".to_string()),
            role: Some("authenticated".to_string()),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        }
    }

    #[test]
    fn issued_token_validates() {
        let now = Utc::now();
        let claims = claims_at(now);
        let token = Hs256TokenIssuer::new("s3cret").issue(&claims).unwrap();

        let decoded = Hs256SessionValidator::new("s3cret").validate(&token, now).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn wrong_secret_is_malformed() {
        let now = Utc::now();
        let token = Hs256TokenIssuer::new("s3cret").issue(&claims_at(now)).unwrap();

        let err = Hs256SessionValidator::new("other").validate(&token, now).unwrap_err();
        assert!(matches!(err, TokenValidationError::Malformed(_)));
    }

    #[test]
    fn expiry_is_checked_against_caller_clock() {
        let now = Utc::now();
        let claims = claims_at(now);
        assert_eq!(
            validate_claims(&claims, now + Duration::hours(2)),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&claims, now - Duration::minutes(5)),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn inverted_window_is_rejected() {
        let now = Utc::now();
        let mut claims = claims_at(now);
        claims.exp = claims.iat;
        assert_eq!(validate_claims(&claims, now), Err(TokenValidationError::InvalidTimeWindow));
    }
}
