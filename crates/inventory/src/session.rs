//! Stateless session tokens.
//!
//! Tokens are HS256 JWTs carrying the username and an expiry. Nothing is kept
//! server side: replacing the signing secret is the only way to revoke, and
//! it revokes every outstanding session at once.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

pub const SESSION_TTL_HOURS: i64 = 24;

/// Shortest signing secret accepted, in bytes (the HS256 block size).
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

pub struct SessionAuthority {
    secret: Zeroizing<Vec<u8>>,
    ttl: Duration,
    validation: Validation,
}

impl SessionAuthority {
    pub fn new(secret: &[u8]) -> Result<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(Error::InvalidInput(format!(
                "session secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Ok(Self {
            secret: Zeroizing::new(secret.to_vec()),
            ttl: Duration::hours(SESSION_TTL_HOURS),
            validation,
        })
    }

    pub fn issue(&self, username: &str) -> Result<String> {
        self.issue_at(username, Utc::now())
    }

    /// Issues a token as if the current time were `now`.
    pub fn issue_at(&self, username: &str, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            sub: username.to_owned(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| Error::Internal(format!("token signing failed: {e}")))
    }

    /// Resolves a token to its username.
    ///
    /// Malformed, forged and expired tokens all come back as
    /// [`Error::Unauthorized`].
    pub fn verify(&self, token: &str) -> Result<String> {
        let data = decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &self.validation)
            .map_err(|e| {
                tracing::debug!("Rejected session token: {:?}", e.kind());
                Error::Unauthorized
            })?;
        if data.claims.sub.is_empty() {
            return Err(Error::Unauthorized);
        }
        Ok(data.claims.sub)
    }
}

/// Extracts the token from an `Authorization` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
