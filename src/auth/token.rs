//! HS256 session tokens.
//!
//! Every token carries the subject, a human-readable issue stamp, and the
//! standard `iat`/`exp` pair. Access and refresh tokens differ only in
//! lifetime; refresh tokens are additionally persisted by the caller.

use crate::util::TIMESTAMP_FORMAT;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id for login tokens, username for registration tokens.
    pub sub: String,
    /// Issue time as `YYYY-MM-DD HH:MM:SS` (UTC).
    pub created: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly minted token plus its expiry as a unix timestamp.
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub expires_at: i64,
}

pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenSigner {
    pub fn new(secret: &str, access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_secs: access_ttl_secs as i64,
            refresh_ttl_secs: refresh_ttl_secs as i64,
        }
    }

    pub fn issue_access(&self, subject: &str) -> Result<SignedToken, jsonwebtoken::errors::Error> {
        self.issue(subject, self.access_ttl_secs)
    }

    pub fn issue_refresh(&self, subject: &str) -> Result<SignedToken, jsonwebtoken::errors::Error> {
        self.issue(subject, self.refresh_ttl_secs)
    }

    fn issue(&self, subject: &str, ttl_secs: i64) -> Result<SignedToken, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            created: now.format(TIMESTAMP_FORMAT).to_string(),
            iat: now.timestamp(),
            exp: now.timestamp() + ttl_secs,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        Ok(SignedToken {
            token,
            expires_at: claims.exp,
        })
    }

    /// Decode and validate a token (signature + expiry).
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))?;
        Ok(data.claims)
    }
}
