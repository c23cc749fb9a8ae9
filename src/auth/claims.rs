/// JWT Claims structures
///
/// Payloads of the two credential kinds (RFC 7519 registered claims plus
/// the email claim carried by renewal credentials).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RotationError;

/// Claims of a renewal (refresh) credential
///
/// Only `sub` and `email` are trusted content. `jti` keeps two credentials
/// minted in the same second for the same owner distinct.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RenewalClaims {
    /// Subject (owner ID as UUID string)
    pub sub: String,
    /// Owner email, re-embedded on every rotation
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Unique token ID
    pub jti: String,
}

impl RenewalClaims {
    pub fn new(owner_id: Uuid, email: String, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            sub: owner_id.to_string(),
            email,
            exp: expires_at.timestamp(),
            iat: issued_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Extract the owner ID from `sub`
    ///
    /// A subject that is not a UUID can only come from a forged or foreign
    /// token, so it is reported as a signature failure.
    pub fn owner_id(&self) -> Result<Uuid, RotationError> {
        Uuid::parse_str(&self.sub).map_err(|_| RotationError::InvalidSignature)
    }

    /// Expired at or before `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

/// Claims of an access credential
///
/// Carries nothing but the subject and timing claims.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

impl AccessClaims {
    pub fn new(owner_id: Uuid, issued_at: DateTime<Utc>, ttl_seconds: i64) -> Result<Self, RotationError> {
        let iat = issued_at.timestamp();
        let exp = iat.checked_add(ttl_seconds).ok_or_else(|| {
            RotationError::Signing(format!("Access token lifetime of {}s is out of range", ttl_seconds))
        })?;

        Ok(Self {
            sub: owner_id.to_string(),
            exp,
            iat,
            jti: Uuid::new_v4().to_string(),
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}
