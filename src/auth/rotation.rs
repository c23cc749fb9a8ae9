/// Refresh Token Rotation
///
/// A renewal credential is single-use. Presenting it:
/// 1. verifies its signature and expiry (no store access before this passes)
/// 2. atomically removes its record from the store (replay check and consumption)
/// 3. mints and stores a replacement renewal credential
/// 4. mints a fresh access credential
///
/// The old record is gone from step 2 on, so any later failure leaves the
/// caller with nothing and forces a fresh login.

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::jwt::{generate_access_token, generate_renewal_token, validate_renewal_token};
use crate::clock::Clock;
use crate::configuration::JwtSettings;
use crate::error::RotationError;
use crate::store::{NewRenewalToken, TokenStore};

/// Credentials handed back after a login or a rotation
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct RenewalService {
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    config: JwtSettings,
}

impl RenewalService {
    pub fn new(store: Arc<dyn TokenStore>, clock: Arc<dyn Clock>, config: JwtSettings) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &JwtSettings {
        &self.config
    }

    /// Exchange a renewal credential for a new access/renewal pair
    ///
    /// # Errors
    /// - `InvalidSignature` / `Expired`: the token failed verification; the store was not touched
    /// - `TokenNotFound`: already rotated, revoked, or never issued
    /// - `Store` / `Signing`: infrastructure failure after the old token was consumed
    pub async fn rotate(&self, presented_token: &str) -> Result<TokenPair, RotationError> {
        let claims = validate_renewal_token(presented_token, self.clock.now(), &self.config)?;
        let owner_id = claims.owner_id()?;

        self.store
            .take_by_owner_and_token(owner_id, presented_token)
            .await?
            .ok_or(RotationError::TokenNotFound)?;

        self.issue(owner_id, &claims.email).await
    }

    /// Mint and persist a first renewal credential plus an access credential
    ///
    /// Login flows call this once credentials have been checked upstream;
    /// `rotate` reuses it after consuming the presented token.
    pub async fn issue(&self, owner_id: Uuid, email: &str) -> Result<TokenPair, RotationError> {
        let issued_at = self.clock.now();
        let expires_at = self
            .clock
            .add_days(self.config.renewal_ttl_days)
            .ok_or_else(|| {
                RotationError::Signing(format!(
                    "Renewal token lifetime of {} days is out of range",
                    self.config.renewal_ttl_days
                ))
            })?;

        let refresh_token =
            generate_renewal_token(&owner_id, email, issued_at, expires_at, &self.config)?;

        self.store
            .create(NewRenewalToken {
                owner_id,
                token_value: refresh_token.clone(),
                expires_at,
            })
            .await?;

        let access_token = generate_access_token(&owner_id, issued_at, &self.config)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Consume every outstanding renewal credential of an owner
    ///
    /// Access credentials already handed out stay valid until they expire.
    pub async fn revoke_all(&self, owner_id: Uuid) -> Result<u64, RotationError> {
        Ok(self.store.delete_by_owner(owner_id).await?)
    }

    /// Drop records that expired before now
    pub async fn purge_expired(&self) -> Result<u64, RotationError> {
        Ok(self.store.delete_expired(self.clock.now()).await?)
    }
}
