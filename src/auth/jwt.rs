/// JWT Token Generation and Validation
///
/// Signs and verifies the two credential kinds. Access credentials use
/// `secret_access`, renewal credentials use `secret_renewal`; both are HS256.
/// Expiry is checked against the caller-supplied instant rather than the
/// system clock.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::auth::claims::{AccessClaims, RenewalClaims};
use crate::configuration::JwtSettings;
use crate::error::RotationError;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Generate a new access token for an owner
///
/// # Errors
/// Returns `RotationError::Signing` if the expiry overflows or encoding fails
pub fn generate_access_token(
    owner_id: &Uuid,
    issued_at: DateTime<Utc>,
    config: &JwtSettings,
) -> Result<String, RotationError> {
    let claims = AccessClaims::new(*owner_id, issued_at, config.access_ttl)?;

    encode(
        &Header::new(ALGORITHM),
        &claims,
        &EncodingKey::from_secret(config.secret_access.as_bytes()),
    )
    .map_err(|e| RotationError::Signing(format!("Access token generation failed: {}", e)))
}

/// Generate a new renewal token carrying the owner's email
///
/// `expires_at` is the same instant stored on the token record.
///
/// # Errors
/// Returns `RotationError::Signing` if encoding fails
pub fn generate_renewal_token(
    owner_id: &Uuid,
    email: &str,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    config: &JwtSettings,
) -> Result<String, RotationError> {
    let claims = RenewalClaims::new(*owner_id, email.to_string(), issued_at, expires_at);

    encode(
        &Header::new(ALGORITHM),
        &claims,
        &EncodingKey::from_secret(config.secret_renewal.as_bytes()),
    )
    .map_err(|e| RotationError::Signing(format!("Renewal token generation failed: {}", e)))
}

/// Verify a presented renewal token and extract its claims
///
/// # Errors
/// - `InvalidSignature`: malformed, wrong secret, altered payload, or non-UUID subject
/// - `Expired`: `exp` is at or before `now`
pub fn validate_renewal_token(
    token: &str,
    now: DateTime<Utc>,
    config: &JwtSettings,
) -> Result<RenewalClaims, RotationError> {
    let claims: RenewalClaims = verify(token, config.secret_renewal.as_bytes())?;

    if claims.is_expired_at(now) {
        return Err(RotationError::Expired);
    }
    claims.owner_id()?;

    Ok(claims)
}

/// Verify an access token and extract its claims
///
/// # Errors
/// Same taxonomy as `validate_renewal_token`
pub fn validate_access_token(
    token: &str,
    now: DateTime<Utc>,
    config: &JwtSettings,
) -> Result<AccessClaims, RotationError> {
    let claims: AccessClaims = verify(token, config.secret_access.as_bytes())?;

    if claims.is_expired_at(now) {
        return Err(RotationError::Expired);
    }

    Ok(claims)
}

fn verify<T: DeserializeOwned>(token: &str, secret: &[u8]) -> Result<T, RotationError> {
    let mut validation = Validation::new(ALGORITHM);
    // exp is compared against the injected clock by the callers
    validation.validate_exp = false;
    validation.set_required_spec_claims(&["exp", "sub"]);

    decode::<T>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => RotationError::Expired,
            _ => RotationError::InvalidSignature,
        })
}
