/// Renewal token persistence
///
/// The rotation logic only talks to the `TokenStore` trait; the concrete
/// back end (Postgres in production, in-memory for tests and local runs)
/// is chosen at startup.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;

pub use memory::InMemoryTokenStore;
pub use postgres::PgTokenStore;

/// A persisted, unconsumed renewal credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalTokenRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub token_value: String,
    pub expires_at: DateTime<Utc>,
}

/// Insert payload; the store assigns the id
#[derive(Debug, Clone)]
pub struct NewRenewalToken {
    pub owner_id: Uuid,
    pub token_value: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn find_by_owner_and_token(
        &self,
        owner_id: Uuid,
        token_value: &str,
    ) -> Result<Option<RenewalTokenRecord>, StoreError>;

    async fn delete_by_id(&self, id: Uuid) -> Result<(), StoreError>;

    /// Remove and return the record matching `(owner_id, token_value)`
    ///
    /// Must be linearizable: when several callers race on the same pair,
    /// exactly one gets `Some`.
    async fn take_by_owner_and_token(
        &self,
        owner_id: Uuid,
        token_value: &str,
    ) -> Result<Option<RenewalTokenRecord>, StoreError>;

    async fn create(&self, token: NewRenewalToken) -> Result<RenewalTokenRecord, StoreError>;

    /// Delete every record of an owner, returning how many were removed
    async fn delete_by_owner(&self, owner_id: Uuid) -> Result<u64, StoreError>;

    /// Delete records whose `expires_at` is at or before `now`
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}
