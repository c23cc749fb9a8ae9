use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{NewRenewalToken, RenewalTokenRecord, TokenStore};
use crate::error::StoreError;

/// Process-local token store
///
/// Every operation runs inside one mutex critical section, which makes
/// `take_by_owner_and_token` trivially linearizable. Records are lost on
/// restart.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    records: Mutex<HashMap<Uuid, RenewalTokenRecord>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of an owner's records, ordered by expiry
    pub fn records_for(&self, owner_id: Uuid) -> Vec<RenewalTokenRecord> {
        let mut records: Vec<_> = match self.lock() {
            Ok(records) => records
                .values()
                .filter(|r| r.owner_id == owner_id)
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        };
        records.sort_by_key(|r| r.expires_at);
        records
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, RenewalTokenRecord>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("token store lock poisoned".to_string()))
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn find_by_owner_and_token(
        &self,
        owner_id: Uuid,
        token_value: &str,
    ) -> Result<Option<RenewalTokenRecord>, StoreError> {
        let records = self.lock()?;
        Ok(records
            .values()
            .find(|r| r.owner_id == owner_id && r.token_value == token_value)
            .cloned())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<(), StoreError> {
        self.lock()?.remove(&id);
        Ok(())
    }

    async fn take_by_owner_and_token(
        &self,
        owner_id: Uuid,
        token_value: &str,
    ) -> Result<Option<RenewalTokenRecord>, StoreError> {
        let mut records = self.lock()?;
        let id = records
            .values()
            .find(|r| r.owner_id == owner_id && r.token_value == token_value)
            .map(|r| r.id);

        Ok(id.and_then(|id| records.remove(&id)))
    }

    async fn create(&self, token: NewRenewalToken) -> Result<RenewalTokenRecord, StoreError> {
        let mut records = self.lock()?;
        if records
            .values()
            .any(|r| r.owner_id == token.owner_id && r.token_value == token.token_value)
        {
            return Err(StoreError::UniqueConstraintViolation(
                "refresh token already stored for owner".to_string(),
            ));
        }

        let record = RenewalTokenRecord {
            id: Uuid::new_v4(),
            owner_id: token.owner_id,
            token_value: token.token_value,
            expires_at: token.expires_at,
        };
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn delete_by_owner(&self, owner_id: Uuid) -> Result<u64, StoreError> {
        let mut records = self.lock()?;
        let before = records.len();
        records.retain(|_, r| r.owner_id != owner_id);
        Ok((before - records.len()) as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut records = self.lock()?;
        let before = records.len();
        records.retain(|_, r| r.expires_at > now);
        Ok((before - records.len()) as u64)
    }
}
