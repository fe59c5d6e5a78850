//! Canonical active-operator registry.
//!
//! [`OperatorRegistry`] validates and persists operator records through an
//! [`OperatorStore`] and applies TTL expiry against an injected
//! [`ClockSource`]. It is passive: nothing here runs on a timer, the
//! maintenance worker (or any other caller) drives [`OperatorRegistry::expire_operators`].

use std::fmt;
use std::sync::Arc;

use avs_core::{
    validate_operator, ClockSource, InsertOutcome, OperatorInfo, OperatorStore, RegistryError,
};
use tracing::{debug, info};

/// Registry of operators, shared by reference between request handlers,
/// the maintenance worker, and the membership reconciler.
pub struct OperatorRegistry {
    store: Arc<dyn OperatorStore>,
    clock: Arc<dyn ClockSource>,
    ttl_ms: u64,
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("ttl_ms", &self.ttl_ms)
            .finish_non_exhaustive()
    }
}

impl OperatorRegistry {
    #[must_use]
    pub fn new(store: Arc<dyn OperatorStore>, clock: Arc<dyn ClockSource>, ttl_ms: u64) -> Self {
        Self {
            store,
            clock,
            ttl_ms,
        }
    }

    #[must_use]
    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    /// Current time according to the registry's clock.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.clock.now()
    }

    /// Adds a new operator.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Validation`] if `info` is malformed
    /// - [`RegistryError::Duplicate`] if the address is already registered
    /// - [`RegistryError::Store`] if the store fails
    pub async fn add_operator(&self, info: OperatorInfo) -> Result<(), RegistryError> {
        validate_operator(&info)?;
        match self.store.insert_if_absent(&info).await? {
            InsertOutcome::Inserted => {
                info!(
                    operator = %info.address,
                    endpoint = %info.endpoint,
                    last_seen_ms = info.last_seen_ms,
                    "operator added"
                );
                Ok(())
            }
            InsertOutcome::AlreadyExists => Err(RegistryError::Duplicate(info.address)),
        }
    }

    /// Adds `info`, or refreshes the last-seen time of an existing record
    /// to `info.last_seen_ms`. The stored endpoint is kept.
    ///
    /// Used for confirmed registrations, where the operator must end up
    /// present whether or not an expiry sweep runs concurrently.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Validation`] if `info` is malformed
    /// - [`RegistryError::Store`] if the store fails
    pub async fn register_or_refresh(
        &self,
        info: OperatorInfo,
    ) -> Result<InsertOutcome, RegistryError> {
        validate_operator(&info)?;
        let outcome = self.store.refresh_or_insert(&info).await?;
        match outcome {
            InsertOutcome::Inserted => info!(
                operator = %info.address,
                endpoint = %info.endpoint,
                last_seen_ms = info.last_seen_ms,
                "operator added"
            ),
            InsertOutcome::AlreadyExists => debug!(
                operator = %info.address,
                seen_at_ms = info.last_seen_ms,
                "operator refreshed"
            ),
        }
        Ok(outcome)
    }

    /// Looks up one operator.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] if absent, [`RegistryError::Store`] on store failure.
    pub async fn get_operator_info(&self, address: &str) -> Result<OperatorInfo, RegistryError> {
        self.store
            .get(address)
            .await?
            .ok_or_else(|| RegistryError::NotFound(address.to_string()))
    }

    /// Returns every stored operator, stale or not. Order is unspecified.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Store`] on store failure.
    pub async fn get_all_operator_info(&self) -> Result<Vec<OperatorInfo>, RegistryError> {
        Ok(self.store.get_all().await?)
    }

    /// Returns every stored address without materializing records.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Store`] on store failure.
    pub async fn get_operator_addresses(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.store.addresses().await?)
    }

    /// Returns operators seen within the TTL as of now.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Store`] on store failure.
    pub async fn active_operators(&self) -> Result<Vec<OperatorInfo>, RegistryError> {
        let now = self.clock.now();
        let mut all = self.store.get_all().await?;
        all.retain(|op| op.is_active(now, self.ttl_ms));
        Ok(all)
    }

    /// Removes every operator with `now - last_seen > ttl`.
    ///
    /// Idempotent: without intervening heartbeats a second call removes nothing.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Store`] on store failure.
    pub async fn expire_operators(&self) -> Result<Vec<String>, RegistryError> {
        let now = self.clock.now();
        // Kept iff last_seen >= now - ttl, i.e. now - last_seen <= ttl.
        let cutoff = now.saturating_sub(self.ttl_ms);
        let expired = self.store.expire_older_than(cutoff).await?;
        if expired.is_empty() {
            debug!(cutoff_ms = cutoff, "expiry sweep removed nothing");
        } else {
            info!(count = expired.len(), operators = ?expired, "expired stale operators");
        }
        Ok(expired)
    }

    /// Refreshes an operator's last-seen time to now.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] if absent, [`RegistryError::Store`] on store failure.
    pub async fn heartbeat(&self, address: &str) -> Result<(), RegistryError> {
        let now = self.clock.now();
        if self.store.touch(address, now).await? {
            debug!(operator = %address, seen_at_ms = now, "operator heartbeat");
            Ok(())
        } else {
            Err(RegistryError::NotFound(address.to_string()))
        }
    }

    /// Removes an operator immediately, regardless of TTL.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] if absent, [`RegistryError::Store`] on store failure.
    pub async fn remove_operator(&self, address: &str) -> Result<(), RegistryError> {
        if self.store.remove(address).await? {
            info!(operator = %address, "operator removed");
            Ok(())
        } else {
            Err(RegistryError::NotFound(address.to_string()))
        }
    }

    /// Liveness check of the backing store.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Store`] if the store is unreachable.
    pub async fn test_connection(&self) -> Result<(), RegistryError> {
        Ok(self.store.ping().await?)
    }
}
