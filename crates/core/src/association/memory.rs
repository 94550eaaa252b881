//! In-memory [`ResourceStore`].
//!
//! Keeps every table behind one async mutex, so each trait call is atomic
//! exactly like a single store round trip. Carries a movable clock and fault
//! switches for exercising lock expiry and rollback paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::locking::LockScope;
use crate::status::{AssetStatus, AssociationType};
use crate::types::{Date, DbId, Timestamp};

use super::store::{
    AssociationInsert, LockAttempt, LockRequest, OperationLock, ResourceStore, StoreError,
};
use super::{AssetState, Association};

/// Switches that make the next store calls fail.
#[derive(Debug, Default)]
pub struct Faults {
    reads: AtomicBool,
    status_update: AtomicBool,
    locks: AtomicBool,
    release: AtomicBool,
}

impl Faults {
    /// Fail every asset/association read.
    pub fn fail_reads(&self, on: bool) {
        self.reads.store(on, Ordering::SeqCst);
    }

    /// Fail the asset status write inside atomic transitions, after the
    /// association write has already been staged.
    pub fn fail_status_update(&self, on: bool) {
        self.status_update.store(on, Ordering::SeqCst);
    }

    /// Fail lock acquisition.
    pub fn fail_locks(&self, on: bool) {
        self.locks.store(on, Ordering::SeqCst);
    }

    /// Fail lock release.
    pub fn fail_release(&self, on: bool) {
        self.release.store(on, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(format!("injected {what} failure")));
        }
        Ok(())
    }
}

#[derive(Default)]
struct Tables {
    assets: HashMap<DbId, AssetState>,
    associations: BTreeMap<DbId, Association>,
    locks: HashMap<(LockScope, DbId), OperationLock>,
    next_id: DbId,
}

impl Tables {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn active_for(&self, asset_id: DbId) -> Option<&Association> {
        self.associations
            .values()
            .find(|a| a.asset_id == asset_id && a.is_active())
    }
}

/// Process-local store used by tests and local experiments.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    faults: Faults,
    clock_offset_secs: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> &Faults {
        &self.faults
    }

    /// Move the store clock forward.
    pub fn advance_clock(&self, by: Duration) {
        self.clock_offset_secs
            .fetch_add(by.num_seconds(), Ordering::SeqCst);
    }

    pub fn now(&self) -> Timestamp {
        Utc::now() + Duration::seconds(self.clock_offset_secs.load(Ordering::SeqCst))
    }

    // -----------------------------------------------------------------------
    // Seeding and inspection
    // -----------------------------------------------------------------------

    /// Register a new asset and return its id.
    pub async fn insert_asset(&self, status: AssetStatus) -> DbId {
        let mut tables = self.tables.lock().await;
        let asset_id = tables.next_id();
        tables.assets.insert(
            asset_id,
            AssetState {
                asset_id,
                status,
                deleted_at: None,
            },
        );
        asset_id
    }

    pub async fn soft_delete_asset(&self, asset_id: DbId) {
        let now = self.now();
        if let Some(asset) = self.tables.lock().await.assets.get_mut(&asset_id) {
            asset.deleted_at = Some(now);
        }
    }

    /// Open an association directly, bypassing validation and locking.
    pub async fn insert_active_association(
        &self,
        asset_id: DbId,
        client_id: DbId,
        association_type: AssociationType,
    ) -> Association {
        let now = self.now();
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        let association = Association {
            id,
            asset_id,
            client_id,
            association_type_id: association_type,
            entry_date: now.date_naive(),
            exit_date: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        tables.associations.insert(id, association.clone());
        if let Some(asset) = tables.assets.get_mut(&asset_id) {
            asset.status = association_type.leased_status();
        }
        association
    }

    pub async fn asset_status(&self, asset_id: DbId) -> Option<AssetStatus> {
        self.tables
            .lock()
            .await
            .assets
            .get(&asset_id)
            .map(|a| a.status)
    }

    /// All associations of an asset, oldest first.
    pub async fn associations_for(&self, asset_id: DbId) -> Vec<Association> {
        self.tables
            .lock()
            .await
            .associations
            .values()
            .filter(|a| a.asset_id == asset_id)
            .cloned()
            .collect()
    }

    /// Number of stored locks, expired ones included.
    pub async fn lock_count(&self) -> usize {
        self.tables.lock().await.locks.len()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn read_asset_status(&self, asset_id: DbId) -> Result<Option<AssetState>, StoreError> {
        Faults::check(&self.faults.reads, "read")?;
        Ok(self.tables.lock().await.assets.get(&asset_id).cloned())
    }

    async fn read_active_association(
        &self,
        asset_id: DbId,
    ) -> Result<Option<Association>, StoreError> {
        Faults::check(&self.faults.reads, "read")?;
        Ok(self.tables.lock().await.active_for(asset_id).cloned())
    }

    async fn read_association(
        &self,
        association_id: DbId,
    ) -> Result<Option<Association>, StoreError> {
        Faults::check(&self.faults.reads, "read")?;
        Ok(self
            .tables
            .lock()
            .await
            .associations
            .get(&association_id)
            .cloned())
    }

    async fn create_association_atomic(
        &self,
        input: &AssociationInsert,
        new_status: AssetStatus,
    ) -> Result<Association, StoreError> {
        let now = self.now();
        let mut tables = self.tables.lock().await;

        match tables.assets.get(&input.asset_id) {
            Some(asset) if !asset.is_deleted() => {}
            _ => {
                return Err(StoreError::NotFound {
                    entity: "Asset",
                    id: input.asset_id,
                })
            }
        }
        if tables.active_for(input.asset_id).is_some() {
            return Err(StoreError::Conflict(
                "uq_associations_active_asset".to_string(),
            ));
        }

        let id = tables.next_id();
        let association = Association {
            id,
            asset_id: input.asset_id,
            client_id: input.client_id,
            association_type_id: input.association_type,
            entry_date: input.entry_date,
            exit_date: None,
            notes: input.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.associations.insert(id, association.clone());

        if let Err(e) = Faults::check(&self.faults.status_update, "asset status update") {
            tables.associations.remove(&id);
            return Err(e);
        }
        if let Some(asset) = tables.assets.get_mut(&input.asset_id) {
            asset.status = new_status;
        }
        Ok(association)
    }

    async fn close_association_atomic(
        &self,
        association_id: DbId,
        exit_date: Date,
        revert_status: AssetStatus,
    ) -> Result<Association, StoreError> {
        let now = self.now();
        let mut tables = self.tables.lock().await;

        let Some(existing) = tables
            .associations
            .get(&association_id)
            .filter(|a| a.is_active())
            .cloned()
        else {
            return Err(StoreError::NotFound {
                entity: "Active association",
                id: association_id,
            });
        };

        let mut closed = existing.clone();
        closed.exit_date = Some(exit_date);
        closed.updated_at = now;
        tables.associations.insert(association_id, closed.clone());

        if let Err(e) = Faults::check(&self.faults.status_update, "asset status update") {
            tables.associations.insert(association_id, existing);
            return Err(e);
        }
        if let Some(asset) = tables.assets.get_mut(&closed.asset_id) {
            asset.status = revert_status;
        }
        Ok(closed)
    }

    async fn acquire_lock(&self, request: &LockRequest) -> Result<LockAttempt, StoreError> {
        Faults::check(&self.faults.locks, "lock service")?;
        let now = self.now();
        let expires_at = now + Duration::minutes(request.ttl_mins);
        let key = (request.scope, request.resource_id);
        let mut tables = self.tables.lock().await;

        if let Some(existing) = tables.locks.get_mut(&key) {
            if existing.expires_at > now {
                if existing.owner_token != request.owner_token {
                    return Ok(LockAttempt::Held {
                        holder: existing.clone(),
                    });
                }
                existing.expires_at = expires_at;
                existing.operation_data = request.operation_data.clone();
                return Ok(LockAttempt::Granted {
                    lock: existing.clone(),
                    renewed: true,
                });
            }
        }

        let lock = OperationLock {
            lock_id: Uuid::new_v4(),
            operation_type: request.scope,
            resource_id: request.resource_id,
            owner_token: request.owner_token,
            acquired_at: now,
            expires_at,
            operation_data: request.operation_data.clone(),
        };
        tables.locks.insert(key, lock.clone());
        Ok(LockAttempt::Granted {
            lock,
            renewed: false,
        })
    }

    async fn release_lock(&self, lock_id: Uuid) -> Result<bool, StoreError> {
        Faults::check(&self.faults.release, "lock release")?;
        let now = self.now();
        let mut tables = self.tables.lock().await;

        let key = tables
            .locks
            .iter()
            .find(|(_, lock)| lock.lock_id == lock_id)
            .map(|(key, _)| *key);
        match key.and_then(|k| tables.locks.remove(&k)) {
            Some(lock) => Ok(lock.expires_at > now),
            None => Ok(false),
        }
    }

    async fn sweep_expired_locks(&self) -> Result<u64, StoreError> {
        let now = self.now();
        let mut tables = self.tables.lock().await;
        let before = tables.locks.len();
        tables.locks.retain(|_, lock| lock.expires_at > now);
        Ok((before - tables.locks.len()) as u64)
    }

    async fn find_live_lock(
        &self,
        scope: LockScope,
        resource_id: DbId,
    ) -> Result<Option<OperationLock>, StoreError> {
        let now = self.now();
        Ok(self
            .tables
            .lock()
            .await
            .locks
            .get(&(scope, resource_id))
            .filter(|lock| lock.expires_at > now)
            .cloned())
    }
}
