//! redb-based storage layer for the assignment engine
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `staff` | `staff_id` | `Staff` | Roster + capacity counters |
//! | `orders` | `order_id` | `Order` | Assignment state + history |
//! | `pointers` | `{hotel_id}:{branch_id}` | `PointerRecord` | Round-robin pointers |
//! | `schedule` | `"pointer_reset"` | `ResetSchedule` | Next/last reset run |
//!
//! # Atomicity
//!
//! Every `*_txn` method works inside a caller-owned `WriteTransaction`, so one
//! assignment (counter + pointer + order) commits or rolls back as a unit.
//! redb admits a single writer at a time, which serializes concurrent
//! assignments for the same branch.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use shared::models::{BranchScope, Order, PointerRecord, ResetSchedule, Staff};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Table for staff: key = staff_id, value = JSON-serialized Staff
const STAFF_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("staff");

/// Table for orders: key = order_id, value = JSON-serialized Order
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// Table for round-robin pointers: key = scope key, value = JSON-serialized PointerRecord
const POINTERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("pointers");

/// Table for scheduler state: key = job name, value = JSON-serialized ResetSchedule
const SCHEDULE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("schedule");

const POINTER_RESET_KEY: &str = "pointer_reset";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct StorageStats {
    pub staff_count: u64,
    pub order_count: u64,
    pub pointer_count: u64,
}

/// Dispatch storage backed by redb
#[derive(Clone)]
pub struct DispatchStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for DispatchStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchStorage").finish_non_exhaustive()
    }
}

impl DispatchStorage {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init_tables(&db)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init_tables(&db)?;
        Ok(Self { db: Arc::new(db) })
    }

    fn init_tables(db: &Database) -> StorageResult<()> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(STAFF_TABLE)?;
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(POINTERS_TABLE)?;
            let _ = write_txn.open_table(SCHEDULE_TABLE)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Staff Operations ==========

    pub fn put_staff(&self, txn: &WriteTransaction, staff: &Staff) -> StorageResult<()> {
        let mut table = txn.open_table(STAFF_TABLE)?;
        let value = serde_json::to_vec(staff)?;
        table.insert(staff.id.as_str(), value.as_slice())?;
        Ok(())
    }

    pub fn get_staff(&self, staff_id: &str) -> StorageResult<Option<Staff>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(STAFF_TABLE)?;

        match table.get(staff_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_staff_txn(
        &self,
        txn: &WriteTransaction,
        staff_id: &str,
    ) -> StorageResult<Option<Staff>> {
        let table = txn.open_table(STAFF_TABLE)?;

        match table.get(staff_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All staff of a branch (any role, including inactive)
    pub fn list_branch_staff(&self, scope: &BranchScope) -> StorageResult<Vec<Staff>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(STAFF_TABLE)?;

        let mut staff = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let s: Staff = serde_json::from_slice(value.value())?;
            if s.belongs_to(scope) {
                staff.push(s);
            }
        }
        Ok(staff)
    }

    /// Same as [`list_branch_staff`](Self::list_branch_staff), inside a write transaction
    pub fn list_branch_staff_txn(
        &self,
        txn: &WriteTransaction,
        scope: &BranchScope,
    ) -> StorageResult<Vec<Staff>> {
        let table = txn.open_table(STAFF_TABLE)?;

        let mut staff = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let s: Staff = serde_json::from_slice(value.value())?;
            if s.belongs_to(scope) {
                staff.push(s);
            }
        }
        Ok(staff)
    }

    pub fn remove_staff(&self, txn: &WriteTransaction, staff_id: &str) -> StorageResult<bool> {
        let mut table = txn.open_table(STAFF_TABLE)?;
        let removed = table.remove(staff_id)?.is_some();
        Ok(removed)
    }

    // ========== Order Operations ==========

    pub fn put_order(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        let mut table = txn.open_table(ORDERS_TABLE)?;
        let value = serde_json::to_vec(order)?;
        table.insert(order.id.as_str(), value.as_slice())?;
        Ok(())
    }

    pub fn get_order(&self, order_id: &str) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_order_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Option<Order>> {
        let table = txn.open_table(ORDERS_TABLE)?;

        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    // ========== Pointer Operations ==========

    pub fn get_pointer(&self, scope: &BranchScope) -> StorageResult<Option<PointerRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(POINTERS_TABLE)?;

        match table.get(scope.key().as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_pointer_txn(
        &self,
        txn: &WriteTransaction,
        scope: &BranchScope,
    ) -> StorageResult<Option<PointerRecord>> {
        let table = txn.open_table(POINTERS_TABLE)?;

        match table.get(scope.key().as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn put_pointer(&self, txn: &WriteTransaction, pointer: &PointerRecord) -> StorageResult<()> {
        let mut table = txn.open_table(POINTERS_TABLE)?;
        let value = serde_json::to_vec(pointer)?;
        table.insert(pointer.scope().key().as_str(), value.as_slice())?;
        Ok(())
    }

    /// List pointers whose key starts with `prefix` (all when `None`)
    pub fn list_pointers(&self, prefix: Option<&str>) -> StorageResult<Vec<PointerRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(POINTERS_TABLE)?;

        let mut pointers = Vec::new();
        for result in table.iter()? {
            let (key, value) = result?;
            if prefix.is_none_or(|p| key.value().starts_with(p)) {
                pointers.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(pointers)
    }

    /// Remove pointers whose key starts with `prefix` (all when `None`).
    /// Returns the number of pointers removed.
    pub fn clear_pointers(&self, txn: &WriteTransaction, prefix: Option<&str>) -> StorageResult<usize> {
        let mut table = txn.open_table(POINTERS_TABLE)?;

        let mut keys = Vec::new();
        for result in table.iter()? {
            let (key, _value) = result?;
            let key = key.value();
            if prefix.is_none_or(|p| key.starts_with(p)) {
                keys.push(key.to_string());
            }
        }
        for key in &keys {
            table.remove(key.as_str())?;
        }
        Ok(keys.len())
    }

    pub fn remove_pointer(&self, txn: &WriteTransaction, scope: &BranchScope) -> StorageResult<bool> {
        let mut table = txn.open_table(POINTERS_TABLE)?;
        let removed = table.remove(scope.key().as_str())?.is_some();
        Ok(removed)
    }

    // ========== Reset Schedule ==========

    pub fn get_reset_schedule(&self) -> StorageResult<ResetSchedule> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SCHEDULE_TABLE)?;

        match table.get(POINTER_RESET_KEY)? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Ok(ResetSchedule::default()),
        }
    }

    pub fn put_reset_schedule(
        &self,
        txn: &WriteTransaction,
        schedule: &ResetSchedule,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(SCHEDULE_TABLE)?;
        let value = serde_json::to_vec(schedule)?;
        table.insert(POINTER_RESET_KEY, value.as_slice())?;
        Ok(())
    }

    // ========== Statistics ==========

    pub fn get_stats(&self) -> StorageResult<StorageStats> {
        let read_txn = self.db.begin_read()?;

        let staff_table = read_txn.open_table(STAFF_TABLE)?;
        let orders_table = read_txn.open_table(ORDERS_TABLE)?;
        let pointers_table = read_txn.open_table(POINTERS_TABLE)?;

        Ok(StorageStats {
            staff_count: staff_table.len()?,
            order_count: orders_table.len()?,
            pointer_count: pointers_table.len()?,
        })
    }
}
