mod database;
mod snapshot_store;

pub use database::{Database, DatabaseError};
pub use snapshot_store::{SnapshotStore, SnapshotStoreError};

use std::path::Path;

/// 存储管理器
pub struct StorageManager {
    database: Database,
    snapshots: SnapshotStore,
}

impl StorageManager {
    /// Opens (or creates) the database at `path`
    pub fn open(path: &Path) -> Result<Self, SnapshotStoreError> {
        let database = Database::new(path)?;
        let snapshots = SnapshotStore::new(&database)?;

        Ok(Self { database, snapshots })
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// 关闭前刷新
    pub fn close(&self) -> Result<(), DatabaseError> {
        self.database.flush()
    }
}
