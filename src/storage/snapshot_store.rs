use crate::crypto::KeyPair;
use crate::state::{PendingOperation, Snapshot};
use crate::storage::{Database, DatabaseError};
use log::debug;
use thiserror::Error;

const STATE_TREE: &str = "state";
const PENDING_TREE: &str = "pending";

const SNAPSHOT_KEY: &[u8] = b"snapshot";
const KEYPAIR_KEY: &[u8] = b"keypair";

#[derive(Error, Debug)]
pub enum SnapshotStoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
}

/// 本地状态持久化：快照、密钥对和待确认操作
#[derive(Clone)]
pub struct SnapshotStore {
    db: Database,
}

impl SnapshotStore {
    pub fn new(db: &Database) -> Result<Self, SnapshotStoreError> {
        let _ = db.get_tree(STATE_TREE)?;
        let _ = db.get_tree(PENDING_TREE)?;

        Ok(Self { db: db.clone() })
    }

    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), SnapshotStoreError> {
        self.db.put_serialized(STATE_TREE, SNAPSHOT_KEY, snapshot)?;
        debug!("saved snapshot with {} connections", snapshot.connections.len());
        Ok(())
    }

    pub fn load_snapshot(&self) -> Result<Option<Snapshot>, SnapshotStoreError> {
        Ok(self.db.get_serialized(STATE_TREE, SNAPSHOT_KEY)?)
    }

    pub fn save_keypair(&self, keypair: &KeyPair) -> Result<(), SnapshotStoreError> {
        self.db.put_serialized(STATE_TREE, KEYPAIR_KEY, keypair)?;
        Ok(())
    }

    pub fn load_keypair(&self) -> Result<Option<KeyPair>, SnapshotStoreError> {
        Ok(self.db.get_serialized(STATE_TREE, KEYPAIR_KEY)?)
    }

    /// Replaces the stored pending operations ledger
    pub fn save_pending(&self, operations: &[PendingOperation]) -> Result<(), SnapshotStoreError> {
        self.db.clear_tree(PENDING_TREE)?;
        for op in operations {
            self.db.put_serialized(PENDING_TREE, op.id.as_bytes(), op)?;
        }
        Ok(())
    }

    /// Stored pending operations, oldest first
    pub fn load_pending(&self) -> Result<Vec<PendingOperation>, SnapshotStoreError> {
        let mut operations: Vec<PendingOperation> = self.db.values(PENDING_TREE)?;
        operations.sort_by_key(|op| op.started_at);
        Ok(operations)
    }

    pub fn flush(&self) -> Result<(), SnapshotStoreError> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Connection, FlagDisposition, Membership, TrustLevel, User, UserId, Verification};
    use crate::state::{Notification, OperationKind, PendingOperations};
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_survives_reopen() {
        let dir = tempdir().unwrap();
        let keypair = KeyPair::generate().unwrap();

        let mut snapshot = Snapshot::new(User::new(UserId::from("alice"), "Alice"));
        snapshot.set_verifications(vec![Verification::new("BrightID")]);
        snapshot.memberships.push(Membership::new("g1", 3));
        let mut bob = Connection::new("bob", TrustLevel::Recovery, 5).with_secret_key(keypair.secret.clone());
        bob.incoming_level = Some(TrustLevel::JustMet);
        bob.flag = Some(FlagDisposition::ReportedDuplicate);
        snapshot.connections.push(bob);
        snapshot.notifications.push(Notification::SponsorshipMissing);

        {
            let db = Database::new(dir.path()).unwrap();
            let store = SnapshotStore::new(&db).unwrap();
            store.save_snapshot(&snapshot).unwrap();
            store.save_keypair(&keypair).unwrap();
            store.flush().unwrap();
        }

        let db = Database::new(dir.path()).unwrap();
        let store = SnapshotStore::new(&db).unwrap();
        assert_eq!(store.load_snapshot().unwrap(), Some(snapshot));
        assert_eq!(store.load_keypair().unwrap(), Some(keypair));
    }

    #[test]
    fn test_empty_store() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path()).unwrap();
        let store = SnapshotStore::new(&db).unwrap();

        assert!(store.load_snapshot().unwrap().is_none());
        assert!(store.load_keypair().unwrap().is_none());
        assert!(store.load_pending().unwrap().is_empty());
    }

    #[test]
    fn test_pending_ledger_is_replaced() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path()).unwrap();
        let store = SnapshotStore::new(&db).unwrap();

        let pending = PendingOperations::new();
        let first = pending.begin(OperationKind::CreateGroup, 1);
        pending.begin(OperationKind::JoinGroup, 2);
        store.save_pending(&pending.list()).unwrap();
        assert_eq!(store.load_pending().unwrap().len(), 2);

        pending.complete(&first);
        store.save_pending(&pending.list()).unwrap();
        let loaded = store.load_pending().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].kind, OperationKind::JoinGroup);
    }
}
