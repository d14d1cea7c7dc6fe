use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// 本地发起、尚未被节点确认的操作类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    CreateGroup,
    JoinGroup,
    LeaveGroup,
    Other(String),
}

/// A locally initiated operation the node has not confirmed yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub id: Uuid,
    pub kind: OperationKind,
    pub started_at: u64,
}

/// Counter of pending operations.
///
/// While the count is non-zero the node's membership list may not reflect
/// what the user just did, so the sync coordinator must not overwrite local
/// memberships with it.
#[derive(Clone, Default)]
pub struct PendingOperations {
    inner: Arc<Mutex<HashMap<Uuid, PendingOperation>>>,
}

impl PendingOperations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores operations that were pending when the client last stopped
    pub fn from_operations(operations: Vec<PendingOperation>) -> Self {
        let pending = Self::new();
        {
            let mut inner = pending.lock();
            for op in operations {
                inner.insert(op.id, op);
            }
        }
        pending
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, PendingOperation>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts tracking an operation and returns its ticket
    pub fn begin(&self, kind: OperationKind, started_at: u64) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().insert(id, PendingOperation { id, kind, started_at });
        id
    }

    /// Stops tracking an operation. Returns false for unknown tickets.
    pub fn complete(&self, id: &Uuid) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn total(&self) -> usize {
        self.lock().len()
    }

    /// Pending operations, oldest first
    pub fn list(&self) -> Vec<PendingOperation> {
        let mut operations: Vec<PendingOperation> = self.lock().values().cloned().collect();
        operations.sort_by_key(|op| op.started_at);
        operations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_and_complete() {
        let pending = PendingOperations::new();
        let first = pending.begin(OperationKind::CreateGroup, 2);
        let second = pending.begin(OperationKind::JoinGroup, 1);
        assert_eq!(pending.total(), 2);

        let list = pending.list();
        assert_eq!(list[0].id, second);
        assert_eq!(list[1].kind, OperationKind::CreateGroup);

        assert!(pending.complete(&first));
        assert!(!pending.complete(&first));
        assert_eq!(pending.total(), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let pending = PendingOperations::new();
        let shared = pending.clone();
        shared.begin(OperationKind::Other("invite".to_string()), 0);

        assert_eq!(pending.total(), 1);

        let restored = PendingOperations::from_operations(pending.list());
        assert_eq!(restored.total(), 1);
    }
}
