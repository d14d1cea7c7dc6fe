//! Persistence of the local state across restarts.

use brightid_core::crypto::KeyPair;
use brightid_core::identity::{FlagDisposition, TrustLevel, User, UserId};
use brightid_core::node::MemoryNode;
use brightid_core::state::{OperationKind, PendingOperations, StateStore};
use brightid_core::storage::StorageManager;
use brightid_core::sync::SyncCoordinator;
use brightid_core::trust::{FlaggingConfig, FlaggingEngine};
use std::sync::Arc;
use tempfile::tempdir;

/// State written on shutdown is what the next start sees, including local
/// flags and pending operations.
#[tokio::test]
async fn test_state_round_trips_through_sled() {
    let dir = tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("brightid.db");

    let keypair = KeyPair::generate().expect("Failed to generate keypair");
    let alice = UserId::from_public_key(&keypair.public);
    let bob = UserId::from("bob");

    let node = MemoryNode::new();
    node.connect(&alice, &bob, TrustLevel::AlreadyKnown, 1);
    node.connect(&bob, &alice, TrustLevel::Recovery, 1);

    {
        let storage = StorageManager::open(&db_path).expect("Failed to open storage");
        let store = StateStore::new(User::new(alice.clone(), "Alice"));
        let pending = PendingOperations::new();
        let coordinator = SyncCoordinator::new(Arc::new(node.clone()), store.clone(), pending.clone());
        coordinator.refresh(&alice).await.expect("refresh failed");

        FlaggingEngine::new(Arc::new(node.clone()), store.clone(), keypair.clone(), FlaggingConfig::default())
            .apply_flag(&bob, FlagDisposition::ReportedDuplicate, None, |_| {})
            .await
            .expect("flag failed");
        pending.begin(OperationKind::CreateGroup, 7);

        let snapshots = storage.snapshots();
        snapshots.save_keypair(&keypair).expect("save keypair");
        snapshots.save_snapshot(&store.snapshot().await).expect("save snapshot");
        snapshots.save_pending(&pending.list()).expect("save pending");
        storage.close().expect("close");
    }

    let storage = StorageManager::open(&db_path).expect("Failed to reopen storage");
    let snapshots = storage.snapshots();

    assert_eq!(snapshots.load_keypair().expect("load keypair"), Some(keypair));

    let snapshot = snapshots.load_snapshot().expect("load snapshot").expect("no snapshot");
    assert_eq!(snapshot.user.id, alice);
    let conn = snapshot.connection(&bob).expect("bob missing");
    assert_eq!(conn.level, TrustLevel::Reported);
    assert_eq!(conn.incoming_level, Some(TrustLevel::Recovery));
    assert_eq!(conn.flag, Some(FlagDisposition::ReportedDuplicate));

    let pending = PendingOperations::from_operations(snapshots.load_pending().expect("load pending"));
    assert_eq!(pending.total(), 1);
    assert_eq!(pending.list()[0].kind, OperationKind::CreateGroup);
}
